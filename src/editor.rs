//! Spot definition editor.
//!
//! Operators place spots on a still of the camera view. A click places one
//! spot at the release point; a drag stamps a row of spots down from the
//! press point, one per preset height of drag length. Every change to the
//! catalog is written to the [`CatalogStore`] before the call returns.
//!
//! Input arrives as [`EditorInput`] events so the same state machine serves
//! a GUI front end or a scripted replay.

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use std::fmt;
use std::str::FromStr;

use crate::annotate::{draw_outline, text_top};
use crate::catalog::{CatalogStore, ParkingSpot, ZoneCatalog};
use crate::geometry::{Point, Resolution};

const SPOT_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const SPOT_THICKNESS: u32 = 3;
const ID_LABEL_SCALE: f32 = 24.0;
/// Id labels sit this far above the spot's top edge (baseline).
const ID_LABEL_RISE: i32 = 10;

/// The two fixed spot sizes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpotPreset {
    /// 90x25
    #[default]
    Horizontal,
    /// 25x90
    Vertical,
}

impl SpotPreset {
    pub fn width(self) -> i32 {
        match self {
            SpotPreset::Horizontal => 90,
            SpotPreset::Vertical => 25,
        }
    }

    pub fn height(self) -> i32 {
        match self {
            SpotPreset::Horizontal => 25,
            SpotPreset::Vertical => 90,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SpotPreset::Horizontal => SpotPreset::Vertical,
            SpotPreset::Vertical => SpotPreset::Horizontal,
        }
    }
}

impl fmt::Display for SpotPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpotPreset::Horizontal => write!(f, "horizontal"),
            SpotPreset::Vertical => write!(f, "vertical"),
        }
    }
}

impl FromStr for SpotPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "horizontal" | "h" | "1" => Ok(SpotPreset::Horizontal),
            "vertical" | "v" | "2" => Ok(SpotPreset::Vertical),
            other => Err(anyhow!("unknown spot preset '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditorMode {
    #[default]
    Normal,
    /// Set by a secondary press. Advisory: placement still works and nothing
    /// is deleted until an explicit [`EditorInput::DeleteLast`].
    DeleteArmed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorInput {
    PrimaryPress(Point),
    PrimaryRelease(Point),
    SecondaryPress,
    SelectPreset(SpotPreset),
    TogglePreset,
    DeleteLast,
}

impl EditorInput {
    /// Keyboard shortcuts: `1` horizontal, `2` vertical, `d` delete last.
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            '1' => Some(EditorInput::SelectPreset(SpotPreset::Horizontal)),
            '2' => Some(EditorInput::SelectPreset(SpotPreset::Vertical)),
            'd' | 'D' => Some(EditorInput::DeleteLast),
            _ => None,
        }
    }
}

/// Parses one line of an editor script:
/// `press X,Y`, `release X,Y`, `secondary`, `preset NAME`, `toggle`, `delete`,
/// or `key C` for a keyboard shortcut.
impl FromStr for EditorInput {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let line = s.trim();
        let (verb, arg) = line
            .split_once(char::is_whitespace)
            .map(|(verb, arg)| (verb, arg.trim()))
            .unwrap_or((line, ""));
        match verb.to_ascii_lowercase().as_str() {
            "press" => Ok(EditorInput::PrimaryPress(arg.parse()?)),
            "release" => Ok(EditorInput::PrimaryRelease(arg.parse()?)),
            "secondary" => Ok(EditorInput::SecondaryPress),
            "preset" => Ok(EditorInput::SelectPreset(arg.parse()?)),
            "toggle" => Ok(EditorInput::TogglePreset),
            "delete" => Ok(EditorInput::DeleteLast),
            "key" => {
                let mut chars = arg.chars();
                match (chars.next(), chars.next()) {
                    (Some(key), None) => EditorInput::from_key(key)
                        .ok_or_else(|| anyhow!("key '{}' has no editor binding", key)),
                    _ => Err(anyhow!("key expects a single character, got '{}'", arg)),
                }
            }
            other => Err(anyhow!("unknown editor command '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Pressed(Point),
    Placed(Vec<ParkingSpot>),
    Deleted(Option<ParkingSpot>),
    PresetSelected(SpotPreset),
    DeleteArmed,
}

/// Number of spots a press/release gesture stamps along its line.
///
/// Zero means the gesture is a click.
pub fn line_spot_count(press: Point, release: Point, preset: SpotPreset) -> usize {
    let count = (press.distance_to(release) / f64::from(preset.height())).floor();
    count as usize
}

/// Origins of the spots a gesture places, in placement order.
///
/// Both gesture points must lie within `bounds` (the catalog's reference
/// view, edges included).
pub fn plan_spots(
    press: Point,
    release: Point,
    preset: SpotPreset,
    bounds: Resolution,
) -> Result<Vec<Point>> {
    for point in [press, release] {
        if !within(point, bounds) {
            return Err(anyhow!("gesture point {} lies outside the {} reference view", point, bounds));
        }
    }
    match line_spot_count(press, release, preset) {
        0 => Ok(vec![release]),
        count => (0..count)
            .map(|i| {
                i32::try_from(i)
                    .ok()
                    .and_then(|i| i.checked_mul(preset.height()))
                    .and_then(|offset| press.y.checked_add(offset))
                    .map(|y| Point::new(press.x, y))
                    .ok_or_else(|| anyhow!("spot {} of the row starting at {} is out of range", i, press))
            })
            .collect(),
    }
}

fn within(point: Point, bounds: Resolution) -> bool {
    u32::try_from(point.x).is_ok_and(|x| x <= bounds.width)
        && u32::try_from(point.y).is_ok_and(|y| y <= bounds.height)
}

pub struct SpotEditor {
    catalog: ZoneCatalog,
    store: CatalogStore,
    preset: SpotPreset,
    mode: EditorMode,
    pressed_at: Option<Point>,
}

impl SpotEditor {
    /// Load the stored catalog (or start empty) and edit it in place.
    pub fn open(store: CatalogStore, default_reference: Resolution) -> Result<Self> {
        let catalog = store.load(default_reference)?;
        Ok(Self::new(catalog, store))
    }

    pub fn new(catalog: ZoneCatalog, store: CatalogStore) -> Self {
        Self {
            catalog,
            store,
            preset: SpotPreset::default(),
            mode: EditorMode::default(),
            pressed_at: None,
        }
    }

    pub fn catalog(&self) -> &ZoneCatalog {
        &self.catalog
    }

    pub fn preset(&self) -> SpotPreset {
        self.preset
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn handle(&mut self, input: EditorInput) -> Result<EditOutcome> {
        match input {
            EditorInput::PrimaryPress(at) => {
                self.pressed_at = Some(at);
                Ok(EditOutcome::Pressed(at))
            }
            EditorInput::PrimaryRelease(at) => {
                let press = self.pressed_at.take().unwrap_or_else(|| {
                    log::warn!("release at {} without a press, treating as a click", at);
                    at
                });
                Ok(EditOutcome::Placed(self.place(press, at)?))
            }
            EditorInput::SecondaryPress => {
                self.mode = EditorMode::DeleteArmed;
                Ok(EditOutcome::DeleteArmed)
            }
            EditorInput::SelectPreset(preset) => {
                self.select_preset(preset);
                Ok(EditOutcome::PresetSelected(preset))
            }
            EditorInput::TogglePreset => {
                let preset = self.preset.toggled();
                self.select_preset(preset);
                Ok(EditOutcome::PresetSelected(preset))
            }
            EditorInput::DeleteLast => Ok(EditOutcome::Deleted(self.delete_last()?)),
        }
    }

    /// Apply a complete press/release gesture and persist the result.
    pub fn place(&mut self, press: Point, release: Point) -> Result<Vec<ParkingSpot>> {
        let (width, height) = (self.preset.width(), self.preset.height());
        let placed: Vec<ParkingSpot> = plan_spots(press, release, self.preset, self.catalog.reference())?
            .into_iter()
            .map(|origin| self.catalog.push(origin.x, origin.y, width, height))
            .collect();
        self.store.save(&self.catalog)?;
        log::info!(
            "placed {} {} spot(s), catalog now has {}",
            placed.len(),
            self.preset,
            self.catalog.len()
        );
        Ok(placed)
    }

    /// Remove the most recent spot. No-op on an empty catalog.
    pub fn delete_last(&mut self) -> Result<Option<ParkingSpot>> {
        let removed = self.catalog.pop();
        if let Some(spot) = removed {
            self.store.save(&self.catalog)?;
            log::info!("deleted spot {}, catalog now has {}", spot.id, self.catalog.len());
        } else {
            log::debug!("delete requested on an empty catalog");
        }
        self.mode = EditorMode::Normal;
        Ok(removed)
    }

    pub fn select_preset(&mut self, preset: SpotPreset) {
        self.preset = preset;
        log::info!("selected {} spot size ({}x{})", preset, preset.width(), preset.height());
    }

    /// Draw every spot, labeled with its id, over a copy of the reference image.
    pub fn render(&self, reference: &RgbImage, font: Option<&FontArc>) -> RgbImage {
        let mut canvas = reference.clone();
        for spot in self.catalog.spots() {
            let zone = spot.zone();
            if !zone.is_valid() {
                continue;
            }
            draw_outline(&mut canvas, &zone, SPOT_COLOR, SPOT_THICKNESS);
            if let Some(font) = font {
                let scale = PxScale::from(ID_LABEL_SCALE);
                let top = text_top(font, scale, zone.y - ID_LABEL_RISE);
                draw_text_mut(
                    &mut canvas,
                    SPOT_COLOR,
                    zone.x,
                    top,
                    scale,
                    font,
                    &spot.id.to_string(),
                );
            }
        }
        canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn editor() -> Result<(SpotEditor, TempDir)> {
        let dir = tempfile::tempdir()?;
        let store = CatalogStore::new(dir.path().join("spots.json"));
        Ok((SpotEditor::open(store, Resolution::default())?, dir))
    }

    fn gesture(ed: &mut SpotEditor, press: Point, release: Point) -> Result<EditOutcome> {
        ed.handle(EditorInput::PrimaryPress(press))?;
        ed.handle(EditorInput::PrimaryRelease(release))
    }

    #[test]
    fn click_places_one_spot_at_release() -> Result<()> {
        let (mut ed, _dir) = editor()?;
        gesture(&mut ed, Point::new(40, 60), Point::new(40, 60))?;
        assert_eq!(ed.catalog().len(), 1);
        let spot = ed.catalog().spots()[0];
        assert_eq!((spot.id, spot.x, spot.y, spot.width, spot.height), (0, 40, 60, 90, 25));
        Ok(())
    }

    #[test]
    fn short_drag_is_still_a_click() -> Result<()> {
        let (mut ed, _dir) = editor()?;
        gesture(&mut ed, Point::new(0, 0), Point::new(10, 20))?;
        assert_eq!(ed.catalog().spots()[0].zone().x, 10);
        assert_eq!(ed.catalog().spots()[0].zone().y, 20);
        Ok(())
    }

    #[test]
    fn drag_of_three_heights_places_three_spots() -> Result<()> {
        let (mut ed, _dir) = editor()?;
        let outcome = gesture(&mut ed, Point::new(100, 50), Point::new(100, 50 + 3 * 25))?;
        let EditOutcome::Placed(placed) = outcome else {
            panic!("expected placement");
        };
        let ys: Vec<i32> = placed.iter().map(|s| s.y).collect();
        assert_eq!(ys, vec![50, 75, 100]);
        assert!(placed.iter().all(|s| s.x == 100));
        let ids: Vec<u32> = placed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn subdivision_uses_preset_height_along_any_direction() {
        let press = Point::new(0, 0);
        // Horizontal drag of 100px with the vertical preset (height 90): one spot.
        assert_eq!(line_spot_count(press, Point::new(100, 0), SpotPreset::Vertical), 1);
        assert_eq!(line_spot_count(press, Point::new(100, 0), SpotPreset::Horizontal), 4);
        assert_eq!(
            plan_spots(press, Point::new(0, 180), SpotPreset::Vertical, Resolution::default()).unwrap(),
            vec![Point::new(0, 0), Point::new(0, 90)]
        );
    }

    #[test]
    fn far_drag_is_rejected_without_placing() -> Result<()> {
        let far = Point::new(0, 2_000_000_000);
        assert!(plan_spots(far, Point::new(0, 0), SpotPreset::Horizontal, Resolution::default()).is_err());
        assert!(plan_spots(Point::new(-1, 0), Point::new(0, 0), SpotPreset::Vertical, Resolution::default()).is_err());

        let (mut ed, dir) = editor()?;
        assert!(ed.place(far, Point::new(0, 0)).is_err());
        assert!(ed.place(Point::new(10, 10), Point::new(1281, 10)).is_err());
        assert!(ed.catalog().is_empty());
        assert!(!dir.path().join("spots.json").exists());
        Ok(())
    }

    #[test]
    fn drag_along_the_reference_edge_is_accepted() -> Result<()> {
        let (mut ed, _dir) = editor()?;
        let placed = ed.place(Point::new(0, 0), Point::new(0, 720))?;
        assert_eq!(placed.len(), 720 / 25);
        assert_eq!(placed.last().map(|s| s.y), Some(27 * 25));
        Ok(())
    }

    #[test]
    fn delete_on_empty_catalog_is_noop() -> Result<()> {
        let (mut ed, dir) = editor()?;
        assert_eq!(ed.handle(EditorInput::DeleteLast)?, EditOutcome::Deleted(None));
        assert!(ed.catalog().is_empty());
        assert!(!dir.path().join("spots.json").exists());
        Ok(())
    }

    #[test]
    fn delete_removes_most_recent_and_persists() -> Result<()> {
        let (mut ed, dir) = editor()?;
        gesture(&mut ed, Point::new(0, 0), Point::new(0, 0))?;
        gesture(&mut ed, Point::new(200, 0), Point::new(200, 0))?;
        let EditOutcome::Deleted(Some(removed)) = ed.handle(EditorInput::DeleteLast)? else {
            panic!("expected a deletion");
        };
        assert_eq!(removed.id, 1);

        let stored = CatalogStore::new(dir.path().join("spots.json")).load(Resolution::default())?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.spots()[0].x, 0);
        Ok(())
    }

    #[test]
    fn every_placement_is_persisted() -> Result<()> {
        let (mut ed, dir) = editor()?;
        let store = CatalogStore::new(dir.path().join("spots.json"));
        gesture(&mut ed, Point::new(5, 5), Point::new(5, 5))?;
        assert_eq!(store.load(Resolution::default())?.len(), 1);
        gesture(&mut ed, Point::new(5, 100), Point::new(5, 150))?;
        assert_eq!(store.load(Resolution::default())?, *ed.catalog());
        Ok(())
    }

    #[test]
    fn preset_switch_affects_later_spots_only() -> Result<()> {
        let (mut ed, _dir) = editor()?;
        gesture(&mut ed, Point::new(0, 0), Point::new(0, 0))?;
        ed.handle(EditorInput::from_key('2').unwrap())?;
        gesture(&mut ed, Point::new(300, 0), Point::new(300, 0))?;
        ed.handle(EditorInput::TogglePreset)?;
        assert_eq!(ed.preset(), SpotPreset::Horizontal);

        let sizes: Vec<(i32, i32)> = ed.catalog().spots().iter().map(|s| (s.width, s.height)).collect();
        assert_eq!(sizes, vec![(90, 25), (25, 90)]);
        Ok(())
    }

    #[test]
    fn delete_arming_is_advisory() -> Result<()> {
        let (mut ed, _dir) = editor()?;
        ed.handle(EditorInput::SecondaryPress)?;
        assert_eq!(ed.mode(), EditorMode::DeleteArmed);
        gesture(&mut ed, Point::new(0, 0), Point::new(0, 0))?;
        assert_eq!(ed.catalog().len(), 1);
        ed.handle(EditorInput::DeleteLast)?;
        assert_eq!(ed.mode(), EditorMode::Normal);
        assert!(ed.catalog().is_empty());
        Ok(())
    }

    #[test]
    fn release_without_press_is_a_click() -> Result<()> {
        let (mut ed, _dir) = editor()?;
        ed.handle(EditorInput::PrimaryRelease(Point::new(7, 8)))?;
        assert_eq!(ed.catalog().spots()[0].zone().x, 7);
        Ok(())
    }

    #[test]
    fn render_outlines_spots_in_magenta() -> Result<()> {
        let (mut ed, _dir) = editor()?;
        gesture(&mut ed, Point::new(10, 10), Point::new(10, 10))?;
        let out = ed.render(&RgbImage::new(200, 100), None);
        assert_eq!(*out.get_pixel(10, 10), SPOT_COLOR);
        assert_eq!(*out.get_pixel(12, 12), SPOT_COLOR);
        assert_eq!(*out.get_pixel(13, 13), Rgb([0, 0, 0]));
        Ok(())
    }

    #[test]
    fn parses_preset_names() -> Result<()> {
        assert_eq!("Vertical".parse::<SpotPreset>()?, SpotPreset::Vertical);
        assert_eq!("1".parse::<SpotPreset>()?, SpotPreset::Horizontal);
        assert!("diagonal".parse::<SpotPreset>().is_err());
        assert_eq!(EditorInput::from_key('x'), None);
        Ok(())
    }

    #[test]
    fn parses_script_lines() -> Result<()> {
        assert_eq!(
            "press 10,20".parse::<EditorInput>()?,
            EditorInput::PrimaryPress(Point::new(10, 20))
        );
        assert_eq!(
            "release  5, 6".parse::<EditorInput>()?,
            EditorInput::PrimaryRelease(Point::new(5, 6))
        );
        assert_eq!(
            "key 2".parse::<EditorInput>()?,
            EditorInput::SelectPreset(SpotPreset::Vertical)
        );
        assert_eq!("delete".parse::<EditorInput>()?, EditorInput::DeleteLast);
        assert!("key q".parse::<EditorInput>().is_err());
        assert!("jump 1,2".parse::<EditorInput>().is_err());
        Ok(())
    }
}
