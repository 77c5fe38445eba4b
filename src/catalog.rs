//! Zone catalog: the ordered list of parking spots and its on-disk form.
//!
//! The catalog is append-only from the outside: spots are pushed by the
//! editor and removed last-in-first-out. Each spot's id is the catalog length
//! at the moment it was created, so ids always match catalog positions.
//!
//! Persistence is write-through. The editor calls [`CatalogStore::save`]
//! after every mutation and the store replaces the file atomically, so a
//! crash loses at most the mutation in flight.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::geometry::{Resolution, Zone};

pub const DEFAULT_CATALOG_PATH: &str = "park_positions.json";

/// Number of integers in a stored spot entry: `(id, x, y, width, height)`.
const ENTRY_FIELDS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParkingSpot {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ParkingSpot {
    pub fn zone(&self) -> Zone {
        Zone::new(self.x, self.y, self.width, self.height)
    }

    fn to_entry(self) -> Value {
        json!([self.id, self.x, self.y, self.width, self.height])
    }

    fn from_entry(entry: &Value) -> Result<Self> {
        let fields = entry
            .as_array()
            .ok_or_else(|| anyhow!("expected an array of {} integers", ENTRY_FIELDS))?;
        if fields.len() != ENTRY_FIELDS {
            return Err(anyhow!(
                "expected {} fields, found {}",
                ENTRY_FIELDS,
                fields.len()
            ));
        }
        let int = |idx: usize| {
            fields[idx]
                .as_i64()
                .ok_or_else(|| anyhow!("field {} is not an integer", idx))
        };
        let id = u32::try_from(int(0)?).map_err(|_| anyhow!("id {} out of range", fields[0]))?;
        let field = |idx: usize| {
            int(idx).and_then(|v| i32::try_from(v).map_err(|_| anyhow!("field {} out of range", idx)))
        };
        Ok(Self {
            id,
            x: field(1)?,
            y: field(2)?,
            width: field(3)?,
            height: field(4)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneCatalog {
    reference: Resolution,
    spots: Vec<ParkingSpot>,
}

impl ZoneCatalog {
    pub fn new(reference: Resolution) -> Self {
        Self {
            reference,
            spots: Vec::new(),
        }
    }

    pub fn from_spots(reference: Resolution, spots: Vec<ParkingSpot>) -> Self {
        Self { reference, spots }
    }

    /// Resolution the spot coordinates were drawn against.
    pub fn reference(&self) -> Resolution {
        self.reference
    }

    pub fn spots(&self) -> &[ParkingSpot] {
        &self.spots
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    pub fn last(&self) -> Option<&ParkingSpot> {
        self.spots.last()
    }

    /// Id the next appended spot will receive.
    ///
    /// Equal to the catalog length unless skipped entries left gaps, in which
    /// case ids continue after the last stored one.
    pub fn next_id(&self) -> u32 {
        let after_last = self.spots.last().map_or(0, |s| s.id.saturating_add(1));
        after_last.max(self.spots.len() as u32)
    }

    pub(crate) fn push(&mut self, x: i32, y: i32, width: i32, height: i32) -> ParkingSpot {
        let spot = ParkingSpot {
            id: self.next_id(),
            x,
            y,
            width,
            height,
        };
        self.spots.push(spot);
        spot
    }

    pub(crate) fn pop(&mut self) -> Option<ParkingSpot> {
        self.spots.pop()
    }
}

impl Default for ZoneCatalog {
    fn default() -> Self {
        Self::new(Resolution::default())
    }
}

// ----------------------------------------------------------------------------
// On-disk form
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference: Option<Resolution>,
    spots: Vec<Value>,
}

/// Older catalogs are a bare array of 5-tuples with no reference resolution.
/// Any top-level array is read as that form; only objects are documents.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredCatalog {
    Legacy(Vec<Value>),
    Document(CatalogDocument),
}

/// File-backed catalog storage at a fixed path.
#[derive(Clone, Debug)]
pub struct CatalogStore {
    path: PathBuf,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the catalog. A missing file yields an empty catalog at
    /// `default_reference`; malformed entries are skipped.
    pub fn load(&self, default_reference: Resolution) -> Result<ZoneCatalog> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!(
                    "no zone catalog at {}, starting with an empty catalog",
                    self.path.display()
                );
                return Ok(ZoneCatalog::new(default_reference));
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read zone catalog {}", self.path.display()))
            }
        };
        let stored: StoredCatalog = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid zone catalog {}: {}", self.path.display(), e))?;
        let (reference, entries) = match stored {
            StoredCatalog::Document(doc) => (doc.reference.unwrap_or(default_reference), doc.spots),
            StoredCatalog::Legacy(entries) => (default_reference, entries),
        };
        if reference.is_empty() {
            return Err(anyhow!(
                "zone catalog {} has an empty reference resolution",
                self.path.display()
            ));
        }

        let mut spots = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            match ParkingSpot::from_entry(entry) {
                Ok(spot) => spots.push(spot),
                Err(e) => log::warn!("skipping zone catalog entry #{} {}: {}", idx, entry, e),
            }
        }
        log::info!(
            "loaded {} spots from {} (reference {})",
            spots.len(),
            self.path.display(),
            reference
        );
        Ok(ZoneCatalog::from_spots(reference, spots))
    }

    /// Replace the stored catalog with `catalog`.
    pub fn save(&self, catalog: &ZoneCatalog) -> Result<()> {
        let doc = CatalogDocument {
            reference: Some(catalog.reference()),
            spots: catalog.spots().iter().map(|s| s.to_entry()).collect(),
        };
        let json = serde_json::to_vec_pretty(&doc)?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("failed to write zone catalog {}", self.path.display()))
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(tmp_path, path)?;
    Ok(())
}
