//! spot_editor - define parking spots over a reference image of the lot
//!
//! Every command that changes the catalog writes it back before exiting.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use parkwatch::annotate::load_font;
use parkwatch::catalog::DEFAULT_CATALOG_PATH;
use parkwatch::{CatalogStore, EditOutcome, EditorInput, Point, Resolution, SpotEditor, SpotPreset};

#[derive(Parser, Debug)]
#[command(author, version, about = "Parking spot editor")]
struct Args {
    /// Spot catalog file.
    #[arg(long, env = "PARKWATCH_CATALOG", default_value = DEFAULT_CATALOG_PATH)]
    catalog: PathBuf,
    /// Reference resolution for a new catalog (WIDTHxHEIGHT).
    #[arg(long, env = "PARKWATCH_REFERENCE", default_value = "1280x720")]
    reference: Resolution,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Place one spot (click) or a row of spots (drag) with a preset size.
    Place {
        /// Press point, `x,y`.
        #[arg(long)]
        press: Point,
        /// Release point, `x,y`. Defaults to the press point (a click).
        #[arg(long)]
        release: Option<Point>,
        /// `horizontal` (90x25) or `vertical` (25x90).
        #[arg(long, default_value = "horizontal")]
        preset: SpotPreset,
    },
    /// Remove the most recently placed spot.
    DeleteLast,
    /// Print the catalog.
    List,
    /// Draw the catalog over a reference image.
    Render {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Font for spot id labels; ids are omitted without one.
        #[arg(long, env = "PARKWATCH_FONT")]
        font: Option<PathBuf>,
    },
    /// Replay editor input, one command per line (`press 10,20`, `release 10,95`,
    /// `key 2`, `secondary`, `delete`, ...). `#` starts a comment.
    Script {
        #[arg(long)]
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let store = CatalogStore::new(args.catalog);
    let mut editor = SpotEditor::open(store, args.reference)?;

    match args.command {
        Command::Place {
            press,
            release,
            preset,
        } => {
            editor.select_preset(preset);
            let placed = editor.place(press, release.unwrap_or(press))?;
            for spot in placed {
                println!(
                    "placed spot {} at {},{} ({}x{})",
                    spot.id, spot.x, spot.y, spot.width, spot.height
                );
            }
        }
        Command::DeleteLast => match editor.delete_last()? {
            Some(spot) => println!("deleted spot {}", spot.id),
            None => println!("catalog is empty, nothing to delete"),
        },
        Command::List => {
            let catalog = editor.catalog();
            println!("reference {} ({} spots)", catalog.reference(), catalog.len());
            for spot in catalog.spots() {
                println!(
                    "{:>4}  x={:<5} y={:<5} {}x{}",
                    spot.id, spot.x, spot.y, spot.width, spot.height
                );
            }
        }
        Command::Render { image, out, font } => render(&editor, &image, &out, font.as_deref())?,
        Command::Script { file } => run_script(&mut editor, &file)?,
    }
    Ok(())
}

fn render(editor: &SpotEditor, image: &Path, out: &Path, font: Option<&Path>) -> Result<()> {
    let reference = image::open(image)
        .with_context(|| format!("failed to open reference image {}", image.display()))?
        .to_rgb8();
    let font = font.map(load_font).transpose()?;
    editor
        .render(&reference, font.as_ref())
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    println!("rendered {} spots to {}", editor.catalog().len(), out.display());
    Ok(())
}

fn run_script(editor: &mut SpotEditor, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .map_err(|e| anyhow!("failed to read script {}: {}", file.display(), e))?;
    for (idx, line) in raw.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let input: EditorInput = line
            .parse()
            .map_err(|e| anyhow!("{} line {}: {}", file.display(), idx + 1, e))?;
        match editor.handle(input)? {
            EditOutcome::Placed(spots) => {
                let ids: Vec<String> = spots.iter().map(|s| s.id.to_string()).collect();
                println!("placed [{}]", ids.join(", "));
            }
            EditOutcome::Deleted(Some(spot)) => println!("deleted spot {}", spot.id),
            EditOutcome::Deleted(None) => println!("nothing to delete"),
            EditOutcome::DeleteArmed => println!("delete armed (run `delete` to remove the last spot)"),
            EditOutcome::PresetSelected(_) | EditOutcome::Pressed(_) => {}
        }
    }
    println!("catalog has {} spots", editor.catalog().len());
    Ok(())
}
