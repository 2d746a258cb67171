// CLI handlers format byte counts and pixel coordinates for display; the
// numeric conversions are safe for real-world page sizes.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

//! partbook - split a scanned score into per-instrument part-books.
//!
//! The CLI drives the same service the HTTP surface uses: rasterize a score,
//! run staff detection, and (given a confirmed strip plan) generate one PDF
//! per instrument.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::{Luma, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect as DrawRect;
use serde::Deserialize;

use partbook_core::protocol::{GenerateRequest, PartConfig, PartitionRequest};
use partbook_core::ScoreId;
use partbook_detect::Detection;
use partbook_pipeline::{CancelToken, ScoreService};

#[derive(Parser)]
#[command(
    name = "partbook",
    about = "Split a scanned orchestral score into per-instrument part-books",
    version
)]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show page count and raster dimensions of a score.
    Info {
        /// Input score (PDF, or a rasterised page image).
        input: PathBuf,
    },
    /// Rasterize one page to a PNG file.
    Render {
        /// Input score.
        input: PathBuf,
        /// Zero-based page index.
        #[arg(long, default_value_t = 0)]
        page: usize,
        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Run staff detection and print the suggested dividers.
    Detect {
        /// Input score.
        input: PathBuf,
        /// Zero-based page index; all pages when omitted.
        #[arg(long)]
        page: Option<usize>,
        /// Display width the coordinates are scaled to (defaults to the
        /// backend page width).
        #[arg(long)]
        display_width: Option<f64>,
        /// Emit machine-readable JSON instead of a summary.
        #[arg(long)]
        json: bool,
        /// Write a PNG with the detected dividers drawn over the page
        /// (single-page mode only).
        #[arg(long)]
        overlay: Option<PathBuf>,
    },
    /// Partition a score with a confirmed strip plan and write one PDF per
    /// part.
    Split {
        /// Input score.
        input: PathBuf,
        /// JSON plan: dividers, names, header/markings, layout tweaks.
        #[arg(long)]
        plan: PathBuf,
        /// Output directory for the part PDFs.
        #[arg(short, long, default_value = "parts")]
        out_dir: PathBuf,
    },
}

/// The on-disk plan for `partbook split`: a partition request plus optional
/// per-part layout adjustments.
#[derive(Debug, Deserialize)]
struct SplitPlan {
    display_width: f64,
    #[serde(default)]
    header: Option<partbook_core::Rect>,
    #[serde(default)]
    markings: Vec<partbook_core::Rect>,
    pages: BTreeMap<usize, partbook_core::DividerSet>,
    #[serde(default)]
    parts: BTreeMap<String, PartConfig>,
}

impl SplitPlan {
    fn partition_request(&self) -> PartitionRequest {
        PartitionRequest {
            display_width: self.display_width,
            header: self.header,
            markings: self.markings.clone(),
            pages: self.pages.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Info { input } => info(&input),
        Command::Render {
            input,
            page,
            output,
        } => render(&input, page, &output),
        Command::Detect {
            input,
            page,
            display_width,
            json,
            overlay,
        } => detect(&input, page, display_width, json, overlay.as_deref()),
        Command::Split {
            input,
            plan,
            out_dir,
        } => split(&input, &plan, &out_dir),
    }
}

/// Ingest the input into a fresh service session.
fn load_score(service: &ScoreService, input: &Path) -> Result<ScoreId> {
    let is_pdf = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    let title = input.file_stem().and_then(|s| s.to_str());

    let meta = if is_pdf {
        #[cfg(feature = "pdf")]
        {
            let bytes =
                fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
            service.upload(bytes, title, None)?
        }
        #[cfg(not(feature = "pdf"))]
        {
            bail!("built without PDF support; pass a page image instead")
        }
    } else {
        let page = image::open(input)
            .with_context(|| format!("failed to load image {}", input.display()))?
            .to_luma8();
        service.upload_images(vec![page], title, None)?
    };
    Ok(ScoreId::new(meta.score_id))
}

fn info(input: &Path) -> Result<()> {
    let service = ScoreService::default();
    let id = load_score(&service, input)?;
    let meta = service.score_meta(&id)?;

    println!("{} by {}", meta.title, meta.composer);
    println!("{} pages at 300 DPI:", meta.page_count);
    for (index, page) in meta.pages.iter().enumerate() {
        println!("  page {index}: {}x{} px", page.width_px, page.height_px);
    }
    Ok(())
}

fn render(input: &Path, page: usize, output: &Path) -> Result<()> {
    let service = ScoreService::default();
    let id = load_score(&service, input)?;
    let png = service
        .page_png(&id, page)
        .with_context(|| format!("failed to rasterize page {page}"))?;
    fs::write(output, png)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("wrote {}", output.display());
    Ok(())
}

fn detect(
    input: &Path,
    page: Option<usize>,
    display_width: Option<f64>,
    json: bool,
    overlay: Option<&Path>,
) -> Result<()> {
    let service = ScoreService::default();
    let id = load_score(&service, input)?;
    let meta = service.score_meta(&id)?;

    let results: Vec<(usize, Detection)> = match page {
        Some(page) => {
            let width = display_width.unwrap_or_else(|| {
                meta.pages.get(page).map_or(0.0, |p| f64::from(p.width_px))
            });
            vec![(page, service.detect(&id, page, width)?)]
        }
        None => {
            if overlay.is_some() {
                bail!("--overlay needs a single page (--page N)");
            }
            match display_width {
                Some(width) => service.detect_all(&id, width, &CancelToken::new())?,
                // Without an explicit width each page scales to its own.
                None => {
                    let mut all = Vec::new();
                    for index in 0..meta.page_count {
                        let width = f64::from(meta.pages[index].width_px);
                        all.push((index, service.detect(&id, index, width)?));
                    }
                    all
                }
            }
        }
    };

    if json {
        let map: BTreeMap<usize, &Detection> =
            results.iter().map(|(i, d)| (*i, d)).collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        for (index, detection) in &results {
            print_summary(*index, detection);
        }
    }

    if let Some(path) = overlay {
        let (page_index, detection) = &results[0];
        write_overlay(&service, &id, *page_index, detection, path)?;
    }
    Ok(())
}

fn print_summary(page: usize, detection: &Detection) {
    let flag = if detection.warning { " [review]" } else { "" };
    println!(
        "page {page}: {} staves in {} systems, confidence {:.0}%{flag}",
        detection.stave_count,
        detection.system_count,
        detection.confidence * 100.0
    );
    if !detection.dividers.is_empty() {
        let marks: Vec<String> = detection
            .dividers
            .iter()
            .zip(&detection.system_flags)
            .map(|(y, &sys)| {
                if sys {
                    format!("{y}*")
                } else {
                    y.to_string()
                }
            })
            .collect();
        println!("  dividers: {} (* = system boundary)", marks.join(", "));
    }
    for reason in &detection.reasons {
        println!("  - {reason}");
    }
}

/// Draw the detected dividers over the page raster: system boundaries in
/// red, part dividers in blue.
fn write_overlay(
    service: &ScoreService,
    id: &ScoreId,
    page_index: usize,
    detection: &Detection,
    path: &Path,
) -> Result<()> {
    let png = service.page_png(id, page_index)?;
    let gray = image::load_from_memory(&png)?.to_luma8();
    let mut canvas = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let Luma([v]) = *gray.get_pixel(x, y);
        Rgb([v, v, v])
    });

    // Detection coordinates are in the requested display space; the caller
    // used the backend width for single-page overlays, so they map 1:1.
    let canvas_width = canvas.width();
    for (y, &is_system) in detection.dividers.iter().zip(&detection.system_flags) {
        let y = (*y).clamp(0, canvas.height() as i32 - 3);
        let color = if is_system {
            Rgb([220, 40, 40])
        } else {
            Rgb([40, 80, 220])
        };
        draw_filled_rect_mut(
            &mut canvas,
            DrawRect::at(0, y).of_size(canvas_width, 3),
            color,
        );
    }
    canvas
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

fn split(input: &Path, plan_path: &Path, out_dir: &Path) -> Result<()> {
    let plan: SplitPlan = serde_json::from_str(
        &fs::read_to_string(plan_path)
            .with_context(|| format!("failed to read {}", plan_path.display()))?,
    )
    .with_context(|| format!("failed to parse {}", plan_path.display()))?;

    let service = ScoreService::default();
    let id = load_score(&service, input)?;

    let partition = service.partition(&id, &plan.partition_request())?;
    log::info!(
        "planned {} parts from {} annotated pages",
        partition.parts.len(),
        plan.pages.len()
    );

    let generate = GenerateRequest { parts: plan.parts };
    let generated = service.generate(&id, &generate)?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    for part in &generated.parts {
        let pdf = service.part_pdf(&id, &part.name)?;
        let path = out_dir.join(format!("{}.pdf", part.name));
        fs::write(&path, pdf)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!(
            "wrote {} ({} pages, {} staves)",
            path.display(),
            part.page_count,
            part.staves_count
        );
    }
    Ok(())
}
