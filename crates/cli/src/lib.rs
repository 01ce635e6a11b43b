use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_model::{DocumentKind, ThemePreference, ViewerPhase, ViewerRequest};
use pdf_engine::{default_engine, DocumentEngine};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use viewer_core::{Fetch, HttpFetcher, ViewerController};

mod prefs;

#[derive(Debug, Parser)]
#[command(name = "vellum-cli")]
#[command(about = "Vellum certificate viewer CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Open a document, run the full viewer pipeline, export pages as PNGs.
    Open {
        #[arg(value_name = "LOCATOR")]
        locator: String,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "LOCATOR")]
        locator: String,
    },
    /// Show or change the persisted dark-mode preference.
    Theme {
        #[arg(long, conflicts_with_all = ["light", "toggle"])]
        dark: bool,
        #[arg(long, conflicts_with = "toggle")]
        light: bool,
        #[arg(long)]
        toggle: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    locator: String,
    kind: DocumentKind,
    page_count: Option<u32>,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct ThemeOutput {
    dark_mode: bool,
    style_hook: Option<&'static str>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Open { locator, output_dir } => run_open(&locator, output_dir.as_deref()),
        Commands::Info { locator } => run_info(&locator),
        Commands::Theme { dark, light, toggle } => run_theme(dark, light, toggle),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_open(locator: &str, output_dir: Option<&Path>) -> Result<()> {
    let mut controller = ViewerController::new(default_engine(), HttpFetcher::new());
    let epoch = Instant::now();

    log::debug!("opening viewer session for {locator}");
    controller.open(ViewerRequest::new(locator), epoch.elapsed());

    // Pump the session clock until nothing deferred remains: for documents
    // that is after the scrub watch has been disconnected.
    while controller.phase() == ViewerPhase::Loading || !controller.is_quiescent() {
        std::thread::sleep(Duration::from_millis(10));
        controller.tick(epoch.elapsed());
    }

    match controller.phase() {
        ViewerPhase::Rendered => {}
        ViewerPhase::Error => {
            let message = controller
                .tree()
                .placeholder_texts()
                .first()
                .map(|text| (*text).to_owned())
                .unwrap_or_else(|| "viewer entered the error state".to_owned());
            anyhow::bail!("{message}");
        }
        phase => anyhow::bail!("viewer finished in unexpected phase {phase:?}"),
    }

    if controller.request().map(|request| request.kind) == Some(DocumentKind::Image) {
        // Images display directly; there is nothing to export.
        println!("image:{locator}");
        return Ok(());
    }

    let output_dir = output_dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let stem = locator_stem(locator);
    for surface in controller.tree().surfaces() {
        let output = output_dir.join(format!("{stem}-page-{}.png", surface.page_number));
        surface
            .image
            .save(&output)
            .with_context(|| format!("failed to write image to {}", output.display()))?;
        println!("{}", output.display());
    }

    Ok(())
}

fn run_info(locator: &str) -> Result<()> {
    let request = ViewerRequest::new(locator);

    let payload = match request.kind {
        DocumentKind::Image => InfoOutput {
            locator: locator.to_owned(),
            kind: request.kind,
            page_count: None,
            first_page_size_pt: None,
        },
        DocumentKind::PaginatedDocument => {
            let fetcher = HttpFetcher::new();
            let bytes = fetcher.fetch(locator).context("failed to fetch document")?;

            let mut engine = default_engine();
            let handle = engine.decode(bytes).context("failed to decode document")?;

            let page_count = engine.page_count(handle)?;
            let first_page_size_pt = if page_count > 0 {
                let size = engine.page_size(handle, 0)?;
                Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
            } else {
                None
            };

            engine.close(handle)?;

            InfoOutput {
                locator: locator.to_owned(),
                kind: request.kind,
                page_count: Some(page_count),
                first_page_size_pt,
            }
        }
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_theme(dark: bool, light: bool, toggle: bool) -> Result<()> {
    let path = prefs::preferences_path().context("no user config directory available")?;
    let current = prefs::load_theme(&path)?.unwrap_or_default();

    let updated = if dark {
        ThemePreference { dark_mode: true }
    } else if light {
        ThemePreference { dark_mode: false }
    } else if toggle {
        current.toggled()
    } else {
        current
    };

    if dark || light || toggle {
        prefs::save_theme(&path, updated)?;
    }

    let payload = ThemeOutput { dark_mode: updated.dark_mode, style_hook: updated.style_hook() };
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}

fn locator_stem(locator: &str) -> String {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);

    let stem = name.strip_suffix(".pdf").or_else(|| name.strip_suffix(".PDF")).unwrap_or(name);

    if stem.is_empty() {
        "document".to_owned()
    } else {
        stem.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_stem_strips_directories_and_extension() {
        assert_eq!(locator_stem("/certificates/CERTIFICATE.pdf"), "CERTIFICATE");
        assert_eq!(locator_stem("https://example.com/docs/cert.pdf?x=1"), "cert");
        assert_eq!(locator_stem("cert.pdf"), "cert");
        assert_eq!(locator_stem(""), "document");
    }
}
