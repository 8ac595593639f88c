//! Définition et implémentation des commandes CLI
//!
//! CLI simplifiée:
//! - commande par défaut: extraction de parcelles vers des fichiers GeoJSON
//! - `download`: téléchargement brut des fichiers cadastraux par commune

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use cadastre_fr::{download, Downloader};
use parcelex::{pipeline, ExtractionSpec};

#[derive(Subcommand)]
pub enum Commands {
    /// Download cadastre files from cadastre.data.gouv.fr (no extraction)
    Download {
        /// INSEE codes of the municipalities to download (comma separated)
        #[arg(short, long)]
        insee: String,

        /// Files to download (comma separated); if empty, download all published files
        #[arg(long)]
        files: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "var/download")]
        output: PathBuf,

        /// Keep the files compressed (.json.gz)
        #[arg(long)]
        no_decompress: bool,

        /// HTTP timeout in seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
}

/// Arguments de l'extraction (commande par défaut)
#[derive(Args)]
pub struct ExtractArgs {
    /// JSON file describing the parcels to extract
    #[arg(short, long)]
    pub spec: PathBuf,

    /// Output directory for the extraction .geojson files
    #[arg(short, long, default_value = "var/geojson")]
    pub output: PathBuf,

    /// Working directory for the downloaded commune files
    #[arg(long, default_value = "var/download")]
    pub work_dir: PathBuf,

    /// Maximum number of communes downloaded concurrently
    #[arg(long, alias = "threads")]
    pub jobs: Option<usize>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 120)]
    pub timeout: u64,

    /// Base URL of the cadastre source (défaut : cadastre.data.gouv.fr)
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Exécute la commande d'extraction
pub async fn cmd_extract(args: &ExtractArgs) -> Result<()> {
    let spec = ExtractionSpec::load(&args.spec)
        .with_context(|| format!("Failed to load extraction spec {}", args.spec.display()))?;

    if spec.is_empty() {
        anyhow::bail!("No extraction declared in {}", args.spec.display());
    }

    let jobs = args.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(4)
    });

    let mut downloader =
        Downloader::with_timeout(&args.work_dir, Duration::from_secs(args.timeout))?;
    if let Some(url) = &args.base_url {
        downloader = downloader.with_base_url(url);
    }

    println!("=== Extraction ===");
    println!("Spec: {}", args.spec.display());
    println!("Extractions: {}", spec.len());
    println!("Output: {}", args.output.display());
    println!("Jobs: {}", jobs);

    let started_at = std::time::Instant::now();
    let summary = pipeline::run(&spec, &downloader, &args.output, jobs).await?;
    let duration = started_at.elapsed();

    println!("\n=== Summary ===");
    println!("Communes: {}", summary.communes);
    println!("Feature lines read: {}", summary.lines_read);
    println!("Parcels matched: {}", summary.matched);
    println!("Duration: {:.2?}", duration);

    println!("\nPer-extraction:");
    for (name, records) in &summary.per_extraction {
        println!(
            "- {}: {} features → {}",
            name,
            records,
            args.output.join(format!("{name}.geojson")).display()
        );
    }

    info!(
        matched = summary.matched,
        extractions = summary.per_extraction.len(),
        "Extraction complete"
    );

    Ok(())
}

/// Exécute la commande download
pub async fn cmd_download(
    insee: &str,
    files: Option<&str>,
    output: &PathBuf,
    no_decompress: bool,
    timeout: u64,
) -> Result<()> {
    let codes = download::parse_insee_list(insee);
    if codes.is_empty() {
        anyhow::bail!("No valid INSEE codes provided (expected 5-digit codes)");
    }

    let filenames: Vec<&str> = files
        .map(|f| f.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let downloader = Downloader::with_timeout(output, Duration::from_secs(timeout))?;

    println!(
        "Downloading cadastre files for {} {}: {}",
        codes.len(),
        if codes.len() == 1 {
            "municipality"
        } else {
            "municipalities"
        },
        codes.join(", ")
    );

    for code in &codes {
        let paths = downloader
            .download_by_insee(code, &filenames, !no_decompress)
            .await
            .with_context(|| format!("Failed to download files for commune {code}"))?;

        for path in &paths {
            println!("- {}", path.display());
        }
    }

    Ok(())
}
