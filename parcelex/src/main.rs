//! Point d'entrée CLI pour parcelex

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::{Commands, ExtractArgs};

/// Extraire des parcelles cadastrales en GeoJSON depuis cadastre.data.gouv.fr
#[derive(Parser)]
#[command(name = "parcelex")]
#[command(author, version)]
#[command(about = "Extraire des parcelles cadastrales en GeoJSON depuis cadastre.data.gouv.fr")]
#[command(
    long_about = "Télécharge les fichiers \"parcelles\" par commune publiés par Etalab et en extrait les parcelles demandées vers un fichier GeoJSON par extraction.\n\nPar défaut, lance une extraction. Utilisez 'download' pour télécharger les fichiers bruts."
)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: extraction)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments de l'extraction (commande par défaut)
    #[command(flatten)]
    extract: Option<ExtractArgs>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Download {
            insee,
            files,
            output,
            no_decompress,
            timeout,
        }) => {
            info!(insee = %insee, output = %output.display(), "Téléchargement des fichiers cadastraux");
            cli::cmd_download(&insee, files.as_deref(), &output, no_decompress, timeout).await?;
        }
        None => {
            // Commande par défaut: extraction
            let args = cli.extract.expect("Arguments d'extraction requis (--spec)");
            info!(spec = %args.spec.display(), output = %args.output.display(), "Extraction de parcelles");
            cli::cmd_extract(&args).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
