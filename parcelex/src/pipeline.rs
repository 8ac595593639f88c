//! Pipeline d'extraction : routage en flux des parcelles vers les sorties
//!
//! Une passe : ouvrir toutes les sorties, puis pour chaque commune de
//! l'index télécharger le fichier "parcelles", le parcourir ligne à ligne
//! et router chaque parcelle demandée vers ses extractions, enfin refermer
//! toutes les sorties. Les fichiers amont sont trop volumineux pour être
//! chargés entiers : tout est flux, rien n'est relu.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use futures::{stream, StreamExt};
use thiserror::Error;
use tracing::{debug, info};

use cadastre_fr::record;
use cadastre_fr::{CadastreError, Downloader, SourceFile};

use crate::assemble::{AssembleError, OutputSet};
use crate::routing::RoutingIndex;
use crate::spec::ExtractionSpec;

/// Erreurs fatales du pipeline. Toute erreur interrompt la passe entière :
/// une sortie partielle serait du JSON valide mais incomplet, donc trompeur.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Téléchargement ou décompression du fichier d'une commune impossible
    #[error("Commune {commune}: {source}")]
    Fetch {
        commune: String,
        #[source]
        source: CadastreError,
    },

    /// Lecture du fichier source d'une commune impossible
    #[error("Commune {commune}: failed to read {path}: {source}")]
    Read {
        commune: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Écriture d'un fichier de sortie impossible
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// Fourniture du fichier "parcelles" décompressé d'une commune.
///
/// Couture entre le pipeline et le téléchargeur : les tests branchent ici
/// une source locale sans réseau.
#[allow(async_fn_in_trait)]
pub trait ParcelSource {
    async fn fetch(&self, insee: &str) -> Result<SourceFile, CadastreError>;
}

impl ParcelSource for Downloader {
    async fn fetch(&self, insee: &str) -> Result<SourceFile, CadastreError> {
        self.fetch_parcelles(insee).await
    }
}

/// Bilan d'une passe d'extraction
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Communes parcourues
    pub communes: usize,

    /// Lignes de Feature lues (toutes communes)
    pub lines_read: u64,

    /// Parcelles appariées à au moins une extraction
    pub matched: u64,

    /// Lignes ignorées : sans correspondance ou inclassables
    pub skipped: u64,

    /// Enregistrements écrits par extraction, dans l'ordre de déclaration
    pub per_extraction: Vec<(String, u64)>,
}

/// Exécute une passe d'extraction complète.
///
/// Les sorties sont toutes ouvertes avant le premier téléchargement : une
/// extraction sans aucune correspondance produit quand même un fichier
/// valide à `features` vides. Les téléchargements sont préchargés en
/// parallèle borné (`jobs`) ; le routage consomme dans l'ordre des communes,
/// chaque fichier de sortie n'a donc qu'un seul écrivain.
pub async fn run<S: ParcelSource>(
    spec: &ExtractionSpec,
    source: &S,
    output_dir: &Path,
    jobs: usize,
) -> Result<RunSummary, PipelineError> {
    let index = RoutingIndex::build(spec);
    let mut outputs = OutputSet::create(output_dir)?;

    for name in spec.names() {
        outputs.open(name)?;
    }

    let communes: Vec<&str> = index.communes().collect();
    let mut summary = RunSummary {
        communes: communes.len(),
        ..Default::default()
    };

    info!(
        extractions = spec.len(),
        communes = communes.len(),
        parcels = index.len(),
        "Starting extraction run"
    );

    let fetches = stream::iter(
        communes
            .into_iter()
            .map(|insee| async move { (insee, source.fetch(insee).await) }),
    )
    .buffered(jobs.max(1));
    futures::pin_mut!(fetches);

    while let Some((insee, fetched)) = fetches.next().await {
        let source_file = fetched.map_err(|e| PipelineError::Fetch {
            commune: insee.to_string(),
            source: e,
        })?;

        route_commune(insee, source_file.path(), &index, &mut outputs, &mut summary)?;

        // Le drop du SourceFile supprime l'archive et le fichier décompressé
    }

    outputs.close_all()?;

    for name in spec.names() {
        summary
            .per_extraction
            .push((name.to_string(), outputs.records(name).unwrap_or(0)));
    }

    info!(
        matched = summary.matched,
        lines = summary.lines_read,
        "Extraction run complete"
    );

    Ok(summary)
}

/// Parcourt le fichier "parcelles" d'une commune et route chaque parcelle
/// demandée vers ses extractions.
fn route_commune(
    insee: &str,
    path: &Path,
    index: &RoutingIndex,
    outputs: &mut OutputSet,
    summary: &mut RunSummary,
) -> Result<(), PipelineError> {
    let read_err = |source| PipelineError::Read {
        commune: insee.to_string(),
        path: path.display().to_string(),
        source,
    };

    let file = File::open(path).map_err(read_err)?;
    let mut lines = BufReader::new(file).lines();

    // Première ligne : l'ouverture de la FeatureCollection
    if lines.next().transpose().map_err(read_err)?.is_none() {
        info!(insee, "Empty source file");
        return Ok(());
    }

    info!(insee, "Routing parcels");

    for line in lines {
        let line = line.map_err(read_err)?;
        summary.lines_read += 1;

        // Ligne de fermeture du fichier, ou identifiant inexploitable :
        // on passe, ce n'est pas une erreur
        let Some(id) = record::parse_feature_line(&line) else {
            summary.skipped += 1;
            continue;
        };

        let Some(names) = index.lookup(insee, &id.section, &id.parcel) else {
            summary.skipped += 1;
            continue;
        };

        debug!(
            insee,
            section = %id.section,
            parcel = %id.parcel,
            outputs = names.len(),
            "Matched parcel"
        );

        let feature = record::trim_feature_line(&line);
        for name in names {
            outputs.append(name, feature)?;
        }
        summary.matched += 1;
    }

    Ok(())
}
