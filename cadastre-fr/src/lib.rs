//! # cadastre-fr
//!
//! Accès aux données cadastrales GeoJSON publiées par Etalab sur
//! `cadastre.data.gouv.fr`.
//!
//! ## Features
//!
//! - Téléchargement par code INSEE des fichiers publiés par commune
//! - Décompression gzip avec nettoyage garanti des artefacts
//! - Lecture du format newline-delimited GeoJSON des fichiers "parcelles"
//! - Décomposition des identifiants de parcelle (section, numéro)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cadastre_fr::Downloader;
//!
//! let downloader = Downloader::new("var/download")?;
//! let source = downloader.fetch_parcelles("26065").await?;
//! // ... lire source.path() ligne par ligne ...
//! // au drop de `source`, l'archive et le fichier décompressé sont supprimés
//! ```

pub mod download;
pub mod error;
pub mod record;

pub use download::{Downloader, SourceFile, AVAILABLE_FILENAMES, CADASTRE_BASE_URL};
pub use error::CadastreError;
pub use record::{ParcelId, FEATURE_COLLECTION_HEADER};
