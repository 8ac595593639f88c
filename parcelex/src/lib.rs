//! # parcelex
//!
//! Extraction de parcelles cadastrales en GeoJSON depuis les fichiers
//! par commune publiés sur `cadastre.data.gouv.fr`.
//!
//! ## Features
//!
//! - Spécification déclarative : nom d'extraction → commune → section → parcelles
//! - Une parcelle peut alimenter plusieurs extractions (fan-out)
//! - Fichiers amont parcourus en flux, jamais chargés entiers
//! - Sorties GeoJSON valides quel que soit le nombre de correspondances
//! - Téléchargements par commune en parallèle borné
//!
//! ## Usage CLI
//!
//! ```bash
//! # Extraction (commande par défaut)
//! parcelex --spec extractions.json --output var/geojson
//!
//! # Téléchargement brut des fichiers cadastraux d'une ou plusieurs communes
//! parcelex download --insee 26065,39001 --files parcelles,sections
//! ```

pub mod assemble;
pub mod pipeline;
pub mod routing;
pub mod spec;

pub use assemble::OutputSet;
pub use pipeline::{ParcelSource, RunSummary};
pub use routing::RoutingIndex;
pub use spec::{ExtractionSpec, SpecError};
