//! Types d'erreurs pour le crate cadastre-fr

use thiserror::Error;

/// Erreurs pouvant survenir lors du téléchargement ou de la lecture
/// des données cadastrales
#[derive(Debug, Error)]
pub enum CadastreError {
    /// Erreur d'I/O locale (création de répertoire, écriture de fichier)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur de transport HTTP (connexion, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// La ressource distante a répondu avec un statut non-succès
    #[error("Download failed for {url}: HTTP {status}")]
    Download { url: String, status: u16 },

    /// Le contenu téléchargé n'est pas du gzip valide
    #[error("Decompression failed for {path}: {reason}")]
    Decompression { path: String, reason: String },

    /// Nom de fichier cadastral inconnu (voir `AVAILABLE_FILENAMES`)
    #[error("Unknown cadastre filename: {0}")]
    UnknownFilename(String),
}

impl CadastreError {
    /// Crée une erreur de téléchargement avec le statut HTTP
    pub fn download(url: impl Into<String>, status: u16) -> Self {
        Self::Download {
            url: url.into(),
            status,
        }
    }

    /// Crée une erreur de décompression avec contexte
    pub fn decompression(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decompression {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
