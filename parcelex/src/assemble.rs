//! Assemblage incrémental des FeatureCollection de sortie
//!
//! Un fichier par extraction, écrit en streaming : l'en-tête à l'ouverture,
//! une ligne par enregistrement apparié, le pied à la fermeture. La virgule
//! de séparation est émise avant chaque enregistrement sauf le premier —
//! jamais retirée après coup, le fichier déjà écrit n'est pas relu. Le JSON
//! est valide à la fermeture quel que soit le nombre d'enregistrements,
//! zéro compris.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use cadastre_fr::FEATURE_COLLECTION_HEADER;

/// Erreurs d'assemblage des fichiers de sortie
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Échec d'écriture sur le système de fichiers
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Nom d'extraction jamais ouvert
    #[error("No output opened for extraction '{0}'")]
    UnknownOutput(String),

    /// Deux ouvertures pour le même nom dans la même passe
    #[error("Output for extraction '{0}' is already open")]
    AlreadyOpen(String),

    /// Écriture après fermeture
    #[error("Output for extraction '{0}' is already closed")]
    Closed(String),
}

struct OutputFile {
    path: PathBuf,
    /// `None` une fois le pied écrit
    writer: Option<BufWriter<File>>,
    records: u64,
}

/// L'ensemble des fichiers de sortie d'une passe, un par extraction.
///
/// Possédé explicitement par l'orchestrateur (pas d'état global) : plusieurs
/// passes indépendantes peuvent coexister dans le même processus. Seul
/// écrivain de chaque fichier.
pub struct OutputSet {
    output_dir: PathBuf,
    files: HashMap<String, OutputFile>,
}

impl OutputSet {
    /// Prépare un ensemble de sorties sous `output_dir` (créé au besoin)
    pub fn create(output_dir: impl Into<PathBuf>) -> Result<Self, AssembleError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|e| io_err(&output_dir, e))?;

        Ok(Self {
            output_dir,
            files: HashMap::new(),
        })
    }

    /// Crée (ou tronque) `<output_dir>/<name>.geojson` et écrit l'en-tête
    /// de la FeatureCollection. À appeler avant tout `append` pour ce nom.
    pub fn open(&mut self, name: &str) -> Result<(), AssembleError> {
        if self.files.contains_key(name) {
            return Err(AssembleError::AlreadyOpen(name.to_string()));
        }

        let path = self.output_dir.join(format!("{name}.geojson"));
        let file = File::create(&path).map_err(|e| io_err(&path, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(FEATURE_COLLECTION_HEADER.as_bytes())
            .map_err(|e| io_err(&path, e))?;

        debug!(name, path = %path.display(), "Opened output file");

        self.files.insert(
            name.to_string(),
            OutputFile {
                path,
                writer: Some(writer),
                records: 0,
            },
        );

        Ok(())
    }

    /// Ajoute une ligne de Feature (sans séparateur de fin) au fichier de
    /// l'extraction. Le séparateur d'éléments est écrit avant chaque
    /// enregistrement sauf le premier.
    pub fn append(&mut self, name: &str, line: &str) -> Result<(), AssembleError> {
        let file = self
            .files
            .get_mut(name)
            .ok_or_else(|| AssembleError::UnknownOutput(name.to_string()))?;

        let writer = file
            .writer
            .as_mut()
            .ok_or_else(|| AssembleError::Closed(name.to_string()))?;

        let separator = if file.records == 0 { "\n" } else { ",\n" };
        let path = &file.path;
        writer
            .write_all(separator.as_bytes())
            .and_then(|_| writer.write_all(line.as_bytes()))
            .map_err(|e| io_err(path, e))?;

        file.records += 1;
        Ok(())
    }

    /// Écrit le pied refermant le tableau `features` et l'objet, puis flush.
    /// Fermer un fichier déjà fermé est sans effet.
    pub fn close(&mut self, name: &str) -> Result<(), AssembleError> {
        let file = self
            .files
            .get_mut(name)
            .ok_or_else(|| AssembleError::UnknownOutput(name.to_string()))?;

        let Some(mut writer) = file.writer.take() else {
            return Ok(());
        };

        writer
            .write_all(b"\n]}")
            .and_then(|_| writer.flush())
            .map_err(|e| io_err(&file.path, e))?;

        debug!(name, records = file.records, "Closed output file");
        Ok(())
    }

    /// Ferme tous les fichiers encore ouverts
    pub fn close_all(&mut self) -> Result<(), AssembleError> {
        let names: Vec<String> = self.files.keys().cloned().collect();
        for name in names {
            self.close(&name)?;
        }
        Ok(())
    }

    /// Nombre d'enregistrements écrits pour une extraction
    pub fn records(&self, name: &str) -> Option<u64> {
        self.files.get(name).map(|f| f.records)
    }

    /// Chemin du fichier d'une extraction
    pub fn path(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(|f| f.path.as_path())
    }
}

fn io_err(path: &Path, source: std::io::Error) -> AssembleError {
    AssembleError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("parcelex_assemble_{tag}"));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    fn read_features(path: &Path) -> Vec<serde_json::Value> {
        let content = std::fs::read_to_string(path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(doc["type"], "FeatureCollection");
        doc["features"].as_array().unwrap().clone()
    }

    #[test]
    fn test_zero_records_is_valid_json() {
        let dir = scratch_dir("empty");
        let mut outputs = OutputSet::create(&dir).unwrap();
        outputs.open("empty").unwrap();
        outputs.close("empty").unwrap();

        let features = read_features(&dir.join("empty.geojson"));
        assert!(features.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_one_and_many_records() {
        let dir = scratch_dir("records");
        let mut outputs = OutputSet::create(&dir).unwrap();
        outputs.open("one").unwrap();
        outputs.open("many").unwrap();

        outputs
            .append("one", r#"{"type":"Feature","id":"260650000B0132"}"#)
            .unwrap();
        for i in 0..5 {
            outputs
                .append("many", &format!(r#"{{"type":"Feature","id":"{i}"}}"#))
                .unwrap();
        }
        outputs.close_all().unwrap();

        assert_eq!(read_features(&dir.join("one.geojson")).len(), 1);
        assert_eq!(read_features(&dir.join("many.geojson")).len(), 5);
        assert_eq!(outputs.records("many"), Some(5));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = scratch_dir("idempotent");
        let mut outputs = OutputSet::create(&dir).unwrap();
        outputs.open("x").unwrap();
        outputs.close("x").unwrap();
        outputs.close("x").unwrap();
        outputs.close_all().unwrap();

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_append_after_close_fails() {
        let dir = scratch_dir("closed");
        let mut outputs = OutputSet::create(&dir).unwrap();
        outputs.open("x").unwrap();
        outputs.close("x").unwrap();

        let err = outputs.append("x", "{}").unwrap_err();
        assert!(matches!(err, AssembleError::Closed(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_and_duplicate_names() {
        let dir = scratch_dir("names");
        let mut outputs = OutputSet::create(&dir).unwrap();

        assert!(matches!(
            outputs.append("nope", "{}"),
            Err(AssembleError::UnknownOutput(_))
        ));

        outputs.open("x").unwrap();
        assert!(matches!(
            outputs.open("x"),
            Err(AssembleError::AlreadyOpen(_))
        ));

        outputs.close_all().unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }
}
