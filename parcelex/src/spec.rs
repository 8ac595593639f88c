//! Spécification d'extraction : quelles parcelles extraire, vers quels fichiers
//!
//! Document JSON organisé ainsi (un fichier de sortie par clé de premier
//! niveau) :
//!
//! ```json
//! {
//!   "my-extraction": {
//!     "insee": {
//!       "12345": { "AB": [123, 456], "CD": [789] },
//!       "67890": { "EF": [123] }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use thiserror::Error;

/// Erreurs de forme de la spécification d'extraction.
/// Toutes sont fatales : rien n'est téléchargé tant que le document est invalide.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Lecture du fichier impossible
    #[error("Failed to read spec file: {0}")]
    Io(#[from] std::io::Error),

    /// JSON invalide, clé `insee` manquante ou nom d'extraction en double
    #[error("Invalid spec document: {0}")]
    Parse(#[from] serde_json::Error),

    /// Nom d'extraction vide
    #[error("Extraction names must not be empty")]
    EmptyName,

    /// Code commune invalide (1 à 5 chiffres attendus)
    #[error("Extraction '{name}': '{commune}' is not a valid INSEE code")]
    BadCommune { name: String, commune: String },

    /// Liste de parcelles vide pour une section
    #[error("Extraction '{name}': empty parcel list for {commune}/{section}")]
    EmptyParcels {
        name: String,
        commune: String,
        section: String,
    },
}

/// Parcelles demandées dans une commune : code section → numéros de parcelle
pub type SectionMap = BTreeMap<String, Vec<String>>;

/// Une extraction nommée : produit exactement un fichier `<name>.geojson`
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Nom de l'extraction, unique dans la spécification
    pub name: String,

    /// Code INSEE (normalisé sur 5 caractères) → sections demandées
    pub communes: BTreeMap<String, SectionMap>,
}

/// Spécification complète d'une passe d'extraction, immuable une fois chargée.
/// L'ordre de déclaration des extractions est conservé.
#[derive(Debug, Clone)]
pub struct ExtractionSpec {
    extractions: Vec<Extraction>,
}

impl ExtractionSpec {
    /// Charge une spécification depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self, SpecError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse une spécification depuis une chaîne JSON
    pub fn from_json(json: &str) -> Result<Self, SpecError> {
        let raw: RawSpec = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSpec) -> Result<Self, SpecError> {
        let mut extractions = Vec::with_capacity(raw.0.len());

        for (name, entry) in raw.0 {
            if name.trim().is_empty() {
                return Err(SpecError::EmptyName);
            }

            let mut communes = BTreeMap::new();
            for (commune, sections) in entry.insee {
                let commune = normalize_commune(&commune).ok_or_else(|| {
                    SpecError::BadCommune {
                        name: name.clone(),
                        commune: commune.clone(),
                    }
                })?;

                let mut section_map = SectionMap::new();
                for (section, parcels) in sections {
                    if parcels.is_empty() {
                        return Err(SpecError::EmptyParcels {
                            name: name.clone(),
                            commune,
                            section,
                        });
                    }
                    section_map.insert(
                        section,
                        parcels.into_iter().map(RawParcel::into_string).collect(),
                    );
                }
                communes.insert(commune, section_map);
            }

            extractions.push(Extraction { name, communes });
        }

        Ok(Self { extractions })
    }

    /// Extractions dans l'ordre de déclaration
    pub fn extractions(&self) -> &[Extraction] {
        &self.extractions
    }

    /// Noms des extractions dans l'ordre de déclaration
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.extractions.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.extractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractions.is_empty()
    }
}

/// Normalise un code commune vers sa forme canonique sur 5 caractères
/// (complété par des zéros de tête : `1234` → `01234`)
fn normalize_commune(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() || code.len() > 5 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>5}", code))
}

/// Un numéro de parcelle peut être écrit comme nombre JSON ou comme chaîne
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawParcel {
    Number(u64),
    Text(String),
}

impl RawParcel {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    insee: BTreeMap<String, BTreeMap<String, Vec<RawParcel>>>,
}

/// Couche brute du document : map ordonnée nom → extraction.
/// Désérialisation manuelle pour conserver l'ordre de déclaration et
/// rejeter les noms en double (serde_json garde silencieusement le dernier).
struct RawSpec(Vec<(String, RawExtraction)>);

impl<'de> Deserialize<'de> for RawSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = RawSpec;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of extraction names to extraction entries")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, RawExtraction)> = Vec::new();

                while let Some((name, entry)) = map.next_entry::<String, RawExtraction>()? {
                    if entries.iter().any(|(n, _)| *n == name) {
                        return Err(de::Error::custom(format!(
                            "duplicate extraction name: {name}"
                        )));
                    }
                    entries.push((name, entry));
                }

                Ok(RawSpec(entries))
            }
        }

        deserializer.deserialize_map(SpecVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "my-extraction": {
            "insee": {
                "12345": { "AB": [123, 456], "CD": [789] },
                "67890": { "EF": ["123"] }
            }
        },
        "other": {
            "insee": { "1234": { "B": [7] } }
        }
    }"#;

    #[test]
    fn test_load_valid_spec() {
        let spec = ExtractionSpec::from_json(VALID).unwrap();
        assert_eq!(spec.len(), 2);

        // Ordre de déclaration conservé
        let names: Vec<_> = spec.names().collect();
        assert_eq!(names, vec!["my-extraction", "other"]);

        let first = &spec.extractions()[0];
        assert_eq!(
            first.communes["12345"]["AB"],
            vec!["123".to_string(), "456".to_string()]
        );
    }

    #[test]
    fn test_commune_zero_padded() {
        let spec = ExtractionSpec::from_json(VALID).unwrap();
        assert!(spec.extractions()[1].communes.contains_key("01234"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let json = r#"{
            "dup": { "insee": { "12345": { "A": [1] } } },
            "dup": { "insee": { "12345": { "B": [2] } } }
        }"#;
        let err = ExtractionSpec::from_json(json).unwrap_err();
        assert!(matches!(err, SpecError::Parse(_)));
        assert!(err.to_string().contains("duplicate extraction name"));
    }

    #[test]
    fn test_missing_insee_key() {
        let json = r#"{ "my-extraction": { "communes": {} } }"#;
        assert!(matches!(
            ExtractionSpec::from_json(json),
            Err(SpecError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_parcel_list() {
        let json = r#"{ "my-extraction": { "insee": { "12345": { "AB": [] } } } }"#;
        assert!(matches!(
            ExtractionSpec::from_json(json),
            Err(SpecError::EmptyParcels { .. })
        ));
    }

    #[test]
    fn test_empty_name() {
        let json = r#"{ "  ": { "insee": { "12345": { "AB": [1] } } } }"#;
        assert!(matches!(
            ExtractionSpec::from_json(json),
            Err(SpecError::EmptyName)
        ));
    }

    #[test]
    fn test_bad_commune_code() {
        let json = r#"{ "x": { "insee": { "26A65": { "AB": [1] } } } }"#;
        assert!(matches!(
            ExtractionSpec::from_json(json),
            Err(SpecError::BadCommune { .. })
        ));
    }
}
