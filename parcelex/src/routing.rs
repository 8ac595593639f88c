//! Index de routage : inversion de la spécification d'extraction
//!
//! La spécification est déclarée par extraction ; le pipeline a besoin de
//! l'inverse : pour une parcelle donnée, vers quelles extractions router ?
//! Une même parcelle peut alimenter plusieurs extractions (fan-out).

use std::collections::{BTreeSet, HashMap};

use cadastre_fr::record::strip_leading_zeros;

use crate::spec::ExtractionSpec;

/// Index dérivé, en lecture seule, construit une fois par passe.
///
/// Map plate sur clé composite `commune/section/parcelle` (section et
/// parcelle normalisées, zéros de tête retirés) → noms d'extraction dans
/// l'ordre de première apparition dans la spécification.
#[derive(Debug, Default)]
pub struct RoutingIndex {
    entries: HashMap<String, Vec<String>>,
    communes: BTreeSet<String>,
}

impl RoutingIndex {
    /// Inverse la spécification. Transformation pure et déterministe,
    /// aucun accès réseau ni disque.
    pub fn build(spec: &ExtractionSpec) -> Self {
        let mut index = Self::default();

        for extraction in spec.extractions() {
            for (commune, sections) in &extraction.communes {
                index.communes.insert(commune.clone());

                for (section, parcels) in sections {
                    for parcel in parcels {
                        let key = Self::key(
                            commune,
                            strip_leading_zeros(section),
                            strip_leading_zeros(parcel),
                        );
                        let names = index.entries.entry(key).or_default();
                        if !names.iter().any(|n| n == &extraction.name) {
                            names.push(extraction.name.clone());
                        }
                    }
                }
            }
        }

        index
    }

    fn key(commune: &str, section: &str, parcel: &str) -> String {
        format!("{commune}/{section}/{parcel}")
    }

    /// Extractions demandant cette parcelle.
    /// `section` et `parcel` doivent être déjà normalisés.
    pub fn lookup(&self, commune: &str, section: &str, parcel: &str) -> Option<&[String]> {
        self.entries
            .get(&Self::key(commune, section, parcel))
            .map(Vec::as_slice)
    }

    /// Codes INSEE distincts référencés, triés
    pub fn communes(&self) -> impl Iterator<Item = &str> {
        self.communes.iter().map(String::as_str)
    }

    /// Nombre de triplets (commune, section, parcelle) indexés
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(json: &str) -> ExtractionSpec {
        ExtractionSpec::from_json(json).unwrap()
    }

    #[test]
    fn test_inversion() {
        let index = RoutingIndex::build(&spec(
            r#"{
                "my-extraction": {
                    "insee": {
                        "12345": { "AB": [123, 456], "CD": [789] },
                        "67890": { "EF": [123] }
                    }
                }
            }"#,
        ));

        // Chaque triplet de la spec, et rien d'autre
        assert_eq!(index.len(), 4);
        assert_eq!(
            index.lookup("12345", "AB", "123"),
            Some(&["my-extraction".to_string()][..])
        );
        assert_eq!(
            index.lookup("12345", "AB", "456"),
            Some(&["my-extraction".to_string()][..])
        );
        assert_eq!(
            index.lookup("12345", "CD", "789"),
            Some(&["my-extraction".to_string()][..])
        );
        assert_eq!(
            index.lookup("67890", "EF", "123"),
            Some(&["my-extraction".to_string()][..])
        );
        assert_eq!(index.lookup("12345", "AB", "789"), None);
    }

    #[test]
    fn test_fan_out_first_seen_order() {
        let index = RoutingIndex::build(&spec(
            r#"{
                "second": { "insee": { "26065": { "B": [132] } } },
                "first":  { "insee": { "26065": { "B": [132, 133] } } }
            }"#,
        ));

        // L'ordre suit la déclaration dans la spec, pas l'alphabet
        assert_eq!(
            index.lookup("26065", "B", "132"),
            Some(&["second".to_string(), "first".to_string()][..])
        );
        assert_eq!(
            index.lookup("26065", "B", "133"),
            Some(&["first".to_string()][..])
        );
    }

    #[test]
    fn test_spec_side_normalization() {
        // Les zéros de tête côté spec ne comptent pas non plus
        let index = RoutingIndex::build(&spec(
            r#"{ "x": { "insee": { "26065": { "0B": ["0132"] } } } }"#,
        ));
        assert!(index.lookup("26065", "B", "132").is_some());
    }

    #[test]
    fn test_duplicate_triple_in_one_extraction() {
        let index = RoutingIndex::build(&spec(
            r#"{ "x": { "insee": { "26065": { "B": [132, "132"] } } } }"#,
        ));
        assert_eq!(
            index.lookup("26065", "B", "132"),
            Some(&["x".to_string()][..])
        );
    }

    #[test]
    fn test_communes_sorted_distinct() {
        let index = RoutingIndex::build(&spec(
            r#"{
                "a": { "insee": { "67890": { "A": [1] }, "12345": { "B": [2] } } },
                "b": { "insee": { "12345": { "C": [3] } } }
            }"#,
        ));
        let communes: Vec<_> = index.communes().collect();
        assert_eq!(communes, vec!["12345", "67890"]);
    }
}
