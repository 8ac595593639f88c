//! Lecture des fichiers "parcelles" newline-delimited GeoJSON d'Etalab
//!
//! Format amont : la première ligne est l'ouverture de la FeatureCollection,
//! chaque ligne suivante contient une Feature complète suivie d'une virgule,
//! et la dernière ligne referme le tableau et l'objet.

use serde::Deserialize;

/// Première ligne d'un fichier "parcelles" (littéral identique pour les
/// fichiers produits en sortie)
pub const FEATURE_COLLECTION_HEADER: &str = r#"{"type": "FeatureCollection","features": ["#;

/// Identifiant de parcelle décomposé depuis l'id 14 caractères
///
/// Eg : `260650000B0132` → commune+préfixe `26065000`, section `0B`,
/// parcelle `0132`. La commune est connue par ailleurs (un fichier amont
/// par commune) ; seules section et parcelle servent au classement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParcelId {
    /// Identifiant brut, 14 caractères
    pub raw: String,

    /// Code section normalisé : `0B` → `B` (mais `10` reste `10`)
    pub section: String,

    /// Numéro de parcelle normalisé : `0132` → `132`
    pub parcel: String,
}

impl ParcelId {
    /// Décompose un identifiant 14 caractères.
    ///
    /// Retourne `None` si l'identifiant n'a pas exactement 14 caractères
    /// ASCII : l'enregistrement est alors inclassable, pas une erreur.
    pub fn parse(id: &str) -> Option<Self> {
        if id.len() != 14 || !id.is_ascii() {
            return None;
        }

        Some(Self {
            raw: id.to_string(),
            section: strip_leading_zeros(&id[8..10]).to_string(),
            parcel: strip_leading_zeros(&id[10..14]).to_string(),
        })
    }
}

#[derive(Deserialize)]
struct FeatureId {
    id: String,
}

/// Retire les blancs de fin et le séparateur (virgule) d'une ligne de Feature
pub fn trim_feature_line(line: &str) -> &str {
    line.trim_end().trim_end_matches(',')
}

/// Extrait l'identifiant de parcelle d'une ligne de Feature.
///
/// La ligne est parsée comme un objet JSON autonome et l'`id` lu par clé,
/// plutôt qu'à offset d'octets fixe : l'extraction ne dépend pas de l'ordre
/// exact des champs dans le fichier amont. Une ligne qui ne parse pas (la
/// ligne de fermeture `]}`, une ligne tronquée) donne `None`.
pub fn parse_feature_line(line: &str) -> Option<ParcelId> {
    let feature: FeatureId = serde_json::from_str(trim_feature_line(line)).ok()?;
    ParcelId::parse(&feature.id)
}

/// Retire les zéros de tête (`0B` → `B`, `0132` → `132`)
pub fn strip_leading_zeros(s: &str) -> &str {
    s.trim_start_matches('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = ParcelId::parse("260650000B0132").unwrap();
        assert_eq!(id.raw, "260650000B0132");
        assert_eq!(id.section, "B");
        assert_eq!(id.parcel, "132");
    }

    #[test]
    fn test_parse_id_numeric_section_not_stripped_right() {
        // Seuls les zéros de tête sont retirés: la section "10" reste "10"
        let id = ParcelId::parse("26065000100132").unwrap();
        assert_eq!(id.section, "10");
    }

    #[test]
    fn test_parse_id_short_or_invalid() {
        assert!(ParcelId::parse("26065").is_none());
        assert!(ParcelId::parse("").is_none());
        assert!(ParcelId::parse("260650000B01325").is_none());
        assert!(ParcelId::parse("2606500Bé01325").is_none());
    }

    #[test]
    fn test_strip_leading_zeros() {
        assert_eq!(strip_leading_zeros("0B"), "B");
        assert_eq!(strip_leading_zeros("0132"), "132");
        assert_eq!(strip_leading_zeros("10"), "10");
        assert_eq!(strip_leading_zeros("B"), "B");
    }

    #[test]
    fn test_parse_feature_line() {
        let line = r#"{"type":"Feature","id":"260650000B0132","geometry":{"type":"Polygon","coordinates":[]},"properties":{"commune":"26065"}},"#;
        let id = parse_feature_line(line).unwrap();
        assert_eq!(id.section, "B");
        assert_eq!(id.parcel, "132");
    }

    #[test]
    fn test_parse_feature_line_id_not_first_field() {
        // L'id peut apparaître n'importe où dans l'objet
        let line = r#"{"type":"Feature","properties":{},"id":"260650000B0132"}"#;
        assert!(parse_feature_line(line).is_some());
    }

    #[test]
    fn test_parse_feature_line_unclassifiable() {
        assert!(parse_feature_line("]}").is_none());
        assert!(parse_feature_line(r#"{"type":"Feature","id":"short"},"#).is_none());
        assert!(parse_feature_line("not json at all").is_none());
    }

    #[test]
    fn test_trim_feature_line() {
        assert_eq!(trim_feature_line("{\"a\":1},\n"), "{\"a\":1}");
        assert_eq!(trim_feature_line("{\"a\":1}"), "{\"a\":1}");
    }
}
