//! # Import Normalization
//!
//! Turns loosely typed import records (every column a string, the way a
//! CSV reader hands them over) into [`NewRace`] values the store can
//! insert. Coercion is lenient: a value that does not parse becomes `NULL`
//! instead of failing the import.

use crate::error::{Error, Result};
use crate::filter::extract_km_values;
use crate::json::parse_json;
use crate::model::{parse_loose_date, NewRace, Surface};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// One raw import record, keyed by the catalog's column names
///
/// Numbers and booleans in JSON seed files are accepted and read as text.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImportRecord {
    #[serde(deserialize_with = "loose_text")]
    pub race_name: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub race_url: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub date: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub location_city: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub location_country: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub region: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub distance_km: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub race_type: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub surface: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub elevation_profile: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub elevation_gain_m: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub certified: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub typical_weather: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub nearest_airport: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub registration_status: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub registration_open_date: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub registration_close_date: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub registration_process: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub fee_range_eur: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub geo_lat: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub geo_lon: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub image_url: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub image_thumb_url: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub sources_json: Option<String>,
    #[serde(deserialize_with = "loose_text")]
    pub tags_json: Option<String>,
}

fn loose_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn float(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().replace(',', ".").parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[allow(clippy::cast_possible_truncation)]
fn int(value: Option<&str>) -> Option<i64> {
    let raw = value?.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| float(Some(raw)).map(|f| f.round() as i64))
}

/// JSON text that parses as a list, else `"[]"`
fn json_list_text(value: Option<String>) -> String {
    text(value)
        .filter(|raw| parse_json::<Vec<Value>>(raw).is_ok())
        .unwrap_or_else(|| "[]".to_string())
}

impl ImportRecord {
    /// Normalize into an insertable race; `None` when the record has no name
    #[must_use]
    pub fn normalize(self) -> Option<NewRace> {
        let race_name = text(self.race_name)?;
        let distance_label = text(self.distance_km);
        let distances_km = distance_label
            .as_deref()
            .map(extract_km_values)
            .unwrap_or_default();

        Some(NewRace {
            race_url: text(self.race_url),
            race_name,
            date: self.date.as_deref().and_then(parse_loose_date),
            location_city: text(self.location_city),
            location_country: text(self.location_country),
            region: text(self.region),
            distances_km,
            distance_label,
            race_type: text(self.race_type).or_else(|| Some("road".to_string())),
            surface: self
                .surface
                .as_deref()
                .and_then(|s| s.parse::<Surface>().ok())
                .unwrap_or_default(),
            elevation_profile: text(self.elevation_profile),
            elevation_gain_m: int(self.elevation_gain_m.as_deref()),
            certified: self
                .certified
                .is_some_and(|c| c.trim().eq_ignore_ascii_case("true")),
            typical_weather: text(self.typical_weather),
            nearest_airport: text(self.nearest_airport),
            registration_status: text(self.registration_status),
            registration_open_date: text(self.registration_open_date),
            registration_close_date: text(self.registration_close_date),
            registration_process: text(self.registration_process),
            fee_range_eur: text(self.fee_range_eur),
            geo_lat: float(self.geo_lat.as_deref()),
            geo_lon: float(self.geo_lon.as_deref()),
            image_url: text(self.image_url),
            image_thumb_url: text(self.image_thumb_url),
            sources_json: json_list_text(self.sources_json),
            tags_json: json_list_text(self.tags_json),
        })
    }
}

/// Normalize a batch, dropping nameless records and repeated URLs
///
/// The first record for a URL wins.
#[must_use]
pub fn normalize_all(records: Vec<ImportRecord>) -> Vec<NewRace> {
    let total = records.len();
    let mut seen = std::collections::HashSet::new();
    let races: Vec<NewRace> = records
        .into_iter()
        .filter_map(ImportRecord::normalize)
        .filter(|race| race.race_url.as_ref().map_or(true, |url| seen.insert(url.clone())))
        .collect();

    if races.len() < total {
        warn!(skipped = total - races.len(), "Import records skipped");
    }
    races
}

/// Read a JSON array of import records and normalize it
///
/// # Errors
///
/// `Error::Io` if the file cannot be read, `Error::Serialization` if it is
/// not a JSON array of objects.
pub async fn load_json_file(path: impl AsRef<Path>) -> Result<Vec<NewRace>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(Error::from)?;
    let records: Vec<ImportRecord> = parse_json(&content)?;
    let races = normalize_all(records);
    info!(path = %path.display(), count = races.len(), "Seed file loaded");
    Ok(races)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(name: &str) -> ImportRecord {
        ImportRecord {
            race_name: Some(name.to_string()),
            ..ImportRecord::default()
        }
    }

    #[test]
    fn test_nameless_record_skipped() {
        assert!(record("  ").normalize().is_none());
        assert!(ImportRecord::default().normalize().is_none());
    }

    #[test]
    fn test_defaults() {
        let race = record("Milano Marathon").normalize().unwrap();
        assert_eq!(race.surface, Surface::Road);
        assert_eq!(race.race_type.as_deref(), Some("road"));
        assert!(!race.certified);
        assert_eq!(race.sources_json, "[]");
        assert_eq!(race.tags_json, "[]");
        assert!(race.distances_km.is_empty());
    }

    #[test]
    fn test_coercion() {
        let race = ImportRecord {
            date: Some("05/04/2026".into()),
            distance_km: Some("42,195 km / 10k".into()),
            surface: Some("Trail".into()),
            elevation_gain_m: Some("350.6".into()),
            certified: Some("TRUE".into()),
            geo_lat: Some("45.46".into()),
            geo_lon: Some("n/a".into()),
            sources_json: Some("[{\"name\":\"site\"}]".into()),
            tags_json: Some("{broken".into()),
            ..record("Test")
        }
        .normalize()
        .unwrap();

        assert_eq!(race.date, NaiveDate::from_ymd_opt(2026, 4, 5));
        assert_eq!(race.distances_km, vec![42.195, 10.0]);
        assert_eq!(race.primary_distance_km(), Some(42.195));
        assert_eq!(race.distance_label.as_deref(), Some("42,195 km / 10k"));
        assert_eq!(race.surface, Surface::Trail);
        assert_eq!(race.elevation_gain_m, Some(351));
        assert!(race.certified);
        assert_eq!(race.geo_lat, Some(45.46));
        assert_eq!(race.geo_lon, None);
        assert_eq!(race.sources_json, "[{\"name\":\"site\"}]");
        assert_eq!(race.tags_json, "[]");
    }

    #[test]
    fn test_unparseable_date_becomes_null() {
        let race = ImportRecord {
            date: Some("late spring".into()),
            ..record("Vague")
        }
        .normalize()
        .unwrap();
        assert_eq!(race.date, None);
    }

    #[test]
    fn test_json_numbers_read_as_text() {
        let records: Vec<ImportRecord> = parse_json(
            r#"[{"race_name": "Roma", "distance_km": 42.195, "certified": true, "geo_lat": 41.9, "geo_lon": null}]"#,
        )
        .unwrap();
        let race = records.into_iter().next().and_then(ImportRecord::normalize).unwrap();
        assert_eq!(race.distances_km, vec![42.195]);
        assert!(race.certified);
        assert_eq!(race.geo_lat, Some(41.9));
        assert_eq!(race.geo_lon, None);
    }

    #[test]
    fn test_duplicate_urls_keep_first() {
        let first = ImportRecord {
            race_url: Some("https://example.com/a".into()),
            ..record("First")
        };
        let second = ImportRecord {
            race_url: Some("https://example.com/a".into()),
            ..record("Second")
        };
        let races = normalize_all(vec![first, second, record("No url"), record("No url 2")]);
        let names: Vec<_> = races.iter().map(|r| r.race_name.as_str()).collect();
        assert_eq!(names, vec!["First", "No url", "No url 2"]);
    }

    #[tokio::test]
    async fn test_missing_seed_file_is_io_error() {
        let err = load_json_file("/nonexistent/runshift-seed.json").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_registration_and_image_fields_kept_as_text() {
        let records: Vec<ImportRecord> = parse_json(
            r#"[{"race_name": "Trail del Monte", "fee_range_eur": 45,
                 "registration_open_date": "2026-01-15", "registration_process": " online ",
                 "image_url": "", "image_thumb_url": "https://img.example.com/t.jpg"}]"#,
        )
        .unwrap();
        let race = normalize_all(records).remove(0);
        assert_eq!(race.fee_range_eur.as_deref(), Some("45"));
        assert_eq!(race.registration_open_date.as_deref(), Some("2026-01-15"));
        assert_eq!(race.registration_process.as_deref(), Some("online"));
        assert_eq!(race.image_url, None);
        assert_eq!(race.image_thumb_url.as_deref(), Some("https://img.example.com/t.jpg"));
    }
}
