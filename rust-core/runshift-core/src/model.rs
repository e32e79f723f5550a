//! # Race Data Model
//!
//! Stored row shape (`RaceRow`), import shape (`NewRace`), and the small
//! enumerations shared by the filter builder and the importer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Course surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    /// Paved road
    #[default]
    Road,
    /// Trail / off-road
    Trail,
    /// Mix of road and trail
    Mixed,
}

impl Surface {
    /// Stored column value
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Road => "road",
            Self::Trail => "trail",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "road" | "asphalt" => Ok(Self::Road),
            "trail" | "off-road" => Ok(Self::Trail),
            "mixed" => Ok(Self::Mixed),
            _ => Err(()),
        }
    }
}

/// Parse a calendar date from loosely formatted text
///
/// Accepts `YYYY-MM-DD`, an ISO datetime starting with one, or `DD/MM/YYYY`.
#[must_use]
pub fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
}

/// Case-folded copy of a searchable text column
///
/// Substring filters compare folded needles against folded `search_*`
/// columns, so matching does not depend on the backend's `LOWER()`.
#[must_use]
pub fn fold_search(text: &str) -> String {
    text.trim().to_lowercase()
}

/// One row of the `races` table as read by the search path
///
/// `date` is selected as text so decoding can never fail on a
/// malformed stored value; the projector normalizes it. Fields mirror
/// the table columns.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct RaceRow {
    pub id: i64,
    pub race_url: Option<String>,
    pub race_name: Option<String>,
    pub date: Option<String>,
    pub location_city: Option<String>,
    pub location_country: Option<String>,
    pub region: Option<String>,
    pub distance_km: Option<f64>,
    pub distance_label: Option<String>,
    pub race_type: Option<String>,
    pub surface: Option<String>,
    pub elevation_profile: Option<String>,
    pub elevation_gain_m: Option<i64>,
    pub certified: Option<bool>,
    pub typical_weather: Option<String>,
    pub nearest_airport: Option<String>,
    pub registration_status: Option<String>,
    pub registration_open_date: Option<String>,
    pub registration_close_date: Option<String>,
    pub registration_process: Option<String>,
    pub fee_range_eur: Option<String>,
    pub geo_lat: Option<f64>,
    pub geo_lon: Option<f64>,
    pub image_url: Option<String>,
    pub image_thumb_url: Option<String>,
    pub sources_json: Option<String>,
    pub tags_json: Option<String>,
}

/// Normalized record ready for insertion
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRace {
    pub race_url: Option<String>,
    pub race_name: String,
    pub date: Option<NaiveDate>,
    pub location_city: Option<String>,
    pub location_country: Option<String>,
    pub region: Option<String>,
    /// Every kilometre value found in the distance text, in order
    pub distances_km: Vec<f64>,
    pub distance_label: Option<String>,
    pub race_type: Option<String>,
    pub surface: Surface,
    pub elevation_profile: Option<String>,
    pub elevation_gain_m: Option<i64>,
    pub certified: bool,
    pub typical_weather: Option<String>,
    pub nearest_airport: Option<String>,
    pub registration_status: Option<String>,
    pub registration_open_date: Option<String>,
    pub registration_close_date: Option<String>,
    pub registration_process: Option<String>,
    pub fee_range_eur: Option<String>,
    pub geo_lat: Option<f64>,
    pub geo_lon: Option<f64>,
    pub image_url: Option<String>,
    pub image_thumb_url: Option<String>,
    pub sources_json: String,
    pub tags_json: String,
}

impl NewRace {
    /// Primary distance: the first value found in the distance text
    #[must_use]
    pub fn primary_distance_km(&self) -> Option<f64> {
        self.distances_km.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_parse() {
        assert_eq!("Trail".parse::<Surface>(), Ok(Surface::Trail));
        assert_eq!(" road ".parse::<Surface>(), Ok(Surface::Road));
        assert!("track".parse::<Surface>().is_err());
        assert_eq!(Surface::Mixed.to_string(), "mixed");
    }

    #[test]
    fn test_parse_loose_date() {
        let expected = NaiveDate::from_ymd_opt(2026, 4, 12);
        assert_eq!(parse_loose_date("2026-04-12"), expected);
        assert_eq!(parse_loose_date("2026-04-12T09:00:00Z"), expected);
        assert_eq!(parse_loose_date("12/04/2026"), expected);
        assert_eq!(parse_loose_date("April"), None);
        assert_eq!(parse_loose_date(""), None);
    }

    #[test]
    fn test_fold_search_is_unicode_aware() {
        assert_eq!(fold_search(" ÖSTERREICH "), "österreich");
        assert_eq!(fold_search("Île-de-France"), "île-de-france");
        assert_eq!(fold_search("Zürich"), "zürich");
    }

    #[test]
    fn test_primary_distance() {
        let race = NewRace {
            distances_km: vec![42.195, 21.1],
            ..NewRace::default()
        };
        assert_eq!(race.primary_distance_km(), Some(42.195));
    }
}
