//! # Row Projector
//!
//! Maps a stored `RaceRow` to the client-facing `Race` shape. The mapping
//! is total: malformed embedded JSON becomes an empty list, a half-present
//! coordinate pair becomes `null`, and missing text becomes `None` or `""`.

use crate::json::parse_json;
use crate::model::{parse_loose_date, RaceRow};
use serde::Serialize;
use serde_json::Value;

/// Race as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Race {
    /// Synthetic key
    pub id: i64,
    /// Unique source URL
    pub race_url: Option<String>,
    /// Event name
    pub race_name: String,
    /// `YYYY-MM-DD` when the stored date parses, else the raw text
    pub date: Option<String>,
    /// `"city, country"`, `"country"`, or `""`
    pub location: String,
    /// City
    pub location_city: Option<String>,
    /// Country
    pub location_country: Option<String>,
    /// Region
    pub region: Option<String>,
    /// Primary distance in km
    pub distance_km: Option<f64>,
    /// Original distance text
    pub distance_label: Option<String>,
    /// Race type (road race, relay, ...)
    pub race_type: Option<String>,
    /// Surface
    pub surface: Option<String>,
    /// Elevation descriptor
    pub elevation_profile: Option<String>,
    /// Total climb in metres
    pub elevation_gain_m: Option<i64>,
    /// Certified course
    pub certified: bool,
    /// Typical weather on race day
    pub typical_weather: Option<String>,
    /// Nearest airport
    pub nearest_airport: Option<String>,
    /// Registration status
    pub registration_status: Option<String>,
    /// Registration opening date, as imported
    pub registration_open_date: Option<String>,
    /// Registration closing date, as imported
    pub registration_close_date: Option<String>,
    /// How to register
    pub registration_process: Option<String>,
    /// Entry fee range in euro, as imported
    pub fee_range_eur: Option<String>,
    /// `[lat, lon]` when both are present
    pub geo: Option<[f64; 2]>,
    /// Full-size image
    pub image_url: Option<String>,
    /// Thumbnail image
    pub image_thumb_url: Option<String>,
    /// Source references
    pub sources: Vec<Value>,
    /// Tags
    pub tags: Vec<Value>,
}

/// Course block of a [`RaceSummary`]
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub surface: Option<String>,
    pub elevation_gain_m: Option<i64>,
    pub certified: bool,
    pub typical_weather: Option<String>,
}

/// Logistics block of a [`RaceSummary`]
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Logistics {
    pub nearest_airport: Option<String>,
    pub registration_status: Option<String>,
}

/// Compact race shape returned by the body search
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSummary {
    pub race_name: String,
    pub race_url: Option<String>,
    pub date: Option<String>,
    pub location: String,
    pub country: Option<String>,
    pub distance_km: Option<f64>,
    pub course: Course,
    pub logistics: Logistics,
    pub sources: Vec<Value>,
    pub geo: Option<[f64; 2]>,
    pub tags: Vec<Value>,
}

/// Parse a JSON-text column as a list, defaulting to empty
fn json_list(raw: Option<&str>) -> Vec<Value> {
    match raw.map(str::trim) {
        Some(text) if !text.is_empty() => parse_json::<Vec<Value>>(text).unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `"city, country"` when a city is present, else the country, else empty
#[must_use]
pub fn compose_location(city: Option<&str>, country: Option<&str>) -> String {
    match (non_blank(city), non_blank(country)) {
        (Some(city), Some(country)) => format!("{city}, {country}"),
        (Some(city), None) => city.to_string(),
        (None, Some(country)) => country.to_string(),
        (None, None) => String::new(),
    }
}

/// Both coordinates, finite, or nothing
#[must_use]
pub fn project_geo(lat: Option<f64>, lon: Option<f64>) -> Option<[f64; 2]> {
    match (lat, lon) {
        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some([lat, lon]),
        _ => None,
    }
}

impl From<RaceRow> for Race {
    fn from(row: RaceRow) -> Self {
        let location = compose_location(row.location_city.as_deref(), row.location_country.as_deref());
        let date = row.date.map(|raw| {
            parse_loose_date(&raw).map_or(raw, |d| d.format("%Y-%m-%d").to_string())
        });

        Self {
            id: row.id,
            race_url: row.race_url,
            race_name: row.race_name.unwrap_or_default(),
            date,
            location,
            location_city: row.location_city,
            location_country: row.location_country,
            region: row.region,
            distance_km: row.distance_km,
            distance_label: row.distance_label,
            race_type: row.race_type,
            surface: row.surface,
            elevation_profile: row.elevation_profile,
            elevation_gain_m: row.elevation_gain_m,
            certified: row.certified.unwrap_or(false),
            typical_weather: row.typical_weather,
            nearest_airport: row.nearest_airport,
            registration_status: row.registration_status,
            registration_open_date: row.registration_open_date,
            registration_close_date: row.registration_close_date,
            registration_process: row.registration_process,
            fee_range_eur: row.fee_range_eur,
            geo: project_geo(row.geo_lat, row.geo_lon),
            image_url: row.image_url,
            image_thumb_url: row.image_thumb_url,
            sources: json_list(row.sources_json.as_deref()),
            tags: json_list(row.tags_json.as_deref()),
        }
    }
}

impl From<Race> for RaceSummary {
    fn from(race: Race) -> Self {
        Self {
            race_name: race.race_name,
            race_url: race.race_url,
            date: race.date,
            location: race.location,
            country: race.location_country,
            distance_km: race.distance_km,
            course: Course {
                surface: race.surface,
                elevation_gain_m: race.elevation_gain_m,
                certified: race.certified,
                typical_weather: race.typical_weather,
            },
            logistics: Logistics {
                nearest_airport: race.nearest_airport,
                registration_status: race.registration_status,
            },
            sources: race.sources,
            geo: race.geo,
            tags: race.tags,
        }
    }
}
