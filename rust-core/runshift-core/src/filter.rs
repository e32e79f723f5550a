//! # Filter Clause Builder
//!
//! Turns loosely-typed query parameters into an ordered list of SQL
//! predicates and a parallel list of bind values. Placeholder numbering
//! (`$1`, `$2`, ...) is owned by [`FilterBuilder`]: callers hand over values
//! and receive the placeholder to splice into their predicate, so predicate
//! text and bind positions can never drift apart.
//!
//! Substring filters compare against the `search_*` columns, which hold a
//! folded copy of the name, city, country and region written at insert
//! time (see [`fold_search`]).
//!
//! Query-string filters degrade to "filter absent" when malformed and never
//! fail. The JSON body search ([`SearchRacesRequest`]) validates instead.

use crate::model::{fold_search, parse_loose_date, Surface};
use crate::validation::{FieldError, ValidationErrors, ValidationResult};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

const MILE_KM: f64 = 1.609_344;

/// Slack allowed when a body search names an exact distance
pub const DISTANCE_TOLERANCE_KM: f64 = 0.05;

/// Value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    /// Text value
    Text(String),
    /// Floating point value
    Float(f64),
    /// Integer value
    Int(i64),
    /// Calendar date
    Date(NaiveDate),
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for BindValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<NaiveDate> for BindValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Named kilometre range used to classify a race distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceCategory {
    /// 4.0 - 6.0 km
    FiveK,
    /// 8.0 - 12.0 km
    TenK,
    /// 13.0 - 17.0 km
    FifteenK,
    /// 20.0 - 22.8 km
    Half,
    /// 23.0 - 27.0 km
    TwentyFiveK,
    /// 28.0 - 32.0 km
    ThirtyK,
    /// 41.0 - 43.5 km
    Marathon,
    /// 43.5 km and beyond
    Ultra,
}

impl DistanceCategory {
    /// Closed kilometre range `[min, max]`
    #[must_use]
    pub const fn range(self) -> (f64, f64) {
        match self {
            Self::FiveK => (4.0, 6.0),
            Self::TenK => (8.0, 12.0),
            Self::FifteenK => (13.0, 17.0),
            Self::Half => (20.0, 22.8),
            Self::TwentyFiveK => (23.0, 27.0),
            Self::ThirtyK => (28.0, 32.0),
            Self::Marathon => (41.0, 43.5),
            Self::Ultra => (43.5, 10_000.0),
        }
    }

    /// Whether `km` falls inside the category's closed range
    #[must_use]
    pub fn contains(self, km: f64) -> bool {
        let (min, max) = self.range();
        (min..=max).contains(&km)
    }

    /// Whether any value extracted from `text` falls inside the range
    ///
    /// Text without any numeric token never matches.
    #[must_use]
    pub fn matches_text(self, text: &str) -> bool {
        extract_km_values(text).into_iter().any(|km| self.contains(km))
    }
}

impl FromStr for DistanceCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "5k" => Ok(Self::FiveK),
            "10k" => Ok(Self::TenK),
            "15k" => Ok(Self::FifteenK),
            "half" | "half-marathon" | "halfmarathon" | "21k" => Ok(Self::Half),
            "25k" => Ok(Self::TwentyFiveK),
            "30k" => Ok(Self::ThirtyK),
            "marathon" | "42k" => Ok(Self::Marathon),
            "ultra" => Ok(Self::Ultra),
            _ => Err(()),
        }
    }
}

/// Extract every kilometre value embedded in free-form distance text
///
/// Comma decimals count as decimals (`"42,2"` is 42.2), `"10k"` is 10 km,
/// a metre suffix divides by 1000 and a mile suffix converts to km.
/// A bare number is taken as kilometres.
#[must_use]
pub fn extract_km_values(text: &str) -> Vec<f64> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let mut values = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let mut number = String::new();
        let mut seen_decimal = false;
        while let Some(&c) = chars.get(i) {
            let next_is_digit = chars.get(i + 1).is_some_and(char::is_ascii_digit);
            if c.is_ascii_digit() {
                number.push(c);
            } else if (c == '.' || c == ',') && !seen_decimal && next_is_digit {
                number.push('.');
                seen_decimal = true;
            } else {
                break;
            }
            i += 1;
        }

        let unit: String = chars[i..]
            .iter()
            .skip_while(|c| c.is_whitespace())
            .take_while(|c| c.is_alphabetic())
            .collect();

        if let Ok(value) = number.parse::<f64>() {
            let km = match unit.as_str() {
                "m" | "meter" | "meters" | "metre" | "metres" => value / 1000.0,
                "mi" | "mile" | "miles" => value * MILE_KM,
                _ => value,
            };
            values.push(km);
        }
    }

    values
}

/// Escape LIKE wildcards and wrap in `%...%`, folded
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in fold_search(needle).chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Ordered SQL predicates plus their positional bind values
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    predicates: Vec<String>,
    binds: Vec<BindValue>,
}

impl FilterBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bind value and return its placeholder (`$n`, 1-based)
    pub fn bind(&mut self, value: impl Into<BindValue>) -> String {
        self.binds.push(value.into());
        format!("${}", self.binds.len())
    }

    /// Append a predicate that already references placeholders from [`Self::bind`]
    pub fn push(&mut self, predicate: impl Into<String>) {
        self.predicates.push(predicate.into());
    }

    /// Substring match of a folded needle against any of the folded `columns`
    ///
    /// A single bind value is shared by every branch.
    pub fn contains_any(&mut self, columns: &[&str], needle: &str) {
        let placeholder = self.bind(like_pattern(needle));
        let branches: Vec<String> = columns
            .iter()
            .map(|column| format!("{column} LIKE {placeholder} ESCAPE '\\'"))
            .collect();
        if branches.len() == 1 {
            self.push(branches.concat());
        } else {
            self.push(format!("({})", branches.join(" OR ")));
        }
    }

    /// Exact match against one value, or any of several
    pub fn equals_any<V>(&mut self, column: &str, values: &[V])
    where
        V: Clone + Into<BindValue>,
    {
        match values {
            [] => {}
            [single] => {
                let placeholder = self.bind(single.clone());
                self.push(format!("{column} = {placeholder}"));
            }
            many => {
                let placeholders: Vec<String> =
                    many.iter().map(|v| self.bind(v.clone())).collect();
                self.push(format!("{column} IN ({})", placeholders.join(", ")));
            }
        }
    }

    /// Any extracted distance of the race inside the closed range `[min, max]`
    pub fn distance_between(&mut self, min: f64, max: f64) {
        let lo = self.bind(min);
        let hi = self.bind(max);
        self.push(format!(
            "EXISTS (SELECT 1 FROM race_distances d WHERE d.race_id = races.id AND d.km BETWEEN {lo} AND {hi})"
        ));
    }

    /// Predicates added so far, in order
    #[must_use]
    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    /// Bind values added so far, in placeholder order
    #[must_use]
    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }

    /// `" WHERE a AND b"`, or an empty string when no predicate is set
    #[must_use]
    pub fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.predicates.join(" AND "))
        }
    }

    /// LIMIT/OFFSET suffix numbered after the filter binds
    ///
    /// Returns the SQL suffix and the full bind list for the page query.
    /// The builder itself is left untouched so the count query keeps using
    /// [`Self::binds`].
    #[must_use]
    pub fn paged(&self, limit: i64, offset: i64) -> (String, Vec<BindValue>) {
        let mut page = self.clone();
        let limit_placeholder = page.bind(limit);
        let offset_placeholder = page.bind(offset);
        (
            format!(" LIMIT {limit_placeholder} OFFSET {offset_placeholder}"),
            page.binds,
        )
    }
}

/// Column a search can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Race date
    #[default]
    Date,
    /// Race name
    Name,
    /// Primary distance in km
    Distance,
    /// Country
    Country,
}

impl SortKey {
    const fn column(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Name => "race_name",
            Self::Distance => "distance_km",
            Self::Country => "location_country",
        }
    }
}

/// Result ordering: a whitelisted column plus direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortOrder {
    /// Primary key
    pub key: SortKey,
    /// Descending instead of ascending
    pub descending: bool,
}

impl SortOrder {
    /// Parse `orderBy` / `orderDir`; unknown values fall back to date ascending
    #[must_use]
    pub fn from_params(order_by: Option<&str>, order_dir: Option<&str>) -> Self {
        let key = match order_by.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("name" | "race_name") => SortKey::Name,
            Some("distance" | "distance_km") => SortKey::Distance,
            Some("country" | "location_country") => SortKey::Country,
            _ => SortKey::Date,
        };
        let descending = order_dir.is_some_and(|d| d.trim().eq_ignore_ascii_case("desc"));
        Self { key, descending }
    }

    /// `ORDER BY` body: nulls last, then name, then id
    #[must_use]
    pub fn to_sql(self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        let primary = format!("{} {direction} NULLS LAST", self.key.column());
        if self.key == SortKey::Name {
            format!("{primary}, id ASC")
        } else {
            format!("{primary}, race_name ASC, id ASC")
        }
    }
}

/// Typed view of the recognised search filters
///
/// Every field is optional; absent, empty, or malformed inputs are `None`
/// (or empty), which means the filter is not applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceFilters {
    /// Free text matched against name, city, and country
    pub text: Option<String>,
    /// Country substring
    pub country: Option<String>,
    /// City substring
    pub city: Option<String>,
    /// Region substring
    pub region: Option<String>,
    /// Inclusive lower date bound
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper date bound
    pub date_to: Option<NaiveDate>,
    /// Distance bucket
    pub distance: Option<DistanceCategory>,
    /// Accepted surfaces
    pub surfaces: Vec<Surface>,
    /// Accepted elevation descriptors (lowercased)
    pub elevation_profiles: Vec<String>,
}

/// First non-blank value among `names`
pub(crate) fn first_param<'a>(params: &'a HashMap<String, String>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| params.get(*name))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn comma_list(raw: Option<&str>) -> impl Iterator<Item = String> + '_ {
    raw.into_iter()
        .flat_map(|s| s.split(','))
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

impl RaceFilters {
    /// Read filters from raw query parameters, accepting the usual aliases
    #[must_use]
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let text_param = |names: &[&str]| first_param(params, names).map(str::to_string);

        let mut surfaces: Vec<Surface> = Vec::new();
        for surface in comma_list(first_param(params, &["surface"])).filter_map(|s| s.parse::<Surface>().ok()) {
            if !surfaces.contains(&surface) {
                surfaces.push(surface);
            }
        }

        let mut elevation_profiles: Vec<String> = Vec::new();
        for profile in comma_list(first_param(params, &["elevation", "elevationProfile"])) {
            if !elevation_profiles.contains(&profile) {
                elevation_profiles.push(profile);
            }
        }

        Self {
            text: text_param(&["q", "freeText"]),
            country: text_param(&["country"]),
            city: text_param(&["city"]),
            region: text_param(&["region"]),
            date_from: first_param(params, &["dateFrom", "fromDate"]).and_then(parse_loose_date),
            date_to: first_param(params, &["dateTo", "toDate"]).and_then(parse_loose_date),
            distance: first_param(params, &["distanceCategory", "distance"])
                .and_then(|s| s.parse::<DistanceCategory>().ok()),
            surfaces,
            elevation_profiles,
        }
    }

    /// Emit predicates for every active filter
    ///
    /// Order: date bounds, country, city, region, free text, distance,
    /// surface, elevation.
    #[must_use]
    pub fn to_builder(&self) -> FilterBuilder {
        let mut builder = FilterBuilder::new();

        if let Some(from) = self.date_from {
            let p = builder.bind(from);
            builder.push(format!("date >= {p}"));
        }
        if let Some(to) = self.date_to {
            let p = builder.bind(to);
            builder.push(format!("date <= {p}"));
        }
        if let Some(country) = &self.country {
            builder.contains_any(&["search_country"], country);
        }
        if let Some(city) = &self.city {
            builder.contains_any(&["search_city"], city);
        }
        if let Some(region) = &self.region {
            builder.contains_any(&["search_region"], region);
        }
        if let Some(text) = &self.text {
            builder.contains_any(&["search_name", "search_city", "search_country"], text);
        }
        if let Some(category) = self.distance {
            let (min, max) = category.range();
            builder.distance_between(min, max);
        }
        if !self.surfaces.is_empty() {
            let values: Vec<&str> = self.surfaces.iter().map(Surface::as_str).collect();
            builder.equals_any("surface", &values);
        }
        if !self.elevation_profiles.is_empty() {
            builder.equals_any("LOWER(elevation_profile)", &self.elevation_profiles);
        }

        builder
    }
}

/// Inclusive date window of a body search, as sent by the client
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimeWindow {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// JSON body of `POST /api/search-races`
///
/// The date window is mandatory. `region` and `country` match whole values
/// ignoring case; `distance_km` matches any extracted distance within
/// [`DISTANCE_TOLERANCE_KM`] and may be sent as a number or numeric text.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchRacesRequest {
    pub time_window: Option<TimeWindow>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub distance_km: Option<Value>,
    pub surface: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required_date(errors: &mut ValidationErrors, field: &str, raw: Option<&str>) -> Option<NaiveDate> {
    let Some(raw) = non_blank(raw) else {
        errors.add_required(field);
        return None;
    };
    let parsed = parse_loose_date(raw);
    if parsed.is_none() {
        errors.add(FieldError::invalid_format(field, "YYYY-MM-DD"));
    }
    parsed
}

fn loose_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|km| km.is_finite())
}

impl SearchRacesRequest {
    /// Validate the body and emit predicates
    ///
    /// Order: date window, region, country, distance, surface.
    ///
    /// # Errors
    ///
    /// Every missing or malformed field is reported in one batch.
    pub fn to_builder(&self) -> ValidationResult<FilterBuilder> {
        let mut errors = ValidationErrors::new();
        let window = self.time_window.as_ref();
        let from = required_date(&mut errors, "time_window.from", window.and_then(|w| w.from.as_deref()));
        let to = required_date(&mut errors, "time_window.to", window.and_then(|w| w.to.as_deref()));

        let distance = match &self.distance_km {
            None | Some(Value::Null) => None,
            Some(value) => {
                let km = loose_number(value);
                if km.is_none() {
                    errors.add(FieldError::invalid_type("distance_km", "a number"));
                }
                km
            }
        };

        let surface = non_blank(self.surface.as_deref()).and_then(|raw| {
            let parsed = raw.parse::<Surface>().ok();
            if parsed.is_none() {
                errors.add(FieldError::invalid_type("surface", "one of road, trail, mixed"));
            }
            parsed
        });

        errors.into_result()?;

        let mut builder = FilterBuilder::new();
        if let (Some(from), Some(to)) = (from, to) {
            let lo = builder.bind(from);
            let hi = builder.bind(to);
            builder.push(format!("date >= {lo} AND date <= {hi}"));
        }
        if let Some(region) = non_blank(self.region.as_deref()) {
            builder.equals_any("search_region", &[fold_search(region)]);
        }
        if let Some(country) = non_blank(self.country.as_deref()) {
            builder.equals_any("search_country", &[fold_search(country)]);
        }
        if let Some(km) = distance {
            builder.distance_between(km - DISTANCE_TOLERANCE_KM, km + DISTANCE_TOLERANCE_KM);
        }
        if let Some(surface) = surface {
            builder.equals_any("surface", &[surface.as_str()]);
        }
        Ok(builder)
    }
}
