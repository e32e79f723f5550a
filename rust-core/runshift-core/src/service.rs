//! # Race Search Endpoint
//!
//! Orchestration behind the HTTP routes: validate, build filters, resolve
//! the page, query, project. Client errors are raised before the store is
//! touched.

use crate::error::{Error, Result};
use crate::filter::{first_param, RaceFilters, SearchRacesRequest, SortOrder};
use crate::json::parse_json;
use crate::pagination::PageLimits;
use crate::projection::{Race, RaceSummary};
use crate::store::{CatalogStats, RaceStore};
use crate::validation::{FieldError, ValidationErrors};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Upper bound on rows returned by one body search
pub const BODY_SEARCH_CAP: i64 = 5000;

/// Search behaviour knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchSettings {
    /// Page-size policy
    pub limits: PageLimits,
    /// Reject searches that do not name both `dateFrom` and `dateTo`
    pub require_date_window: bool,
}

/// One page of search results
#[derive(Debug, Clone, Serialize)]
pub struct RacePage {
    /// Projected races
    pub items: Vec<Race>,
    /// Matches across all pages
    pub total: i64,
    /// 1-based page number actually served
    pub page: i64,
    /// Page size actually applied
    pub limit: i64,
}

/// Readiness probe result
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Readiness {
    /// Always true when returned
    pub ok: bool,
    /// Store answered the probe
    pub db: bool,
}

/// Race catalog operations exposed over HTTP
#[derive(Debug, Clone)]
pub struct RaceService {
    store: RaceStore,
    settings: SearchSettings,
}

impl RaceService {
    /// Create a service over a store
    #[must_use]
    pub const fn new(store: RaceStore, settings: SearchSettings) -> Self {
        Self { store, settings }
    }

    /// The wrapped store
    #[must_use]
    pub const fn store(&self) -> &RaceStore {
        &self.store
    }

    /// Active settings
    #[must_use]
    pub const fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Search races using raw query parameters
    ///
    /// # Errors
    ///
    /// `Error::Validation` when a required date bound is missing or
    /// unparseable, `Error::StorageUnavailable` when the store fails.
    pub async fn list_races(&self, params: &HashMap<String, String>) -> Result<RacePage> {
        let filters = RaceFilters::from_params(params);
        if self.settings.require_date_window {
            require_window(params, &filters)?;
        }

        let builder = filters.to_builder();
        let order = SortOrder::from_params(
            first_param(params, &["orderBy"]),
            first_param(params, &["orderDir"]),
        );
        let page = self.settings.limits.resolve(
            first_param(params, &["page"]),
            first_param(params, &["limit"]),
        );
        debug!(
            predicates = builder.predicates().len(),
            page = page.number,
            limit = page.size,
            "Listing races"
        );

        let result = self.store.search(&builder, order, page).await?;
        let items: Vec<Race> = result.rows.into_iter().map(Race::from).collect();

        Ok(RacePage {
            items,
            total: result.total,
            page: page.number,
            limit: page.size,
        })
    }

    /// Search with a JSON body: mandatory date window, exact filters
    ///
    /// Results are ordered by date and capped at [`BODY_SEARCH_CAP`]. An
    /// absent or blank body is treated as `{}`.
    ///
    /// # Errors
    ///
    /// `Error::Validation` for a body that is not a JSON object or misses
    /// the window, `Error::StorageUnavailable` when the store fails.
    pub async fn search_races(&self, body: Option<&[u8]>) -> Result<Vec<RaceSummary>> {
        let request = parse_search_body(body)?;
        let builder = request.to_builder()?;
        debug!(predicates = builder.predicates().len(), "Body search");

        let rows = self.store.list(&builder, SortOrder::default(), BODY_SEARCH_CAP).await?;
        Ok(rows
            .into_iter()
            .map(|row| RaceSummary::from(Race::from(row)))
            .collect())
    }

    /// Fetch one race by its source URL
    ///
    /// # Errors
    ///
    /// `Error::Validation` for a missing URL, `Error::NotFound` when no
    /// race has it.
    pub async fn race_by_url(&self, url: Option<&str>) -> Result<Race> {
        let url = url.map(str::trim).filter(|u| !u.is_empty()).ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add_required("url");
            Error::Validation(errors)
        })?;

        self.store
            .find_by_url(url)
            .await?
            .map(Race::from)
            .ok_or_else(|| Error::not_found(format!("race with url {url}")))
    }

    /// Fetch one race by its synthetic id
    ///
    /// # Errors
    ///
    /// `Error::NotFound` when no race has the id.
    pub async fn race_by_id(&self, id: i64) -> Result<Race> {
        self.store
            .find_by_id(id)
            .await?
            .map(Race::from)
            .ok_or_else(|| Error::not_found(format!("race {id}")))
    }

    /// Countries with races dated today or later
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` when the store fails.
    pub async fn countries(&self) -> Result<Vec<String>> {
        self.countries_from(Utc::now().date_naive()).await
    }

    /// Countries with races dated on or after `from`
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` when the store fails.
    pub async fn countries_from(&self, from: NaiveDate) -> Result<Vec<String>> {
        self.store.countries_from(from).await
    }

    /// Catalog counters
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` when the store fails.
    pub async fn stats(&self) -> Result<CatalogStats> {
        self.store.stats().await
    }

    /// Probe the store
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` when the probe fails.
    pub async fn ready(&self) -> Result<Readiness> {
        self.store.pool().ping().await?;
        Ok(Readiness { ok: true, db: true })
    }
}

fn parse_search_body(body: Option<&[u8]>) -> Result<SearchRacesRequest> {
    let Some(bytes) = body.filter(|b| !b.iter().all(u8::is_ascii_whitespace)) else {
        return Ok(SearchRacesRequest::default());
    };
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| parse_json::<SearchRacesRequest>(text).ok())
        .ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add(FieldError::invalid_type("body", "a JSON object"));
            Error::Validation(errors)
        })
}

fn require_window(params: &HashMap<String, String>, filters: &RaceFilters) -> Result<()> {
    let mut errors = ValidationErrors::new();
    let bounds = [
        ("dateFrom", ["dateFrom", "fromDate"], filters.date_from),
        ("dateTo", ["dateTo", "toDate"], filters.date_to),
    ];
    for (field, names, parsed) in bounds {
        if first_param(params, &names).is_none() {
            errors.add_required(field);
        } else if parsed.is_none() {
            errors.add(FieldError::invalid_format(field, "YYYY-MM-DD"));
        }
    }
    errors.into_result().map_err(Error::from)
}
