//! # Query Executor
//!
//! Runs the race queries against whichever backend the pool wraps. Every
//! driver failure leaves this module as `Error::StorageUnavailable`; "no
//! rows" is never reported as an error except for single-record lookups,
//! which return `Ok(None)`.

use crate::database::DatabasePool;
use crate::error::{Error, Result};
use crate::filter::{BindValue, FilterBuilder, SortOrder};
use crate::model::{fold_search, NewRace, RaceRow};
use crate::pagination::Page;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, info};

/// Columns selected for every race read; `date` is read back as text
const RACE_COLUMNS: &str = "id, race_url, race_name, CAST(date AS TEXT) AS date, \
     location_city, location_country, region, distance_km, distance_label, race_type, \
     surface, elevation_profile, elevation_gain_m, certified, typical_weather, \
     nearest_airport, registration_status, registration_open_date, registration_close_date, \
     registration_process, fee_range_eur, geo_lat, geo_lon, image_url, image_thumb_url, \
     sources_json, tags_json";

const INSERT_RACE: &str = "INSERT INTO races (race_url, race_name, date, location_city, \
     location_country, region, distance_km, distance_label, race_type, surface, \
     elevation_profile, elevation_gain_m, certified, typical_weather, nearest_airport, \
     registration_status, registration_open_date, registration_close_date, \
     registration_process, fee_range_eur, geo_lat, geo_lon, image_url, image_thumb_url, \
     sources_json, tags_json, search_name, search_city, search_country, search_region) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, \
     $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30) \
     RETURNING id";

const INSERT_DISTANCE: &str = "INSERT INTO race_distances (race_id, km) VALUES ($1, $2)";

/// Attach bind values in placeholder order
///
/// Works for `query`, `query_as` and `query_scalar` on either backend.
macro_rules! bind_all {
    ($query:expr, $values:expr) => {{
        let mut query = $query;
        for value in $values {
            query = match value {
                BindValue::Text(v) => query.bind(v.clone()),
                BindValue::Float(v) => query.bind(*v),
                BindValue::Int(v) => query.bind(*v),
                BindValue::Date(v) => query.bind(*v),
            };
        }
        query
    }};
}

/// Inserts a normalized race and its distance rows inside a transaction
macro_rules! insert_race {
    ($tx:expr, $race:expr) => {{
        let race: &NewRace = $race;
        let id: i64 = sqlx::query_scalar(INSERT_RACE)
            .bind(race.race_url.clone())
            .bind(race.race_name.clone())
            .bind(race.date)
            .bind(race.location_city.clone())
            .bind(race.location_country.clone())
            .bind(race.region.clone())
            .bind(race.primary_distance_km())
            .bind(race.distance_label.clone())
            .bind(race.race_type.clone())
            .bind(race.surface.as_str())
            .bind(race.elevation_profile.clone())
            .bind(race.elevation_gain_m)
            .bind(race.certified)
            .bind(race.typical_weather.clone())
            .bind(race.nearest_airport.clone())
            .bind(race.registration_status.clone())
            .bind(race.registration_open_date.clone())
            .bind(race.registration_close_date.clone())
            .bind(race.registration_process.clone())
            .bind(race.fee_range_eur.clone())
            .bind(race.geo_lat)
            .bind(race.geo_lon)
            .bind(race.image_url.clone())
            .bind(race.image_thumb_url.clone())
            .bind(race.sources_json.clone())
            .bind(race.tags_json.clone())
            .bind(fold_search(&race.race_name))
            .bind(race.location_city.as_deref().map(fold_search))
            .bind(race.location_country.as_deref().map(fold_search))
            .bind(race.region.as_deref().map(fold_search))
            .fetch_one(&mut *$tx)
            .await?;
        for km in &race.distances_km {
            sqlx::query(INSERT_DISTANCE)
                .bind(id)
                .bind(*km)
                .execute(&mut *$tx)
                .await?;
        }
        id
    }};
}

/// Matching rows for one page plus the total match count
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Number of records matching the filters, ignoring pagination
    pub total: i64,
    /// The requested page of records
    pub rows: Vec<RaceRow>,
}

/// Catalog counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CatalogStats {
    /// All records
    pub total: i64,
    /// Records with a date
    pub with_date: i64,
    /// Records with an image or thumbnail URL
    pub with_image: i64,
}

/// Read access to the race catalog, plus bulk replace for seeding
#[derive(Clone, Debug)]
pub struct RaceStore {
    pool: DatabasePool,
}

fn log_failure(operation: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |err| {
        error!(operation, error = %err, "Storage query failed");
        Error::from(err)
    }
}

impl RaceStore {
    /// Wrap an initialized pool
    #[must_use]
    pub const fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Underlying pool
    #[must_use]
    pub const fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Count all matches and fetch one ordered page, concurrently
    ///
    /// The two reads are independent; both must succeed. `total` is never
    /// reported below the number of rows actually returned for the page.
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if either query fails.
    pub async fn search(
        &self,
        filters: &FilterBuilder,
        order: SortOrder,
        page: Page,
    ) -> Result<SearchResult> {
        let where_clause = filters.where_clause();
        let count_sql = format!("SELECT COUNT(*) FROM races{where_clause}");
        let (paging, page_binds) = filters.paged(page.size, page.offset);
        let page_sql = format!(
            "SELECT {RACE_COLUMNS} FROM races{where_clause} ORDER BY {}{paging}",
            order.to_sql()
        );
        debug!(sql = %page_sql, binds = page_binds.len(), "Race search");

        let (total, rows) = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let count = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), filters.binds())
                    .fetch_one(pool);
                let rows = bind_all!(sqlx::query_as::<_, RaceRow>(&page_sql), &page_binds)
                    .fetch_all(pool);
                tokio::try_join!(count, rows)
            }
            DatabasePool::Postgres(pool) => {
                let count = bind_all!(sqlx::query_scalar::<_, i64>(&count_sql), filters.binds())
                    .fetch_one(pool);
                let rows = bind_all!(sqlx::query_as::<_, RaceRow>(&page_sql), &page_binds)
                    .fetch_all(pool);
                tokio::try_join!(count, rows)
            }
        }
        .map_err(log_failure("search"))?;

        let returned = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        let floor = if returned == 0 { 0 } else { page.offset.saturating_add(returned) };
        Ok(SearchResult {
            total: total.max(floor),
            rows,
        })
    }

    /// Fetch up to `limit` matching rows without counting
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if the query fails.
    pub async fn list(
        &self,
        filters: &FilterBuilder,
        order: SortOrder,
        limit: i64,
    ) -> Result<Vec<RaceRow>> {
        let (paging, binds) = filters.paged(limit, 0);
        let sql = format!(
            "SELECT {RACE_COLUMNS} FROM races{} ORDER BY {}{paging}",
            filters.where_clause(),
            order.to_sql()
        );
        debug!(sql = %sql, binds = binds.len(), "Race list");

        let result = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                bind_all!(sqlx::query_as::<_, RaceRow>(&sql), &binds).fetch_all(pool).await
            }
            DatabasePool::Postgres(pool) => {
                bind_all!(sqlx::query_as::<_, RaceRow>(&sql), &binds).fetch_all(pool).await
            }
        };
        result.map_err(log_failure("list"))
    }

    /// Look up one race by its unique URL
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if the query fails.
    pub async fn find_by_url(&self, url: &str) -> Result<Option<RaceRow>> {
        let sql = format!("SELECT {RACE_COLUMNS} FROM races WHERE race_url = $1 LIMIT 1");
        let result = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query_as::<_, RaceRow>(&sql).bind(url).fetch_optional(pool).await
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query_as::<_, RaceRow>(&sql).bind(url).fetch_optional(pool).await
            }
        };
        result.map_err(log_failure("find_by_url"))
    }

    /// Look up one race by its synthetic id
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if the query fails.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<RaceRow>> {
        let sql = format!("SELECT {RACE_COLUMNS} FROM races WHERE id = $1");
        let result = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query_as::<_, RaceRow>(&sql).bind(id).fetch_optional(pool).await
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query_as::<_, RaceRow>(&sql).bind(id).fetch_optional(pool).await
            }
        };
        result.map_err(log_failure("find_by_id"))
    }

    /// Distinct, non-empty countries of races dated on or after `from`
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if the query fails.
    pub async fn countries_from(&self, from: NaiveDate) -> Result<Vec<String>> {
        let sql = "SELECT DISTINCT location_country FROM races \
                   WHERE location_country IS NOT NULL AND location_country <> '' AND date >= $1 \
                   ORDER BY location_country ASC";
        let result = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query_scalar::<_, String>(sql).bind(from).fetch_all(pool).await
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query_scalar::<_, String>(sql).bind(from).fetch_all(pool).await
            }
        };
        result.map_err(log_failure("countries"))
    }

    /// Catalog counters
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if the query fails.
    pub async fn stats(&self) -> Result<CatalogStats> {
        let sql = "SELECT COUNT(*) AS total, COUNT(date) AS with_date, \
                   COUNT(COALESCE(image_thumb_url, image_url)) AS with_image FROM races";
        let result = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query_as::<_, CatalogStats>(sql).fetch_one(pool).await
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query_as::<_, CatalogStats>(sql).fetch_one(pool).await
            }
        };
        result.map_err(log_failure("stats"))
    }

    /// Replace the whole catalog with `races` in one transaction
    ///
    /// Returns the number of races inserted.
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` if any statement fails; the previous
    /// contents are kept in that case.
    pub async fn replace_all(&self, races: &[NewRace]) -> Result<usize> {
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                sqlx::query("DELETE FROM race_distances").execute(&mut *tx).await?;
                sqlx::query("DELETE FROM races").execute(&mut *tx).await?;
                for race in races {
                    insert_race!(tx, race);
                }
                tx.commit().await?;
            }
            DatabasePool::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                sqlx::query("TRUNCATE TABLE race_distances, races RESTART IDENTITY")
                    .execute(&mut *tx)
                    .await?;
                for race in races {
                    insert_race!(tx, race);
                }
                tx.commit().await?;
            }
        }
        info!(count = races.len(), "Race catalog replaced");
        Ok(races.len())
    }

    /// Insert one race, returning its id
    ///
    /// # Errors
    ///
    /// `Error::StorageUnavailable` on failure, including a duplicate URL.
    pub async fn insert(&self, race: &NewRace) -> Result<i64> {
        let id = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                let id = insert_race!(tx, race);
                tx.commit().await?;
                id
            }
            DatabasePool::Postgres(pool) => {
                let mut tx = pool.begin().await?;
                let id = insert_race!(tx, race);
                tx.commit().await?;
                id
            }
        };
        Ok(id)
    }
}
