//! # Routes
//!
//! Wires [`RaceService`] operations to HTTP paths.
//!
//! | Method | Path                | Operation                     |
//! |--------|---------------------|-------------------------------|
//! | GET    | `/health`           | liveness, no store access     |
//! | GET    | `/ready`            | store probe                   |
//! | GET    | `/api/races`        | filtered, paginated search    |
//! | GET    | `/api/races/{id}`   | lookup by id                  |
//! | GET    | `/api/race?url=`    | lookup by source URL          |
//! | POST   | `/api/search-races` | date-window body search       |
//! | GET    | `/api/countries`    | countries with upcoming races |
//! | GET    | `/api/stats`        | catalog counters              |

use crate::error::{Error, Result};
use crate::router::{Match, Method};
use crate::server::{ApiRequest, ApiResponse, Handler, HandlerFuture, Server};
use crate::service::RaceService;
use crate::validation::{FieldError, ValidationErrors};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

fn respond<T: Serialize>(result: Result<T>, expose_detail: bool) -> ApiResponse {
    match result {
        Ok(value) => ApiResponse::ok_json(&value),
        Err(err) => {
            if !err.is_client_error() {
                error!(error = %err, "Request failed");
            }
            ApiResponse::from_error(&err, expose_detail)
        }
    }
}

fn invalid_id() -> Error {
    let mut errors = ValidationErrors::new();
    errors.add(FieldError::invalid_type("id", "an integer"));
    Error::Validation(errors)
}

/// Register every catalog route on `server`
///
/// # Errors
///
/// `Error::InvalidRoutePattern` if a path conflicts with a route already
/// registered on the server.
pub fn register_routes(server: &mut Server, service: Arc<RaceService>, expose_detail: bool) -> Result<()> {
    let health: Handler = Arc::new(|_req: &ApiRequest, _matched: &Match<'_>| -> HandlerFuture {
        Box::pin(async { ApiResponse::json(json!({ "ok": true }).to_string()) })
    });
    server.add_route(Method::Get, "/health", health)?;

    let svc = service.clone();
    let ready: Handler = Arc::new(move |_req: &ApiRequest, _matched: &Match<'_>| -> HandlerFuture {
        let svc = svc.clone();
        // operator endpoint: always says why the probe failed
        Box::pin(async move { respond(svc.ready().await, true) })
    });
    server.add_route(Method::Get, "/ready", ready)?;

    let svc = service.clone();
    let list: Handler = Arc::new(move |req: &ApiRequest, _matched: &Match<'_>| -> HandlerFuture {
        let svc = svc.clone();
        let params = req.query_map().clone();
        Box::pin(async move { respond(svc.list_races(&params).await, expose_detail) })
    });
    server.add_route(Method::Get, "/api/races", list)?;

    let svc = service.clone();
    let by_id: Handler = Arc::new(move |_req: &ApiRequest, matched: &Match<'_>| -> HandlerFuture {
        let svc = svc.clone();
        let id = matched.get_int("id");
        Box::pin(async move {
            let result = match id {
                Some(id) => svc.race_by_id(id).await,
                None => Err(invalid_id()),
            };
            respond(result, expose_detail)
        })
    });
    server.add_route(Method::Get, "/api/races/{id:int}", by_id)?;

    let svc = service.clone();
    let by_url: Handler = Arc::new(move |req: &ApiRequest, _matched: &Match<'_>| -> HandlerFuture {
        let svc = svc.clone();
        let url = req.query("url").map(str::to_string);
        Box::pin(async move { respond(svc.race_by_url(url.as_deref()).await, expose_detail) })
    });
    server.add_route(Method::Get, "/api/race", by_url)?;

    let svc = service.clone();
    let body_search: Handler = Arc::new(move |req: &ApiRequest, _matched: &Match<'_>| -> HandlerFuture {
        let svc = svc.clone();
        let body = req.body_bytes().map(<[u8]>::to_vec);
        Box::pin(async move { respond(svc.search_races(body.as_deref()).await, expose_detail) })
    });
    server.add_route(Method::Post, "/api/search-races", body_search)?;

    let svc = service.clone();
    let countries: Handler = Arc::new(move |_req: &ApiRequest, _matched: &Match<'_>| -> HandlerFuture {
        let svc = svc.clone();
        Box::pin(async move { respond(svc.countries().await, expose_detail) })
    });
    server.add_route(Method::Get, "/api/countries", countries)?;

    let svc = service;
    let stats: Handler = Arc::new(move |_req: &ApiRequest, _matched: &Match<'_>| -> HandlerFuture {
        let svc = svc.clone();
        Box::pin(async move { respond(svc.stats().await, expose_detail) })
    });
    server.add_route(Method::Get, "/api/stats", stats)?;

    Ok(())
}
