//! Console API endpoints
//!
//! Read-only views over the snapshot store, one server-sent-events stream
//! per broker for live dashboards, and a manual refresh trigger.

use actix_web::{HttpResponse, get, post, web};
use futures::StreamExt;
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use brokerscope_api::{BrokerKey, OverallHealth};
use brokerscope_common::CorrelationError;

use crate::model::{AppState, RestResult};

/// List the posture snapshots of all tracked brokers
#[get("/v1/posture/brokers")]
pub async fn list_brokers(state: web::Data<AppState>) -> HttpResponse {
    let snapshots = state.service.store().list();
    HttpResponse::Ok().json(RestResult::ok(Some(snapshots)))
}

/// Get one broker's posture snapshot
#[get("/v1/posture/brokers/{namespace}/{name}")]
pub async fn get_broker(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (namespace, name) = path.into_inner();
    let key = BrokerKey::new(&namespace, &name);
    match state.service.store().get(&key) {
        Some(snapshot) => HttpResponse::Ok().json(RestResult::ok(Some(snapshot))),
        None => HttpResponse::NotFound().json(RestResult::<()>::err(404, "Broker not found")),
    }
}

/// Get one broker's certificate summaries
#[get("/v1/posture/brokers/{namespace}/{name}/certificates")]
pub async fn get_certificates(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (namespace, name) = path.into_inner();
    let key = BrokerKey::new(&namespace, &name);
    match state.service.store().get(&key) {
        Some(snapshot) => HttpResponse::Ok().json(RestResult::ok(Some(snapshot.certificates))),
        None => HttpResponse::NotFound().json(RestResult::<()>::err(404, "Broker not found")),
    }
}

/// Get one broker's overall health verdict
#[get("/v1/posture/brokers/{namespace}/{name}/health")]
pub async fn get_health(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct HealthResponse {
        overall_health: OverallHealth,
        generation: u64,
    }

    let (namespace, name) = path.into_inner();
    let key = BrokerKey::new(&namespace, &name);
    match state.service.store().get(&key) {
        Some(snapshot) => HttpResponse::Ok().json(RestResult::ok(Some(HealthResponse {
            overall_health: snapshot.overall_health,
            generation: snapshot.generation,
        }))),
        None => HttpResponse::NotFound().json(RestResult::<()>::err(404, "Broker not found")),
    }
}

/// Get one broker's poller state
#[get("/v1/posture/brokers/{namespace}/{name}/poller")]
pub async fn get_poller_status(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (namespace, name) = path.into_inner();
    let key = BrokerKey::new(&namespace, &name);
    match state.service.poller_status(&key) {
        Some(status) => HttpResponse::Ok().json(RestResult::ok(Some(status))),
        None => HttpResponse::NotFound().json(RestResult::<()>::err(404, "Broker not tracked")),
    }
}

/// Stream a broker's snapshot updates as server-sent events
#[get("/v1/posture/brokers/{namespace}/{name}/watch")]
pub async fn watch_broker(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (namespace, name) = path.into_inner();
    let key = BrokerKey::new(&namespace, &name);
    let rx = state.service.store().subscribe(&key);

    let stream = BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(snapshot) => serde_json::to_string(&snapshot).ok().map(|json| {
                Ok::<_, actix_web::Error>(web::Bytes::from(format!("data: {}\n\n", json)))
            }),
            // Lagged subscribers skip to the next delivery; generations
            // still never regress
            Err(BroadcastStreamRecvError::Lagged(_)) => None,
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("cache-control", "no-cache"))
        .streaming(stream)
}

/// Trigger one correlation cycle for a broker
#[post("/v1/posture/brokers/{namespace}/{name}/refresh")]
pub async fn trigger_refresh(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (namespace, name) = path.into_inner();
    let key = BrokerKey::new(&namespace, &name);
    match state.service.refresh(&key).await {
        Ok(snapshot) => HttpResponse::Ok().json(RestResult::ok(Some(snapshot))),
        Err(e @ CorrelationError::MissingBrokerInstance(_)) => {
            HttpResponse::NotFound().json(RestResult::<()>::err(404, &e.to_string()))
        }
        Err(e @ CorrelationError::RequiredFetchFailed { .. }) => {
            HttpResponse::BadGateway().json(RestResult::<()>::err(502, &e.to_string()))
        }
    }
}

/// Configure posture routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_brokers)
        .service(get_broker)
        .service(get_certificates)
        .service(get_health)
        .service(get_poller_status)
        .service(watch_broker)
        .service(trigger_refresh);
}
