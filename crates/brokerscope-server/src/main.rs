//! Main entry point for the Brokerscope server.
//!
//! Wires the Kubernetes client, fetchers, resolver, and posture service
//! together, starts the broker watch that drives the tracking lifecycle,
//! and serves the console API.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use brokerscope_engine::{HttpStatusSource, PostureService, SnapshotStore};
use brokerscope_k8s::{BrokerEvent, DiscoveryGroupResolver, watch_brokers};
use brokerscope_server::{api, config, model};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let configuration = config::Configuration::new();
    init_logging();

    // Kubernetes wiring: client, one fetcher per registry descriptor, and
    // the discovery-backed resolver gating the optional kinds
    let kube_config = configuration.kube_client_config();
    let client = brokerscope_k8s::init_client(&kube_config).await?;
    let fetchers = brokerscope_k8s::registry_fetchers(&client);
    let resolver = Arc::new(DiscoveryGroupResolver::new(client.clone()));
    let status_source = Arc::new(HttpStatusSource::new(configuration.endpoint_config())?);
    let store = Arc::new(SnapshotStore::new());

    let service = Arc::new(PostureService::new(
        fetchers,
        resolver,
        status_source,
        store,
        configuration.service_config(),
    ));

    // The broker watch is the tracking lifecycle signal: applied brokers
    // start a pipeline, deleted brokers tear theirs down
    let (tx, mut rx) = mpsc::channel::<BrokerEvent>(64);
    let watch_client = client.clone();
    let watch_namespace = configuration.watch_namespace();
    tokio::spawn(async move {
        watch_brokers(watch_client, watch_namespace, tx).await;
    });

    let lifecycle_service = service.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                BrokerEvent::Applied(key) => lifecycle_service.track(key),
                BrokerEvent::Deleted(key) => lifecycle_service.untrack(&key),
            }
        }
    });

    let app_state = web::Data::new(model::AppState {
        service: service.clone(),
    });
    let address = configuration.server_address();
    let port = configuration.server_port();
    info!("Starting Brokerscope console API on {}:{}", address, port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(api::configure)
    })
    .bind((address.as_str(), port))?
    .run();

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Console API error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    service.stop_all();
    info!("Brokerscope shutdown complete");
    Ok(())
}
