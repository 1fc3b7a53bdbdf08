//! swelld — the Swell daemon.
//!
//! Single binary that assembles the autoscaler:
//! - Kubernetes config store (ConfigMap read/write/watch)
//! - Kubernetes scale executor (Deployment / HPA writes)
//! - Gauge registry + Prometheus scrape endpoint
//! - Admin form for editing replica bounds
//! - The control-loop supervisor
//!
//! The HTTP server lives for the whole process; only the control loops
//! are rebuilt when the configuration changes. A fatal supervisor
//! error is logged and terminates the process with a non-zero status.
//!
//! # Usage
//!
//! ```text
//! swelld --port 5000 --config-map config
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use tracing::{error, info};

use swell_admin::AdminState;
use swell_config::ConfigStore;
use swell_control::{ControlLoopFactory, ScaleExecutor, Supervisor};
use swell_kube::{KubeConfigStore, KubeScaleExecutor};
use swell_metrics::GaugeRegistry;

#[derive(Parser)]
#[command(name = "swelld", about = "Backlog-driven workload autoscaler")]
struct Cli {
    /// Port for the metrics and admin HTTP server.
    #[arg(long, default_value = "5000")]
    port: u16,

    /// Name of the ConfigMap holding the workload entries.
    #[arg(long, default_value = "config")]
    config_map: String,

    /// Namespace to operate in; defaults to the client's namespace.
    #[arg(long)]
    namespace: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,swelld=debug,swell=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let (client, default_namespace) = swell_kube::connect().await?;
    let namespace = cli.namespace.unwrap_or(default_namespace);
    info!(%namespace, config_map = %cli.config_map, "swell daemon starting");

    let gauges = Arc::new(GaugeRegistry::new());
    let store: Arc<dyn ConfigStore> = Arc::new(KubeConfigStore::new(
        client.clone(),
        &namespace,
        &cli.config_map,
    ));
    let executor: Arc<dyn ScaleExecutor> = Arc::new(KubeScaleExecutor::new(client));
    let factory = ControlLoopFactory::new(gauges.clone(), executor);
    let supervisor = Supervisor::new(store.clone(), factory);

    // The scrape endpoint and admin form live for the process
    // lifetime; supervisor rebuilds never touch them.
    let router = build_router(gauges, store);
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "metrics and admin server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "http server failed");
        }
    });

    if let Err(err) = supervisor.run().await {
        error!(error = %err, "supervisor failed");
        return Err(err.into());
    }
    Ok(())
}

fn build_router(gauges: Arc<GaugeRegistry>, store: Arc<dyn ConfigStore>) -> Router {
    let metrics = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(gauges);
    Router::new()
        .merge(metrics)
        .nest("/admin", swell_admin::admin_router(AdminState { store }))
}

async fn metrics_handler(State(gauges): State<Arc<GaugeRegistry>>) -> impl IntoResponse {
    match gauges.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
