use std::{
    env,
    fs::OpenOptions,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use site_manager::{AppState, build_router, graceful_shutdown, run_billing_scheduler};

/// The REST API server for managing residential sites.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The directory uploaded documents are stored in.
    #[arg(long, default_value = "uploads/documents")]
    upload_dir: PathBuf,

    /// The canonical name of the site's timezone, used to decide the billing day.
    #[arg(long, default_value = "Europe/Istanbul")]
    timezone: String,

    /// How often the billing job checks whether dues should be charged.
    #[arg(long, default_value_t = 24)]
    billing_interval_hours: u64,

    /// Accept the `x-admin-id` and `x-admin-name` headers as the caller's identity for
    /// requests without a bearer token. Only enable this behind a trusted proxy.
    #[arg(long)]
    trust_actor_headers: bool,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let secret = env::var("SECRET").expect("The environment variable 'SECRET' must be set");

    let connection = Connection::open(&args.db_path).unwrap_or_else(|error| {
        panic!("Could not open the database at {}: {error}", args.db_path)
    });
    let state = AppState::new(connection, &secret, &args.timezone, args.upload_dir)
        .expect("Could not initialize the database")
        .with_trusted_actor_headers(args.trust_actor_headers);

    if args.trust_actor_headers {
        tracing::warn!("Trusting x-admin-id and x-admin-name headers for audit logging.");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(run_billing_scheduler(
        state.db_connection.clone(),
        state.local_timezone.clone(),
        Duration::from_secs(args.billing_interval_hours.max(1) * 60 * 60),
        shutdown_rx,
    ));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone(), shutdown_tx));

    let router = add_tracing_layer(build_router(state));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("Server stopped unexpectedly");
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where they are turned into responses.
        .on_failure(());

    router.layer(tracing_layer)
}
