//! votebox server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use votebox_api::{TallyBroadcaster, middleware::AppState, router as api_router};
use votebox_common::Config;
use votebox_core::{IdentityService, PollService, TallyCache, VoteService};
use votebox_db::repositories::{
    PollOptionRepository, PollRepository, UserRepository, VoteRepository,
};

/// How often unused poll channels and cached tallies are pruned.
const CHANNEL_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "votebox=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting votebox server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(votebox_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    votebox_db::migrate(&db).await?;
    info!("Migrations completed");

    // Repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let option_repo = PollOptionRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));

    // Services
    let tally_cache = Arc::new(TallyCache::new());
    let tally_broadcaster = TallyBroadcaster::new();

    let identity_service = IdentityService::new(user_repo, &config.auth);

    let mut poll_service = PollService::new(
        poll_repo,
        option_repo,
        vote_repo.clone(),
        Arc::clone(&tally_cache),
    );
    poll_service.set_event_publisher(Arc::new(tally_broadcaster.clone()));

    let mut vote_service = VoteService::new(vote_repo, Arc::clone(&tally_cache));
    vote_service.set_event_publisher(Arc::new(tally_broadcaster.clone()));

    let state = AppState {
        identity_service,
        poll_service,
        vote_service,
        tally_broadcaster: tally_broadcaster.clone(),
        auth: config.auth.clone(),
    };

    // Prune poll channels whose streams have all closed, then the tallies
    // of polls nobody is watching
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHANNEL_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            tally_broadcaster.cleanup().await;
            let watched = tally_broadcaster.poll_ids().await;
            let dropped = tally_cache.prune(|poll_id| watched.contains(poll_id)).await;
            if dropped > 0 {
                debug!(dropped, "Pruned unwatched poll tallies");
            }
        }
    });

    let app = Router::new()
        .nest("/api", api_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
