/// Roster Server - seeded user roster demo with request-scoped tracing
use axum::{middleware as axum_middleware, routing::get, Router};
use clap::{Parser, Subcommand};
use opentelemetry::trace::Span as _;
use roster_server::{api, config::ServerConfig, middleware, services::ProfileLoader, state::AppState};
use roster_telemetry::Telemetry;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "roster-server")]
#[command(about = "Seeded user roster demo server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Seed the profile store with the demo dataset
    Seed,
    /// List stored profiles
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "roster_server=info,roster_telemetry=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            serve().await?;
        }
        Commands::Seed => {
            seed().await?;
        }
        Commands::List => {
            list().await?;
        }
    }

    Ok(())
}

async fn serve() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::load()?;
    config.validate()?;

    tracing::info!("Starting Roster Server");
    tracing::info!("Host: {}", config.server.host);
    tracing::info!("Port: {}", config.server.port);
    tracing::info!("Environment: {}", config.telemetry.environment);

    // Telemetry first so request handling can hand out trace contexts
    let telemetry = Arc::new(Telemetry::new(&config.telemetry));

    // Connect the profile store. No migrations run here: the table is
    // created by the seed fallback on the first read that misses it.
    let pool = roster_storage::create_pool(&config.storage.url).await?;
    tracing::info!("Profile store connected");

    let loader = Arc::new(ProfileLoader::new(pool));

    // Build application state
    let app_state = AppState::new(loader, Arc::clone(&telemetry));

    // Build router
    let app = create_router(app_state);

    // Create server address
    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    tracing::info!("Server listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    telemetry.shutdown();

    Ok(())
}

fn create_router(app_state: AppState) -> Router {
    // Every route runs inside a trace session opened by the telemetry
    // middleware; the session is reported when the response is ready.
    let routes = Router::new()
        .route("/health", get(api::health::health))
        .route("/profiles", get(api::profiles::list_profiles))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            middleware::telemetry_middleware,
        ));

    Router::new()
        .nest("/api", routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

async fn seed() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    config.validate()?;

    let telemetry = Telemetry::new(&config.telemetry);
    let pool = roster_storage::create_pool(&config.storage.url).await?;

    let mut span = telemetry.start_span("seed-profiles");
    let inserted = roster_storage::seed::seed(&pool).await?;
    span.end();

    println!("Seeded {} new profiles", inserted);

    telemetry.shutdown();
    Ok(())
}

async fn list() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    config.validate()?;

    let pool = roster_storage::create_pool(&config.storage.url).await?;
    let profiles = match roster_storage::profiles::fetch_all(&pool).await {
        Ok(profiles) => profiles,
        Err(err) if err.is_missing_table() => {
            println!("Profile store is empty (run `roster-server seed` first)");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!("Profiles:");
    for profile in profiles {
        println!(
            "  {} <{}> joined {}",
            profile.name, profile.email, profile.created_at
        );
    }

    Ok(())
}
