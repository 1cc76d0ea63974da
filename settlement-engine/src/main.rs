//! Settlement engine integration module
//!
//! Runs both settlement services in one process behind the API gateway:
//! the market service holds the instrument catalog and the account service
//! settles trades against it through the settlement contract.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use clap::Parser;
use dotenv::dotenv;
use rust_decimal_macros::dec;
use tokio::signal;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

use account_service::AccountService;
use market_service::MarketService;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Run with demo data
    #[clap(short, long)]
    demo: bool,
}

// Static variable to track service start time
static START_TIME: AtomicU64 = AtomicU64::new(0);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing with debug level if DEBUG=1 in .env
    let env_debug = std::env::var("DEBUG").unwrap_or_else(|_| "0".to_string());
    let log_level = if env_debug == "1" { Level::DEBUG } else { Level::INFO };

    // Create an environment filter
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .parse("tower_http=debug,api_gateway=debug,market_service=debug,account_service=debug")
        .unwrap();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .finish();

    // Only set the global subscriber if it hasn't been set already
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        info!("Tracing initialized");
        if env_debug == "1" {
            debug!("Debug logging enabled");
        }
    }

    info!("Starting Settlement Engine...");

    // Initialize service start time for uptime tracking
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    START_TIME.store(now, Ordering::Relaxed);

    // Initialize services; the market service is the settlement counterparty
    // of the account service
    let market_service = Arc::new(MarketService::new());
    let account_service = Arc::new(AccountService::new(market_service.clone()));

    // Close out trades interrupted by a previous shutdown before taking traffic
    let recovered = account_service.recover_pending().await?;
    if recovered > 0 {
        info!("Recovered {} pending trades on startup", recovered);
    }

    // Create demo data if requested
    if args.demo {
        info!("Creating demo data...");
        create_demo_data(&market_service, &account_service).await?;
    }

    // Start API server in a separate task
    let api_handle = {
        let market_service = market_service.clone();
        let account_service = account_service.clone();

        tokio::spawn(async move {
            // Create app state
            let state = Arc::new(api_gateway::AppState {
                account_service,
                market_service,
            });

            // Set up CORS
            let cors = tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any);

            // Combine the health check with the gateway routes
            let app = axum::Router::new()
                .nest(
                    "/api/v1",
                    api_gateway::api_routes()
                        .route("/health", axum::routing::get(health_check)),
                )
                .layer(cors)
                .layer(
                    tower_http::trace::TraceLayer::new_for_http()
                        .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(log_level))
                        .on_request(tower_http::trace::DefaultOnRequest::new().level(log_level))
                        .on_response(tower_http::trace::DefaultOnResponse::new().level(log_level)),
                )
                .with_state(state);

            // Parse address to listen on
            let port = std::env::var("API_PORT").unwrap_or_else(|_| "8081".to_string());
            let port: u16 = port.parse().expect("Invalid API_PORT value");
            info!("Starting API server on 0.0.0.0:{}", port);
            let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();

            // Start the server
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .expect("Failed to bind to address");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .expect("Server error");
        })
    };

    // Wait for the API server to finish
    api_handle.await?;

    info!("Shutting down");
    Ok(())
}

// Health check endpoint
async fn health_check(State(state): State<Arc<api_gateway::AppState>>) -> impl IntoResponse {
    let start_time = Instant::now();

    // Check if the account service is responsive
    let as_start = Instant::now();
    let account_service_status = match state.account_service.get_account("__health__").await {
        // Any answer means the ledger store is reachable
        Ok(_) => "up",
        Err(_) => "down",
    };
    let account_service_latency = as_start.elapsed().as_millis() as u64;

    // Check if the market service is responsive
    let ms_start = Instant::now();
    let (market_service_status, instrument_count) =
        match state.market_service.list_instruments().await {
            Ok(instruments) => ("up", instruments.len()),
            Err(_) => ("down", 0),
        };
    let market_service_latency = ms_start.elapsed().as_millis() as u64;

    // Overall status depends on both services
    let overall_status = if account_service_status == "up" && market_service_status == "up" {
        "healthy"
    } else {
        "degraded"
    };

    // Get system metrics
    let memory_usage = get_memory_usage_mb();
    let uptime = get_uptime_seconds();

    // Total response time for this health check
    let total_latency = start_time.elapsed().as_millis() as u64;

    // Build the health information JSON
    let health_info = serde_json::json!({
        "status": overall_status,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime,
        "services": {
            "account_service": {
                "status": account_service_status,
                "latency_ms": account_service_latency
            },
            "market_service": {
                "status": market_service_status,
                "latency_ms": market_service_latency
            }
        },
        "instruments": {
            "total": instrument_count
        },
        "system": {
            "memory_usage_mb": memory_usage,
        },
        "health_check_latency_ms": total_latency
    });

    if overall_status == "healthy" {
        (axum::http::StatusCode::OK, Json(health_info))
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(health_info))
    }
}

// Helper function to get uptime in seconds; START_TIME is stored in main
// before the server starts
fn get_uptime_seconds() -> u64 {
    let current_start = START_TIME.load(Ordering::Relaxed);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    now.saturating_sub(current_start)
}

// Helper function to get memory usage in MB
fn get_memory_usage_mb() -> u64 {
    #[cfg(target_os = "linux")]
    {
        use std::fs::File;
        use std::io::Read;

        if let Ok(mut file) = File::open("/proc/self/status") {
            let mut contents = String::new();
            if let Ok(_) = file.read_to_string(&mut contents) {
                if let Some(line) = contents.lines().find(|l| l.starts_with("VmRSS:")) {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<u64>() {
                            return kb / 1024; // Convert KB to MB
                        }
                    }
                }
            }
        }
    }

    // Default if we can't get the actual usage or not on Linux
    0
}

/// Create demo data for testing
async fn create_demo_data(
    market_service: &Arc<MarketService>,
    account_service: &Arc<AccountService>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Seed the instrument catalog
    market_service
        .add_instrument("ACME", "NYSE", dec!(1000), dec!(5.00))
        .await?;
    market_service
        .add_instrument("GLOBEX", "NASDAQ", dec!(500), dec!(12.50))
        .await?;

    info!("Seeded demo instruments");

    // Create two demo accounts with funds
    let alice = account_service.register("alice").await?;
    let bob = account_service.register("bob").await?;

    account_service.add_funds("alice", dec!(1000)).await?;
    account_service.add_funds("bob", dec!(1000)).await?;

    info!(
        "Created demo accounts: alice (registered {}), bob (registered {})",
        alice.registered_at, bob.registered_at
    );

    // Settle a demo trade on each side
    account_service
        .buy("alice", "ACME", dec!(10), dec!(5.00))
        .await?;
    account_service
        .buy("bob", "GLOBEX", dec!(4), dec!(12.50))
        .await?;
    account_service
        .sell("bob", "GLOBEX", dec!(1), dec!(12.50))
        .await?;

    info!("Demo data created successfully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
