//! API Gateway for the settlement engine

use std::sync::Arc;

use axum::Router;
use clap::Parser;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use account_service::AccountService;
use market_service::MarketService;

use api_gateway::api;
use api_gateway::config::AppConfig;
use api_gateway::{api_routes, AppState};

/// API documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Account routes
        api::account::register,
        api::account::deposit,
        api::account::get_holdings,
        api::account::buy,
        api::account::sell,
        // Market routes
        api::market::get_instruments,
        api::market::add_instrument,
        api::market::update_count,
        api::market::update_price,
    ),
    components(
        schemas(
            // Account API
            api::account::RegisterRequest,
            api::account::DepositRequest,
            api::account::BalanceResponse,
            api::account::TradeRequest,
            common::model::account::AccountInfo,
            common::model::holding::Holding,
            common::model::holding::HoldingView,

            // Market API
            api::market::AddInstrumentRequest,
            api::market::UpdateCountRequest,
            api::market::UpdatePriceRequest,
            common::model::instrument::Instrument,
            common::model::instrument::InstrumentView,

            // Response models
            api::response::ApiResponse<common::model::account::AccountInfo>,
            api::response::ApiResponse<common::model::holding::Holding>,
            api::response::ApiResponse<common::model::instrument::Instrument>,
            api::response::ApiListResponse<common::model::holding::HoldingView>,
            api::response::ApiListResponse<common::model::instrument::InstrumentView>
        )
    ),
    tags(
        (name = "account", description = "Account management endpoints"),
        (name = "trade", description = "Trade settlement endpoints"),
        (name = "market", description = "Instrument catalog endpoints")
    ),
    info(
        title = "Settlement Engine API",
        version = "1.0.0",
        description = "API for the stock settlement engine allowing account management, trade settlement, and instrument catalog access"
    )
)]
struct ApiDoc;

/// Settlement engine API server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Listening address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    addr: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging with debug level when DEBUG=1 env var is set
    let env = std::env::var("DEBUG").unwrap_or_else(|_| "0".to_string());
    let log_level = if env == "1" { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .parse("tower_http=debug,api_gateway=debug")
        .unwrap();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    debug!("Debug logging enabled");

    // Initialize services with in-memory stores; the market service doubles
    // as the settlement counterparty for the account service
    let _config = AppConfig::new();
    let market_service = Arc::new(MarketService::new());
    let account_service = Arc::new(AccountService::new(market_service.clone()));

    // Close out trades interrupted by a previous shutdown
    let recovered = account_service
        .recover_pending()
        .await
        .expect("Failed to recover pending trades");
    if recovered > 0 {
        info!("Recovered {} pending trades on startup", recovered);
    }

    // Create app state
    let state = Arc::new(AppState {
        account_service,
        market_service,
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Set up Swagger UI
    let swagger_ui = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi());

    // Combine all routes
    let app = Router::new()
        .nest("/api/v1", api_routes())
        .merge(swagger_ui)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(log_level))
                .on_request(DefaultOnRequest::new().level(log_level))
                .on_response(DefaultOnResponse::new().level(log_level)),
        )
        .with_state(state);

    // Start the server
    let addr: std::net::SocketAddr = args.addr.parse().expect("Invalid address");
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    // Run until interrupt signal
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

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
