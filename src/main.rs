//! # WAV Depth Converter - Main Application Entry Point
//!
//! This is the entry point for the conversion web server. It sets up an
//! Actix-web HTTP server that takes an uploaded WAV file and returns it
//! re-encoded as WAV and MP3 at 8, 16 and 24 bits.
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: The server is asynchronous; CPU-heavy encoding runs on a blocking pool
//! - **modules**: Code is organized into separate modules (mod statements)
//! - **Result<T, E>**: Error handling using Rust's Result type
//! - **Arc & RwLock**: Thread-safe shared state management
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML files + environment variables)
//! - **state**: Shared application state and metrics
//! - **audio**: WAV decoding, sample width conversion, WAV/MP3 encoding
//! - **handlers**: HTTP request handlers and the routing table
//! - **health**: Health and metrics endpoints
//! - **middleware**: CORS, request logging, metrics
//! - **error**: Custom error types and HTTP error responses

mod audio;       // Decode/encode and the conversion matrix (audio/ directory)
mod config;      // Configuration management (config.rs)
mod error;       // Error handling types (error.rs)
mod handlers;    // HTTP request handlers (handlers/ directory)
mod health;      // Health check endpoints (health.rs)
mod middleware;  // Custom middleware (middleware/ directory)
mod state;       // Application state management (state.rs)

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use crate::config::AppConfig;
use crate::state::AppState;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Creates shared application state** that all requests can access
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
///
/// ## Error Handling:
/// If any step fails (config loading, server binding, etc.), the function returns an error
/// and the program exits with an error message.
#[actix_web::main]
async fn main() -> Result<()> {
    // .ok() means "ignore errors" - it's fine if there's no .env file
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!(
        formats = ?config.conversion.formats,
        bit_depths = ?config.conversion.bit_depths,
        mp3_bitrate_kbps = config.conversion.mp3_bitrate_kbps,
        "Conversion matrix configured"
    );

    let app_state = AppState::new(config.clone());
    let bind_addr = config.bind_addr();
    let cors_config = config.cors.clone();

    info!("Starting HTTP server on {}", bind_addr);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware executes in reverse order of registration for requests
            .wrap(middleware::build_cors(&cors_config))
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure)
    })
    // Our own signal handling below owns shutdown
    .disable_signals();

    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    let server = server.bind(&bind_addr)?.run();
    let server_handle = server.handle();

    // tokio::select! is like a "race" - whichever finishes first wins
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;  // Let in-flight conversions finish
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "wav_depth_converter=trace")
/// - If not set, defaults to "wav_depth_converter=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wav_depth_converter=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Resolve when SIGTERM or SIGINT (Ctrl+C) arrives.
///
/// If a handler cannot be installed the error is logged and this future never
/// resolves, leaving the server running rather than shutting it down at once.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => info!("Received SIGINT"),
                Err(e) => {
                    error!("Failed to listen for SIGINT: {}", e);
                    std::future::pending::<()>().await;
                }
            },
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}
