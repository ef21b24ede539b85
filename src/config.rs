//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms set these)
//! 2. Environment variables (APP_SERVER__PORT, APP_CONVERSION__MP3_BITRATE_KBPS, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! The double underscore separates sections from keys, because the keys
//! themselves contain single underscores.

use crate::audio::matrix::{BitDepth, TargetFormat};
use crate::audio::mp3;
use crate::handlers::convert::MIN_WAV_HEADER_BYTES;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Each group maps to one table in `config.toml` (`[server]`, `[conversion]`,
/// `[cors]`), which keeps the file readable and the env var names predictable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub conversion: ConversionConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to
/// - `port`: TCP port number to listen on
/// - `workers`: Number of HTTP worker threads, 0 lets actix-web pick one per core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

/// Settings for the conversion matrix run by `POST /convert`.
///
/// ## Fields:
/// - `formats`: Output containers, in the order they appear in the response
/// - `bit_depths`: Nominal bit depths, in the order they appear per format
/// - `mp3_bitrate_kbps`: Fixed MP3 bitrate, used for every MP3 output regardless of depth
/// - `max_upload_bytes`: Uploads larger than this are rejected while streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    pub formats: Vec<TargetFormat>,
    pub bit_depths: Vec<BitDepth>,
    pub mp3_bitrate_kbps: u32,
    pub max_upload_bytes: usize,
}

/// Cross-Origin Resource Sharing settings.
///
/// `allowed_origins = ["*"]` reflects whatever origin the browser sends, which
/// is what credentialed requests need. List explicit origins to lock it down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub max_age_secs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(), // Localhost only (safe for development)
                port: 8000,
                workers: 0,
            },
            conversion: ConversionConfig {
                formats: vec![TargetFormat::Wav, TargetFormat::Mp3],
                bit_depths: vec![BitDepth::Eight, BitDepth::Sixteen, BitDepth::TwentyFour],
                mp3_bitrate_kbps: 192,
                max_upload_bytes: 50 * 1024 * 1024, // 50MB
            },
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
                max_age_secs: 3600, // Cache preflight results for 1 hour
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__HOST=0.0.0.0`: Override server host
    /// - `APP_CONVERSION__MP3_BITRATE_KBPS=320`: Override the MP3 bitrate
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - The conversion matrix has at least one format and one depth
    /// - The MP3 bitrate is one LAME can actually encode at
    /// - The upload cap leaves room for at least a WAV header
    /// - At least one CORS origin is configured
    ///
    /// ## Why validate:
    /// A bad bitrate would otherwise only show up as every MP3 silently missing
    /// from the results, since per-combination failures never reach the client.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.conversion.formats.is_empty() {
            return Err(anyhow::anyhow!("At least one output format must be configured"));
        }

        if self.conversion.bit_depths.is_empty() {
            return Err(anyhow::anyhow!("At least one output bit depth must be configured"));
        }

        if mp3::bitrate_from_kbps(self.conversion.mp3_bitrate_kbps).is_none() {
            return Err(anyhow::anyhow!(
                "Unsupported MP3 bitrate: {} kbit/s",
                self.conversion.mp3_bitrate_kbps
            ));
        }

        if self.conversion.max_upload_bytes < MIN_WAV_HEADER_BYTES {
            return Err(anyhow::anyhow!(
                "Max upload size must be at least {} bytes",
                MIN_WAV_HEADER_BYTES
            ));
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(anyhow::anyhow!("At least one CORS origin must be configured"));
        }

        Ok(())
    }

    /// Address string handed to `HttpServer::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
