//! Configuration module for the OSCE gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use osce_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use crate::core::realtime::RealtimeVendor;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Default base URL for the chat-completion API
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat-completion model used for text chat, assessment and case generation
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default realtime speech model
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Default input transcription model for realtime sessions
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Realtime relay settings
///
/// VAD fields left as `None` fall back to the selected vendor's defaults.
#[derive(Debug, Clone)]
pub struct RealtimeSettings {
    pub vendor: RealtimeVendor,
    pub model: String,
    /// Overrides the vendor endpoint (used for self-hosted proxies and tests)
    pub url: Option<String>,
    pub transcription_model: String,
    pub vad_threshold: Option<f32>,
    pub vad_prefix_padding_ms: Option<u32>,
    pub vad_silence_duration_ms: Option<u32>,
    /// Seconds a socket may stay connected without reaching the ready state
    pub unconfigured_timeout_seconds: u64,
    /// Seconds without traffic before a configured session is closed
    pub idle_timeout_seconds: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            vendor: RealtimeVendor::OpenAI,
            model: DEFAULT_REALTIME_MODEL.to_string(),
            url: None,
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            vad_threshold: None,
            vad_prefix_padding_ms: None,
            vad_silence_duration_ms: None,
            unconfigured_timeout_seconds: 30,
            idle_timeout_seconds: 300,
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port, TLS)
/// - Provider credentials (OpenAI, Azure OpenAI)
/// - Realtime relay settings
/// - Case seed directory
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Provider credentials
    /// OpenAI API key for chat completions and the Realtime API
    pub openai_api_key: Option<String>,
    /// Azure OpenAI resource key (sent as `api-key`)
    pub azure_openai_api_key: Option<String>,
    /// Azure OpenAI resource endpoint, e.g. `https://my-resource.openai.azure.com`
    pub azure_openai_endpoint: Option<String>,
    /// Azure deployment name of the realtime model
    pub azure_openai_deployment: Option<String>,

    // Chat completions
    pub openai_base_url: String,
    pub chat_model: String,
    pub chat_max_tokens: u32,
    pub chat_temperature: f32,

    // Realtime relay
    pub realtime: RealtimeSettings,

    // Case storage
    /// Directory of `*.json` case files loaded into the store at startup
    pub cases_dir: Option<PathBuf>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

/// Zeroize secret fields when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.azure_openai_api_key {
            key.zeroize();
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            openai_api_key: None,
            azure_openai_api_key: None,
            azure_openai_endpoint: None,
            azure_openai_deployment: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chat_max_tokens: 300,
            chat_temperature: 0.7,
            realtime: RealtimeSettings::default(),
            cases_dir: None,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and defaults)
    ///
    /// The `.env` file is loaded by `main` before this is called, so its values
    /// are visible here as ordinary environment variables.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Get the API key for a specific provider
    ///
    /// # Arguments
    /// * `provider` - `"openai"` or `"azure"` (case-insensitive)
    ///
    /// # Returns
    /// * `Result<String, String>` - The API key on success, or an error message on failure
    pub fn get_api_key(&self, provider: &str) -> Result<String, String> {
        match provider.to_lowercase().as_str() {
            "openai" => self
                .openai_api_key
                .as_ref()
                .filter(|key| !key.trim().is_empty())
                .cloned()
                .ok_or_else(|| "OpenAI API key not configured in server environment".to_string()),
            "azure" | "azure-openai" => self
                .azure_openai_api_key
                .as_ref()
                .filter(|key| !key.trim().is_empty())
                .cloned()
                .ok_or_else(|| {
                    "Azure OpenAI API key not configured in server environment".to_string()
                }),
            _ => Err(format!("Unsupported provider: {provider}")),
        }
    }

    /// Credential for the configured realtime vendor
    pub fn realtime_api_key(&self) -> Result<String, String> {
        self.get_api_key(self.realtime.vendor.as_str())
    }

    /// Whether the configured realtime vendor has a credential
    pub fn has_realtime_credentials(&self) -> bool {
        self.realtime_api_key().is_ok()
    }
}
