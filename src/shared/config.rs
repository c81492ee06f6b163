//! Application configuration. CRM credentials, server address, fan-out limits.

use crate::domain::RecordingFailurePolicy;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://services.leadconnectorhq.com";
pub const DEFAULT_API_VERSION: &str = "2021-07-28";
pub const DEFAULT_LOCATION_ID: &str = "u05ZSlGlNMllG61fIuW8";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
/// 256 MiB of recording audio held at once.
pub const DEFAULT_RECORDING_STORE_MAX_BYTES: usize = 256 * 1024 * 1024;

/// Explicit configuration for the CRM client. Owned by the gateway; nothing reads the
/// environment at request time.
#[derive(Debug, Clone)]
pub struct GhlClientConfig {
    pub api_base: String,
    pub api_version: String,
    pub token: String,
    pub request_timeout: Duration,
    /// Upper bound on concurrent upstream requests across all callers.
    pub max_in_flight: usize,
}

/// Fan-out limits and failure handling for recording aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationOptions {
    pub contact_concurrency: usize,
    pub conversation_concurrency: usize,
    pub recording_concurrency: usize,
    pub failure_policy: RecordingFailurePolicy,
}

impl AggregationOptions {
    /// One request at a time at every level.
    pub fn sequential() -> Self {
        Self {
            contact_concurrency: 1,
            conversation_concurrency: 1,
            recording_concurrency: 1,
            failure_policy: RecordingFailurePolicy::Tolerate,
        }
    }
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            contact_concurrency: 4,
            conversation_concurrency: 4,
            recording_concurrency: 8,
            failure_policy: RecordingFailurePolicy::Tolerate,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Private integration token. Read from GHL_TOKEN (or GO_HIGH_LEVEL_TOKEN).
    #[serde(default)]
    pub token: Option<String>,

    /// CRM API base URL. Read from GHL_API_BASE.
    #[serde(default)]
    pub api_base: Option<String>,

    /// Value of the `Version` header. Read from GHL_API_VERSION.
    #[serde(default)]
    pub api_version: Option<String>,

    /// Location used when a request does not name one. Read from GHL_DEFAULT_LOCATION_ID.
    #[serde(default)]
    pub default_location_id: Option<String>,

    /// HTTP listen address. Read from GHL_BIND_ADDR.
    #[serde(default)]
    pub bind_addr: Option<String>,

    /// Prefix for `/media/{token}` links. Empty = relative links. Read from GHL_PUBLIC_BASE_URL.
    #[serde(default)]
    pub public_base_url: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Fan-out and rate limiting
    // ─────────────────────────────────────────────────────────────────────────
    /// Contacts aggregated concurrently. Read from GHL_CONTACT_CONCURRENCY.
    #[serde(default)]
    pub contact_concurrency: Option<usize>,

    /// Conversations per contact aggregated concurrently. Read from GHL_CONVERSATION_CONCURRENCY.
    #[serde(default)]
    pub conversation_concurrency: Option<usize>,

    /// Recording downloads per conversation in flight. Read from GHL_RECORDING_CONCURRENCY.
    #[serde(default)]
    pub recording_concurrency: Option<usize>,

    /// Global cap on upstream requests in flight. Read from GHL_MAX_IN_FLIGHT.
    #[serde(default)]
    pub max_in_flight: Option<usize>,

    /// Per-request timeout in seconds. Read from GHL_REQUEST_TIMEOUT_SECS.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Recordings
    // ─────────────────────────────────────────────────────────────────────────
    /// Lifetime of a `/media` link in seconds. Read from GHL_RECORDING_TTL_SECS.
    #[serde(default)]
    pub recording_ttl_secs: Option<u64>,

    /// Cap on recording audio held in memory, in bytes. Read from GHL_RECORDING_STORE_MAX_BYTES.
    #[serde(default)]
    pub recording_store_max_bytes: Option<usize>,

    /// Seconds between expired-recording sweeps. Read from GHL_SWEEP_INTERVAL_SECS.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,

    /// `tolerate` or `fail_fast`. Read from GHL_RECORDING_FAILURE_POLICY.
    #[serde(default)]
    pub recording_failure_policy: Option<RecordingFailurePolicy>,
}

impl AppConfig {
    /// Load from `.env`, the process environment and the optional `GHL_CONFIG` file.
    ///
    /// # Errors
    /// Any malformed value fails the whole load; nothing falls back to defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        Self::from_env(None)
    }

    /// Load from `vars` instead of the process environment when given.
    pub fn from_env(vars: Option<config::Map<String, String>>) -> Result<Self, config::ConfigError> {
        let lookup = |name: &str| match &vars {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        let config_file = lookup("GHL_CONFIG");
        // GO_HIGH_LEVEL_TOKEN is the name existing deployments already export
        let fallback_token = lookup("GO_HIGH_LEVEL_TOKEN");

        let mut c = config::Config::builder().add_source(
            config::Environment::with_prefix("GHL")
                .try_parsing(true)
                .source(vars.clone()),
        );
        if let Some(path) = config_file {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        if cfg.token.as_deref().is_none_or(str::is_empty) {
            cfg.token = fallback_token;
        }
        Ok(cfg)
    }

    /// Returns the CRM token if configured and non-empty.
    pub fn token(&self) -> Option<String> {
        self.token.clone().filter(|t| !t.trim().is_empty())
    }

    pub fn api_base_or_default(&self) -> String {
        non_empty_or(&self.api_base, DEFAULT_API_BASE)
    }

    pub fn api_version_or_default(&self) -> String {
        non_empty_or(&self.api_version, DEFAULT_API_VERSION)
    }

    pub fn default_location_id_or_default(&self) -> String {
        non_empty_or(&self.default_location_id, DEFAULT_LOCATION_ID)
    }

    pub fn bind_addr_or_default(&self) -> String {
        non_empty_or(&self.bind_addr, DEFAULT_BIND_ADDR)
    }

    pub fn public_base_url_or_default(&self) -> String {
        self.public_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_default()
    }

    /// Returns the global in-flight cap. Defaults to 8; never below 1.
    pub fn max_in_flight_or_default(&self) -> usize {
        self.max_in_flight.unwrap_or(8).max(1)
    }

    /// Returns the request timeout. Defaults to 30 seconds.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(30))
    }

    /// Returns the recording link lifetime. Defaults to 15 minutes.
    pub fn recording_ttl(&self) -> Duration {
        Duration::from_secs(self.recording_ttl_secs.unwrap_or(900))
    }

    pub fn recording_store_max_bytes_or_default(&self) -> usize {
        self.recording_store_max_bytes
            .unwrap_or(DEFAULT_RECORDING_STORE_MAX_BYTES)
    }

    /// Prefix for `/media` links served by this process on `addr`.
    ///
    /// `public_base_url` wins when set; an unspecified listen address maps to loopback.
    pub fn media_base_url_for(&self, addr: SocketAddr) -> String {
        let public = self.public_base_url_or_default();
        if !public.is_empty() {
            return public;
        }
        let ip = match addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        format!("http://{}", SocketAddr::new(ip, addr.port()))
    }

    /// Returns the sweep interval. Defaults to 60 seconds; never below 1.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.unwrap_or(60).max(1))
    }

    pub fn aggregation_options(&self) -> AggregationOptions {
        let defaults = AggregationOptions::default();
        AggregationOptions {
            contact_concurrency: self
                .contact_concurrency
                .unwrap_or(defaults.contact_concurrency)
                .max(1),
            conversation_concurrency: self
                .conversation_concurrency
                .unwrap_or(defaults.conversation_concurrency)
                .max(1),
            recording_concurrency: self
                .recording_concurrency
                .unwrap_or(defaults.recording_concurrency)
                .max(1),
            failure_policy: self.recording_failure_policy.unwrap_or_default(),
        }
    }

    /// Returns true if a CRM token is present.
    pub fn is_crm_configured(&self) -> bool {
        self.token().is_some()
    }

    /// Builds the CRM client configuration. `None` when no token is configured.
    pub fn ghl_client_config(&self) -> Option<GhlClientConfig> {
        Some(GhlClientConfig {
            api_base: self.api_base_or_default(),
            api_version: self.api_version_or_default(),
            token: self.token()?,
            request_timeout: self.request_timeout(),
            max_in_flight: self.max_in_flight_or_default(),
        })
    }
}

fn non_empty_or(value: &Option<String>, default: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
        .to_string()
}
