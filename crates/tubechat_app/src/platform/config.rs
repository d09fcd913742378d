//! Optional RON configuration file for the `tubechat` binary.
//!
//! Every field has a default, so a partial file such as
//! `(api_base_url: "https://videos.example/api")` is valid.

use std::fs;
use std::path::Path;
use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use serde::{Deserialize, Serialize};
use tubechat_core::{BackoffSchedule, PollPolicy};
use tubechat_engine::{ClientSettings, EngineConfig, DEFAULT_API_BASE_URL};

pub const DEFAULT_CONFIG_FILE: &str = "tubechat.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub stream_read_timeout_ms: u64,
    pub max_upload_bytes: u64,
    pub job_polling: JobPolling,
    pub collection_polling: CollectionPolling,
}

/// Additive backoff for per-video status polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPolling {
    pub base_ms: u64,
    pub step_ms: u64,
    pub cap_ms: u64,
    pub max_attempts: u32,
    pub max_consecutive_errors: u32,
}

/// Multiplicative backoff for project list refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionPolling {
    pub base_ms: u64,
    pub factor: f64,
    pub cap_ms: u64,
    pub max_exponent: u32,
    pub max_attempts: u32,
    pub max_consecutive_errors: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            connect_timeout_ms: millis(client.connect_timeout),
            request_timeout_ms: millis(client.request_timeout),
            stream_read_timeout_ms: millis(client.stream_read_timeout),
            max_upload_bytes: client.max_upload_bytes,
            job_polling: JobPolling::default(),
            collection_polling: CollectionPolling::default(),
        }
    }
}

impl Default for JobPolling {
    fn default() -> Self {
        let policy = PollPolicy::job_default();
        let (base, step, cap) = match policy.schedule {
            BackoffSchedule::Additive { base, step, cap } => (base, step, cap),
            BackoffSchedule::Multiplicative { base, cap, .. } => (base, Duration::ZERO, cap),
        };
        Self {
            base_ms: millis(base),
            step_ms: millis(step),
            cap_ms: millis(cap),
            max_attempts: policy.max_attempts,
            max_consecutive_errors: policy.max_consecutive_errors,
        }
    }
}

impl Default for CollectionPolling {
    fn default() -> Self {
        let policy = PollPolicy::collection_default();
        let (base, factor, cap, max_exponent) = match policy.schedule {
            BackoffSchedule::Multiplicative {
                base,
                factor,
                cap,
                max_exponent,
            } => (base, factor, cap, max_exponent),
            BackoffSchedule::Additive { base, cap, .. } => (base, 1.0, cap, 0),
        };
        Self {
            base_ms: millis(base),
            factor,
            cap_ms: millis(cap),
            max_exponent,
            max_attempts: policy.max_attempts,
            max_consecutive_errors: policy.max_consecutive_errors,
        }
    }
}

impl AppConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            api_base_url: self.api_base_url.clone(),
            client: ClientSettings {
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                request_timeout: Duration::from_millis(self.request_timeout_ms),
                stream_read_timeout: Duration::from_millis(self.stream_read_timeout_ms),
                max_upload_bytes: self.max_upload_bytes,
            },
            job_polling: PollPolicy {
                schedule: BackoffSchedule::Additive {
                    base: Duration::from_millis(self.job_polling.base_ms),
                    step: Duration::from_millis(self.job_polling.step_ms),
                    cap: Duration::from_millis(self.job_polling.cap_ms),
                },
                max_attempts: self.job_polling.max_attempts,
                max_consecutive_errors: self.job_polling.max_consecutive_errors,
            },
            collection_polling: PollPolicy {
                schedule: BackoffSchedule::Multiplicative {
                    base: Duration::from_millis(self.collection_polling.base_ms),
                    factor: self.collection_polling.factor,
                    cap: Duration::from_millis(self.collection_polling.cap_ms),
                    max_exponent: self.collection_polling.max_exponent,
                },
                max_attempts: self.collection_polling.max_attempts,
                max_consecutive_errors: self.collection_polling.max_consecutive_errors,
            },
        }
    }
}

/// Reads the config file. A missing file yields defaults silently; an
/// unreadable or invalid one yields defaults with a warning.
pub fn load_config(path: &Path) -> AppConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return AppConfig::default();
        }
        Err(err) => {
            engine_warn!("Failed to read config from {:?}: {}", path, err);
            return AppConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            engine_info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            engine_warn!("Failed to parse config from {:?}: {}", path, err);
            AppConfig::default()
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
