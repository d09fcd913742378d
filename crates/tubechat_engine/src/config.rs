use tubechat_core::PollPolicy;

use crate::ClientSettings;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub api_base_url: String,
    pub client: ClientSettings,
    pub job_polling: PollPolicy,
    pub collection_polling: PollPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            client: ClientSettings::default(),
            job_polling: PollPolicy::job_default(),
            collection_polling: PollPolicy::collection_default(),
        }
    }
}
