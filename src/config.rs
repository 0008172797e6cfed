use std::env;
use std::fmt;

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub model_path: String,
    pub gemini_api_key: Option<String>,
    pub advisory_timeout_secs: u64,
    pub summary_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "aqualert_classifier.json".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.is_empty() && !key.contains("YOUR_API_KEY_HERE")),
            advisory_timeout_secs: env::var("ADVISORY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            summary_seed: env::var("SUMMARY_SEED").ok().and_then(|s| s.parse().ok()),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

// Manual impl so the API key never ends up in startup logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("model_path", &self.model_path)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_deref().map(|_| "***"),
            )
            .field("advisory_timeout_secs", &self.advisory_timeout_secs)
            .field("summary_seed", &self.summary_seed)
            .finish()
    }
}
