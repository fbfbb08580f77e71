use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Non-secret settings, read from an optional TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub account_id: String,
    pub history_domain: String,
    pub bot_platform_domain: String,
    pub batch_size: usize,
    pub batch_delay_secs: u64,
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
    pub statuses: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account_id: "52375911".to_owned(),
            history_domain: "lo.msghist.liveperson.net".to_owned(),
            bot_platform_domain: "bot-platform-api.emea.fs.liveperson.com".to_owned(),
            batch_size: 100,
            batch_delay_secs: 5,
            csv_path: PathBuf::from("Output/Conversations.csv"),
            json_path: PathBuf::from("Output/Conversations.json"),
            statuses: vec!["OPEN".to_owned()],
        }
    }
}

impl Config {
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse config TOML")?;
        if config.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than zero");
        }
        Ok(config)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }

    pub fn search_url(&self) -> String {
        format!(
            "https://{}/messaging_history/api/account/{}/conversations/search",
            self.history_domain, self.account_id
        )
    }

    pub fn login_url(&self) -> String {
        format!(
            "https://{}/api/v1/account/{}/login?v=1.3",
            self.bot_platform_domain, self.account_id
        )
    }
}

/// OAuth1 keys for the messaging history API (`LP_APP_KEY`, `LP_APP_SECRET`, ...).
#[derive(Deserialize, Clone)]
pub struct OAuthEnvironment {
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

/// Bot platform login (`LP_BOT_USERNAME`, `LP_BOT_PASSWORD`).
#[derive(Deserialize, Clone)]
pub struct LoginEnvironment {
    pub bot_username: String,
    pub bot_password: String,
}

const ENV_PREFIX: &str = "LP_";

impl OAuthEnvironment {
    pub fn from_env() -> Result<Self> {
        envy::prefixed(ENV_PREFIX)
            .from_env()
            .context("Missing OAuth credentials (LP_APP_KEY, LP_APP_SECRET, LP_ACCESS_TOKEN, LP_ACCESS_TOKEN_SECRET)")
    }
}

impl LoginEnvironment {
    pub fn from_env() -> Result<Self> {
        envy::prefixed(ENV_PREFIX)
            .from_env()
            .context("Missing bot login credentials (LP_BOT_USERNAME, LP_BOT_PASSWORD)")
    }
}
