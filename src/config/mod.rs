//! Agent configuration (layered: defaults > TOML file > env).

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::calculation::rates::FRANKFURTER_BASE_URL;
use crate::error::{CourierError, Result};
use crate::types::AgentAddress;

pub const DEFAULT_AGENT_NAME: &str = "currency_agent";
pub const DEFAULT_REST_BIND: &str = "127.0.0.1:8005";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
const ENV_PREFIX: &str = "COURIER_";

/// How inbound text is turned into conversion parameters.
///
/// Fixed per deployment, never chosen per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProcessingMode {
    /// Parse the text in-process and reply straight away.
    #[default]
    Direct,
    /// Ask an external structured-output agent and reply when it answers.
    Delegated,
}

/// What happens to a delegation that never gets an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExpiryPolicy {
    /// Drop the entry; the requester is never told.
    #[default]
    Silent,
    /// Send the waiting sender a failure reply.
    NotifySender,
}

/// Settings for one agent process.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    #[builder(into, default = DEFAULT_AGENT_NAME.to_string())]
    pub name: String,
    /// Seed the agent address is derived from. Defaults to `<name>_seed`.
    #[builder(into)]
    pub seed: Option<String>,
    #[builder(default)]
    pub mode: ProcessingMode,
    /// Structured-output agent used in delegated mode.
    pub extraction_agent: Option<AgentAddress>,
    #[builder(into, default = FRANKFURTER_BASE_URL.to_string())]
    pub rates_base_url: String,
    #[builder(default = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
    /// Pending delegations older than this are abandoned. `None` keeps them forever.
    pub session_ttl_secs: Option<u64>,
    #[builder(default = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval_secs: u64,
    #[builder(default)]
    pub expiry_policy: ExpiryPolicy,
    #[builder(into, default = DEFAULT_REST_BIND.to_string())]
    pub rest_bind: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AgentSettings {
    /// Parse settings from TOML; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| CourierError::Configuration(format!("invalid config: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CourierError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Resolve the full layered configuration.
    ///
    /// An explicit `path` must exist. Without one, the per-user config file is
    /// used when present. Environment variables (and `.env`) win over both.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Overlay `COURIER_*` variables obtained from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());

        if let Some(name) = var("NAME") {
            self.name = name;
        }
        if let Some(seed) = var("SEED") {
            self.seed = Some(seed);
        }
        if let Some(mode) = var("MODE") {
            self.mode = mode
                .parse()
                .map_err(|_| CourierError::Configuration(format!("unknown mode '{mode}'")))?;
        }
        if let Some(address) = var("EXTRACTION_AGENT").or_else(|| lookup("AI_AGENT_ADDRESS")) {
            self.extraction_agent = Some(AgentAddress::new(address));
        }
        if let Some(url) = var("RATES_BASE_URL") {
            self.rates_base_url = url;
        }
        if let Some(ms) = var("REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_number("REQUEST_TIMEOUT_MS", &ms)?;
        }
        if let Some(secs) = var("SESSION_TTL_SECS") {
            self.session_ttl_secs = Some(parse_number("SESSION_TTL_SECS", &secs)?);
        }
        if let Some(secs) = var("SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = parse_number("SWEEP_INTERVAL_SECS", &secs)?;
        }
        if let Some(policy) = var("EXPIRY_POLICY") {
            self.expiry_policy = policy.parse().map_err(|_| {
                CourierError::Configuration(format!("unknown expiry policy '{policy}'"))
            })?;
        }
        if let Some(bind) = var("REST_BIND") {
            self.rest_bind = bind;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == ProcessingMode::Delegated && self.extraction_agent.is_none() {
            return Err(CourierError::Configuration(
                "delegated mode requires an extraction_agent address".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(CourierError::Configuration(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.session_ttl_secs.is_some() && self.sweep_interval_secs == 0 {
            return Err(CourierError::Configuration(
                "sweep_interval_secs must be positive when a session TTL is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Address derived from the seed.
    pub fn address(&self) -> AgentAddress {
        match &self.seed {
            Some(seed) => AgentAddress::from_seed(seed),
            None => AgentAddress::from_seed(&format!("{}_seed", self.name)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Per-user config file location, e.g. `~/.config/courier/courier.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier")
        .map(|dirs| dirs.config_dir().join("courier.toml"))
}

fn parse_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim().parse().map_err(|_| {
        CourierError::Configuration(format!("{ENV_PREFIX}{name} must be a whole number, got '{raw}'"))
    })
}
