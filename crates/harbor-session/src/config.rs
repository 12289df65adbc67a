use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{Result, SessionError};

/// Tunables for an orchestrator.
///
/// Loaded from defaults, then an optional TOML file, then `HARBOR_*`
/// environment variables, later layers winning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_concurrent_downloads: usize,
    pub max_retry_count:          u32,
    pub retry_delay_base_ms:      u64,
    pub download_timeout_secs:    u64,
    pub session_timeout_secs:     u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 64,
            max_retry_count:          3,
            retry_delay_base_ms:      1000,
            download_timeout_secs:    60,
            session_timeout_secs:     2 * 60 * 60,
        }
    }
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let config: EngineConfig = figment.merge(Env::prefixed("HARBOR_")).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(SessionError::InvalidConfig(
                "max_concurrent_downloads must be at least 1".into(),
            ));
        }
        if self.max_retry_count == 0 {
            return Err(SessionError::InvalidConfig("max_retry_count must be at least 1".into()));
        }
        if self.download_timeout_secs == 0 || self.session_timeout_secs == 0 {
            return Err(SessionError::InvalidConfig("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    pub fn retry_delay_base(&self) -> Duration { Duration::from_millis(self.retry_delay_base_ms) }

    pub fn download_timeout(&self) -> Duration { Duration::from_secs(self.download_timeout_secs) }

    pub fn session_timeout(&self) -> Duration { Duration::from_secs(self.session_timeout_secs) }
}

/// Shared, observable [`EngineConfig`].
///
/// Orchestrators built from a handle pick up every accepted update: the
/// concurrency limit and transfer timeout apply immediately, retry settings
/// from the next unit that starts.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<EngineConfig>>,
}

impl ConfigHandle {
    pub fn new(config: EngineConfig) -> Self { Self { tx: Arc::new(watch::Sender::new(config)) } }

    pub fn current(&self) -> EngineConfig { self.tx.borrow().clone() }

    /// Apply `f` to a copy of the current config and publish it if valid.
    pub fn update(&self, f: impl FnOnce(&mut EngineConfig)) -> Result<()> {
        let mut next = self.current();
        f(&mut next);
        self.replace(next)
    }

    pub fn replace(&self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        self.tx.send_if_modified(|current| {
            if *current == config {
                return false;
            }
            *current = config;
            true
        });
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineConfig> { self.tx.subscribe() }
}

impl Default for ConfigHandle {
    fn default() -> Self { Self::new(EngineConfig::default()) }
}
