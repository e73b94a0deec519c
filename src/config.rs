//! Engine and server configuration.
//!
//! Defaults follow the timings observed against the real sites: a
//! 10 s wait for listings to render, 5 s between retries and between
//! rounds, and a three-round budget before an aggregation is reported
//! incomplete. `max_rounds = None` with no deadline restores the
//! retry-forever behavior wanted for long-running batch use.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

use crate::engine::RetryPolicy;

/// Tuning knobs of the aggregation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long adapters wait for their listing containers to appear.
    pub wait_timeout: Duration,
    /// Default retry parameters handed to the adapters.
    pub retry: RetryPolicy,
    /// Pause between incomplete rounds.
    pub round_delay: Duration,
    /// Round cap; `None` retries until complete (or deadline).
    pub max_rounds: Option<u32>,
    /// Wall-clock budget for one run; `None` means no deadline.
    pub deadline: Option<Duration>,
    /// Run each source in its own task against its own session
    /// instead of sequentially over one shared session.
    pub parallel_sources: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            round_delay: Duration::from_secs(5),
            max_rounds: Some(3),
            deadline: None,
            parallel_sources: false,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_round_delay(mut self, delay: Duration) -> Self {
        self.round_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_parallel_sources(mut self, parallel: bool) -> Self {
        self.parallel_sources = parallel;
        self
    }

    /// Reject configurations that cannot make progress.
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == Some(0) {
            anyhow::bail!("max_rounds must be at least 1 when set");
        }
        if let Some(deadline) = self.deadline {
            if deadline.is_zero() {
                anyhow::bail!("deadline must be non-zero when set");
            }
        }
        Ok(())
    }

    /// Build the engine config from `AUTOVITRINE_*` environment
    /// variables, starting from the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(rounds) = read_env("AUTOVITRINE_MAX_ROUNDS")? {
            config.max_rounds = if rounds == 0 { None } else { Some(rounds) };
        }
        if let Some(secs) = read_env("AUTOVITRINE_DEADLINE_SECS")? {
            config.deadline = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = read_env("AUTOVITRINE_ROUND_DELAY_SECS")? {
            config.round_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = read_env("AUTOVITRINE_WAIT_TIMEOUT_SECS")? {
            config.wait_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = read_env("AUTOVITRINE_MAX_RETRIES")? {
            config.retry.max_retries = retries;
        }
        if let Some(secs) = read_env("AUTOVITRINE_RETRY_DELAY_SECS")? {
            config.retry.retry_delay = Duration::from_secs(secs);
        }
        if let Ok(value) = std::env::var("AUTOVITRINE_PARALLEL_SOURCES") {
            config.parallel_sources = matches!(value.as_str(), "1" | "true" | "yes");
        }
        config.validate()?;
        Ok(config)
    }
}

/// Process-level settings of the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub headless: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // The original service listened on 3000.
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            headless: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("AUTOVITRINE_LISTEN") {
            config.listen_addr = addr
                .parse()
                .with_context(|| format!("invalid AUTOVITRINE_LISTEN address: {addr}"))?;
        }
        if let Ok(value) = std::env::var("AUTOVITRINE_HEADFUL") {
            config.headless = !matches!(value.as_str(), "1" | "true" | "yes");
        }
        Ok(config)
    }
}

fn read_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => {
            let parsed = value
                .parse()
                .with_context(|| format!("invalid {name} value: {value}"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_round_cap_is_rejected() {
        let config = EngineConfig::default().with_max_rounds(Some(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn unbounded_config_is_allowed() {
        let config = EngineConfig::default()
            .with_max_rounds(None)
            .with_deadline(None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_deadline_is_rejected() {
        let config = EngineConfig::default().with_deadline(Some(Duration::ZERO));
        assert!(config.validate().is_err());
    }
}
