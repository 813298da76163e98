//! Configuration for the gateway connection and the change watcher

use std::time::Duration;

use crate::gateway::{SecurityFirm, TrdEnv, TrdMarket};

/// Default gateway host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default gateway port
pub const DEFAULT_PORT: u16 = 11111;

/// Where the trading gateway lives and which session scope to open
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway host
    pub host: String,

    /// Gateway port
    pub port: u16,

    /// Market the default session is filtered to
    pub market: TrdMarket,

    /// Real or simulated trading
    pub env: TrdEnv,

    /// Broker entity of the gateway login
    pub security_firm: SecurityFirm,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            market: TrdMarket::HK,
            env: TrdEnv::Real,
            security_firm: SecurityFirm::FutuSecurities,
            timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// What the watcher does when the gateway itself is unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPolicy {
    /// Stop the watcher on the first connection failure
    FailFast,
    /// Keep polling, doubling the delay between failing cycles up to `max_backoff`
    Retry { max_backoff: Duration },
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self::Retry {
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Display for ConnectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::Retry { max_backoff } => write!(f, "retry (max backoff {:?})", max_backoff),
        }
    }
}

/// Configuration for the change watcher
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Delay between polling cycles
    pub poll_interval: Duration,

    /// Poll all sessions of a cycle at once instead of one after another
    pub concurrent: bool,

    /// Reaction to an unreachable gateway
    pub connection_policy: ConnectionPolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            concurrent: false,
            connection_policy: ConnectionPolicy::default(),
        }
    }
}

impl WatchConfig {
    /// Delay before the next cycle after `failing_cycles` consecutive cycles
    /// that saw a connection failure
    pub fn next_delay(&self, failing_cycles: u32) -> Duration {
        match self.connection_policy {
            ConnectionPolicy::Retry { max_backoff } if failing_cycles > 0 => {
                let factor = 1u32 << failing_cycles.min(16);
                self.poll_interval
                    .saturating_mul(factor)
                    .min(max_backoff.max(self.poll_interval))
            }
            _ => self.poll_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gateway() {
        let config = GatewayConfig::default();
        assert_eq!(config.base_url(), "http://127.0.0.1:11111");
        assert_eq!(config.market, TrdMarket::HK);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = WatchConfig::default();

        assert_eq!(config.next_delay(0), Duration::from_secs(1));
        assert_eq!(config.next_delay(1), Duration::from_secs(2));
        assert_eq!(config.next_delay(3), Duration::from_secs(8));
        assert_eq!(config.next_delay(5), Duration::from_secs(30));
        assert_eq!(config.next_delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_fail_fast_never_backs_off() {
        let config = WatchConfig {
            connection_policy: ConnectionPolicy::FailFast,
            ..Default::default()
        };
        assert_eq!(config.next_delay(4), Duration::from_secs(1));
    }
}
