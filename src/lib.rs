// Library crate - exports the gateway client, change watcher and trader helpers

pub mod config;
pub mod gateway;
pub mod trader;
pub mod watch;

// Re-export commonly used types
pub use config::{ConnectionPolicy, GatewayConfig, WatchConfig};
pub use gateway::{GatewayClient, GatewayError, TradingGateway};
pub use trader::Trader;
pub use watch::{ChangeWatcher, Session, WatchError, WatchEvent};
