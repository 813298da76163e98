//! Account and position change watching
//!
//! # Components
//!
//! - [`watcher`] - Polling loop with per-session snapshot caches
//! - [`diff`] - Field and row diffs between snapshots
//! - [`fields`] - Field-level view of gateway records and the placeholder predicate
//! - [`table`] - Console rendering of records
//!
//! # Usage
//!
//! ```rust,ignore
//! use gateway_watch::{ChangeWatcher, Session, WatchConfig};
//!
//! let client = GatewayClient::connect(&GatewayConfig::default()).await?;
//! let sessions = vec![Session::from_client(client)];
//! let mut watcher = ChangeWatcher::new(sessions, WatchConfig::default());
//!
//! let (tx, mut rx) = mpsc::channel(256);
//! let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//! tokio::spawn(async move { while let Some(event) = rx.recv().await { println!("{}", event) } });
//! watcher.run(tx, shutdown_rx).await?;
//! ```

pub mod diff;
pub mod fields;
pub mod table;
pub mod watcher;

pub use diff::{diff_positions, diff_records, FieldChange, PositionChange, PositionKey};
pub use fields::{FieldValue, Record};
pub use watcher::{Change, ChangeWatcher, Session, Snapshot, SnapshotKind, WatchError, WatchEvent};
