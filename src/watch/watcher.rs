//! Polling change watcher
//!
//! Polls every session for account info and positions, keeps the last
//! successful result of each as an immutable snapshot and emits an event only
//! when a baseline is first recorded or a later poll differs from it.

use chrono::{DateTime, Local};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use super::diff::{diff_positions, diff_records, FieldChange, PositionChange};
use super::table;
use crate::config::{ConnectionPolicy, GatewayConfig, WatchConfig};
use crate::gateway::{
    AccountInfo, GatewayClient, GatewayError, GatewayResult, PositionRecord, TradingGateway,
};

/// Which of the two per-session snapshots an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Account,
    Position,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotKind::Account => write!(f, "accinfo"),
            SnapshotKind::Position => write!(f, "position"),
        }
    }
}

/// Full snapshot carried by a baseline event
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Account(Arc<AccountInfo>),
    Positions(Arc<Vec<PositionRecord>>),
}

/// Non-empty diff carried by a change event
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Account(Vec<FieldChange>),
    Positions(Vec<PositionChange>),
}

impl Change {
    pub fn kind(&self) -> SnapshotKind {
        match self {
            Change::Account(_) => SnapshotKind::Account,
            Change::Positions(_) => SnapshotKind::Position,
        }
    }
}

/// Event emitted by the watcher
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// First successful poll of a kind for a session
    Baseline {
        session: usize,
        at: DateTime<Local>,
        snapshot: Snapshot,
    },
    /// A later poll differed from the stored snapshot
    Changed {
        session: usize,
        at: DateTime<Local>,
        change: Change,
    },
}

impl WatchEvent {
    pub fn session(&self) -> usize {
        match self {
            WatchEvent::Baseline { session, .. } | WatchEvent::Changed { session, .. } => *session,
        }
    }

    pub fn kind(&self) -> SnapshotKind {
        match self {
            WatchEvent::Baseline {
                snapshot: Snapshot::Account(_),
                ..
            } => SnapshotKind::Account,
            WatchEvent::Baseline {
                snapshot: Snapshot::Positions(_),
                ..
            } => SnapshotKind::Position,
            WatchEvent::Changed { change, .. } => change.kind(),
        }
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, WatchEvent::Baseline { .. })
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchEvent::Baseline {
                session,
                at,
                snapshot: Snapshot::Account(info),
            } => write!(
                f,
                "{} Account info {}\n{}",
                at.format("%Y-%m-%d %H:%M:%S%.3f"),
                session,
                table::render_record(&**info)
            ),
            WatchEvent::Baseline {
                session,
                at,
                snapshot: Snapshot::Positions(rows),
            } => write!(
                f,
                "{} Position info {}\n{}",
                at.format("%Y-%m-%d %H:%M:%S%.3f"),
                session,
                table::render_rows(rows.as_slice())
            ),
            WatchEvent::Changed { session, at, change } => {
                write!(
                    f,
                    "<-- {} diff {} {}",
                    change.kind(),
                    at.format("%Y-%m-%d %H:%M:%S%.3f"),
                    session
                )?;
                match change {
                    Change::Account(changes) => {
                        for c in changes {
                            write!(f, "\n\t{}", c)?;
                        }
                    }
                    Change::Positions(changes) => {
                        for c in changes {
                            write!(f, "\n{}", c)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// Fatal watcher error
#[derive(Debug, Error)]
pub enum WatchError {
    /// Gateway unreachable under the fail-fast policy.
    ///
    /// `events` holds what the failing cycle observed before stopping; their
    /// snapshots are already stored, so they are never reported again.
    #[error("session {session}: {source}")]
    Connection {
        session: usize,
        #[source]
        source: GatewayError,
        events: Vec<WatchEvent>,
    },
}

impl WatchError {
    /// Undelivered events carried by the error
    pub fn events(&self) -> &[WatchEvent] {
        match self {
            WatchError::Connection { events, .. } => events,
        }
    }

    /// Move the undelivered events out of the error
    pub fn take_events(&mut self) -> Vec<WatchEvent> {
        match self {
            WatchError::Connection { events, .. } => std::mem::take(events),
        }
    }
}

/// A gateway connection the watcher polls, with a label for the logs
pub struct Session<G> {
    pub label: String,
    pub gateway: G,
}

impl<G> Session<G> {
    pub fn new(label: impl Into<String>, gateway: G) -> Self {
        Self {
            label: label.into(),
            gateway,
        }
    }
}

impl Session<GatewayClient> {
    /// Session labelled with the client's market/account scope
    pub fn from_client(gateway: GatewayClient) -> Self {
        Self::new(gateway.label(), gateway)
    }
}

/// Per-session state: the connection plus its two cached snapshots
struct SessionState<G> {
    index: usize,
    session: Session<G>,
    account: Option<Arc<AccountInfo>>,
    positions: Option<Arc<Vec<PositionRecord>>>,
}

/// Outcome of polling one session for one cycle
struct SessionPoll {
    events: Vec<WatchEvent>,
    connection_failure: Option<GatewayError>,
}

impl<G: TradingGateway> SessionState<G> {
    async fn poll(&mut self) -> SessionPoll {
        let mut events = Vec::new();
        let mut connection_failure = None;

        // Account and positions are independent: a failed account query
        // still lets the position query run.
        let result = self.session.gateway.query_account_info().await;
        let at = Local::now();
        match result {
            Ok(info) => events.extend(self.observe_account(info, at)),
            Err(e) => self.record_failure(SnapshotKind::Account, at, e, &mut connection_failure),
        }

        let result = self.session.gateway.query_position_list(None).await;
        let at = Local::now();
        match result {
            Ok(rows) => events.extend(self.observe_positions(rows, at)),
            Err(e) => self.record_failure(SnapshotKind::Position, at, e, &mut connection_failure),
        }

        SessionPoll {
            events,
            connection_failure,
        }
    }

    fn observe_account(&mut self, info: AccountInfo, at: DateTime<Local>) -> Option<WatchEvent> {
        let Some(previous) = &self.account else {
            let snapshot = Arc::new(info);
            self.account = Some(Arc::clone(&snapshot));
            return Some(WatchEvent::Baseline {
                session: self.index,
                at,
                snapshot: Snapshot::Account(snapshot),
            });
        };

        let changes = diff_records(&**previous, &info);
        if changes.is_empty() {
            return None;
        }
        self.account = Some(Arc::new(info));
        Some(WatchEvent::Changed {
            session: self.index,
            at,
            change: Change::Account(changes),
        })
    }

    fn observe_positions(
        &mut self,
        rows: Vec<PositionRecord>,
        at: DateTime<Local>,
    ) -> Option<WatchEvent> {
        let Some(previous) = &self.positions else {
            let snapshot = Arc::new(rows);
            self.positions = Some(Arc::clone(&snapshot));
            return Some(WatchEvent::Baseline {
                session: self.index,
                at,
                snapshot: Snapshot::Positions(snapshot),
            });
        };

        let changes = diff_positions(previous.as_slice(), &rows);
        if changes.is_empty() {
            return None;
        }
        self.positions = Some(Arc::new(rows));
        Some(WatchEvent::Changed {
            session: self.index,
            at,
            change: Change::Positions(changes),
        })
    }

    /// Log a failed query; the cached snapshot is left as it was
    fn record_failure(
        &self,
        kind: SnapshotKind,
        at: DateTime<Local>,
        err: GatewayError,
        connection_failure: &mut Option<GatewayError>,
    ) {
        error!(
            "<-- {} error: session {} ({}) at {}: {}",
            err.op(),
            self.index,
            self.session.label,
            at.format("%Y-%m-%d %H:%M:%S%.3f"),
            err
        );
        debug!("Keeping last {} snapshot for session {}", kind, self.index);
        if err.is_connection() && connection_failure.is_none() {
            *connection_failure = Some(err);
        }
    }
}

/// Watches account info and positions of a set of sessions for changes
pub struct ChangeWatcher<G> {
    sessions: Vec<SessionState<G>>,
    config: WatchConfig,
    /// Consecutive cycles that saw a connection failure
    failing_cycles: u32,
    cycles: u64,
}

impl<G: TradingGateway> ChangeWatcher<G> {
    /// Create a watcher over `sessions`; session indices follow list order
    pub fn new(sessions: Vec<Session<G>>, config: WatchConfig) -> Self {
        let sessions = sessions
            .into_iter()
            .enumerate()
            .map(|(index, session)| SessionState {
                index,
                session,
                account: None,
                positions: None,
            })
            .collect();

        Self {
            sessions,
            config,
            failing_cycles: 0,
            cycles: 0,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of completed polling cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Gateway of a session
    pub fn gateway(&self, session: usize) -> Option<&G> {
        self.sessions.get(session).map(|s| &s.session.gateway)
    }

    /// Last stored account snapshot of a session
    pub fn account_snapshot(&self, session: usize) -> Option<Arc<AccountInfo>> {
        self.sessions.get(session)?.account.clone()
    }

    /// Last stored position snapshot of a session
    pub fn position_snapshot(&self, session: usize) -> Option<Arc<Vec<PositionRecord>>> {
        self.sessions.get(session)?.positions.clone()
    }

    /// Poll every session once, without waiting, and return the events.
    ///
    /// Events are ordered by session, account before positions. Under
    /// `ConnectionPolicy::FailFast` the first connection failure is returned
    /// as an error carrying the cycle's events.
    pub async fn poll_cycle(&mut self) -> Result<Vec<WatchEvent>, WatchError> {
        let polls: Vec<SessionPoll> = if self.config.concurrent {
            join_all(self.sessions.iter_mut().map(|s| s.poll())).await
        } else {
            let mut polls = Vec::with_capacity(self.sessions.len());
            for session in self.sessions.iter_mut() {
                polls.push(session.poll().await);
            }
            polls
        };
        self.cycles += 1;

        let mut events = Vec::new();
        let mut first_failure = None;
        for (session, poll) in polls.into_iter().enumerate() {
            events.extend(poll.events);
            if let Some(source) = poll.connection_failure {
                first_failure.get_or_insert((session, source));
            }
        }

        self.failing_cycles = if first_failure.is_some() {
            self.failing_cycles.saturating_add(1)
        } else {
            0
        };

        match first_failure {
            Some((session, source))
                if self.config.connection_policy == ConnectionPolicy::FailFast =>
            {
                Err(WatchError::Connection {
                    session,
                    source,
                    events,
                })
            }
            _ => Ok(events),
        }
    }

    /// Delay before the next cycle under the configured policy
    pub fn next_delay(&self) -> std::time::Duration {
        self.config.next_delay(self.failing_cycles)
    }

    /// Run `cycles` cycles (wait, then poll) and collect their events.
    ///
    /// On a fatal error every event collected so far travels with the error.
    pub async fn run_cycles(&mut self, cycles: usize) -> Result<Vec<WatchEvent>, WatchError> {
        let mut events = Vec::new();
        for _ in 0..cycles {
            tokio::time::sleep(self.next_delay()).await;
            match self.poll_cycle().await {
                Ok(cycle_events) => events.extend(cycle_events),
                Err(mut err) => {
                    events.extend(err.take_events());
                    let WatchError::Connection { session, source, .. } = err;
                    return Err(WatchError::Connection {
                        session,
                        source,
                        events,
                    });
                }
            }
        }
        Ok(events)
    }

    /// Poll until `shutdown` fires or the event receiver goes away.
    ///
    /// Each cycle waits for the poll interval first, then polls all sessions
    /// and forwards their events to `events`. A fatal cycle still forwards
    /// what it observed before the error is returned.
    pub async fn run(
        &mut self,
        events: mpsc::Sender<WatchEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), WatchError> {
        info!(
            "Change watcher starting: {} session(s), interval {:?}, {}, connection policy {}",
            self.sessions.len(),
            self.config.poll_interval,
            if self.config.concurrent { "concurrent" } else { "sequential" },
            self.config.connection_policy
        );

        loop {
            let delay = self.next_delay();
            if delay > self.config.poll_interval {
                warn!(
                    "Gateway unreachable for {} cycle(s), next poll in {:?}",
                    self.failing_cycles, delay
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    info!("Change watcher received shutdown signal after {} cycle(s)", self.cycles);
                    return Ok(());
                }
            }

            let (cycle_events, fatal) = match self.poll_cycle().await {
                Ok(cycle_events) => (cycle_events, None),
                Err(mut err) => (err.take_events(), Some(err)),
            };

            for event in cycle_events {
                if events.send(event).await.is_err() {
                    info!("Event receiver dropped, stopping change watcher");
                    return Ok(());
                }
            }

            if let Some(err) = fatal {
                return Err(err);
            }
        }
    }
}

impl ChangeWatcher<GatewayClient> {
    /// Watch `sessions`, or a single session for the configured market when
    /// none are given
    pub async fn with_default_session(
        sessions: Vec<Session<GatewayClient>>,
        gateway: &GatewayConfig,
        config: WatchConfig,
    ) -> GatewayResult<Self> {
        if !sessions.is_empty() {
            return Ok(Self::new(sessions, config));
        }
        info!("No sessions given, watching the {} market", gateway.market);
        let client = GatewayClient::connect(gateway).await?;
        Ok(Self::new(vec![Session::from_client(client)], config))
    }
}
