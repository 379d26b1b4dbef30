use parking_lot::Mutex;
use std::{error::Error as StdError, fmt, sync::Arc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use model::*;
use render::{render_frame, DrawCommand, Frame, RenderConfig};
use turnpath_core::{validate_schema, TrajectoryError, TrajectoryProvider};

use crate::turns::{FetchTicket, ParamChange, TurnHistory};

pub const TRAJECTORY_LOAD_FAILED: &str = "Unable to load trajectory.";
pub const SCHEMA_LOAD_FAILED: &str = "Failed to load metadata";

/// What the user sees when something failed, plus the technical chain that
/// only goes to the log.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchFailure {
    pub message: String,
    pub cause: String,
}

impl FetchFailure {
    pub fn new(message: &str, err: &(dyn StdError + 'static)) -> Self {
        Self { message: message.into(), cause: cause_chain(err) }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.message) }
}

fn cause_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut cur = err.source();
    while let Some(e) = cur {
        let s = e.to_string();
        if parts.last() != Some(&s) {
            parts.push(s);
        }
        cur = e.source();
    }
    parts.join(": ")
}

pub enum SessionState {
    Loading,
    Failed(FetchFailure),
    Ready(Ready),
}

pub struct Ready {
    pub schema: Arc<ParamRangeSchema>,
    pub history: TurnHistory,
    pub loading: bool,
    pub error: Option<FetchFailure>,
}

pub struct Inner {
    pub state: SessionState,
}

impl Inner {
    pub fn ready(&self) -> Option<&Ready> {
        match &self.state {
            SessionState::Ready(r) => Some(r),
            _ => None,
        }
    }

    pub fn ready_mut(&mut self) -> Option<&mut Ready> {
        match &mut self.state {
            SessionState::Ready(r) => Some(r),
            _ => None,
        }
    }

    fn begin_fetch(&mut self) -> Option<(FetchTicket, Arc<ParamRangeSchema>)> {
        let r = self.ready_mut()?;
        r.loading = true;
        r.error = None;
        Some((r.history.ticket(), Arc::clone(&r.schema)))
    }

    pub fn finish_fetch(&mut self, ticket: &FetchTicket, result: Result<Vec<PositionSample>, TrajectoryError>) {
        let Some(r) = self.ready_mut() else { return };
        if !r.history.is_current(ticket) {
            debug!(generation = ticket.generation, "discarding superseded trajectory");
            return;
        }
        r.loading = false;
        match result {
            Ok(positions) => {
                debug!(samples = positions.len(), "trajectory received");
                r.history.apply_fetched(ticket, positions);
                r.error = None;
            }
            Err(e) => {
                let failure = FetchFailure::new(TRAJECTORY_LOAD_FAILED, &e);
                warn!(cause = %failure.cause, "trajectory fetch failed");
                r.history.clear_positions(ticket);
                r.error = Some(failure);
            }
        }
    }
}

/// One interactive session: the turn history plus the single in-flight fetch.
pub struct AppSession {
    pub inner: Mutex<Inner>,
    provider: Arc<dyn TrajectoryProvider>,
    render: RenderConfig,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl AppSession {
    pub fn new(provider: Arc<dyn TrajectoryProvider>, render: RenderConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner { state: SessionState::Loading }),
            provider,
            render,
            pending: Mutex::new(None),
        })
    }

    pub fn provider_name(&self) -> &'static str { self.provider.name() }

    /// Install a freshly loaded schema (or record why it could not be loaded)
    /// and fetch the first turn.
    pub fn schema_loaded(self: &Arc<Self>, result: Result<ParamRangeSchema, TrajectoryError>) {
        let result = result.and_then(|s| validate_schema(&s).map(|_| s));
        {
            let mut inner = self.inner.lock();
            match result {
                Ok(schema) => {
                    info!(backend = self.provider.name(), "schema ready, starting at turn 1");
                    let history = TurnHistory::new(schema.initial_params());
                    inner.state = SessionState::Ready(Ready { schema: Arc::new(schema), history, loading: false, error: None });
                }
                Err(e) => {
                    let failure = FetchFailure::new(SCHEMA_LOAD_FAILED, &e);
                    warn!(cause = %failure.cause, "schema load failed");
                    inner.state = SessionState::Failed(failure);
                    return;
                }
            }
        }
        self.request_fetch();
    }

    /// Fetch the active turn's trajectory, superseding any fetch in flight.
    pub fn request_fetch(self: &Arc<Self>) {
        let Some((ticket, schema)) = self.inner.lock().begin_fetch() else { return };
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = this.provider.fetch(&ticket.params, &schema).await;
            this.inner.lock().finish_fetch(&ticket, result);
        });
        if let Some(prev) = self.pending.lock().replace(handle) {
            prev.abort();
        }
    }

    /// Wait for the in-flight fetch, if any.
    pub async fn settle(&self) {
        let handle = self.pending.lock().take();
        if let Some(h) = handle {
            if let Err(e) = h.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "fetch task failed");
                }
            }
        }
    }

    pub fn change_param(self: &Arc<Self>, change: ParamChange) -> Result<(), String> {
        let refetch = {
            let mut inner = self.inner.lock();
            let r = inner.ready_mut().ok_or_else(not_ready)?;
            r.history.change_param(change)
        };
        if refetch {
            self.request_fetch();
        }
        Ok(())
    }

    pub fn next_step(self: &Arc<Self>) -> Result<bool, String> {
        let advanced = {
            let mut inner = self.inner.lock();
            let r = inner.ready_mut().ok_or_else(not_ready)?;
            r.history.advance()
        };
        if advanced {
            self.request_fetch();
        }
        Ok(advanced)
    }

    pub fn previous_step(self: &Arc<Self>) -> Result<bool, String> {
        let rolled_back = {
            let mut inner = self.inner.lock();
            let r = inner.ready_mut().ok_or_else(not_ready)?;
            r.history.rollback()
        };
        if rolled_back {
            // the turn we return to keeps its trajectory; drop whatever was in flight
            if let Some(h) = self.pending.lock().take() {
                h.abort();
            }
            if let Some(r) = self.inner.lock().ready_mut() {
                r.loading = false;
                r.error = None;
            }
        }
        Ok(rolled_back)
    }

    /// Display list for the current state.
    pub fn frame(&self) -> Result<Vec<DrawCommand>, String> {
        let inner = self.inner.lock();
        let r = inner.ready().ok_or_else(not_ready)?;
        let h = &r.history;
        let all = h.all_positions();
        let previous: Vec<&[PositionSample]> = h.previous().iter().map(|t| t.positions.as_slice()).collect();
        let params = &h.active().params;
        Ok(render_frame(
            &self.render,
            &Frame { positions: &all, previous: &previous, steering: params.steering, scale: params.scale },
        ))
    }

    pub fn render_config(&self) -> &RenderConfig { &self.render }

    /// Snapshot of every turn up to the active one.
    pub fn turns(&self) -> Result<Vec<Turn>, String> {
        let inner = self.inner.lock();
        Ok(inner.ready().ok_or_else(not_ready)?.history.turns().to_vec())
    }
}

fn not_ready() -> String { "session is not ready (schema not loaded)".into() }
