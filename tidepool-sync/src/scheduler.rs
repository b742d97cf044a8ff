//! Debounced scheduling of sync passes across registered projects.
//!
//! Each registered project owns one slot with a three-phase lifecycle:
//! `Idle` until a change arrives, `Debouncing` while the quiet window runs,
//! `Syncing` while a pass is in flight. At most one pass runs per project
//! at any time; a debounce that expires mid-pass is dropped, not queued.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidepool_types::ProjectId;
use tokio::sync::{Mutex, broadcast};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::engine::SyncEngine;
use crate::uploader::SyncOutcome;
use crate::{SyncError, SyncResult};

/// Default quiet window between the last change and the sync pass.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(5);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Where a project currently sits in the sync lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Debouncing,
    Syncing,
}

/// Lifecycle notifications emitted around every sync pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    Started {
        project: ProjectId,
    },
    Completed {
        project: ProjectId,
        outcome: SyncOutcome,
    },
    Failed {
        project: ProjectId,
        message: String,
    },
}

struct ProjectSlot {
    engine: SyncEngine,
    phase: SyncPhase,
    deadline: Option<Instant>,
    timer_armed: bool,
}

struct Shared {
    slots: Mutex<HashMap<ProjectId, ProjectSlot>>,
    events: broadcast::Sender<SyncEvent>,
}

/// Debounce scheduler over any number of registered projects.
///
/// Clones share state; hand one clone to each change-notification source.
#[derive(Clone)]
pub struct SyncScheduler {
    shared: Arc<Shared>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Registers an engine under its project id. Re-registering swaps the
    /// engine in place and keeps the slot's phase and pending deadline.
    pub async fn register(&self, engine: SyncEngine) {
        let mut slots = self.shared.slots.lock().await;
        match slots.entry(engine.project()) {
            Entry::Occupied(mut slot) => slot.get_mut().engine = engine,
            Entry::Vacant(slot) => {
                slot.insert(ProjectSlot {
                    engine,
                    phase: SyncPhase::Idle,
                    deadline: None,
                    timer_armed: false,
                });
            }
        }
    }

    /// Drops a project's slot. An armed timer notices the missing slot on
    /// its next wakeup and exits; an in-flight pass finishes on its own.
    pub async fn deregister(&self, project: ProjectId) {
        self.shared.slots.lock().await.remove(&project);
    }

    /// Records a change notification: starts the debounce window, or pushes
    /// a running window out to a fresh one.
    ///
    /// Notifications for unregistered projects are dropped.
    pub async fn notify_change(&self, project: ProjectId) {
        let mut slots = self.shared.slots.lock().await;
        let Some(slot) = slots.get_mut(&project) else {
            debug!("Change notification for unregistered project {project} dropped");
            return;
        };

        slot.deadline = Some(Instant::now() + slot.engine.config().debounce);
        if slot.phase == SyncPhase::Idle {
            slot.phase = SyncPhase::Debouncing;
        }
        if !slot.timer_armed {
            slot.timer_armed = true;
            tokio::spawn(timer_task(Arc::clone(&self.shared), project));
        }
    }

    /// Runs a pass for `project` immediately, bypassing the debounce and
    /// consuming any pending deadline.
    ///
    /// Fails with [`SyncError::SyncInFlight`] rather than queueing when a
    /// pass is already running.
    pub async fn run_now(&self, project: ProjectId) -> SyncResult<SyncOutcome> {
        let engine = {
            let mut slots = self.shared.slots.lock().await;
            let Some(slot) = slots.get_mut(&project) else {
                return Err(SyncError::ProjectNotRegistered(project));
            };
            if slot.phase == SyncPhase::Syncing {
                return Err(SyncError::SyncInFlight(project));
            }
            slot.deadline = None;
            slot.phase = SyncPhase::Syncing;
            slot.engine.clone()
        };
        run_pass(&self.shared, project, engine).await
    }

    /// Current phase of a project, or `None` if it is not registered.
    pub async fn phase(&self, project: ProjectId) -> Option<SyncPhase> {
        self.shared
            .slots
            .lock()
            .await
            .get(&project)
            .map(|slot| slot.phase)
    }

    /// Subscribes to sync lifecycle events. Slow subscribers miss events
    /// once the channel laps them.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    /// Currently registered projects, in no particular order.
    pub async fn registered_projects(&self) -> Vec<ProjectId> {
        self.shared.slots.lock().await.keys().copied().collect()
    }
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Sleeps out the debounce for one project and fires the pass.
///
/// One timer task exists per slot at most (`timer_armed`). It loops until
/// it observes no pending deadline, and disarms under the same lock
/// acquisition that made that observation, so a notification landing at the
/// same moment either re-arms a fresh task or extends this one.
async fn timer_task(shared: Arc<Shared>, project: ProjectId) {
    loop {
        let deadline = {
            let mut slots = shared.slots.lock().await;
            let Some(slot) = slots.get_mut(&project) else {
                return;
            };
            match slot.deadline {
                Some(deadline) => deadline,
                None => {
                    slot.timer_armed = false;
                    return;
                }
            }
        };

        tokio::time::sleep_until(deadline).await;

        let engine = {
            let mut slots = shared.slots.lock().await;
            let Some(slot) = slots.get_mut(&project) else {
                return;
            };
            match slot.deadline {
                None => continue,
                // Pushed out while we slept.
                Some(current) if current > Instant::now() => continue,
                Some(_) => {}
            }
            slot.deadline = None;
            if slot.phase == SyncPhase::Syncing {
                // A pass is already in flight. The expiry is dropped, not
                // queued; the change rides the next notification.
                debug!("Debounce expired mid-pass for {project}, dropping");
                continue;
            }
            slot.phase = SyncPhase::Syncing;
            slot.engine.clone()
        };

        let _ = run_pass(&shared, project, engine).await;
    }
}

/// Runs one pass under an already-claimed `Syncing` phase and settles the
/// slot back to `Debouncing` or `Idle` depending on whether changes arrived
/// while the pass ran.
async fn run_pass(
    shared: &Arc<Shared>,
    project: ProjectId,
    engine: SyncEngine,
) -> SyncResult<SyncOutcome> {
    let _ = shared.events.send(SyncEvent::Started { project });

    let result = engine.sync_once().await;

    {
        let mut slots = shared.slots.lock().await;
        if let Some(slot) = slots.get_mut(&project) {
            slot.phase = if slot.deadline.is_some() {
                SyncPhase::Debouncing
            } else {
                SyncPhase::Idle
            };
        }
    }

    match &result {
        Ok(outcome) => {
            let _ = shared.events.send(SyncEvent::Completed {
                project,
                outcome: outcome.clone(),
            });
        }
        Err(e) => {
            warn!("Sync pass for {project} failed: {e}");
            let _ = shared.events.send(SyncEvent::Failed {
                project,
                message: e.to_string(),
            });
        }
    }
    result
}
