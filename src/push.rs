//! Push Coordinator: sends a tree to the remote server and writes the results back.
//!
//! Every push goes through the tree's [PushGuard], a two-state machine
//! (`Idle -> Pushing -> Idle`) whose only transition gate is [PushGuard::try_acquire]. The
//! returned [PushTicket] moves the guard back to `Idle` when dropped, whatever way the push
//! ends. A push attempted while another one is running on the same tree is refused without
//! touching the remote server.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    error::AssetTreeError,
    event::TreeEvent,
    remote::{PushJob, PushResultRow, PushRow, RemotePush},
    status::{Action, ErrorMode, Status},
    tree::TreeState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushPhase {
    Idle,
    Pushing,
}

/// Re-entrancy gate for pushes of one tree. Clones share the same state, so a handle can be
/// given to code that might try to push again.
#[derive(Debug, Clone, Default)]
pub struct PushGuard {
    in_progress: Arc<AtomicBool>,
}

impl PushGuard {
    pub fn phase(&self) -> PushPhase {
        if self.in_progress.load(Ordering::Acquire) {
            PushPhase::Pushing
        } else {
            PushPhase::Idle
        }
    }

    /// Move from `Idle` to `Pushing`. Returns `None` if a push is already running.
    pub fn try_acquire(&self) -> Option<PushTicket> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PushTicket {
                in_progress: self.in_progress.clone(),
            })
    }
}

/// Held for the duration of a push. Dropping it returns the guard to `Idle`.
#[derive(Debug)]
pub struct PushTicket {
    in_progress: Arc<AtomicBool>,
}

impl Drop for PushTicket {
    fn drop(&mut self) {
        self.in_progress.store(false, Ordering::Release);
    }
}

/// What a push reports back beyond its message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushReport {
    pub status: Status,
    pub results: Vec<PushResultRow>,
    pub fingerprint: String,
}

/// Result of [PushCoordinator::push], serialized the way the web layer expects:
/// `{"message": ..., "result": {...}}` on success and `{"error": ...}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PushOutcome {
    Completed { message: String, result: PushReport },
    Failed { error: String },
    /// The tree is unchanged since its last successful push; nothing was sent.
    Skipped { message: String },
}

impl PushOutcome {
    pub fn failed(error: &AssetTreeError) -> PushOutcome {
        PushOutcome::Failed {
            error: error.to_string(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PushOutcome::Failed { .. })
    }

    pub fn report(&self) -> Option<&PushReport> {
        match self {
            PushOutcome::Completed { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Serialize a tree into the payload sent to the remote server. The server archives items
/// under the tree's root that the payload no longer contains.
pub fn build_job(state: &TreeState) -> PushJob {
    PushJob {
        workbook: state.workbook().to_string(),
        rows: state.nodes().iter().map(PushRow::from).collect(),
        archive: true,
    }
}

/// SHA-256 of the serialized job, hex encoded.
pub fn fingerprint(job: &PushJob) -> Result<String, AssetTreeError> {
    let payload = serde_json::to_vec(job)?;
    Ok(hex::encode(Sha256::digest(&payload)))
}

#[derive(Debug, Clone, Default)]
pub struct PushCoordinator {
    mode: ErrorMode,
}

impl PushCoordinator {
    pub fn new(mode: ErrorMode) -> PushCoordinator {
        PushCoordinator { mode }
    }

    /// Push the whole tree once. Errors never escape: they come back as
    /// [PushOutcome::Failed].
    pub fn push(&self, state: &mut TreeState, remote: &dyn RemotePush) -> PushOutcome {
        let Some(_ticket) = state.push_guard().try_acquire() else {
            let error = AssetTreeError::ConcurrentPush(state.name().to_string());
            tracing::warn!("[push] {}", error);
            state.emit(TreeEvent::PushRefused(state.name().to_string()));
            return PushOutcome::failed(&error);
        };
        match self.push_locked(state, remote) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!("[push] push of '{}' failed: {}", state.name(), error);
                state.emit(TreeEvent::PushFinished(state.name().to_string(), false));
                PushOutcome::failed(&error)
            }
        }
    }

    fn push_locked(
        &self,
        state: &mut TreeState,
        remote: &dyn RemotePush,
    ) -> Result<PushOutcome, AssetTreeError> {
        let job = build_job(state);
        let sent = fingerprint(&job)?;
        if !state.is_dirty() && state.last_push_fingerprint() == Some(sent.as_str()) {
            tracing::info!("[push] '{}' is unchanged since its last push", state.name());
            return Ok(PushOutcome::Skipped {
                message: format!("Tree '{}' is already up to date", state.name()),
            });
        }

        tracing::debug!("[push] sending {} rows of '{}'", job.rows.len(), state.name());
        state.emit(TreeEvent::PushStarted(state.name().to_string(), job.rows.len()));
        let results = remote.push(&job)?;

        let mut status = Status::new(self.mode);
        for row in results.iter() {
            let key = row.key();
            if !row.is_success() {
                status.catalog(
                    row.full_path(),
                    AssetTreeError::Remote(row.push_result.clone()),
                )?;
                continue;
            }
            let Some(id) = row.id.clone() else {
                status.catalog(
                    row.full_path(),
                    AssetTreeError::Remote("Server reported success without an ID".to_string()),
                )?;
                continue;
            };
            let category = row.item_type.map(|t| t.category());
            if state.assign_remote(&key, id, row.item_type) {
                status.record(category, Action::Pushed);
            } else {
                status.warn(format!("Pushed item '{key}' is not part of the tree"));
            }
        }

        let all_pushed = !status.has_errors();
        if all_pushed {
            // Written-back ids change the payload; fingerprint what the tree now holds.
            let settled = fingerprint(&build_job(state))?;
            state.mark_pushed(settled);
            tracing::info!(
                "Pushed tree '{}' ({} items)",
                state.name(),
                status.total(Action::Pushed)
            );
        } else {
            tracing::warn!(
                "Pushed tree '{}' with {} failed rows",
                state.name(),
                status.errors_encountered()
            );
        }
        state.emit(TreeEvent::PushFinished(state.name().to_string(), all_pushed));

        let message = if all_pushed {
            format!("Successfully pushed tree '{}'", state.name())
        } else {
            format!(
                "Pushed tree '{}' with {} errors",
                state.name(),
                status.errors_encountered()
            )
        };
        Ok(PushOutcome::Completed {
            message,
            result: PushReport {
                status,
                results,
                fingerprint: state
                    .last_push_fingerprint()
                    .map(|f| f.to_string())
                    .unwrap_or(sent),
            },
        })
    }
}
