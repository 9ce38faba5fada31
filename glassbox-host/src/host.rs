//! Preview host: one per preview request. Owns the episode lifecycle and
//! publishes the current outcome through a watch channel.
//!
//! Every distinct input starts a new episode with its own token; the token
//! gates every state write, so stale timers and callbacks from a superseded
//! episode can never clobber a newer result.

use crate::config::PreviewConfig;
use crate::context::{ExecutionContext, LoadSignal};
use crate::outcome::{Inspection, Outcome, OutcomeDetector};
use glassbox_source::prepare;
use log::{debug, info, warn};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

struct HostState {
    /// Raw input of the episode currently owning the outcome.
    last_input: Option<String>,
    /// Monotonic episode token; a settle is honored only while it matches.
    episode: u64,
    /// Whether the current episode has recorded its terminal outcome.
    settled: bool,
    /// Cancel flag of the live execution context, if any.
    live_cancel: Option<Arc<AtomicBool>>,
}

struct Shared {
    config: PreviewConfig,
    request_id: Uuid,
    outcome_tx: watch::Sender<Outcome>,
    state: Mutex<HostState>,
}

/// Handle for a single preview request.
pub struct PreviewHost {
    shared: Arc<Shared>,
}

impl PreviewHost {
    pub fn new(config: PreviewConfig) -> Self {
        let (outcome_tx, _) = watch::channel(Outcome::Loading);
        Self {
            shared: Arc::new(Shared {
                config,
                request_id: Uuid::new_v4(),
                outcome_tx,
                state: Mutex::new(HostState {
                    last_input: None,
                    episode: 0,
                    settled: false,
                    live_cancel: None,
                }),
            }),
        }
    }

    /// Normalize, build and execute `raw`. Re-submitting the byte-identical
    /// input after the previous episode settled is a no-op.
    pub fn submit(&self, raw: &str) {
        let shared = self.shared.clone();
        let episode;
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut state = match shared.state.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            if state.settled && state.last_input.as_deref() == Some(raw) {
                debug!(
                    "[preview {}] unchanged input, keeping episode {}",
                    shared.request_id, state.episode
                );
                return;
            }
            if let Some(live) = state.live_cancel.take() {
                live.store(true, std::sync::atomic::Ordering::Relaxed);
            }
            state.episode += 1;
            state.settled = false;
            state.last_input = Some(raw.to_string());
            state.live_cancel = Some(cancel.clone());
            episode = state.episode;
            // Published under the lock so a stale `Loading` can never land
            // after a newer episode's terminal outcome.
            let _ = shared.outcome_tx.send(Outcome::Loading);
        }

        let document = prepare(raw);
        info!(
            "[preview {}] episode {} starting as '{}'",
            shared.request_id,
            episode,
            document.identifier()
        );

        tokio::spawn(run_episode(shared, episode, document, cancel));
    }

    /// Latest published outcome.
    pub fn outcome(&self) -> Outcome {
        self.shared.outcome_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Outcome> {
        self.shared.outcome_tx.subscribe()
    }

    /// Number of episodes started so far.
    pub fn episodes(&self) -> u64 {
        self.shared
            .state
            .lock()
            .map(|state| state.episode)
            .unwrap_or(0)
    }

    /// Cancel the live episode, if any. The outcome channel keeps its last
    /// value; nothing settles after detach, and an explicit re-submission of
    /// the same input starts a fresh episode.
    pub fn detach(&self) {
        if let Ok(mut state) = self.shared.state.lock() {
            state.settled = true;
            state.last_input = None;
            if let Some(live) = state.live_cancel.take() {
                live.store(true, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }
}

impl Drop for PreviewHost {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Record the terminal outcome for `episode`, unless a newer episode took
/// over or this one already settled.
fn settle(shared: &Arc<Shared>, episode: u64, outcome: Outcome) {
    let mut state = match shared.state.lock() {
        Ok(guard) => guard,
        Err(_) => return,
    };
    if state.episode != episode || state.settled {
        debug!(
            "[preview {}] dropping stale settle for episode {}",
            shared.request_id, episode
        );
        return;
    }
    state.settled = true;
    if let Some(live) = state.live_cancel.take() {
        live.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    match &outcome {
        Outcome::Success => info!(
            "[preview {}] episode {} succeeded",
            shared.request_id, episode
        ),
        Outcome::Error(message) => warn!(
            "[preview {}] episode {} failed: {}",
            shared.request_id, episode, message
        ),
        Outcome::Loading => {}
    }
    let _ = shared.outcome_tx.send(outcome);
}

async fn run_episode(
    shared: Arc<Shared>,
    episode: u64,
    document: glassbox_source::ExecutionDocument,
    cancel: Arc<AtomicBool>,
) {
    let config = shared.config.clone();
    let mut context = ExecutionContext::launch(document, &config, cancel);
    let timeout = Duration::from_millis(config.load_timeout_ms);

    let signal = tokio::select! {
        signal = context.loaded() => signal,
        _ = tokio::time::sleep(timeout) => {
            settle(
                &shared,
                episode,
                Outcome::Error(format!(
                    "preview timed out after {}ms",
                    config.load_timeout_ms
                )),
            );
            return;
        }
    };

    match signal {
        LoadSignal::Failed(message) => {
            settle(
                &shared,
                episode,
                Outcome::Error(format!("failed to load preview: {}", message)),
            );
            return;
        }
        LoadSignal::TimedOut => {
            settle(
                &shared,
                episode,
                Outcome::Error(format!(
                    "preview timed out after {}ms",
                    config.execution_budget_ms
                )),
            );
            return;
        }
        LoadSignal::Loaded => {}
    }

    // Let late asynchronous rendering (queued effects, state-driven
    // re-render) finish before judging the mount.
    tokio::time::sleep(Duration::from_millis(config.settle_delay_ms)).await;

    let detector = OutcomeDetector::new(config.error_excerpt_limit);
    let snapshot = context.snapshot();
    let outcome = match detector.inspect(&snapshot) {
        Inspection::Populated | Inspection::Unverifiable => Outcome::Success,
        Inspection::Failed(message) => Outcome::Error(message),
        Inspection::Empty => {
            // Could still be mounting; give it one more chance.
            tokio::time::sleep(Duration::from_millis(config.empty_recheck_delay_ms)).await;
            match detector.inspect(&snapshot) {
                Inspection::Empty => Outcome::Error(
                    "component rendered but appears empty, it may have failed silently"
                        .to_string(),
                ),
                Inspection::Failed(message) => Outcome::Error(message),
                Inspection::Populated | Inspection::Unverifiable => Outcome::Success,
            }
        }
    };

    settle(&shared, episode, outcome);
}
