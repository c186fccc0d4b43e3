use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use taskmate_types::models::TaskStatus;

use crate::config::{DedupPolicy, ReminderConfig};
use crate::error::{ReminderError, Result};
use crate::notifier::Notifier;
use crate::store::{ReminderTask, TaskStore};
use crate::threshold::{Notification, Threshold};

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Scanning,
    Stopped,
}

/// A notification that could not be delivered during a cycle.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub task_id: String,
    pub threshold: Threshold,
    pub error: ReminderError,
}

/// Outcome of one scan over the task store.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub scanned: usize,
    /// Tasks whose delta matched a threshold.
    pub due: usize,
    pub sent: usize,
    pub skipped_duplicate: usize,
    pub skipped_no_recipient: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl CycleReport {
    fn log(&self) {
        if self.due == 0 {
            debug!("Reminder cycle: scanned {} tasks, nothing due", self.scanned);
            return;
        }
        info!(
            "Reminder cycle: scanned {}, due {}, sent {}, duplicates {}, no recipient {}, failed {}",
            self.scanned,
            self.due,
            self.sent,
            self.skipped_duplicate,
            self.skipped_no_recipient,
            self.failures.len()
        );
    }
}

pub struct ReminderEngine {
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    config: ReminderConfig,
    today: Clock,
}

impl ReminderEngine {
    pub fn new(store: Arc<dyn TaskStore>, notifier: Arc<dyn Notifier>, config: ReminderConfig) -> Self {
        Self {
            store,
            notifier,
            config,
            today: Arc::new(|| Local::now().date_naive()),
        }
    }

    /// Replace the server-local date source.
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    /// Run one cycle against the clock's current date.
    pub async fn run_once(&self) -> Result<CycleReport> {
        self.run_once_for((self.today)()).await
    }

    /// Scan every task and notify owners whose task is 3, 1, or 0 days out.
    ///
    /// Delivery failures are collected in the report and never stop the scan.
    /// A store failure aborts the cycle with [`ReminderError::DataAccess`].
    pub async fn run_once_for(&self, today: NaiveDate) -> Result<CycleReport> {
        let store = self.store.clone();
        let tasks = blocking(move || store.all_tasks()).await?;

        let mut report = CycleReport {
            scanned: tasks.len(),
            ..Default::default()
        };

        for task in &tasks {
            if self.config.skip_completed && task.status == TaskStatus::Completed {
                continue;
            }

            let delta = Threshold::delta_days(task.due_date, today);
            let Some(threshold) = Threshold::for_delta(delta) else {
                continue;
            };
            report.due += 1;

            let Some(recipient) = task.recipient.as_deref() else {
                warn!("Task '{}' has no owner email, skipping '{}' reminder", task.task_id, threshold.subject());
                report.skipped_no_recipient += 1;
                continue;
            };

            if self.config.dedup == DedupPolicy::PerThreshold && self.already_sent(task, threshold).await? {
                report.skipped_duplicate += 1;
                continue;
            }

            let notification = Notification::for_task(task, threshold, recipient);
            match self.deliver(&notification).await {
                Ok(()) => {
                    report.sent += 1;
                    if self.config.dedup == DedupPolicy::PerThreshold {
                        self.record_sent(task, threshold).await;
                    }
                }
                Err(e) => {
                    warn!(
                        "Reminder '{}' for task '{}' to {} failed: {}",
                        notification.subject, task.task_id, recipient, e
                    );
                    report.failures.push(DeliveryFailure {
                        task_id: task.task_id.clone(),
                        threshold,
                        error: e,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn already_sent(&self, task: &ReminderTask, threshold: Threshold) -> Result<bool> {
        let store = self.store.clone();
        let task_id = task.task_id.clone();
        let due_date = task.due_date;
        blocking(move || store.already_sent(&task_id, threshold, due_date)).await
    }

    /// The message is already out, so a ledger failure only risks a repeat.
    async fn record_sent(&self, task: &ReminderTask, threshold: Threshold) {
        let store = self.store.clone();
        let task_id = task.task_id.clone();
        let due_date = task.due_date;
        if let Err(e) = blocking(move || store.record_sent(&task_id, threshold, due_date)).await {
            warn!("Could not record '{}' reminder for task '{}': {}", threshold.subject(), task.task_id, e);
        }
    }

    /// Send with a per-attempt timeout, retrying transient failures with
    /// exponential backoff.
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.retry_backoff;
        let mut attempt = 1;

        loop {
            let sent = tokio::time::timeout(
                self.config.send_timeout,
                self.notifier.send(&notification.subject, &notification.body, &notification.recipient),
            )
            .await;

            let err = match sent {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => ReminderError::from(e),
                Err(_) => ReminderError::Timeout(self.config.send_timeout),
            };

            if !err.is_transient() || attempt >= max_attempts {
                return Err(err);
            }

            debug!(
                "Attempt {}/{} to {} failed ({}), retrying in {:?}",
                attempt, max_attempts, notification.recipient, err, backoff
            );
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
            attempt += 1;
        }
    }

    /// Spawn the polling loop. The first cycle runs immediately.
    pub fn start(self: Arc<Self>) -> ReminderHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(EngineState::Idle);
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            info!(
                "Reminder engine started (interval {:?}, dedup {:?})",
                self.config.interval, self.config.dedup
            );
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                state_tx.send_replace(EngineState::Scanning);

                // Own task per cycle so a panic surfaces as a JoinError
                let engine = self.clone();
                let mut cycle = tokio::spawn(async move { engine.run_once().await });

                let outcome = tokio::select! {
                    res = &mut cycle => res,
                    _ = token.cancelled() => {
                        cycle.abort();
                        break;
                    }
                };

                match outcome {
                    Ok(Ok(report)) => report.log(),
                    Ok(Err(e)) => error!("Reminder cycle skipped: {}", e),
                    Err(e) => error!("Reminder cycle aborted: {}", e),
                }

                state_tx.send_replace(EngineState::Idle);
            }

            state_tx.send_replace(EngineState::Stopped);
            info!("Reminder engine stopped");
        });

        ReminderHandle {
            cancel,
            state: state_rx,
            task,
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ReminderError::DataAccess(format!("store task failed: {}", e)))?
        .map_err(|e| ReminderError::DataAccess(format!("{:#}", e)))
}

/// Control handle for a running engine.
pub struct ReminderHandle {
    cancel: CancellationToken,
    state: watch::Receiver<EngineState>,
    task: JoinHandle<()>,
}

impl ReminderHandle {
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }

    /// Cancel the loop and wait for it to exit. An in-flight cycle is
    /// abandoned at its next await point.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Reminder engine task ended abnormally: {}", e);
        }
    }
}
