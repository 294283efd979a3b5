//! Per-folder recurring triggers
//!
//! Each active folder configuration gets its own trigger loop. A firing
//! claims the folder's run lock, takes the first pending item from the
//! scanner and hands it to the upload pipeline. Firings that find the folder
//! running or quota-suspended are skipped. Different folders run
//! concurrently and only meet at the shared rate limiter.
//!
//! Configuration changes take effect through a full [`Scheduler::initialize`].

use chrono::{DateTime, Local, Utc};
use cron::Schedule;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::errors::{AppError, AppResult};
use crate::ledger::FolderConfigProvider;
use crate::models::FolderConfig;
use crate::pipeline::{UploadOutcome, UploadPipeline};
use crate::scanner::FolderScanner;
use crate::utils::cron_helper::{next_fire_time, parse_schedule};

pub mod run_state;

pub use run_state::{RunGuard, RunState, RunStateStore, SkipReason};

/// `tokio::time::interval` rejects a zero period
const MIN_STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// What one trigger firing did
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    SkippedRunning,
    SkippedSuspended { until: DateTime<Utc> },
    NoPendingItems,
    Processed(UploadOutcome),
    /// Scan or ledger failure; logged and contained to this folder
    Errored(String),
}

struct ScheduledJob {
    folder: FolderConfig,
    schedule: Schedule,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct SchedulerStats {
    firings: AtomicU64,
    skipped: AtomicU64,
    processed: AtomicU64,
    completed: AtomicU64,
    already_published: AtomicU64,
    failed: AtomicU64,
    quota_suspensions: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub firings: u64,
    pub skipped: u64,
    pub processed: u64,
    pub completed: u64,
    pub already_published: u64,
    pub failed: u64,
    pub quota_suspensions: u64,
    pub errors: u64,
}

impl SchedulerStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            firings: self.firings.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            already_published: self.already_published.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            quota_suspensions: self.quota_suspensions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub folder_id: Uuid,
    pub folder_name: String,
    pub cron_expression: String,
    pub next_fire_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuspensionStatus {
    pub folder_id: Uuid,
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub active_jobs: Vec<JobStatus>,
    pub running_folders: Vec<Uuid>,
    pub suspensions: Vec<SuspensionStatus>,
    pub stats: StatsSnapshot,
}

pub struct Scheduler {
    provider: Arc<dyn FolderConfigProvider>,
    scanner: FolderScanner,
    pipeline: Arc<UploadPipeline>,
    run_states: Arc<RunStateStore>,
    jobs: RwLock<HashMap<Uuid, ScheduledJob>>,
    shutdown_token: CancellationToken,
    stats: SchedulerStats,
    started_at: DateTime<Utc>,
    status_interval: Duration,
}

impl Scheduler {
    pub fn new(
        provider: Arc<dyn FolderConfigProvider>,
        scanner: FolderScanner,
        pipeline: Arc<UploadPipeline>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            provider,
            scanner,
            pipeline,
            run_states: Arc::new(RunStateStore::new()),
            jobs: RwLock::new(HashMap::new()),
            shutdown_token: CancellationToken::new(),
            stats: SchedulerStats::default(),
            started_at: Utc::now(),
            status_interval: config.status_interval.max(MIN_STATUS_INTERVAL),
        }
    }

    /// Replace all triggers with one per active folder configuration
    ///
    /// Returns the number of registered jobs. Folders with an unparseable
    /// trigger expression are logged and left out.
    pub async fn initialize(self: &Arc<Self>) -> AppResult<usize> {
        info!("Initializing folder scheduler");

        // Held until every job is registered so overlapping calls cannot
        // leave an untracked trigger loop behind
        let mut jobs = self.jobs.write().await;
        join_trigger_loops(cancel_jobs(&mut jobs)).await;
        self.run_states.clear_all();

        let configs = self.provider.active_folder_configs().await?;
        info!("Found {} active folder configuration(s)", configs.len());

        for folder in configs {
            let schedule = match parse_schedule(&folder.cron_expression) {
                Ok(schedule) => schedule,
                Err(e) => {
                    warn!(
                        "Folder '{}' has invalid trigger expression '{}': {}",
                        folder.name, folder.cron_expression, e
                    );
                    continue;
                }
            };

            let token = self.shutdown_token.child_token();
            let handle = tokio::spawn(run_trigger_loop(
                Arc::downgrade(self),
                folder.clone(),
                schedule.clone(),
                token.clone(),
            ));

            info!(
                "Scheduled folder '{}' ({}) with '{}', next run at {:?}",
                folder.name,
                folder.path,
                folder.cron_expression,
                next_fire_time(&schedule, &Local::now())
            );

            if let Some(replaced) = jobs.insert(
                folder.id,
                ScheduledJob {
                    folder,
                    schedule,
                    token,
                    handle,
                },
            ) {
                replaced.token.cancel();
            }
        }

        let count = jobs.len();
        info!("Scheduler initialized with {} job(s)", count);
        Ok(count)
    }

    /// Stop every trigger loop; runs already in flight finish on their own
    pub async fn cancel_all_jobs(&self) {
        let handles = cancel_jobs(&mut *self.jobs.write().await);
        join_trigger_loops(handles).await;
    }

    /// Stop all trigger loops and the status reporter
    pub async fn shutdown(&self) {
        info!("Shutting down folder scheduler");
        self.shutdown_token.cancel();
        self.cancel_all_jobs().await;
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Run a folder's trigger handler right away
    pub async fn trigger_now(&self, folder_id: Uuid) -> AppResult<TriggerOutcome> {
        let scheduled = self
            .jobs
            .read()
            .await
            .get(&folder_id)
            .map(|job| job.folder.clone());

        let folder = match scheduled {
            Some(folder) => folder,
            None => self
                .provider
                .active_folder_configs()
                .await?
                .into_iter()
                .find(|f| f.id == folder_id)
                .ok_or_else(|| AppError::not_found("active folder configuration", folder_id.to_string()))?,
        };

        Ok(self.fire_at(&folder, Utc::now()).await)
    }

    /// The trigger handler, evaluated as of `now`
    pub async fn fire_at(&self, folder: &FolderConfig, now: DateTime<Utc>) -> TriggerOutcome {
        SchedulerStats::bump(&self.stats.firings);

        let _guard = match self.run_states.try_begin(folder.id, now) {
            Ok(guard) => guard,
            Err(SkipReason::Running) => {
                info!(
                    "Folder '{}' is still processing, skipping this run",
                    folder.name
                );
                SchedulerStats::bump(&self.stats.skipped);
                return TriggerOutcome::SkippedRunning;
            }
            Err(SkipReason::Suspended { until }) => {
                info!(
                    "Folder '{}' is suspended for quota until {}, skipping this run",
                    folder.name, until
                );
                SchedulerStats::bump(&self.stats.skipped);
                return TriggerOutcome::SkippedSuspended { until };
            }
        };

        let item = match self.scanner.next_pending(Path::new(&folder.path)).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                debug!("No pending items in folder '{}'", folder.name);
                return TriggerOutcome::NoPendingItems;
            }
            Err(e) => {
                error!("Failed to scan folder '{}': {}", folder.name, e);
                SchedulerStats::bump(&self.stats.errors);
                return TriggerOutcome::Errored(e.to_string());
            }
        };

        info!("Processing '{}' from folder '{}'", item.name, folder.name);
        SchedulerStats::bump(&self.stats.processed);

        match self.pipeline.process(folder, &item).await {
            Ok(outcome) => {
                match &outcome {
                    UploadOutcome::Completed { .. } => SchedulerStats::bump(&self.stats.completed),
                    UploadOutcome::AlreadyPublished { .. } => {
                        SchedulerStats::bump(&self.stats.already_published)
                    }
                    UploadOutcome::Failed { .. } => SchedulerStats::bump(&self.stats.failed),
                    UploadOutcome::QuotaSuspended { resume_at, .. } => {
                        warn!(
                            "Suspending folder '{}' until {} after quota exhaustion",
                            folder.name, resume_at
                        );
                        self.run_states.suspend(folder.id, *resume_at);
                        SchedulerStats::bump(&self.stats.quota_suspensions);
                    }
                }
                TriggerOutcome::Processed(outcome)
            }
            Err(e) => {
                error!(
                    "Error processing '{}' from folder '{}': {}",
                    item.name, folder.name, e
                );
                SchedulerStats::bump(&self.stats.errors);
                TriggerOutcome::Errored(e.to_string())
            }
        }
    }

    pub fn run_state(&self, folder_id: Uuid) -> RunState {
        self.run_states.get(folder_id)
    }

    pub async fn active_job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn status(&self) -> SchedulerStatus {
        let now = Utc::now();
        let local_now = Local::now();

        let mut active_jobs: Vec<JobStatus> = self
            .jobs
            .read()
            .await
            .values()
            .map(|job| JobStatus {
                folder_id: job.folder.id,
                folder_name: job.folder.name.clone(),
                cron_expression: job.folder.cron_expression.clone(),
                next_fire_at: next_fire_time(&job.schedule, &local_now),
            })
            .collect();
        active_jobs.sort_by(|a, b| a.folder_name.cmp(&b.folder_name));

        SchedulerStatus {
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_seconds(),
            active_jobs,
            running_folders: self.run_states.running_folders(),
            suspensions: self
                .run_states
                .suspensions(now)
                .into_iter()
                .map(|(folder_id, until)| SuspensionStatus { folder_id, until })
                .collect(),
            stats: self.stats.snapshot(),
        }
    }

    /// Log a status line every `scheduler.status_interval` until shutdown
    pub fn spawn_status_reporter(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::downgrade(self);
        let token = self.shutdown_token.clone();
        let period = self.status_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(strong) = scheduler.upgrade() else { break };
                        let status = strong.status().await;
                        info!(
                            "Scheduler status: {} active job(s), {} running, {} suspended, {} firing(s), {} completed, {} failed, uptime {}s",
                            status.active_jobs.len(),
                            status.running_folders.len(),
                            status.suspensions.len(),
                            status.stats.firings,
                            status.stats.completed,
                            status.stats.failed,
                            status.uptime_secs
                        );
                    }
                }
            }
        })
    }
}

/// Cancel and remove every job, returning the handles of their trigger loops
fn cancel_jobs(jobs: &mut HashMap<Uuid, ScheduledJob>) -> Vec<JoinHandle<()>> {
    jobs.drain()
        .map(|(_, job)| {
            debug!("Cancelling trigger for folder '{}'", job.folder.name);
            job.token.cancel();
            job.handle
        })
        .collect()
}

// Trigger loops never touch the job table, so this may run under its lock
async fn join_trigger_loops(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Trigger loop ended abnormally: {}", e);
        }
    }
}

/// Sleep until each firing time and dispatch the handler without waiting for it
async fn run_trigger_loop(
    scheduler: Weak<Scheduler>,
    folder: FolderConfig,
    schedule: Schedule,
    token: CancellationToken,
) {
    let mut last_fire: Option<DateTime<Local>> = None;

    loop {
        let now = Local::now();
        // never fire the same slot twice if the timer woke early
        let after = match last_fire {
            Some(last) if last > now => last,
            _ => now,
        };
        let Some(next) = next_fire_time(&schedule, &after) else {
            warn!("Folder '{}' has no future firings", folder.name);
            break;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = token.cancelled() => {
                debug!("Trigger loop for folder '{}' cancelled", folder.name);
                break;
            }
            _ = tokio::time::sleep(wait) => {}
        }
        last_fire = Some(next);

        let Some(strong) = scheduler.upgrade() else { break };
        let folder = folder.clone();
        tokio::spawn(async move {
            strong.fire_at(&folder, Utc::now()).await;
        });
    }
}
