mod common;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use async_trait::async_trait;
use common::{ScriptedPublisher, add_folder, build_pipeline, make_item, pipeline_config};
use folder_publisher::config::{ScannerConfig, SchedulerConfig};
use folder_publisher::errors::{AppError, PublishError, RepositoryResult};
use folder_publisher::ledger::{FolderConfigProvider, InMemoryLedger, Ledger, LedgerAdmin};
use folder_publisher::models::{FolderConfig, FolderConfigCreateRequest};
use folder_publisher::pipeline::UploadOutcome;
use folder_publisher::scanner::FolderScanner;
use folder_publisher::scheduler::{Scheduler, TriggerOutcome};

fn build_scheduler(ledger: Arc<InMemoryLedger>, publisher: Arc<ScriptedPublisher>) -> Arc<Scheduler> {
    let pipeline = Arc::new(build_pipeline(ledger.clone(), publisher, &pipeline_config()));
    Arc::new(Scheduler::new(
        ledger,
        FolderScanner::new(&ScannerConfig::default()),
        pipeline,
        &SchedulerConfig::default(),
    ))
}

#[tokio::test]
async fn test_overlapping_firing_is_skipped_while_folder_runs() {
    let root = tempfile::tempdir().unwrap();
    make_item(root.path(), "1-first", "First");
    make_item(root.path(), "2-second", "Second");

    let ledger = Arc::new(InMemoryLedger::new());
    let publisher = Arc::new(ScriptedPublisher::with_delay(Duration::from_millis(200)));
    let folder = add_folder(&ledger, root.path(), "* * * * *").await;
    let scheduler = build_scheduler(ledger.clone(), publisher.clone());

    let now = Utc::now();
    let (first, second) = tokio::join!(scheduler.fire_at(&folder, now), scheduler.fire_at(&folder, now));

    assert!(matches!(first, TriggerOutcome::Processed(UploadOutcome::Completed { .. })));
    assert!(matches!(second, TriggerOutcome::SkippedRunning));
    assert_eq!(publisher.published_titles(), vec!["First"]);
    assert!(!scheduler.run_state(folder.id).running);

    // the lock is released, so the next firing picks the next item
    let third = scheduler.fire_at(&folder, Utc::now()).await;
    assert!(matches!(third, TriggerOutcome::Processed(UploadOutcome::Completed { .. })));
    assert_eq!(publisher.published_titles(), vec!["First", "Second"]);

    let stats = scheduler.status().await.stats;
    assert_eq!(stats.firings, 3);
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.completed, 2);
}

#[tokio::test]
async fn test_quota_suspension_blocks_firings_until_resume_time() {
    let root = tempfile::tempdir().unwrap();
    make_item(root.path(), "1-first", "First");

    let t0 = Utc::now();
    let resume_at = t0 + ChronoDuration::minutes(60);
    let ledger = Arc::new(InMemoryLedger::new());
    let publisher = Arc::new(ScriptedPublisher::new());
    publisher.push(Err(PublishError::QuotaExceeded {
        resume_at,
        message: "quotaExceeded".to_string(),
    }));
    let folder = add_folder(&ledger, root.path(), "* * * * *").await;
    let scheduler = build_scheduler(ledger.clone(), publisher.clone());

    let first = scheduler.fire_at(&folder, t0).await;
    assert!(matches!(
        first,
        TriggerOutcome::Processed(UploadOutcome::QuotaSuspended { .. })
    ));
    assert_eq!(scheduler.run_state(folder.id).suspended_until, Some(resume_at));
    assert_eq!(scheduler.status().await.suspensions.len(), 1);

    let during = scheduler
        .fire_at(&folder, t0 + ChronoDuration::minutes(59))
        .await;
    assert!(matches!(during, TriggerOutcome::SkippedSuspended { until } if until == resume_at));
    assert_eq!(publisher.call_count(), 1);

    let after = scheduler.fire_at(&folder, resume_at).await;
    assert!(matches!(after, TriggerOutcome::Processed(UploadOutcome::Completed { .. })));
    assert_eq!(publisher.call_count(), 2);
    assert_eq!(scheduler.run_state(folder.id).suspended_until, None);
    assert!(ledger.failures().await.is_empty());
}

#[tokio::test]
async fn test_folders_fail_independently() {
    let good_root = tempfile::tempdir().unwrap();
    make_item(good_root.path(), "1-first", "First");
    let missing_root = tempfile::tempdir().unwrap();
    let missing_path = missing_root.path().join("gone");

    let ledger = Arc::new(InMemoryLedger::new());
    let publisher = Arc::new(ScriptedPublisher::new());
    let good = add_folder(&ledger, good_root.path(), "* * * * *").await;
    let broken = add_folder(&ledger, &missing_path, "* * * * *").await;
    let scheduler = build_scheduler(ledger.clone(), publisher.clone());

    let now = Utc::now();
    let (broken_outcome, good_outcome) =
        tokio::join!(scheduler.fire_at(&broken, now), scheduler.fire_at(&good, now));

    assert!(matches!(broken_outcome, TriggerOutcome::Errored(_)));
    assert!(matches!(good_outcome, TriggerOutcome::Processed(UploadOutcome::Completed { .. })));
    assert!(!scheduler.run_state(broken.id).running);
    assert_eq!(scheduler.status().await.stats.errors, 1);
}

#[tokio::test]
async fn test_empty_folder_reports_no_pending_items() {
    let root = tempfile::tempdir().unwrap();
    let ledger = Arc::new(InMemoryLedger::new());
    let publisher = Arc::new(ScriptedPublisher::new());
    let folder = add_folder(&ledger, root.path(), "* * * * *").await;
    let scheduler = build_scheduler(ledger, publisher.clone());

    let outcome = scheduler.fire_at(&folder, Utc::now()).await;
    assert!(matches!(outcome, TriggerOutcome::NoPendingItems));
    assert_eq!(publisher.call_count(), 0);
}

#[tokio::test]
async fn test_initialize_schedules_active_folders_with_valid_triggers() {
    let active_root = tempfile::tempdir().unwrap();
    let inactive_root = tempfile::tempdir().unwrap();
    let invalid_root = tempfile::tempdir().unwrap();

    let ledger = Arc::new(InMemoryLedger::new());
    let active = add_folder(&ledger, active_root.path(), "0 0 1 1 *").await;
    let inactive = add_folder(&ledger, inactive_root.path(), "0 0 1 1 *").await;
    ledger.set_folder_active(inactive.id, false).await.unwrap();
    ledger
        .create_folder_config(FolderConfigCreateRequest {
            name: "invalid".to_string(),
            path: invalid_root.path().to_string_lossy().into_owned(),
            cron_expression: "every day".to_string(),
        })
        .await
        .unwrap();

    let scheduler = build_scheduler(ledger.clone(), Arc::new(ScriptedPublisher::new()));
    assert_eq!(scheduler.initialize().await.unwrap(), 1);

    let status = scheduler.status().await;
    assert_eq!(status.active_jobs.len(), 1);
    assert_eq!(status.active_jobs[0].folder_id, active.id);
    assert!(status.active_jobs[0].next_fire_at.is_some());

    // re-initialization replaces rather than duplicates jobs
    assert_eq!(scheduler.initialize().await.unwrap(), 1);
    assert_eq!(scheduler.active_job_count().await, 1);

    scheduler.shutdown().await;
    assert_eq!(scheduler.active_job_count().await, 0);
}

#[tokio::test]
async fn test_reinitialize_clears_quota_suspensions() {
    let root = tempfile::tempdir().unwrap();
    make_item(root.path(), "1-first", "First");

    let ledger = Arc::new(InMemoryLedger::new());
    let publisher = Arc::new(ScriptedPublisher::new());
    publisher.push(Err(PublishError::QuotaExceeded {
        resume_at: Utc::now() + ChronoDuration::hours(2),
        message: "quotaExceeded".to_string(),
    }));
    let folder = add_folder(&ledger, root.path(), "0 0 1 1 *").await;
    let scheduler = build_scheduler(ledger, publisher);

    scheduler.fire_at(&folder, Utc::now()).await;
    assert!(scheduler.run_state(folder.id).suspended_until.is_some());

    scheduler.initialize().await.unwrap();
    assert_eq!(scheduler.run_state(folder.id).suspended_until, None);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_trigger_now_runs_the_folder_handler() {
    let root = tempfile::tempdir().unwrap();
    make_item(root.path(), "1-first", "First");

    let ledger = Arc::new(InMemoryLedger::new());
    let publisher = Arc::new(ScriptedPublisher::new());
    let folder = add_folder(&ledger, root.path(), "0 0 1 1 *").await;
    let scheduler = build_scheduler(ledger, publisher.clone());
    scheduler.initialize().await.unwrap();

    let outcome = scheduler.trigger_now(folder.id).await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::Processed(UploadOutcome::Completed { .. })));
    assert_eq!(publisher.call_count(), 1);

    let err = scheduler.trigger_now(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trigger_loop_fires_on_schedule() {
    let root = tempfile::tempdir().unwrap();
    make_item(root.path(), "1-first", "First");

    let ledger = Arc::new(InMemoryLedger::new());
    let publisher = Arc::new(ScriptedPublisher::new());
    add_folder(&ledger, root.path(), "* * * * * *").await;
    let scheduler = build_scheduler(ledger, publisher.clone());
    scheduler.initialize().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while publisher.call_count() == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(publisher.published_titles(), vec!["First"]);

    // later firings find nothing left to publish
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(publisher.call_count(), 1);
    assert!(root.path().join("archive/1-first").is_dir());

    scheduler.shutdown().await;
}

/// Provider whose lookups take a while, so concurrent initializations overlap
struct SlowProvider {
    inner: Arc<InMemoryLedger>,
    delay: Duration,
}

#[async_trait]
impl FolderConfigProvider for SlowProvider {
    async fn active_folder_configs(&self) -> RepositoryResult<Vec<FolderConfig>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_active_folder_configs().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_initializations_leave_no_untracked_trigger() {
    let root = tempfile::tempdir().unwrap();
    let ledger = Arc::new(InMemoryLedger::new());
    add_folder(&ledger, root.path(), "* * * * * *").await;

    let publisher = Arc::new(ScriptedPublisher::new());
    let pipeline = Arc::new(build_pipeline(ledger.clone(), publisher, &pipeline_config()));
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(SlowProvider {
            inner: ledger,
            delay: Duration::from_millis(100),
        }),
        FolderScanner::new(&ScannerConfig::default()),
        pipeline,
        &SchedulerConfig::default(),
    ));

    let (first, second) = tokio::join!(scheduler.initialize(), scheduler.initialize());
    assert_eq!(first.unwrap(), 1);
    assert_eq!(second.unwrap(), 1);
    assert_eq!(scheduler.active_job_count().await, 1);

    scheduler.cancel_all_jobs().await;
    // let handlers dispatched just before cancellation start
    tokio::time::sleep(Duration::from_millis(200)).await;
    let firings = scheduler.status().await.stats.firings;

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(scheduler.status().await.stats.firings, firings);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_status_reporter_tolerates_zero_interval() {
    let ledger = Arc::new(InMemoryLedger::new());
    let pipeline = Arc::new(build_pipeline(
        ledger.clone(),
        Arc::new(ScriptedPublisher::new()),
        &pipeline_config(),
    ));
    let scheduler = Arc::new(Scheduler::new(
        ledger,
        FolderScanner::new(&ScannerConfig::default()),
        pipeline,
        &SchedulerConfig {
            status_interval: Duration::ZERO,
        },
    ));

    let reporter = scheduler.spawn_status_reporter();
    scheduler.shutdown().await;
    assert!(reporter.await.is_ok());
}
