//! Sync orchestrator state machine.

use crate::checkpoint::CheckpointStore;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::scanner::{ScanReport, Scanner};
use crate::subscriber::{ChangeSubscriber, FeedReport};
use crate::writer::{BatchWriter, WriteSummary};
use parking_lot::RwLock;
use scrubsync_core::{CheckpointSlot, RecordSink, RecordSource, Timestamp};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How the orchestrator starts, decided once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    /// Forced full reindex: full sync, then stop.
    ForcedReindex,
    /// No checkpoint stored: full sync, then tail from the epoch.
    NoCheckpoint,
    /// Checkpoint stored: catch up from it minus the safety window, then tail.
    HasCheckpoint(Timestamp),
}

impl StartupState {
    /// Resolves the startup state from the reindex flag and the loaded checkpoint.
    pub fn resolve(full_reindex: bool, checkpoint: Option<Timestamp>) -> Self {
        match (full_reindex, checkpoint) {
            (true, _) => StartupState::ForcedReindex,
            (false, None) => StartupState::NoCheckpoint,
            (false, Some(timestamp)) => StartupState::HasCheckpoint(timestamp),
        }
    }
}

/// The current phase of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Not started.
    Idle,
    /// Copying the whole source.
    FullSync,
    /// Copying records created since a resume point.
    CatchUp,
    /// Applying live change events.
    Tailing,
    /// Waiting before reopening the change feed.
    RetryWait,
    /// Finished without error.
    Stopped,
    /// Finished with an error.
    Failed,
}

impl SyncPhase {
    /// Returns true while the orchestrator is doing work.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncPhase::FullSync | SyncPhase::CatchUp | SyncPhase::Tailing | SyncPhase::RetryWait
        )
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A forced reindex completed.
    Reindexed(ScanReport),
    /// The change feed closed and no reconnect attempts remain.
    FeedEnded,
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Source records read by scans.
    pub records_scanned: u64,
    /// Write accounting across scans and events.
    pub written: WriteSummary,
    /// Change events applied to the sink.
    pub events_applied: u64,
    /// Change events observed and ignored.
    pub events_ignored: u64,
    /// Number of change feed reconnects.
    pub reconnects: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Drives the sync from startup to live tailing.
///
/// # Example
///
/// ```rust
/// use scrubsync_core::{MemoryCheckpoints, MemoryCollection};
/// use scrubsync_engine::{SyncConfig, SyncOrchestrator, SyncOutcome};
/// use std::sync::Arc;
///
/// let orchestrator = SyncOrchestrator::new(
///     SyncConfig::default(),
///     Arc::new(MemoryCollection::new("customers")),
///     Arc::new(MemoryCollection::new("anonymized_customers")),
///     Arc::new(MemoryCheckpoints::new()),
/// );
///
/// let outcome = orchestrator.run(true).unwrap();
/// assert!(matches!(outcome, SyncOutcome::Reindexed(_)));
/// ```
pub struct SyncOrchestrator<S, K, C>
where
    S: RecordSource,
    K: RecordSink,
    C: CheckpointSlot,
{
    config: SyncConfig,
    source: Arc<S>,
    writer: BatchWriter<K>,
    checkpoints: CheckpointStore<C>,
    phase: RwLock<SyncPhase>,
    stats: RwLock<SyncStats>,
}

impl<S, K, C> SyncOrchestrator<S, K, C>
where
    S: RecordSource,
    K: RecordSink,
    C: CheckpointSlot,
{
    /// Creates an orchestrator over the given collections.
    pub fn new(config: SyncConfig, source: Arc<S>, sink: Arc<K>, checkpoints: Arc<C>) -> Self {
        let checkpoints = CheckpointStore::new(checkpoints, config.checkpoint_key.clone());
        Self {
            config,
            source,
            writer: BatchWriter::new(sink),
            checkpoints,
            phase: RwLock::new(SyncPhase::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Gets the current phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Gets the checkpoint store.
    pub fn checkpoints(&self) -> &CheckpointStore<C> {
        &self.checkpoints
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write() = phase;
    }

    fn scanner(&self) -> Scanner<'_, S, K, C> {
        Scanner::new(
            self.source.as_ref(),
            &self.writer,
            &self.checkpoints,
            self.config.batch_size,
        )
    }

    fn subscriber(&self) -> ChangeSubscriber<'_, S, K, C> {
        ChangeSubscriber::new(self.source.as_ref(), &self.writer, &self.checkpoints)
    }

    /// Runs the sync.
    ///
    /// With `full_reindex` set, performs a full sync and returns. Otherwise
    /// loads the checkpoint, runs a full sync or a catch-up accordingly and
    /// then tails the change feed until it ends for good. An orchestrator
    /// runs once.
    pub fn run(&self, full_reindex: bool) -> SyncResult<SyncOutcome> {
        self.config.validate()?;
        {
            let mut phase = self.phase.write();
            if *phase != SyncPhase::Idle {
                return Err(SyncError::InvalidStateTransition {
                    from: format!("{:?}", *phase),
                    to: "run".into(),
                });
            }
            *phase = if full_reindex {
                SyncPhase::FullSync
            } else {
                SyncPhase::CatchUp
            };
        }

        let checkpoint = if full_reindex {
            None
        } else {
            self.checkpoints.load()
        };
        let startup = StartupState::resolve(full_reindex, checkpoint);
        info!(?startup, "sync starting");

        let result = self.run_from(startup);
        match &result {
            Ok(_) => self.set_phase(SyncPhase::Stopped),
            Err(e) => {
                error!(error = %e, "sync failed");
                self.record_error(e);
                self.set_phase(SyncPhase::Failed);
            }
        }
        result
    }

    fn run_from(&self, startup: StartupState) -> SyncResult<SyncOutcome> {
        match startup {
            StartupState::ForcedReindex => {
                let report = self.full_sync()?;
                Ok(SyncOutcome::Reindexed(report))
            }
            StartupState::NoCheckpoint => {
                self.full_sync()?;
                self.tail(Timestamp::EPOCH)
            }
            StartupState::HasCheckpoint(checkpoint) => {
                let resume = checkpoint.saturating_sub(self.config.safety_window);
                self.catch_up(resume)?;
                self.tail(resume)
            }
        }
    }

    fn full_sync(&self) -> SyncResult<ScanReport> {
        self.set_phase(SyncPhase::FullSync);
        let report = self.scanner().full_sync()?;
        self.record_scan(&report);
        Ok(report)
    }

    fn catch_up(&self, since: Timestamp) -> SyncResult<ScanReport> {
        self.set_phase(SyncPhase::CatchUp);
        let report = self.scanner().catch_up(since)?;
        self.record_scan(&report);
        Ok(report)
    }

    /// Tails the feed from `since`, reconnecting per the retry policy.
    ///
    /// A reconnect first catches up from the newest applied timestamp minus the
    /// safety window, because a reopened feed only carries new changes. Errors
    /// that are not retryable end the tail at once.
    fn tail(&self, since: Timestamp) -> SyncResult<SyncOutcome> {
        let retry = &self.config.reconnect;
        let mut resume = since;
        let mut catch_up_first = false;
        let mut attempt = 0u32;

        loop {
            let mut report = FeedReport::default();
            let result = self.session(resume, catch_up_first, &mut report);
            self.record_feed(&report);

            if let Some(last) = report.last_applied {
                resume = last.saturating_sub(self.config.safety_window);
            }
            if report.applied > 0 {
                attempt = 0;
            }
            attempt += 1;

            if let Err(e) = &result {
                warn!(error = %e, "change feed session ended with error");
                self.record_error(e);
                if !e.is_retryable() {
                    return result.map(|()| SyncOutcome::FeedEnded);
                }
            }
            if attempt >= retry.max_attempts {
                info!("change feed stopped");
                return result.map(|()| SyncOutcome::FeedEnded);
            }

            self.set_phase(SyncPhase::RetryWait);
            let delay = retry.delay_for_attempt(attempt);
            info!(attempt, ?delay, resume_from = %resume, "reconnecting change feed");
            std::thread::sleep(delay);
            self.stats.write().reconnects += 1;
            catch_up_first = true;
        }
    }

    fn session(
        &self,
        since: Timestamp,
        catch_up_first: bool,
        report: &mut FeedReport,
    ) -> SyncResult<()> {
        if catch_up_first {
            self.catch_up(since)?;
        }
        self.set_phase(SyncPhase::Tailing);
        self.subscriber().start(since, report)
    }

    fn record_scan(&self, report: &ScanReport) {
        let mut stats = self.stats.write();
        stats.records_scanned += report.scanned;
        stats.written += report.written;
    }

    fn record_feed(&self, report: &FeedReport) {
        let mut stats = self.stats.write();
        stats.events_applied += report.applied;
        stats.events_ignored += report.ignored;
        stats.written += report.written;
    }

    fn record_error(&self, error: &SyncError) {
        self.stats.write().last_error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use scrubsync_core::{
        MemoryCheckpoints, MemoryCollection, Record, RecordGenerator, StoreError, StoreResult,
    };
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Sink whose every batch fails with an error retrying cannot fix.
    #[derive(Default)]
    struct OversizedSink {
        calls: AtomicU64,
    }

    impl RecordSink for OversizedSink {
        fn insert_many(&self, _records: &[Record]) -> StoreResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Serialization("document too large".into()))
        }
    }

    type Orchestrator = SyncOrchestrator<MemoryCollection, MemoryCollection, MemoryCheckpoints>;

    fn orchestrator(
        checkpoints: MemoryCheckpoints,
    ) -> (Arc<MemoryCollection>, Arc<MemoryCollection>, Orchestrator) {
        let source = Arc::new(MemoryCollection::new("customers"));
        let sink = Arc::new(MemoryCollection::new("anonymized_customers"));
        let orchestrator = SyncOrchestrator::new(
            SyncConfig::new().with_reconnect(RetryConfig::no_retry()),
            Arc::clone(&source),
            Arc::clone(&sink),
            Arc::new(checkpoints),
        );
        (source, sink, orchestrator)
    }

    #[test]
    fn startup_resolution() {
        let t = Timestamp::from_millis(5);
        assert_eq!(StartupState::resolve(true, Some(t)), StartupState::ForcedReindex);
        assert_eq!(StartupState::resolve(true, None), StartupState::ForcedReindex);
        assert_eq!(StartupState::resolve(false, None), StartupState::NoCheckpoint);
        assert_eq!(
            StartupState::resolve(false, Some(t)),
            StartupState::HasCheckpoint(t)
        );
    }

    #[test]
    fn phase_checks() {
        assert!(SyncPhase::Tailing.is_active());
        assert!(SyncPhase::RetryWait.is_active());
        assert!(!SyncPhase::Idle.is_active());
        assert!(!SyncPhase::Stopped.is_active());
    }

    #[test]
    fn forced_reindex_runs_full_sync_only() {
        let (source, sink, orchestrator) = orchestrator(MemoryCheckpoints::with_value(
            "lastTimestamp",
            Timestamp::from_millis(999_999),
        ));
        let mut gen = RecordGenerator::seeded(31);
        source.insert(gen.record_at(Timestamp::from_millis(1_000))).unwrap();
        source.insert(gen.record_at(Timestamp::from_millis(2_000))).unwrap();

        let outcome = orchestrator.run(true).unwrap();

        match outcome {
            SyncOutcome::Reindexed(report) => assert_eq!(report.scanned, 2),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sink.len(), 2);
        assert_eq!(source.feed().subscriber_count(), 0);
        assert_eq!(orchestrator.phase(), SyncPhase::Stopped);
        assert_eq!(
            orchestrator.checkpoints().load(),
            Some(Timestamp::from_millis(2_000))
        );
    }

    #[test]
    fn run_twice_is_rejected() {
        let (_source, _sink, orchestrator) = orchestrator(MemoryCheckpoints::new());
        orchestrator.run(true).unwrap();

        let err = orchestrator.run(true).unwrap_err();
        assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
    }

    #[test]
    fn invalid_config_fails_before_work() {
        let source = Arc::new(MemoryCollection::new("customers"));
        let orchestrator = SyncOrchestrator::new(
            SyncConfig::new().with_batch_size(0),
            Arc::clone(&source),
            Arc::new(MemoryCollection::new("sink")),
            Arc::new(MemoryCheckpoints::new()),
        );

        assert!(matches!(
            orchestrator.run(true),
            Err(SyncError::Configuration(_))
        ));
        assert_eq!(orchestrator.phase(), SyncPhase::Idle);
    }

    #[test]
    fn failed_full_sync_marks_phase() {
        let (source, _sink, orchestrator) = orchestrator(MemoryCheckpoints::new());
        source.set_unavailable(true);

        assert!(orchestrator.run(true).is_err());
        assert_eq!(orchestrator.phase(), SyncPhase::Failed);
        assert!(orchestrator.stats().last_error.is_some());
    }

    #[test]
    fn no_retry_stops_when_feed_closes() {
        let (source, sink, orchestrator) = orchestrator(MemoryCheckpoints::new());
        let source_handle = Arc::clone(&source);

        let handle = std::thread::spawn(move || {
            let outcome = orchestrator.run(false);
            (outcome, orchestrator.stats())
        });

        while source_handle.feed().subscriber_count() == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
        source_handle
            .insert(RecordGenerator::seeded(32).record_at(Timestamp::from_millis(7_000)))
            .unwrap();
        source_handle.feed().close();

        let (outcome, stats) = handle.join().unwrap();
        assert_eq!(outcome.unwrap(), SyncOutcome::FeedEnded);
        assert_eq!(stats.events_applied, 1);
        assert_eq!(stats.reconnects, 0);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn permanent_feed_error_is_not_retried() {
        let source = Arc::new(MemoryCollection::new("customers"));
        let sink = Arc::new(OversizedSink::default());
        let orchestrator = SyncOrchestrator::new(
            SyncConfig::new().with_reconnect(
                RetryConfig::new(4)
                    .with_initial_delay(Duration::from_millis(1))
                    .with_jitter(false),
            ),
            Arc::clone(&source),
            Arc::clone(&sink),
            Arc::new(MemoryCheckpoints::new()),
        );
        let source_handle = Arc::clone(&source);

        let handle = std::thread::spawn(move || {
            let outcome = orchestrator.run(false);
            (outcome, orchestrator.phase(), orchestrator.stats())
        });

        while source_handle.feed().subscriber_count() == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
        source_handle
            .insert(RecordGenerator::seeded(33).record_at(Timestamp::from_millis(8_000)))
            .unwrap();

        let (outcome, phase, stats) = handle.join().unwrap();
        let err = outcome.unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(
            err,
            SyncError::Store(StoreError::Serialization(_))
        ));
        assert_eq!(phase, SyncPhase::Failed);
        assert_eq!(stats.reconnects, 0);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
    }
}
