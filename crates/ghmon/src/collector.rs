//! The collection loop: fetch every repository, ship one batch, wait, repeat.
//!
//! Passes are strictly sequential and so are the fetches inside a pass. A
//! failed fetch drops only that repository from the batch; a failed write
//! drops the batch. Cancellation abandons whatever pass is in flight.

use std::time::Duration;

use ghmon_core::config::Config;
use ghmon_core::model::record::Batch;
use ghmon_core::model::repo::RepoId;
use ghmon_core::pipeline::{BatchSink, RecordSource, ShipReport};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub repos: Vec<RepoId>,
    pub interval: Duration,
    /// Pause between two fetches of the same pass.
    pub request_delay: Duration,
    pub once: bool,
}

impl CollectorSettings {
    pub fn from_config(cfg: &Config, once: bool) -> Self {
        Self {
            repos: cfg.repos.clone(),
            interval: cfg.interval,
            request_delay: cfg.request_delay,
            once,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipOutcome {
    Sent {
        records: usize,
        compressed_bytes: usize,
    },
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub shipped: ShipOutcome,
}

pub struct Collector<S, K> {
    settings: CollectorSettings,
    source: S,
    sink: K,
}

impl<S, K> Collector<S, K>
where
    S: RecordSource,
    K: BatchSink,
{
    pub fn new(settings: CollectorSettings, source: S, sink: K) -> Self {
        Self {
            settings,
            source,
            sink,
        }
    }

    pub async fn run_pass(&self) -> PassSummary {
        let total = self.settings.repos.len();
        info!(repos = total, "starting collection pass");

        let mut batch = Batch::new();
        let mut failed = 0;
        for (i, repo) in self.settings.repos.iter().enumerate() {
            if i > 0 && !self.settings.request_delay.is_zero() {
                tokio::time::sleep(self.settings.request_delay).await;
            }
            match self.source.fetch(repo).await {
                Ok(record) => batch.push(record),
                Err(err) => {
                    failed += 1;
                    error!(repo = %repo, error = %err, "fetch failed; skipping repository this pass");
                }
            }
        }

        let succeeded = batch.len();
        let shipped = if batch.is_empty() {
            warn!("no data collected in this pass; nothing to write");
            ShipOutcome::Skipped
        } else {
            match self.sink.ship(&batch).await {
                Ok(ShipReport::Sent {
                    records,
                    compressed_bytes,
                }) => {
                    info!(records, compressed_bytes, "batch written");
                    ShipOutcome::Sent {
                        records,
                        compressed_bytes,
                    }
                }
                Ok(ShipReport::Skipped) => ShipOutcome::Skipped,
                Err(err) => {
                    error!(records = succeeded, error = %err, "failed to write batch; dropping it");
                    ShipOutcome::Failed
                }
            }
        };

        info!(succeeded, total, failed, "collection pass complete");
        PassSummary {
            total,
            succeeded,
            failed,
            shipped,
        }
    }

    /// Runs passes until `cancel` fires, or exactly one pass in once mode.
    pub async fn run(&self, cancel: CancellationToken) -> LoopState {
        if self.settings.once {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("shutdown requested; abandoning in-flight pass");
                }
                _ = self.run_pass() => {}
            }
            return LoopState::Stopped;
        }

        info!(
            interval = %humantime::format_duration(self.settings.interval),
            repos = self.settings.repos.len(),
            "starting continuous collection"
        );
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = LoopState::Running;
        while state == LoopState::Running {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    state = LoopState::Stopped;
                }
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        state = LoopState::Stopped;
                        continue;
                    }
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!("shutdown requested; abandoning in-flight pass");
                            state = LoopState::Stopped;
                        }
                        _ = self.run_pass() => {
                            debug!(
                                next_in = %humantime::format_duration(self.settings.interval),
                                "waiting for next pass"
                            );
                        }
                    }
                }
            }
        }
        info!("collector stopped");
        state
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    use ghmon_core::model::record::Record;
    use tokio::time::Instant;

    use super::*;

    #[derive(Default)]
    struct FakeSource {
        failing: Vec<&'static str>,
        slow: HashMap<&'static str, Duration>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl FakeSource {
        fn failing(repos: &[&'static str]) -> Self {
            Self {
                failing: repos.to_vec(),
                ..Self::default()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl RecordSource for FakeSource {
        type Error = io::Error;

        async fn fetch(&self, repo: &RepoId) -> Result<Record, io::Error> {
            self.calls
                .lock()
                .unwrap()
                .push((repo.to_string(), Instant::now()));
            if let Some(delay) = self.slow.get(repo.as_str()) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.iter().any(|r| *r == repo.as_str()) {
                return Err(io::Error::other("HTTP 404"));
            }
            Ok(Record::new("github_repo_stats", 1)
                .with_tag("repo", repo.as_str())
                .with_field("stars", 1.0))
        }
    }

    #[derive(Default)]
    struct FakeSink {
        reject: bool,
        batches: Mutex<Vec<Batch>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl FakeSink {
        fn batches(&self) -> Vec<Batch> {
            self.batches.lock().unwrap().clone()
        }
    }

    impl BatchSink for FakeSink {
        type Error = io::Error;

        async fn ship(&self, batch: &Batch) -> Result<ShipReport, io::Error> {
            let shipped = {
                let mut batches = self.batches.lock().unwrap();
                batches.push(batch.clone());
                batches.len()
            };
            if let Some((after, token)) = &self.cancel_after
                && shipped >= *after
            {
                token.cancel();
            }
            if self.reject {
                return Err(io::Error::other("HTTP 500"));
            }
            Ok(ShipReport::Sent {
                records: batch.len(),
                compressed_bytes: 64,
            })
        }
    }

    fn settings(repos: &[&str], once: bool) -> CollectorSettings {
        CollectorSettings {
            repos: repos.iter().map(|r| RepoId::parse(r).unwrap()).collect(),
            interval: Duration::from_secs(600),
            request_delay: Duration::from_secs(1),
            once,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetches_shrink_the_batch() {
        let collector = Collector::new(
            settings(&["a/one", "a/two", "a/three"], true),
            FakeSource::failing(&["a/two"]),
            FakeSink::default(),
        );

        let summary = collector.run_pass().await;

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.shipped,
            ShipOutcome::Sent {
                records: 2,
                compressed_bytes: 64
            }
        );
        let batches = collector.sink.batches();
        assert_eq!(batches.len(), 1);
        let repos: Vec<_> = batches[0]
            .records()
            .iter()
            .filter_map(|r| r.tag("repo"))
            .collect();
        assert_eq!(repos, vec!["a/one", "a/three"]);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_shipped_when_every_fetch_fails() {
        let collector = Collector::new(
            settings(&["a/one", "a/two"], true),
            FakeSource::failing(&["a/one", "a/two"]),
            FakeSink::default(),
        );

        let summary = collector.run_pass().await;

        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.shipped, ShipOutcome::Skipped);
        assert!(collector.sink.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_write_is_reported_not_retried() {
        let collector = Collector::new(
            settings(&["a/one"], true),
            FakeSource::default(),
            FakeSink {
                reject: true,
                ..FakeSink::default()
            },
        );

        let summary = collector.run_pass().await;

        assert_eq!(summary.shipped, ShipOutcome::Failed);
        assert_eq!(collector.sink.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_are_spaced_by_request_delay() {
        let collector = Collector::new(
            settings(&["a/one", "a/two", "a/three"], true),
            FakeSource::default(),
            FakeSink::default(),
        );

        let started = Instant::now();
        collector.run_pass().await;

        let calls = collector.source.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].1 - started, Duration::ZERO);
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(1));
        assert_eq!(calls[2].1 - calls[1].1, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn once_mode_runs_a_single_pass() {
        let collector = Collector::new(
            settings(&["a/one", "a/two"], true),
            FakeSource::default(),
            FakeSink::default(),
        );

        let started = Instant::now();
        let state = collector.run(CancellationToken::new()).await;

        assert_eq!(state, LoopState::Stopped);
        assert_eq!(collector.sink.batches().len(), 1);
        assert_eq!(collector.source.call_count(), 2);
        assert!(started.elapsed() < Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn continuous_mode_repeats_on_interval_until_cancelled() {
        let cancel = CancellationToken::new();
        let collector = Collector::new(
            settings(&["a/one"], false),
            FakeSource::default(),
            FakeSink {
                cancel_after: Some((3, cancel.clone())),
                ..FakeSink::default()
            },
        );

        let state = collector.run(cancel).await;

        assert_eq!(state, LoopState::Stopped);
        assert_eq!(collector.sink.batches().len(), 3);
        let calls = collector.source.calls.lock().unwrap().clone();
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(600));
        assert_eq!(calls[2].1 - calls[1].1, Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_in_flight_pass() {
        let cancel = CancellationToken::new();
        let mut source = FakeSource::default();
        source.slow.insert("a/two", Duration::from_secs(30));
        let collector = Collector::new(
            settings(&["a/one", "a/two"], false),
            source,
            FakeSink::default(),
        );

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            trigger.cancel();
        });
        let state = collector.run(cancel).await;

        assert_eq!(state, LoopState::Stopped);
        assert_eq!(collector.source.call_count(), 2);
        assert!(collector.sink.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_runs_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let collector = Collector::new(
            settings(&["a/one"], false),
            FakeSource::default(),
            FakeSink::default(),
        );

        assert_eq!(collector.run(cancel).await, LoopState::Stopped);
        assert_eq!(collector.source.call_count(), 0);
    }
}
