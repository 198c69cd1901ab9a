//! Periodic director polling on a tokio task
//!
//! The loop reads the latest score from a watch channel, asks the service
//! for a new snapshot once per interval and publishes it whole. The first
//! request goes out one full interval after spawn.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{DirectorConfig, TuningService, director_update_or_fallback};

pub struct DirectorTask {
    score_tx: watch::Sender<u64>,
    config_rx: watch::Receiver<DirectorConfig>,
    handle: Option<JoinHandle<()>>,
}

impl DirectorTask {
    /// Start polling; must be called from within a tokio runtime
    pub fn spawn<S: TuningService>(service: Arc<S>, interval: Duration) -> Self {
        let (score_tx, score_rx) = watch::channel(0u64);
        let (config_tx, config_rx) = watch::channel(DirectorConfig::fallback());
        let handle = tokio::spawn(run_director(service, interval, score_rx, config_tx));
        log::info!("Director polling every {:?}", interval);
        Self {
            score_tx,
            config_rx,
            handle: Some(handle),
        }
    }

    pub fn report_score(&self, score: u64) {
        self.score_tx.send_replace(score);
    }

    /// New snapshot published since the last call, if any
    pub fn latest(&mut self) -> Option<DirectorConfig> {
        match self.config_rx.has_changed() {
            Ok(true) => Some(self.config_rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop polling; no snapshot is published after this returns
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::info!("Director polling stopped");
        }
        // Anything published while the abort raced is discarded
        self.config_rx.mark_unchanged();
    }
}

impl Drop for DirectorTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_director<S: TuningService>(
    service: Arc<S>,
    interval: Duration,
    score_rx: watch::Receiver<u64>,
    config_tx: watch::Sender<DirectorConfig>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let score = *score_rx.borrow();
        let config = director_update_or_fallback(service.as_ref(), score).await;
        log::info!(
            "Director update: difficulty {:.2}, \"{}\"",
            config.difficulty,
            config.message
        );
        if config_tx.send(config).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::OfflineTuningService;
    use crate::director::tests::EchoService;

    #[tokio::test(start_paused = true)]
    async fn test_publishes_after_each_interval() {
        let mut task = DirectorTask::spawn(Arc::new(EchoService), Duration::from_secs(12));
        task.report_score(900);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(task.latest().is_none());

        tokio::time::sleep(Duration::from_secs(8)).await;
        let config = task.latest().unwrap();
        assert_eq!(config.message, "score 900");
        assert_eq!(config.difficulty, 2.0);

        task.report_score(1500);
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(task.latest().unwrap().message, "score 1500");
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_publishes_fallback() {
        let mut task = DirectorTask::spawn(Arc::new(OfflineTuningService), Duration::from_secs(12));
        tokio::time::sleep(Duration::from_secs(13)).await;
        assert_eq!(task.latest(), Some(DirectorConfig::fallback()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_updates() {
        let mut task = DirectorTask::spawn(Arc::new(EchoService), Duration::from_secs(12));
        task.shutdown();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(task.latest().is_none());
        assert!(!task.is_running());
    }
}
