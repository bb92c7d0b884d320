use crate::watcher::{PollReport, Watcher};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollerError {
    #[error("poller task is no longer running")]
    Stopped,
    #[error("poller task join failed: {0}")]
    Join(String),
}

enum Command {
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<PollReport>),
    Refresh(oneshot::Sender<PollReport>),
}

/// Drives [`Watcher::poll_once`] on a fixed interval until stopped.
///
/// Pausing mirrors a hidden page: ticks are ignored until `resume`, which
/// restarts the interval and polls immediately.
pub struct Poller {
    commands: mpsc::Sender<Command>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    initial: PollReport,
}

impl Poller {
    /// Polls once right away, then keeps polling every `interval`.
    pub async fn start(watcher: Arc<Watcher>, interval: Duration) -> Self {
        let initial = watcher.poll_once().await;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (commands, mut command_rx) = mpsc::channel::<Command>(8);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; the initial poll covered it.
            ticker.tick().await;
            let mut paused = false;

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    command = command_rx.recv() => match command {
                        Some(Command::Pause(ack)) => {
                            paused = true;
                            tracing::debug!("polling paused");
                            let _ = ack.send(());
                        }
                        Some(Command::Resume(reply)) => {
                            paused = false;
                            ticker.reset();
                            tracing::debug!("polling resumed");
                            let _ = reply.send(watcher.poll_once().await);
                        }
                        Some(Command::Refresh(reply)) => {
                            let _ = reply.send(watcher.poll_once().await);
                        }
                        None => break,
                    },
                    _ = ticker.tick(), if !paused => {
                        watcher.poll_once().await;
                    }
                }
            }
            tracing::debug!("poller stopped");
        });

        Self {
            commands,
            stop_tx: Some(stop_tx),
            task: Some(task),
            initial,
        }
    }

    /// Report of the poll performed by [`Poller::start`].
    pub fn initial_report(&self) -> &PollReport {
        &self.initial
    }

    pub async fn pause(&self) -> Result<(), PollerError> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Pause(ack)).await?;
        done.await.map_err(|_| PollerError::Stopped)
    }

    pub async fn resume(&self) -> Result<PollReport, PollerError> {
        let (reply, report) = oneshot::channel();
        self.send(Command::Resume(reply)).await?;
        report.await.map_err(|_| PollerError::Stopped)
    }

    /// Polls now, outside the regular schedule.
    pub async fn refresh(&self) -> Result<PollReport, PollerError> {
        let (reply, report) = oneshot::channel();
        self.send(Command::Refresh(reply)).await?;
        report.await.map_err(|_| PollerError::Stopped)
    }

    /// Signals the task and waits for it; an in-flight poll finishes first.
    pub async fn stop(mut self) -> Result<(), PollerError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|error| PollerError::Join(error.to_string()))?;
        }
        Ok(())
    }

    async fn send(&self, command: Command) -> Result<(), PollerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PollerError::Stopped)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}
