use crate::error::PiDeckError;
use crate::metrics::Metrics;
use crate::models::{Action, MAX_CONCURRENT_DISPATCHES, PlaybackState, PlaybackStatus, clamp_volume};
use crate::services::vlc::{VlcControl, VlcError};
use crate::state::StateManager;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::time::timeout;

/// Exactly one VLC call, after `PlayPause` and volume requests are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    SetVolume(u8),
}

impl PlayerCommand {
    /// Resolve an action against the last known playback state.
    pub fn resolve(action: Action, current: &PlaybackState) -> Self {
        match action {
            Action::Play => PlayerCommand::Play,
            Action::Pause => PlayerCommand::Pause,
            Action::PlayPause => match current.status {
                PlaybackStatus::Playing => PlayerCommand::Pause,
                PlaybackStatus::Stopped | PlaybackStatus::Paused => PlayerCommand::Play,
            },
            Action::Stop => PlayerCommand::Stop,
            Action::Next => PlayerCommand::Next,
            Action::Previous => PlayerCommand::Previous,
            Action::VolumeSet(level) => PlayerCommand::SetVolume(clamp_volume(level)),
            Action::VolumeDelta(delta) => {
                PlayerCommand::SetVolume(clamp_volume((current.volume as i32).saturating_add(delta)))
            }
        }
    }
}

/// Serialises every VLC interaction and is the only writer of [`StateManager`].
///
/// A dispatch is: resolve the action, make one VLC call, then re-read VLC's status.
/// The whole sequence holds the single semaphore permit, so a status poll from the
/// tick can never interleave with a command. Failures are logged and leave the state
/// untouched.
#[derive(Clone)]
pub struct ActionDispatcher {
    vlc: Arc<dyn VlcControl>,
    state: StateManager,
    permit: Arc<Semaphore>,
    timeout: Duration,
    metrics: Arc<Metrics>,
    /// Whether the last status poll succeeded, to warn once per outage
    reachable: Arc<AtomicBool>,
}

impl ActionDispatcher {
    pub fn new(
        vlc: Arc<dyn VlcControl>,
        state: StateManager,
        command_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            vlc,
            state,
            permit: Arc::new(Semaphore::new(MAX_CONCURRENT_DISPATCHES)),
            timeout: command_timeout,
            metrics,
            reachable: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Execute one action.
    ///
    /// # Returns
    /// `Err(PiDeckError::VlcCommand)` when the command or the follow-up status read
    /// failed. The error is already logged; callers may ignore it.
    pub async fn dispatch(&self, action: Action) -> Result<(), PiDeckError> {
        let Ok(_permit) = self.permit.acquire().await else {
            return Ok(());
        };

        let command = PlayerCommand::resolve(action, &self.state.snapshot());
        tracing::debug!("Dispatching {} as {:?}", action.name(), command);

        let vlc = Arc::clone(&self.vlc);
        let result = self
            .bounded(async move {
                match command {
                    PlayerCommand::Play => vlc.play().await,
                    PlayerCommand::Pause => vlc.pause().await,
                    PlayerCommand::Stop => vlc.stop().await,
                    PlayerCommand::Next => vlc.next().await,
                    PlayerCommand::Previous => vlc.previous().await,
                    PlayerCommand::SetVolume(level) => vlc.set_volume(level).await,
                }
            })
            .await;

        if let Err(e) = result {
            self.metrics.record_vlc_failure();
            let error = PiDeckError::from(e);
            tracing::warn!("{} (action: {})", error, action.name());
            return Err(error);
        }

        self.metrics.record_action_dispatched();
        self.refresh_locked().await
    }

    /// Poll VLC for external changes (track ended, another client).
    pub async fn refresh(&self) -> Result<(), PiDeckError> {
        let Ok(_permit) = self.permit.acquire().await else {
            return Ok(());
        };
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), PiDeckError> {
        let vlc = Arc::clone(&self.vlc);
        match self.bounded(async move { vlc.status().await }).await {
            Ok(status) => {
                if !self.reachable.swap(true, Ordering::Relaxed) {
                    tracing::info!("VLC status available again");
                }
                self.state.replace(status);
                Ok(())
            }
            Err(e) => {
                self.metrics.record_vlc_failure();
                let error = PiDeckError::from(e);
                if self.reachable.swap(false, Ordering::Relaxed) {
                    tracing::warn!("{} (status poll)", error);
                } else {
                    tracing::debug!("{} (status poll)", error);
                }
                Err(error)
            }
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, VlcError>
    where
        F: Future<Output = Result<T, VlcError>>,
    {
        match timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(VlcError::Timeout(self.timeout)),
        }
    }

    /// Consume actions in arrival order until shutdown or until all producers are gone.
    ///
    /// Shutdown is only observed between dispatches, so an in-flight call always
    /// completes or times out.
    pub async fn run(self, mut actions: mpsc::Receiver<Action>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Action dispatcher started");

        loop {
            let action = tokio::select! {
                _ = shutdown.changed() => break,
                action = actions.recv() => match action {
                    Some(action) => action,
                    None => break,
                },
            };

            // Already logged; the loop never stops on a VLC failure
            let _ = self.dispatch(action).await;
        }

        tracing::info!("Action dispatcher stopped");
    }
}
