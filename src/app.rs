//! Main loop: wires the input tasks, the dispatcher and the periodic tick, and runs the
//! shutdown sequence.

use crate::error::PiDeckError;
use crate::hardware::Hardware;
use crate::metrics::Metrics;
use crate::models::{Action, RawInputEvent, Settings, VlcConfig};
use crate::services::{
    ActionDispatcher, InputDebouncer, MetricsSampler, RcClient, RenderOutcome, Renderer, TouchTracker,
    VlcControl,
};
use crate::state::{StateChange, StateManager};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};

/// Raw edges can burst while a button bounces
pub const RAW_EVENT_CAPACITY: usize = 64;
pub const ACTION_CAPACITY: usize = 32;

/// How long input tasks and the dispatcher get to finish after shutdown is requested
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

const METRICS_LOG_TICKS: u64 = 60;

/// The running appliance.
///
/// Channels are created up front so hardware callbacks can be given a sender before
/// [`run`](Self::run) starts consuming.
pub struct App {
    settings: Arc<Settings>,
    metrics: Arc<Metrics>,
    state: StateManager,
    raw_tx: mpsc::Sender<RawInputEvent>,
    raw_rx: mpsc::Receiver<RawInputEvent>,
    action_tx: mpsc::Sender<Action>,
    action_rx: mpsc::Receiver<Action>,
}

impl App {
    pub fn new(settings: Arc<Settings>) -> Self {
        let (raw_tx, raw_rx) = mpsc::channel(RAW_EVENT_CAPACITY);
        let (action_tx, action_rx) = mpsc::channel(ACTION_CAPACITY);

        Self {
            settings,
            metrics: Arc::new(Metrics::new()),
            state: StateManager::new(),
            raw_tx,
            raw_rx,
            action_tx,
            action_rx,
        }
    }

    /// Sender for undebounced button and touch edges
    pub fn raw_events(&self) -> mpsc::Sender<RawInputEvent> {
        self.raw_tx.clone()
    }

    /// Sender for already debounced actions
    pub fn actions(&self) -> mpsc::Sender<Action> {
        self.action_tx.clone()
    }

    pub fn state(&self) -> StateManager {
        self.state.clone()
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until `shutdown` flips, then stop every task and release the hardware.
    pub async fn run(
        self,
        hardware: Hardware,
        vlc: Arc<dyn VlcControl>,
        mut sampler: MetricsSampler,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), PiDeckError> {
        let App {
            settings,
            metrics,
            state,
            raw_tx,
            raw_rx,
            action_tx,
            action_rx,
        } = self;

        let Hardware {
            buttons,
            touch,
            display,
        } = hardware;

        let geometry = settings.screen.geometry();
        let mut renderer = Renderer::new(geometry, settings.system.display_info, display);
        let dispatcher = ActionDispatcher::new(
            vlc,
            state.clone(),
            settings.vlc.command_timeout(),
            Arc::clone(&metrics),
        );

        let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

        tasks.push((
            "state-logger",
            tokio::spawn(log_state_changes(state.subscribe(), shutdown.clone())),
        ));

        let debouncer = InputDebouncer::from_settings(&settings);
        tasks.push((
            "debouncer",
            tokio::spawn(debouncer.run(
                raw_rx,
                action_tx.clone(),
                shutdown.clone(),
                Arc::clone(&metrics),
            )),
        ));

        if let Some(source) = touch {
            let tracker = TouchTracker::new(&settings.touch, geometry);
            tasks.push((
                "touch",
                tokio::spawn(tracker.run(source, raw_tx.clone(), action_tx.clone(), shutdown.clone())),
            ));
        }

        tasks.push((
            "dispatcher",
            tokio::spawn(dispatcher.clone().run(action_rx, shutdown.clone())),
        ));

        // Producers now own their senders; channels close when they stop
        drop(raw_tx);
        drop(action_tx);

        tracing::info!(
            "Main loop running: {:?} interval, {}x{} screen",
            settings.system.interval(),
            geometry.width,
            geometry.height
        );

        let mut ticker = tokio::time::interval(settings.system.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            tick(&dispatcher, &state, &mut sampler, &mut renderer, &metrics).await;
        }

        tracing::info!("Shutdown requested, stopping tasks");

        let joined = timeout(SHUTDOWN_GRACE, async {
            for (name, handle) in tasks.iter_mut() {
                if let Err(e) = handle.await {
                    tracing::warn!("Task {} ended abnormally: {}", name, e);
                }
            }
        })
        .await;

        if joined.is_err() {
            tracing::warn!("Tasks did not stop within {:?}, aborting", SHUTDOWN_GRACE);
            for (_, handle) in &tasks {
                handle.abort();
            }
        }

        // Inputs first so no new events arrive while the screen goes dark
        drop(buttons);
        if let Err(e) = renderer.shutdown().await {
            tracing::warn!("Failed to blank display: {}", e);
        }

        metrics.log_summary();
        tracing::info!("Main loop stopped");
        Ok(())
    }
}

/// One period: refresh from VLC, sample, compose and render.
async fn tick(
    dispatcher: &ActionDispatcher,
    state: &StateManager,
    sampler: &mut MetricsSampler,
    renderer: &mut Renderer,
    metrics: &Metrics,
) {
    // Failures are logged by the dispatcher; the last known state is drawn
    let _ = dispatcher.refresh().await;

    let sample = sampler.sample(Local::now());
    let playback = state.snapshot();
    let frame = renderer.compose(&sample, &playback);

    match renderer.render(frame).await {
        Ok(RenderOutcome::Drawn) => metrics.record_frame_drawn(),
        Ok(RenderOutcome::Skipped) => metrics.record_frame_skipped(),
        Err(e) => {
            metrics.record_draw_error();
            tracing::warn!("Display update failed: {}", e);
        }
    }

    if metrics.record_tick() % METRICS_LOG_TICKS == 0 {
        metrics.log_periodic();
    }
}

async fn log_state_changes(mut changes: broadcast::Receiver<StateChange>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let change = tokio::select! {
            _ = shutdown.changed() => break,
            change = changes.recv() => change,
        };

        match change {
            Ok(StateChange::TrackChanged { track_name }) => {
                tracing::info!("Now playing: {}", track_name.as_deref().unwrap_or("nothing"));
            }
            Ok(StateChange::StatusChanged { from, to }) => {
                tracing::info!("Playback {} -> {}", from, to);
            }
            Ok(StateChange::VolumeChanged { volume }) => {
                tracing::debug!("Volume {}", volume);
            }
            Ok(StateChange::PositionChanged { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("State logger skipped {} changes", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Load the playlist into VLC unless shutdown is requested first.
///
/// # Returns
/// The number of files enqueued, or `None` if VLC failed (logged) or shutdown won.
pub async fn prepare_vlc(vlc: &RcClient, config: &VlcConfig, mut shutdown: watch::Receiver<bool>) -> Option<usize> {
    tokio::select! {
        prepared = vlc.prepare(config) => match prepared {
            Ok(count) => {
                tracing::info!("Loaded {} media files into VLC at {}", count, vlc.addr());
                Some(count)
            }
            Err(e) => {
                tracing::warn!("VLC playlist not loaded ({}): {}", vlc.addr(), e);
                None
            }
        },
        _ = shutdown.changed() => {
            tracing::info!("Shutdown requested while preparing VLC");
            None
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
                    _ = terminate.recv() => tracing::info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
