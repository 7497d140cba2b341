// State management module
//
// This module provides the StateManager which wraps PlaybackState with thread-safe access
// using Arc<RwLock<T>> and emits change events for interested tasks.

use crate::models::{PlaybackState, PlaybackStatus};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Events a subscriber may fall behind by before it sees `Lagged`.
///
/// tokio rounds broadcast capacities up to a power of two, so this is one.
pub const STATE_EVENT_CAPACITY: usize = 128;

/// Change events emitted when the playback record is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// Playing / Paused / Stopped transition
    StatusChanged {
        from: PlaybackStatus,
        to: PlaybackStatus,
    },

    /// A different track (or no track) is loaded
    TrackChanged { track_name: Option<String> },

    VolumeChanged { volume: u8 },

    /// Playback position moved, as a fraction of the track length
    PositionChanged { position: Option<f32> },
}

/// Thread-safe holder of the "now playing" record
///
/// - Provides thread-safe access to [`PlaybackState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Usage
///
/// - [`snapshot()`](Self::snapshot) for the renderer; the clone is taken under the read
///   guard so a frame never mixes two states
/// - [`replace()`](Self::replace) is crate-private and called by
///   [`crate::services::ActionDispatcher`] only, so every change reflects what VLC reported
/// - [`subscribe()`](Self::subscribe) for listening to state changes
#[derive(Clone)]
pub struct StateManager {
    state: Arc<RwLock<PlaybackState>>,

    /// Multiple subscribers can listen for state changes
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager holding the initial Stopped state
    ///
    /// # Returns
    /// A new StateManager with a broadcast buffer of [`STATE_EVENT_CAPACITY`] events
    pub fn new() -> Self {
        Self::with_state(PlaybackState::default())
    }

    pub fn with_state(initial: PlaybackState) -> Self {
        let (state_tx, _) = broadcast::channel(STATE_EVENT_CAPACITY);
        Self {
            state: Arc::new(RwLock::new(initial)),
            state_tx,
        }
    }

    /// Get a consistent copy of the current state
    pub fn snapshot(&self) -> PlaybackState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let volume = state_manager.read(|state| state.volume);
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&PlaybackState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub(crate) fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut PlaybackState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);

        for change in &changes {
            // It's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Overwrite the record with VLC's authoritative status
    pub(crate) fn replace(&self, next: PlaybackState) -> Vec<StateChange> {
        self.update(|state| *state = next)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &PlaybackState, new: &PlaybackState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.status != new.status {
            changes.push(StateChange::StatusChanged {
                from: old.status,
                to: new.status,
            });
        }

        if old.track_name != new.track_name {
            changes.push(StateChange::TrackChanged {
                track_name: new.track_name.clone(),
            });
        }

        if old.volume != new.volume {
            changes.push(StateChange::VolumeChanged { volume: new.volume });
        }

        if old.position != new.position {
            changes.push(StateChange::PositionChanged {
                position: new.position,
            });
        }

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}
