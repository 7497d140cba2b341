//! Fakes shared by the integration tests: a scripted VLC, an in-memory display and a
//! fixed metrics probe.

#![allow(dead_code)]

use async_trait::async_trait;
use camino::Utf8Path;
use pideck::display::Frame;
use pideck::hardware::{DisplaySink, HardwareError};
use pideck::models::{PlaybackState, PlaybackStatus};
use pideck::services::{SampleReadError, SystemProbe, VlcControl, VlcError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// In-process stand-in for VLC that follows the same state machine as the real player.
#[derive(Default)]
pub struct FakeVlc {
    state: Mutex<PlaybackState>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    /// No track after or before the current one
    playlist_end: Mutex<bool>,
}

impl FakeVlc {
    pub fn new(initial: PlaybackState) -> Self {
        Self {
            state: Mutex::new(initial),
            ..Default::default()
        }
    }

    /// Make every call to `command` fail from now on
    pub fn fail(&self, command: &'static str) {
        self.failing.lock().unwrap().insert(command);
    }

    /// Make `next`/`previous` run off the playlist and stop playback
    pub fn at_playlist_end(&self) {
        *self.playlist_end.lock().unwrap() = true;
    }

    fn skip_to(&self, state: &mut PlaybackState, track: &str) {
        if *self.playlist_end.lock().unwrap() {
            state.status = PlaybackStatus::Stopped;
            state.track_name = None;
            state.position = None;
        } else {
            state.track_name = Some(track.to_string());
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls excluding status polls
    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().filter(|c| c != "status").collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn status_now(&self) -> PlaybackStatus {
        self.state.lock().unwrap().status
    }

    fn call(&self, name: &'static str, record: String, apply: impl FnOnce(&mut PlaybackState)) -> Result<(), VlcError> {
        self.calls.lock().unwrap().push(record);
        if self.failing.lock().unwrap().contains(name) {
            return Err(VlcError::NotRunning("connection refused".to_string()));
        }
        apply(&mut *self.state.lock().unwrap());
        Ok(())
    }
}

#[async_trait]
impl VlcControl for FakeVlc {
    async fn play(&self) -> Result<(), VlcError> {
        self.call("play", "play".into(), |s| s.status = PlaybackStatus::Playing)
    }

    async fn pause(&self) -> Result<(), VlcError> {
        self.call("pause", "pause".into(), |s| {
            if s.status == PlaybackStatus::Playing {
                s.status = PlaybackStatus::Paused;
            }
        })
    }

    async fn stop(&self) -> Result<(), VlcError> {
        self.call("stop", "stop".into(), |s| {
            s.status = PlaybackStatus::Stopped;
            s.position = None;
        })
    }

    async fn next(&self) -> Result<(), VlcError> {
        self.call("next", "next".into(), |s| self.skip_to(s, "next.mp3"))
    }

    async fn previous(&self) -> Result<(), VlcError> {
        self.call("previous", "previous".into(), |s| self.skip_to(s, "previous.mp3"))
    }

    async fn set_volume(&self, level: u8) -> Result<(), VlcError> {
        self.call("set_volume", format!("set_volume {}", level), |s| s.volume = level)
    }

    async fn status(&self) -> Result<PlaybackState, VlcError> {
        self.calls.lock().unwrap().push("status".to_string());
        if self.failing.lock().unwrap().contains("status") {
            return Err(VlcError::NotRunning("connection refused".to_string()));
        }
        Ok(self.state.lock().unwrap().clone())
    }
}

/// What the fake display has been asked to do
#[derive(Debug, Default)]
pub struct DisplayLog {
    pub frames: Vec<Frame>,
    pub cleared: usize,
    pub backlight: Vec<bool>,
}

/// Display that records frames instead of driving SPI
#[derive(Clone, Default)]
pub struct FakeDisplay {
    pub log: Arc<Mutex<DisplayLog>>,
}

impl FakeDisplay {
    pub fn frames_drawn(&self) -> usize {
        self.log.lock().unwrap().frames.len()
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.log.lock().unwrap().frames.last().cloned()
    }
}

impl DisplaySink for FakeDisplay {
    fn draw(&mut self, frame: &Frame) -> Result<(), HardwareError> {
        self.log.lock().unwrap().frames.push(frame.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), HardwareError> {
        self.log.lock().unwrap().cleared += 1;
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), HardwareError> {
        self.log.lock().unwrap().backlight.push(on);
        Ok(())
    }
}

/// Probe returning constant readings
pub struct FixedProbe {
    pub cpu: f32,
    pub mem: f32,
    pub disk: Result<f32, SampleReadError>,
}

impl SystemProbe for FixedProbe {
    fn cpu_percent(&mut self) -> Result<f32, SampleReadError> {
        Ok(self.cpu)
    }

    fn mem_percent(&mut self) -> Result<f32, SampleReadError> {
        Ok(self.mem)
    }

    fn disk_percent(&mut self, _mount: &Utf8Path) -> Result<f32, SampleReadError> {
        self.disk.clone()
    }
}
