use crate::models::{PlaybackState, PlaybackStatus, VlcConfig};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::fs;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

/// File extensions enqueued from the media directory
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["mp3", "mp4", "avi", "mkv", "wav", "flac", "ogg"];

/// VLC's RC interface expresses volume on a 0..=256 scale (256 = 100%).
const VLC_VOLUME_FULL: u32 = 256;

const PROMPT: &str = "> ";

/// Errors that can occur while talking to VLC
#[derive(Error, Debug)]
pub enum VlcError {
    #[error("VLC is not reachable: {0}")]
    NotRunning(String),

    #[error("VLC did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Nothing to play: {0}")]
    NoMedia(String),

    #[error("I/O error talking to VLC: {0}")]
    Io(#[from] std::io::Error),
}

/// The narrow interface the dispatcher needs from the media player.
///
/// Every call may fail; callers treat failures as non-fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VlcControl: Send + Sync {
    async fn play(&self) -> Result<(), VlcError>;
    async fn pause(&self) -> Result<(), VlcError>;
    async fn stop(&self) -> Result<(), VlcError>;
    async fn next(&self) -> Result<(), VlcError>;
    async fn previous(&self) -> Result<(), VlcError>;
    /// `level` is already clamped to `0..=100`
    async fn set_volume(&self, level: u8) -> Result<(), VlcError>;
    /// Authoritative playback status
    async fn status(&self) -> Result<PlaybackState, VlcError>;
}

pub fn percent_to_vlc(level: u8) -> u32 {
    (level.min(100) as u32 * VLC_VOLUME_FULL + 50) / 100
}

pub fn vlc_to_percent(raw: u32) -> u8 {
    ((raw.min(VLC_VOLUME_FULL) * 100 + VLC_VOLUME_FULL / 2) / VLC_VOLUME_FULL) as u8
}

/// Parser for RC interface replies.
///
/// Patterns are compiled once at construction:
///
/// - `state_pattern`: `( state playing )`
/// - `volume_pattern`: `( audio volume: 256 )`
/// - `input_pattern`: `( new input: file:///home/pi/media/song.mp3 )`
pub struct StatusParser {
    state_pattern: Regex,
    volume_pattern: Regex,
    input_pattern: Regex,
}

/// Fields extracted from a `status` reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReply {
    pub status: PlaybackStatus,
    pub volume: Option<u8>,
    pub input: Option<String>,
}

impl StatusParser {
    pub fn new() -> Self {
        Self {
            state_pattern: Regex::new(r"\(\s*state\s+(\w+)\s*\)").expect("Invalid state regex"),
            volume_pattern: Regex::new(r"\(\s*audio volume:\s*(\d+)").expect("Invalid volume regex"),
            input_pattern: Regex::new(r"\(\s*new input:\s*(.+?)\s*\)\s*$").expect("Invalid input regex"),
        }
    }

    pub fn parse_status(&self, reply: &str) -> StatusReply {
        let mut parsed = StatusReply::default();

        for line in reply.lines() {
            if let Some(caps) = self.state_pattern.captures(line) {
                parsed.status = Self::map_state(&caps[1]);
            } else if let Some(caps) = self.volume_pattern.captures(line) {
                parsed.volume = caps[1].parse::<u32>().ok().map(vlc_to_percent);
            } else if let Some(caps) = self.input_pattern.captures(line) {
                parsed.input = track_name_from_mrl(&caps[1]);
            }
        }

        parsed
    }

    /// Fold VLC's richer state set into the three states the appliance knows.
    fn map_state(state: &str) -> PlaybackStatus {
        match state.to_ascii_lowercase().as_str() {
            "playing" | "opening" | "buffering" => PlaybackStatus::Playing,
            "paused" => PlaybackStatus::Paused,
            _ => PlaybackStatus::Stopped,
        }
    }
}

impl Default for StatusParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Last path segment of an MRL, percent-decoded.
pub fn track_name_from_mrl(mrl: &str) -> Option<String> {
    let segment = mrl.trim().rsplit('/').next()?;
    let decoded = percent_decode(segment);
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Strip prompts and surrounding whitespace from a raw reply.
fn clean_reply(raw: &str) -> String {
    raw.lines()
        .map(|line| line.trim_start_matches(PROMPT).trim_end())
        .filter(|line| !line.is_empty() && *line != ">")
        .collect::<Vec<_>>()
        .join("\n")
}

/// List playable files in a directory, sorted by path.
pub fn media_files(dir: &Utf8Path) -> std::io::Result<Vec<Utf8PathBuf>> {
    let mut files: Vec<Utf8PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| Utf8PathBuf::try_from(entry.path()).ok())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Client for VLC's RC interface over TCP (`vlc -I rc --rc-host 127.0.0.1:4212`).
///
/// One connection is kept open and re-established lazily after any failure. Every
/// request is bounded by the configured timeout.
pub struct RcClient {
    addr: String,
    timeout: Duration,
    connection: Mutex<Option<TcpStream>>,
    parser: StatusParser,
}

impl RcClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            connection: Mutex::new(None),
            parser: StatusParser::new(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one command and return its cleaned reply.
    ///
    /// Cancel safe: dropping the future mid-exchange discards the connection, so a late
    /// reply can never be read as the answer to the next command.
    pub async fn request(&self, command: &str) -> Result<String, VlcError> {
        match timeout(self.timeout, self.request_inner(command)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("VLC command `{}` timed out after {:?}", command, self.timeout);
                Err(VlcError::Timeout(self.timeout))
            }
        }
    }

    async fn request_inner(&self, command: &str) -> Result<String, VlcError> {
        let mut guard = self.connection.lock().await;

        // The stream stays out of the slot until its reply has been read in full
        let mut stream = match guard.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        let reply = Self::exchange(&mut stream, command).await?;
        tracing::trace!("VLC `{}` -> {:?}", command, reply);
        *guard = Some(stream);
        Ok(reply)
    }

    async fn connect(&self) -> Result<TcpStream, VlcError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| VlcError::NotRunning(format!("{}: {}", self.addr, e)))?;
        stream.set_nodelay(true)?;

        // Discard the banner ("VLC media player ... Command Line Interface initialized")
        let banner = Self::read_reply(&mut stream).await?;
        tracing::debug!("Connected to VLC RC at {}: {}", self.addr, clean_reply(&banner));

        Ok(stream)
    }

    async fn exchange(stream: &mut TcpStream, command: &str) -> Result<String, VlcError> {
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        let raw = Self::read_reply(stream).await?;
        Ok(clean_reply(&raw))
    }

    /// Read until the prompt that ends every reply. The caller bounds the wait.
    async fn read_reply(stream: &mut TcpStream) -> Result<String, VlcError> {
        let mut reply = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(VlcError::NotRunning("connection closed by VLC".to_string()));
            }
            reply.extend_from_slice(&chunk[..n]);
            if reply.ends_with(PROMPT.as_bytes()) {
                break;
            }
        }

        Ok(String::from_utf8_lossy(&reply).into_owned())
    }

    async fn current_status(&self) -> Result<PlaybackStatus, VlcError> {
        let reply = self.request("status").await?;
        Ok(self.parser.parse_status(&reply).status)
    }

    async fn request_seconds(&self, command: &str) -> Result<Option<u64>, VlcError> {
        let reply = self.request(command).await?;
        Ok(reply
            .lines()
            .last()
            .and_then(|line| line.trim().parse::<u64>().ok()))
    }

    /// Replace the playlist with every supported file in `dir`.
    ///
    /// # Returns
    /// The number of files enqueued
    pub async fn load_playlist(&self, dir: &Utf8Path) -> Result<usize, VlcError> {
        let files = media_files(dir)
            .map_err(|e| VlcError::NoMedia(format!("cannot read {}: {}", dir, e)))?;

        self.request("clear").await?;
        for file in &files {
            self.request(&format!("enqueue {}", file)).await?;
        }

        tracing::info!("Enqueued {} media files from {}", files.len(), dir);
        Ok(files.len())
    }

    /// Startup sequence: fill the playlist from `media_path`, apply the initial volume and
    /// optionally start playing.
    pub async fn prepare(&self, config: &VlcConfig) -> Result<usize, VlcError> {
        let dir = Utf8PathBuf::from(config.expanded_media_path());
        let count = self.load_playlist(&dir).await?;

        self.set_volume(config.volume).await?;

        if config.autoplay {
            if count == 0 {
                return Err(VlcError::NoMedia(format!("no playable files in {}", dir)));
            }
            self.play().await?;
        }

        Ok(count)
    }
}

#[async_trait]
impl VlcControl for RcClient {
    async fn play(&self) -> Result<(), VlcError> {
        if self.current_status().await? == PlaybackStatus::Paused {
            // `pause` toggles, so on a paused player it resumes
            self.request("pause").await?;
        } else {
            self.request("play").await?;
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), VlcError> {
        // `is_playing` also answers 1 for a paused input, so ask for the state itself
        if self.current_status().await? == PlaybackStatus::Playing {
            self.request("pause").await?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), VlcError> {
        self.request("stop").await.map(|_| ())
    }

    async fn next(&self) -> Result<(), VlcError> {
        self.request("next").await.map(|_| ())
    }

    async fn previous(&self) -> Result<(), VlcError> {
        self.request("prev").await.map(|_| ())
    }

    async fn set_volume(&self, level: u8) -> Result<(), VlcError> {
        self.request(&format!("volume {}", percent_to_vlc(level)))
            .await
            .map(|_| ())
    }

    async fn status(&self) -> Result<PlaybackState, VlcError> {
        let reply = self.request("status").await?;
        let parsed = self.parser.parse_status(&reply);

        let title = self.request("get_title").await?;
        let title = title.lines().last().map(str::to_string);
        let track_name = title.filter(|t| !t.trim().is_empty()).or(parsed.input);

        let position = match (
            self.request_seconds("get_time").await?,
            self.request_seconds("get_length").await?,
        ) {
            (Some(time), Some(length)) if length > 0 => Some(time as f32 / length as f32),
            _ => None,
        };

        // VLC omits the volume line when no audio output exists yet
        let volume = parsed.volume.unwrap_or(0);

        Ok(PlaybackState::new(parsed.status, track_name, volume, position))
    }
}
