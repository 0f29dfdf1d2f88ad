//! File watcher for the config file in use.
//!
//! A dedicated thread receives either debounced filesystem events (the
//! parent directory is watched, so replace-by-rename is seen) or poll ticks.
//! Each wake-up reads the file and compares its content digest with the last
//! one observed; only a new digest triggers a reload. A digest is recorded
//! even when the reload fails, so broken content is reported once.
//!
//! Change events are handed to the registered callbacks and published on a
//! tokio watch channel for async consumers.

use crate::error::{ConfigError, ConfigResult};
use crate::merge::Map;
use chrono::{DateTime, Utc};
use notify_debouncer_mini::{DebounceEventResult, DebouncedEventKind, new_debouncer};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// How file changes are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// OS notifications, coalesced over `debounce`.
    Notify { debounce: Duration },
    /// Re-read the file every `interval`.
    Poll { interval: Duration },
}

impl Default for WatchMode {
    fn default() -> Self {
        WatchMode::Notify {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Lifecycle of a watched file source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatchState {
    Idle = 0,
    Watching = 1,
    ChangeDetected = 2,
    Reloading = 3,
    Stopped = 4,
}

impl WatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => WatchState::Watching,
            2 => WatchState::ChangeDetected,
            3 => WatchState::Reloading,
            4 => WatchState::Stopped,
            _ => WatchState::Idle,
        }
    }
}

impl std::fmt::Display for WatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchState::Idle => write!(f, "idle"),
            WatchState::Watching => write!(f, "watching"),
            WatchState::ChangeDetected => write!(f, "change-detected"),
            WatchState::Reloading => write!(f, "reloading"),
            WatchState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Shared, lock-free watch state.
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn get(&self) -> WatchState {
        WatchState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: WatchState) {
        self.0.store(state as u8, Ordering::SeqCst);
        debug!(%state, "watch state");
    }

    /// Move from `from` to `to`; fails if another transition got there first.
    fn advance(&self, from: WatchState, to: WatchState) -> bool {
        let moved = self
            .0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if moved {
            debug!(%from, %to, "watch state");
        }
        moved
    }
}

/// Identity of one observed file state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub modified: Option<SystemTime>,
    pub len: u64,
    /// Hex SHA-256 of the contents.
    pub digest: String,
}

impl Fingerprint {
    pub fn of(contents: &[u8], modified: Option<SystemTime>) -> Self {
        Self {
            modified,
            len: contents.len() as u64,
            digest: content_digest(contents),
        }
    }

    /// Same contents, regardless of timestamps.
    pub fn same_content(&self, other: &Fingerprint) -> bool {
        self.digest == other.digest
    }
}

/// Hex SHA-256 of file contents.
pub(crate) fn content_digest(contents: &[u8]) -> String {
    hex::encode(Sha256::digest(contents))
}

/// Read `path` and fingerprint what was read.
fn observe(path: &Path) -> std::io::Result<(Fingerprint, Vec<u8>)> {
    let contents = std::fs::read(path)?;
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
    Ok((Fingerprint::of(&contents, modified), contents))
}

/// Emitted after every reload attempt of a watched file.
#[derive(Debug, Clone)]
pub enum ConfigChangeEvent {
    /// New contents are live.
    Reloaded {
        path: PathBuf,
        generation: u64,
        /// Merged settings right after the reload.
        settings: Arc<Map>,
        at: DateTime<Utc>,
    },
    /// The file could not be read or parsed; the previous contents stay live.
    ReloadFailed {
        path: PathBuf,
        error: Arc<ConfigError>,
        at: DateTime<Utc>,
    },
}

impl ConfigChangeEvent {
    pub fn path(&self) -> &Path {
        match self {
            ConfigChangeEvent::Reloaded { path, .. } | ConfigChangeEvent::ReloadFailed { path, .. } => {
                path
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ConfigChangeEvent::ReloadFailed { .. })
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            ConfigChangeEvent::Reloaded { at, .. } | ConfigChangeEvent::ReloadFailed { at, .. } => *at,
        }
    }
}

/// Receiving side of the change channel.
#[derive(Debug, Clone)]
pub struct ChangeSubscription {
    events: watch::Receiver<Option<ConfigChangeEvent>>,
}

impl ChangeSubscription {
    pub(crate) fn new(events: watch::Receiver<Option<ConfigChangeEvent>>) -> Self {
        Self { events }
    }

    /// Wait for the next change event. Returns `None` once the config
    /// handle is gone.
    pub async fn wait_for_change(&mut self) -> Option<ConfigChangeEvent> {
        loop {
            if self.events.changed().await.is_err() {
                return None;
            }
            let event = self.events.borrow_and_update().clone();
            if event.is_some() {
                return event;
            }
        }
    }

    /// True if an event arrived that has not been waited for yet.
    pub fn has_pending_change(&self) -> bool {
        self.events.has_changed().unwrap_or(false)
    }

    /// The most recent event, without waiting.
    pub fn latest_event(&self) -> Option<ConfigChangeEvent> {
        self.events.borrow().clone()
    }
}

/// What the watcher thread drives.
pub(crate) trait WatchTarget: Send + Sync + 'static {
    /// Digest of the contents last loaded from `path`, if `path` is the file
    /// in use.
    fn loaded_digest(&self, path: &Path) -> Option<String>;

    /// Apply freshly read contents (or the read error) and describe the
    /// outcome. `None` when `path` is no longer the file in use.
    fn reload(&self, path: &Path, contents: ConfigResult<String>) -> Option<ConfigChangeEvent>;

    /// Deliver an event to subscribers. Called with no locks held.
    fn notify(&self, event: &ConfigChangeEvent);
}

enum WatchMessage {
    Fs(DebounceEventResult),
    Stop,
}

/// Running watcher. Stopping joins the thread unless called from it.
pub(crate) struct WatchHandle {
    path: PathBuf,
    state: Arc<StateCell>,
    tx: mpsc::Sender<WatchMessage>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Stop watching. No callback fires once this returns, except when it is
    /// called from a callback, where the current dispatch finishes first.
    pub(crate) fn stop(mut self) {
        self.state.set(WatchState::Stopped);
        let _ = self.tx.send(WatchMessage::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                debug!("unwatch from the watcher thread, not joining");
            } else if thread.join().is_err() {
                error!("config watcher thread panicked");
            }
        }
        info!(path = %self.path.display(), "stopped watching config file");
    }
}

/// Start watching `path`, reporting changes to `target`.
pub(crate) fn spawn(
    path: PathBuf,
    mode: WatchMode,
    state: Arc<StateCell>,
    target: Arc<dyn WatchTarget>,
) -> ConfigResult<WatchHandle> {
    let (tx, rx) = mpsc::channel();

    let debouncer = match mode {
        WatchMode::Notify { debounce } => {
            let dir = watch_dir(&path);
            if !dir.is_dir() {
                return Err(ConfigError::WatchUnavailable(format!(
                    "directory {} does not exist",
                    dir.display()
                )));
            }
            let fs_tx = tx.clone();
            let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
                let _ = fs_tx.send(WatchMessage::Fs(result));
            })
            .map_err(|e| ConfigError::WatchUnavailable(e.to_string()))?;
            debouncer
                .watcher()
                .watch(&dir, notify::RecursiveMode::NonRecursive)
                .map_err(|e| ConfigError::WatchUnavailable(e.to_string()))?;
            Some(debouncer)
        }
        WatchMode::Poll { .. } => None,
    };

    let mut observer = Observer::new(path.clone());
    state.set(WatchState::Watching);

    let thread = {
        let worker_state = state.clone();
        thread::Builder::new()
            .name("layerconf-watch".into())
            .spawn(move || {
                // Keep the debouncer alive
                let _debouncer = debouncer;
                run(rx, mode, &mut observer, &worker_state, target.as_ref());
            })
            .map_err(|e| {
                state.set(WatchState::Idle);
                ConfigError::WatchUnavailable(e.to_string())
            })?
    };

    info!(path = %path.display(), ?mode, "watching config file");
    Ok(WatchHandle {
        path,
        state,
        tx,
        thread: Some(thread),
    })
}

/// Directory to watch for `path`.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// True if an event for `event_path` concerns the watched `target`.
fn is_target(event_path: &Path, target: &Path) -> bool {
    event_path == target || (event_path.file_name().is_some() && event_path.file_name() == target.file_name())
}

fn run(
    rx: mpsc::Receiver<WatchMessage>,
    mode: WatchMode,
    observer: &mut Observer,
    state: &StateCell,
    target: &dyn WatchTarget,
) {
    loop {
        let message = match mode {
            WatchMode::Notify { .. } => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            WatchMode::Poll { interval } => rx.recv_timeout(interval),
        };

        let check = match message {
            Ok(WatchMessage::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => true,
            Ok(WatchMessage::Fs(Ok(events))) => events.iter().any(|event| {
                matches!(
                    event.kind,
                    DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                ) && is_target(&event.path, &observer.path)
            }),
            Ok(WatchMessage::Fs(Err(e))) => {
                error!(error = %e, "file watcher error");
                false
            }
        };
        if !check {
            continue;
        }

        let loaded = target.loaded_digest(&observer.path);
        let Some(contents) = observer.poll(loaded.as_deref()) else {
            continue;
        };
        if !state.advance(WatchState::Watching, WatchState::ChangeDetected)
            || !state.advance(WatchState::ChangeDetected, WatchState::Reloading)
        {
            break;
        }
        let event = target.reload(&observer.path, contents);
        if !state.advance(WatchState::Reloading, WatchState::Watching) {
            break;
        }
        if let Some(event) = event {
            target.notify(&event);
        }
    }
    debug!(path = %observer.path.display(), "config watcher thread exiting");
}

/// Tracks the last observed state of one file.
///
/// The baseline is the digest the file source last loaded, so changes made
/// before watching started, and reloads done outside the watcher, are both
/// accounted for. `last` remembers content already handed out, which keeps a
/// broken file from being reported on every tick.
struct Observer {
    path: PathBuf,
    last: Option<Fingerprint>,
    failing: bool,
}

impl Observer {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            last: None,
            failing: false,
        }
    }

    /// Contents to reload, if the file differs from both `loaded` and the
    /// last observation.
    fn poll(&mut self, loaded: Option<&str>) -> Option<ConfigResult<String>> {
        match observe(&self.path) {
            Ok((fingerprint, contents)) => {
                self.failing = false;
                let seen = loaded == Some(fingerprint.digest.as_str())
                    || self
                        .last
                        .as_ref()
                        .is_some_and(|last| last.same_content(&fingerprint));
                if seen {
                    self.last = Some(fingerprint);
                    return None;
                }
                debug!(path = %self.path.display(), digest = %fingerprint.digest, "config file changed");
                self.last = Some(fingerprint);
                Some(String::from_utf8(contents).map_err(|e| ConfigError::SourceUnavailable {
                    path: self.path.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                }))
            }
            // Mid-rename; the next event or tick sees the new file.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                if self.failing {
                    return None;
                }
                self.failing = true;
                Some(Err(ConfigError::SourceUnavailable {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}
