//! Playback controller
//!
//! # State machine
//!
//! ```text
//!            start / loop              pause
//!  Stopped ─────────────────► Playing ───────► Paused
//!     ▲                       (+looping)  ◄─────  │
//!     │          stop             continue        │
//!     └──────────────────────────────────────────┘
//! ```
//!
//! The streaming loop runs on a [`WorkerTask`]. The control thread talks to
//! it through atomics plus two dedicated locks, one for the pending seek
//! and one for the open device. Neither is the signal manager lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam::channel::Receiver;

use super::device::{PlaybackDevice, PlaybackMethod, PlaybackParams};
use super::error::PlaybackError;
use super::mixer::MixerMatrix;
use super::registry::PlaybackDeviceRegistry;
use crate::events::{EventBus, PlaybackEvent, EVENT_QUEUE_CAPACITY};
use crate::multitrack::MultiTrackReader;
use crate::signal::{lock_manager, SharedSignalManager, UserInteraction};
use crate::storage::ReaderMode;
use crate::task::{TaskContext, WorkerTask, DEFAULT_STOP_TIMEOUT};
use crate::types::{Sample, SampleIndex};

/// Position notifications per second of played audio
pub const POSITION_UPDATES_PER_SECOND: u64 = 10;

/// Externally visible playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    /// Playing, restarting at the start of the range when reaching its end
    Looping,
    Paused,
}

// ============================================================================
// Shared state
// ============================================================================

/// State shared between the controller and the streaming worker
struct PlaybackShared {
    playing: AtomicBool,
    paused: AtomicBool,
    looping: AtomicBool,
    position: AtomicU64,
    start: AtomicU64,
    end: AtomicU64,
    /// Raised when the audible tracks changed, the worker rebuilds its mixer
    tracks_changed: AtomicBool,
    /// Pending seek request for the running worker
    seek: Mutex<Option<SampleIndex>>,
    /// Device opened by the worker
    device: Mutex<Option<Box<dyn PlaybackDevice>>>,
    events: EventBus<PlaybackEvent>,
}

impl PlaybackShared {
    fn new() -> Self {
        Self {
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            position: AtomicU64::new(0),
            start: AtomicU64::new(0),
            end: AtomicU64::new(0),
            tracks_changed: AtomicBool::new(false),
            seek: Mutex::new(None),
            device: Mutex::new(None),
            events: EventBus::new(EVENT_QUEUE_CAPACITY),
        }
    }

    fn start(&self) -> SampleIndex {
        self.start.load(Ordering::Acquire)
    }

    fn end(&self) -> SampleIndex {
        self.end.load(Ordering::Acquire)
    }

    fn set_position(&self, pos: SampleIndex) {
        self.position.store(pos, Ordering::Release);
    }

    fn publish(&self, event: PlaybackEvent) {
        self.events.publish(event);
    }

    fn write_frame(&self, frame: &[Sample]) -> Result<(), PlaybackError> {
        let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        match device.as_mut() {
            Some(device) => device.write(frame),
            None => Err(PlaybackError::NotOpen),
        }
    }

    fn close_device(&self) {
        let device = self.device.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut device) = device {
            if let Err(e) = device.close() {
                log::warn!("Closing playback device failed: {e}");
            }
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Plays a range of the signal through a device of the registry
pub struct PlaybackController {
    manager: SharedSignalManager,
    registry: Arc<PlaybackDeviceRegistry>,
    interaction: Arc<dyn UserInteraction>,
    shared: Arc<PlaybackShared>,
    worker: Option<WorkerTask>,
    method: PlaybackMethod,
    params: PlaybackParams,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state())
            .field("position", &self.position())
            .field("method", &self.method)
            .field("params", &self.params)
            .finish()
    }
}

impl PlaybackController {
    pub fn new(manager: SharedSignalManager, registry: Arc<PlaybackDeviceRegistry>) -> Self {
        let interaction = lock_manager(&manager).interaction();
        Self {
            manager,
            registry,
            interaction,
            shared: Arc::new(PlaybackShared::new()),
            worker: None,
            method: PlaybackMethod::default(),
            params: PlaybackParams::default(),
        }
    }

    /// Device method and parameters used for the next start
    pub fn set_device(&mut self, method: PlaybackMethod, params: PlaybackParams) {
        self.method = method;
        self.params = params;
    }

    pub fn method(&self) -> PlaybackMethod {
        self.method
    }

    pub fn params(&self) -> &PlaybackParams {
        &self.params
    }

    pub fn subscribe(&self) -> Receiver<PlaybackEvent> {
        self.shared.events.subscribe()
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn state(&self) -> PlaybackState {
        if self.is_paused() {
            PlaybackState::Paused
        } else if self.is_playing() {
            if self.is_looping() {
                PlaybackState::Looping
            } else {
                PlaybackState::Playing
            }
        } else {
            PlaybackState::Stopped
        }
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Acquire)
    }

    pub fn position(&self) -> SampleIndex {
        self.shared.position.load(Ordering::Acquire)
    }

    pub fn start_pos(&self) -> SampleIndex {
        self.shared.start()
    }

    pub fn end_pos(&self) -> SampleIndex {
        self.shared.end()
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Play the selection (or from the cursor to the end) once
    pub fn playback_start(&mut self) {
        self.start_playback(false);
    }

    /// Play the selection repeatedly
    pub fn playback_loop(&mut self) {
        self.start_playback(true);
    }

    fn start_playback(&mut self, looping: bool) {
        self.halt_worker();
        self.shared.paused.store(false, Ordering::Release);
        self.update_range();
        self.shared.set_position(self.shared.start());
        self.shared.looping.store(looping, Ordering::Release);
        self.launch();
    }

    /// Stop the device but keep the position
    pub fn playback_pause(&mut self) {
        if !self.is_playing() || self.is_paused() {
            return;
        }
        self.halt_worker();
        self.shared.paused.store(true, Ordering::Release);
        log::info!("Playback paused at {}", self.position());
        self.shared.publish(PlaybackEvent::Paused);
    }

    /// Resume a paused playback, or start a new one
    pub fn playback_continue(&mut self) {
        if !self.is_paused() {
            self.playback_start();
            return;
        }
        self.shared.paused.store(false, Ordering::Release);
        self.launch();
    }

    pub fn playback_stop(&mut self) {
        let active = self.is_playing() || self.is_paused();
        self.halt_worker();
        self.shared.playing.store(false, Ordering::Release);
        self.shared.paused.store(false, Ordering::Release);
        self.shared.looping.store(false, Ordering::Release);
        self.shared.set_position(self.shared.start());
        if active {
            log::info!("Playback stopped");
            self.shared.publish(PlaybackEvent::Stopped);
        }
    }

    /// Restart a running playback with the current selection and tracks
    ///
    /// No notification is sent: to listeners the playback just goes on.
    pub fn reload(&mut self) {
        if !self.is_playing() || self.is_paused() {
            return;
        }
        log::debug!("Reloading playback");
        self.halt_worker();
        self.update_range();
        let pos = self.position();
        if pos < self.shared.start() || pos > self.shared.end() {
            self.shared.set_position(self.shared.start());
        }
        self.spawn_worker();
    }

    /// Move the playback position, clamped to the playback range
    pub fn seek_to(&mut self, pos: SampleIndex) {
        let start = self.shared.start();
        let pos = pos.max(start).min(self.shared.end().max(start));
        if self.is_paused() || !self.is_playing() {
            // No worker is running to carry out the seek
            self.shared.set_position(pos);
            self.shared.publish(PlaybackEvent::Position(pos));
            if self.is_paused() {
                self.shared.publish(PlaybackEvent::SeekDone(pos));
            }
            return;
        }
        *self.shared.seek.lock().unwrap_or_else(PoisonError::into_inner) = Some(pos);
    }

    /// Audible tracks follow the track selection, pick up a change
    pub fn update_audible_tracks(&self) {
        self.shared.tracks_changed.store(true, Ordering::Release);
    }

    // ------------------------------------------------------------------
    // Worker handling
    // ------------------------------------------------------------------

    fn update_range(&mut self) {
        let manager = lock_manager(&self.manager);
        let selection = manager.selection();
        let length = manager.length();
        let start = selection.first().min(length.saturating_sub(1));
        let end = if selection.is_empty() {
            length.saturating_sub(1)
        } else {
            selection.last().min(length.saturating_sub(1))
        };
        self.shared.start.store(start, Ordering::Release);
        self.shared.end.store(end.max(start), Ordering::Release);
        let rate = manager.rate();
        if rate > 0 {
            self.params.rate = rate;
        }
    }

    fn launch(&mut self) {
        self.shared.playing.store(true, Ordering::Release);
        log::info!(
            "Playback {} [{}, {}] from {}",
            if self.is_looping() { "looping" } else { "started" },
            self.shared.start(),
            self.shared.end(),
            self.position()
        );
        self.shared.publish(PlaybackEvent::Started);
        self.spawn_worker();
    }

    fn spawn_worker(&mut self) {
        *self.shared.seek.lock().unwrap_or_else(PoisonError::into_inner) = None;
        let job = PlaybackJob {
            shared: self.shared.clone(),
            manager: self.manager.clone(),
            registry: self.registry.clone(),
            interaction: self.interaction.clone(),
            method: self.method,
            params: self.params.clone(),
        };
        match WorkerTask::spawn("playback", move |ctx| job.run(&ctx)) {
            Ok(worker) => self.worker = Some(worker),
            Err(e) => {
                log::error!("Failed to start playback thread: {e}");
                self.interaction.show_error(&PlaybackError::Spawn(e.to_string()).to_string());
                self.shared.playing.store(false, Ordering::Release);
                self.shared.publish(PlaybackEvent::Stopped);
            }
        }
    }

    fn halt_worker(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop(DEFAULT_STOP_TIMEOUT);
        }
        // A detached worker may still hold the device
        self.shared.close_device();
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.halt_worker();
    }
}

// ============================================================================
// Streaming loop
// ============================================================================

/// Everything the playback worker needs
struct PlaybackJob {
    shared: Arc<PlaybackShared>,
    manager: SharedSignalManager,
    registry: Arc<PlaybackDeviceRegistry>,
    interaction: Arc<dyn UserInteraction>,
    method: PlaybackMethod,
    params: PlaybackParams,
}

impl PlaybackJob {
    /// Positions inside the reader of the tracks that should be heard
    fn audible_inputs(&self, reader: &MultiTrackReader) -> Vec<usize> {
        let selected = lock_manager(&self.manager).selected_tracks();
        reader
            .track_indices()
            .iter()
            .enumerate()
            .filter(|(_, index)| selected.contains(index))
            .map(|(slot, _)| slot)
            .collect()
    }

    fn run(self, ctx: &TaskContext) {
        let shared = self.shared.clone();
        let start = shared.start();
        let end = shared.end();

        let mut reader = {
            let manager = lock_manager(&self.manager);
            manager.open_multi_track_reader(ReaderMode::FullSnapshot, &manager.all_tracks(), start, end)
        };
        if reader.tracks() == 0 {
            log::info!("Nothing to play");
            self.finish();
            return;
        }

        match self.registry.open_device(self.method, &self.params) {
            Ok((_, device)) => {
                *shared.device.lock().unwrap_or_else(PoisonError::into_inner) = Some(device);
            }
            Err(e) => {
                log::error!("Opening playback device failed: {e}");
                self.interaction.show_error(&e.to_string());
                self.finish();
                return;
            }
        }

        let mut position = shared.position.load(Ordering::Acquire).max(start);
        if position != start {
            reader.seek(position);
        }

        let channels = self.params.channels;
        let mut audible = self.audible_inputs(&reader);
        let mut mixer = MixerMatrix::new(audible.len(), channels);
        let mut input: Vec<Sample> = vec![0; reader.tracks()];
        let mut mixed_input: Vec<Sample> = vec![0; audible.len()];
        let mut output: Vec<Sample> = vec![0; channels];

        let interval = (self.params.rate / POSITION_UPDATES_PER_SECOND).max(1);
        let mut countdown = interval;
        let mut completed = true;

        loop {
            if ctx.should_stop() {
                completed = false;
                break;
            }

            if shared.tracks_changed.swap(false, Ordering::AcqRel) {
                audible = self.audible_inputs(&reader);
                mixer = MixerMatrix::new(audible.len(), channels);
                mixed_input.resize(audible.len(), 0);
                log::debug!("Playback mixer rebuilt for {} tracks", audible.len());
            }

            let seek = shared.seek.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(pos) = seek {
                reader.seek(pos);
                position = pos;
                shared.set_position(pos);
                shared.publish(PlaybackEvent::SeekDone(pos));
            }

            if !reader.read_frame(&mut input) {
                if !shared.looping.load(Ordering::Acquire) {
                    break;
                }
                if !reader.seek(start) || reader.eof() {
                    break;
                }
                position = start;
                shared.set_position(start);
                shared.publish(PlaybackEvent::Position(start));
                countdown = interval;
                continue;
            }

            for (slot, &i) in mixed_input.iter_mut().zip(&audible) {
                *slot = input[i];
            }
            mixer.mix(&mixed_input, &mut output);
            if let Err(e) = shared.write_frame(&output) {
                log::warn!("Playback write failed, ending playback: {e}");
                break;
            }

            position += 1;
            shared.set_position(position);
            countdown -= 1;
            if countdown == 0 {
                countdown = interval;
                shared.publish(PlaybackEvent::Position(position));
            }
        }

        shared.close_device();
        if completed {
            self.finish();
        }
    }

    /// End of range (or failure): back to Stopped
    fn finish(&self) {
        let shared = &self.shared;
        shared.looping.store(false, Ordering::Release);
        shared.set_position(shared.start());
        log::info!("Playback done");
        shared.publish(PlaybackEvent::Stopped);
        shared.playing.store(false, Ordering::Release);
    }
}
