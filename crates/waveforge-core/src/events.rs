//! Change notifications and progress reporting
//!
//! The engine never calls into UI code directly. Everything a view needs to
//! follow (selection, track list, sample edits, undo state, playback
//! position) is published as an event on an [`EventBus`]; every subscriber
//! gets its own crossbeam receiver.

use std::sync::{Mutex, PoisonError};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::types::{SampleIndex, Selection, TrackId};

// ============================================================================
// Event Bus
// ============================================================================

/// Default queue depth per subscriber
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Fan-out event bus
///
/// Publishing never blocks: a full subscriber queue drops the event for
/// that subscriber, a disconnected subscriber is removed.
pub struct EventBus<E> {
    subscribers: Mutex<Vec<Sender<E>>>,
    capacity: usize,
}

impl<E: Clone> EventBus<E> {
    /// Create a new event bus with bounded per-subscriber capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Get a receiver for subscribing to events
    pub fn subscribe(&self) -> Receiver<E> {
        let (sender, receiver) = channel::bounded(self.capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: E) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("Event queue full, dropping event for one subscriber");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Number of connected subscribers (as of the last publish)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(EVENT_QUEUE_CAPACITY)
    }
}

impl<E> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("capacity", &self.capacity).finish()
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Notifications published by the signal manager
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    /// The sample selection changed
    SelectionChanged(Selection),
    /// A track was inserted at the given index
    TrackInserted { index: usize, id: TrackId },
    /// The track at the given index was removed
    TrackDeleted { index: usize, id: TrackId },
    /// A track was selected or deselected
    TrackSelectionChanged { index: usize, selected: bool },
    /// Samples were inserted into a track
    SamplesInserted { track: usize, offset: SampleIndex, length: SampleIndex },
    /// Samples were removed from a track
    SamplesDeleted { track: usize, offset: SampleIndex, length: SampleIndex },
    /// Samples of a track were overwritten
    SamplesModified { track: usize, offset: SampleIndex, length: SampleIndex },
    /// Labels, file info or other metadata changed
    MetaDataChanged,
    /// The modified flag changed
    ModifiedChanged(bool),
    /// New undo / redo state, with the description of the next step
    UndoRedoInfo { undo: Option<String>, redo: Option<String> },
    /// The signal was closed
    Closed,
}

/// Notifications published by the playback controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    Started,
    Paused,
    Stopped,
    /// Current playback position
    Position(SampleIndex),
    /// A seek request has been carried out
    SeekDone(SampleIndex),
}

/// Progress of a long running read or write
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressUpdate {
    /// Completion in percent
    Percent(f64),
    /// Number of samples written so far
    Samples(SampleIndex),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_fan_out() {
        let bus = EventBus::new(16);
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(PlaybackEvent::Started);

        assert_eq!(a.try_recv().unwrap(), PlaybackEvent::Started);
        assert_eq!(b.try_recv().unwrap(), PlaybackEvent::Started);
    }

    #[test]
    fn test_disconnected_subscriber_is_dropped() {
        let bus = EventBus::new(4);
        let rx = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(SignalEvent::Closed);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(rx.try_recv().unwrap(), SignalEvent::Closed);
    }

    #[test]
    fn test_publish_never_blocks() {
        let bus = EventBus::new(1);
        let rx = bus.subscribe();
        bus.publish(PlaybackEvent::Position(1));
        bus.publish(PlaybackEvent::Position(2));
        assert_eq!(rx.try_recv().unwrap(), PlaybackEvent::Position(1));
        assert!(rx.try_recv().is_err());
    }
}
