// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use crossbeam_channel::{bounded, Receiver, Sender, TryIter};
use midly::live::LiveEvent;
use midly::MidiMessage;
use tracing::warn;

/// Maximum number of note events queued between two processing blocks.
/// Injection beyond this drops events rather than blocking the caller.
const QUEUE_CAPACITY: usize = 128;

/// A note event consumed by the voice pool.
///
/// Events arrive either from the host's event stream or from out-of-band
/// injection (virtual keyboard); both dispatch at block-start timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteEvent {
    NoteOn {
        note: u8,
        /// Normalized velocity in [0, 1].
        velocity: f32,
    },
    NoteOff {
        note: u8,
    },
}

impl NoteEvent {
    /// Parses a raw MIDI message into a note event.
    ///
    /// Note On with velocity 0 is treated as Note Off. Non-note messages
    /// return None.
    pub fn from_midi(raw: &[u8]) -> Option<NoteEvent> {
        let event = LiveEvent::parse(raw).ok()?;
        let LiveEvent::Midi { message, .. } = event else {
            return None;
        };

        match message {
            MidiMessage::NoteOn { key, vel } => {
                let vel = u8::from(vel);
                if vel == 0 {
                    Some(NoteEvent::NoteOff {
                        note: u8::from(key),
                    })
                } else {
                    Some(NoteEvent::NoteOn {
                        note: u8::from(key),
                        velocity: vel as f32 / 127.0,
                    })
                }
            }
            MidiMessage::NoteOff { key, .. } => Some(NoteEvent::NoteOff {
                note: u8::from(key),
            }),
            _ => None,
        }
    }
}

/// Creates the injection/merge pair for out-of-band note events.
pub fn event_queue() -> (EventInjector, EventMerger) {
    let (tx, rx) = bounded(QUEUE_CAPACITY);
    (EventInjector { tx }, EventMerger { rx })
}

/// The UI-facing side of the event queue. Enqueueing never blocks; a full
/// queue drops the event.
#[derive(Clone)]
pub struct EventInjector {
    tx: Sender<NoteEvent>,
}

impl EventInjector {
    /// Enqueues a note-on for the next processing block.
    pub fn note_on(&self, note: u8, velocity: f32) {
        self.send(NoteEvent::NoteOn { note, velocity });
    }

    /// Enqueues a note-off for the next processing block.
    pub fn note_off(&self, note: u8) {
        self.send(NoteEvent::NoteOff { note });
    }

    fn send(&self, event: NoteEvent) {
        if self.tx.try_send(event).is_err() {
            warn!(?event, "Note event queue full, dropping event");
        }
    }
}

/// The audio-facing side of the event queue. Drained exactly once per block
/// ahead of the host event stream; draining takes no lock and does not block.
pub struct EventMerger {
    rx: Receiver<NoteEvent>,
}

impl EventMerger {
    /// Drains all pending injected events, clearing the queue.
    pub fn drain(&self) -> TryIter<'_, NoteEvent> {
        self.rx.try_iter()
    }
}
