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
use tracing::debug;

use super::envelope::{EnvelopeGenerator, Stage};
use crate::sample::SampleAsset;

/// Playback speed multiplier for a note relative to the asset's root note,
/// folding in the sample-rate conversion between source and output.
fn pitch_ratio(note: u8, root_note: u8, source_rate: f64, output_rate: f64) -> f64 {
    let semitones = note as f64 - root_note as f64;
    (semitones / 12.0).exp2() * source_rate / output_rate
}

/// One independent playback stream rendering a single active note.
///
/// A voice reads the shared asset at a fractional position advanced by the
/// pitch ratio each frame, shaping the interpolated sample by velocity gain
/// and the envelope. Voices are created once per pool slot and recycled; a
/// voice is active iff it has a note assigned.
pub struct PlaybackVoice {
    note: Option<u8>,
    /// Monotonic start counter, used for deterministic stealing and FIFO
    /// note-off matching.
    start_order: u64,
    pitch_ratio: f64,
    /// Fractional frame index into the asset.
    position: f64,
    lgain: f32,
    rgain: f32,
    envelope: EnvelopeGenerator,
}

impl PlaybackVoice {
    /// Creates an inactive voice.
    pub fn new() -> PlaybackVoice {
        PlaybackVoice {
            note: None,
            start_order: 0,
            pitch_ratio: 0.0,
            position: 0.0,
            lgain: 0.0,
            rgain: 0.0,
            envelope: EnvelopeGenerator::new(),
        }
    }

    /// Returns the active note, if any.
    pub fn note(&self) -> Option<u8> {
        self.note
    }

    /// Returns true while the voice is rendering a note (including the
    /// release tail).
    pub fn is_active(&self) -> bool {
        self.note.is_some()
    }

    /// Returns true once note-off has been received and the release tail is
    /// running.
    pub fn is_releasing(&self) -> bool {
        self.envelope.stage() == Stage::Release
    }

    /// Returns the start counter assigned when the note began.
    pub fn start_order(&self) -> u64 {
        self.start_order
    }

    /// Starts a note. No-op for empty assets or degenerate sample rates so
    /// that NaN/Inf never reaches the output buffer.
    pub fn start(
        &mut self,
        note: u8,
        velocity: f32,
        start_order: u64,
        asset: &SampleAsset,
        output_rate: f64,
    ) {
        if asset.length() == 0 || asset.source_sample_rate() <= 0.0 || output_rate <= 0.0 {
            debug!(note, "Ignoring note-on for unplayable asset");
            return;
        }

        self.pitch_ratio = pitch_ratio(
            note,
            asset.root_note(),
            asset.source_sample_rate(),
            output_rate,
        );
        self.position = 0.0;
        let velocity = velocity.clamp(0.0, 1.0);
        self.lgain = velocity;
        self.rgain = velocity;

        // The envelope runs at the asset's source rate, matching the rate the
        // attack/release times were authored against.
        self.envelope
            .configure(asset.envelope(), asset.source_sample_rate());
        self.envelope.note_on();

        self.start_order = start_order;
        self.note = Some(note);
    }

    /// Stops the note. With tail-off the voice keeps rendering through the
    /// release; otherwise it is cut immediately (used by voice stealing).
    pub fn stop(&mut self, allow_tail_off: bool) {
        if allow_tail_off {
            self.envelope.note_off();
        } else {
            self.note = None;
            self.envelope.force_off();
        }
    }

    /// Renders the voice additively into an interleaved output buffer.
    ///
    /// The playback position never exceeds the asset length; the guard frames
    /// allocated past the end keep the `position + 1` interpolation read in
    /// bounds. Reaching the end of the sample cuts the voice for the rest of
    /// the block.
    pub fn render(&mut self, out: &mut [f32], channels: usize, asset: &SampleAsset) {
        if self.note.is_none() {
            return;
        }

        let in_l = asset.left();
        let in_r = asset.right();
        let length = asset.length() as f64;
        let frames = out.len() / channels;

        for frame in 0..frames {
            let pos = self.position as usize;
            let alpha = (self.position - pos as f64) as f32;
            let inv_alpha = 1.0 - alpha;

            // Simple linear interpolation.
            let mut l = in_l[pos] * inv_alpha + in_l[pos + 1] * alpha;
            let mut r = match in_r {
                Some(in_r) => in_r[pos] * inv_alpha + in_r[pos + 1] * alpha,
                None => l,
            };

            let envelope_value = self.envelope.next_sample();
            l *= self.lgain * envelope_value;
            r *= self.rgain * envelope_value;

            let slot = frame * channels;
            if channels > 1 {
                out[slot] += l;
                out[slot + 1] += r;
            } else {
                out[slot] += (l + r) * 0.5;
            }

            self.position += self.pitch_ratio;
            if self.position > length {
                self.stop(false);
                break;
            }
            if self.envelope.is_idle() {
                // Release tail finished; free the voice.
                self.note = None;
                break;
            }
        }
    }
}

impl std::fmt::Debug for PlaybackVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackVoice")
            .field("note", &self.note)
            .field("start_order", &self.start_order)
            .field("position", &self.position)
            .finish()
    }
}
