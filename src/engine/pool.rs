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

use super::voice::PlaybackVoice;
use crate::sample::SampleAsset;

/// Number of voices in the pool, and therefore the polyphony limit.
pub const MAX_VOICES: usize = 8;

/// A fixed-size pool of playback voices.
///
/// Voices are allocated once and recycled; dispatching notes never allocates.
/// When every voice is busy, the voice with the oldest start counter is
/// stolen (tie-break: lowest slot index), which keeps stealing deterministic.
pub struct VoicePool {
    voices: Vec<PlaybackVoice>,
    next_start_order: u64,
}

impl VoicePool {
    /// Creates a pool of [`MAX_VOICES`] idle voices.
    pub fn new() -> VoicePool {
        VoicePool {
            voices: (0..MAX_VOICES).map(|_| PlaybackVoice::new()).collect(),
            next_start_order: 0,
        }
    }

    /// Assigns a note-on to a free voice, stealing the oldest voice when the
    /// pool is exhausted. Repeated note-ons for the same note occupy separate
    /// voices.
    pub fn note_on(&mut self, note: u8, velocity: f32, asset: &SampleAsset, output_rate: f64) {
        let slot = match self.voices.iter().position(|v| !v.is_active()) {
            Some(slot) => slot,
            None => self.steal(),
        };

        let start_order = self.next_start_order;
        self.next_start_order += 1;
        self.voices[slot].start(note, velocity, start_order, asset, output_rate);
    }

    /// Hard-stops and returns the slot of the voice with the oldest start
    /// counter. Only called when every voice is active.
    fn steal(&mut self) -> usize {
        let slot = self
            .voices
            .iter()
            .enumerate()
            .min_by_key(|(index, v)| (v.start_order(), *index))
            .map(|(index, _)| index)
            .unwrap_or(0);

        debug!(slot, "Voice pool exhausted, stealing oldest voice");
        self.voices[slot].stop(false);
        slot
    }

    /// Releases (tail-off) the oldest voice holding the note that has not
    /// been released yet. One voice per invocation, so rapid re-presses pair
    /// note-offs with note-ons in order. No-op when nothing matches.
    pub fn note_off(&mut self, note: u8) {
        if let Some(voice) = self
            .voices
            .iter_mut()
            .filter(|v| v.note() == Some(note) && !v.is_releasing())
            .min_by_key(|v| v.start_order())
        {
            voice.stop(true);
        }
    }

    /// Hard-stops every voice. Used when the asset is swapped out or the
    /// transport resets.
    pub fn all_sound_off(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.stop(false);
        }
    }

    /// Renders every active voice additively into the interleaved buffer.
    pub fn render(&mut self, out: &mut [f32], channels: usize, asset: &SampleAsset) {
        for voice in self.voices.iter_mut() {
            voice.render(out, channels, asset);
        }
    }

    /// Returns the current number of active voices.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("active_voices", &self.active_count())
            .field("max_voices", &MAX_VOICES)
            .finish()
    }
}
