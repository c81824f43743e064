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
use crate::sample::EnvelopeParams;

/// The current stage of the envelope state machine.
///
/// There is no decay stage and no sustain level parameter: attack ramps to
/// full level and sustain holds there until note-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Attack,
    Sustain,
    Release,
}

/// A per-voice attack/sustain/release amplitude envelope.
///
/// Attack ramps linearly from 0 to 1, sustain holds at 1, release ramps
/// linearly from the level captured at note-off down to 0. `Stage::Idle` is
/// the sole signal that the owning voice is free for reuse.
pub struct EnvelopeGenerator {
    params: EnvelopeParams,
    sample_rate: f64,
    stage: Stage,
    level: f32,
    /// Per-sample step during attack, precomputed at note-on.
    attack_increment: f32,
    // Release bookkeeping, snapshotted at note-off so the ramp lands on
    // exactly zero regardless of the level it started from.
    release_start_level: f32,
    release_total_samples: u32,
    release_elapsed_samples: u32,
}

impl EnvelopeGenerator {
    /// Creates an idle envelope. `configure` must be called before use.
    pub fn new() -> EnvelopeGenerator {
        EnvelopeGenerator {
            params: EnvelopeParams {
                attack_secs: 0.0,
                release_secs: 0.0,
            },
            sample_rate: 44100.0,
            stage: Stage::Idle,
            level: 0.0,
            attack_increment: 1.0,
            release_start_level: 0.0,
            release_total_samples: 1,
            release_elapsed_samples: 0,
        }
    }

    /// Sets the envelope times and the rate at which `next_sample` is called.
    pub fn configure(&mut self, params: EnvelopeParams, sample_rate: f64) {
        self.params = params;
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Starts the attack phase from zero for a clean retrigger.
    pub fn note_on(&mut self) {
        self.level = 0.0;
        let attack_samples = self.params.attack_secs as f64 * self.sample_rate;
        self.attack_increment = if attack_samples >= 1.0 {
            (1.0 / attack_samples) as f32
        } else {
            1.0
        };
        self.release_elapsed_samples = 0;
        self.stage = Stage::Attack;
    }

    /// Starts the release phase from the current level. No-op when the
    /// envelope is already releasing or idle.
    pub fn note_off(&mut self) {
        if self.stage == Stage::Release || self.stage == Stage::Idle {
            return;
        }

        self.release_start_level = self.level;
        self.release_total_samples = (self.params.release_secs as f64 * self.sample_rate)
            .round()
            .max(1.0) as u32;
        self.release_elapsed_samples = 0;
        self.stage = Stage::Release;
    }

    /// Cuts the envelope to silence immediately, with no release tail.
    pub fn force_off(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
    }

    /// Advances the envelope by one sample and returns the current level.
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => {
                self.level = 0.0;
            }
            Stage::Attack => {
                self.level += self.attack_increment;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => {
                self.level = 1.0;
            }
            Stage::Release => {
                let progress =
                    self.release_elapsed_samples as f32 / self.release_total_samples as f32;
                self.level = (self.release_start_level * (1.0 - progress)).max(0.0);

                self.release_elapsed_samples = self.release_elapsed_samples.saturating_add(1);
                if self.release_elapsed_samples >= self.release_total_samples {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }

        self.level
    }

    /// Returns the current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns true once the envelope has fully finished.
    pub fn is_idle(&self) -> bool {
        self.stage == Stage::Idle
    }
}
