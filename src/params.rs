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

//! The engine's parameter surface.
//!
//! Parameters are read every block on the audio thread and written from
//! anywhere, so they are stored as f32 bit patterns in atomics. Persistence
//! goes through [`ParamSnapshot`]; the host owns the encoded blob.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Default master gain.
pub const DEFAULT_VOLUME: f32 = 0.7;

/// Default reverb wet/dry mix (fully dry).
pub const DEFAULT_REVERB_MIX: f32 = 0.0;

/// Lock-free parameter surface shared between the audio thread and
/// controllers.
#[derive(Debug)]
pub struct Params {
    volume: AtomicU32,
    reverb_mix: AtomicU32,
}

impl Params {
    /// Creates the surface with default values.
    pub fn new() -> Params {
        Params {
            volume: AtomicU32::new(DEFAULT_VOLUME.to_bits()),
            reverb_mix: AtomicU32::new(DEFAULT_REVERB_MIX.to_bits()),
        }
    }

    /// Returns the master gain in [0, 1].
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Sets the master gain, clamped to [0, 1].
    pub fn set_volume(&self, volume: f32) {
        self.volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Returns the reverb wet/dry mix in [0, 1].
    pub fn reverb_mix(&self) -> f32 {
        f32::from_bits(self.reverb_mix.load(Ordering::Relaxed))
    }

    /// Sets the reverb wet/dry mix, clamped to [0, 1].
    pub fn set_reverb_mix(&self, mix: f32) {
        self.reverb_mix
            .store(mix.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    /// Captures the current values for persistence.
    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            volume: self.volume(),
            reverb_mix: self.reverb_mix(),
        }
    }

    /// Restores previously captured values.
    pub fn restore(&self, snapshot: &ParamSnapshot) {
        self.set_volume(snapshot.volume);
        self.set_reverb_mix(snapshot.reverb_mix);
    }
}

impl Default for Params {
    fn default() -> Params {
        Params::new()
    }
}

/// A serializable snapshot of the parameter surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSnapshot {
    pub volume: f32,
    pub reverb_mix: f32,
}
