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
use super::reverb::Reverb;

/// The reverb stage only runs above this wet/dry mix, so an effectively-dry
/// setting costs nothing.
pub(crate) const REVERB_ENABLE_THRESHOLD: f32 = 0.01;

/// The output stage: master gain over the summed voices, then an optional
/// reverb pass.
pub struct MixBus {
    reverb: Reverb,
}

impl MixBus {
    /// Creates an unprepared mix bus.
    pub fn new() -> MixBus {
        MixBus {
            reverb: Reverb::new(),
        }
    }

    /// Builds the reverb delay lines for the output configuration.
    pub fn prepare(&mut self, sample_rate: f64, channels: usize) {
        self.reverb.prepare(sample_rate, channels);
    }

    /// Clears effect state without reallocating.
    pub fn reset(&mut self) {
        self.reverb.reset();
    }

    /// Applies master gain and, when the mix warrants it, reverb in place.
    pub fn process(&mut self, out: &mut [f32], channels: usize, volume: f32, reverb_mix: f32) {
        let volume = volume.clamp(0.0, 1.0);
        for sample in out.iter_mut() {
            *sample *= volume;
        }

        if reverb_mix > REVERB_ENABLE_THRESHOLD {
            self.reverb.process(out, channels, reverb_mix);
        }
    }
}
