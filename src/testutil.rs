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

//! Audio test utilities for generating fixtures and validating results.

use std::error::Error;
use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::sample::{DecodedSample, EnvelopeParams, SampleAsset};

/// Generates a sine wave at the given frequency.
pub fn sine(frequency: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
    (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * PI * frequency * t).sin()
        })
        .collect()
}

/// Calculates the RMS (Root Mean Square) of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|&x| x * x).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Writes interleaved f32 samples to a WAV file.
pub fn write_wav_f32<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Builds an asset directly from interleaved samples, bypassing the decoder.
pub fn test_asset(
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    root_note: u8,
    attack_secs: f32,
    release_secs: f32,
) -> Arc<SampleAsset> {
    Arc::new(
        SampleAsset::from_decoded(
            "test.wav".to_string(),
            DecodedSample {
                samples,
                channel_count: channels,
                sample_rate,
            },
            root_note,
            EnvelopeParams {
                attack_secs,
                release_secs,
            },
            crate::sample::MAX_SAMPLE_SECS,
        )
        .expect("test asset"),
    )
}
