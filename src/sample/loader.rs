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

//! Sample loading.
//!
//! Samples are decoded entirely into memory so that playback on the audio
//! thread never touches the filesystem or allocates.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::asset::{EnvelopeParams, SampleAsset};
use super::decoder;
use super::error::SampleError;

/// MIDI root note assigned to loaded samples (middle C).
pub const DEFAULT_ROOT_NOTE: u8 = 60;

/// Attack time assigned to loaded samples.
pub const DEFAULT_ATTACK_SECS: f32 = 0.01;

/// Release time assigned to loaded samples.
pub const DEFAULT_RELEASE_SECS: f32 = 0.1;

/// Playable length cap for loaded samples.
pub const MAX_SAMPLE_SECS: f64 = 10.0;

/// Loads a sample file into an immutable in-memory asset.
///
/// The decoded audio is capped at [`MAX_SAMPLE_SECS`], clamped to stereo, and
/// given guard frames for interpolation. Failure leaves the caller's current
/// asset untouched; this function has no side effects.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Arc<SampleAsset>, SampleError> {
    let path = path.as_ref();
    info!(path = ?path, "Loading sample into memory");

    let decoded = decoder::decode_file(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let asset = SampleAsset::from_decoded(
        name,
        decoded,
        DEFAULT_ROOT_NOTE,
        EnvelopeParams {
            attack_secs: DEFAULT_ATTACK_SECS,
            release_secs: DEFAULT_RELEASE_SECS,
        },
        MAX_SAMPLE_SECS,
    )?;

    info!(
        name = asset.name(),
        channels = asset.channel_count(),
        sample_rate = asset.source_sample_rate(),
        frames = asset.length(),
        duration_ms = asset.duration().as_millis(),
        memory_kb = asset.memory_size() / 1024,
        "Sample loaded"
    );

    Ok(Arc::new(asset))
}
