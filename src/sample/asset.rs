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
use super::decoder::DecodedSample;
use super::error::SampleError;

/// Guard frames appended past the playable length. Linear interpolation reads
/// one frame past the integer position, so the planes are always allocated
/// `length + GUARD_FRAMES` long with a zeroed tail.
pub(crate) const GUARD_FRAMES: usize = 4;

/// The most channels an asset keeps. Sources with more channels are clamped
/// to the first two.
const MAX_CHANNELS: usize = 2;

/// Envelope times applied to every note played from an asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeParams {
    /// Seconds to ramp from silence to full level on note-on.
    pub attack_secs: f32,
    /// Seconds to ramp from the held level to silence on note-off.
    pub release_secs: f32,
}

/// An immutable, fully decoded sample shared read-only by every voice.
///
/// Audio is stored planar (one buffer per channel) so the per-voice
/// interpolation loop walks contiguous memory. The asset is replaced
/// wholesale on a new load; it is never mutated.
pub struct SampleAsset {
    /// Display name of the source, typically the file name.
    name: String,
    /// Planar sample data, each plane `length + GUARD_FRAMES` long.
    planes: Vec<Vec<f32>>,
    /// Playable length in frames (excluding guard frames).
    length: usize,
    /// Sample rate the audio was recorded at.
    source_sample_rate: f64,
    /// MIDI note at which the sample plays at its recorded speed.
    root_note: u8,
    /// Envelope applied to notes played from this asset.
    envelope: EnvelopeParams,
}

impl SampleAsset {
    /// Builds an asset from decoded audio, capping the playable length at
    /// `max_secs` and clamping the channel count to stereo.
    pub fn from_decoded(
        name: String,
        decoded: DecodedSample,
        root_note: u8,
        envelope: EnvelopeParams,
        max_secs: f64,
    ) -> Result<SampleAsset, SampleError> {
        let frames = decoded.frames();
        if frames == 0 || decoded.sample_rate == 0 {
            return Err(SampleError::EmptySample(name));
        }

        let max_frames = (max_secs * decoded.sample_rate as f64) as usize;
        let length = frames.min(max_frames.max(1));

        let source_channels = decoded.channel_count as usize;
        let channels = source_channels.min(MAX_CHANNELS);

        let mut planes: Vec<Vec<f32>> = (0..channels)
            .map(|_| Vec::with_capacity(length + GUARD_FRAMES))
            .collect();
        for frame in 0..length {
            for (ch, plane) in planes.iter_mut().enumerate() {
                plane.push(decoded.samples[frame * source_channels + ch]);
            }
        }
        for plane in planes.iter_mut() {
            plane.resize(length + GUARD_FRAMES, 0.0);
        }

        Ok(SampleAsset {
            name,
            planes,
            length,
            source_sample_rate: decoded.sample_rate as f64,
            root_note,
            envelope,
        })
    }

    /// Returns the display name of the asset.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the playable length in frames.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Returns the number of channels (1 or 2).
    pub fn channel_count(&self) -> usize {
        self.planes.len()
    }

    /// Returns the sample rate the audio was recorded at.
    pub fn source_sample_rate(&self) -> f64 {
        self.source_sample_rate
    }

    /// Returns the MIDI root note.
    pub fn root_note(&self) -> u8 {
        self.root_note
    }

    /// Returns the envelope times for this asset.
    pub fn envelope(&self) -> EnvelopeParams {
        self.envelope
    }

    /// Returns the left channel plane, guard frames included.
    pub fn left(&self) -> &[f32] {
        &self.planes[0]
    }

    /// Returns the right channel plane if the source is stereo.
    pub fn right(&self) -> Option<&[f32]> {
        self.planes.get(1).map(|p| p.as_slice())
    }

    /// Returns the memory size of the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes
            .iter()
            .map(|p| p.len() * std::mem::size_of::<f32>())
            .sum()
    }

    /// Returns the duration of the playable audio.
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.length as f64 / self.source_sample_rate)
    }
}

impl std::fmt::Debug for SampleAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleAsset")
            .field("name", &self.name)
            .field("channels", &self.channel_count())
            .field("length", &self.length)
            .field("source_sample_rate", &self.source_sample_rate)
            .field("root_note", &self.root_note)
            .finish()
    }
}
