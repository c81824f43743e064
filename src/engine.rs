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

//! The polyphonic playback engine.
//!
//! This module provides:
//! - Per-block rendering of all active voices into an interleaved buffer
//! - Note event merging from the host stream and out-of-band injection
//! - Atomic sample asset replacement without audio-thread blocking
//! - The master gain and reverb output stage

mod envelope;
mod events;
mod mix;
mod pool;
mod reverb;
mod voice;

pub use events::{EventInjector, NoteEvent};
pub use pool::MAX_VOICES;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::params::{ParamSnapshot, Params};
use crate::sample::{self, SampleAsset, SampleError};
use events::EventMerger;
use mix::MixBus;
use pool::VoicePool;

/// State shared between the audio thread and controllers.
struct Shared {
    /// The loaded sample, replaced wholesale on a new load.
    asset: RwLock<Option<Arc<SampleAsset>>>,
    /// Bumped on every asset install; the audio thread hard-stops all voices
    /// when it observes a change, so no voice renders from a stale buffer.
    asset_generation: AtomicU64,
    params: Params,
}

/// The audio-thread half of the engine.
///
/// Exactly one thread calls [`Engine::process_block`], once per host
/// callback. The render path never blocks, never allocates, and only touches
/// the shared state through atomics and one short read-lock per block.
pub struct Engine {
    shared: Arc<Shared>,
    injector: EventInjector,
    merger: EventMerger,
    pool: VoicePool,
    mix_bus: MixBus,
    output_rate: f64,
    channels: usize,
    /// The asset handle used for the current block, re-fetched on swap.
    asset: Option<Arc<SampleAsset>>,
    seen_generation: u64,
}

impl Engine {
    /// Creates an engine with no sample loaded. Call [`Engine::prepare`]
    /// before processing.
    pub fn new() -> Engine {
        let (injector, merger) = events::event_queue();
        Engine {
            shared: Arc::new(Shared {
                asset: RwLock::new(None),
                asset_generation: AtomicU64::new(0),
                params: Params::new(),
            }),
            injector,
            merger,
            pool: VoicePool::new(),
            mix_bus: MixBus::new(),
            output_rate: 44100.0,
            channels: 2,
            asset: None,
            seen_generation: 0,
        }
    }

    /// Returns a controller for the non-audio threads. Controllers are
    /// cheap to clone.
    pub fn controller(&self) -> EngineController {
        EngineController {
            shared: self.shared.clone(),
            injector: self.injector.clone(),
        }
    }

    /// Configures the engine for the host's output format. Mono and stereo
    /// are supported; anything wider is clamped to stereo. Safe to call
    /// again on transport changes; all voices are silenced.
    pub fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.output_rate = sample_rate.max(1) as f64;
        self.channels = channels.clamp(1, 2);
        self.pool.all_sound_off();
        self.mix_bus.prepare(self.output_rate, self.channels);
        info!(sample_rate, channels = self.channels, "Engine prepared");
    }

    /// Renders one block into the interleaved output buffer.
    ///
    /// Injected events merge ahead of `host_events`; all events dispatch at
    /// block-start timing (a documented trade-off against sub-block
    /// accuracy). The buffer is overwritten, not accumulated into.
    pub fn process_block(&mut self, out: &mut [f32], host_events: &[NoteEvent]) {
        out.fill(0.0);
        let channels = self.channels;

        // Re-fetch the shared asset handle. On a swap, every voice still
        // references the outgoing buffer and is silenced before any new
        // dispatch can see the replacement.
        let generation = self.shared.asset_generation.load(Ordering::Acquire);
        if generation != self.seen_generation {
            self.pool.all_sound_off();
            self.asset = self.shared.asset.read().clone();
            self.seen_generation = generation;
        }

        for event in self.merger.drain() {
            Self::dispatch(&mut self.pool, self.asset.as_deref(), self.output_rate, event);
        }
        for event in host_events {
            Self::dispatch(&mut self.pool, self.asset.as_deref(), self.output_rate, *event);
        }

        if let Some(asset) = self.asset.as_deref() {
            self.pool.render(out, channels, asset);
        }

        self.mix_bus.process(
            out,
            channels,
            self.shared.params.volume(),
            self.shared.params.reverb_mix(),
        );
    }

    fn dispatch(
        pool: &mut VoicePool,
        asset: Option<&SampleAsset>,
        output_rate: f64,
        event: NoteEvent,
    ) {
        match event {
            NoteEvent::NoteOn { note, velocity } => {
                if let Some(asset) = asset {
                    pool.note_on(note, velocity, asset, output_rate);
                }
            }
            NoteEvent::NoteOff { note } => pool.note_off(note),
        }
    }

    /// Returns the number of voices currently rendering.
    pub fn active_voices(&self) -> usize {
        self.pool.active_count()
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("output_rate", &self.output_rate)
            .field("channels", &self.channels)
            .field("active_voices", &self.pool.active_count())
            .finish()
    }
}

/// The non-audio-thread half of the engine: note injection, sample loading,
/// and the parameter surface.
#[derive(Clone)]
pub struct EngineController {
    shared: Arc<Shared>,
    injector: EventInjector,
}

impl EngineController {
    /// Enqueues a note-on for the next processing block.
    pub fn note_on(&self, note: u8, velocity: f32) {
        self.injector.note_on(note, velocity);
    }

    /// Enqueues a note-off for the next processing block.
    pub fn note_off(&self, note: u8) {
        self.injector.note_off(note);
    }

    /// Loads a sample file and installs it as the engine's asset.
    ///
    /// Must be called off the audio thread. On failure the previous asset
    /// stays installed and playing voices are unaffected.
    pub fn load_sample<P: AsRef<Path>>(&self, path: P) -> Result<(), SampleError> {
        let asset = sample::load(path)?;
        let name = asset.name().to_string();
        self.install_asset(asset);
        info!(name, "Sample installed");
        Ok(())
    }

    /// Returns the name of the loaded sample, or an empty string.
    pub fn loaded_sample_name(&self) -> String {
        self.shared
            .asset
            .read()
            .as_ref()
            .map(|asset| asset.name().to_string())
            .unwrap_or_default()
    }

    /// Sets the master gain in [0, 1].
    pub fn set_volume(&self, volume: f32) {
        self.shared.params.set_volume(volume);
    }

    /// Returns the master gain.
    pub fn volume(&self) -> f32 {
        self.shared.params.volume()
    }

    /// Sets the reverb wet/dry mix in [0, 1].
    pub fn set_reverb_mix(&self, mix: f32) {
        self.shared.params.set_reverb_mix(mix);
    }

    /// Returns the reverb wet/dry mix.
    pub fn reverb_mix(&self) -> f32 {
        self.shared.params.reverb_mix()
    }

    /// Captures the parameter surface for persistence.
    pub fn snapshot(&self) -> ParamSnapshot {
        self.shared.params.snapshot()
    }

    /// Restores a previously captured parameter surface.
    pub fn restore(&self, snapshot: &ParamSnapshot) {
        self.shared.params.restore(snapshot);
    }

    /// Installs an already-built asset. The swap is a pointer replacement
    /// under a short write lock; the audio thread notices via the generation
    /// counter.
    fn install_asset(&self, asset: Arc<SampleAsset>) {
        let mut slot = self.shared.asset.write();
        *slot = Some(asset);
        drop(slot);
        self.shared
            .asset_generation
            .fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
impl EngineController {
    /// Installs a test asset directly, bypassing the file loader.
    pub(crate) fn install_test_asset(&self, asset: Arc<SampleAsset>) {
        self.install_asset(asset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{DEFAULT_RELEASE_SECS, DEFAULT_ROOT_NOTE};
    use crate::testutil::{self, rms};

    const BLOCK: usize = 512;

    fn prepared_engine(channels: usize) -> (Engine, EngineController) {
        let mut engine = Engine::new();
        engine.prepare(48000, channels);
        let controller = engine.controller();
        (engine, controller)
    }

    fn render_block(engine: &mut Engine, events: &[NoteEvent]) -> Vec<f32> {
        let mut out = vec![0.0f32; BLOCK * 2];
        engine.process_block(&mut out, events);
        out
    }

    #[test]
    fn test_note_lifecycle_scenario() {
        // One second of 48kHz mono audio, root note 60. Play the root at
        // velocity 0.8, release after ~2000 frames, and expect the output to
        // decay to silence within the release time.
        let (mut engine, controller) = prepared_engine(2);
        controller.set_volume(1.0);
        controller.install_test_asset(testutil::test_asset(
            testutil::sine(220.0, 48000, 48000),
            1,
            48000,
            DEFAULT_ROOT_NOTE,
            0.0,
            DEFAULT_RELEASE_SECS,
        ));

        let on = [NoteEvent::NoteOn {
            note: 60,
            velocity: 0.8,
        }];
        let first = render_block(&mut engine, &on);
        assert!(rms(&first) > 0.0, "note-on must produce output");
        assert_eq!(engine.active_voices(), 1);

        // Carry on to roughly frame 2048, then release.
        let sustained = render_block(&mut engine, &[]);
        render_block(&mut engine, &[]);
        let sustained_rms = rms(&sustained);

        let off = [NoteEvent::NoteOff { note: 60 }];
        let releasing = render_block(&mut engine, &off);
        assert!(rms(&releasing) > 0.0, "release tail must keep sounding");

        // The release is 0.1s = 4800 frames; after ten more blocks the voice
        // must be gone and the output silent.
        let mut last_rms = rms(&releasing);
        for _ in 0..10 {
            let block = render_block(&mut engine, &[]);
            let block_rms = rms(&block);
            assert!(block_rms <= last_rms + 1e-3, "release must decay");
            last_rms = block_rms;
        }
        assert_eq!(engine.active_voices(), 0);
        assert!(last_rms < 1e-6, "voice must reach silence");
        assert!(sustained_rms > last_rms);
    }

    #[test]
    fn test_injected_events_merge_before_host_stream() {
        let (mut engine, controller) = prepared_engine(2);
        controller.install_test_asset(testutil::test_asset(
            vec![0.5f32; 48000],
            1,
            48000,
            60,
            0.0,
            0.1,
        ));

        controller.note_on(60, 1.0);
        let out = render_block(&mut engine, &[]);
        assert!(rms(&out) > 0.0, "injected note must sound");
        assert_eq!(engine.active_voices(), 1);

        controller.note_off(60);
        render_block(&mut engine, &[]);
        // Voice enters release; after the tail it frees up.
        for _ in 0..12 {
            render_block(&mut engine, &[]);
        }
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn test_no_output_without_asset() {
        let (mut engine, controller) = prepared_engine(2);
        controller.note_on(60, 1.0);
        let out = render_block(
            &mut engine,
            &[NoteEvent::NoteOn {
                note: 64,
                velocity: 1.0,
            }],
        );
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn test_asset_swap_silences_voices() {
        let (mut engine, controller) = prepared_engine(2);
        controller.install_test_asset(testutil::test_asset(
            vec![0.5f32; 48000],
            1,
            48000,
            60,
            0.0,
            0.1,
        ));

        render_block(
            &mut engine,
            &[NoteEvent::NoteOn {
                note: 60,
                velocity: 1.0,
            }],
        );
        assert_eq!(engine.active_voices(), 1);

        // Installing a new asset hard-stops everything referencing the old
        // one before any further rendering.
        controller.install_test_asset(testutil::test_asset(
            vec![0.1f32; 48000],
            1,
            48000,
            60,
            0.0,
            0.1,
        ));
        let out = render_block(&mut engine, &[]);
        assert_eq!(engine.active_voices(), 0);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_load_failure_keeps_previous_asset() {
        let (mut engine, controller) = prepared_engine(2);
        controller.install_test_asset(testutil::test_asset(
            vec![0.5f32; 48000],
            1,
            48000,
            60,
            0.0,
            0.1,
        ));
        render_block(
            &mut engine,
            &[NoteEvent::NoteOn {
                note: 60,
                velocity: 1.0,
            }],
        );

        assert!(controller.load_sample("/nonexistent/sample.wav").is_err());
        assert_eq!(controller.loaded_sample_name(), "test.wav");

        // The playing voice is unaffected by the failed load.
        let out = render_block(&mut engine, &[]);
        assert_eq!(engine.active_voices(), 1);
        assert!(rms(&out) > 0.0);
    }

    #[test]
    fn test_loaded_wav_round_trip() {
        // Loading a WAV through the real decoder and playing the root note at
        // unity pitch reproduces the file contents scaled by velocity and the
        // attack ramp, sample for sample.
        let (mut engine, controller) = prepared_engine(2);
        controller.set_volume(1.0);

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ramp.wav");
        let source: Vec<f32> = (0..BLOCK).map(|i| (i as f32 / BLOCK as f32) - 0.5).collect();
        testutil::write_wav_f32(&path, &source, 1, 48000).expect("write wav");

        controller.load_sample(&path).expect("load");
        assert_eq!(controller.loaded_sample_name(), "ramp.wav");

        let out = render_block(
            &mut engine,
            &[NoteEvent::NoteOn {
                note: 60,
                velocity: 1.0,
            }],
        );

        // The default 10ms attack at 48kHz ramps over 480 samples.
        let attack_samples = 480.0;
        for (i, sample) in source.iter().enumerate() {
            let env = ((i as f32 + 1.0) / attack_samples).min(1.0);
            assert!(
                (out[i * 2] - sample * env).abs() < 1e-3,
                "frame {}: expected {}, got {}",
                i,
                sample * env,
                out[i * 2]
            );
        }
    }

    #[test]
    fn test_loaded_sample_name_empty_without_asset() {
        let (_engine, controller) = prepared_engine(2);
        assert_eq!(controller.loaded_sample_name(), "");
    }

    #[test]
    fn test_volume_scales_output() {
        let (mut engine, controller) = prepared_engine(2);
        controller.install_test_asset(testutil::test_asset(
            vec![0.5f32; 48000],
            1,
            48000,
            60,
            0.0,
            0.1,
        ));
        controller.set_volume(1.0);

        let on = [NoteEvent::NoteOn {
            note: 60,
            velocity: 1.0,
        }];
        let full = render_block(&mut engine, &on);

        controller.set_volume(0.5);
        let half = render_block(&mut engine, &[]);
        assert!((rms(&half) - rms(&full) * 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_reverb_mix_changes_output() {
        let (mut engine, controller) = prepared_engine(2);
        controller.install_test_asset(testutil::test_asset(
            vec![0.5f32; 48000],
            1,
            48000,
            60,
            0.0,
            0.1,
        ));
        controller.set_volume(1.0);

        let on = [NoteEvent::NoteOn {
            note: 60,
            velocity: 1.0,
        }];
        let dry = render_block(&mut engine, &on);
        assert!(dry.iter().all(|s| (*s - 0.5).abs() < 1e-6));

        // Same signal with the reverb engaged: the wet/dry stage must change
        // the block contents away from the flat dry level.
        controller.set_reverb_mix(0.9);
        let wet = render_block(&mut engine, &[]);
        assert!(rms(&wet) > 0.0);
        assert!(wet.iter().any(|s| (*s - 0.5).abs() > 1e-3));
    }

    #[test]
    fn test_polyphony_cap_through_engine() {
        let (mut engine, controller) = prepared_engine(2);
        controller.install_test_asset(testutil::test_asset(
            vec![0.25f32; 48000],
            1,
            48000,
            60,
            0.0,
            0.1,
        ));

        let events: Vec<NoteEvent> = (0..12)
            .map(|i| NoteEvent::NoteOn {
                note: 48 + i,
                velocity: 0.5,
            })
            .collect();
        render_block(&mut engine, &events);
        assert_eq!(engine.active_voices(), MAX_VOICES);
    }

    #[test]
    fn test_mono_output() {
        let (mut engine, controller) = prepared_engine(1);
        controller.install_test_asset(testutil::test_asset(
            vec![0.5f32; 48000],
            1,
            48000,
            60,
            0.0,
            0.1,
        ));
        controller.set_volume(1.0);

        let mut out = vec![0.0f32; BLOCK];
        engine.process_block(
            &mut out,
            &[NoteEvent::NoteOn {
                note: 60,
                velocity: 1.0,
            }],
        );
        assert!((out[0] - 0.5).abs() < 1e-6);
    }
}
