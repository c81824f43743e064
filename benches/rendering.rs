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
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hound::{SampleFormat, WavSpec, WavWriter};
use keysamp::engine::{Engine, EngineController, NoteEvent};

fn generate_test_audio(duration_seconds: f32, sample_rate: u32) -> Vec<f32> {
    let num_samples = (duration_seconds * sample_rate as f32) as usize;
    let mut samples = Vec::with_capacity(num_samples);

    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        // Generate a complex signal with multiple frequencies
        let sample = 0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() +  // A4
                    0.2 * (2.0 * std::f32::consts::PI * 880.0 * t).sin() +  // A5
                    0.1 * (2.0 * std::f32::consts::PI * 1320.0 * t).sin(); // E6
        samples.push(sample);
    }

    samples
}

/// Builds an engine with a 2-second test sample installed via a temp WAV.
fn engine_with_sample(sample_rate: u32) -> (Engine, EngineController, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bench.wav");

    let samples = generate_test_audio(2.0, sample_rate);
    let mut writer = WavWriter::create(
        &path,
        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )
    .expect("writer");
    for sample in &samples {
        writer.write_sample(*sample).expect("write");
    }
    writer.finalize().expect("finalize");

    let mut engine = Engine::new();
    engine.prepare(sample_rate, 2);
    let controller = engine.controller();
    controller.load_sample(&path).expect("load");

    (engine, controller, dir)
}

fn benchmark_block_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_rendering");

    for block_frames in [64usize, 256, 1024] {
        let (mut engine, _controller, _dir) = engine_with_sample(48000);

        // Eight notes around the root, retriggered every block so the pool
        // stays full no matter how many iterations run.
        let events: Vec<NoteEvent> = (0..8)
            .map(|i| NoteEvent::NoteOn {
                note: 56 + i,
                velocity: 0.8,
            })
            .collect();
        let mut block = vec![0.0f32; block_frames * 2];

        group.bench_function(BenchmarkId::new("full_pool", block_frames), |b| {
            b.iter(|| {
                engine.process_block(black_box(&mut block), &events);
                black_box(&block);
            })
        });
    }

    group.finish();
}

fn benchmark_reverb_stage(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverb_stage");

    for (name, reverb_mix) in [("dry", 0.0f32), ("wet", 0.5)] {
        let (mut engine, controller, _dir) = engine_with_sample(48000);
        controller.set_reverb_mix(reverb_mix);

        let events = [NoteEvent::NoteOn {
            note: 60,
            velocity: 0.8,
        }];
        let mut block = vec![0.0f32; 512 * 2];

        group.bench_function(name, |b| {
            b.iter(|| {
                engine.process_block(black_box(&mut block), &events);
                black_box(&block);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_block_rendering, benchmark_reverb_stage);
criterion_main!(benches);
