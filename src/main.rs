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
use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use hound::{SampleFormat, WavSpec, WavWriter};

use keysamp::engine::{Engine, NoteEvent};
use keysamp::sample;

/// Frames rendered per processing block when bouncing offline.
const BLOCK_FRAMES: usize = 512;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A polyphonic sample playback engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints information about a sample file.
    Inspect {
        /// The path to the sample file.
        path: PathBuf,
    },
    /// Renders a note sequence through the engine into a WAV file.
    Render {
        /// The sample file to play.
        sample: PathBuf,
        /// The output WAV file.
        out: PathBuf,
        /// The notes to play. Should be in the form <NOTE>:<VELOCITY>:<START>:<DURATION>,...
        /// with times in seconds. For example, 60:0.8:0:1,64:0.8:0.5:1.
        notes: String,
        /// The output sample rate.
        #[arg(long, default_value_t = 48000)]
        sample_rate: u32,
        /// The master gain.
        #[arg(short, long, default_value_t = 0.7)]
        volume: f32,
        /// The reverb wet/dry mix.
        #[arg(short, long, default_value_t = 0.0)]
        reverb: f32,
        /// Extra seconds rendered after the last note-off.
        #[arg(long, default_value_t = 1.0)]
        tail: f32,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { path } => {
            let asset = sample::load(&path)?;

            println!("Name: {}", asset.name());
            println!("Channels: {}", asset.channel_count());
            println!("Sample rate: {} Hz", asset.source_sample_rate());
            println!("Frames: {}", asset.length());
            println!("Duration: {:.3}s", asset.duration().as_secs_f64());
            println!("Root note: {}", asset.root_note());
            println!("Memory: {} KiB", asset.memory_size() / 1024);
        }
        Commands::Render {
            sample,
            out,
            notes,
            sample_rate,
            volume,
            reverb,
            tail,
        } => {
            let events = parse_notes(&notes, sample_rate)?;

            let mut engine = Engine::new();
            engine.prepare(sample_rate, 2);

            let controller = engine.controller();
            controller.load_sample(&sample)?;
            controller.set_volume(volume);
            controller.set_reverb_mix(reverb);

            let last_event_frame = events.last().map(|(frame, _)| *frame).unwrap_or(0);
            let total_frames =
                last_event_frame as usize + (tail.max(0.0) * sample_rate as f32) as usize;

            let mut writer = WavWriter::create(
                &out,
                WavSpec {
                    channels: 2,
                    sample_rate,
                    bits_per_sample: 32,
                    sample_format: SampleFormat::Float,
                },
            )?;

            let mut block = vec![0.0f32; BLOCK_FRAMES * 2];
            let mut block_events: Vec<NoteEvent> = Vec::new();
            let mut next_event = 0;
            let mut frame = 0usize;

            while frame < total_frames {
                // Events falling inside this block dispatch at its start.
                block_events.clear();
                let block_end = (frame + BLOCK_FRAMES) as u64;
                while next_event < events.len() && events[next_event].0 < block_end {
                    block_events.push(events[next_event].1);
                    next_event += 1;
                }

                engine.process_block(&mut block, &block_events);
                for value in &block {
                    writer.write_sample(*value)?;
                }
                frame += BLOCK_FRAMES;
            }
            writer.finalize()?;

            println!(
                "Rendered {} frames ({:.2}s) to {}",
                total_frames,
                total_frames as f64 / sample_rate as f64,
                out.display()
            );
        }
    }

    Ok(())
}

/// Parses a note sequence specification into frame-stamped note events.
fn parse_notes(spec: &str, sample_rate: u32) -> Result<Vec<(u64, NoteEvent)>, Box<dyn Error>> {
    let mut events: Vec<(u64, NoteEvent)> = Vec::new();

    for entry in spec.split(',') {
        let fields: Vec<&str> = entry.split(':').collect();
        if fields.len() != 4 {
            return Err(format!("malformed note specification '{}'", entry).into());
        }

        let note = fields[0].parse::<u8>()?;
        if note > 127 {
            return Err(format!("note {} out of MIDI range", note).into());
        }
        let velocity = fields[1].parse::<f32>()?;
        let start = fields[2].parse::<f64>()?;
        let duration = fields[3].parse::<f64>()?;
        if start < 0.0 || duration <= 0.0 {
            return Err(format!("invalid timing in note specification '{}'", entry).into());
        }

        let start_frame = (start * sample_rate as f64) as u64;
        let end_frame = ((start + duration) * sample_rate as f64) as u64;
        events.push((start_frame, NoteEvent::NoteOn { note, velocity }));
        events.push((end_frame, NoteEvent::NoteOff { note }));
    }

    events.sort_by_key(|(frame, _)| *frame);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_notes() {
        let events = parse_notes("60:0.8:0:1,64:0.5:0.5:1", 48000).expect("parse");
        assert_eq!(events.len(), 4);
        assert_eq!(
            events[0],
            (
                0,
                NoteEvent::NoteOn {
                    note: 60,
                    velocity: 0.8
                }
            )
        );
        assert_eq!(
            events[1],
            (
                24000,
                NoteEvent::NoteOn {
                    note: 64,
                    velocity: 0.5
                }
            )
        );
        assert_eq!(events[2], (48000, NoteEvent::NoteOff { note: 60 }));
        assert_eq!(events[3], (72000, NoteEvent::NoteOff { note: 64 }));
    }

    #[test]
    fn test_parse_notes_rejects_malformed_entries() {
        assert!(parse_notes("60:0.8:0", 48000).is_err());
        assert!(parse_notes("60:0.8:0:-1", 48000).is_err());
        assert!(parse_notes("200:0.8:0:1", 48000).is_err());
        assert!(parse_notes("sixty:0.8:0:1", 48000).is_err());
    }
}
