// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2023 Adrian <adrian.eddy at gmail>

use clap::Parser;
use raster_video::*;
use std::path::PathBuf;

/// Encode an image sequence into a raw elementary video bitstream.
#[derive(Parser)]
#[command(name = "raster_video")]
struct Args {
    /// Directory with the input frames (png/jpeg), encoded in sorted order
    input: PathBuf,

    /// Output bitstream file
    #[arg(short, long, default_value = "output.h264")]
    output: PathBuf,

    /// Codec name (unknown names fall back to h264 with a warning)
    #[arg(long, default_value = "h264")]
    codec: String,

    /// Target bitrate in bits per second
    #[arg(long)]
    bitrate: Option<i64>,

    /// Fixed quantizer 0-69 (disables bitrate rate control)
    #[arg(long)]
    qp: Option<i32>,

    #[arg(long, default_value_t = 25)]
    fps: i32,

    /// Encoder preset, e.g. "medium" or "veryfast"
    #[arg(long)]
    preset: Option<String>,

    /// Encoder profile, e.g. "high444"
    #[arg(long)]
    profile: Option<String>,
}

fn frame_paths(dir: &PathBuf) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
                Some("png" | "jpg" | "jpeg")
            )
        })
        .collect();
    files.sort();
    Ok(files)
}

fn main() {
    let _ = simple_log::new(simple_log::LogConfig::default());

    let args = Args::parse();

    let files = match frame_paths(&args.input) {
        Ok(files) if !files.is_empty() => files,
        Ok(_) => {
            eprintln!("No frames found in {:?}", args.input);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Cannot read {:?}: {e}", args.input);
            std::process::exit(1);
        }
    };

    // the first frame decides the session resolution
    let first = match image::open(&files[0]) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            eprintln!("Cannot read frame {:?}: {e}", files[0]);
            std::process::exit(1);
        }
    };
    let (width, height) = first.dimensions();

    let mut encoder = match Encoder::new(args.output.clone(), width, height, &args.codec) {
        Ok(enc) => enc,
        Err(e) => {
            eprintln!("Could not open {:?}: {e}", args.output);
            std::process::exit(1);
        }
    };

    if let Some(bitrate) = args.bitrate {
        encoder.set_bitrate(bitrate);
    }
    if let Some(qp) = args.qp {
        encoder.use_fixed_qp(true);
        encoder.set_qp(qp);
    }
    encoder.set_fps(args.fps);
    if let Some(preset) = &args.preset {
        encoder.set_preset(preset);
    }
    if let Some(profile) = &args.profile {
        encoder.set_profile(profile);
    }

    match encoder.initialize() {
        Ok(InitStatus::Initialized) => { }
        Ok(InitStatus::FallbackCodec(codec)) => {
            eprintln!("Warning: unknown codec {:?}, encoding with {}", args.codec, codec.name());
        }
        Err(e) => {
            eprintln!("Video encoder initialization failed: {e}");
            std::process::exit(1);
        }
    }

    let mut written = 0usize;
    for path in &files {
        let frame = match image::open(path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                eprintln!("Cannot read frame {path:?}: {e}");
                break;
            }
        };
        match encoder.write(&frame) {
            Ok(()) => written += 1,
            Err(VideoEncodeError::ResolutionMismatch { got_width, got_height, .. }) => {
                eprintln!("Skipping {path:?}: {got_width}x{got_height} does not match {width}x{height}");
            }
            Err(e) => {
                eprintln!("Encoding failed: {e}");
                break;
            }
        }
    }

    if let Err(e) = encoder.close() {
        eprintln!("Finalizing the stream failed: {e}");
        std::process::exit(1);
    }
    println!("Encoded {written} frames to {:?}", args.output);
}
