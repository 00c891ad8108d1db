use std::path::PathBuf;

use clap::Parser;
use renderer::Antialiasing;

#[derive(Parser, Debug)]
#[command(
    name = "boltshade",
    author,
    version,
    about = "Procedural lightning background renderer"
)]
pub struct Cli {
    /// Path to an effect configuration TOML file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Window size in physical pixels (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// FPS cap for continuous rendering (0 = uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Hue angle of the bolt in degrees.
    #[arg(long, value_name = "DEGREES")]
    pub hue: Option<f32>,

    /// Animation speed multiplier.
    #[arg(long, value_name = "FACTOR")]
    pub speed: Option<f32>,

    /// Noise scale controlling bolt thickness and wander.
    #[arg(long, value_name = "FACTOR")]
    pub scale: Option<f32>,

    /// Horizontal offset of the bolt centre line.
    #[arg(long, value_name = "OFFSET")]
    pub x_offset: Option<f32>,

    /// Anti-aliasing policy: `auto`, `off`, or an MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<Antialiasing>,

    /// Seed for the burst RNG; omit for entropy seeding.
    #[arg(long, value_name = "SEED", env = "BOLTSHADE_SEED")]
    pub seed: Option<u64>,

    /// Freeze the effect at a fixed timestamp instead of animating.
    #[arg(long)]
    pub still: bool,

    /// Export a single frame to the given PNG path, then exit.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Timestamp (seconds) evaluated by `--still` and `--export`.
    #[arg(long, value_name = "SECONDS")]
    pub time: Option<f32>,

    /// Window title override.
    #[arg(long, value_name = "TITLE")]
    pub window_title: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_size(raw: &str) -> Result<(u32, u32), String> {
    let (width, height) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{raw}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{raw}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{raw}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got '{raw}'"));
    }
    Ok((width, height))
}

fn parse_antialias(raw: &str) -> Result<Antialiasing, String> {
    match raw {
        "auto" => Ok(Antialiasing::Auto),
        "off" => Ok(Antialiasing::Off),
        other => {
            let samples: u32 = other
                .parse()
                .map_err(|_| format!("expected 'auto', 'off', or a sample count, got '{other}'"))?;
            match samples {
                0 | 1 => Ok(Antialiasing::Off),
                2 | 4 | 8 | 16 => Ok(Antialiasing::Samples(samples)),
                unsupported => Err(format!("unsupported MSAA sample count: {unsupported}")),
            }
        }
    }
}
