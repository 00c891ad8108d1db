use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use renderer::{Antialiasing, EffectParams, RenderPolicy, RendererConfig};
use storm::BurstTuning;
use stormconfig::{AntialiasSetting, EffectConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(args: Cli) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let settings = resolve_settings(&args, &config)?;
    tracing::debug!(
        size = ?settings.surface_size,
        policy = ?settings.policy,
        seed = ?settings.seed,
        "starting lightning renderer"
    );
    renderer::run_windowed(settings)
}

/// Loads the effect configuration: an explicit `--config` path must exist,
/// the default per-user location is optional.
fn load_config(explicit: Option<&Path>) -> Result<EffectConfig> {
    if let Some(path) = explicit {
        return EffectConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }
    if let Some(path) = default_config_path() {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading user configuration");
            return EffectConfig::load(&path)
                .with_context(|| format!("failed to load config from {}", path.display()));
        }
    }
    Ok(EffectConfig::default())
}

fn default_config_path() -> Option<PathBuf> {
    directories_next::ProjectDirs::from("", "", "boltshade")
        .map(|dirs| dirs.config_dir().join("effect.toml"))
}

/// Merges defaults, file configuration, and CLI flags (highest precedence)
/// into the renderer configuration.
fn resolve_settings(args: &Cli, config: &EffectConfig) -> Result<RendererConfig> {
    let defaults = RendererConfig::default();

    let params = EffectParams {
        hue_degrees: args
            .hue
            .or(config.effect.hue)
            .unwrap_or(defaults.params.hue_degrees),
        speed: args
            .speed
            .or(config.effect.speed)
            .unwrap_or(defaults.params.speed),
        noise_scale: args
            .scale
            .or(config.effect.size)
            .unwrap_or(defaults.params.noise_scale),
        x_offset: args
            .x_offset
            .or(config.effect.x_offset)
            .unwrap_or(defaults.params.x_offset),
    };

    let mut tuning = BurstTuning::default();
    config.bursts.apply(&mut tuning);
    // Surface tuning mistakes now instead of at window creation.
    tuning.validate()?;

    let surface_size = args.size.unwrap_or_else(|| {
        (
            config.window.width.unwrap_or(defaults.surface_size.0),
            config.window.height.unwrap_or(defaults.surface_size.1),
        )
    });

    let antialiasing = args.antialias.unwrap_or_else(|| {
        match config.window.antialias {
            Some(AntialiasSetting::Auto) | None => Antialiasing::Auto,
            Some(AntialiasSetting::Off) => Antialiasing::Off,
            Some(AntialiasSetting::Samples(count)) => Antialiasing::Samples(count),
        }
    });

    let target_fps = args
        .fps
        .or(config.window.fps)
        .and_then(|fps| if fps > 0.0 { Some(fps) } else { None });

    let policy = if let Some(path) = &args.export {
        RenderPolicy::Export {
            time: args.time,
            path: path.clone(),
        }
    } else if args.still {
        RenderPolicy::Still { time: args.time }
    } else {
        RenderPolicy::Animate { target_fps }
    };

    Ok(RendererConfig {
        surface_size,
        window_title: args
            .window_title
            .clone()
            .or_else(|| config.window.title.clone())
            .unwrap_or(defaults.window_title),
        antialiasing,
        params,
        tuning,
        seed: args.seed,
        policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["boltshade"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults_apply_when_nothing_is_given() {
        let settings = resolve_settings(&cli(&[]), &EffectConfig::default()).unwrap();
        assert_eq!(settings.surface_size, (1280, 720));
        assert_eq!(settings.params.hue_degrees, 230.0);
        assert_eq!(settings.policy, RenderPolicy::Animate { target_fps: None });
        assert_eq!(settings.tuning, BurstTuning::default());
        assert!(settings.seed.is_none());
    }

    #[test]
    fn cli_flags_override_file_values() {
        let config = EffectConfig::from_toml_str(
            r#"
[effect]
hue = 120.0
speed = 1.0

[window]
width = 640
height = 480
fps = 30
"#,
        )
        .unwrap();

        let settings = resolve_settings(&cli(&["--hue", "300", "--size", "800x600"]), &config).unwrap();
        assert_eq!(settings.params.hue_degrees, 300.0);
        // Untouched by CLI: file value wins over defaults.
        assert_eq!(settings.params.speed, 1.0);
        assert_eq!(settings.surface_size, (800, 600));
        assert_eq!(
            settings.policy,
            RenderPolicy::Animate {
                target_fps: Some(30.0)
            }
        );
    }

    #[test]
    fn zero_fps_means_uncapped() {
        let settings = resolve_settings(&cli(&["--fps", "0"]), &EffectConfig::default()).unwrap();
        assert_eq!(settings.policy, RenderPolicy::Animate { target_fps: None });
    }

    #[test]
    fn export_flag_selects_export_policy() {
        let settings = resolve_settings(
            &cli(&["--export", "/tmp/out.png", "--time", "3.5"]),
            &EffectConfig::default(),
        )
        .unwrap();
        assert_eq!(
            settings.policy,
            RenderPolicy::Export {
                time: Some(3.5),
                path: PathBuf::from("/tmp/out.png"),
            }
        );
    }

    #[test]
    fn still_flag_freezes_time() {
        let settings =
            resolve_settings(&cli(&["--still", "--time", "8"]), &EffectConfig::default()).unwrap();
        assert_eq!(settings.policy, RenderPolicy::Still { time: Some(8.0) });
    }

    #[test]
    fn burst_overrides_flow_into_tuning() {
        let config = EffectConfig::from_toml_str(
            r#"
[bursts]
min_gap = "1s"
max_gap = "2s"
double_chance = 0.0
"#,
        )
        .unwrap();
        let settings = resolve_settings(&cli(&[]), &config).unwrap();
        assert_eq!(settings.tuning.min_gap, Duration::from_secs(1));
        assert_eq!(settings.tuning.max_gap, Duration::from_secs(2));
        assert_eq!(settings.tuning.double_chance, 0.0);
    }

    #[test]
    fn inverted_burst_ranges_are_rejected_early() {
        let config = EffectConfig::from_toml_str(
            r#"
[bursts]
min_gap = "10s"
max_gap = "2s"
"#,
        )
        .unwrap();
        assert!(resolve_settings(&cli(&[]), &config).is_err());
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("effect.toml");
        std::fs::write(&path, "[effect]\nhue = 10.0\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.effect.hue, Some(10.0));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/effect.toml"))).is_err());
    }
}
