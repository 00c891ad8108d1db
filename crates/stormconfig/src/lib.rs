//! TOML configuration for the lightning effect.
//!
//! Every field is optional; missing sections fall back to the built-in
//! defaults, and the CLI may override individual values on top. Durations
//! accept either a bare number of seconds (`min_gap = 5`) or a humantime
//! string (`min_gap = "5s"`).

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use storm::BurstTuning;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root of the effect configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectConfig {
    #[serde(default)]
    pub effect: EffectSection,
    #[serde(default)]
    pub bursts: BurstSection,
    #[serde(default)]
    pub window: WindowSection,
}

/// Visual parameters fed to the shader as uniforms.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectSection {
    /// Hue angle in degrees.
    pub hue: Option<f32>,
    /// Animation speed multiplier.
    pub speed: Option<f32>,
    /// Noise/bolt scale.
    pub size: Option<f32>,
    /// Horizontal offset of the bolt centre line.
    pub x_offset: Option<f32>,
}

/// Overrides for the burst timing state machine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BurstSection {
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub min_duration: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub max_duration: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub min_gap: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub max_gap: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub second_min_delay: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub second_max_delay: Option<Duration>,
    pub double_chance: Option<f32>,
    pub gain: Option<f32>,
}

impl BurstSection {
    /// Folds the overrides into a tuning struct. Range validation is left to
    /// `storm`, which rejects inconsistent combinations at construction.
    pub fn apply(&self, tuning: &mut BurstTuning) {
        if let Some(value) = self.min_duration {
            tuning.min_duration = value;
        }
        if let Some(value) = self.max_duration {
            tuning.max_duration = value;
        }
        if let Some(value) = self.min_gap {
            tuning.min_gap = value;
        }
        if let Some(value) = self.max_gap {
            tuning.max_gap = value;
        }
        if let Some(value) = self.second_min_delay {
            tuning.second_min_delay = value;
        }
        if let Some(value) = self.second_max_delay {
            tuning.second_max_delay = value;
        }
        if let Some(value) = self.double_chance {
            tuning.double_chance = value;
        }
        if let Some(value) = self.gain {
            tuning.gain = value;
        }
    }
}

/// Window geometry and presentation settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// FPS cap; 0 means uncapped.
    pub fps: Option<f32>,
    #[serde(default, deserialize_with = "deserialize_antialias_opt")]
    pub antialias: Option<AntialiasSetting>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntialiasSetting {
    Auto,
    Off,
    Samples(u32),
}

impl EffectConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EffectConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(speed) = self.effect.speed {
            if speed < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "effect.speed must be non-negative, got {speed}"
                )));
            }
        }
        if let Some(size) = self.effect.size {
            if size <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "effect.size must be positive, got {size}"
                )));
            }
        }
        if let Some(fps) = self.window.fps {
            if fps < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "window.fps must be non-negative, got {fps}"
                )));
            }
        }
        if self.window.width == Some(0) || self.window.height == Some(0) {
            return Err(ConfigError::Invalid(
                "window dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> de::Visitor<'de> for DurationVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a number of seconds or a humantime string like \"880ms\"")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
            if value < 0.0 || !value.is_finite() {
                return Err(E::custom(format!("invalid duration seconds: {value}")));
            }
            Ok(Some(Duration::from_secs_f64(value)))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            if value < 0 {
                return Err(E::custom(format!("invalid duration seconds: {value}")));
            }
            Ok(Some(Duration::from_secs(value as u64)))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            humantime::parse_duration(value)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{value}': {err}")))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    struct AntialiasVisitor;

    impl<'de> de::Visitor<'de> for AntialiasVisitor {
        type Value = Option<AntialiasSetting>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("\"auto\", \"off\", or an MSAA sample count (2, 4, 8, 16)")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            match value {
                0 | 1 => Ok(Some(AntialiasSetting::Off)),
                2 | 4 | 8 | 16 => Ok(Some(AntialiasSetting::Samples(value as u32))),
                other => Err(E::custom(format!("unsupported sample count: {other}"))),
            }
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            match value {
                "auto" => Ok(Some(AntialiasSetting::Auto)),
                "off" => Ok(Some(AntialiasSetting::Off)),
                other => other
                    .parse::<i64>()
                    .map_err(|_| E::custom(format!("unknown antialias mode: {other}")))
                    .and_then(|samples| self.visit_i64(samples)),
            }
        }
    }

    deserializer.deserialize_any(AntialiasVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = EffectConfig::from_toml_str("").unwrap();
        assert!(config.effect.hue.is_none());
        assert!(config.bursts.min_gap.is_none());
        assert!(config.window.fps.is_none());
    }

    #[test]
    fn parses_full_config() {
        let config = EffectConfig::from_toml_str(
            r#"
[effect]
hue = 230.0
speed = 0.6
size = 1.8
x_offset = 0.25

[bursts]
min_duration = "880ms"
max_duration = "1030ms"
min_gap = 5
max_gap = "13s"
double_chance = 0.4
gain = 1.2

[window]
width = 1280
height = 720
fps = 60
antialias = "4"
title = "storm demo"
"#,
        )
        .unwrap();

        assert_eq!(config.effect.hue, Some(230.0));
        assert_eq!(config.bursts.min_duration, Some(Duration::from_millis(880)));
        assert_eq!(config.bursts.min_gap, Some(Duration::from_secs(5)));
        assert_eq!(config.bursts.max_gap, Some(Duration::from_secs(13)));
        assert_eq!(config.window.antialias, Some(AntialiasSetting::Samples(4)));
        assert_eq!(config.window.title.as_deref(), Some("storm demo"));
    }

    #[test]
    fn burst_overrides_fold_into_tuning() {
        let config = EffectConfig::from_toml_str(
            r#"
[bursts]
min_gap = "2s"
max_gap = "4s"
gain = 0.9
"#,
        )
        .unwrap();

        let mut tuning = BurstTuning::default();
        config.bursts.apply(&mut tuning);
        assert_eq!(tuning.min_gap, Duration::from_secs(2));
        assert_eq!(tuning.max_gap, Duration::from_secs(4));
        assert_eq!(tuning.gain, 0.9);
        // Untouched fields keep their defaults.
        assert_eq!(tuning.min_duration, Duration::from_millis(880));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = EffectConfig::from_toml_str("[effect]\nbrightness = 2.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            EffectConfig::from_toml_str("[effect]\nsize = 0.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EffectConfig::from_toml_str("[window]\nwidth = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(EffectConfig::from_toml_str("[window]\nantialias = \"3\"\n").is_err());
        assert!(EffectConfig::from_toml_str("[bursts]\nmin_gap = \"soon\"\n").is_err());
    }

    #[test]
    fn antialias_accepts_numbers_and_keywords() {
        let auto = EffectConfig::from_toml_str("[window]\nantialias = \"auto\"\n").unwrap();
        assert_eq!(auto.window.antialias, Some(AntialiasSetting::Auto));
        let off = EffectConfig::from_toml_str("[window]\nantialias = 0\n").unwrap();
        assert_eq!(off.window.antialias, Some(AntialiasSetting::Off));
        let sixteen = EffectConfig::from_toml_str("[window]\nantialias = 16\n").unwrap();
        assert_eq!(sixteen.window.antialias, Some(AntialiasSetting::Samples(16)));
    }
}
