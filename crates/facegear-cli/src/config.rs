use facegear_core::CoordinateMapper;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("render_fps must be at least 1")]
    ZeroFps,
}

/// CLI configuration: defaults, then an optional TOML file, then `FACEGEAR_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Glasses bitmap (default: assets/glasses.png).
    pub glasses_path: PathBuf,
    /// Redraw rate of the replay render loop.
    pub render_fps: u32,
    /// Pause between published observations during replay.
    pub detector_interval_ms: u64,
    /// Mirror detector coordinates horizontally (front camera).
    pub front_facing: bool,
    /// Frame size the detector ran on; defaults to the surface size.
    pub preview_width: Option<u32>,
    pub preview_height: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            glasses_path: PathBuf::from("assets/glasses.png"),
            render_fps: 30,
            detector_interval_ms: 33,
            front_facing: false,
            preview_width: None,
            preview_height: None,
        }
    }
}

impl Config {
    /// Load from `path` (if any) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `FACEGEAR_*` overrides. Unparseable values keep the current setting.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("FACEGEAR_GLASSES") {
            self.glasses_path = PathBuf::from(path);
        }
        self.render_fps = parse_or(&lookup, "FACEGEAR_RENDER_FPS", self.render_fps);
        self.detector_interval_ms =
            parse_or(&lookup, "FACEGEAR_DETECTOR_INTERVAL_MS", self.detector_interval_ms);
        if let Some(v) = lookup("FACEGEAR_FRONT_FACING") {
            self.front_facing = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        if let Some(w) = lookup("FACEGEAR_PREVIEW_WIDTH").and_then(|v| v.parse().ok()) {
            self.preview_width = Some(w);
        }
        if let Some(h) = lookup("FACEGEAR_PREVIEW_HEIGHT").and_then(|v| v.parse().ok()) {
            self.preview_height = Some(h);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_fps == 0 {
            return Err(ConfigError::ZeroFps);
        }
        Ok(())
    }

    /// Mapper from detector space onto a surface of the given size.
    pub fn mapper(&self, surface: (u32, u32)) -> CoordinateMapper {
        let preview = (
            self.preview_width.unwrap_or(surface.0),
            self.preview_height.unwrap_or(surface.1),
        );
        CoordinateMapper::new(preview, surface, self.front_facing)
    }
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, current: T) -> T {
    match lookup(key) {
        Some(v) => match v.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %v, "ignoring unparseable override");
                current
            }
        },
        None => current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.render_fps, 30);
        assert_eq!(c.detector_interval_ms, 33);
        assert!(!c.front_facing);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let c = Config::from_toml_str("front_facing = true\npreview_width = 320\n").unwrap();
        assert!(c.front_facing);
        assert_eq!(c.preview_width, Some(320));
        assert_eq!(c.render_fps, 30);
        assert_eq!(c.glasses_path, PathBuf::from("assets/glasses.png"));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml_str("render_fps = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut c = Config::default();
        c.apply_overrides(env(&[
            ("FACEGEAR_GLASSES", "/tmp/g.png"),
            ("FACEGEAR_RENDER_FPS", "12"),
            ("FACEGEAR_DETECTOR_INTERVAL_MS", "not-a-number"),
            ("FACEGEAR_FRONT_FACING", "1"),
            ("FACEGEAR_PREVIEW_HEIGHT", "240"),
        ]));
        assert_eq!(c.glasses_path, PathBuf::from("/tmp/g.png"));
        assert_eq!(c.render_fps, 12);
        assert_eq!(c.detector_interval_ms, 33);
        assert!(c.front_facing);
        assert_eq!(c.preview_height, Some(240));
    }

    #[test]
    fn test_zero_fps_rejected() {
        let mut c = Config::default();
        c.apply_overrides(env(&[("FACEGEAR_RENDER_FPS", "0")]));
        assert!(matches!(c.validate(), Err(ConfigError::ZeroFps)));
    }

    #[test]
    fn test_mapper_uses_preview_size() {
        let c = Config {
            preview_width: Some(320),
            preview_height: Some(240),
            front_facing: true,
            ..Config::default()
        };
        let m = c.mapper((640, 480));
        assert_eq!(m.width_scale, 2.0);
        assert_eq!(m.height_scale, 2.0);
        assert!(m.mirrored);

        let unscaled = Config::default().mapper((640, 480));
        assert_eq!(unscaled.width_scale, 1.0);
    }
}
