use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    stages::{FilmGrain, Fxaa, Glitch, Lut},
    Extent, Filter, LoadContext, PixelFormat, Stage,
};

pub const DEFAULT_CONFIG_FILE: &str = "postfx.toml";

/// Chain layout and shared stage state.
///
/// ```toml
/// width = 1280
/// height = 720
/// sampler = "linear"
///
/// [[stage]]
/// kind = "lut"
/// amount = 0.5
/// lut = "assets/lut/warm.png"
///
/// [[stage]]
/// kind = "film_grain"
/// strength = 20.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sampler: Filter,
    pub shader_dir: PathBuf,
    #[serde(rename = "stage")]
    pub stages: Vec<StageConfig>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            format: PixelFormat::Rgba16Float,
            sampler: Filter::Linear,
            shader_dir: PathBuf::from("shaders"),
            stages: vec![
                StageConfig::Lut {
                    name: None,
                    amount: 0.,
                    lut: None,
                },
                StageConfig::FilmGrain {
                    name: None,
                    strength: 0.,
                },
                StageConfig::Glitch {
                    name: None,
                    strength: 0.,
                },
            ],
        }
    }
}

impl ChainConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Like [`ChainConfig::load`], but a missing file yields the default chain.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("{} not found, using the default chain", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = ahash::AHashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage.name()) {
                return Err(ConfigError::DuplicateStage(stage.name().to_owned()));
            }
        }
        Ok(())
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    pub fn load_context(&self) -> LoadContext {
        LoadContext {
            extent: self.extent(),
            format: self.format,
            filter: self.sampler,
        }
    }

    pub fn build_stages(&self) -> Vec<Box<dyn Stage>> {
        self.stages.iter().map(StageConfig::build).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageConfig {
    Lut {
        name: Option<String>,
        #[serde(default)]
        amount: f32,
        lut: Option<PathBuf>,
    },
    FilmGrain {
        name: Option<String>,
        #[serde(default)]
        strength: f32,
    },
    Glitch {
        name: Option<String>,
        #[serde(default)]
        strength: f32,
    },
    Fxaa {
        name: Option<String>,
        #[serde(default = "default_rcp")]
        rcp_x: f32,
        #[serde(default = "default_rcp")]
        rcp_y: f32,
        #[serde(default = "default_enabled")]
        enabled: bool,
    },
}

fn default_rcp() -> f32 {
    0.1
}

fn default_enabled() -> bool {
    true
}

impl StageConfig {
    pub fn name(&self) -> &str {
        match self {
            StageConfig::Lut { name, .. } => name.as_deref().unwrap_or(Lut::NAME),
            StageConfig::FilmGrain { name, .. } => name.as_deref().unwrap_or(FilmGrain::NAME),
            StageConfig::Glitch { name, .. } => name.as_deref().unwrap_or(Glitch::NAME),
            StageConfig::Fxaa { name, .. } => name.as_deref().unwrap_or(Fxaa::NAME),
        }
    }

    pub fn build(&self) -> Box<dyn Stage> {
        let name = self.name();
        match self {
            StageConfig::Lut { amount, lut, .. } => {
                let stage = Lut::named(name).with_amount(*amount);
                match lut {
                    Some(path) => Box::new(stage.with_table(path)),
                    None => Box::new(stage),
                }
            }
            StageConfig::FilmGrain { strength, .. } => {
                Box::new(FilmGrain::named(name).with_strength(*strength))
            }
            StageConfig::Glitch { strength, .. } => {
                Box::new(Glitch::named(name).with_strength(*strength))
            }
            StageConfig::Fxaa {
                rcp_x,
                rcp_y,
                enabled,
                ..
            } => {
                let mut stage = Fxaa::named(name).with_enabled(*enabled);
                stage.params_mut().set("rcp_x", *rcp_x);
                stage.params_mut().set("rcp_y", *rcp_y);
                Box::new(stage)
            }
        }
    }
}

/// `stage.param=value`, as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamOverride {
    pub stage: String,
    pub param: String,
    pub value: f32,
}

impl FromStr for ParamOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::Override(s.to_owned());
        let (key, value) = s.split_once('=').ok_or_else(invalid)?;
        let (stage, param) = key.trim().split_once('.').ok_or_else(invalid)?;
        let value = value.trim().parse().map_err(|_| invalid())?;
        if stage.is_empty() || param.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            stage: stage.to_owned(),
            param: param.to_owned(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_is_lut_grain_glitch() {
        let config = ChainConfig::default();
        let names: Vec<_> = config.stages.iter().map(StageConfig::name).collect();
        assert_eq!(names, ["lut", "film_grain", "glitch"]);
    }

    #[test]
    fn parses_declared_order_and_values() {
        let config = ChainConfig::from_toml_str(
            r#"
            width = 2
            height = 2
            sampler = "point"

            [[stage]]
            kind = "glitch"
            strength = 0.25

            [[stage]]
            kind = "fxaa"
            enabled = false

            [[stage]]
            kind = "film_grain"
            name = "grain"
            "#,
        )
        .unwrap();

        assert_eq!(config.extent(), Extent::new(2, 2));
        assert_eq!(config.sampler, Filter::Point);
        assert_eq!(config.format, PixelFormat::Rgba16Float);

        let stages = config.build_stages();
        let names: Vec<_> = stages.iter().map(|stage| stage.name().to_owned()).collect();
        assert_eq!(names, ["glitch", "fxaa", "grain"]);
        assert_eq!(stages[0].params().get("strength"), Some(0.25));
        assert_eq!(stages[1].params().get("rcp_x"), Some(0.1));
        assert_eq!(stages[2].params().get("strength"), Some(0.));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = ChainConfig::from_toml_str(
            r#"
            [[stage]]
            kind = "glitch"

            [[stage]]
            kind = "glitch"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateStage(name) if name == "glitch"));
    }

    #[test]
    fn rejects_unknown_stage_kind() {
        let err = ChainConfig::from_toml_str(
            r#"
            [[stage]]
            kind = "bloom"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parses_overrides() {
        let parsed: ParamOverride = "film_grain.strength=20".parse().unwrap();
        assert_eq!(
            parsed,
            ParamOverride {
                stage: "film_grain".into(),
                param: "strength".into(),
                value: 20.,
            }
        );
        assert!("film_grain=20".parse::<ParamOverride>().is_err());
        assert!("film_grain.strength=lots".parse::<ParamOverride>().is_err());
        assert!(".strength=1".parse::<ParamOverride>().is_err());
    }
}
