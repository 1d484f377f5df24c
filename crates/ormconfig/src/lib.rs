use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub use ormpack::{DEFAULT_UNITY_OUTPUT, DEFAULT_UNREAL_OUTPUT};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub outputs: Outputs,
    #[serde(default)]
    pub targets: Targets,
    #[serde(default)]
    pub progress: ProgressSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Outputs {
    pub unreal: PathBuf,
    pub unity: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Targets {
    pub unreal: bool,
    pub unity: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProgressSettings {
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub poll_interval: Duration,
    /// Exponential smoothing rate applied by the progress meter, per second.
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            outputs: Outputs::default(),
            targets: Targets::default(),
            progress: ProgressSettings::default(),
        }
    }
}

impl Default for Outputs {
    fn default() -> Self {
        Self {
            unreal: PathBuf::from(DEFAULT_UNREAL_OUTPUT),
            unity: PathBuf::from(DEFAULT_UNITY_OUTPUT),
        }
    }
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            unreal: true,
            unity: true,
        }
    }
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            smoothing: default_smoothing(),
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_smoothing() -> f32 {
    8.0
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl ToolConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ToolConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        if self.outputs.unreal.as_os_str().is_empty() || self.outputs.unity.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid(
                "output paths must not be empty".into(),
            ));
        }

        if self.outputs.unreal == self.outputs.unity {
            return Err(ConfigError::Invalid(format!(
                "unreal and unity outputs both point at {}",
                self.outputs.unreal.display()
            )));
        }

        if self.progress.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "progress.poll_interval must be greater than zero".into(),
            ));
        }

        if !(self.progress.smoothing.is_finite() && self.progress.smoothing > 0.0) {
            return Err(ConfigError::Invalid(
                "progress.smoothing must be a positive number".into(),
            ));
        }

        Ok(())
    }
}
