use anyhow::{Context, Result};
use std::{env, path::PathBuf};

pub const DEFAULT_TEMP_PREFIX: &str = "s3-overwrite-";

const TEMP_DIR_VAR: &str = "OBJECT_OVERWRITE_TEMP_DIR";
const TEMP_PREFIX_VAR: &str = "OBJECT_OVERWRITE_TEMP_PREFIX";
const VERIFY_DOWNLOAD_VAR: &str = "OBJECT_OVERWRITE_VERIFY_DOWNLOAD";

/// Settings for the local side of an overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverwriteConfig {
    /// Directory receiving the transient local copy of each object.
    pub temp_dir: PathBuf,

    /// File name prefix of the local copy.
    pub temp_prefix: String,

    /// Check the downloaded byte count against the reported content length.
    pub verify_download: bool,
}

impl Default for OverwriteConfig {
    fn default() -> Self {
        Self {
            temp_dir: env::temp_dir(),
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            verify_download: true,
        }
    }
}

impl OverwriteConfig {
    /// Read `OBJECT_OVERWRITE_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name))
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let defaults = Self::default();

        let temp_dir = match lookup(TEMP_DIR_VAR) {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
            Ok(_) | Err(env::VarError::NotPresent) => defaults.temp_dir,
            Err(err) => return Err(err).with_context(|| format!("reading {}", TEMP_DIR_VAR)),
        };

        let temp_prefix = match lookup(TEMP_PREFIX_VAR) {
            Ok(value) => {
                if value.contains(std::path::is_separator) {
                    anyhow::bail!("{} must not contain a path separator: `{}`", TEMP_PREFIX_VAR, value);
                }
                value
            }
            Err(env::VarError::NotPresent) => defaults.temp_prefix,
            Err(err) => return Err(err).with_context(|| format!("reading {}", TEMP_PREFIX_VAR)),
        };

        let verify_download = match lookup(VERIFY_DOWNLOAD_VAR) {
            Ok(value) => parse_flag(&value)
                .with_context(|| format!("parsing {} value `{}`", VERIFY_DOWNLOAD_VAR, value))?,
            Err(env::VarError::NotPresent) => defaults.verify_download,
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", VERIFY_DOWNLOAD_VAR));
            }
        };

        Ok(Self {
            temp_dir,
            temp_prefix,
            verify_download,
        })
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_verify_download(mut self, verify: bool) -> Self {
        self.verify_download = verify;
        self
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got `{}`", other),
    }
}
