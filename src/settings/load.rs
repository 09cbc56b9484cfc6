//! Layered settings loading with figment.
//!
//! Precedence, lowest first:
//! 1. Built-in defaults
//! 2. TOML file (`qsweep.toml` in the working directory unless a path is given)
//! 3. `QSWEEP_*` environment variables

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use super::core::{Backend, ExecutionSettings};
use crate::error::{Result, SweepError};

pub const CONFIG_FILE: &str = "qsweep.toml";
pub const ENV_PREFIX: &str = "QSWEEP_";

/// Unvalidated settings as they come out of the provider chain. Signed and
/// string fields let invalid input reach validation instead of failing
/// extraction with a less useful message.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct RawSettings {
    default_worker_count: i64,
    backend: String,
    chunk_size: usize,
    show_progress: bool,
    enforce_core_limit: bool,
}

impl Default for RawSettings {
    fn default() -> Self {
        let defaults = ExecutionSettings::default();
        Self {
            default_worker_count: defaults.default_worker_count() as i64,
            backend: defaults.backend().id().to_string(),
            chunk_size: defaults.chunk_size(),
            show_progress: defaults.show_progress(),
            enforce_core_limit: defaults.enforce_core_limit(),
        }
    }
}

impl RawSettings {
    fn validate(self) -> Result<ExecutionSettings> {
        let mut settings = ExecutionSettings::default();
        settings.set_default_worker_count(self.default_worker_count)?;
        settings.set_backend(self.backend.parse::<Backend>()?);
        settings.set_chunk_size(self.chunk_size);
        settings.set_show_progress(self.show_progress);
        settings.set_enforce_core_limit(self.enforce_core_limit);
        Ok(settings)
    }
}

impl ExecutionSettings {
    /// Provider chain used by [`ExecutionSettings::load`].
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let config_file = config_file.unwrap_or(Path::new(CONFIG_FILE));
        tracing::trace!("SETTINGS LOAD: config file {}", config_file.display());

        Figment::new()
            .merge(Serialized::defaults(RawSettings::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extract and validate settings from an arbitrary figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let raw: RawSettings = figment
            .extract()
            .map_err(|e| SweepError::config(format!("invalid settings: {e}")))?;
        raw.validate()
    }

    /// Load settings from defaults, the config file and the environment.
    ///
    /// This does not touch the process-wide settings; pass the result to
    /// [`crate::settings::init`] to install it.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let settings = Self::from_figment(&Self::figment(config_file))?;
        tracing::debug!(
            "loaded settings: {} workers, {} backend",
            settings.default_worker_count(),
            settings.backend()
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let settings = ExecutionSettings::load(None).map_err(|e| e.to_string())?;
            assert_eq!(settings, ExecutionSettings::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                default_worker_count = 4
                backend = "multiprocessing"
                chunk_size = 8
                "#,
            )?;

            let settings = ExecutionSettings::load(None).map_err(|e| e.to_string())?;
            assert_eq!(settings.default_worker_count(), 4);
            assert_eq!(settings.backend(), Backend::Native);
            assert_eq!(settings.chunk_size(), 8);

            jail.set_env("QSWEEP_DEFAULT_WORKER_COUNT", "2");
            jail.set_env("QSWEEP_BACKEND", "robust-pickling");
            jail.set_env("QSWEEP_SHOW_PROGRESS", "true");

            let settings = ExecutionSettings::load(None).map_err(|e| e.to_string())?;
            assert_eq!(settings.default_worker_count(), 2);
            assert_eq!(settings.backend(), Backend::Robust);
            assert_eq!(settings.chunk_size(), 8);
            assert!(settings.show_progress());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        Jail::expect_with(|jail| {
            jail.set_env("QSWEEP_DEFAULT_WORKER_COUNT", "0");
            let err = ExecutionSettings::load(None).unwrap_err();
            assert!(err.is_configuration(), "{err}");

            jail.set_env("QSWEEP_DEFAULT_WORKER_COUNT", "-3");
            assert!(ExecutionSettings::load(None).unwrap_err().is_configuration());

            jail.set_env("QSWEEP_DEFAULT_WORKER_COUNT", "2");
            jail.set_env("QSWEEP_BACKEND", "threads");
            let err = ExecutionSettings::load(None).unwrap_err();
            assert!(err.to_string().contains("threads"), "{err}");
            Ok(())
        });
    }

    #[test]
    fn test_explicit_config_path() {
        Jail::expect_with(|jail| {
            // Ignored: an explicit path replaces the working-directory file
            jail.create_file(CONFIG_FILE, "default_worker_count = 3")?;

            let mut file = tempfile::Builder::new()
                .suffix(".toml")
                .tempfile()
                .map_err(|e| e.to_string())?;
            writeln!(file, "default_worker_count = 6").map_err(|e| e.to_string())?;
            writeln!(file, "enforce_core_limit = false").map_err(|e| e.to_string())?;

            let settings =
                ExecutionSettings::load(Some(file.path())).map_err(|e| e.to_string())?;
            assert_eq!(settings.default_worker_count(), 6);
            assert!(!settings.enforce_core_limit());
            assert_eq!(settings.backend(), Backend::Robust);
            Ok(())
        });
    }
}
