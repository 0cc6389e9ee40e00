use crate::error::{Error, Result};
use crate::model::ModelSource;
use crate::normalize::Normalization;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "devision.toml";
pub const OUTPUT_DIR_ENV: &str = "DEVISION_OUTPUT_DIR";

/// Session settings persisted in `devision.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    /// Edge length of the square display thumbnails.
    pub thumbnail_size: u32,
    pub model: ModelSource,
    pub normalization: Normalization,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            thumbnail_size: 300,
            model: ModelSource::default(),
            normalization: Normalization::default(),
        }
    }
}

impl Settings {
    /// Load from `devision.toml` in the working directory, falling back to
    /// defaults, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(Path::new(SETTINGS_FILE))?;
        settings.apply_env_overrides(std::env::var_os(OUTPUT_DIR_ENV));
        settings.validate()?;
        Ok(settings)
    }

    /// Apply the value of `DEVISION_OUTPUT_DIR`. An empty value is ignored.
    pub fn apply_env_overrides(&mut self, output_dir: Option<OsString>) {
        if let Some(dir) = output_dir.filter(|d| !d.is_empty()) {
            tracing::debug!("{OUTPUT_DIR_ENV} overrides output directory");
            self.output_dir = PathBuf::from(dir);
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        let settings: Settings = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize settings: {e}")))?;
        std::fs::write(path, raw).map_err(|e| Error::persistence(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        self.normalization.validate()?;
        if self.thumbnail_size == 0 {
            return Err(Error::Config("thumbnail_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let settings = Settings::load_from(&dir.path().join("absent.toml"))?;
        assert_eq!(settings.model, ModelSource::default());
        assert_eq!(settings.thumbnail_size, 300);
        Ok(())
    }

    #[test]
    fn partial_file_fills_in_defaults() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"
output_dir = "/tmp/out"
model = { directory = "/models/nuclei" }

[normalization]
high = 99.0
"#,
        )?;
        let settings = Settings::load_from(&path)?;
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(
            settings.model,
            ModelSource::Directory(PathBuf::from("/models/nuclei"))
        );
        assert_eq!(settings.normalization.low, 1.0);
        assert_eq!(settings.normalization.high, 99.0);
        Ok(())
    }

    #[test]
    fn invalid_percentiles_are_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "[normalization]\nlow = 90.0\nhigh = 10.0\n")?;
        assert!(matches!(Settings::load_from(&path), Err(Error::Config(_))));
        Ok(())
    }

    #[test]
    fn output_dir_env_overrides_file_value() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "output_dir = \"/tmp/from-file\"\n")?;
        let mut settings = Settings::load_from(&path)?;
        settings.apply_env_overrides(Some(OsString::from("/data/run-7")));
        assert_eq!(settings.output_dir, PathBuf::from("/data/run-7"));
        Ok(())
    }

    #[test]
    fn unset_or_empty_env_keeps_file_value() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "output_dir = \"/tmp/from-file\"\n")?;
        let mut settings = Settings::load_from(&path)?;
        settings.apply_env_overrides(None);
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/from-file"));
        settings.apply_env_overrides(Some(OsString::new()));
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/from-file"));
        Ok(())
    }

    #[test]
    fn save_then_load_keeps_values() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(SETTINGS_FILE);
        let settings = Settings {
            output_dir: dir.path().join("out"),
            model: ModelSource::Pretrained("2D_demo".into()),
            thumbnail_size: 128,
            ..Settings::default()
        };
        settings.save_to(&path)?;
        assert_eq!(Settings::load_from(&path)?, settings);
        Ok(())
    }
}
