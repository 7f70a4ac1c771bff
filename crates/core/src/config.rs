use crate::settings::PipelineSettings;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("de", "imgsort", "imgsort")
        .context("could not determine the user configuration directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        settings_path: config_dir.join("settings.toml"),
        config_dir,
    })
}

/// Settings from the per-user file, or the defaults when there is none.
pub fn load_settings() -> Result<PipelineSettings> {
    let paths = app_paths()?;
    load_settings_from(&paths.settings_path)
}

/// Missing keys take their default value; a missing file yields all defaults.
pub fn load_settings_from(path: &Path) -> Result<PipelineSettings> {
    if !path.exists() {
        return Ok(PipelineSettings::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read settings file: {}", path.display()))?;
    let settings = toml::from_str::<PipelineSettings>(&raw)
        .with_context(|| format!("could not parse settings file: {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings(settings: &PipelineSettings) -> Result<()> {
    let paths = app_paths()?;
    save_settings_to(&paths.settings_path, settings)
}

pub fn save_settings_to(path: &Path, settings: &PipelineSettings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create settings directory: {}", dir.display()))?;
    }
    let body = toml::to_string_pretty(settings).context("could not serialize settings")?;
    fs::write(path, body)
        .with_context(|| format!("could not write settings file: {}", path.display()))?;
    Ok(())
}
