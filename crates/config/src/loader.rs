use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::TaskwireConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "taskwire.toml",
    "taskwire.yaml",
    "taskwire.yml",
    "taskwire.json",
];

static CONFIG_DIR_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Override the user-global config directory. Only the first call wins.
pub fn set_config_dir(dir: PathBuf) {
    if CONFIG_DIR_OVERRIDE.set(dir).is_err() {
        warn!("config directory already set, ignoring override");
    }
}

/// Returns the user-global config directory (`~/.config/taskwire/` unless
/// overridden).
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE.get() {
        return Some(dir.clone());
    }
    directories::ProjectDirs::from("", "", "taskwire").map(|d| d.config_dir().to_path_buf())
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<TaskwireConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations, then apply
/// environment overrides.
///
/// Search order:
/// 1. `./taskwire.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/taskwire.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `TaskwireConfig::default()` when nothing is found or the
/// file is broken.
pub fn discover_and_load() -> TaskwireConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                TaskwireConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            TaskwireConfig::default()
        },
    };

    if let Err(e) = apply_env_overrides(&mut config) {
        warn!(error = %e, "ignoring invalid environment override");
    }
    config
}

/// Apply `PORT` from the process environment.
pub fn apply_env_overrides(config: &mut TaskwireConfig) -> Result<()> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    config: &mut TaskwireConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(port) = lookup("PORT") {
        config.server.port = port
            .trim()
            .parse::<u16>()
            .with_context(|| format!("invalid PORT value {port:?}"))?;
    }
    Ok(())
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<TaskwireConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
