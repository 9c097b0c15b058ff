//! Configuration loading and env substitution.
//!
//! Config files: `taskwire.toml`, `taskwire.yaml`, `taskwire.yml` or
//! `taskwire.json`, searched in `./` then `~/.config/taskwire/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file contents. The `PORT` environment variable overrides `server.port`.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, discover_and_load, load_config, set_config_dir,
    },
    schema::{ServerConfig, TaskwireConfig, WhatsAppConfig},
};
