use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use thiserror::Error;
use tilestep::{GameStateStack, InputHandle, LoopConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay;
use super::textures::{build_demo_textures, DemoTextures};

pub(crate) const CONFIG_ENV_VAR: &str = "TILESTEP_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct DemoConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub interpolate: bool,
    #[serde(rename = "loop")]
    pub loop_config: LoopConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            window_title: "tilestep demo".to_string(),
            window_width: 640,
            window_height: 480,
            interpolate: false,
            loop_config: LoopConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
}

pub(crate) struct AppWiring {
    pub(crate) config: DemoConfig,
    pub(crate) textures: DemoTextures,
    pub(crate) states: Arc<Mutex<GameStateStack>>,
    pub(crate) input: InputHandle,
}

pub(crate) fn build_app() -> Result<AppWiring, ConfigError> {
    init_tracing();
    info!("=== tilestep demo startup ===");

    let config = match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => load_config(Path::new(&path))?,
        None => DemoConfig::default(),
    };

    let textures = build_demo_textures();
    let input = InputHandle::default();
    let mut stack = GameStateStack::new();
    for state in gameplay::build_states(&textures, &input, config.interpolate) {
        stack.push(state);
    }
    info!(
        states = stack.len(),
        window_width = config.window_width,
        window_height = config.window_height,
        "app_wired"
    );

    Ok(AppWiring {
        config,
        textures,
        states: Arc::new(Mutex::new(stack)),
        input,
    })
}

/// Reads a JSON config; absent fields keep their defaults.
pub(crate) fn load_config(path: &Path) -> Result<DemoConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    let config: DemoConfig =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
    info!(path = %path.display(), "config_loaded");
    Ok(config)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
