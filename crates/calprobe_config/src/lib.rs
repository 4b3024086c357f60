use config::{Config, Environment, File, FileFormat};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::env;
use std::path::PathBuf;

pub mod models;

pub use config::ConfigError;
pub use models::*;

/// Loads harness settings from layered sources.
///
/// Layering, lowest precedence first: `config/default`, `config/{RUN_ENV}`,
/// `config/local` (gitignored secret overlay), then environment variables
/// prefixed with `CALPROBE` and separated by `__`
/// (e.g. `CALPROBE_USER1__PASSWORD`). After deserialization, any field whose
/// value is the literal `secret_from_env` is replaced from the matching
/// environment variable.
///
/// A missing required field is a hard failure; there are no retries and no
/// silent defaults.
pub fn load_settings() -> Result<Settings, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env::var("PREFIX").unwrap_or_else(|_| "CALPROBE".to_string());

    let config_dir = config_dir();
    let default_path = config_dir.join("default");
    let env_path = config_dir.join(run_env);
    let local_path = config_dir.join("local");

    let builder = Config::builder()
        .add_source(File::from(default_path).required(false))
        .add_source(File::from(env_path).required(false))
        .add_source(File::from(local_path).required(false))
        .add_source(Environment::with_prefix(&prefix).separator("__"));

    let settings: Settings = builder.build()?.try_deserialize()?;
    apply_env_overrides_from_marker(settings)
}

/// Loads settings from an inline TOML document plus the marker overlay.
/// Used by tests that should not depend on files on disk.
pub fn settings_from_str(toml: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = Config::builder()
        .add_source(File::from_str(toml, FileFormat::Toml))
        .build()?
        .try_deserialize()?;
    apply_env_overrides_from_marker(settings)
}

fn config_dir() -> PathBuf {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let workspace_root = manifest_dir
        .ancestors()
        .nth(2) // go from crates/calprobe_config to workspace root
        .unwrap_or(&manifest_dir)
        .to_path_buf();
    workspace_root.join("config")
}

/// Recursively replaces all "secret_from_env" string values with environment variable values
fn inject_env_secrets(value: &mut Value) {
    fn walk(path: Vec<String>, obj: &mut Value) {
        match obj {
            Value::Object(map) => {
                for (k, v) in map.iter_mut() {
                    let mut new_path = path.clone();
                    new_path.push(k.to_string());
                    walk(new_path, v);
                }
            }
            Value::String(s) if s == "secret_from_env" => {
                let env_key = path.join("_").to_uppercase();
                if let Ok(env_val) = std::env::var(&env_key) {
                    *obj = Value::String(env_val);
                } else {
                    tracing::warn!("env var {} not found for secret_from_env", env_key);
                }
            }
            _ => {}
        }
    }

    walk(vec![], value);
}

/// Applies environment overrides based on "secret_from_env" markers in serialized settings
pub fn apply_env_overrides_from_marker(settings: Settings) -> Result<Settings, ConfigError> {
    let mut json = serde_json::to_value(&settings)
        .map_err(|err| ConfigError::Message(format!("settings must be serializable: {err}")))?;
    inject_env_secrets(&mut json);
    serde_json::from_value(json)
        .map_err(|err| ConfigError::Message(format!("settings must remain deserializable: {err}")))
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables.
///
/// Loads at most once per process; the path can be overridden with
/// `DOTENV_OVERRIDE` and defaults to `.env`.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path = env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}
