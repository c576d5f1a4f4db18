use crate::job::{JobControllerConfig, ModelSize};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub worker: WorkerConfig,
    pub storage: StorageConfig,
}

/// Worker invocation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker executable (resolved via PATH when not absolute)
    pub program: PathBuf,
    pub model: ModelSize,
    /// Device hint forwarded to the worker (e.g. "cpu", "cuda")
    pub device: Option<String>,
    /// Grace period before a cancelled worker is force-killed
    pub grace_period_ms: u64,
}

/// Transcript storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Store directory; defaults to the user data directory when unset
    pub dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("whisper-engine"),
            model: ModelSize::Base,
            device: None,
            grace_period_ms: 3000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SCRIBEQ_WORKER → worker.program
    /// - SCRIBEQ_MODEL → worker.model
    /// - SCRIBEQ_DEVICE → worker.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(program) = std::env::var("SCRIBEQ_WORKER")
            && !program.is_empty()
        {
            self.worker.program = PathBuf::from(program);
        }

        if let Ok(model) = std::env::var("SCRIBEQ_MODEL")
            && let Ok(model) = model.parse()
        {
            self.worker.model = model;
        }

        if let Ok(device) = std::env::var("SCRIBEQ_DEVICE")
            && !device.is_empty()
        {
            self.worker.device = Some(device);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/scribeq/config.toml on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scribeq").join("config.toml"))
    }

    /// Controller settings derived from this configuration.
    pub fn controller_config(&self) -> JobControllerConfig {
        JobControllerConfig {
            worker_program: self.worker.program.clone(),
            device: self.worker.device.clone(),
            grace_period: Duration::from_millis(self.worker.grace_period_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.worker.program, PathBuf::from("whisper-engine"));
        assert_eq!(config.worker.model, ModelSize::Base);
        assert!(config.worker.device.is_none());
        assert_eq!(config.worker.grace_period_ms, 3000);
        assert!(config.storage.dir.is_none());
    }

    #[test]
    fn load_parses_partial_toml_with_defaults() {
        let mut file = NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "[worker]\nprogram = \"/opt/whisper/engine\"\nmodel = \"medium\"\n"
        )
        .expect("write");

        let config = Config::load(file.path()).expect("should load");
        assert_eq!(config.worker.program, PathBuf::from("/opt/whisper/engine"));
        assert_eq!(config.worker.model, ModelSize::Medium);
        // Unset fields keep their defaults.
        assert_eq!(config.worker.grace_period_ms, 3000);
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let mut file = NamedTempFile::new().expect("tempfile");
        writeln!(file, "worker = nope =").expect("write");
        assert!(Config::load(file.path()).is_err());
        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let config =
            Config::load_or_default(Path::new("/nonexistent/scribeq.toml")).expect("defaults");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn env_overrides_apply() {
        let _guard = ENV_LOCK.lock().unwrap();
        set_env("SCRIBEQ_WORKER", "/usr/local/bin/engine");
        set_env("SCRIBEQ_MODEL", "small");
        set_env("SCRIBEQ_DEVICE", "cuda");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.worker.program, PathBuf::from("/usr/local/bin/engine"));
        assert_eq!(config.worker.model, ModelSize::Small);
        assert_eq!(config.worker.device.as_deref(), Some("cuda"));

        remove_env("SCRIBEQ_WORKER");
        remove_env("SCRIBEQ_MODEL");
        remove_env("SCRIBEQ_DEVICE");
    }

    #[test]
    fn invalid_model_env_is_ignored() {
        let _guard = ENV_LOCK.lock().unwrap();
        set_env("SCRIBEQ_MODEL", "gigantic");

        let config = Config::default().with_env_overrides();
        assert_eq!(config.worker.model, ModelSize::Base);

        remove_env("SCRIBEQ_MODEL");
    }

    #[test]
    fn controller_config_derives_grace_period() {
        let mut config = Config::default();
        config.worker.grace_period_ms = 500;
        let controller = config.controller_config();
        assert_eq!(controller.grace_period, Duration::from_millis(500));
        assert_eq!(controller.worker_program, config.worker.program);
    }

    #[test]
    fn full_toml_parses() {
        let toml_str = "\
[worker]
program = \"whisper-engine\"
model = \"small\"
device = \"cuda\"
grace_period_ms = 1000

[storage]
dir = \"/var/lib/scribeq\"
";
        let parsed: Config = toml::from_str(toml_str).expect("parse");
        assert_eq!(parsed.worker.model, ModelSize::Small);
        assert_eq!(parsed.worker.device.as_deref(), Some("cuda"));
        assert_eq!(parsed.storage.dir, Some(PathBuf::from("/var/lib/scribeq")));
    }
}
