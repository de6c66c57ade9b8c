use ::config::{Config, File, FileFormat};
use serde::Deserialize;
use std::{fmt, fs, path::PathBuf, time::Duration};

use crate::sources::simulated_inverter::DEFAULT_SENSOR_FAILURE_RATE;

#[derive(Clone, Deserialize)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    pub key_prefix: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("key_prefix", &self.key_prefix)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub inverters_num: usize,
    pub num_files: usize,
    #[serde(default = "default_failure_rate")]
    pub sensor_failure_rate: f64,
}

fn default_failure_rate() -> f64 {
    DEFAULT_SENSOR_FAILURE_RATE
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub staging_dir: PathBuf,
    pub interval_secs: u64,
    pub drain_poll_ms: u64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("data"),
            interval_secs: 20,
            drain_poll_ms: 1000,
        }
    }
}

impl CycleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn drain_poll(&self) -> Duration {
        Duration::from_millis(self.drain_poll_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Write rejected records to a local diagnostic file each cycle.
    pub write_rejected: bool,
    /// When set, the diagnostic file is uploaded under this key prefix.
    pub rejected_key_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub s3: S3Config,
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    pub metrics: Option<MetricsConfig>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("missing required setting {key} (env {env})")]
    Missing { key: &'static str, env: &'static str },
    #[error("{0}")]
    Invalid(String),
}

/// Environment variable, config key it overrides, and whether the setting
/// must be present once file and environment are merged.
const ENV_KEYS: &[(&str, &str, bool)] = &[
    ("AWS_REGION", "s3.region", true),
    ("S3_BUCKET", "s3.bucket", true),
    ("FILE_PREFIX", "s3.key_prefix", true),
    ("AWS_ACCESS_KEY_ID", "s3.access_key_id", true),
    ("AWS_SECRET_ACCESS_KEY", "s3.secret_access_key", true),
    ("INVERTERS_NUM", "generator.inverters_num", true),
    ("NUM_FILES", "generator.num_files", true),
    ("SENSOR_FAILURE_RATE", "generator.sensor_failure_rate", false),
    ("STAGING_DIR", "cycle.staging_dir", false),
    ("CYCLE_INTERVAL_SECS", "cycle.interval_secs", false),
    ("WRITE_REJECTED", "diagnostics.write_rejected", false),
    ("REJECTED_KEY_PREFIX", "diagnostics.rejected_key_prefix", false),
    ("METRICS_BIND_ADDR", "metrics.bind_addr", false),
];

impl AppConfig {
    /// Load `.env` if present, then the optional TOML file named by
    /// `GENERATOR_CONFIG` (default `generator-config.toml`), then apply
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        use std::env;

        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "ignoring unreadable .env file");
            }
        }

        let explicit = env::var("GENERATOR_CONFIG").ok();
        let path = explicit.clone().unwrap_or_else(|| "generator-config.toml".to_string());

        let contents = match fs::read_to_string(&path) {
            Ok(c) => Some(c),
            Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        Self::from_sources(contents.as_deref(), |k| env::var(k).ok())
    }

    pub fn from_sources<F>(file: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder();
        if let Some(contents) = file {
            builder = builder.add_source(File::from_str(contents, FileFormat::Toml));
        }
        for (var, key, _) in ENV_KEYS {
            builder = builder.set_override_option(*key, env(*var))?;
        }
        let settings = builder.build()?;

        for (var, key, _) in ENV_KEYS.iter().filter(|(_, _, required)| *required) {
            if let Err(::config::ConfigError::NotFound(_)) = settings.get::<::config::Value>(key) {
                return Err(ConfigError::Missing { key: *key, env: *var });
            }
        }

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.check()?;
        Ok(cfg)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.generator.num_files == 0 {
            return Err(ConfigError::Invalid("generator.num_files must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.generator.sensor_failure_rate) {
            return Err(ConfigError::Invalid(
                "generator.sensor_failure_rate must be within 0..=1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("AWS_REGION", "eu-central-1".to_string()),
            ("S3_BUCKET", "solar-raw".to_string()),
            ("FILE_PREFIX", "inverters/".to_string()),
            ("AWS_ACCESS_KEY_ID", "AKIA123".to_string()),
            ("AWS_SECRET_ACCESS_KEY", "shh".to_string()),
            ("INVERTERS_NUM", "60".to_string()),
            ("NUM_FILES", "4".to_string()),
        ])
    }

    fn load(
        file: Option<&str>,
        env: &HashMap<&'static str, String>,
    ) -> Result<AppConfig, ConfigError> {
        AppConfig::from_sources(file, |k| env.get(k).cloned())
    }

    #[test]
    fn loads_from_environment_with_defaults() {
        let cfg = load(None, &required_env()).unwrap();

        assert_eq!(cfg.s3.bucket, "solar-raw");
        assert_eq!(cfg.s3.key_prefix, "inverters/");
        assert_eq!(cfg.generator.inverters_num, 60);
        assert_eq!(cfg.generator.num_files, 4);
        assert_eq!(cfg.generator.sensor_failure_rate, DEFAULT_SENSOR_FAILURE_RATE);
        assert_eq!(cfg.cycle.staging_dir, PathBuf::from("data"));
        assert_eq!(cfg.cycle.interval(), Duration::from_secs(20));
        assert_eq!(cfg.cycle.drain_poll(), Duration::from_secs(1));
        assert!(!cfg.diagnostics.write_rejected);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn missing_numeric_setting_is_fatal() {
        let mut env = required_env();
        env.remove("NUM_FILES");

        let err = load(None, &env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { env: "NUM_FILES", .. }));
    }

    #[test]
    fn non_numeric_count_is_rejected() {
        let mut env = required_env();
        env.insert("INVERTERS_NUM", "sixty".to_string());

        assert!(matches!(load(None, &env), Err(ConfigError::Load(_))));
    }

    #[test]
    fn zero_files_is_rejected() {
        let mut env = required_env();
        env.insert("NUM_FILES", "0".to_string());

        assert!(matches!(load(None, &env), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn environment_overrides_file() {
        let file = r#"
            [generator]
            inverters_num = 10
            num_files = 2
            sensor_failure_rate = 0.05

            [cycle]
            staging_dir = "/tmp/staging"
            interval_secs = 5

            [diagnostics]
            write_rejected = true
        "#;
        let cfg = load(Some(file), &required_env()).unwrap();

        assert_eq!(cfg.generator.inverters_num, 60);
        assert_eq!(cfg.generator.sensor_failure_rate, 0.05);
        assert_eq!(cfg.cycle.staging_dir, PathBuf::from("/tmp/staging"));
        assert_eq!(cfg.cycle.interval_secs, 5);
        assert_eq!(cfg.cycle.drain_poll_ms, 1000);
        assert!(cfg.diagnostics.write_rejected);
    }

    #[test]
    fn debug_output_hides_secret() {
        let cfg = load(None, &required_env()).unwrap();
        let dbg = format!("{:?}", cfg.s3);
        assert!(!dbg.contains("shh"));
    }
}
