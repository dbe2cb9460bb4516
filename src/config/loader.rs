//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_CONSOLE";

/// Config file name
const CONFIG_FILE_NAME: &str = "serial-console.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_CONSOLE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_CONSOLE_CONFIG` environment variable (explicit path)
    /// 2. `./serial-console.toml` (current directory)
    /// 3. The platform config directory (`~/.config/serial-console/` on Linux,
    ///    `%APPDATA%\serial-console\config\` on Windows)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values. The result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        debug!(path = %path.display(), "config path from environment does not exist");
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    None
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "serial-console").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}_{suffix}")
}

/// Read and parse one override, if set.
fn env_parse<T>(suffix: &str, what: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
{
    let var = env_key(suffix);
    match std::env::var(&var) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, format!("Invalid {what}: '{val}'"))),
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern `SERIAL_CONSOLE_<SECTION>_<KEY>`:
/// - `SERIAL_CONSOLE_SERIAL_PORT=/dev/ttyUSB0`
/// - `SERIAL_CONSOLE_SERIAL_BAUD_RATE=115200`
/// - `SERIAL_CONSOLE_DISPLAY_MAX_LINES=5000`
/// - `SERIAL_CONSOLE_TRANSMIT_TERMINATOR=crlf`
/// - `SERIAL_CONSOLE_LOGGING_LEVEL=debug`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Ok(val) = std::env::var(env_key("SERIAL_PORT")) {
        config.serial.port = val;
    }
    if let Some(baud) = env_parse("SERIAL_BAUD_RATE", "baud rate")? {
        config.serial.baud_rate = baud;
    }
    if let Some(max_lines) = env_parse("DISPLAY_MAX_LINES", "line count")? {
        config.display.max_lines = max_lines;
    }
    if let Some(terminator) = env_parse("TRANSMIT_TERMINATOR", "terminator")? {
        config.transmit.terminator = terminator;
    }
    if let Ok(val) = std::env::var(env_key("LOGGING_LEVEL")) {
        config.logging.level = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transmit::Terminator;
    use serial_test::serial;
    use std::env;
    use std::io::Write;

    fn clear_env() {
        for key in [
            CONFIG_PATH_ENV,
            "SERIAL_CONSOLE_SERIAL_PORT",
            "SERIAL_CONSOLE_SERIAL_BAUD_RATE",
            "SERIAL_CONSOLE_DISPLAY_MAX_LINES",
            "SERIAL_CONSOLE_TRANSMIT_TERMINATOR",
            "SERIAL_CONSOLE_LOGGING_LEVEL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_empty_file_yields_defaults() {
        clear_env();
        let file = tempfile::NamedTempFile::new().unwrap();

        let loader = ConfigLoader::load_from(file.path()).unwrap();
        assert_eq!(loader.config().serial.baud_rate, 9600);
        assert_eq!(loader.config_path.as_deref(), Some(file.path()));
        assert_eq!(loader.into_config(), Config::default());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        clear_env();
        env::set_var("SERIAL_CONSOLE_SERIAL_PORT", "COM7");
        env::set_var("SERIAL_CONSOLE_SERIAL_BAUD_RATE", "57600");
        env::set_var("SERIAL_CONSOLE_TRANSMIT_TERMINATOR", "CRLF");

        let mut config = Config::default();
        apply_env_overrides(&mut config).unwrap();
        assert_eq!(config.serial.port, "COM7");
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.transmit.terminator, Terminator::CrLf);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_override_is_reported() {
        clear_env();
        env::set_var("SERIAL_CONSOLE_DISPLAY_MAX_LINES", "lots");

        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { .. }));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_from_file_then_env() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[serial]\nport = \"/dev/ttyUSB1\"\nbaud_rate = 19200\n\n[display]\nmax_lines = 200"
        )
        .unwrap();
        env::set_var("SERIAL_CONSOLE_SERIAL_BAUD_RATE", "38400");

        let loader = ConfigLoader::load_from(file.path()).unwrap();
        assert_eq!(loader.config().serial.port, "/dev/ttyUSB1");
        assert_eq!(loader.config().serial.baud_rate, 38400);
        assert_eq!(loader.config().display.max_lines, 200);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_config_path_wins() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[display]\ntimestamp = true\n").unwrap();
        env::set_var(CONFIG_PATH_ENV, &path);

        let loader = ConfigLoader::load().unwrap();
        assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));
        assert!(loader.config().display.timestamp);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_file_value_fails_validation() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[display]\nmax_lines = 0\n").unwrap();

        let err = ConfigLoader::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_from("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
