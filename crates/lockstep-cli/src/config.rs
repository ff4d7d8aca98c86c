//! Configuration file management for lockstep.
//!
//! Provides a TOML-based config file at `~/.config/lockstep/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lockstep_core::DEFAULT_HANDOFF_TIMEOUT;
use lockstep_db::config::DbConfig;

/// Environment variable overriding the handoff timeout, in milliseconds.
pub const TIMEOUT_ENV_VAR: &str = "LOCKSTEP_HANDOFF_TIMEOUT_MS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub harness: HarnessSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HarnessSection {
    /// How long a task waits for its peer to hand the turn back.
    pub handoff_timeout_ms: u64,
}

impl Default for HarnessSection {
    fn default() -> Self {
        Self {
            handoff_timeout_ms: DEFAULT_HANDOFF_TIMEOUT.as_millis() as u64,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the lockstep config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/lockstep` or `~/.config/lockstep`,
/// never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("lockstep");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("lockstep")
}

/// Return the path to the lockstep config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. A missing file is `Ok(None)`; a file that
/// exists but does not parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct LockstepConfig {
    pub db_config: DbConfig,
    pub handoff_timeout: Duration,
}

impl LockstepConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `LOCKSTEP_DATABASE_URL` > `database.url` >
    ///   `DbConfig::DEFAULT_URL`
    /// - Timeout: `cli_timeout_ms` > `LOCKSTEP_HANDOFF_TIMEOUT_MS` >
    ///   `harness.handoff_timeout_ms` > 2000
    pub fn resolve(cli_db_url: Option<&str>, cli_timeout_ms: Option<u64>) -> Result<Self> {
        let file_config = load_config()?;

        let db_url = if let Some(url) = cli_db_url {
            url.to_owned()
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_owned()
        };

        let timeout_ms = if let Some(ms) = cli_timeout_ms {
            ms
        } else if let Ok(raw) = std::env::var(TIMEOUT_ENV_VAR) {
            raw.trim().parse().with_context(|| {
                format!("{TIMEOUT_ENV_VAR} is not a number of milliseconds: {raw:?}")
            })?
        } else if let Some(ref cfg) = file_config {
            cfg.harness.handoff_timeout_ms
        } else {
            HarnessSection::default().handoff_timeout_ms
        };

        Ok(Self {
            db_config: DbConfig::new(db_url),
            handoff_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ScopedEnv, lock_env};

    const VARS: [&str; 3] = ["XDG_CONFIG_HOME", DbConfig::ENV_VAR, TIMEOUT_ENV_VAR];

    fn write_config(dir: &std::path::Path, contents: &str) {
        let config_dir = dir.join("lockstep");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("config.toml"), contents).unwrap();
    }

    #[test]
    fn harness_section_defaults_when_absent() {
        let parsed: ConfigFile =
            toml::from_str("[database]\nurl = \"postgresql://h:5432/d\"\n").unwrap();
        assert_eq!(parsed.harness.handoff_timeout_ms, 2000);
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = ScopedEnv::new(&VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let original = ConfigFile {
            database: DatabaseSection {
                url: "postgresql://testhost:5432/testdb".to_owned(),
            },
            harness: HarnessSection {
                handoff_timeout_ms: 750,
            },
        };
        save_config(&original).unwrap();

        let loaded = load_config().unwrap().unwrap();
        assert_eq!(loaded.database.url, original.database.url);
        assert_eq!(loaded.harness.handoff_timeout_ms, 750);
        assert!(config_path().starts_with(tmp.path()));
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = ScopedEnv::new(&VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let config = ConfigFile {
            database: DatabaseSection {
                url: DbConfig::DEFAULT_URL.to_owned(),
            },
            harness: HarnessSection::default(),
        };
        save_config(&config).unwrap();

        let meta = std::fs::metadata(config_path()).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = ScopedEnv::new(&VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        assert!(load_config().unwrap().is_none());
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = ScopedEnv::new(&VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        write_config(tmp.path(), "[database\nurl = ");

        let err = LockstepConfig::resolve(None, None).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn resolve_with_cli_flags_overrides_all() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = ScopedEnv::new(&VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(TIMEOUT_ENV_VAR, "300") };

        let config =
            LockstepConfig::resolve(Some("postgresql://cli:5432/clidb"), Some(50)).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");
        assert_eq!(config.handoff_timeout, Duration::from_millis(50));
    }

    #[test]
    fn resolve_with_env_vars_overrides_config_file() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = ScopedEnv::new(&VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        write_config(
            tmp.path(),
            "[database]\nurl = \"postgresql://file:5432/filedb\"\n\n\
             [harness]\nhandoff_timeout_ms = 900\n",
        );
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(TIMEOUT_ENV_VAR, "300") };

        let config = LockstepConfig::resolve(None, None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.handoff_timeout, Duration::from_millis(300));
    }

    #[test]
    fn resolve_reads_config_file_when_no_overrides() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = ScopedEnv::new(&VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        write_config(
            tmp.path(),
            "[database]\nurl = \"postgresql://file:5432/filedb\"\n\n\
             [harness]\nhandoff_timeout_ms = 900\n",
        );

        let config = LockstepConfig::resolve(None, None).unwrap();
        assert_eq!(config.db_config.database_url, "postgresql://file:5432/filedb");
        assert_eq!(config.handoff_timeout, Duration::from_millis(900));
    }

    #[test]
    fn resolve_defaults_when_nothing_set() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = ScopedEnv::new(&VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };

        let config = LockstepConfig::resolve(None, None).unwrap();
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert_eq!(config.handoff_timeout, DEFAULT_HANDOFF_TIMEOUT);
    }

    #[test]
    fn resolve_rejects_non_numeric_timeout() {
        let _lock = lock_env();
        let tmp = tempfile::TempDir::new().unwrap();
        let _env = ScopedEnv::new(&VARS);
        unsafe { std::env::set_var("XDG_CONFIG_HOME", tmp.path()) };
        unsafe { std::env::set_var(TIMEOUT_ENV_VAR, "soon") };

        let err = LockstepConfig::resolve(None, None).unwrap_err();
        assert!(err.to_string().contains(TIMEOUT_ENV_VAR), "unexpected error: {err}");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("lockstep/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
