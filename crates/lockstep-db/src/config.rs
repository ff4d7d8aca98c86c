use std::env;

/// Database configuration.
///
/// Reads from the `LOCKSTEP_DATABASE_URL` environment variable, falling back
/// to `postgresql://localhost:5432/lockstep` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/lockstep";

    /// Environment variable consulted by [`DbConfig::from_env`].
    pub const ENV_VAR: &str = "LOCKSTEP_DATABASE_URL";

    /// Build a config from the environment.
    ///
    /// Priority: `LOCKSTEP_DATABASE_URL` env var, then the compile-time default.
    pub fn from_env() -> Self {
        let database_url =
            env::var(Self::ENV_VAR).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self { database_url }
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Extract the database name from the URL.
    ///
    /// Returns `None` if the URL has no path component. Query parameters
    /// (`?sslmode=...`) are not part of the name.
    pub fn database_name(&self) -> Option<&str> {
        let without_query = self
            .database_url
            .split('?')
            .next()
            .unwrap_or(&self.database_url);
        let (head, name) = without_query.rsplit_once('/')?;
        // "postgresql://host" has only the scheme slashes.
        if head.ends_with('/') || name.is_empty() {
            return None;
        }
        Some(name)
    }

    /// Return a URL pointing at the `postgres` maintenance database on the
    /// same host. Used to issue `CREATE DATABASE` when the target DB does not
    /// yet exist.
    pub fn maintenance_url(&self) -> String {
        if self.database_name().is_none() {
            return self.database_url.clone();
        }
        let (base, query) = match self.database_url.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (self.database_url.as_str(), None),
        };
        let Some(pos) = base.rfind('/') else {
            return self.database_url.clone();
        };
        let mut url = format!("{}/postgres", &base[..pos]);
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
