use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::storage::repository;
use crate::storage::Database;

pub const KEY_LLM_PROVIDER: &str = "llm_provider";
pub const KEY_LLM_MODEL: &str = "llm_model";
pub const KEY_RESOLVER_TIMEOUT: &str = "resolver_timeout_secs";
pub const KEY_TRIP_CSV: &str = "trip_csv";

pub const KNOWN_KEYS: &[&str] = &[KEY_LLM_PROVIDER, KEY_LLM_MODEL, KEY_RESOLVER_TIMEOUT, KEY_TRIP_CSV];

pub const DEFAULT_LLM_PROVIDER: &str = "none";
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 30;

/// Typed view over the `app_config` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `none`, `bedrock` or `anthropic`.
    pub llm_provider: String,
    pub llm_model: String,
    pub resolver_timeout_secs: u64,
    pub trip_csv: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_provider: DEFAULT_LLM_PROVIDER.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            resolver_timeout_secs: DEFAULT_RESOLVER_TIMEOUT_SECS,
            trip_csv: None,
        }
    }
}

impl Settings {
    pub async fn load(db: &Database) -> Result<Self> {
        let entries = db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?;

        let mut settings = Settings::default();
        for (key, value) in entries {
            match key.as_str() {
                KEY_LLM_PROVIDER => settings.llm_provider = value,
                KEY_LLM_MODEL => settings.llm_model = value,
                KEY_RESOLVER_TIMEOUT => {
                    settings.resolver_timeout_secs = value.trim().parse().map_err(|_| {
                        Error::Config(format!("{KEY_RESOLVER_TIMEOUT} must be a whole number of seconds, got {value:?}"))
                    })?;
                }
                KEY_TRIP_CSV => settings.trip_csv = Some(PathBuf::from(value)),
                other => log::debug!("Ignoring unknown config key {other}"),
            }
        }
        Ok(settings)
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver_timeout_secs)
    }
}

/// Store a config value. Only recognized keys are accepted.
pub async fn set(db: &Database, key: &str, value: &str) -> Result<()> {
    if !KNOWN_KEYS.contains(&key) {
        return Err(Error::Config(format!(
            "unknown config key: {key} (expected one of {})",
            KNOWN_KEYS.join(", ")
        )));
    }
    let key = key.to_string();
    let value = value.to_string();
    db.writer()
        .call(move |conn| repository::set_config(conn, &key, &value))
        .await?;
    Ok(())
}

pub async fn get(db: &Database, key: &str) -> Result<Option<String>> {
    let key = key.to_string();
    Ok(db
        .reader()
        .call(move |conn| repository::get_config(conn, &key))
        .await?)
}

pub async fn list(db: &Database) -> Result<Vec<(String, String)>> {
    Ok(db.reader().call(|conn| repository::list_config(conn)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_on_empty_store() {
        let db = Database::open_memory().await.unwrap();
        let settings = Settings::load(&db).await.unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.llm_provider, "none");
        assert_eq!(settings.resolver_timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_load_stored_values() {
        let db = Database::open_memory().await.unwrap();
        set(&db, KEY_LLM_PROVIDER, "bedrock").await.unwrap();
        set(&db, KEY_LLM_MODEL, "haiku").await.unwrap();
        set(&db, KEY_RESOLVER_TIMEOUT, "5").await.unwrap();
        set(&db, KEY_TRIP_CSV, "/data/trips.csv").await.unwrap();

        let settings = Settings::load(&db).await.unwrap();
        assert_eq!(settings.llm_provider, "bedrock");
        assert_eq!(settings.llm_model, "haiku");
        assert_eq!(settings.resolver_timeout_secs, 5);
        assert_eq!(settings.trip_csv, Some(PathBuf::from("/data/trips.csv")));
        assert_eq!(get(&db, KEY_LLM_MODEL).await.unwrap(), Some("haiku".to_string()));
        assert_eq!(list(&db).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_timeout_is_config_error() {
        let db = Database::open_memory().await.unwrap();
        set(&db, KEY_RESOLVER_TIMEOUT, "soon").await.unwrap();
        let err = Settings::load(&db).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_unknown_key_rejected() {
        let db = Database::open_memory().await.unwrap();
        let err = set(&db, "workspace_gid", "1").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
