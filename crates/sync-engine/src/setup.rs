// crates/sync-engine/src/setup.rs
//! Builds the engine's collaborators from loaded configuration

use crate::error::SyncResult;
use fairway_config::{Config, ConfigManager, SyncSettings};
use fairway_database::DatabaseConfig;
use fairway_network::{Client, ClientConfig, HttpRemote};

/// HTTP remote for `settings.remote_url`
///
/// Requests are bounded by `request_timeout_secs` and carry the bearer
/// token when one is configured.
pub fn http_remote(settings: &SyncSettings) -> SyncResult<HttpRemote> {
    let mut client_config = ClientConfig::default().with_timeout(settings.request_timeout());
    if let Some(token) = settings.auth_token.as_deref() {
        client_config = client_config.with_bearer_token(token);
    }

    let client = Client::with_config(client_config)?;
    Ok(HttpRemote::new(client, &settings.remote_url)?)
}

/// Database settings for the configured path, resolved against the config directory
pub fn database_config(manager: &ConfigManager, config: &Config) -> DatabaseConfig {
    DatabaseConfig::new(manager.database_path(config).to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_remote_uses_timeout_and_token() -> SyncResult<()> {
        let settings = SyncSettings {
            remote_url: "https://api.fairway.golf/v1".to_string(),
            auth_token: Some("caddie".to_string()),
            request_timeout_secs: 7,
            ..SyncSettings::default()
        };

        let remote = http_remote(&settings)?;
        assert_eq!(remote.client().config().timeout, Duration::from_secs(7));
        assert_eq!(remote.client().config().bearer_token.as_deref(), Some("caddie"));
        assert_eq!(
            remote.health_url().as_str(),
            "https://api.fairway.golf/v1/health"
        );
        Ok(())
    }

    #[test]
    fn test_remote_without_token() -> SyncResult<()> {
        let remote = http_remote(&SyncSettings::default())?;
        assert!(remote.client().config().bearer_token.is_none());
        Ok(())
    }

    #[test]
    fn test_remote_rejects_bad_url() {
        let settings = SyncSettings {
            remote_url: "not a url".to_string(),
            ..SyncSettings::default()
        };
        assert!(matches!(http_remote(&settings), Err(SyncError::Network(_))));
    }

    #[test]
    fn test_database_path_resolution() -> SyncResult<()> {
        let dir = TempDir::new().map_err(|e| SyncError::Custom(e.to_string()))?;
        let manager = ConfigManager::with_directory(dir.path().to_path_buf())
            .map_err(|e| SyncError::Config(e.to_string()))?;

        let mut config = Config::default();
        config.app.database_path = PathBuf::from("trips.db");
        let db = database_config(&manager, &config);
        assert_eq!(PathBuf::from(&db.path), dir.path().join("trips.db"));

        let absolute = dir.path().join("elsewhere").join("golf.db");
        config.app.database_path = absolute.clone();
        assert_eq!(PathBuf::from(database_config(&manager, &config).path), absolute);
        Ok(())
    }
}
