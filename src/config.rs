use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::api::pagination::PaginationConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// Where uploaded files live and how large they may be
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_file_size: usize,
    pub max_files_per_request: usize,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub app_name: String,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // CORS ("*" allows any origin)
    pub cors_allow_origins: Vec<String>,

    // Logging
    pub log_json: bool,

    pub pagination: PaginationConfig,
    pub uploads: UploadSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Missing keys fall back to
    /// defaults; present but unparsable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Environment::from_str(&lookup("ENV").unwrap_or_else(|| "dev".to_string()));
        let app_name = lookup("APP_NAME").unwrap_or_else(|| "crud-template".to_string());
        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());

        // Database
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://app.db?mode=rwc".to_string());
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?;

        // CORS
        let cors_allow_origins = lookup("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Logging
        let log_json = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => true,
            Some("pretty") => false,
            Some(other) => bail!("LOG_FORMAT must be 'json' or 'pretty', got '{}'", other),
            None => env.is_prod(),
        };

        // Pagination
        let pagination = PaginationConfig {
            default_size: parse_or(&lookup, "PAGINATION_DEFAULT_SIZE", 20)?,
            max_size: parse_or(&lookup, "PAGINATION_MAX_SIZE", 100)?,
        };
        if pagination.max_size == 0 {
            bail!("PAGINATION_MAX_SIZE must be at least 1");
        }
        if pagination.default_size == 0 || pagination.default_size > pagination.max_size {
            bail!(
                "PAGINATION_DEFAULT_SIZE must be between 1 and {}",
                pagination.max_size
            );
        }

        // Uploads
        let uploads = UploadSettings {
            dir: PathBuf::from(lookup("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            max_file_size: parse_or(&lookup, "UPLOAD_MAX_FILE_SIZE", 10 * 1024 * 1024)?,
            max_files_per_request: parse_or(&lookup, "UPLOAD_MAX_FILES", 10)?,
        };

        Ok(Settings {
            env,
            app_name,
            server_addr,
            database_url,
            database_max_connections,
            cors_allow_origins,
            log_json,
            pagination,
            uploads,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = settings_from(&[]).unwrap();

        assert_eq!(settings.env, Environment::Dev);
        assert_eq!(settings.server_addr, "0.0.0.0:8000");
        assert_eq!(settings.database_url, "sqlite://app.db?mode=rwc");
        assert_eq!(settings.pagination.default_size, 20);
        assert_eq!(settings.pagination.max_size, 100);
        assert_eq!(settings.uploads.max_file_size, 10 * 1024 * 1024);
        assert_eq!(settings.uploads.max_files_per_request, 10);
        assert_eq!(settings.cors_allow_origins, vec!["*".to_string()]);
        assert!(!settings.log_json);
    }

    #[test]
    fn production_logs_json_unless_overridden() {
        let settings = settings_from(&[("ENV", "production")]).unwrap();
        assert!(settings.env.is_prod());
        assert!(settings.log_json);

        let settings = settings_from(&[("ENV", "prod"), ("LOG_FORMAT", "pretty")]).unwrap();
        assert!(!settings.log_json);
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let settings =
            settings_from(&[("CORS_ALLOW_ORIGINS", "http://a.test, http://b.test,,")]).unwrap();
        assert_eq!(
            settings.cors_allow_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = settings_from(&[("PAGINATION_MAX_SIZE", "lots")]).unwrap_err();
        assert!(err.to_string().contains("PAGINATION_MAX_SIZE"));
    }

    #[test]
    fn default_size_must_fit_under_max_size() {
        assert!(settings_from(&[
            ("PAGINATION_DEFAULT_SIZE", "50"),
            ("PAGINATION_MAX_SIZE", "10")
        ])
        .is_err());
        assert!(settings_from(&[("PAGINATION_DEFAULT_SIZE", "0")]).is_err());
        assert!(settings_from(&[("PAGINATION_MAX_SIZE", "0")]).is_err());
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(settings_from(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
