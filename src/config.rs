use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    pub node: NodeConfig,
    pub storage: StorageConfig,
    /// Seconds a memoized lookup table stays fresh
    pub lookup_cache_ttl_secs: u64,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
    /// Emails that are always treated as superadmins, regardless of the admins table
    pub superadmin_emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Local,
    Supabase,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// Project URL, e.g. https://abcd.supabase.co (required when backend is supabase)
    pub supabase_url: Option<String>,
    /// Service role key (required when backend is supabase)
    pub supabase_service_key: Option<String>,
    pub supabase_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            supabase_url: None,
            supabase_service_key: None,
            supabase_bucket: "resources".to_string(),
        }
    }
}

/// Split a comma separated env value into trimmed, lower-cased, non-empty entries.
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_default();

        let superadmin_emails = std::env::var("SUPERADMIN_EMAILS")
            .map(|v| parse_email_list(&v))
            .unwrap_or_default();

        let lookup_cache_ttl_secs = std::env::var("LOOKUP_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(25 * 1024 * 1024); // 25MB

        let storage_backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "supabase" => StorageBackend::Supabase,
            _ => StorageBackend::Local,
        };

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let supabase_url = std::env::var("SUPABASE_URL")
            .ok()
            .map(|u| u.trim_end_matches('/').to_string());
        let supabase_service_key = std::env::var("SUPABASE_SERVICE_KEY").ok();
        let supabase_bucket =
            std::env::var("SUPABASE_BUCKET").unwrap_or_else(|_| "resources".to_string());

        let config = Config {
            auth: AuthConfig {
                jwt_secret,
                superadmin_emails,
            },
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_storage_path,
                supabase_url,
                supabase_service_key,
                supabase_bucket,
            },
            lookup_cache_ttl_secs,
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT_SECRET must be set".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Supabase
            && (self.storage.supabase_url.is_none() || self.storage.supabase_service_key.is_none())
        {
            return Err(ConfigError::ValidationError(
                "SUPABASE_URL and SUPABASE_SERVICE_KEY are required when STORAGE_BACKEND=supabase"
                    .to_string(),
            ));
        }

        if self.auth.superadmin_emails.is_empty() {
            tracing::warn!(
                "SUPERADMIN_EMAILS is empty. Only admins already stored in the database can manage content."
            );
        }

        Ok(())
    }

    /// Whether an email is a bootstrap superadmin.
    pub fn is_bootstrap_superadmin(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.auth.superadmin_emails.iter().any(|e| *e == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            auth: AuthConfig {
                jwt_secret: "secret".to_string(),
                superadmin_emails: vec!["root@pec.edu".to_string()],
            },
            node: NodeConfig {
                bind_address: "127.0.0.1:0".to_string(),
                data_dir: "./data".to_string(),
            },
            storage: StorageConfig::default(),
            lookup_cache_ttl_secs: 300,
            test_mode: false,
            max_upload_size: 1024,
        }
    }

    #[test]
    fn test_parse_email_list() {
        let emails = parse_email_list(" A@pec.edu, ,b@PEC.edu,");
        assert_eq!(emails, vec!["a@pec.edu", "b@pec.edu"]);
    }

    #[test]
    fn test_validate_requires_secret() {
        let mut config = base_config();
        config.auth.jwt_secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_supabase_requires_credentials() {
        let mut config = base_config();
        config.storage.backend = StorageBackend::Supabase;
        config.storage.supabase_url = Some("https://x.supabase.co".to_string());
        assert!(config.validate().is_err());

        config.storage.supabase_service_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bootstrap_superadmin_is_case_insensitive() {
        let config = base_config();
        assert!(config.is_bootstrap_superadmin("Root@PEC.edu"));
        assert!(!config.is_bootstrap_superadmin("someone@pec.edu"));
    }
}
