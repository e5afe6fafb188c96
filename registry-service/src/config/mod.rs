use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub paging: PagingConfig,
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub public_key_path: String,
    /// Only needed where this service issues session tokens itself.
    pub private_key_path: Option<String>,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub admin_api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PagingConfig {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    pub org_list_per_page: u32,
    pub login_url: String,
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = RegistryConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("registry-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", None, is_prod)?,
            },
            jwt: JwtConfig {
                public_key_path: get_env("JWT_PUBLIC_KEY_PATH", None, is_prod)?,
                private_key_path: get_optional_env("JWT_PRIVATE_KEY_PATH"),
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "15",
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
                admin_api_key: get_env("ADMIN_API_KEY", None, true)?,
            },
            paging: PagingConfig {
                default_per_page: parse_env("REGISTRY_DEFAULT_PER_PAGE", "100", is_prod)?,
                max_per_page: parse_env("REGISTRY_MAX_PER_PAGE", "1000", is_prod)?,
            },
            settings: SettingsConfig {
                org_list_per_page: parse_env("ORG_LIST_PER_PAGE", "100", is_prod)?,
                login_url: get_env("LOGIN_URL", Some("/login"), is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.paging.default_per_page == 0 || self.paging.max_per_page == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Registry page sizes must be positive"
            )));
        }

        if self.paging.default_per_page > self.paging.max_per_page {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REGISTRY_DEFAULT_PER_PAGE must not exceed REGISTRY_MAX_PER_PAGE"
            )));
        }

        if self.settings.org_list_per_page == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ORG_LIST_PER_PAGE must be positive"
            )));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

/// Default location of a client's identity key: `$REGISTRY_HOME/id.pem`,
/// falling back to `$HOME/.registry/id.pem`.
pub fn default_id_key_path() -> PathBuf {
    let dir = match env::var_os("REGISTRY_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".registry"),
    };
    dir.join("id.pem")
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RegistryConfig {
        RegistryConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "registry-service".to_string(),
            service_version: "0.1.0".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            mongodb: MongoConfig {
                uri: "mongodb://localhost:27017".to_string(),
                database: "registry".to_string(),
            },
            jwt: JwtConfig {
                public_key_path: "keys/public.pem".to_string(),
                private_key_path: None,
                access_token_expiry_minutes: 15,
            },
            security: SecurityConfig {
                allowed_origins: vec!["*".to_string()],
                admin_api_key: "admin".to_string(),
            },
            paging: PagingConfig {
                default_per_page: 100,
                max_per_page: 1000,
            },
            settings: SettingsConfig {
                org_list_per_page: 100,
                login_url: "/login".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_dev_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_page_sizes() {
        let mut config = config();
        config.paging.default_per_page = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_wildcard_cors_in_prod() {
        let mut config = config();
        config.environment = Environment::Prod;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
