/// Configuration management for the portfolio CMS
use crate::{
    error::{CmsError, CmsResult},
    tags::TagNamePolicy,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub uploads: UploadConfig,
    pub tags: TagConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub deployment: DeploymentMode,
    pub version: String,
    /// Maximum accepted request body, multipart uploads included
    pub max_body_bytes: usize,
}

/// How the process is hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Long-running process with its own TCP listener
    Standalone,
    /// Function wrapper invoked once per request
    Serverless,
}

impl std::str::FromStr for DeploymentMode {
    type Err = CmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standalone" | "server" => Ok(DeploymentMode::Standalone),
            "serverless" | "function" => Ok(DeploymentMode::Serverless),
            other => Err(CmsError::Validation(format!(
                "Unknown deployment mode: {}",
                other
            ))),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database_path: PathBuf,
    pub max_connections: u32,
}

/// Upload backend configuration, selected once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UploadConfig {
    Local {
        directory: PathBuf,
    },
    Remote {
        base_url: String,
        api_key: String,
        bucket: String,
    },
}

impl UploadConfig {
    /// Short provider name reported by the health endpoint
    pub fn provider(&self) -> &'static str {
        match self {
            UploadConfig::Local { .. } => "local",
            UploadConfig::Remote { .. } => "remote",
        }
    }
}

/// Tag configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagConfig {
    pub name_policy: TagNamePolicy,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> CmsResult<Self> {
        dotenv::dotenv().ok();

        let name = env::var("CMS_SERVICE_NAME").unwrap_or_else(|_| "portfolio-cms".to_string());
        let hostname = env::var("CMS_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CMS_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| CmsError::Validation("Invalid port number".to_string()))?;
        let deployment: DeploymentMode = env::var("CMS_DEPLOYMENT")
            .unwrap_or_else(|_| "standalone".to_string())
            .parse()?;
        let version = env!("CARGO_PKG_VERSION").to_string();
        let max_body_bytes = env::var("CMS_MAX_BODY_BYTES")
            .unwrap_or_else(|_| "12582912".to_string())
            .parse()
            .unwrap_or(12 * 1024 * 1024);

        let data_directory: PathBuf = env::var("CMS_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database_path = env::var("CMS_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("portfolio.sqlite"));
        let max_connections = env::var("CMS_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| CmsError::Validation("Invalid connection limit".to_string()))?;

        let uploads = Self::uploads_from_env(deployment)?;

        let name_policy: TagNamePolicy = env::var("CMS_TAG_NAME_POLICY")
            .unwrap_or_else(|_| "exact".to_string())
            .parse()?;

        let level = env::var("CMS_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
        let json = env::var("CMS_LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Ok(ServerConfig {
            service: ServiceConfig {
                name,
                hostname,
                port,
                deployment,
                version,
                max_body_bytes,
            },
            storage: StorageConfig {
                data_directory,
                database_path,
                max_connections,
            },
            uploads,
            tags: TagConfig { name_policy },
            logging: LoggingConfig { level, json },
        })
    }

    /// Pick the upload backend: an explicit provider wins, otherwise remote
    /// storage is used whenever its credentials are present.
    fn uploads_from_env(deployment: DeploymentMode) -> CmsResult<UploadConfig> {
        let base_url = env::var("CMS_STORAGE_URL").ok().filter(|s| !s.is_empty());
        let api_key = env::var("CMS_STORAGE_KEY").ok().filter(|s| !s.is_empty());
        let provider = env::var("CMS_UPLOAD_PROVIDER")
            .ok()
            .map(|p| p.trim().to_ascii_lowercase());

        let use_remote = match provider.as_deref() {
            Some("remote") => true,
            Some("local") => false,
            Some(other) => {
                return Err(CmsError::Validation(format!(
                    "Unknown upload provider: {}",
                    other
                )))
            }
            None => base_url.is_some() && api_key.is_some(),
        };

        if use_remote {
            let base_url = base_url.ok_or_else(|| {
                CmsError::Validation("CMS_STORAGE_URL required for remote uploads".to_string())
            })?;
            let api_key = api_key.ok_or_else(|| {
                CmsError::Validation("CMS_STORAGE_KEY required for remote uploads".to_string())
            })?;

            return Ok(UploadConfig::Remote {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                bucket: env::var("CMS_STORAGE_BUCKET").unwrap_or_else(|_| "uploads".to_string()),
            });
        }

        let default_directory = match deployment {
            DeploymentMode::Standalone => "./uploads",
            // Function hosts only allow writes below /tmp
            DeploymentMode::Serverless => "/tmp/uploads",
        };

        Ok(UploadConfig::Local {
            directory: env::var("CMS_UPLOAD_DIRECTORY")
                .unwrap_or_else(|_| default_directory.to_string())
                .into(),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> CmsResult<()> {
        if self.service.hostname.is_empty() {
            return Err(CmsError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.storage.max_connections == 0 {
            return Err(CmsError::Validation(
                "Database connection limit must be at least 1".to_string(),
            ));
        }

        if let UploadConfig::Remote {
            base_url,
            api_key,
            bucket,
        } = &self.uploads
        {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(CmsError::Validation(
                    "Storage URL must be an http(s) URL".to_string(),
                ));
            }
            if api_key.is_empty() || bucket.is_empty() {
                return Err(CmsError::Validation(
                    "Storage key and bucket cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Configuration for tests: in-process database path, local uploads below `upload_dir`
    #[cfg(test)]
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                name: "portfolio-cms".to_string(),
                hostname: "127.0.0.1".to_string(),
                port: 0,
                deployment: DeploymentMode::Standalone,
                version: env!("CARGO_PKG_VERSION").to_string(),
                max_body_bytes: 12 * 1024 * 1024,
            },
            storage: StorageConfig {
                data_directory: upload_dir.clone(),
                database_path: upload_dir.join("test.sqlite"),
                max_connections: 1,
            },
            uploads: UploadConfig::Local {
                directory: upload_dir,
            },
            tags: TagConfig {
                name_policy: TagNamePolicy::Exact,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}
