/// Application context and dependency injection
use crate::{
    config::{ServerConfig, UploadConfig},
    db,
    error::{CmsError, CmsResult},
    portfolio::{
        BlogRepository, CertificateRepository, EducationRepository, ExperienceRepository,
        ProjectRepository, SectionRepository, SettingRepository, SkillRepository,
        SocialLinkRepository, TestimonialRepository,
    },
    uploads::{self, UploadBackend},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub uploads: Arc<dyn UploadBackend>,
    // Tagged content
    pub projects: Arc<ProjectRepository>,
    pub blog: Arc<BlogRepository>,
    // Plain content
    pub skills: Arc<SkillRepository>,
    pub certificates: Arc<CertificateRepository>,
    pub education: Arc<EducationRepository>,
    pub experiences: Arc<ExperienceRepository>,
    pub testimonials: Arc<TestimonialRepository>,
    // Site layout
    pub sections: Arc<SectionRepository>,
    pub social_links: Arc<SocialLinkRepository>,
    pub settings: Arc<SettingRepository>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> CmsResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directories if they don't exist
        Self::ensure_directories(&config).await?;

        let options = db::DatabaseOptions {
            max_connections: config.storage.max_connections,
            ..Default::default()
        };
        let pool = db::create_pool(&config.storage.database_path, options).await?;

        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let uploads = uploads::build_backend(&config.uploads)?;

        Ok(Self::with_parts(config, pool, uploads))
    }

    /// Wire repositories around an existing pool and upload backend
    pub fn with_parts(
        config: ServerConfig,
        pool: SqlitePool,
        uploads: Arc<dyn UploadBackend>,
    ) -> Self {
        let policy = config.tags.name_policy;

        Self {
            projects: Arc::new(ProjectRepository::new(pool.clone(), policy)),
            blog: Arc::new(BlogRepository::new(pool.clone(), policy)),
            skills: Arc::new(SkillRepository::new(pool.clone())),
            certificates: Arc::new(CertificateRepository::new(pool.clone())),
            education: Arc::new(EducationRepository::new(pool.clone())),
            experiences: Arc::new(ExperienceRepository::new(pool.clone())),
            testimonials: Arc::new(TestimonialRepository::new(pool.clone())),
            sections: Arc::new(SectionRepository::new(pool.clone())),
            social_links: Arc::new(SocialLinkRepository::new(pool.clone())),
            settings: Arc::new(SettingRepository::new(pool.clone())),
            config: Arc::new(config),
            db: pool,
            uploads,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> CmsResult<()> {
        let mut dirs = vec![config.storage.data_directory.clone()];
        if let Some(parent) = config.storage.database_path.parent() {
            dirs.push(parent.to_path_buf());
        }
        if let UploadConfig::Local { directory } = &config.uploads {
            dirs.push(directory.clone());
        }

        for dir in dirs {
            if dir.as_os_str().is_empty() || dir.exists() {
                continue;
            }
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                CmsError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }

    /// Context over an in-memory database with local uploads below `upload_dir`
    #[cfg(test)]
    pub async fn for_tests(upload_dir: &std::path::Path) -> Self {
        let config = ServerConfig::for_tests(upload_dir.to_path_buf());
        let uploads = uploads::build_backend(&config.uploads).unwrap();
        Self::with_parts(config, db::test_pool().await, uploads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_creates_directories_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_tests(dir.path().join("uploads"));
        config.storage.data_directory = dir.path().join("data");
        config.storage.database_path = dir.path().join("data").join("cms.sqlite");

        let ctx = AppContext::new(config).await.unwrap();

        assert!(dir.path().join("data").is_dir());
        assert!(dir.path().join("uploads").is_dir());
        assert_eq!(ctx.uploads.kind(), "local");
        assert!(ctx.projects.list_all_with_tags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::for_tests(dir.path().to_path_buf());
        config.service.hostname = String::new();

        assert!(matches!(
            AppContext::new(config).await,
            Err(CmsError::Validation(_))
        ));
    }
}
