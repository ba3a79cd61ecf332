/// Social profile links, one per platform
use super::check_required;
use crate::{
    db,
    error::{CmsError, CmsResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialLink {
    pub id: Uuid,
    pub platform: String,
    pub url: String,
    pub icon_name: String,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSocialLink {
    pub platform: String,
    pub url: String,
    pub icon_name: String,
    pub display_order: i64,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct SocialLinkRepository {
    db: SqlitePool,
}

impl SocialLinkRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewSocialLink) -> CmsResult<SocialLink> {
        check_required("platform", &new.platform)?;
        check_required("url", &new.url)?;

        let now = Utc::now();
        let link = SocialLink {
            id: Uuid::new_v4(),
            platform: new.platform,
            url: new.url,
            icon_name: new.icon_name,
            display_order: new.display_order,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO portfolio_social_links
                (id, platform, url, icon_name, display_order, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(link.id.to_string())
        .bind(&link.platform)
        .bind(&link.url)
        .bind(&link.icon_name)
        .bind(link.display_order)
        .bind(link.is_active)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(|e| {
            CmsError::on_unique_violation(
                e,
                format!("Social link for '{}' already exists", link.platform),
            )
        })?;

        Ok(link)
    }

    pub async fn list_all(&self) -> CmsResult<Vec<SocialLink>> {
        let rows = sqlx::query(
            r#"
            SELECT id, platform, url, icon_name, display_order, is_active, created_at, updated_at
            FROM portfolio_social_links
            ORDER BY display_order ASC, created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(link_from_row).collect()
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query("DELETE FROM portfolio_social_links WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Social link {} not found", id)));
        }
        Ok(())
    }
}

fn link_from_row(row: &SqliteRow) -> CmsResult<SocialLink> {
    Ok(SocialLink {
        id: db::get_uuid(row, "id")?,
        platform: row.try_get("platform")?,
        url: row.try_get("url")?,
        icon_name: row.try_get("icon_name")?,
        display_order: row.try_get("display_order")?,
        is_active: row.try_get("is_active")?,
        created_at: db::get_timestamp(row, "created_at")?,
        updated_at: db::get_timestamp(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn link(platform: &str) -> NewSocialLink {
        NewSocialLink {
            platform: platform.to_string(),
            url: format!("https://{}.example/me", platform),
            icon_name: platform.to_string(),
            display_order: 0,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_one_link_per_platform() {
        let repo = SocialLinkRepository::new(test_pool().await);
        let github = repo.create(link("github")).await.unwrap();

        assert!(matches!(
            repo.create(link("github")).await,
            Err(CmsError::Conflict(_))
        ));
        assert_eq!(repo.list_all().await.unwrap().len(), 1);

        repo.delete(github.id).await.unwrap();
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_url_required() {
        let repo = SocialLinkRepository::new(test_pool().await);
        let mut new = link("mastodon");
        new.url = String::new();
        assert!(matches!(repo.create(new).await, Err(CmsError::Validation(_))));
    }
}
