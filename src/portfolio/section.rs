/// Page sections and their display order
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
pub struct Section {
    pub id: Uuid,
    pub section_id: String,
    pub label: String,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSection {
    pub section_id: String,
    pub label: String,
    pub display_order: i64,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct SectionRepository {
    db: SqlitePool,
}

impl SectionRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewSection) -> CmsResult<Section> {
        check_required("section_id", &new.section_id)?;
        check_required("label", &new.label)?;

        let now = Utc::now();
        let section = Section {
            id: Uuid::new_v4(),
            section_id: new.section_id,
            label: new.label,
            display_order: new.display_order,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO portfolio_sections
                (id, section_id, label, display_order, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(section.id.to_string())
        .bind(&section.section_id)
        .bind(&section.label)
        .bind(section.display_order)
        .bind(section.is_active)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(|e| {
            CmsError::on_unique_violation(
                e,
                format!("Section '{}' already exists", section.section_id),
            )
        })?;

        Ok(section)
    }

    pub async fn list_all(&self) -> CmsResult<Vec<Section>> {
        let rows = sqlx::query(
            r#"
            SELECT id, section_id, label, display_order, is_active, created_at, updated_at
            FROM portfolio_sections
            ORDER BY display_order ASC, created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(section_from_row).collect()
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query("DELETE FROM portfolio_sections WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Section {} not found", id)));
        }
        Ok(())
    }
}

fn section_from_row(row: &SqliteRow) -> CmsResult<Section> {
    Ok(Section {
        id: db::get_uuid(row, "id")?,
        section_id: row.try_get("section_id")?,
        label: row.try_get("label")?,
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

    fn section(id: &str, order: i64) -> NewSection {
        NewSection {
            section_id: id.to_string(),
            label: id.to_uppercase(),
            display_order: order,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_sections_ordered_and_unique() {
        let repo = SectionRepository::new(test_pool().await);
        repo.create(section("projects", 2)).await.unwrap();
        let about = repo.create(section("about", 1)).await.unwrap();

        let ids: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.section_id)
            .collect();
        assert_eq!(ids, vec!["about", "projects"]);

        assert!(matches!(
            repo.create(section("about", 3)).await,
            Err(CmsError::Conflict(_))
        ));

        repo.delete(about.id).await.unwrap();
        assert!(matches!(repo.delete(about.id).await, Err(CmsError::NotFound(_))));
    }
}
