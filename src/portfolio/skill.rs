/// Skills shown with a proficiency value
use super::check_required;
use crate::{
    db,
    error::{CmsError, CmsResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const SKILL_COLUMNS: &str =
    "id, name, value, icon_url, category, display_order, is_featured, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    /// Proficiency, 0 to 100
    pub value: i64,
    pub icon_url: String,
    pub category: String,
    pub display_order: i64,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSkill {
    pub name: String,
    pub value: i64,
    pub icon_url: String,
    pub category: String,
    pub display_order: i64,
    pub is_featured: bool,
}

impl Default for NewSkill {
    fn default() -> Self {
        Self {
            name: String::new(),
            value: 0,
            icon_url: String::new(),
            category: "programming".to_string(),
            display_order: 0,
            is_featured: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkillChanges {
    pub name: Option<String>,
    pub value: Option<i64>,
    pub icon_url: Option<String>,
    pub category: Option<String>,
    pub display_order: Option<i64>,
    pub is_featured: Option<bool>,
}

fn check_value(value: i64) -> CmsResult<()> {
    if (0..=100).contains(&value) {
        Ok(())
    } else {
        Err(CmsError::Validation(format!(
            "Skill value must be between 0 and 100, got {}",
            value
        )))
    }
}

#[derive(Clone)]
pub struct SkillRepository {
    db: SqlitePool,
}

impl SkillRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewSkill) -> CmsResult<Skill> {
        check_required("name", &new.name)?;
        check_value(new.value)?;

        let now = Utc::now();
        let skill = Skill {
            id: Uuid::new_v4(),
            name: new.name,
            value: new.value,
            icon_url: new.icon_url,
            category: new.category,
            display_order: new.display_order,
            is_featured: new.is_featured,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO portfolio_skills
                (id, name, value, icon_url, category, display_order, is_featured, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(skill.id.to_string())
        .bind(&skill.name)
        .bind(skill.value)
        .bind(&skill.icon_url)
        .bind(&skill.category)
        .bind(skill.display_order)
        .bind(skill.is_featured)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(|e| CmsError::on_unique_violation(e, format!("Skill '{}' already exists", skill.name)))?;

        Ok(skill)
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Skill> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM portfolio_skills WHERE id = ?",
            SKILL_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CmsError::NotFound(format!("Skill {} not found", id)))?;

        skill_from_row(&row)
    }

    pub async fn update(&self, id: Uuid, changes: SkillChanges) -> CmsResult<Skill> {
        let mut skill = self.get(id).await?;

        if let Some(name) = changes.name {
            check_required("name", &name)?;
            skill.name = name;
        }
        if let Some(value) = changes.value {
            check_value(value)?;
            skill.value = value;
        }
        if let Some(icon_url) = changes.icon_url {
            skill.icon_url = icon_url;
        }
        if let Some(category) = changes.category {
            skill.category = category;
        }
        if let Some(display_order) = changes.display_order {
            skill.display_order = display_order;
        }
        if let Some(is_featured) = changes.is_featured {
            skill.is_featured = is_featured;
        }
        skill.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE portfolio_skills
            SET name = ?, value = ?, icon_url = ?, category = ?, display_order = ?,
                is_featured = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&skill.name)
        .bind(skill.value)
        .bind(&skill.icon_url)
        .bind(&skill.category)
        .bind(skill.display_order)
        .bind(skill.is_featured)
        .bind(skill.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.db)
        .await
        .map_err(|e| CmsError::on_unique_violation(e, format!("Skill '{}' already exists", skill.name)))?;

        Ok(skill)
    }

    /// Delete a skill; returns the deleted record
    pub async fn delete(&self, id: Uuid) -> CmsResult<Skill> {
        let skill = self.get(id).await?;

        sqlx::query("DELETE FROM portfolio_skills WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        Ok(skill)
    }

    pub async fn list_all(&self) -> CmsResult<Vec<Skill>> {
        self.list("", None).await
    }

    pub async fn list_featured(&self) -> CmsResult<Vec<Skill>> {
        self.list("WHERE is_featured = 1", None).await
    }

    pub async fn list_by_category(&self, category: &str) -> CmsResult<Vec<Skill>> {
        self.list("WHERE category = ?", Some(category)).await
    }

    async fn list(&self, filter: &str, param: Option<&str>) -> CmsResult<Vec<Skill>> {
        let sql = format!(
            "SELECT {} FROM portfolio_skills {} ORDER BY display_order ASC, created_at DESC",
            SKILL_COLUMNS, filter
        );

        let mut query = sqlx::query(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }

        let rows = query.fetch_all(&self.db).await?;
        rows.iter().map(skill_from_row).collect()
    }
}

fn skill_from_row(row: &SqliteRow) -> CmsResult<Skill> {
    Ok(Skill {
        id: db::get_uuid(row, "id")?,
        name: row.try_get("name")?,
        value: row.try_get("value")?,
        icon_url: row.try_get("icon_url")?,
        category: row.try_get("category")?,
        display_order: row.try_get("display_order")?,
        is_featured: row.try_get("is_featured")?,
        created_at: db::get_timestamp(row, "created_at")?,
        updated_at: db::get_timestamp(row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn skill(name: &str, category: &str, featured: bool) -> NewSkill {
        NewSkill {
            name: name.to_string(),
            value: 80,
            category: category.to_string(),
            is_featured: featured,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let repo = SkillRepository::new(test_pool().await);

        let created = repo.create(skill("Rust", "programming", true)).await.unwrap();
        let updated = repo
            .update(
                created.id,
                SkillChanges {
                    value: Some(95),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.value, 95);
        assert_eq!(updated.name, "Rust");

        repo.delete(created.id).await.unwrap();
        assert!(matches!(repo.get(created.id).await, Err(CmsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_value_range_and_unique_name() {
        let repo = SkillRepository::new(test_pool().await);

        let mut bad = skill("Go", "programming", false);
        bad.value = 101;
        assert!(matches!(repo.create(bad).await, Err(CmsError::Validation(_))));

        repo.create(skill("Go", "programming", false)).await.unwrap();
        assert!(matches!(
            repo.create(skill("Go", "tools", false)).await,
            Err(CmsError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_filters() {
        let repo = SkillRepository::new(test_pool().await);
        repo.create(skill("Rust", "programming", true)).await.unwrap();
        repo.create(skill("Docker", "tools", false)).await.unwrap();
        repo.create(skill("SQL", "programming", false)).await.unwrap();

        assert_eq!(repo.list_all().await.unwrap().len(), 3);
        assert_eq!(repo.list_featured().await.unwrap().len(), 1);
        assert_eq!(repo.list_by_category("programming").await.unwrap().len(), 2);
        assert!(repo.list_by_category("design").await.unwrap().is_empty());
    }
}
