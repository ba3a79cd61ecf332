/// Education history with achievements
use super::check_required;
use crate::{
    db,
    error::{CmsError, CmsResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

const EDUCATION_COLUMNS: &str = "id, school, major, start_year, end_year, description, degree, \
                                 display_order, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub id: Uuid,
    pub school: String,
    pub major: String,
    pub start_year: String,
    pub end_year: String,
    pub description: String,
    pub degree: String,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub education_id: Uuid,
    pub achievement: String,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewEducation {
    pub school: String,
    pub major: String,
    pub start_year: String,
    pub end_year: String,
    pub description: String,
    pub degree: String,
    pub display_order: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAchievement {
    pub achievement: String,
    #[serde(default)]
    pub display_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct EducationChanges {
    pub school: Option<String>,
    pub major: Option<String>,
    pub start_year: Option<String>,
    pub end_year: Option<String>,
    pub description: Option<String>,
    pub degree: Option<String>,
    pub display_order: Option<i64>,
}

impl EducationChanges {
    fn apply(self, education: &mut Education) -> CmsResult<()> {
        if let Some(v) = self.school {
            check_required("school", &v)?;
            education.school = v;
        }
        if let Some(v) = self.major {
            check_required("major", &v)?;
            education.major = v;
        }
        if let Some(v) = self.start_year {
            education.start_year = v;
        }
        if let Some(v) = self.end_year {
            education.end_year = v;
        }
        if let Some(v) = self.description {
            education.description = v;
        }
        if let Some(v) = self.degree {
            education.degree = v;
        }
        if let Some(v) = self.display_order {
            education.display_order = v;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct EducationRepository {
    db: SqlitePool,
}

impl EducationRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert an education entry and its achievements in one transaction
    pub async fn create(&self, new: NewEducation, achievements: &[NewAchievement]) -> CmsResult<Education> {
        check_required("school", &new.school)?;
        check_required("major", &new.major)?;

        let now = Utc::now();
        let mut education = Education {
            id: Uuid::new_v4(),
            school: new.school,
            major: new.major,
            start_year: new.start_year,
            end_year: new.end_year,
            description: new.description,
            degree: new.degree,
            display_order: new.display_order,
            created_at: now,
            updated_at: now,
            achievements: Vec::new(),
        };

        let mut tx = db::begin_write(&self.db).await?;

        sqlx::query(
            r#"
            INSERT INTO portfolio_education
                (id, school, major, start_year, end_year, description, degree,
                 display_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(education.id.to_string())
        .bind(&education.school)
        .bind(&education.major)
        .bind(&education.start_year)
        .bind(&education.end_year)
        .bind(&education.description)
        .bind(&education.degree)
        .bind(education.display_order)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        education.achievements = replace_achievements(&mut tx, education.id, achievements).await?;

        tx.commit().await?;

        Ok(education)
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Education> {
        let mut conn = self.db.acquire().await?;
        let mut education = fetch_education(&mut conn, id).await?;
        education.achievements = achievements_for(&mut conn, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        Ok(education)
    }

    /// Apply changes; a given achievement list replaces the stored one
    pub async fn update(
        &self,
        id: Uuid,
        changes: EducationChanges,
        achievements: Option<&[NewAchievement]>,
    ) -> CmsResult<Education> {
        let mut tx = db::begin_write(&self.db).await?;

        let mut education = fetch_education(&mut tx, id).await?;
        changes.apply(&mut education)?;
        education.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE portfolio_education
            SET school = ?, major = ?, start_year = ?, end_year = ?, description = ?,
                degree = ?, display_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&education.school)
        .bind(&education.major)
        .bind(&education.start_year)
        .bind(&education.end_year)
        .bind(&education.description)
        .bind(&education.degree)
        .bind(education.display_order)
        .bind(education.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        education.achievements = match achievements {
            Some(list) => replace_achievements(&mut tx, id, list).await?,
            None => achievements_for(&mut tx, &[id])
                .await?
                .remove(&id)
                .unwrap_or_default(),
        };

        tx.commit().await?;

        Ok(education)
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let mut tx = db::begin_write(&self.db).await?;

        sqlx::query("DELETE FROM education_achievements WHERE education_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM portfolio_education WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Education {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Every entry with achievements, loaded in two queries
    pub async fn list_all(&self) -> CmsResult<Vec<Education>> {
        let mut conn = self.db.acquire().await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM portfolio_education ORDER BY display_order ASC, created_at DESC",
            EDUCATION_COLUMNS
        ))
        .fetch_all(&mut *conn)
        .await?;

        let mut entries = rows
            .iter()
            .map(education_from_row)
            .collect::<CmsResult<Vec<_>>>()?;

        let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
        let mut grouped = achievements_for(&mut conn, &ids).await?;
        for entry in &mut entries {
            entry.achievements = grouped.remove(&entry.id).unwrap_or_default();
        }

        Ok(entries)
    }
}

async fn fetch_education(conn: &mut SqliteConnection, id: Uuid) -> CmsResult<Education> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM portfolio_education WHERE id = ?",
        EDUCATION_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| CmsError::NotFound(format!("Education {} not found", id)))?;

    education_from_row(&row)
}

async fn replace_achievements(
    conn: &mut SqliteConnection,
    education_id: Uuid,
    achievements: &[NewAchievement],
) -> CmsResult<Vec<Achievement>> {
    sqlx::query("DELETE FROM education_achievements WHERE education_id = ?")
        .bind(education_id.to_string())
        .execute(&mut *conn)
        .await?;

    let now = Utc::now();
    let mut stored = Vec::with_capacity(achievements.len());
    for item in achievements {
        check_required("achievement", &item.achievement)?;

        let achievement = Achievement {
            id: Uuid::new_v4(),
            education_id,
            achievement: item.achievement.clone(),
            display_order: item.display_order,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO education_achievements (id, education_id, achievement, display_order, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(achievement.id.to_string())
        .bind(education_id.to_string())
        .bind(&achievement.achievement)
        .bind(achievement.display_order)
        .bind(now.to_rfc3339())
        .execute(&mut *conn)
        .await?;

        stored.push(achievement);
    }

    stored.sort_by_key(|a| a.display_order);
    Ok(stored)
}

async fn achievements_for(
    conn: &mut SqliteConnection,
    ids: &[Uuid],
) -> CmsResult<HashMap<Uuid, Vec<Achievement>>> {
    let mut grouped: HashMap<Uuid, Vec<Achievement>> = HashMap::new();
    if ids.is_empty() {
        return Ok(grouped);
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id, education_id, achievement, display_order, created_at \
         FROM education_achievements WHERE education_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id.to_string());
    }
    separated.push_unseparated(") ORDER BY display_order ASC, created_at ASC");

    let rows = query.build().fetch_all(conn).await?;
    for row in &rows {
        let achievement = Achievement {
            id: db::get_uuid(row, "id")?,
            education_id: db::get_uuid(row, "education_id")?,
            achievement: row.try_get("achievement")?,
            display_order: row.try_get("display_order")?,
            created_at: db::get_timestamp(row, "created_at")?,
        };
        grouped
            .entry(achievement.education_id)
            .or_default()
            .push(achievement);
    }

    Ok(grouped)
}

fn education_from_row(row: &SqliteRow) -> CmsResult<Education> {
    Ok(Education {
        id: db::get_uuid(row, "id")?,
        school: row.try_get("school")?,
        major: row.try_get("major")?,
        start_year: row.try_get("start_year")?,
        end_year: row.try_get("end_year")?,
        description: row.try_get("description")?,
        degree: row.try_get("degree")?,
        display_order: row.try_get("display_order")?,
        created_at: db::get_timestamp(row, "created_at")?,
        updated_at: db::get_timestamp(row, "updated_at")?,
        achievements: Vec::new(),
    })
}
