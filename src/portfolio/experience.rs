/// Work experience with responsibilities and skills
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

const EXPERIENCE_COLUMNS: &str = "id, title, company, location, start_year, end_year, current_job, \
                                  display_order, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub start_year: String,
    pub end_year: String,
    pub current_job: bool,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub responsibilities: Vec<Responsibility>,
    pub skills: Vec<ExperienceSkill>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Responsibility {
    pub id: Uuid,
    pub experience_id: Uuid,
    pub description: String,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceSkill {
    pub experience_id: Uuid,
    pub skill_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewExperience {
    pub title: String,
    pub company: String,
    pub location: String,
    pub start_year: String,
    pub end_year: String,
    pub current_job: bool,
    pub display_order: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewResponsibility {
    pub description: String,
    #[serde(default)]
    pub display_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ExperienceChanges {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub start_year: Option<String>,
    pub end_year: Option<String>,
    pub current_job: Option<bool>,
    pub display_order: Option<i64>,
}

/// Child rows of an experience; a `None` list is left as stored
#[derive(Debug, Clone, Default)]
pub struct ExperienceRelations<'a> {
    pub responsibilities: Option<&'a [NewResponsibility]>,
    pub skills: Option<&'a [String]>,
}

#[derive(Clone)]
pub struct ExperienceRepository {
    db: SqlitePool,
}

impl ExperienceRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        new: NewExperience,
        responsibilities: &[NewResponsibility],
        skills: &[String],
    ) -> CmsResult<Experience> {
        for (field, value) in [
            ("title", &new.title),
            ("company", &new.company),
            ("location", &new.location),
            ("start_year", &new.start_year),
        ] {
            check_required(field, value)?;
        }

        let now = Utc::now();
        let mut experience = Experience {
            id: Uuid::new_v4(),
            title: new.title,
            company: new.company,
            location: new.location,
            start_year: new.start_year,
            end_year: new.end_year,
            current_job: new.current_job,
            display_order: new.display_order,
            created_at: now,
            updated_at: now,
            responsibilities: Vec::new(),
            skills: Vec::new(),
        };

        let mut tx = db::begin_write(&self.db).await?;

        sqlx::query(
            r#"
            INSERT INTO portfolio_experiences
                (id, title, company, location, start_year, end_year, current_job,
                 display_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(experience.id.to_string())
        .bind(&experience.title)
        .bind(&experience.company)
        .bind(&experience.location)
        .bind(&experience.start_year)
        .bind(&experience.end_year)
        .bind(experience.current_job)
        .bind(experience.display_order)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        experience.responsibilities =
            replace_responsibilities(&mut tx, experience.id, responsibilities).await?;
        experience.skills = replace_skills(&mut tx, experience.id, skills).await?;

        tx.commit().await?;

        Ok(experience)
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Experience> {
        let mut conn = self.db.acquire().await?;
        let experience = fetch_experience(&mut conn, id).await?;
        let mut loaded = load_relations(&mut conn, vec![experience]).await?;
        loaded
            .pop()
            .ok_or_else(|| CmsError::NotFound(format!("Experience {} not found", id)))
    }

    pub async fn update(
        &self,
        id: Uuid,
        changes: ExperienceChanges,
        relations: ExperienceRelations<'_>,
    ) -> CmsResult<Experience> {
        let mut tx = db::begin_write(&self.db).await?;

        let mut experience = fetch_experience(&mut tx, id).await?;
        if let Some(v) = changes.title {
            check_required("title", &v)?;
            experience.title = v;
        }
        if let Some(v) = changes.company {
            check_required("company", &v)?;
            experience.company = v;
        }
        if let Some(v) = changes.location {
            experience.location = v;
        }
        if let Some(v) = changes.start_year {
            experience.start_year = v;
        }
        if let Some(v) = changes.end_year {
            experience.end_year = v;
        }
        if let Some(v) = changes.current_job {
            experience.current_job = v;
        }
        if let Some(v) = changes.display_order {
            experience.display_order = v;
        }
        experience.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE portfolio_experiences
            SET title = ?, company = ?, location = ?, start_year = ?, end_year = ?,
                current_job = ?, display_order = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&experience.title)
        .bind(&experience.company)
        .bind(&experience.location)
        .bind(&experience.start_year)
        .bind(&experience.end_year)
        .bind(experience.current_job)
        .bind(experience.display_order)
        .bind(experience.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if let Some(list) = relations.responsibilities {
            replace_responsibilities(&mut tx, id, list).await?;
        }
        if let Some(list) = relations.skills {
            replace_skills(&mut tx, id, list).await?;
        }

        let mut loaded = load_relations(&mut tx, vec![experience]).await?;
        tx.commit().await?;

        loaded
            .pop()
            .ok_or_else(|| CmsError::NotFound(format!("Experience {} not found", id)))
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let mut tx = db::begin_write(&self.db).await?;

        for sql in [
            "DELETE FROM experience_responsibilities WHERE experience_id = ?",
            "DELETE FROM experience_skills WHERE experience_id = ?",
        ] {
            sqlx::query(sql)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM portfolio_experiences WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Experience {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Every experience with its relations, three queries in total
    pub async fn list_all(&self) -> CmsResult<Vec<Experience>> {
        let mut conn = self.db.acquire().await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM portfolio_experiences ORDER BY display_order ASC, created_at DESC",
            EXPERIENCE_COLUMNS
        ))
        .fetch_all(&mut *conn)
        .await?;

        let experiences = rows
            .iter()
            .map(experience_from_row)
            .collect::<CmsResult<Vec<_>>>()?;

        load_relations(&mut conn, experiences).await
    }
}

async fn fetch_experience(conn: &mut SqliteConnection, id: Uuid) -> CmsResult<Experience> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM portfolio_experiences WHERE id = ?",
        EXPERIENCE_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| CmsError::NotFound(format!("Experience {} not found", id)))?;

    experience_from_row(&row)
}

async fn replace_responsibilities(
    conn: &mut SqliteConnection,
    experience_id: Uuid,
    items: &[NewResponsibility],
) -> CmsResult<Vec<Responsibility>> {
    sqlx::query("DELETE FROM experience_responsibilities WHERE experience_id = ?")
        .bind(experience_id.to_string())
        .execute(&mut *conn)
        .await?;

    let now = Utc::now();
    let mut stored = Vec::with_capacity(items.len());
    for item in items {
        check_required("description", &item.description)?;

        let responsibility = Responsibility {
            id: Uuid::new_v4(),
            experience_id,
            description: item.description.clone(),
            display_order: item.display_order,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO experience_responsibilities
                (id, experience_id, description, display_order, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(responsibility.id.to_string())
        .bind(experience_id.to_string())
        .bind(&responsibility.description)
        .bind(responsibility.display_order)
        .bind(now.to_rfc3339())
        .execute(&mut *conn)
        .await?;

        stored.push(responsibility);
    }

    stored.sort_by_key(|r| r.display_order);
    Ok(stored)
}

/// Replace the skill names; repeated names collapse into one row
async fn replace_skills(
    conn: &mut SqliteConnection,
    experience_id: Uuid,
    names: &[String],
) -> CmsResult<Vec<ExperienceSkill>> {
    sqlx::query("DELETE FROM experience_skills WHERE experience_id = ?")
        .bind(experience_id.to_string())
        .execute(&mut *conn)
        .await?;

    let mut stored: Vec<ExperienceSkill> = Vec::with_capacity(names.len());
    for name in names {
        check_required("skill_name", name)?;

        let result = sqlx::query(
            "INSERT INTO experience_skills (experience_id, skill_name) VALUES (?, ?) \
             ON CONFLICT DO NOTHING",
        )
        .bind(experience_id.to_string())
        .bind(name)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            stored.push(ExperienceSkill {
                experience_id,
                skill_name: name.clone(),
            });
        }
    }

    stored.sort_by(|a, b| a.skill_name.cmp(&b.skill_name));
    Ok(stored)
}

async fn load_relations(
    conn: &mut SqliteConnection,
    mut experiences: Vec<Experience>,
) -> CmsResult<Vec<Experience>> {
    if experiences.is_empty() {
        return Ok(experiences);
    }

    let ids: Vec<String> = experiences.iter().map(|e| e.id.to_string()).collect();

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT id, experience_id, description, display_order, created_at \
         FROM experience_responsibilities WHERE experience_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in &ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(") ORDER BY display_order ASC, created_at ASC");
    let rows = query.build().fetch_all(&mut *conn).await?;

    let mut responsibilities: HashMap<Uuid, Vec<Responsibility>> = HashMap::new();
    for row in &rows {
        let item = Responsibility {
            id: db::get_uuid(row, "id")?,
            experience_id: db::get_uuid(row, "experience_id")?,
            description: row.try_get("description")?,
            display_order: row.try_get("display_order")?,
            created_at: db::get_timestamp(row, "created_at")?,
        };
        responsibilities.entry(item.experience_id).or_default().push(item);
    }

    let mut query = QueryBuilder::<Sqlite>::new(
        "SELECT experience_id, skill_name FROM experience_skills WHERE experience_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in &ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(") ORDER BY skill_name ASC");
    let rows = query.build().fetch_all(&mut *conn).await?;

    let mut skills: HashMap<Uuid, Vec<ExperienceSkill>> = HashMap::new();
    for row in &rows {
        let item = ExperienceSkill {
            experience_id: db::get_uuid(row, "experience_id")?,
            skill_name: row.try_get("skill_name")?,
        };
        skills.entry(item.experience_id).or_default().push(item);
    }

    for experience in &mut experiences {
        experience.responsibilities = responsibilities.remove(&experience.id).unwrap_or_default();
        experience.skills = skills.remove(&experience.id).unwrap_or_default();
    }

    Ok(experiences)
}

fn experience_from_row(row: &SqliteRow) -> CmsResult<Experience> {
    Ok(Experience {
        id: db::get_uuid(row, "id")?,
        title: row.try_get("title")?,
        company: row.try_get("company")?,
        location: row.try_get("location")?,
        start_year: row.try_get("start_year")?,
        end_year: row.try_get("end_year")?,
        current_job: row.try_get("current_job")?,
        display_order: row.try_get("display_order")?,
        created_at: db::get_timestamp(row, "created_at")?,
        updated_at: db::get_timestamp(row, "updated_at")?,
        responsibilities: Vec::new(),
        skills: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn job(title: &str) -> NewExperience {
        NewExperience {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            start_year: "2021".to_string(),
            end_year: "Present".to_string(),
            current_job: true,
            display_order: 0,
        }
    }

    fn duty(text: &str, order: i64) -> NewResponsibility {
        NewResponsibility {
            description: text.to_string(),
            display_order: order,
        }
    }

    fn skill_names(experience: &Experience) -> Vec<&str> {
        experience.skills.iter().map(|s| s.skill_name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_collapses_duplicate_skills() {
        let repo = ExperienceRepository::new(test_pool().await);

        let created = repo
            .create(
                job("Backend Engineer"),
                &[duty("Build APIs", 1), duty("Review code", 2)],
                &["Rust".to_string(), "SQL".to_string(), "Rust".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(created.responsibilities.len(), 2);
        assert_eq!(skill_names(&created), vec!["Rust", "SQL"]);

        let fetched = repo.get(created.id).await.unwrap();
        assert_eq!(skill_names(&fetched), vec!["Rust", "SQL"]);
        assert_eq!(fetched.responsibilities[0].description, "Build APIs");
    }

    #[tokio::test]
    async fn test_update_replaces_only_given_relations() {
        let repo = ExperienceRepository::new(test_pool().await);
        let created = repo
            .create(job("Engineer"), &[duty("Ship", 0)], &["Go".to_string()])
            .await
            .unwrap();

        let skills = vec!["Rust".to_string()];
        let updated = repo
            .update(
                created.id,
                ExperienceChanges {
                    current_job: Some(false),
                    end_year: Some("2024".to_string()),
                    ..Default::default()
                },
                ExperienceRelations {
                    responsibilities: None,
                    skills: Some(&skills),
                },
            )
            .await
            .unwrap();

        assert!(!updated.current_job);
        assert_eq!(updated.responsibilities.len(), 1);
        assert_eq!(skill_names(&updated), vec!["Rust"]);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let repo = ExperienceRepository::new(test_pool().await);
        let a = repo
            .create(job("A"), &[duty("x", 0)], &["Go".to_string()])
            .await
            .unwrap();
        repo.create(job("B"), &[], &[]).await.unwrap();

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|e| e.id == a.id && e.skills.len() == 1));

        repo.delete(a.id).await.unwrap();
        assert!(matches!(repo.get(a.id).await, Err(CmsError::NotFound(_))));
        assert!(matches!(repo.delete(a.id).await, Err(CmsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_required_fields() {
        let repo = ExperienceRepository::new(test_pool().await);
        let mut new = job("A");
        new.company = " ".to_string();

        assert!(matches!(
            repo.create(new, &[], &[]).await,
            Err(CmsError::Validation(_))
        ));
    }
}
