/// Portfolio projects and their tags
use super::{check_one_of, check_required, PUBLICATION_STATUSES};
use crate::{
    db,
    error::{CmsError, CmsResult},
    tags::{Tag, TagNamePolicy, Tagging, PROJECT_TAGS},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Portfolio project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub demo_url: String,
    pub code_url: String,
    pub display_order: i64,
    pub is_featured: bool,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

/// Fields of a project to create
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub demo_url: String,
    pub code_url: String,
    pub display_order: i64,
    pub is_featured: bool,
    pub status: String,
}

impl Default for NewProject {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            image_url: String::new(),
            demo_url: "#".to_string(),
            code_url: "#".to_string(),
            display_order: 0,
            is_featured: false,
            status: "published".to_string(),
        }
    }
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub demo_url: Option<String>,
    pub code_url: Option<String>,
    pub display_order: Option<i64>,
    pub is_featured: Option<bool>,
    pub status: Option<String>,
}

impl ProjectChanges {
    fn apply(self, project: &mut Project) {
        if let Some(v) = self.title {
            project.title = v;
        }
        if let Some(v) = self.description {
            project.description = v;
        }
        if let Some(v) = self.image_url {
            project.image_url = v;
        }
        if let Some(v) = self.demo_url {
            project.demo_url = v;
        }
        if let Some(v) = self.code_url {
            project.code_url = v;
        }
        if let Some(v) = self.display_order {
            project.display_order = v;
        }
        if let Some(v) = self.is_featured {
            project.is_featured = v;
        }
        if let Some(v) = self.status {
            project.status = v;
        }
    }
}

/// Project repository
#[derive(Clone)]
pub struct ProjectRepository {
    db: SqlitePool,
    tags: Tagging,
}

impl ProjectRepository {
    pub fn new(db: SqlitePool, policy: TagNamePolicy) -> Self {
        Self {
            tags: Tagging::new(db.clone(), PROJECT_TAGS, policy),
            db,
        }
    }

    /// Project tag store and links, for the tag endpoints
    pub fn tagging(&self) -> &Tagging {
        &self.tags
    }

    /// Insert a project and attach `tag_names` in one transaction
    pub async fn create_with_tags(&self, new: NewProject, tag_names: &[String]) -> CmsResult<Project> {
        check_required("title", &new.title)?;
        check_one_of("status", &new.status, PUBLICATION_STATUSES)?;

        let now = Utc::now();
        let mut project = Project {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            image_url: new.image_url,
            demo_url: new.demo_url,
            code_url: new.code_url,
            display_order: new.display_order,
            is_featured: new.is_featured,
            status: new.status,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        };

        let mut tx = db::begin_write(&self.db).await?;

        sqlx::query(
            r#"
            INSERT INTO portfolio_projects
                (id, title, description, image_url, demo_url, code_url,
                 display_order, is_featured, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project.id.to_string())
        .bind(&project.title)
        .bind(&project.description)
        .bind(&project.image_url)
        .bind(&project.demo_url)
        .bind(&project.code_url)
        .bind(project.display_order)
        .bind(project.is_featured)
        .bind(&project.status)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        project.tags = self.tags.assign(&mut tx, project.id, tag_names).await?;

        tx.commit().await?;

        info!("Created project {} ({})", project.title, project.id);
        Ok(project)
    }

    pub async fn get_by_id_with_tags(&self, id: Uuid) -> CmsResult<Project> {
        let mut project = {
            let mut conn = self.db.acquire().await?;
            fetch_project(&mut conn, id).await?
        };
        project.tags = self.tags.links.tags_for(id).await?;
        Ok(project)
    }

    /// Apply scalar changes and, when `tag_names` is given, replace the tag set.
    /// Both happen in one transaction.
    pub async fn update_with_tags(
        &self,
        id: Uuid,
        changes: ProjectChanges,
        tag_names: Option<&[String]>,
    ) -> CmsResult<Project> {
        if let Some(title) = &changes.title {
            check_required("title", title)?;
        }
        if let Some(status) = &changes.status {
            check_one_of("status", status, PUBLICATION_STATUSES)?;
        }

        let mut tx = db::begin_write(&self.db).await?;

        let mut project = fetch_project(&mut tx, id).await?;
        changes.apply(&mut project);
        project.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE portfolio_projects
            SET title = ?, description = ?, image_url = ?, demo_url = ?, code_url = ?,
                display_order = ?, is_featured = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&project.title)
        .bind(&project.description)
        .bind(&project.image_url)
        .bind(&project.demo_url)
        .bind(&project.code_url)
        .bind(project.display_order)
        .bind(project.is_featured)
        .bind(&project.status)
        .bind(project.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        project.tags = match tag_names {
            Some(names) => self.tags.assign(&mut tx, id, names).await?,
            None => self.tags.links.tags_for_in(&mut tx, id).await?,
        };

        tx.commit().await?;

        Ok(project)
    }

    /// Remove a project and its tag links; returns the deleted project
    pub async fn delete_with_tags(&self, id: Uuid) -> CmsResult<Project> {
        let mut tx = db::begin_write(&self.db).await?;

        let mut project = fetch_project(&mut tx, id).await?;
        project.tags = self.tags.links.tags_for_in(&mut tx, id).await?;

        self.tags.links.clear(&mut tx, id).await?;
        sqlx::query("DELETE FROM portfolio_projects WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Deleted project {} ({})", project.title, id);
        Ok(project)
    }

    /// All projects by display order; tags are loaded in one extra query when requested
    pub async fn list_all(&self, with_tags: bool) -> CmsResult<Vec<Project>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, description, image_url, demo_url, code_url,
                   display_order, is_featured, status, created_at, updated_at
            FROM portfolio_projects
            ORDER BY display_order ASC, created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut projects = rows
            .iter()
            .map(project_from_row)
            .collect::<CmsResult<Vec<_>>>()?;

        if with_tags {
            let ids: Vec<Uuid> = projects.iter().map(|p| p.id).collect();
            let mut tags = self.tags.links.tags_for_many(&ids).await?;
            for project in &mut projects {
                project.tags = tags.remove(&project.id).unwrap_or_default();
            }
        }

        Ok(projects)
    }

    pub async fn list_all_with_tags(&self) -> CmsResult<Vec<Project>> {
        self.list_all(true).await
    }

    /// Link an existing tag; linking twice is a conflict
    pub async fn add_tag(&self, id: Uuid, tag_id: Uuid) -> CmsResult<Project> {
        // Both must exist before linking
        self.get_by_id_with_tags(id).await?;
        self.tags.store.get(tag_id).await?;

        if !self.tags.links.link(id, tag_id).await? {
            return Err(CmsError::Conflict(
                "Tag is already linked to this project".to_string(),
            ));
        }

        self.get_by_id_with_tags(id).await
    }

    pub async fn remove_tag(&self, id: Uuid, tag_id: Uuid) -> CmsResult<Project> {
        self.get_by_id_with_tags(id).await?;

        if !self.tags.links.unlink(id, tag_id).await? {
            return Err(CmsError::NotFound(
                "Tag is not linked to this project".to_string(),
            ));
        }

        self.get_by_id_with_tags(id).await
    }
}

async fn fetch_project(conn: &mut SqliteConnection, id: Uuid) -> CmsResult<Project> {
    let row = sqlx::query(
        r#"
        SELECT id, title, description, image_url, demo_url, code_url,
               display_order, is_featured, status, created_at, updated_at
        FROM portfolio_projects
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| CmsError::NotFound(format!("Project {} not found", id)))?;

    project_from_row(&row)
}

fn project_from_row(row: &SqliteRow) -> CmsResult<Project> {
    Ok(Project {
        id: db::get_uuid(row, "id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        demo_url: row.try_get("demo_url")?,
        code_url: row.try_get("code_url")?,
        display_order: row.try_get("display_order")?,
        is_featured: row.try_get("is_featured")?,
        status: row.try_get("status")?,
        created_at: db::get_timestamp(row, "created_at")?,
        updated_at: db::get_timestamp(row, "updated_at")?,
        tags: Vec::new(),
    })
}
