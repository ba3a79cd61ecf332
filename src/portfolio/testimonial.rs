/// Client testimonials with moderation status
use super::{check_one_of, check_required, TESTIMONIAL_STATUSES};
use crate::{
    db,
    error::{CmsError, CmsResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const TESTIMONIAL_COLUMNS: &str =
    "id, name, title, message, avatar_url, rating, is_featured, display_order, status, created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub message: String,
    pub avatar_url: String,
    pub rating: i64,
    pub is_featured: bool,
    pub display_order: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTestimonial {
    pub name: String,
    pub title: String,
    pub message: String,
    pub avatar_url: String,
    pub rating: i64,
    pub is_featured: bool,
    pub display_order: i64,
    pub status: String,
}

impl Default for NewTestimonial {
    fn default() -> Self {
        Self {
            name: String::new(),
            title: String::new(),
            message: String::new(),
            avatar_url: String::new(),
            rating: 5,
            is_featured: false,
            display_order: 0,
            status: "approved".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestimonialChanges {
    pub name: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub avatar_url: Option<String>,
    pub rating: Option<i64>,
    pub is_featured: Option<bool>,
    pub display_order: Option<i64>,
    pub status: Option<String>,
}

fn check_rating(rating: i64) -> CmsResult<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(CmsError::Validation(format!(
            "Rating must be between 1 and 5, got {}",
            rating
        )))
    }
}

#[derive(Clone)]
pub struct TestimonialRepository {
    db: SqlitePool,
}

impl TestimonialRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewTestimonial) -> CmsResult<Testimonial> {
        check_required("name", &new.name)?;
        check_required("message", &new.message)?;
        check_rating(new.rating)?;
        check_one_of("status", &new.status, TESTIMONIAL_STATUSES)?;

        let testimonial = Testimonial {
            id: Uuid::new_v4(),
            name: new.name,
            title: new.title,
            message: new.message,
            avatar_url: new.avatar_url,
            rating: new.rating,
            is_featured: new.is_featured,
            display_order: new.display_order,
            status: new.status,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO portfolio_testimonials
                (id, name, title, message, avatar_url, rating, is_featured, display_order,
                 status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(testimonial.id.to_string())
        .bind(&testimonial.name)
        .bind(&testimonial.title)
        .bind(&testimonial.message)
        .bind(&testimonial.avatar_url)
        .bind(testimonial.rating)
        .bind(testimonial.is_featured)
        .bind(testimonial.display_order)
        .bind(&testimonial.status)
        .bind(testimonial.created_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(testimonial)
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Testimonial> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM portfolio_testimonials WHERE id = ?",
            TESTIMONIAL_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CmsError::NotFound(format!("Testimonial {} not found", id)))?;

        testimonial_from_row(&row)
    }

    pub async fn update(&self, id: Uuid, changes: TestimonialChanges) -> CmsResult<Testimonial> {
        let mut testimonial = self.get(id).await?;

        if let Some(name) = changes.name {
            check_required("name", &name)?;
            testimonial.name = name;
        }
        if let Some(title) = changes.title {
            testimonial.title = title;
        }
        if let Some(message) = changes.message {
            check_required("message", &message)?;
            testimonial.message = message;
        }
        if let Some(avatar_url) = changes.avatar_url {
            testimonial.avatar_url = avatar_url;
        }
        if let Some(rating) = changes.rating {
            check_rating(rating)?;
            testimonial.rating = rating;
        }
        if let Some(is_featured) = changes.is_featured {
            testimonial.is_featured = is_featured;
        }
        if let Some(display_order) = changes.display_order {
            testimonial.display_order = display_order;
        }
        if let Some(status) = changes.status {
            check_one_of("status", &status, TESTIMONIAL_STATUSES)?;
            testimonial.status = status;
        }

        sqlx::query(
            r#"
            UPDATE portfolio_testimonials
            SET name = ?, title = ?, message = ?, avatar_url = ?, rating = ?,
                is_featured = ?, display_order = ?, status = ?
            WHERE id = ?
            "#,
        )
        .bind(&testimonial.name)
        .bind(&testimonial.title)
        .bind(&testimonial.message)
        .bind(&testimonial.avatar_url)
        .bind(testimonial.rating)
        .bind(testimonial.is_featured)
        .bind(testimonial.display_order)
        .bind(&testimonial.status)
        .bind(id.to_string())
        .execute(&self.db)
        .await?;

        Ok(testimonial)
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query("DELETE FROM portfolio_testimonials WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Testimonial {} not found", id)));
        }
        Ok(())
    }

    pub async fn list_all(&self) -> CmsResult<Vec<Testimonial>> {
        self.list("", None).await
    }

    /// Featured and approved, ready to display
    pub async fn list_featured(&self) -> CmsResult<Vec<Testimonial>> {
        self.list("WHERE is_featured = 1 AND status = 'approved'", None)
            .await
    }

    pub async fn list_by_status(&self, status: &str) -> CmsResult<Vec<Testimonial>> {
        check_one_of("status", status, TESTIMONIAL_STATUSES)?;
        self.list("WHERE status = ?", Some(status)).await
    }

    async fn list(&self, filter: &str, param: Option<&str>) -> CmsResult<Vec<Testimonial>> {
        let sql = format!(
            "SELECT {} FROM portfolio_testimonials {} ORDER BY display_order ASC, created_at DESC",
            TESTIMONIAL_COLUMNS, filter
        );

        let mut query = sqlx::query(&sql);
        if let Some(param) = param {
            query = query.bind(param);
        }

        let rows = query.fetch_all(&self.db).await?;
        rows.iter().map(testimonial_from_row).collect()
    }
}

fn testimonial_from_row(row: &SqliteRow) -> CmsResult<Testimonial> {
    Ok(Testimonial {
        id: db::get_uuid(row, "id")?,
        name: row.try_get("name")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        avatar_url: row.try_get("avatar_url")?,
        rating: row.try_get("rating")?,
        is_featured: row.try_get("is_featured")?,
        display_order: row.try_get("display_order")?,
        status: row.try_get("status")?,
        created_at: db::get_timestamp(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn testimonial(name: &str, status: &str, featured: bool) -> NewTestimonial {
        NewTestimonial {
            name: name.to_string(),
            message: "Great work".to_string(),
            status: status.to_string(),
            is_featured: featured,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_defaults_and_update() {
        let repo = TestimonialRepository::new(test_pool().await);

        let created = repo
            .create(NewTestimonial {
                name: "Dana".to_string(),
                message: "Delivered on time".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(created.rating, 5);
        assert_eq!(created.status, "approved");

        let updated = repo
            .update(
                created.id,
                TestimonialChanges {
                    status: Some("rejected".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, "rejected");
        assert_eq!(repo.get(created.id).await.unwrap().status, "rejected");
    }

    #[tokio::test]
    async fn test_validation() {
        let repo = TestimonialRepository::new(test_pool().await);

        let mut bad_rating = testimonial("A", "approved", false);
        bad_rating.rating = 0;
        assert!(matches!(repo.create(bad_rating).await, Err(CmsError::Validation(_))));

        assert!(matches!(
            repo.create(testimonial("A", "spam", false)).await,
            Err(CmsError::Validation(_))
        ));
        assert!(matches!(
            repo.list_by_status("spam").await,
            Err(CmsError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_filters_and_delete() {
        let repo = TestimonialRepository::new(test_pool().await);
        let shown = repo.create(testimonial("A", "approved", true)).await.unwrap();
        repo.create(testimonial("B", "pending", true)).await.unwrap();
        repo.create(testimonial("C", "approved", false)).await.unwrap();

        let featured = repo.list_featured().await.unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].id, shown.id);
        assert_eq!(repo.list_by_status("pending").await.unwrap().len(), 1);
        assert_eq!(repo.list_all().await.unwrap().len(), 3);

        repo.delete(shown.id).await.unwrap();
        assert!(matches!(repo.delete(shown.id).await, Err(CmsError::NotFound(_))));
    }
}
