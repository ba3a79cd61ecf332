/// Blog posts and their tags
use super::{check_one_of, check_required, PUBLICATION_STATUSES};
use crate::{
    db,
    error::{CmsError, CmsResult},
    tags::{Tag, TagNamePolicy, Tagging, BLOG_TAGS},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

const POST_COLUMNS: &str = "id, title, content, excerpt, slug, featured_image, publish_date, \
                            status, view_count, created_at, updated_at";

/// Blog post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub slug: String,
    pub featured_image: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub status: String,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<Tag>,
}

/// Fields of a post to create
#[derive(Debug, Clone)]
pub struct NewBlogPost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub slug: String,
    pub featured_image: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub status: String,
}

impl Default for NewBlogPost {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            excerpt: String::new(),
            slug: String::new(),
            featured_image: String::new(),
            publish_date: None,
            status: "draft".to_string(),
        }
    }
}

/// Partial update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct BlogPostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub slug: Option<String>,
    pub featured_image: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

impl BlogPostChanges {
    fn check(&self) -> CmsResult<()> {
        if let Some(title) = &self.title {
            check_required("title", title)?;
        }
        if let Some(slug) = &self.slug {
            check_slug(slug)?;
        }
        if let Some(status) = &self.status {
            check_one_of("status", status, PUBLICATION_STATUSES)?;
        }
        Ok(())
    }

    fn apply(self, post: &mut BlogPost) {
        if let Some(v) = self.title {
            post.title = v;
        }
        if let Some(v) = self.content {
            post.content = v;
        }
        if let Some(v) = self.excerpt {
            post.excerpt = v;
        }
        if let Some(v) = self.slug {
            post.slug = v;
        }
        if let Some(v) = self.featured_image {
            post.featured_image = v;
        }
        if let Some(v) = self.publish_date {
            post.publish_date = Some(v);
        }
        if let Some(v) = self.status {
            post.status = v;
        }
    }
}

/// Slugs are URL path segments: no whitespace, no slashes
fn check_slug(slug: &str) -> CmsResult<()> {
    check_required("slug", slug)?;
    if slug.chars().any(|c| c.is_whitespace() || c == '/' || c == '?' || c == '#') {
        return Err(CmsError::Validation(format!(
            "Slug '{}' may not contain whitespace, '/', '?' or '#'",
            slug
        )));
    }
    Ok(())
}

/// Blog repository
#[derive(Clone)]
pub struct BlogRepository {
    db: SqlitePool,
    tags: Tagging,
}

impl BlogRepository {
    pub fn new(db: SqlitePool, policy: TagNamePolicy) -> Self {
        Self {
            tags: Tagging::new(db.clone(), BLOG_TAGS, policy),
            db,
        }
    }

    pub fn tagging(&self) -> &Tagging {
        &self.tags
    }

    /// Insert a post and attach `tag_names` in one transaction
    pub async fn create_with_tags(&self, new: NewBlogPost, tag_names: &[String]) -> CmsResult<BlogPost> {
        check_required("title", &new.title)?;
        check_slug(&new.slug)?;
        check_one_of("status", &new.status, PUBLICATION_STATUSES)?;

        let now = Utc::now();
        let mut post = BlogPost {
            id: Uuid::new_v4(),
            title: new.title,
            content: new.content,
            excerpt: new.excerpt,
            slug: new.slug,
            featured_image: new.featured_image,
            publish_date: new.publish_date,
            status: new.status,
            view_count: 0,
            created_at: now,
            updated_at: now,
            tags: Vec::new(),
        };

        let mut tx = db::begin_write(&self.db).await?;

        sqlx::query(
            r#"
            INSERT INTO portfolio_blog_posts
                (id, title, content, excerpt, slug, featured_image, publish_date,
                 status, view_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(post.id.to_string())
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.slug)
        .bind(&post.featured_image)
        .bind(post.publish_date.map(|d| d.to_rfc3339()))
        .bind(&post.status)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            CmsError::on_unique_violation(e, format!("Slug '{}' is already in use", post.slug))
        })?;

        post.tags = self.tags.assign(&mut tx, post.id, tag_names).await?;

        tx.commit().await?;

        info!("Created blog post '{}' ({})", post.slug, post.id);
        Ok(post)
    }

    pub async fn get_by_id_with_tags(&self, id: Uuid) -> CmsResult<BlogPost> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM portfolio_blog_posts WHERE id = ?",
            POST_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CmsError::NotFound(format!("Blog post {} not found", id)))?;

        self.with_tags(post_from_row(&row)?).await
    }

    pub async fn get_by_slug_with_tags(&self, slug: &str) -> CmsResult<BlogPost> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM portfolio_blog_posts WHERE slug = ?",
            POST_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CmsError::NotFound(format!("Blog post '{}' not found", slug)))?;

        self.with_tags(post_from_row(&row)?).await
    }

    /// Count one view of a post
    pub async fn increment_view_count(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query(
            "UPDATE portfolio_blog_posts SET view_count = view_count + 1 WHERE id = ?",
        )
        .bind(id.to_string())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Blog post {} not found", id)));
        }

        debug!("Counted view of blog post {}", id);
        Ok(())
    }

    /// Apply scalar changes and, when `tag_names` is given, replace the tag set.
    /// Both happen in one transaction.
    pub async fn update_with_tags(
        &self,
        id: Uuid,
        changes: BlogPostChanges,
        tag_names: Option<&[String]>,
    ) -> CmsResult<BlogPost> {
        changes.check()?;

        let mut tx = db::begin_write(&self.db).await?;

        let mut post = fetch_post(&mut tx, id).await?;
        changes.apply(&mut post);
        post.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE portfolio_blog_posts
            SET title = ?, content = ?, excerpt = ?, slug = ?, featured_image = ?,
                publish_date = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.slug)
        .bind(&post.featured_image)
        .bind(post.publish_date.map(|d| d.to_rfc3339()))
        .bind(&post.status)
        .bind(post.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            CmsError::on_unique_violation(e, format!("Slug '{}' is already in use", post.slug))
        })?;

        post.tags = match tag_names {
            Some(names) => self.tags.assign(&mut tx, id, names).await?,
            None => self.tags.links.tags_for_in(&mut tx, id).await?,
        };

        tx.commit().await?;

        Ok(post)
    }

    /// Remove a post and its tag links; returns the deleted post
    pub async fn delete_with_tags(&self, id: Uuid) -> CmsResult<BlogPost> {
        let mut tx = db::begin_write(&self.db).await?;

        let mut post = fetch_post(&mut tx, id).await?;
        post.tags = self.tags.links.tags_for_in(&mut tx, id).await?;

        self.tags.links.clear(&mut tx, id).await?;
        sqlx::query("DELETE FROM portfolio_blog_posts WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Deleted blog post '{}' ({})", post.slug, id);
        Ok(post)
    }

    /// Every post, newest first
    pub async fn list_all_with_tags(&self) -> CmsResult<Vec<BlogPost>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM portfolio_blog_posts ORDER BY created_at DESC",
            POST_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        self.attach_tags(rows).await
    }

    /// Published posts, most recent publish date first
    pub async fn list_published_with_tags(&self) -> CmsResult<Vec<BlogPost>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM portfolio_blog_posts WHERE status = 'published' \
             ORDER BY publish_date DESC, created_at DESC",
            POST_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        self.attach_tags(rows).await
    }

    async fn with_tags(&self, mut post: BlogPost) -> CmsResult<BlogPost> {
        post.tags = self.tags.links.tags_for(post.id).await?;
        Ok(post)
    }

    async fn attach_tags(&self, rows: Vec<SqliteRow>) -> CmsResult<Vec<BlogPost>> {
        let mut posts = rows
            .iter()
            .map(post_from_row)
            .collect::<CmsResult<Vec<_>>>()?;

        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let mut tags = self.tags.links.tags_for_many(&ids).await?;
        for post in &mut posts {
            post.tags = tags.remove(&post.id).unwrap_or_default();
        }

        Ok(posts)
    }
}

async fn fetch_post(conn: &mut SqliteConnection, id: Uuid) -> CmsResult<BlogPost> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM portfolio_blog_posts WHERE id = ?",
        POST_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| CmsError::NotFound(format!("Blog post {} not found", id)))?;

    post_from_row(&row)
}

fn post_from_row(row: &SqliteRow) -> CmsResult<BlogPost> {
    let publish_date = row
        .try_get::<Option<String>, _>("publish_date")?
        .map(|raw| db::parse_timestamp(&raw))
        .transpose()?;

    Ok(BlogPost {
        id: db::get_uuid(row, "id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        excerpt: row.try_get("excerpt")?,
        slug: row.try_get("slug")?,
        featured_image: row.try_get("featured_image")?,
        publish_date,
        status: row.try_get("status")?,
        view_count: row.try_get("view_count")?,
        created_at: db::get_timestamp(row, "created_at")?,
        updated_at: db::get_timestamp(row, "updated_at")?,
        tags: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use chrono::TimeZone;

    fn tag_names(post: &BlogPost) -> Vec<&str> {
        post.tags.iter().map(|t| t.name.as_str()).collect()
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn new_post(slug: &str, status: &str) -> NewBlogPost {
        NewBlogPost {
            title: format!("Post {}", slug),
            content: "Body".to_string(),
            slug: slug.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_hello_world_scenario() {
        let repo = BlogRepository::new(test_pool().await, TagNamePolicy::Exact);

        let created = repo
            .create_with_tags(new_post("hello-world", "published"), &strings(&["web", "go"]))
            .await
            .unwrap();

        let fetched = repo.get_by_slug_with_tags("hello-world").await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(tag_names(&fetched), vec!["go", "web"]);
        assert_eq!(fetched.view_count, 0);

        repo.increment_view_count(created.id).await.unwrap();
        let viewed = repo.get_by_id_with_tags(created.id).await.unwrap();
        assert_eq!(viewed.view_count, 1);

        let updated = repo
            .update_with_tags(created.id, BlogPostChanges::default(), Some(&strings(&["go"])))
            .await
            .unwrap();
        assert_eq!(tag_names(&updated), vec!["go"]);

        let refetched = repo.get_by_slug_with_tags("hello-world").await.unwrap();
        assert_eq!(tag_names(&refetched), vec!["go"]);
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let repo = BlogRepository::new(test_pool().await, TagNamePolicy::Exact);
        repo.create_with_tags(new_post("same", "draft"), &[]).await.unwrap();

        let result = repo.create_with_tags(new_post("same", "draft"), &[]).await;
        assert!(matches!(result, Err(CmsError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_invalid_slug_rejected() {
        let repo = BlogRepository::new(test_pool().await, TagNamePolicy::Exact);
        let result = repo.create_with_tags(new_post("has space", "draft"), &[]).await;
        assert!(matches!(result, Err(CmsError::Validation(_))));
    }

    #[tokio::test]
    async fn test_published_listing() {
        let repo = BlogRepository::new(test_pool().await, TagNamePolicy::Exact);

        let mut older = new_post("older", "published");
        older.publish_date = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut newer = new_post("newer", "published");
        newer.publish_date = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

        repo.create_with_tags(older, &strings(&["go"])).await.unwrap();
        repo.create_with_tags(newer, &[]).await.unwrap();
        repo.create_with_tags(new_post("draft", "draft"), &strings(&["go"]))
            .await
            .unwrap();

        let published = repo.list_published_with_tags().await.unwrap();
        let slugs: Vec<&str> = published.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["newer", "older"]);
        assert!(published[0].tags.is_empty());
        assert_eq!(tag_names(&published[1]), vec!["go"]);

        assert_eq!(repo.list_all_with_tags().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_then_missing() {
        let repo = BlogRepository::new(test_pool().await, TagNamePolicy::Exact);
        let post = repo
            .create_with_tags(new_post("gone", "draft"), &strings(&["go"]))
            .await
            .unwrap();

        repo.delete_with_tags(post.id).await.unwrap();

        assert!(matches!(
            repo.get_by_id_with_tags(post.id).await,
            Err(CmsError::NotFound(_))
        ));
        assert!(matches!(
            repo.increment_view_count(post.id).await,
            Err(CmsError::NotFound(_))
        ));
        // The tag itself survives
        assert_eq!(repo.tagging().store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_create_then_resolve_reuses_tag() {
        let repo = BlogRepository::new(test_pool().await, TagNamePolicy::Exact);

        let tag = repo.tagging().store.create("rust", None).await.unwrap();
        assert!(matches!(
            repo.tagging().store.create("rust", None).await,
            Err(CmsError::Conflict(_))
        ));

        let post = repo
            .create_with_tags(new_post("p", "draft"), &strings(&["rust"]))
            .await
            .unwrap();
        assert_eq!(post.tags[0].id, tag.id);
    }

    #[tokio::test]
    async fn test_concurrent_tag_updates_all_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = BlogRepository::new(db::file_test_pool(dir.path()).await, TagNamePolicy::Exact);
        let post = repo
            .create_with_tags(new_post("busy", "draft"), &[])
            .await
            .unwrap();

        let id = post.id;
        let updates: Vec<_> = (0..16)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let names = vec![format!("tag-{}", i)];
                    repo.update_with_tags(id, BlogPostChanges::default(), Some(names.as_slice()))
                        .await
                })
            })
            .collect();

        for update in updates {
            update.await.unwrap().unwrap();
        }

        // Whichever update committed last owns the tag set
        let stored = repo.get_by_id_with_tags(post.id).await.unwrap();
        assert_eq!(stored.tags.len(), 1);
        assert!(stored.tags[0].name.starts_with("tag-"));
        assert_eq!(repo.tagging().store.get_all().await.unwrap().len(), 16);
    }
}
