/// Tag records of one family
use super::{Tag, TagFamily, TagNamePolicy};
use crate::{
    db,
    error::{is_unique_violation, CmsError, CmsResult},
};
use sqlx::{sqlite::SqliteRow, Connection, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

/// Uniquely named tags, created on first reference
#[derive(Clone)]
pub struct TagStore {
    db: SqlitePool,
    family: TagFamily,
    policy: TagNamePolicy,
}

impl TagStore {
    pub fn new(db: SqlitePool, family: TagFamily, policy: TagNamePolicy) -> Self {
        Self { db, family, policy }
    }

    pub fn family(&self) -> &TagFamily {
        &self.family
    }

    /// Get-or-create a tag by name inside the caller's transaction.
    ///
    /// Repeated calls with the same name in one transaction return the same
    /// record. Callers pass a transaction from `db::begin_write`, so writers
    /// are serialized and a later one finds the earlier one's tag. Should the
    /// insert still hit the unique index, the stored row is read back instead
    /// of failing.
    pub async fn resolve(&self, tx: &mut Transaction<'_, Sqlite>, raw_name: &str) -> CmsResult<Tag> {
        let name = self.policy.apply(raw_name)?;

        if let Some(tag) = self.find_by_name(&mut **tx, &name).await? {
            return Ok(tag);
        }

        self.insert_or_reuse(tx, Tag::new(&self.family, name, None)).await
    }

    /// Insert `tag` under a savepoint; when its name already exists, roll the
    /// savepoint back and return the stored row instead.
    async fn insert_or_reuse(&self, tx: &mut Transaction<'_, Sqlite>, tag: Tag) -> CmsResult<Tag> {
        let mut savepoint = Connection::begin(&mut **tx).await?;
        match self.insert(&mut *savepoint, &tag).await {
            Ok(()) => {
                savepoint.commit().await?;
                debug!("Created {} tag '{}' ({})", self.family.label, tag.name, tag.id);
                Ok(tag)
            }
            Err(e) if is_unique_violation(&e) => {
                savepoint.rollback().await?;
                debug!(
                    "{} tag '{}' was created concurrently, reusing it",
                    self.family.label, tag.name
                );
                self.find_by_name(&mut **tx, &tag.name).await?.ok_or_else(|| {
                    CmsError::Internal(format!(
                        "Tag '{}' vanished after uniqueness conflict",
                        tag.name
                    ))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Explicitly create a tag; an existing name is a conflict
    pub async fn create(&self, raw_name: &str, color: Option<&str>) -> CmsResult<Tag> {
        let name = self.policy.apply(raw_name)?;

        if let Some(color) = color {
            validate_color(color)?;
        }

        let tag = Tag::new(&self.family, name, color.map(String::from));
        let mut conn = self.db.acquire().await?;

        self.insert(&mut *conn, &tag).await.map_err(|e| {
            CmsError::on_unique_violation(e, format!("Tag '{}' already exists", tag.name))
        })?;

        debug!("Created {} tag '{}' ({})", self.family.label, tag.name, tag.id);
        Ok(tag)
    }

    /// All tags of the family, ordered by name
    pub async fn get_all(&self) -> CmsResult<Vec<Tag>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY name ASC",
            self.columns(),
            self.family.tag_table
        );

        let rows = sqlx::query(&sql).fetch_all(&self.db).await?;
        rows.iter().map(|row| self.tag_from_row(row)).collect()
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Tag> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?",
            self.columns(),
            self.family.tag_table
        );

        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("Tag {} not found", id)))?;

        self.tag_from_row(&row)
    }

    async fn find_by_name(&self, conn: &mut SqliteConnection, name: &str) -> CmsResult<Option<Tag>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE name = ?",
            self.columns(),
            self.family.tag_table
        );

        let row = sqlx::query(&sql).bind(name).fetch_optional(conn).await?;
        row.map(|row| self.tag_from_row(&row)).transpose()
    }

    async fn insert(&self, conn: &mut SqliteConnection, tag: &Tag) -> Result<(), sqlx::Error> {
        if self.family.has_color {
            let sql = format!(
                "INSERT INTO {} (id, name, color, created_at) VALUES (?, ?, ?, ?)",
                self.family.tag_table
            );
            sqlx::query(&sql)
                .bind(tag.id.to_string())
                .bind(&tag.name)
                .bind(tag.color.as_deref().unwrap_or(""))
                .bind(tag.created_at.to_rfc3339())
                .execute(conn)
                .await?;
        } else {
            let sql = format!(
                "INSERT INTO {} (id, name, created_at) VALUES (?, ?, ?)",
                self.family.tag_table
            );
            sqlx::query(&sql)
                .bind(tag.id.to_string())
                .bind(&tag.name)
                .bind(tag.created_at.to_rfc3339())
                .execute(conn)
                .await?;
        }

        Ok(())
    }

    fn columns(&self) -> &'static str {
        if self.family.has_color {
            "id, name, color, created_at"
        } else {
            "id, name, created_at"
        }
    }

    fn tag_from_row(&self, row: &SqliteRow) -> CmsResult<Tag> {
        tag_from_row(&self.family, row)
    }
}

/// Decode a tag row selected with the family's columns
pub(crate) fn tag_from_row(family: &TagFamily, row: &SqliteRow) -> CmsResult<Tag> {
    use sqlx::Row;

    Ok(Tag {
        id: db::get_uuid(row, "id")?,
        name: row.try_get("name")?,
        color: if family.has_color {
            Some(row.try_get("color")?)
        } else {
            None
        },
        created_at: db::get_timestamp(row, "created_at")?,
    })
}

/// Colors are empty or `#RRGGBB`
fn validate_color(color: &str) -> CmsResult<()> {
    let valid = color.is_empty()
        || (color.len() == 7
            && color.starts_with('#')
            && color[1..].chars().all(|c| c.is_ascii_hexdigit()));

    if valid {
        Ok(())
    } else {
        Err(CmsError::Validation(format!(
            "Invalid tag color '{}', expected #RRGGBB",
            color
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{begin_write, file_test_pool, test_pool};
    use crate::tags::{BLOG_TAGS, PROJECT_TAGS};

    #[tokio::test]
    async fn test_resolve_is_idempotent_within_transaction() {
        let db = test_pool().await;
        let store = TagStore::new(db.clone(), BLOG_TAGS, TagNamePolicy::Exact);

        let mut tx = db.begin().await.unwrap();
        let first = store.resolve(&mut tx, "go").await.unwrap();
        let second = store.resolve(&mut tx, "go").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_reuses_explicitly_created_tag() {
        let db = test_pool().await;
        let store = TagStore::new(db.clone(), PROJECT_TAGS, TagNamePolicy::Exact);

        let created = store.create("rust", Some("#dea584")).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let resolved = store.resolve(&mut tx, "rust").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(created.id, resolved.id);
        assert_eq!(resolved.color.as_deref(), Some("#dea584"));
    }

    #[tokio::test]
    async fn test_overlapping_transactions_share_one_tag() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_test_pool(dir.path()).await;
        let store = TagStore::new(db.clone(), BLOG_TAGS, TagNamePolicy::Exact);

        // The second writer starts while the first still holds the lock
        let mut first = begin_write(&db).await.unwrap();
        let second = {
            let db = db.clone();
            let store = store.clone();
            tokio::spawn(async move {
                let mut tx = begin_write(&db).await?;
                let tag = store.resolve(&mut tx, "go").await?;
                tx.commit().await?;
                Ok::<_, CmsError>(tag)
            })
        };

        let winner = store.resolve(&mut first, "go").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        first.commit().await.unwrap();

        let loser = second.await.unwrap().unwrap();
        assert_eq!(winner.id, loser.id);
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unique_violation_reads_back_stored_tag() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_test_pool(dir.path()).await;
        let store = TagStore::new(db.clone(), BLOG_TAGS, TagNamePolicy::Exact);

        let stored = store.create("go", None).await.unwrap();

        let mut tx = begin_write(&db).await.unwrap();
        let duplicate = Tag::new(&BLOG_TAGS, "go".to_string(), None);
        let reused = store.insert_or_reuse(&mut tx, duplicate).await.unwrap();
        assert_eq!(reused.id, stored.id);

        // The outer transaction is still usable after the rolled-back savepoint
        let other = store.resolve(&mut tx, "rust").await.unwrap();
        tx.commit().await.unwrap();

        let names: Vec<String> = store.get_all().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["go", "rust"]);
        assert_ne!(other.id, stored.id);
    }

    #[tokio::test]
    async fn test_create_duplicate_conflicts() {
        let db = test_pool().await;
        let store = TagStore::new(db, PROJECT_TAGS, TagNamePolicy::Exact);

        store.create("go", None).await.unwrap();
        let result = store.create("go", None).await;

        assert!(matches!(result, Err(CmsError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_case_sensitive_by_default() {
        let db = test_pool().await;
        let store = TagStore::new(db.clone(), BLOG_TAGS, TagNamePolicy::Exact);

        let mut tx = db.begin().await.unwrap();
        let lower = store.resolve(&mut tx, "go").await.unwrap();
        let upper = store.resolve(&mut tx, "Go").await.unwrap();
        tx.commit().await.unwrap();

        assert_ne!(lower.id, upper.id);
    }

    #[tokio::test]
    async fn test_lowercase_policy_merges_names() {
        let db = test_pool().await;
        let store = TagStore::new(db.clone(), BLOG_TAGS, TagNamePolicy::TrimLowercase);

        let mut tx = db.begin().await.unwrap();
        let a = store.resolve(&mut tx, "Go").await.unwrap();
        let b = store.resolve(&mut tx, " go ").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(a.name, "go");
    }

    #[tokio::test]
    async fn test_get_all_ordered_by_name() {
        let db = test_pool().await;
        let store = TagStore::new(db, PROJECT_TAGS, TagNamePolicy::Exact);

        for name in ["web", "api", "rust"] {
            store.create(name, None).await.unwrap();
        }

        let names: Vec<String> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["api", "rust", "web"]);
    }

    #[tokio::test]
    async fn test_get_missing_tag() {
        let db = test_pool().await;
        let store = TagStore::new(db, BLOG_TAGS, TagNamePolicy::Exact);

        let result = store.get(Uuid::new_v4()).await;
        assert!(matches!(result, Err(CmsError::NotFound(_))));
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color("").is_ok());
        assert!(validate_color("#00ADD8").is_ok());
        assert!(validate_color("00ADD8").is_err());
        assert!(validate_color("#00ADZ8").is_err());
        assert!(validate_color("#fff").is_err());
    }
}
