/// Owner/tag join rows of one family
use super::{store::tag_from_row, Tag, TagFamily};
use crate::{db, error::CmsResult};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

/// Join table linking owners to tags; each (owner, tag) pair exists at most once
#[derive(Clone)]
pub struct TagLinks {
    db: SqlitePool,
    family: TagFamily,
}

impl TagLinks {
    pub fn new(db: SqlitePool, family: TagFamily) -> Self {
        Self { db, family }
    }

    /// Link a tag to an owner. Returns false when the pair was already linked.
    pub async fn link(&self, owner: Uuid, tag: Uuid) -> CmsResult<bool> {
        let sql = format!(
            "INSERT INTO {} ({}, tag_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
            self.family.link_table, self.family.owner_column
        );

        let result = sqlx::query(&sql)
            .bind(owner.to_string())
            .bind(tag.to_string())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Unlink a tag from an owner. Returns false when the pair was not linked.
    pub async fn unlink(&self, owner: Uuid, tag: Uuid) -> CmsResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ? AND tag_id = ?",
            self.family.link_table, self.family.owner_column
        );

        let result = sqlx::query(&sql)
            .bind(owner.to_string())
            .bind(tag.to_string())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Tags of one owner, ordered by name
    pub async fn tags_for(&self, owner: Uuid) -> CmsResult<Vec<Tag>> {
        let mut conn = self.db.acquire().await?;
        self.tags_for_in(&mut conn, owner).await
    }

    /// Tags of one owner read through an existing connection or transaction
    pub async fn tags_for_in(&self, conn: &mut SqliteConnection, owner: Uuid) -> CmsResult<Vec<Tag>> {
        let sql = format!(
            "SELECT {} FROM {} l JOIN {} t ON t.id = l.tag_id WHERE l.{} = ? ORDER BY t.name ASC",
            self.tag_columns(),
            self.family.link_table,
            self.family.tag_table,
            self.family.owner_column
        );

        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .fetch_all(conn)
            .await?;

        rows.iter().map(|row| tag_from_row(&self.family, row)).collect()
    }

    /// Tags of many owners in one query.
    ///
    /// Every requested owner gets an entry, empty when it has no tags. An empty
    /// request returns an empty map without querying.
    pub async fn tags_for_many(&self, owners: &[Uuid]) -> CmsResult<HashMap<Uuid, Vec<Tag>>> {
        let mut grouped: HashMap<Uuid, Vec<Tag>> =
            owners.iter().map(|id| (*id, Vec::new())).collect();

        if owners.is_empty() {
            return Ok(grouped);
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {}, l.{} AS owner_id FROM {} l JOIN {} t ON t.id = l.tag_id WHERE l.{} IN (",
            self.tag_columns(),
            self.family.owner_column,
            self.family.link_table,
            self.family.tag_table,
            self.family.owner_column
        ));

        let mut ids = query.separated(", ");
        for owner in grouped.keys() {
            ids.push_bind(owner.to_string());
        }
        ids.push_unseparated(") ORDER BY t.name ASC");

        let rows = query.build().fetch_all(&self.db).await?;

        for row in &rows {
            let owner = db::get_uuid(row, "owner_id")?;
            let tag = tag_from_row(&self.family, row)?;
            grouped.entry(owner).or_default().push(tag);
        }

        Ok(grouped)
    }

    /// Replace the owner's full link set. Duplicate tags collapse to one row.
    pub async fn replace(&self, conn: &mut SqliteConnection, owner: Uuid, tags: &[Tag]) -> CmsResult<()> {
        self.clear(&mut *conn, owner).await?;

        if tags.is_empty() {
            return Ok(());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "INSERT INTO {} ({}, tag_id) ",
            self.family.link_table, self.family.owner_column
        ));
        query.push_values(tags, |mut row, tag| {
            row.push_bind(owner.to_string()).push_bind(tag.id.to_string());
        });
        query.push(" ON CONFLICT DO NOTHING");

        query.build().execute(conn).await?;

        Ok(())
    }

    /// Remove every link of the owner
    pub async fn clear(&self, conn: &mut SqliteConnection, owner: Uuid) -> CmsResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.family.link_table, self.family.owner_column
        );

        let result = sqlx::query(&sql)
            .bind(owner.to_string())
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    fn tag_columns(&self) -> &'static str {
        if self.family.has_color {
            "t.id, t.name, t.color, t.created_at"
        } else {
            "t.id, t.name, t.created_at"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::tags::{TagNamePolicy, TagStore, PROJECT_TAGS};
    use chrono::Utc;

    async fn insert_project(db: &SqlitePool, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO portfolio_projects (id, title, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(title)
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await
        .unwrap();
        id
    }

    async fn setup() -> (SqlitePool, TagStore, TagLinks) {
        let db = test_pool().await;
        let store = TagStore::new(db.clone(), PROJECT_TAGS, TagNamePolicy::Exact);
        let links = TagLinks::new(db.clone(), PROJECT_TAGS);
        (db, store, links)
    }

    #[tokio::test]
    async fn test_link_twice_is_harmless() {
        let (db, store, links) = setup().await;
        let project = insert_project(&db, "cms").await;
        let tag = store.create("rust", None).await.unwrap();

        assert!(links.link(project, tag.id).await.unwrap());
        assert!(!links.link(project, tag.id).await.unwrap());

        let tags = links.tags_for(project).await.unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn test_unlink() {
        let (db, store, links) = setup().await;
        let project = insert_project(&db, "cms").await;
        let tag = store.create("rust", None).await.unwrap();

        links.link(project, tag.id).await.unwrap();
        assert!(links.unlink(project, tag.id).await.unwrap());
        assert!(!links.unlink(project, tag.id).await.unwrap());
        assert!(links.tags_for(project).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tags_for_many_matches_individual_lookups() {
        let (db, store, links) = setup().await;
        let a = insert_project(&db, "a").await;
        let b = insert_project(&db, "b").await;
        let untagged = insert_project(&db, "c").await;

        let web = store.create("web", None).await.unwrap();
        let api = store.create("api", None).await.unwrap();
        let sql = store.create("sql", None).await.unwrap();

        links.link(a, web.id).await.unwrap();
        links.link(a, api.id).await.unwrap();
        links.link(b, sql.id).await.unwrap();
        links.link(b, api.id).await.unwrap();

        let grouped = links.tags_for_many(&[a, b, untagged]).await.unwrap();

        assert_eq!(grouped.len(), 3);
        assert!(grouped[&untagged].is_empty());
        for owner in [a, b, untagged] {
            assert_eq!(grouped[&owner], links.tags_for(owner).await.unwrap());
        }
        assert_eq!(grouped[&a][0].name, "api");
    }

    #[tokio::test]
    async fn test_tags_for_many_empty_input() {
        let (_db, _store, links) = setup().await;
        let grouped = links.tags_for_many(&[]).await.unwrap();
        assert!(grouped.is_empty());
    }

    #[tokio::test]
    async fn test_replace_collapses_duplicates() {
        let (db, store, links) = setup().await;
        let project = insert_project(&db, "cms").await;
        let tag = store.create("rust", None).await.unwrap();
        let other = store.create("axum", None).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        links
            .replace(&mut tx, project, &[tag.clone(), tag.clone(), other])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let tags = links.tags_for(project).await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["axum", "rust"]);

        let mut tx = db.begin().await.unwrap();
        links.replace(&mut tx, project, &[]).await.unwrap();
        tx.commit().await.unwrap();

        assert!(links.tags_for(project).await.unwrap().is_empty());
    }
}
