/// Tagging for portfolio content
///
/// One implementation serves every taggable owner. A [`TagFamily`] names the
/// tables of one tag namespace (project tags, blog tags); [`TagStore`] owns the
/// tag records, [`TagLinks`] owns the owner/tag join rows and [`Tagging`]
/// combines both into the get-or-create, replace-on-write algorithm.

pub mod links;
pub mod store;

pub use links::TagLinks;
pub use store::TagStore;

use crate::error::{CmsError, CmsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Table layout of one tag namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagFamily {
    /// Human-readable name used in logs and error messages
    pub label: &'static str,
    pub tag_table: &'static str,
    pub link_table: &'static str,
    /// Column of the join table holding the owner id
    pub owner_column: &'static str,
    /// Whether tags of this family carry a display color
    pub has_color: bool,
}

/// Tags attached to portfolio projects
pub const PROJECT_TAGS: TagFamily = TagFamily {
    label: "project",
    tag_table: "project_tags",
    link_table: "project_tag_relations",
    owner_column: "project_id",
    has_color: true,
};

/// Tags attached to blog posts
pub const BLOG_TAGS: TagFamily = TagFamily {
    label: "blog",
    tag_table: "blog_tags",
    link_table: "blog_post_tags",
    owner_column: "post_id",
    has_color: false,
};

/// A named tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Tag {
    fn new(family: &TagFamily, name: String, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            color: if family.has_color {
                Some(color.unwrap_or_default())
            } else {
                None
            },
            created_at: Utc::now(),
        }
    }
}

/// How requested tag names are turned into stored names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagNamePolicy {
    /// Names are stored exactly as supplied: `Go` and `go ` are distinct tags
    #[default]
    Exact,
    /// Surrounding whitespace is removed
    Trim,
    /// Surrounding whitespace is removed and the name is lowercased
    TrimLowercase,
}

impl TagNamePolicy {
    /// Normalize a requested name; names that are blank are rejected under every policy
    pub fn apply(&self, raw: &str) -> CmsResult<String> {
        if raw.trim().is_empty() {
            return Err(CmsError::Validation("Tag name cannot be empty".to_string()));
        }

        let name = match self {
            TagNamePolicy::Exact => raw.to_string(),
            TagNamePolicy::Trim => raw.trim().to_string(),
            TagNamePolicy::TrimLowercase => raw.trim().to_lowercase(),
        };

        if name.chars().count() > 50 {
            return Err(CmsError::Validation(format!(
                "Tag name '{}' exceeds 50 characters",
                name
            )));
        }

        Ok(name)
    }
}

impl std::str::FromStr for TagNamePolicy {
    type Err = CmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(TagNamePolicy::Exact),
            "trim" => Ok(TagNamePolicy::Trim),
            "trim_lowercase" | "lowercase" => Ok(TagNamePolicy::TrimLowercase),
            other => Err(CmsError::Validation(format!(
                "Unknown tag name policy: {}",
                other
            ))),
        }
    }
}

/// Tag store and join table of one family, used together by owner repositories
#[derive(Clone)]
pub struct Tagging {
    pub store: TagStore,
    pub links: TagLinks,
}

impl Tagging {
    pub fn new(db: SqlitePool, family: TagFamily, policy: TagNamePolicy) -> Self {
        Self {
            store: TagStore::new(db.clone(), family, policy),
            links: TagLinks::new(db, family),
        }
    }

    pub fn family(&self) -> &TagFamily {
        self.store.family()
    }

    /// Make `names` the complete tag set of `owner`.
    ///
    /// Every name is resolved in input order (creating missing tags), then the
    /// owner's join rows are replaced by the resolved set. Runs entirely inside
    /// the caller's transaction, so a failure leaves the previous tag set and
    /// any scalar changes made in the same transaction untouched once the
    /// caller drops it. Returns the owner's tags ordered by name.
    pub async fn assign(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        owner: Uuid,
        names: &[String],
    ) -> CmsResult<Vec<Tag>> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            resolved.push(self.store.resolve(tx, name).await?);
        }

        self.links.replace(&mut **tx, owner, &resolved).await?;

        tracing::debug!(
            "Assigned {} {} tag(s) to {}",
            resolved.len(),
            self.family().label,
            owner
        );

        self.links.tags_for_in(&mut **tx, owner).await
    }
}
