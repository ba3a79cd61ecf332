/// Key/value site settings
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
pub struct Setting {
    pub id: Uuid,
    pub key: String,
    pub value: String,
    pub data_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSetting {
    pub key: String,
    pub value: String,
    /// Blank means `string`
    pub data_type: String,
    pub description: String,
}

#[derive(Clone)]
pub struct SettingRepository {
    db: SqlitePool,
}

impl SettingRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewSetting) -> CmsResult<Setting> {
        check_required("key", &new.key)?;

        let data_type = if new.data_type.trim().is_empty() {
            "string".to_string()
        } else {
            new.data_type
        };

        let now = Utc::now();
        let setting = Setting {
            id: Uuid::new_v4(),
            key: new.key,
            value: new.value,
            data_type,
            description: new.description,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO portfolio_settings
                (id, key, value, data_type, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(setting.id.to_string())
        .bind(&setting.key)
        .bind(&setting.value)
        .bind(&setting.data_type)
        .bind(&setting.description)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(|e| {
            CmsError::on_unique_violation(e, format!("Setting '{}' already exists", setting.key))
        })?;

        Ok(setting)
    }

    pub async fn list_all(&self) -> CmsResult<Vec<Setting>> {
        let rows = sqlx::query(
            r#"
            SELECT id, key, value, data_type, description, created_at, updated_at
            FROM portfolio_settings
            ORDER BY key ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(setting_from_row).collect()
    }

    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let result = sqlx::query("DELETE FROM portfolio_settings WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Setting {} not found", id)));
        }
        Ok(())
    }
}

fn setting_from_row(row: &SqliteRow) -> CmsResult<Setting> {
    Ok(Setting {
        id: db::get_uuid(row, "id")?,
        key: row.try_get("key")?,
        value: row.try_get("value")?,
        data_type: row.try_get("data_type")?,
        description: row.try_get("description")?,
        created_at: db::get_timestamp(row, "created_at")?,
        updated_at: db::get_timestamp(row, "updated_at")?,
    })
}
