/// Certificates with a scanned image or PDF
use super::check_required;
use crate::{
    db,
    error::{CmsError, CmsResult},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

const CERTIFICATE_COLUMNS: &str =
    "id, name, image_url, issue_date, issuer, credential_url, display_order, created_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: Uuid,
    pub name: String,
    pub image_url: String,
    pub issue_date: Option<NaiveDate>,
    pub issuer: String,
    pub credential_url: String,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCertificate {
    pub name: String,
    pub image_url: String,
    pub issue_date: Option<NaiveDate>,
    pub issuer: String,
    pub credential_url: String,
    pub display_order: i64,
}

impl Default for NewCertificate {
    fn default() -> Self {
        Self {
            name: String::new(),
            image_url: String::new(),
            issue_date: None,
            issuer: "-".to_string(),
            credential_url: String::new(),
            display_order: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CertificateChanges {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub issuer: Option<String>,
    pub credential_url: Option<String>,
    pub display_order: Option<i64>,
}

/// Parse a `YYYY-MM-DD` issue date
pub fn parse_issue_date(raw: &str) -> CmsResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        CmsError::Validation(format!("Invalid issue date '{}', expected YYYY-MM-DD", raw))
    })
}

#[derive(Clone)]
pub struct CertificateRepository {
    db: SqlitePool,
}

impl CertificateRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, new: NewCertificate) -> CmsResult<Certificate> {
        check_required("name", &new.name)?;
        check_required("image_url", &new.image_url)?;

        let certificate = Certificate {
            id: Uuid::new_v4(),
            name: new.name,
            image_url: new.image_url,
            issue_date: new.issue_date,
            issuer: new.issuer,
            credential_url: new.credential_url,
            display_order: new.display_order,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO portfolio_certificates
                (id, name, image_url, issue_date, issuer, credential_url, display_order, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(certificate.id.to_string())
        .bind(&certificate.name)
        .bind(&certificate.image_url)
        .bind(certificate.issue_date.map(|d| d.to_string()))
        .bind(&certificate.issuer)
        .bind(&certificate.credential_url)
        .bind(certificate.display_order)
        .bind(certificate.created_at.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(certificate)
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<Certificate> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM portfolio_certificates WHERE id = ?",
            CERTIFICATE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| CmsError::NotFound(format!("Certificate {} not found", id)))?;

        certificate_from_row(&row)
    }

    pub async fn update(&self, id: Uuid, changes: CertificateChanges) -> CmsResult<Certificate> {
        let mut certificate = self.get(id).await?;

        if let Some(name) = changes.name {
            check_required("name", &name)?;
            certificate.name = name;
        }
        if let Some(image_url) = changes.image_url {
            check_required("image_url", &image_url)?;
            certificate.image_url = image_url;
        }
        if let Some(issue_date) = changes.issue_date {
            certificate.issue_date = Some(issue_date);
        }
        if let Some(issuer) = changes.issuer {
            certificate.issuer = issuer;
        }
        if let Some(credential_url) = changes.credential_url {
            certificate.credential_url = credential_url;
        }
        if let Some(display_order) = changes.display_order {
            certificate.display_order = display_order;
        }

        sqlx::query(
            r#"
            UPDATE portfolio_certificates
            SET name = ?, image_url = ?, issue_date = ?, issuer = ?, credential_url = ?,
                display_order = ?
            WHERE id = ?
            "#,
        )
        .bind(&certificate.name)
        .bind(&certificate.image_url)
        .bind(certificate.issue_date.map(|d| d.to_string()))
        .bind(&certificate.issuer)
        .bind(&certificate.credential_url)
        .bind(certificate.display_order)
        .bind(id.to_string())
        .execute(&self.db)
        .await?;

        Ok(certificate)
    }

    /// Delete a certificate; returns the deleted record so its file can be removed
    pub async fn delete(&self, id: Uuid) -> CmsResult<Certificate> {
        let certificate = self.get(id).await?;

        sqlx::query("DELETE FROM portfolio_certificates WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;

        Ok(certificate)
    }

    pub async fn list_all(&self) -> CmsResult<Vec<Certificate>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM portfolio_certificates ORDER BY display_order ASC, created_at DESC",
            CERTIFICATE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(certificate_from_row).collect()
    }
}

fn certificate_from_row(row: &SqliteRow) -> CmsResult<Certificate> {
    let issue_date = row
        .try_get::<Option<String>, _>("issue_date")?
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| CmsError::Internal(format!("Invalid issue date '{}': {}", raw, e)))
        })
        .transpose()?;

    Ok(Certificate {
        id: db::get_uuid(row, "id")?,
        name: row.try_get("name")?,
        image_url: row.try_get("image_url")?,
        issue_date,
        issuer: row.try_get("issuer")?,
        credential_url: row.try_get("credential_url")?,
        display_order: row.try_get("display_order")?,
        created_at: db::get_timestamp(row, "created_at")?,
    })
}
