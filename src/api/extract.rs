/// Request extractors shared by the resource handlers
use crate::{
    db,
    error::{CmsError, CmsResult},
    uploads::UploadFile,
};
use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// JSON body that is deserialized and then validated
///
/// Malformed JSON and failed field rules both surface as `InvalidRequest`.
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = CmsError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| CmsError::Validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|e| CmsError::Validation(e.to_string()))?;

        Ok(ValidJson(value))
    }
}

/// Parse a path id
pub fn path_id(raw: &str) -> CmsResult<Uuid> {
    db::parse_id(raw)
}

/// A tag given either as a bare name or as `{"name": ...}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    Name(String),
    Object { name: String },
}

impl TagInput {
    pub fn into_name(self) -> String {
        match self {
            TagInput::Name(name) | TagInput::Object { name } => name,
        }
    }
}

pub fn tag_names(inputs: Vec<TagInput>) -> Vec<String> {
    inputs.into_iter().map(TagInput::into_name).collect()
}

/// A fully read multipart body: text fields by name plus file parts
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    files: HashMap<String, UploadFile>,
}

impl MultipartForm {
    /// Drain every part; parts carrying a file name are treated as files
    pub async fn read(mut multipart: Multipart) -> CmsResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| CmsError::Validation(format!("Invalid multipart payload: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(String::from);
            let content_type = field.content_type().map(String::from);

            match file_name {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(|e| {
                        CmsError::Validation(format!("Invalid file field '{}': {}", name, e))
                    })?;
                    // Browsers send an empty part when no file was chosen
                    if bytes.is_empty() && file_name.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        UploadFile::new(bytes, Some(file_name), content_type),
                    );
                }
                None => {
                    let value = field.text().await.map_err(|e| {
                        CmsError::Validation(format!("Invalid field '{}': {}", name, e))
                    })?;
                    form.fields.entry(name).or_default().push(value);
                }
            }
        }

        Ok(form)
    }

    /// First value of a text field, trimmed
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|v| v.trim().to_string())
    }

    /// First value of a text field, ignored when blank
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.text(name).filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> CmsResult<String> {
        self.non_empty(name)
            .ok_or_else(|| CmsError::Validation(format!("{} is required", name)))
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> CmsResult<Option<T>> {
        match self.non_empty(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| CmsError::Validation(format!("Invalid value for {}: {}", name, raw))),
        }
    }

    pub fn flag(&self, name: &str) -> CmsResult<Option<bool>> {
        match self.non_empty(name).map(|v| v.to_ascii_lowercase()) {
            None => Ok(None),
            Some(v) => match v.as_str() {
                "true" | "1" | "on" | "yes" => Ok(Some(true)),
                "false" | "0" | "off" | "no" => Ok(Some(false)),
                _ => Err(CmsError::Validation(format!(
                    "Invalid boolean for {}: {}",
                    name, v
                ))),
            },
        }
    }

    /// Values of a repeatable field, each also split on commas.
    ///
    /// `None` when the field was not sent at all; a sent but blank field is
    /// an empty list. Entries are kept as sent apart from dropping blank ones;
    /// tag names are normalised later by the tag name policy.
    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        self.fields.get(name).map(|values| {
            values
                .iter()
                .flat_map(|v| v.split(','))
                .filter(|v| !v.trim().is_empty())
                .map(String::from)
                .collect()
        })
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadFile> {
        self.files.remove(name)
    }
}
