//! Payload extractor for endpoints that take uploads: accepts `multipart/form-data`
//! (text fields + files) or a JSON object (text fields only).

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Clone, Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: Vec<UploadedFile>,
}

impl FormData {
    pub fn new() -> Self {
        FormData::default()
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.entry(key.to_string()).or_default().push(value.into());
        self
    }

    pub fn with_file(mut self, field: &str, file_name: &str, bytes: impl Into<Bytes>) -> Self {
        self.files.push(UploadedFile {
            field: field.to_string(),
            file_name: file_name.to_string(),
            content_type: None,
            bytes: bytes.into(),
        });
        self
    }

    /// Flattens a JSON object into text fields. Arrays become repeated values; nulls are dropped.
    pub fn from_json(value: Value) -> Result<Self, AppError> {
        let obj = match value {
            Value::Object(m) => m,
            _ => return Err(AppError::BadRequest("body must be a JSON object".into())),
        };
        let mut form = FormData::new();
        for (k, v) in obj {
            match v {
                Value::Null => {}
                Value::Array(items) => {
                    let entry = form.fields.entry(k).or_default();
                    entry.extend(items.into_iter().filter(|i| !i.is_null()).map(json_text));
                }
                other => form.fields.entry(k).or_default().push(json_text(other)),
            }
        }
        Ok(form)
    }

    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(|e| AppError::BadRequest(e.body_text()))?;
            match file_name {
                Some(file_name) if !file_name.is_empty() => form.files.push(UploadedFile {
                    field: name,
                    file_name,
                    content_type,
                    bytes: data,
                }),
                _ => {
                    let text = String::from_utf8(data.to_vec())
                        .map_err(|_| AppError::invalid(&name, "must be valid UTF-8 text"))?;
                    form.fields.entry(name).or_default().push(text);
                }
            }
        }
        Ok(form)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key) || self.files.iter().any(|f| f.field == key)
    }

    /// First raw value of a text field.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// First value trimmed; empty counts as absent.
    pub fn trimmed(&self, key: &str) -> Option<String> {
        self.text(key).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parses a present, non-empty field; a malformed value is a validation error on that field.
    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.trimmed(key) {
            None => Ok(None),
            Some(s) => s
                .parse::<T>()
                .map(Some)
                .map_err(|_| AppError::invalid(key, format!("'{}' is not a valid value", s))),
        }
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, AppError> {
        match self.trimmed(key).map(|s| s.to_ascii_lowercase()) {
            None => Ok(None),
            Some(s) => match s.as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(AppError::invalid(key, "must be a boolean")),
            },
        }
    }

    /// Id list from repeated values or a comma-separated value. None when the field is absent.
    pub fn ids(&self, key: &str) -> Result<Option<Vec<i64>>, AppError> {
        if !self.fields.contains_key(key) {
            return Ok(None);
        }
        let mut out = Vec::new();
        for raw in self.values(key).iter().flat_map(|v| v.split(',')) {
            let raw = raw.trim().trim_matches(|c| c == '[' || c == ']');
            if raw.is_empty() {
                continue;
            }
            let id = raw
                .parse::<i64>()
                .map_err(|_| AppError::invalid(key, format!("'{}' is not a valid id", raw)))?;
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Ok(Some(out))
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    pub fn files<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files.iter().filter(move |f| f.field == field)
    }
}

fn json_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return FormData::from_multipart(multipart).await;
        }
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if bytes.is_empty() {
            return Ok(FormData::new());
        }
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?;
        FormData::from_json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_flatten_to_text() {
        let form = FormData::from_json(json!({
            "title": "  Psalm 23 ",
            "quantity": 3,
            "is_digital": true,
            "service_types": ["audio", "editing"],
            "album": null
        }))
        .unwrap();
        assert_eq!(form.trimmed("title").as_deref(), Some("Psalm 23"));
        assert_eq!(form.parse::<i32>("quantity").unwrap(), Some(3));
        assert_eq!(form.bool("is_digital").unwrap(), Some(true));
        assert_eq!(form.values("service_types"), ["audio", "editing"]);
        assert!(!form.contains("album"));
    }

    #[test]
    fn malformed_values_are_field_errors() {
        let form = FormData::new().with_field("quantity", "many").with_field("flag", "maybe");
        assert!(matches!(form.parse::<i32>("quantity"), Err(AppError::Validation(_))));
        assert!(matches!(form.bool("flag"), Err(AppError::Validation(_))));
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert!(matches!(FormData::from_json(json!([1, 2])), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn id_lists_accept_arrays_and_commas() {
        let form = FormData::from_json(json!({ "track_ids": [3, 1, 3], "empty": [] })).unwrap();
        assert_eq!(form.ids("track_ids").unwrap(), Some(vec![3, 1]));
        let form = FormData::new().with_field("track_ids", "4, 5");
        assert_eq!(form.ids("track_ids").unwrap(), Some(vec![4, 5]));
        assert_eq!(form.ids("missing").unwrap(), None);
        assert!(FormData::new().with_field("track_ids", "x").ids("track_ids").is_err());
    }

    #[test]
    fn files_are_looked_up_by_field() {
        let form = FormData::new()
            .with_file("images", "a.jpg", vec![1u8])
            .with_file("images", "b.jpg", vec![2u8])
            .with_file("audio_file", "s.mp3", vec![3u8]);
        assert_eq!(form.files("images").count(), 2);
        assert_eq!(form.file("audio_file").map(|f| f.file_name.as_str()), Some("s.mp3"));
        assert!(form.file("cover_image").is_none());
    }
}
