//! Request body parsing.
//!
//! Handlers see their input as a JSON object of fields regardless of how the
//! client encoded it.

use crate::{
    app::{AppError, AppResult},
    upload::{UploadStore, AVATAR_FIELD},
};
use hyper::{header::CONTENT_TYPE, Body, Request};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ContentKind {
    Json,
    UrlEncoded,
    Multipart,
    Other,
}

fn content_kind(request: &Request<Body>) -> ContentKind {
    let content_type = match request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        Some(content_type) => content_type,
        None => return ContentKind::Other,
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/json" => ContentKind::Json,
        "application/x-www-form-urlencoded" => ContentKind::UrlEncoded,
        "multipart/form-data" => ContentKind::Multipart,
        _ => ContentKind::Other,
    }
}

/// Reads a JSON or urlencoded body. Any other content type, multipart
/// included, yields no fields.
pub async fn read_fields(request: Request<Body>) -> AppResult<Value> {
    let kind = content_kind(&request);
    let bytes = hyper::body::to_bytes(request.into_body()).await?;

    match kind {
        ContentKind::Json => parse_json_fields(&bytes),
        ContentKind::UrlEncoded => parse_urlencoded_fields(&bytes),
        ContentKind::Multipart | ContentKind::Other => Ok(Value::Object(Map::new())),
    }
}

/// Reads the register body. Multipart bodies may carry an `avatar` file,
/// which is written to `uploads` as it streams in; its stored name is
/// returned next to the text fields. Files written before a failure are
/// removed again.
pub async fn read_register_form(
    request: Request<Body>,
    uploads: &UploadStore,
) -> AppResult<(Value, Option<String>)> {
    if content_kind(&request) != ContentKind::Multipart {
        return Ok((read_fields(request).await?, None));
    }

    let mut stored = Vec::new();
    match read_multipart_form(request, uploads, &mut stored).await {
        Ok(form) => Ok(form),
        Err(error) => {
            for file_name in &stored {
                uploads.remove(file_name).await;
            }
            Err(error)
        }
    }
}

async fn read_multipart_form(
    request: Request<Body>,
    uploads: &UploadStore,
    stored: &mut Vec<String>,
) -> AppResult<(Value, Option<String>)> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let boundary = multer::parse_boundary(&content_type)?;
    let mut multipart = multer::Multipart::new(request.into_body(), boundary);

    let mut fields = Map::new();
    let mut avatar = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);

        match field.file_name().map(str::to_owned) {
            // an empty file input
            Some(file_name) if file_name.is_empty() => continue,
            Some(file_name) => {
                if name.as_deref() != Some(AVATAR_FIELD) || avatar.is_some() {
                    return Err(AppError::unexpected_field(name.as_deref()));
                }

                let (stored_name, mut file) = uploads.create(&file_name).await?;
                stored.push(stored_name.clone());

                let mut written = 0;
                while let Some(chunk) = field.chunk().await? {
                    file.write_all(&chunk).await?;
                    written += chunk.len();
                }
                file.flush().await?;

                info!(
                    "stored avatar '{}' as '{}' ({} bytes)",
                    file_name, stored_name, written
                );
                avatar = Some(stored_name);
            }
            None => {
                let text = field.text().await?;
                if let Some(name) = name {
                    insert_field(&mut fields, name, text);
                }
            }
        }
    }

    Ok((Value::Object(fields), avatar))
}

/// An empty body is no fields. A top-level array carries no named fields
/// either, any other non-object is malformed.
fn parse_json_fields(bytes: &[u8]) -> AppResult<Value> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Object(Map::new()));
    }

    let json: Value = serde_json::from_slice(bytes)
        .map_err(|serde_error| AppError::invalid_request().with_context(&serde_error))?;

    match json {
        Value::Object(_) => Ok(json),
        Value::Array(_) => Ok(Value::Object(Map::new())),
        other => Err(AppError::invalid_request().with_context(&other)),
    }
}

fn parse_urlencoded_fields(bytes: &[u8]) -> AppResult<Value> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)
        .map_err(|form_error| AppError::invalid_request().with_context(&form_error))?;

    let mut fields = Map::new();
    for (name, value) in pairs {
        insert_field(&mut fields, name, value);
    }

    Ok(Value::Object(fields))
}

/// A repeated field name collects its values into an array.
fn insert_field(fields: &mut Map<String, Value>, name: String, value: String) {
    match fields.get_mut(&name) {
        Some(Value::Array(values)) => values.push(Value::String(value)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(value)]);
        }
        None => {
            fields.insert(name, Value::String(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(content_type: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn json_fields() {
        let fields = read_fields(request(
            "application/json; charset=utf-8",
            r#"{"username":"ann","password":"pw"}"#,
        ))
        .await
        .unwrap();
        assert_eq!(fields, json!({ "username": "ann", "password": "pw" }));
    }

    #[tokio::test]
    async fn empty_json_body_has_no_fields() {
        let fields = read_fields(request("application/json", "")).await.unwrap();
        assert_eq!(fields, json!({}));
    }

    #[tokio::test]
    async fn json_array_has_no_fields() {
        let fields = read_fields(request("application/json", r#"["ann","pw"]"#))
            .await
            .unwrap();
        assert_eq!(fields, json!({}));
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_request() {
        let error = read_fields(request("application/json", "{\"username\":"))
            .await
            .unwrap_err();
        assert_eq!(error.kind, crate::app::AppErrorKind::InvalidRequest);

        let error = read_fields(request("application/json", "\"just a string\""))
            .await
            .unwrap_err();
        assert_eq!(error.kind, crate::app::AppErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn urlencoded_fields() {
        let fields = read_fields(request(
            "application/x-www-form-urlencoded",
            "username=ann+lee&password=p%26w",
        ))
        .await
        .unwrap();
        assert_eq!(fields, json!({ "username": "ann lee", "password": "p&w" }));
    }

    #[tokio::test]
    async fn repeated_urlencoded_fields_become_arrays() {
        let fields = read_fields(request(
            "application/x-www-form-urlencoded",
            "username=a&username=b&username=c",
        ))
        .await
        .unwrap();
        assert_eq!(fields, json!({ "username": ["a", "b", "c"] }));
    }

    #[tokio::test]
    async fn unknown_content_type_has_no_fields() {
        let fields = read_fields(request("text/plain", "username=ann"))
            .await
            .unwrap();
        assert_eq!(fields, json!({}));
    }

    #[tokio::test]
    async fn register_form_reads_multipart_text_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadStore::open(dir.path().to_owned()).await.unwrap();

        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"username\"\r\n\r\n\
            ann\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"avatar\"; filename=\"me.gif\"\r\n\
            Content-Type: image/gif\r\n\r\n\
            GIF89a\r\n\
            --XYZ--\r\n";
        let (fields, avatar) = read_register_form(
            request("multipart/form-data; boundary=XYZ", body),
            &uploads,
        )
        .await
        .unwrap();

        assert_eq!(fields, json!({ "username": "ann" }));
        let avatar = avatar.unwrap();
        assert!(avatar.ends_with(".gif"));
        let stored = std::fs::read(dir.path().join(&avatar)).unwrap();
        assert_eq!(stored, b"GIF89a");
    }

    #[tokio::test]
    async fn register_form_ignores_empty_file_input() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadStore::open(dir.path().to_owned()).await.unwrap();

        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"avatar\"; filename=\"\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n\
            \r\n\
            --XYZ--\r\n";
        let (_, avatar) = read_register_form(
            request("multipart/form-data; boundary=XYZ", body),
            &uploads,
        )
        .await
        .unwrap();

        assert_eq!(avatar, None);
    }

    #[tokio::test]
    async fn register_form_rejects_other_file_fields() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadStore::open(dir.path().to_owned()).await.unwrap();

        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"photo\"; filename=\"me.png\"\r\n\r\n\
            data\r\n\
            --XYZ--\r\n";
        let error = read_register_form(
            request("multipart/form-data; boundary=XYZ", body),
            &uploads,
        )
        .await
        .unwrap_err();

        assert_eq!(error.kind, crate::app::AppErrorKind::UnexpectedField);
    }

    fn stored_files(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn register_form_removes_written_avatar_when_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadStore::open(dir.path().to_owned()).await.unwrap();

        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"avatar\"; filename=\"one.png\"\r\n\r\n\
            first\r\n\
            --XYZ\r\n\
            Content-Disposition: form-data; name=\"avatar\"; filename=\"two.png\"\r\n\r\n\
            second\r\n\
            --XYZ--\r\n";
        let error = read_register_form(
            request("multipart/form-data; boundary=XYZ", body),
            &uploads,
        )
        .await
        .unwrap_err();

        assert_eq!(error.kind, crate::app::AppErrorKind::UnexpectedField);
        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn register_form_removes_partial_avatar_on_truncated_body() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadStore::open(dir.path().to_owned()).await.unwrap();

        let body = "--XYZ\r\n\
            Content-Disposition: form-data; name=\"avatar\"; filename=\"cut.png\"\r\n\r\n\
            only part of the";
        let error = read_register_form(
            request("multipart/form-data; boundary=XYZ", body),
            &uploads,
        )
        .await
        .unwrap_err();

        assert_eq!(error.kind, crate::app::AppErrorKind::Multipart);
        assert!(stored_files(dir.path()).is_empty());
    }
}
