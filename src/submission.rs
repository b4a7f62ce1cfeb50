//! The normalized contribution record and the adapter that builds it from
//! whatever shape the backend sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Disapproved,
}

impl SubmissionStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "disapproved" => Some(Self::Disapproved),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Disapproved => "Disapproved",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub id: String,
    pub name: String,
    pub size_bytes: Option<u64>,
    pub mime_type: String,
    pub uploaded_at: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub organization: String,
    pub request_type: String,
    pub message: String,
    pub status: SubmissionStatus,
    pub submitted_by: String,
    pub submitted_date: String,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized submission record: {0}")]
pub struct AdaptError(#[from] serde_json::Error);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

#[derive(Deserialize)]
struct RawUser {
    name: Option<String>,
}

/// Record shape served by the contributions API.
#[derive(Deserialize)]
struct ApiRecord {
    id: RawId,
    request_type: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    organization: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    files: Value,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Camel-cased record shape with pre-structured files.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    id: RawId,
    request_type: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    organization: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    submitted_by: String,
    #[serde(default)]
    submitted_date: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    uploaded_files: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSubmission {
    Api(ApiRecord),
    Legacy(LegacyRecord),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSize {
    Bytes(u64),
    Human(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFile {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "sizeBytes")]
    size: Option<RawSize>,
    #[serde(default, alias = "mimeType")]
    r#type: Option<String>,
    #[serde(default)]
    uploaded_at: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

/// Converts backend contribution payloads into [`Submission`] values.
#[derive(Debug, Clone)]
pub struct SubmissionAdapter {
    files_base_url: String,
}

impl SubmissionAdapter {
    pub fn new(files_base_url: impl Into<String>) -> Self {
        Self {
            files_base_url: files_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Accepts `{"contributions": [...]}` or a bare array. Records that match
    /// neither shape are logged and skipped.
    pub fn adapt_list(&self, payload: Value) -> Vec<Submission> {
        let records = match payload {
            Value::Array(records) => records,
            Value::Object(mut map) => match map.remove("contributions") {
                Some(Value::Array(records)) => records,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        records
            .into_iter()
            .filter_map(|record| match self.adapt(record) {
                Ok(submission) => Some(submission),
                Err(e) => {
                    warn!("Skipping contribution: {e}");
                    None
                }
            })
            .collect()
    }

    pub fn adapt(&self, record: Value) -> Result<Submission, AdaptError> {
        let raw: RawSubmission = serde_json::from_value(record)?;
        Ok(match raw {
            RawSubmission::Api(r) => {
                let uploaded_at = r.created_at.clone();
                Submission {
                    id: r.id.into_string(),
                    title: r.title,
                    organization: r.organization.unwrap_or_default(),
                    request_type: r.request_type,
                    message: r.message.unwrap_or_default(),
                    status: status_or_pending(r.status.as_deref()),
                    submitted_by: r
                        .user
                        .and_then(|u| u.name)
                        .or(r.name)
                        .unwrap_or_else(|| "Anonymous".to_string()),
                    submitted_date: r.created_at.unwrap_or_default(),
                    categories: r.categories.into_iter().collect(),
                    tags: r.tags.into_iter().collect(),
                    files: self.parse_files(&r.files, uploaded_at.as_deref()),
                }
            }
            RawSubmission::Legacy(r) => Submission {
                id: r.id.into_string(),
                title: r.title,
                organization: r.organization,
                request_type: r.request_type,
                message: r.message,
                status: status_or_pending(r.status.as_deref()),
                submitted_by: r.submitted_by,
                files: self.parse_files(&r.uploaded_files, Some(r.submitted_date.as_str())),
                submitted_date: r.submitted_date,
                categories: r.categories.into_iter().collect(),
                tags: r.tags.into_iter().collect(),
            },
        })
    }

    /// Parses a files field that is either a structured array or a
    /// JSON-encoded array of storage paths. Malformed input yields no files.
    pub fn parse_files(&self, raw: &Value, uploaded_at: Option<&str>) -> Vec<FileRef> {
        let decoded;
        let items = match raw {
            Value::Null => return Vec::new(),
            Value::Array(items) => items,
            Value::String(encoded) => {
                if encoded.trim().is_empty() {
                    return Vec::new();
                }
                decoded = match serde_json::from_str::<Value>(encoded) {
                    Ok(Value::Array(items)) => items,
                    Ok(Value::String(path)) => vec![Value::String(path)],
                    Ok(other) => {
                        warn!("Ignoring files list with unexpected JSON type: {other}");
                        return Vec::new();
                    }
                    Err(e) => {
                        warn!("Ignoring malformed files list {encoded:?}: {e}");
                        return Vec::new();
                    }
                };
                &decoded
            }
            other => {
                warn!("Ignoring files list with unexpected type: {other}");
                return Vec::new();
            }
        };

        items
            .iter()
            .filter_map(|item| self.file_ref(item, uploaded_at))
            .collect()
    }

    fn file_ref(&self, item: &Value, uploaded_at: Option<&str>) -> Option<FileRef> {
        match item {
            Value::String(path) => self.from_path(path, uploaded_at),
            Value::Object(_) => {
                let raw: RawFile = match serde_json::from_value(item.clone()) {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!("Ignoring unreadable file entry: {e}");
                        return None;
                    }
                };
                self.from_object(raw, uploaded_at)
            }
            other => {
                warn!("Ignoring file entry of unexpected type: {other}");
                None
            }
        }
    }

    fn from_path(&self, path: &str, uploaded_at: Option<&str>) -> Option<FileRef> {
        let path = path.trim().trim_start_matches('/');
        let name = file_name(path)?;
        Some(FileRef {
            id: path.to_string(),
            mime_type: guess_mime(name),
            name: name.to_string(),
            size_bytes: None,
            uploaded_at: uploaded_at.map(str::to_string),
            url: self.url_for(path),
        })
    }

    fn from_object(&self, raw: RawFile, uploaded_at: Option<&str>) -> Option<FileRef> {
        let location = raw.url.clone().or_else(|| raw.path.clone());
        let name = raw
            .name
            .or_else(|| location.as_deref().and_then(file_name).map(str::to_string))?;
        let url = match (raw.url, raw.path) {
            (Some(url), _) => url,
            (None, Some(path)) => self.url_for(path.trim_start_matches('/')),
            (None, None) => String::new(),
        };
        Some(FileRef {
            id: raw
                .id
                .map(RawId::into_string)
                .unwrap_or_else(|| name.clone()),
            mime_type: raw.r#type.unwrap_or_else(|| guess_mime(&name)),
            size_bytes: raw.size.and_then(|size| match size {
                RawSize::Bytes(n) => Some(n),
                RawSize::Human(text) => parse_human_size(&text),
            }),
            uploaded_at: raw.uploaded_at.or_else(|| uploaded_at.map(str::to_string)),
            url,
            name,
        })
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.files_base_url, path)
    }
}

fn status_or_pending(raw: Option<&str>) -> SubmissionStatus {
    match raw {
        None => SubmissionStatus::Pending,
        Some(value) => SubmissionStatus::parse(value).unwrap_or_else(|| {
            warn!("Unknown submission status {value:?}, treating as pending");
            SubmissionStatus::Pending
        }),
    }
}

fn file_name(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

fn guess_mime(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Parses sizes like `"2.4 MB"` or `"856 KB"` into bytes.
pub fn parse_human_size(text: &str) -> Option<u64> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = number.parse().ok()?;
    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" | "BYTES" => 1.0,
        "KB" => 1024.0,
        "MB" => 1024.0 * 1024.0,
        "GB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((number * multiplier).round() as u64)
}

/// Human-readable size as shown next to attachments.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let units = ["Bytes", "KB", "MB"];
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(units.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, units[exponent])
}
