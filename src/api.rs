//! Client for the contributions backend.

use crate::config::ApiConfig;
use crate::intake::ContributionPayload;
use crate::session::Role;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub const UNREACHABLE_MESSAGE: &str = "Unable to reach the API";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Non-2xx answer. `message` is what the backend said, or a fallback.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("unexpected response from the API: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub remember: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub user: Option<LoginUser>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl LoginResponse {
    pub fn bearer_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.access_token.as_deref().filter(|t| !t.is_empty()))
    }

    pub fn role(&self) -> Role {
        self.user
            .as_ref()
            .and_then(|u| u.role.as_deref())
            .map(Role::parse)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub name: String,
    pub department: String,
    pub contributions: u64,
    pub recent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRankingItem {
    #[serde(default)]
    pub user: Option<RawRankingUser>,
    #[serde(default)]
    pub total: Value,
    /// Counts per request type, in the order the backend listed them.
    #[serde(default, deserialize_with = "ordered_entries")]
    pub request_types: Vec<(String, Value)>,
    #[serde(default)]
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRankingUser {
    #[serde(default)]
    pub name: Option<String>,
}

fn ordered_entries<'de, D>(deserializer: D) -> Result<Vec<(String, Value)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, Value)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of request type counts")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, Value>()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(EntriesVisitor)
}

/// Ties on the top request type go to the one listed first.
pub fn format_ranking(items: Vec<RawRankingItem>) -> Vec<RankingEntry> {
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let mut top: Option<(&str, f64)> = None;
            for (kind, count) in &item.request_types {
                let count = as_count(count);
                if top.map_or(true, |(_, best)| count > best) {
                    top = Some((kind.as_str(), count));
                }
            }
            RankingEntry {
                recent: top
                    .map(|(kind, _)| title_case(kind))
                    .unwrap_or_else(|| "Recent activity".to_string()),
                name: item
                    .user
                    .and_then(|u| u.name)
                    .unwrap_or_else(|| format!("Contributor {}", idx + 1)),
                department: item.organization.unwrap_or_else(|| "—".to_string()),
                contributions: as_count(&item.total).max(0.0) as u64,
            }
        })
        .collect()
}

fn as_count(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// `submit_dataset` becomes `Submit Dataset`.
pub fn title_case(value: &str) -> String {
    value
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Message for a failed response body: the body itself when it is plain
/// text, else its `message` field, else a fixed fallback.
pub fn error_message(body: &Value) -> String {
    match body {
        Value::String(text) => text.clone(),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNREACHABLE_MESSAGE)
            .to_string(),
    }
}

#[async_trait]
pub trait PortalBackend: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;

    /// Raw contributions payload, normalized later by the submission adapter.
    async fn fetch_contributions(&self, token: Option<&str>) -> Result<Value, ApiError>;

    async fn submit_contribution(
        &self,
        payload: &ContributionPayload,
        token: &str,
    ) -> Result<Value, ApiError>;

    async fn fetch_ranking(&self) -> Result<Vec<RankingEntry>, ApiError>;

    async fn logout(&self, token: &str) -> Result<(), ApiError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and returns the body text of a 2xx answer, plus
    /// whether it was labelled JSON.
    async fn send_text(&self, request: reqwest::RequestBuilder) -> Result<(String, bool), ApiError> {
        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!("API responded {status} ({} bytes)", text.len());

        if !status.is_success() {
            let body = if is_json {
                serde_json::from_str(&text).unwrap_or(Value::Null)
            } else {
                Value::String(text)
            };
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok((text, is_json))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let (text, is_json) = self.send_text(request).await?;
        if is_json {
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
        } else {
            Ok(Value::String(text))
        }
    }
}

#[async_trait]
impl PortalBackend for HttpBackend {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let body = self
            .send(self.client.post(self.url("/login")).json(request))
            .await?;
        serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn fetch_contributions(&self, token: Option<&str>) -> Result<Value, ApiError> {
        let mut request = self.client.get(self.url("/contributes"));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }

    async fn submit_contribution(
        &self,
        payload: &ContributionPayload,
        token: &str,
    ) -> Result<Value, ApiError> {
        let file = Part::bytes(payload.file.bytes.clone())
            .file_name(payload.file.file_name.clone())
            .mime_str(&payload.file.mime_type)
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let mut form = Form::new()
            .text("organization", payload.organization.clone())
            .text("request_type", payload.request_type.clone())
            .text("message", payload.message.clone());
        if let Some(name) = &payload.name {
            form = form.text("name", name.clone());
        }
        if let Some(email) = &payload.email {
            form = form.text("email", email.clone());
        }
        form = form.part("file", file);

        self.send(
            self.client
                .post(self.url("/contributes"))
                .bearer_auth(token)
                .multipart(form),
        )
        .await
    }

    async fn fetch_ranking(&self) -> Result<Vec<RankingEntry>, ApiError> {
        // Parsed straight from the text so request type order survives.
        let (text, _) = self
            .send_text(self.client.get(self.url("/contributes/ranking")))
            .await?;
        let items: Vec<RawRankingItem> =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(format_ranking(items))
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.send(self.client.post(self.url("/logout")).bearer_auth(token))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn ranking_uses_fallbacks_and_top_request_type() {
        let items: Vec<RawRankingItem> = serde_json::from_value(json!([
            {
                "user": { "name": "Ana Cruz", "email": "ana@example.gov" },
                "total": 7,
                "request_types": { "submit_dataset": 5, "report_issue": 2 },
                "organization": "Provincial Engineering Office"
            },
            { "total": "3", "request_types": {} }
        ]))
        .unwrap();

        assert_eq!(
            format_ranking(items),
            vec![
                RankingEntry {
                    name: "Ana Cruz".to_string(),
                    department: "Provincial Engineering Office".to_string(),
                    contributions: 7,
                    recent: "Submit Dataset".to_string(),
                },
                RankingEntry {
                    name: "Contributor 2".to_string(),
                    department: "—".to_string(),
                    contributions: 3,
                    recent: "Recent activity".to_string(),
                },
            ]
        );
    }

    #[test]
    fn tied_request_types_keep_payload_order() {
        let items: Vec<RawRankingItem> = serde_json::from_str(
            r#"[
                { "total": 4, "request_types": { "submit_dataset": 2, "feedback": 2 } },
                { "total": 1, "request_types": null }
            ]"#,
        )
        .unwrap();
        let ranking = format_ranking(items);
        assert_eq!(ranking[0].recent, "Submit Dataset");
        assert_eq!(ranking[1].recent, "Recent activity");
    }

    #[test]
    fn error_message_prefers_text_then_json_message() {
        assert_eq!(error_message(&json!("Service down")), "Service down");
        assert_eq!(
            error_message(&json!({ "message": "The email field is required." })),
            "The email field is required."
        );
        assert_eq!(error_message(&json!({ "errors": {} })), UNREACHABLE_MESSAGE);
        assert_eq!(error_message(&Value::Null), UNREACHABLE_MESSAGE);
    }

    #[test]
    fn login_response_reads_either_token_field() {
        let response: LoginResponse = serde_json::from_value(json!({
            "access_token": "abc123",
            "user": { "name": "Admin", "role": "admin" }
        }))
        .unwrap();
        assert_eq!(response.bearer_token(), Some("abc123"));
        assert_eq!(response.role(), Role::Admin);

        let plain: LoginResponse = serde_json::from_value(json!({ "token": "t" })).unwrap();
        assert_eq!(plain.bearer_token(), Some("t"));
        assert_eq!(plain.role(), Role::User);
    }

    #[test]
    fn base_url_is_trimmed() {
        let backend = HttpBackend::new(&ApiConfig {
            base_url: "http://localhost:8000/api/".to_string(),
            ..ApiConfig::default()
        })
        .unwrap();
        assert_eq!(backend.url("/login"), "http://localhost:8000/api/login");
    }

    #[test]
    fn title_case_splits_on_underscores() {
        assert_eq!(title_case("request_dataset"), "Request Dataset");
        assert_eq!(title_case("feedback"), "Feedback");
    }
}
