//! Cookie-backed session context and the dashboard role gate.
//!
//! The role cookie is trusted as sent; the gate only steers navigation.

use axum::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, IntoResponseParts, Redirect, Response, ResponseParts};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, warn};

pub const TOKEN_COOKIE: &str = "authToken";
pub const ROLE_COOKIE: &str = "userRole";
/// Seven days, used when the user asks to be remembered.
pub const REMEMBER_MAX_AGE: u64 = 7 * 24 * 60 * 60;

const GATED_PREFIX: &str = "/dashboard";
const GATE_REDIRECT: &str = "/contribute";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Anything other than `admin` is an ordinary user.
    pub fn parse(value: &str) -> Self {
        if value.trim() == "admin" {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Where to send the user after signing in.
    pub fn landing_path(&self) -> &'static str {
        match self {
            Role::Admin => "/dashboard",
            Role::User => "/contribute",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub role: Role,
}

impl Session {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut session = Session::default();
        for header in headers.get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            for pair in header.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                let value = percent_decode(value.trim());
                match name.trim() {
                    TOKEN_COOKIE if !value.is_empty() => session.token = Some(value),
                    ROLE_COOKIE => session.role = Role::parse(&value),
                    _ => {}
                }
            }
        }
        session
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_signed_in() && self.role == Role::Admin
    }

    pub fn can_access(&self, path: &str) -> bool {
        if path.starts_with(GATED_PREFIX) {
            self.is_admin()
        } else {
            true
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Session::from_headers(&parts.headers))
    }
}

/// The only way handlers write the session cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Establish {
        token: String,
        role: Role,
        remember: bool,
    },
    Clear,
}

impl SessionUpdate {
    pub fn establish(token: impl Into<String>, role: Role, remember: bool) -> Self {
        SessionUpdate::Establish {
            token: token.into(),
            role,
            remember,
        }
    }

    pub fn clear() -> Self {
        SessionUpdate::Clear
    }

    pub fn cookies(&self) -> Vec<String> {
        match self {
            SessionUpdate::Establish {
                token,
                role,
                remember,
            } => {
                let max_age = if *remember {
                    format!("; Max-Age={REMEMBER_MAX_AGE}")
                } else {
                    String::new()
                };
                vec![
                    format!("{TOKEN_COOKIE}={}; Path=/; SameSite=Lax{max_age}", percent_encode(token)),
                    format!("{ROLE_COOKIE}={}; Path=/; SameSite=Lax{max_age}", role.as_str()),
                ]
            }
            SessionUpdate::Clear => vec![
                format!("{TOKEN_COOKIE}=; Path=/; Max-Age=0"),
                format!("{ROLE_COOKIE}=; Path=/; Max-Age=0"),
            ],
        }
    }
}

impl IntoResponseParts for SessionUpdate {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for cookie in self.cookies() {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    res.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => warn!("Dropping unencodable session cookie: {e}"),
            }
        }
        Ok(res)
    }
}

/// Middleware sending non-admins away from gated paths.
pub async fn role_gate(session: Session, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if session.can_access(path) {
        next.run(request).await
    } else {
        debug!("Role gate redirecting {path} to {GATE_REDIRECT}");
        Redirect::to(GATE_REDIRECT).into_response()
    }
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'|' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(byte) = hex {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
