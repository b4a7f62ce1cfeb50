//! Contribution intake: validation and the submit state machine.

use crate::api::{ApiError, PortalBackend};
use crate::config::MAX_UPLOAD_BYTES;
use serde::Serialize;
use tracing::{info, warn};

pub const SUCCESS_MESSAGE: &str = "Contribution submitted successfully. Thank you!";
pub const FALLBACK_FAILURE: &str = "Submission failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestType {
    pub value: &'static str,
    pub label: &'static str,
}

pub const REQUEST_TYPES: [RequestType; 4] = [
    RequestType {
        value: "submit_dataset",
        label: "Submit Dataset",
    },
    RequestType {
        value: "request_dataset",
        label: "Request Dataset",
    },
    RequestType {
        value: "report_issue",
        label: "Report Issue",
    },
    RequestType {
        value: "feedback",
        label: "General Feedback",
    },
];

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    // documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "text/csv",
    // images
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/svg+xml",
    "image/webp",
    // archives
    "application/zip",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    "application/x-tar",
    "application/gzip",
    // data
    "application/json",
    "application/xml",
    "text/html",
    "text/markdown",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    #[error("Sign in to submit a contribution.")]
    SignInRequired,
    #[error("Organization, request type, and message are required.")]
    MissingFields,
    #[error("Please upload a file.")]
    MissingFile,
    #[error("Please upload a single file.")]
    MultipleFiles,
    #[error("File size must be less than {}MB", .limit / (1024 * 1024))]
    FileTooLarge { size: u64, limit: u64 },
    #[error("Invalid file type. Please upload a supported document, image, or archive file.")]
    UnsupportedType { mime_type: String },
    #[error("A submission is already in progress.")]
    InFlight,
    /// The backend refused the submission. `status` is its HTTP status, if it answered.
    #[error("{message}")]
    Rejected { status: Option<u16>, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mut mime_type = mime_type.into();
        let declared = mime_type.trim();
        if declared.is_empty() || declared == "application/octet-stream" {
            mime_type = mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
        }
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Trimmed fields ready for the multipart POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionPayload {
    pub organization: String,
    pub request_type: String,
    pub message: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub file: Attachment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    Unauthenticated,
    Editing,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormFields {
    pub organization: String,
    pub request_type: String,
    pub message: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ContributionForm {
    token: Option<String>,
    phase: FormPhase,
    fields: FormFields,
    file: Option<Attachment>,
    error: Option<IntakeError>,
    success: Option<&'static str>,
    max_bytes: u64,
}

impl ContributionForm {
    pub fn new(token: Option<String>) -> Self {
        Self::with_limit(token, MAX_UPLOAD_BYTES)
    }

    pub fn with_limit(token: Option<String>, max_bytes: u64) -> Self {
        let token = token.filter(|t| !t.is_empty());
        Self {
            phase: if token.is_some() {
                FormPhase::Editing
            } else {
                FormPhase::Unauthenticated
            },
            token,
            fields: FormFields::default(),
            file: None,
            error: None,
            success: None,
            max_bytes,
        }
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn file(&self) -> Option<&Attachment> {
        self.file.as_ref()
    }

    pub fn error(&self) -> Option<&IntakeError> {
        self.error.as_ref()
    }

    pub fn success(&self) -> Option<&str> {
        self.success
    }

    fn ensure_signed_in(&self) -> Result<(), IntakeError> {
        match self.phase {
            FormPhase::Unauthenticated => Err(IntakeError::SignInRequired),
            _ => Ok(()),
        }
    }

    pub fn edit(&mut self, update: impl FnOnce(&mut FormFields)) -> Result<(), IntakeError> {
        self.ensure_signed_in()?;
        update(&mut self.fields);
        Ok(())
    }

    /// Stores the file if it passes the size and type checks. A rejected file
    /// clears any previous attachment and leaves the text fields alone.
    pub fn attach(&mut self, file: Attachment) -> Result<(), IntakeError> {
        self.ensure_signed_in()?;
        let checked = if file.size() > self.max_bytes {
            Err(IntakeError::FileTooLarge {
                size: file.size(),
                limit: self.max_bytes,
            })
        } else if !ALLOWED_MIME_TYPES.contains(&file.mime_type.as_str()) {
            Err(IntakeError::UnsupportedType {
                mime_type: file.mime_type.clone(),
            })
        } else {
            Ok(())
        };

        match checked {
            Ok(()) => {
                self.file = Some(file);
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.file = None;
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn clear_file(&mut self) {
        self.file = None;
    }

    /// Validates and enters `Submitting`, handing back the payload to send.
    pub fn begin_submit(&mut self) -> Result<ContributionPayload, IntakeError> {
        self.ensure_signed_in()?;
        if self.phase == FormPhase::Submitting {
            return Err(IntakeError::InFlight);
        }

        let organization = self.fields.organization.trim();
        let request_type = self.fields.request_type.trim();
        let message = self.fields.message.trim();
        if organization.is_empty() || request_type.is_empty() || message.is_empty() {
            self.error = Some(IntakeError::MissingFields);
            return Err(IntakeError::MissingFields);
        }
        let Some(file) = self.file.clone() else {
            self.error = Some(IntakeError::MissingFile);
            return Err(IntakeError::MissingFile);
        };

        let payload = ContributionPayload {
            organization: organization.to_string(),
            request_type: request_type.to_string(),
            message: message.to_string(),
            name: non_blank(&self.fields.name),
            email: non_blank(&self.fields.email),
            file,
        };
        self.error = None;
        self.success = None;
        self.phase = FormPhase::Submitting;
        Ok(payload)
    }

    pub fn finish(&mut self, result: Result<(), ApiError>) {
        match result {
            Ok(()) => {
                self.fields = FormFields::default();
                self.file = None;
                self.error = None;
                self.success = Some(SUCCESS_MESSAGE);
                self.phase = FormPhase::Succeeded;
            }
            Err(e) => {
                let message = e.to_string();
                let message = if message.is_empty() {
                    FALLBACK_FAILURE.to_string()
                } else {
                    message
                };
                self.error = Some(IntakeError::Rejected {
                    status: e.status(),
                    message,
                });
                self.phase = FormPhase::Failed;
            }
        }
    }

    pub async fn submit(&mut self, backend: &dyn PortalBackend) -> Result<(), IntakeError> {
        let payload = self.begin_submit()?;
        let token = self.token.clone().unwrap_or_default();
        let result = backend
            .submit_contribution(&payload, &token)
            .await
            .map(|_| ());
        match &result {
            Ok(()) => info!(
                "Contribution from {:?} submitted ({} bytes)",
                payload.organization,
                payload.file.size()
            ),
            Err(e) => warn!("Contribution submit failed: {e}"),
        }
        self.finish(result);
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{LoginRequest, LoginResponse, RankingEntry};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    const MIB: usize = 1024 * 1024;

    #[derive(Default)]
    struct RecordingBackend {
        fail_with: Option<ApiError>,
        sent: Mutex<Vec<(ContributionPayload, String)>>,
    }

    #[async_trait]
    impl PortalBackend for RecordingBackend {
        async fn login(&self, _request: &LoginRequest) -> Result<LoginResponse, ApiError> {
            Ok(LoginResponse::default())
        }

        async fn fetch_contributions(&self, _token: Option<&str>) -> Result<Value, ApiError> {
            Ok(json!([]))
        }

        async fn submit_contribution(
            &self,
            payload: &ContributionPayload,
            token: &str,
        ) -> Result<Value, ApiError> {
            self.sent
                .lock()
                .unwrap()
                .push((payload.clone(), token.to_string()));
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(json!({ "message": "created" })),
            }
        }

        async fn fetch_ranking(&self) -> Result<Vec<RankingEntry>, ApiError> {
            Ok(Vec::new())
        }

        async fn logout(&self, _token: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn filled_form() -> ContributionForm {
        let mut form = ContributionForm::new(Some("token-1".to_string()));
        form.edit(|f| {
            f.organization = "  Provincial Planning Office ".to_string();
            f.request_type = "submit_dataset".to_string();
            f.message = "New barangay boundaries".to_string();
            f.email = "   ".to_string();
        })
        .unwrap();
        form
    }

    #[test]
    fn oversized_file_is_rejected_and_not_stored() {
        let mut form = filled_form();
        form.attach(Attachment::new("big.pdf", "application/pdf", vec![0; 4 * MIB]))
            .unwrap();

        let err = form
            .attach(Attachment::new("huge.pdf", "application/pdf", vec![0; 6 * MIB]))
            .unwrap_err();
        assert_eq!(err.to_string(), "File size must be less than 5MB");
        assert!(form.file().is_none());
        assert_eq!(form.fields().request_type, "submit_dataset");
    }

    #[test]
    fn executable_is_rejected_by_type() {
        let mut form = filled_form();
        let err = form
            .attach(Attachment::new("setup.exe", "", vec![0; 16]))
            .unwrap_err();
        assert!(matches!(err, IntakeError::UnsupportedType { .. }));
        assert!(form.file().is_none());
    }

    #[test]
    fn four_mib_pdf_is_accepted() {
        let mut form = filled_form();
        form.attach(Attachment::new("report.pdf", "application/octet-stream", vec![0; 4 * MIB]))
            .unwrap();
        assert_eq!(form.file().unwrap().mime_type, "application/pdf");
        assert_eq!(form.error(), None);
    }

    #[test]
    fn unauthenticated_form_refuses_everything() {
        let mut form = ContributionForm::new(None);
        assert_eq!(form.phase(), FormPhase::Unauthenticated);
        assert_eq!(form.edit(|_| {}), Err(IntakeError::SignInRequired));
        assert_eq!(form.begin_submit(), Err(IntakeError::SignInRequired));
    }

    #[test]
    fn missing_fields_are_reported_before_missing_file() {
        let mut form = ContributionForm::new(Some("t".to_string()));
        assert_eq!(form.begin_submit(), Err(IntakeError::MissingFields));

        let mut form = filled_form();
        assert_eq!(form.begin_submit(), Err(IntakeError::MissingFile));
        assert_eq!(form.phase(), FormPhase::Editing);
    }

    #[test]
    fn second_submit_while_in_flight_is_refused() {
        let mut form = filled_form();
        form.attach(Attachment::new("a.csv", "text/csv", b"a,b\n1,2\n".to_vec()))
            .unwrap();
        let payload = form.begin_submit().unwrap();
        assert_eq!(payload.organization, "Provincial Planning Office");
        assert_eq!(payload.email, None);
        assert_eq!(form.begin_submit(), Err(IntakeError::InFlight));
    }

    #[tokio::test]
    async fn successful_submit_clears_the_form() {
        let backend = RecordingBackend::default();
        let mut form = filled_form();
        form.attach(Attachment::new("a.csv", "text/csv", b"x".to_vec()))
            .unwrap();

        form.submit(&backend).await.unwrap();
        assert_eq!(form.phase(), FormPhase::Succeeded);
        assert_eq!(form.success(), Some(SUCCESS_MESSAGE));
        assert_eq!(form.fields(), &FormFields::default());
        assert!(form.file().is_none());

        let sent = backend.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "token-1");
    }

    #[tokio::test]
    async fn failed_submit_keeps_fields_and_can_retry() {
        let backend = RecordingBackend {
            fail_with: Some(ApiError::Status {
                status: 422,
                message: "The file field is required.".to_string(),
            }),
            ..RecordingBackend::default()
        };
        let mut form = filled_form();
        form.attach(Attachment::new("a.pdf", "application/pdf", vec![1]))
            .unwrap();

        let err = form.submit(&backend).await.unwrap_err();
        assert_eq!(
            err,
            IntakeError::Rejected {
                status: Some(422),
                message: "The file field is required.".to_string(),
            }
        );
        assert_eq!(form.phase(), FormPhase::Failed);
        assert!(form.file().is_some());
        assert_eq!(form.fields().message, "New barangay boundaries");

        assert!(form.begin_submit().is_ok());
    }

    #[test]
    fn empty_failure_message_uses_fallback() {
        let mut form = filled_form();
        form.finish(Err(ApiError::Transport(String::new())));
        assert_eq!(
            form.error(),
            Some(&IntakeError::Rejected {
                status: None,
                message: FALLBACK_FAILURE.to_string(),
            })
        );
    }
}
