use serde::{Deserialize, Serialize};

/// The error body returned by the API on a failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(flatten)]
    pub kind: ErrorKind,
}

/// The error kinds a bot is likely to hit. Anything else maps to `Unknown`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    UnknownUser,
    UnknownChannel,
    UnknownAttachment,
    UnknownMessage,
    UnknownServer,
    EmptyMessage,
    PayloadTooLarge,
    TooManyAttachments { max: u32 },
    MissingPermission { permission: String },
    MissingUserPermission { permission: String },
    NotFound,
    NotPrivileged,
    InvalidSession,
    InvalidOperation,
    InternalError,
    DuplicateNonce,
    FailedValidation { error: String },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_kind_with_fields() {
        let raw = r#"{"type":"MissingPermission","permission":"SendMessage","location":"x.rs:1"}"#;
        let err: Error = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            err.kind,
            ErrorKind::MissingPermission { ref permission } if permission == "SendMessage"
        ));
        assert_eq!(err.location.as_deref(), Some("x.rs:1"));
    }

    #[test]
    fn unknown_kinds_do_not_fail() {
        let err: Error = serde_json::from_str(r#"{"type":"VosoUnavailable"}"#).unwrap();
        assert!(matches!(err.kind, ErrorKind::Unknown));
    }
}
