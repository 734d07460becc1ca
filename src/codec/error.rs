//! Codec-level errors (spec §7: wire error, dialect error, type mismatch,
//! empty-body surprise).

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },

    #[error("malformed header xml")]
    MalformedHeader(#[source] quick_xml::DeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid utf-8 in xml input")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("missing size source for native slice field {field}")]
    MissingSizeSource { field: &'static str },

    #[error("unknown field kind during native (de)serialization: {0}")]
    UnknownKind(&'static str),

    #[error("native base64 field {field} expected {expected} raw bytes, decoded {got}")]
    BadBase64Length {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),

    #[error("xml (de)serialization failed")]
    Xml(#[source] quick_xml::DeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("expected message type '{expected}', got '{got}'")]
    TypeMismatch { expected: String, got: String },

    #[error("empty body for response type '{0}', which is not CollOprStat_PI")]
    EmptyBody(String),

    #[error("unsupported payload shape for field {0}")]
    UnsupportedPayload(&'static str),
}
