use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("validation - {0}")]
    Validation(String),
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("not_found - {0}")]
    NotFound(String),
    /// Identity provider failure. `code` is the provider's error code.
    #[error("auth - {message} ({code})")]
    Auth { code: String, message: String },
    #[error("remote_write - {0}")]
    RemoteWrite(String),
    #[error("import_format - {0}")]
    ImportFormat(String),
    #[error("permission_denied - {0}")]
    PermissionDenied(String),
    #[error("unsupported_capability - {0}")]
    UnsupportedCapability(String),
    #[error("io_error - {0}")]
    Io(String),
}

impl AppError {
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::NotFound(message.into())
    }

    pub fn auth<C: Into<String>, M: Into<String>>(code: C, message: M) -> Self {
        Self::Auth {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Wraps a failed backend call with the action the user attempted.
    pub fn remote_write(action: &str, cause: &AppError) -> Self {
        Self::RemoteWrite(format!("{action}: {}", cause.message()))
    }

    pub fn import_format<M: Into<String>>(message: M) -> Self {
        Self::ImportFormat(message.into())
    }

    pub fn permission_denied<M: Into<String>>(message: M) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn unsupported<M: Into<String>>(message: M) -> Self {
        Self::UnsupportedCapability(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::NotFound(_) => "not_found",
            Self::Auth { .. } => "auth",
            Self::RemoteWrite(_) => "remote_write",
            Self::ImportFormat(_) => "import_format",
            Self::PermissionDenied(_) => "permission_denied",
            Self::UnsupportedCapability(_) => "unsupported_capability",
            Self::Io(_) => "io_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message)
            | Self::InvalidInput(message)
            | Self::InvalidData(message)
            | Self::NotFound(message)
            | Self::RemoteWrite(message)
            | Self::ImportFormat(message)
            | Self::PermissionDenied(message)
            | Self::UnsupportedCapability(message)
            | Self::Io(message) => message,
            Self::Auth { message, .. } => message,
        }
    }

    /// Provider error code for auth failures.
    pub fn auth_code(&self) -> Option<&str> {
        match self {
            Self::Auth { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData(err.to_string())
    }
}
