use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("Capability not available: {port}")]
    Unavailable { port: &'static str },

    #[error("IO error ({kind}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Network error during {operation} ({stage}): {details}")]
    Http {
        operation: &'static str,
        stage: HttpStage,
        details: String,
    },

    #[error("{operation} failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        operation: &'static str,
        status: u16,
        body_snippet: String,
    },

    #[error("{strategy} rejected the request: {details}")]
    Rejected {
        strategy: &'static str,
        details: String,
    },

    #[error("Platform error in {context}: {details}")]
    Platform {
        context: &'static str,
        details: String,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStage {
    #[error("request")]
    Request,
    #[error("response parse")]
    ResponseParse,
}

impl PortError {
    pub fn unavailable(port: &'static str) -> Self {
        Self::Unavailable { port }
    }

    pub fn http_request(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Http {
            operation,
            stage: HttpStage::Request,
            details: details.into(),
        }
    }

    pub fn http_request_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::http_request(operation, error.to_string())
    }

    pub fn http_parse(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Http {
            operation,
            stage: HttpStage::ResponseParse,
            details: details.into(),
        }
    }

    pub fn http_parse_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::http_parse(operation, error.to_string())
    }

    pub fn rejected(strategy: &'static str, details: impl Into<String>) -> Self {
        Self::Rejected {
            strategy,
            details: details.into(),
        }
    }

    pub fn platform(context: &'static str, details: impl Into<String>) -> Self {
        Self::Platform {
            context,
            details: details.into(),
        }
    }
}

impl From<std::io::Error> for PortError {
    fn from(err: std::io::Error) -> Self {
        PortError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
