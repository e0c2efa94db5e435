use eduadmin_api::ErrorBody;

/// Fallback text when a failure carries no usable message.
pub const GENERIC_FAILURE: &str = "request failed";

/// Classified request failure.
///
/// `Display` is the user-facing text; the client notifies it before the
/// error is returned, so callers should not report it again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The backend answered with an envelope whose `code` is not 0.
    #[error("{message}")]
    Application { code: i64, message: String },

    /// HTTP 401. The stored credential has been cleared.
    #[error("session expired, please sign in again")]
    Unauthorized,

    #[error("you do not have permission to access this resource")]
    Forbidden,

    #[error("the requested resource does not exist")]
    NotFound,

    #[error("internal server error")]
    Server,

    /// Any other non-2xx status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// No response: connection failure or timeout.
    #[error("network error, please check your connection")]
    Network { detail: String },

    /// Local failure: bad URL, undecodable body, and the like.
    #[error("{}", or_generic(.0))]
    Client(String),
}

fn or_generic(message: &str) -> &str {
    if message.trim().is_empty() {
        GENERIC_FAILURE
    } else {
        message
    }
}

impl ApiError {
    /// Build an application error, substituting the fallback for an empty message.
    pub fn application(code: i64, message: &str) -> Self {
        let message = if message.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            message.to_string()
        };
        Self::Application { code, message }
    }

    /// Classify a non-2xx HTTP status. `body` is the raw response text.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 => Self::Server,
            _ => {
                let message = serde_json::from_str::<ErrorBody>(body)
                    .ok()
                    .and_then(|b| b.message)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| format!("{GENERIC_FAILURE} ({status})"));
                Self::Status { status, message }
            }
        }
    }

    /// Classify a transport-level failure from reqwest.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::Client(err.to_string());
        }
        if err.is_timeout() || err.is_connect() || err.is_request() {
            return Self::Network {
                detail: err.to_string(),
            };
        }
        Self::Client(err.to_string())
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// HTTP status behind this error, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Forbidden => Some(403),
            Self::NotFound => Some(404),
            Self::Server => Some(500),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
