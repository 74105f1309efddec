use log::{error, info};
use serde::Serialize;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// The response for one event: a status code and the message that was logged for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl FilterOutcome {
    /// Logs `message` and wraps it as the response body.
    pub fn respond(status_code: u16, message: impl Into<String>) -> Self {
        let body = message.into();
        if status_code < STATUS_BAD_REQUEST {
            info!("{}", body);
        } else {
            error!("{}", body);
        }
        Self { status_code, body }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::respond(STATUS_OK, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::respond(STATUS_BAD_REQUEST, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::respond(STATUS_INTERNAL_ERROR, message)
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}
