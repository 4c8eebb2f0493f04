use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

pub type AppResult<T> = Result<T, Error>;

/// everything that can go wrong between the browser and the upstream
///
/// the upstream kinds are kept apart so the pages can show something useful (country block
/// hint for `IncompatibleStream`/`NoUrl`, the upstream status for `UpstreamStatus` and so on)
#[derive(thiserror::Error, Debug)]
pub enum Error {
    // retries were exhausted or the error was not worth retrying
    #[error("upstream request failed: {0}")]
    Network(String),

    #[error("{context}: got status code {status}")]
    UpstreamStatus { context: &'static str, status: u16 },

    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    #[error("version not found")]
    VersionNotFound,

    #[error("script not found")]
    ScriptNotFound,

    #[error("clientid not found")]
    IdNotFound,

    #[error("entity of incorrect kind")]
    KindNotCorrect,

    #[error("incompatible stream")]
    IncompatibleStream,

    #[error("no url")]
    NoUrl,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal server error")]
    InternalServerError,

    #[error("{0}")]
    InternalServerErrorWithContext(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::NoUrl => StatusCode::NOT_FOUND,
            Self::IncompatibleStream => StatusCode::EXPECTATION_FAILED,
            Self::KindNotCorrect => StatusCode::NOT_FOUND,
            Self::Network(_)
            | Self::Decode(_)
            | Self::VersionNotFound
            | Self::ScriptNotFound
            | Self::IdNotFound => StatusCode::BAD_GATEWAY,
            Self::InternalServerError | Self::InternalServerErrorWithContext(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!("request failed ({}): {}", status, self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
