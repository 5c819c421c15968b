use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error that fails a whole invocation.
///
/// Collaborator failures inside a run are absorbed by the job and never
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid request body: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    /// The run itself died, e.g. a panic inside the job task.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "AI Manager invocation failed");

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
