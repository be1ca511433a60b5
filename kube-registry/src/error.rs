use axum::response::{IntoResponse, Response};
use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Discovery(#[from] kube_registry_discovery::Error),

    #[error(transparent)]
    Sync(#[from] kube_registry_sync::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn status(&self) -> StatusCode {
        use kube_registry_sync::Error as SyncError;

        match self {
            Error::Discovery(kube_registry_discovery::Error::Sync(e)) | Error::Sync(e) => match e {
                SyncError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
                SyncError::NotFound { .. } => StatusCode::NOT_FOUND,
                SyncError::InvalidSelector(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
