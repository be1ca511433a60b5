use std::sync::{Arc, PoisonError};

use axum::extract::State as AxumState;
use axum::response::{IntoResponse, Response};
use http::StatusCode;
use http::header::CONTENT_TYPE;

use crate::http::State;

impl State {
    pub(crate) fn ready(&self) -> Readiness {
        if self.discovery.is_ready() {
            Readiness::Ready
        } else {
            Readiness::NotReady
        }
    }

    pub(crate) fn metrics(&self) -> String {
        let mut buffer = String::new();
        let registry = crate::metrics::REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match prometheus_client::encoding::text::encode(&mut buffer, &registry) {
            Ok(_) => buffer,
            Err(_) => "".into(),
        }
    }
}

pub(crate) async fn metrics(AxumState(handler): AxumState<Arc<State>>) -> String {
    handler.metrics()
}

pub(crate) async fn readyz(AxumState(handler): AxumState<Arc<State>>) -> Readiness {
    handler.ready()
}

pub(crate) enum Readiness {
    Ready,
    NotReady,
}

impl IntoResponse for Readiness {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Readiness::Ready => (StatusCode::OK, "Ok"),
            Readiness::NotReady => (StatusCode::INTERNAL_SERVER_ERROR, "NotReady"),
        };
        (status, [(CONTENT_TYPE, "text/plain")], body).into_response()
    }
}
