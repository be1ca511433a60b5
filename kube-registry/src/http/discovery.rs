use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State as AxumState};
use kube_registry_discovery::{MicroService, MicroServiceInstance};
use kube_registry_sync::Selector;
use serde::Deserialize;

use crate::Result;
use crate::http::State;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InstanceQuery {
    /// `key=value` pairs every instance's pod must carry.
    tags: Option<String>,
}

pub(crate) async fn services(
    AxumState(state): AxumState<Arc<State>>,
) -> Result<Json<Vec<MicroService>>> {
    Ok(Json(state.discovery.get_all_services()?))
}

pub(crate) async fn instances(
    AxumState(state): AxumState<Arc<State>>,
    Path(service): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> Result<Json<Vec<MicroServiceInstance>>> {
    let tags: Selector = query.tags.as_deref().unwrap_or_default().parse()?;
    Ok(Json(state.discovery.find_endpoints(&service, &tags)?))
}
