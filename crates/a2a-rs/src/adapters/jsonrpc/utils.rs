use std::fmt::Debug;

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use tracing::error;
use utoipa::IntoResponses;

use crate::{errors::A2aServerError, types::Task};

pub fn map_optional_task_to_not_found(task: Option<Task>) -> Result<Task, A2aServerError> {
    task.ok_or_else(|| A2aServerError::TaskNotFoundError(crate::errors::Error::new("Failed to find task")))
}

/// Plain JSON body on success, the error's own response otherwise.
pub struct JsonResponse<T: Serialize, E: Serialize>(Result<T, E>);

impl<T: Serialize, E: Serialize + IntoResponse> IntoResponses for JsonResponse<T, E> {
    fn responses() -> std::collections::BTreeMap<
        String,
        utoipa::openapi::RefOr<utoipa::openapi::response::Response>,
    > {
        std::collections::BTreeMap::new()
    }
}

impl<T: Serialize, E: Serialize + IntoResponse + Debug> IntoResponse for JsonResponse<T, E> {
    fn into_response(self) -> Response {
        match self.0 {
            Ok(value) => (StatusCode::OK, Json(value)).into_response(),
            Err(error) => {
                error!(?error, "Request failed");
                error.into_response()
            }
        }
    }
}

impl<T: Serialize, E: Serialize> From<Result<T, E>> for JsonResponse<T, E> {
    fn from(result: Result<T, E>) -> Self {
        JsonResponse(result)
    }
}
