use axum::{
    Json,
    response::{IntoResponse, Response},
};
use derive_builder::Builder;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Builder, Serialize)]
#[builder(
    pattern = "owned",
    setter(into),
    build_fn(error = "std::convert::Infallible")
)]
pub struct Error {
    #[builder(default)]
    pub message: String,
    #[builder(default)]
    pub data: Option<serde_json::Value>,
    #[builder(default)]
    #[serde(skip_serializing)]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Error {
            message: message.into(),
            data: None,
            source: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum A2aServerError {
    #[error("JSON parse error: {}", .0.message)]
    JsonParseError(Error),
    #[error("Invalid request: {}", .0.message)]
    InvalidRequest(Error),
    #[error("Method not found: {}", .0.message)]
    MethodNotFoundError(Error),
    #[error("Invalid params: {}", .0.message)]
    InvalidParamsError(Error),
    #[error("Internal error: {}", .0.message)]
    InternalError(Error),
    #[error("Task not found: {}", .0.message)]
    TaskNotFoundError(Error),
    #[error("Task not cancelable: {}", .0.message)]
    TaskNotCancelableError(Error),
    #[error("Push notification not supported: {}", .0.message)]
    PushNotificationNotSupportedError(Error),
    #[error("Unsupported operation: {}", .0.message)]
    UnsupportedOperationError(Error),
    #[error("Content type not supported: {}", .0.message)]
    ContentTypeNotSupportedError(Error),
    #[error("Invalid agent response: {}", .0.message)]
    InvalidAgentResponseError(Error),
}

impl A2aServerError {
    pub fn internal(message: impl Into<String>) -> Self {
        A2aServerError::InternalError(Error::new(message))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        A2aServerError::InvalidParamsError(Error::new(message))
    }

    pub fn task_not_found(task_id: &str) -> Self {
        A2aServerError::TaskNotFoundError(
            ErrorBuilder::default()
                .message("Task not found")
                .data(Some(serde_json::json!({ "taskId": task_id })))
                .build()
                .unwrap_or_else(|never| match never {}),
        )
    }

    fn inner(&self) -> &Error {
        match self {
            A2aServerError::JsonParseError(err)
            | A2aServerError::InvalidRequest(err)
            | A2aServerError::MethodNotFoundError(err)
            | A2aServerError::InvalidParamsError(err)
            | A2aServerError::InternalError(err)
            | A2aServerError::TaskNotFoundError(err)
            | A2aServerError::TaskNotCancelableError(err)
            | A2aServerError::PushNotificationNotSupportedError(err)
            | A2aServerError::UnsupportedOperationError(err)
            | A2aServerError::ContentTypeNotSupportedError(err)
            | A2aServerError::InvalidAgentResponseError(err) => err,
        }
    }

    pub fn json_rpc_code(&self) -> i32 {
        match self {
            A2aServerError::JsonParseError(_) => -32700,
            A2aServerError::InvalidRequest(_) => -32600,
            A2aServerError::MethodNotFoundError(_) => -32601,
            A2aServerError::InvalidParamsError(_) => -32602,
            A2aServerError::InternalError(_) => -32603,
            A2aServerError::TaskNotFoundError(_) => -32001,
            A2aServerError::TaskNotCancelableError(_) => -32002,
            A2aServerError::PushNotificationNotSupportedError(_) => -32003,
            A2aServerError::UnsupportedOperationError(_) => -32004,
            A2aServerError::ContentTypeNotSupportedError(_) => -32005,
            A2aServerError::InvalidAgentResponseError(_) => -32006,
        }
    }

    pub fn message(&self) -> String {
        self.inner().message.clone()
    }

    pub fn data(&self) -> Option<serde_json::Value> {
        self.inner().data.clone()
    }
}

impl Serialize for A2aServerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner().serialize(serializer)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    name: String,
    message: String,
}

impl IntoResponse for A2aServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            A2aServerError::JsonParseError(_)
            | A2aServerError::InvalidRequest(_)
            | A2aServerError::InvalidParamsError(_)
            | A2aServerError::ContentTypeNotSupportedError(_) => http::StatusCode::BAD_REQUEST,
            A2aServerError::MethodNotFoundError(_) | A2aServerError::TaskNotFoundError(_) => {
                http::StatusCode::NOT_FOUND
            }
            A2aServerError::TaskNotCancelableError(_) => http::StatusCode::CONFLICT,
            A2aServerError::PushNotificationNotSupportedError(_)
            | A2aServerError::UnsupportedOperationError(_) => http::StatusCode::NOT_IMPLEMENTED,
            A2aServerError::InternalError(_) | A2aServerError::InvalidAgentResponseError(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let name = match &self {
            A2aServerError::JsonParseError(_) => "JsonParseError",
            A2aServerError::InvalidRequest(_) => "InvalidRequest",
            A2aServerError::MethodNotFoundError(_) => "MethodNotFound",
            A2aServerError::InvalidParamsError(_) => "InvalidParams",
            A2aServerError::InternalError(_) => "InternalError",
            A2aServerError::TaskNotFoundError(_) => "TaskNotFound",
            A2aServerError::TaskNotCancelableError(_) => "TaskNotCancelable",
            A2aServerError::PushNotificationNotSupportedError(_) => "PushNotificationNotSupported",
            A2aServerError::UnsupportedOperationError(_) => "UnsupportedOperation",
            A2aServerError::ContentTypeNotSupportedError(_) => "ContentTypeNotSupported",
            A2aServerError::InvalidAgentResponseError(_) => "InvalidAgentResponse",
        };
        (
            status,
            Json(ErrorResponse {
                name: name.to_string(),
                message: self.message(),
            }),
        )
            .into_response()
    }
}
