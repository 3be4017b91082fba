use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_macros::FromRequest;
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToResponse;
use validator::ValidationErrors;

use crate::domain::FieldErrors;

/// Envelope wrapping every successful API response
#[derive(Serialize)]
#[cfg_attr(test, derive(serde::Deserialize, Debug))]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Builds a successful envelope carrying [data]
    pub fn success(message: &str, data: T) -> ApiResponse<T> {
        ApiResponse {
            success: true,
            message: message.to_owned(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Builds a successful envelope with no payload
    pub fn message_only(message: &str) -> ApiResponse<()> {
        ApiResponse {
            success: true,
            message: message.to_owned(),
            data: None,
        }
    }
}

/// Envelope wrapping every failed API response
#[derive(Serialize, Debug, ToResponse)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[response(examples(
    ("Not Found" = (
        summary = "Entity could not be found (404)",
        value = json!({
            "success": false,
            "message": "Task not found"
        })
    )),

    ("Validation Failure" = (
        summary = "Submitted data was invalid (422)",
        value = json!({
            "success": false,
            "message": "Validation failed",
            "errors": {
                "title": ["The task title is required."]
            }
        })
    )),

    ("Conflict" = (
        summary = "A business rule blocked the request (400)",
        value = json!({
            "success": false,
            "message": "Cannot delete user. User has 3 associated tasks."
        })
    )),

    ("Internal Failure" = (
        summary = "Something unexpected went wrong inside the server (500)",
        value = json!({
            "success": false,
            "message": "Error retrieving tasks: could not reach the database"
        })
    ))
))]
pub struct ApiErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<String, Vec<String>>>,
}

/// Converts [ValidationErrors] produced by DTO validation into the
/// field-to-messages map the API surfaces
fn validation_errors_to_map(errors: &ValidationErrors) -> HashMap<String, Vec<String>> {
    errors
        .field_errors()
        .iter()
        .map(|(field, field_errs)| {
            let messages = field_errs
                .iter()
                .map(|field_err| match field_err.message {
                    Some(ref message) => message.clone().into_owned(),
                    None => format!("The {} field is invalid.", field.replace('_', " ")),
                })
                .collect();

            ((*field).to_owned(), messages)
        })
        .collect()
}

/// Response type surfacing field validation failures as a 422
pub struct ValidationErrorResponse(HashMap<String, Vec<String>>);

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(value: ValidationErrors) -> Self {
        ValidationErrorResponse(validation_errors_to_map(&value))
    }
}

impl From<FieldErrors> for ValidationErrorResponse {
    fn from(value: FieldErrors) -> Self {
        ValidationErrorResponse(value.into_map())
    }
}

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiErrorResponse {
                success: false,
                message: "Validation failed".to_owned(),
                errors: Some(self.0),
            }),
        )
            .into_response()
    }
}

/// Response type for requests naming an entity that does not exist
pub struct NotFoundErrorResponse(pub String);

impl IntoResponse for NotFoundErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::NOT_FOUND,
            Json(ApiErrorResponse {
                success: false,
                message: self.0,
                errors: None,
            }),
        )
            .into_response()
    }
}

/// Response type for business-rule conflicts, such as deleting a user who
/// still owns tasks
pub struct ConflictErrorResponse(pub String);

impl IntoResponse for ConflictErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse {
                success: false,
                message: self.0,
                errors: None,
            }),
        )
            .into_response()
    }
}

/// Response type for unexpected failures. The envelope names the action that
/// failed plus the outermost error context.
pub struct GenericErrorResponse {
    action: &'static str,
    cause: anyhow::Error,
}

impl GenericErrorResponse {
    pub fn new(action: &'static str, cause: anyhow::Error) -> GenericErrorResponse {
        GenericErrorResponse { action, cause }
    }
}

impl IntoResponse for GenericErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiErrorResponse {
                success: false,
                message: format!("Error {}: {}", self.action, self.cause),
                errors: None,
            }),
        )
            .into_response()
    }
}

/// Wrapper for [axum::Json] which customizes the error response to use our
/// data structure for API errors
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(JsonErrorResponse))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Response type representing JSON parse errors
pub struct JsonErrorResponse {
    parse_problem: String,
}

impl From<JsonRejection> for JsonErrorResponse {
    fn from(value: JsonRejection) -> Self {
        JsonErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for JsonErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            axum::Json(ApiErrorResponse {
                success: false,
                message: format!(
                    "The request body contained malformed or unreadable JSON. {}",
                    self.parse_problem
                ),
                errors: None,
            }),
        )
            .into_response()
    }
}
