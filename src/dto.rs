use crate::domain::paging::Page;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::OpenApi;
use validator::ValidationError;

pub mod task;
pub mod user;

pub use task::{NewTask, Task, TaskListParams, UpdateTask, UserAssignment};
pub use user::{NewUser, UpdateUser, User, UserListParams};

/// OpenAPI schema definitions for the API's data transfer objects
#[derive(OpenApi)]
#[openapi(components(schemas(
    task::Task,
    task::NewTask,
    task::UpdateTask,
    task::TaskStatus,
    task::TaskPriority,
    task::UserAssignment,
    user::User,
    user::NewUser,
    user::UpdateUser,
)))]
pub struct OpenApiSchemas;

/// One page of API results plus the pagination metadata callers use to walk
/// the full listing
#[derive(Serialize)]
#[cfg_attr(test, derive(Deserialize, PartialEq, Debug))]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub from: Option<i64>,
    pub last_page: u32,
    pub per_page: u32,
    pub to: Option<i64>,
    pub total: i64,
    pub has_more_pages: bool,
}

impl<D, T: From<D>> From<Page<D>> for Paginated<T> {
    fn from(page: Page<D>) -> Self {
        let from = page.from_index();
        let to = page.to_index();
        let has_more_pages = page.has_more_pages();

        Paginated {
            current_page: page.current_page,
            from,
            last_page: page.last_page,
            per_page: page.per_page,
            to,
            total: page.total,
            has_more_pages,
            data: page.items.into_iter().map(T::from).collect(),
        }
    }
}

/// Deserializes an optional string field, mapping an empty or all-whitespace
/// value to None the way HTML form submissions expect
pub(crate) fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let maybe_text: Option<String> = Option::deserialize(deserializer)?;
    Ok(maybe_text.filter(|text| !text.trim().is_empty()))
}

/// Validator rule rejecting values that are empty after trimming
pub(crate) fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("non_blank"))
    } else {
        Ok(())
    }
}
