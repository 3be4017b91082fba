use crate::domain;
use crate::domain::paging::PageRequest;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Default page size on the user listing surface
pub(crate) const DEFAULT_USER_PAGE_SIZE: u32 = 15;

/// DTO for a user returned by the API. The stored password hash is never
/// serialized.
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, PartialEq, Debug))]
pub struct User {
    #[schema(example = 4)]
    pub id: i32,
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "john.doe@example.com")]
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of tasks assigned to this user; populated on single-user fetches
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 3)]
    pub tasks_count: Option<i64>,
}

impl User {
    /// Annotates a fetched user with the number of tasks they own
    pub fn with_task_count(user: domain::user::User, tasks_count: i64) -> Self {
        User {
            tasks_count: Some(tasks_count),
            ..User::from(user)
        }
    }
}

impl From<domain::user::User> for User {
    fn from(value: domain::user::User) -> Self {
        User {
            id: value.id,
            name: value.name,
            email: value.email,
            created_at: value.created_at,
            updated_at: value.updated_at,
            tasks_count: None,
        }
    }
}

/// DTO for creating a new user via the API
#[derive(Deserialize, Display, Validate, ToSchema)]
#[display("{name}")]
#[cfg_attr(test, derive(Serialize))]
pub struct NewUser {
    #[schema(example = "John Doe")]
    #[validate(
        custom(function = "crate::dto::non_blank", message = "The name field is required."),
        length(max = 255, message = "The name may not be greater than 255 characters.")
    )]
    pub name: String,
    #[schema(example = "john.doe@example.com")]
    #[validate(
        email(message = "The email must be a valid email address."),
        length(max = 255, message = "The email may not be greater than 255 characters.")
    )]
    pub email: String,
    /// Optional; a fixed placeholder password is hashed when absent
    #[serde(default, deserialize_with = "crate::dto::empty_string_as_none")]
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: Option<String>,
}

impl From<NewUser> for domain::user::CreateUser {
    fn from(value: NewUser) -> Self {
        domain::user::CreateUser {
            name: value.name.trim().to_owned(),
            email: value.email.trim().to_owned(),
            password: value.password,
        }
    }
}

/// DTO for replacing a user's fields via the API. An absent password keeps
/// the stored hash.
#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UpdateUser {
    #[validate(
        custom(function = "crate::dto::non_blank", message = "The name field is required."),
        length(max = 255, message = "The name may not be greater than 255 characters.")
    )]
    pub name: String,
    #[validate(
        email(message = "The email must be a valid email address."),
        length(max = 255, message = "The email may not be greater than 255 characters.")
    )]
    pub email: String,
    #[serde(default, deserialize_with = "crate::dto::empty_string_as_none")]
    #[validate(length(min = 8, message = "The password must be at least 8 characters."))]
    pub password: Option<String>,
}

impl From<UpdateUser> for domain::user::UpdateUser {
    fn from(value: UpdateUser) -> Self {
        domain::user::UpdateUser {
            name: value.name.trim().to_owned(),
            email: value.email.trim().to_owned(),
            password: value.password,
        }
    }
}

/// Query parameters accepted by the user listing endpoint
#[derive(Deserialize, IntoParams)]
#[cfg_attr(test, derive(Serialize))]
#[into_params(parameter_in = Query)]
pub struct UserListParams {
    /// Case-insensitive fragment matched against user names and emails
    #[serde(default, deserialize_with = "crate::dto::empty_string_as_none")]
    pub search: Option<String>,
    /// 1-based page number
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl UserListParams {
    pub fn filter(&self) -> domain::user::UserFilter {
        domain::user::UserFilter {
            search: self.search.clone(),
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::from_params(self.page, self.per_page, DEFAULT_USER_PAGE_SIZE)
    }
}
