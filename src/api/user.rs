use crate::domain::user::driving_ports::{
    CreateUserError, DeleteUserError, UpdateUserError, UserPort,
};
use crate::dto::Paginated;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{
    ApiErrorResponse, ApiResponse, ConflictErrorResponse, GenericErrorResponse, Json,
    NotFoundErrorResponse, ValidationErrorResponse,
};
use crate::{AppState, SharedData, domain, dto, persistence};
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{delete, get, post, put};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;
use validator::Validate;

/// OpenAPI definitions for the user endpoints
#[derive(OpenApi)]
#[openapi(paths(list_users, get_user, create_user, update_user, delete_user))]
pub(super) struct UsersApi;

/// Builds a router for all the user routes
pub fn user_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/",
            get(
                |State(app_data): AppState, Query(params): Query<dto::UserListParams>| async move {
                    let mut ext_cxn = app_data.ext_cxn.clone();
                    let user_service = domain::user::UserService {};
                    let user_reader = persistence::db_user_driven_ports::DbReadUsers {};

                    list_users(params, &mut ext_cxn, &user_service, &user_reader).await
                },
            ),
        )
        .route(
            "/",
            post(
                |State(app_data): AppState, Json(new_user): Json<dto::NewUser>| async move {
                    let mut ext_cxn = app_data.ext_cxn.clone();
                    let user_service = domain::user::UserService {};
                    let user_writer = persistence::db_user_driven_ports::DbWriteUsers {};
                    let user_detect = persistence::db_user_driven_ports::DbDetectUser {};

                    create_user(new_user, &mut ext_cxn, &user_service, &user_writer, &user_detect)
                        .await
                },
            ),
        )
        .route(
            "/:user_id",
            get(
                |State(app_data): AppState, Path(user_id): Path<i32>| async move {
                    let mut ext_cxn = app_data.ext_cxn.clone();
                    let user_service = domain::user::UserService {};
                    let user_reader = persistence::db_user_driven_ports::DbReadUsers {};
                    let task_detect = persistence::db_user_driven_ports::DbDetectOwnedTasks {};

                    get_user(user_id, &mut ext_cxn, &user_service, &user_reader, &task_detect).await
                },
            ),
        )
        .route(
            "/:user_id",
            put(
                |State(app_data): AppState,
                 Path(user_id): Path<i32>,
                 Json(update): Json<dto::UpdateUser>| async move {
                    let mut ext_cxn = app_data.ext_cxn.clone();
                    let user_service = domain::user::UserService {};
                    let user_writer = persistence::db_user_driven_ports::DbWriteUsers {};
                    let user_detect = persistence::db_user_driven_ports::DbDetectUser {};

                    update_user(
                        user_id,
                        update,
                        &mut ext_cxn,
                        &user_service,
                        &user_writer,
                        &user_detect,
                    )
                    .await
                },
            ),
        )
        .route(
            "/:user_id",
            delete(
                |State(app_data): AppState, Path(user_id): Path<i32>| async move {
                    let mut ext_cxn = app_data.ext_cxn.clone();
                    let user_service = domain::user::UserService {};
                    let user_writer = persistence::db_user_driven_ports::DbWriteUsers {};
                    let user_detect = persistence::db_user_driven_ports::DbDetectUser {};
                    let task_detect = persistence::db_user_driven_ports::DbDetectOwnedTasks {};

                    delete_user(
                        user_id,
                        &mut ext_cxn,
                        &user_service,
                        &user_writer,
                        &user_detect,
                        &task_detect,
                    )
                    .await
                },
            ),
        )
}

/// Retrieves a page of users, optionally narrowed by a search string.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    params(dto::UserListParams),
    responses(
        (status = 200, description = "Page of users retrieved"),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn list_users(
    params: dto::UserListParams,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
    user_read: &impl domain::user::driven_ports::UserReader,
) -> Result<Json<ApiResponse<Paginated<dto::User>>>, ErrorResponse> {
    info!("Requested a page of users");
    let page_req = params.page_request();
    let users_page = user_service
        .list_users(&params.filter(), &page_req, &mut *ext_cxn, user_read)
        .await
        .map_err(|list_err| {
            error!("Could not retrieve users: {list_err}");
            GenericErrorResponse::new("retrieving users", list_err)
        })?;

    Ok(Json(ApiResponse::success(
        "Users retrieved successfully",
        users_page.into(),
    )))
}

/// Retrieves a single user, annotated with the number of tasks they own.
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "ID of the user to fetch")),
    responses(
        (status = 200, description = "User retrieved", body = dto::User),
        (status = 404, response = ApiErrorResponse),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn get_user(
    user_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
    user_read: &impl domain::user::driven_ports::UserReader,
    task_detect: &impl domain::user::driven_ports::DetectOwnedTasks,
) -> Result<Json<ApiResponse<dto::User>>, ErrorResponse> {
    info!("Requested user {user_id}");
    let fetch_result = user_service
        .user_with_task_count(user_id, &mut *ext_cxn, user_read, task_detect)
        .await
        .map_err(|fetch_err| {
            error!("Could not retrieve user {user_id}: {fetch_err}");
            GenericErrorResponse::new("retrieving user", fetch_err)
        })?;

    let Some((user, task_count)) = fetch_result else {
        return Err(NotFoundErrorResponse("User not found".to_owned()).into());
    };

    Ok(Json(ApiResponse::success(
        "User retrieved successfully",
        dto::User::with_task_count(user, task_count),
    )))
}

/// Creates a user.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = dto::NewUser,
    responses(
        (status = 201, description = "User created", body = dto::User),
        (status = 422, response = ApiErrorResponse),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn create_user(
    new_user: dto::NewUser,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
    user_write: &impl domain::user::driven_ports::UserWriter,
    user_detect: &impl domain::user::driven_ports::DetectUser,
) -> Result<(StatusCode, Json<ApiResponse<dto::User>>), ErrorResponse> {
    info!("Attempt to create user: {new_user}");
    new_user.validate().map_err(ValidationErrorResponse::from)?;

    let domain_create = domain::user::CreateUser::from(new_user);
    let created_user = user_service
        .create_user(&domain_create, &mut *ext_cxn, user_write, user_detect)
        .await
        .map_err(|create_err| match create_err {
            CreateUserError::Invalid(problems) => {
                ErrorResponse::from(ValidationErrorResponse::from(problems))
            }
            CreateUserError::PortError(cause) => {
                error!("User create failure: {cause}");
                GenericErrorResponse::new("creating user", cause).into()
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "User created successfully",
            created_user.into(),
        )),
    ))
}

/// Replaces a user's editable fields. The stored password only changes when
/// a new one is supplied.
#[utoipa::path(
    put,
    path = "/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "ID of the user to update")),
    request_body = dto::UpdateUser,
    responses(
        (status = 200, description = "User updated", body = dto::User),
        (status = 404, response = ApiErrorResponse),
        (status = 422, response = ApiErrorResponse),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn update_user(
    user_id: i32,
    update: dto::UpdateUser,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
    user_write: &impl domain::user::driven_ports::UserWriter,
    user_detect: &impl domain::user::driven_ports::DetectUser,
) -> Result<Json<ApiResponse<dto::User>>, ErrorResponse> {
    info!("Updating user {user_id}");
    update.validate().map_err(ValidationErrorResponse::from)?;

    let domain_update = domain::user::UpdateUser::from(update);
    let refreshed_user = user_service
        .update_user(user_id, &domain_update, &mut *ext_cxn, user_write, user_detect)
        .await
        .map_err(|update_err| match update_err {
            UpdateUserError::Invalid(problems) => {
                ErrorResponse::from(ValidationErrorResponse::from(problems))
            }
            UpdateUserError::NotFound(_) => {
                NotFoundErrorResponse("User not found".to_owned()).into()
            }
            UpdateUserError::PortError(cause) => {
                error!("User update failure: {cause}");
                GenericErrorResponse::new("updating user", cause).into()
            }
        })?;

    Ok(Json(ApiResponse::success(
        "User updated successfully",
        refreshed_user.into(),
    )))
}

/// Deletes a user, unless they still own tasks.
#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "ID of the user to delete")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, response = ApiErrorResponse),
        (status = 404, response = ApiErrorResponse),
        (status = 500, response = ApiErrorResponse),
    ),
)]
async fn delete_user(
    user_id: i32,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
    user_write: &impl domain::user::driven_ports::UserWriter,
    user_detect: &impl domain::user::driven_ports::DetectUser,
    task_detect: &impl domain::user::driven_ports::DetectOwnedTasks,
) -> Result<Json<ApiResponse<()>>, ErrorResponse> {
    info!("Deleting user {user_id}");
    let delete_result = user_service
        .delete_user(user_id, &mut *ext_cxn, user_write, user_detect, task_detect)
        .await;

    match delete_result {
        Ok(()) => Ok(Json(ApiResponse::message_only("User deleted successfully"))),
        Err(DeleteUserError::NotFound(_)) => {
            Err(NotFoundErrorResponse("User not found".to_owned()).into())
        }
        Err(guard_err @ DeleteUserError::HasTasks { .. }) => {
            Err(ConflictErrorResponse(guard_err.to_string()).into())
        }
        Err(DeleteUserError::PortError(cause)) => {
            error!("User delete failure: {cause}");
            Err(GenericErrorResponse::new("deleting user", cause).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldErrors;
    use crate::domain::paging::{Page, PagedRecords, PageRequest};
    use crate::domain::task::test_util::InMemoryTaskPersistence;
    use crate::domain::user::test_util::{
        InMemoryUserPersistence, MockUserService, user_create_default, user_from_create,
    };
    use crate::api::test_util::deserialize_body;
    use crate::external_connections;
    use axum::response::IntoResponse;
    use speculoos::prelude::*;

    fn sample_params() -> dto::UserListParams {
        dto::UserListParams {
            search: None,
            page: None,
            per_page: None,
        }
    }

    mod list_users {
        use super::*;

        #[tokio::test]
        async fn happy_path() {
            let mut mock_service_raw = MockUserService::new();
            let users_page = Page::assemble(
                PagedRecords {
                    items: vec![
                        user_from_create(&user_create_default(), 1),
                        user_from_create(&user_create_default(), 2),
                    ],
                    total: 2,
                },
                &PageRequest { page: 1, per_page: 15 },
            );
            mock_service_raw.list_users_result.set_returned_anyhow(Ok(users_page));
            let user_service = std::sync::Mutex::new(mock_service_raw);
            let user_reader = InMemoryUserPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = list_users(sample_params(), &mut ext_cxn, &user_service, &user_reader)
                .await
                .into_response();
            assert_eq!(StatusCode::OK, response.status());

            let body: ApiResponse<Paginated<dto::User>> =
                deserialize_body(response.into_body()).await;
            assert!(body.success);
            assert_eq!("Users retrieved successfully", body.message);
            let page = body.data.expect("page data missing");
            assert_eq!(2, page.data.len());
            assert_eq!(2, page.total);
            assert!(!page.has_more_pages);
        }

        #[tokio::test]
        async fn returns_500_on_service_failure() {
            let mut mock_service_raw = MockUserService::new();
            mock_service_raw
                .list_users_result
                .set_returned_anyhow(Err(anyhow::anyhow!("Something went wrong!")));
            let user_service = std::sync::Mutex::new(mock_service_raw);
            let user_reader = InMemoryUserPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = list_users(sample_params(), &mut ext_cxn, &user_service, &user_reader)
                .await
                .into_response();
            assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());

            let body: ApiErrorResponse = deserialize_body(response.into_body()).await;
            assert!(!body.success);
            assert!(body.message.starts_with("Error retrieving users:"));
        }
    }

    mod get_user {
        use super::*;

        #[tokio::test]
        async fn annotates_task_count() {
            let mut mock_service_raw = MockUserService::new();
            mock_service_raw
                .user_with_task_count_result
                .set_returned_anyhow(Ok(Some((user_from_create(&user_create_default(), 1), 4))));
            let user_service = std::sync::Mutex::new(mock_service_raw);
            let user_reader = InMemoryUserPersistence::new_locked();
            let task_detect = InMemoryTaskPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = get_user(1, &mut ext_cxn, &user_service, &user_reader, &task_detect)
                .await
                .into_response();
            assert_eq!(StatusCode::OK, response.status());

            let body: ApiResponse<dto::User> = deserialize_body(response.into_body()).await;
            let user = body.data.expect("user data missing");
            assert_that!(user.tasks_count).is_some().is_equal_to(4);
        }

        #[tokio::test]
        async fn returns_404_for_unknown_users() {
            let mut mock_service_raw = MockUserService::new();
            mock_service_raw
                .user_with_task_count_result
                .set_returned_anyhow(Ok(None));
            let user_service = std::sync::Mutex::new(mock_service_raw);
            let user_reader = InMemoryUserPersistence::new_locked();
            let task_detect = InMemoryTaskPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = get_user(9, &mut ext_cxn, &user_service, &user_reader, &task_detect)
                .await
                .into_response();
            assert_eq!(StatusCode::NOT_FOUND, response.status());

            let body: ApiErrorResponse = deserialize_body(response.into_body()).await;
            assert_eq!("User not found", body.message);
        }
    }

    mod create_user {
        use super::*;

        fn creatable_user() -> dto::NewUser {
            dto::NewUser {
                name: "John Doe".to_owned(),
                email: "john.doe@example.com".to_owned(),
                password: None,
            }
        }

        #[tokio::test]
        async fn happy_path() {
            let mut mock_service_raw = MockUserService::new();
            mock_service_raw
                .create_user_result
                .set_returned_result(Ok(user_from_create(&user_create_default(), 1)));
            let user_service = std::sync::Mutex::new(mock_service_raw);
            let user_persist = InMemoryUserPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = create_user(
                creatable_user(),
                &mut ext_cxn,
                &user_service,
                &user_persist,
                &user_persist,
            )
            .await
            .into_response();
            assert_eq!(StatusCode::CREATED, response.status());

            let body: ApiResponse<dto::User> = deserialize_body(response.into_body()).await;
            assert_eq!("User created successfully", body.message);
            assert_that!(body.data).is_some();
        }

        #[tokio::test]
        async fn returns_422_on_bad_input_without_calling_the_service() {
            let user_service = MockUserService::new_locked();
            let user_persist = InMemoryUserPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let bad_user = dto::NewUser {
                name: "  ".to_owned(),
                email: "nope".to_owned(),
                password: None,
            };

            let response = create_user(
                bad_user,
                &mut ext_cxn,
                &user_service,
                &user_persist,
                &user_persist,
            )
            .await
            .into_response();
            assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, response.status());

            let body: ApiErrorResponse = deserialize_body(response.into_body()).await;
            assert_eq!("Validation failed", body.message);
            let errors = body.errors.expect("error map missing");
            assert!(errors.contains_key("name"));
            assert!(errors.contains_key("email"));

            let locked_service = user_service.lock().expect("mock service mutex poisoned");
            assert!(locked_service.create_user_result.calls().is_empty());
        }

        #[tokio::test]
        async fn returns_422_when_the_email_is_taken() {
            let mut mock_service_raw = MockUserService::new();
            let mut problems = FieldErrors::new();
            problems.add("email", "The email has already been taken.");
            mock_service_raw
                .create_user_result
                .set_returned_result(Err(CreateUserError::Invalid(problems)));
            let user_service = std::sync::Mutex::new(mock_service_raw);
            let user_persist = InMemoryUserPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = create_user(
                creatable_user(),
                &mut ext_cxn,
                &user_service,
                &user_persist,
                &user_persist,
            )
            .await
            .into_response();
            assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, response.status());

            let body: ApiErrorResponse = deserialize_body(response.into_body()).await;
            let errors = body.errors.expect("error map missing");
            assert!(errors.contains_key("email"));
        }
    }

    mod update_user {
        use super::*;

        #[tokio::test]
        async fn returns_404_for_unknown_users() {
            let mut mock_service_raw = MockUserService::new();
            mock_service_raw
                .update_user_result
                .set_returned_result(Err(UpdateUserError::NotFound(8)));
            let user_service = std::sync::Mutex::new(mock_service_raw);
            let user_persist = InMemoryUserPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();
            let update = dto::UpdateUser {
                name: "John Doe".to_owned(),
                email: "john.doe@example.com".to_owned(),
                password: None,
            };

            let response = update_user(
                8,
                update,
                &mut ext_cxn,
                &user_service,
                &user_persist,
                &user_persist,
            )
            .await
            .into_response();
            assert_eq!(StatusCode::NOT_FOUND, response.status());
        }
    }

    mod delete_user {
        use super::*;

        #[tokio::test]
        async fn happy_path() {
            let mut mock_service_raw = MockUserService::new();
            mock_service_raw.delete_user_result.set_returned_result(Ok(()));
            let user_service = std::sync::Mutex::new(mock_service_raw);
            let user_persist = InMemoryUserPersistence::new_locked();
            let task_detect = InMemoryTaskPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = delete_user(
                1,
                &mut ext_cxn,
                &user_service,
                &user_persist,
                &user_persist,
                &task_detect,
            )
            .await
            .into_response();
            assert_eq!(StatusCode::OK, response.status());

            let body: ApiResponse<()> = deserialize_body(response.into_body()).await;
            assert_eq!("User deleted successfully", body.message);
        }

        #[tokio::test]
        async fn surfaces_the_ownership_guard_as_400() {
            let mut mock_service_raw = MockUserService::new();
            mock_service_raw
                .delete_user_result
                .set_returned_result(Err(DeleteUserError::HasTasks { task_count: 3 }));
            let user_service = std::sync::Mutex::new(mock_service_raw);
            let user_persist = InMemoryUserPersistence::new_locked();
            let task_detect = InMemoryTaskPersistence::new_locked();
            let mut ext_cxn = external_connections::test_util::FakeExternalConnectivity::new();

            let response = delete_user(
                2,
                &mut ext_cxn,
                &user_service,
                &user_persist,
                &user_persist,
                &task_detect,
            )
            .await
            .into_response();
            assert_eq!(StatusCode::BAD_REQUEST, response.status());

            let body: ApiErrorResponse = deserialize_body(response.into_body()).await;
            assert_eq!(
                "Cannot delete user. User has 3 associated tasks.",
                body.message
            );
        }
    }
}
