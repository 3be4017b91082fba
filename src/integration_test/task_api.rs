use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

use crate::api::test_util::deserialize_body;
use crate::dto::Paginated;
use crate::routing_utils::{ApiErrorResponse, ApiResponse};
use crate::{dto, integration_test::test_util};

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to construct request")
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn creating_a_task_with_a_new_owner_registers_both() {
    test_util::prepare_db_and_test(|db| async move {
        let app = test_util::test_router(db);

        let create_response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/tasks",
                json!({
                    "title": "Write the onboarding docs",
                    "status": "pending",
                    "priority": "high",
                    "user_assignment_type": "new",
                    "new_user_name": "Brand New Owner",
                    "new_user_email": "new.owner@example.com"
                }),
            ))
            .await
            .expect("create request failed");
        assert_eq!(StatusCode::CREATED, create_response.status());

        let create_body: ApiResponse<dto::Task> =
            deserialize_body(create_response.into_body()).await;
        let created = create_body.data.expect("created task missing");

        let list_response = app
            .oneshot(Request::get("/tasks").body(Body::empty()).unwrap())
            .await
            .expect("list request failed");
        assert_eq!(StatusCode::OK, list_response.status());

        let list_body: ApiResponse<Paginated<dto::Task>> =
            deserialize_body(list_response.into_body()).await;
        let page = list_body.data.expect("task page missing");
        assert_eq!(1, page.total);
        let listed_owner = page.data[0].user.as_ref().expect("owner missing from listing");
        assert_eq!(created.user_id, listed_owner.id);
        assert_eq!("new.owner@example.com", listed_owner.email);
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn users_with_tasks_cannot_be_deleted() {
    test_util::prepare_db_and_test(|db| async move {
        let app = test_util::test_router(db);

        let create_response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/tasks",
                json!({
                    "title": "Hold this task",
                    "status": "pending",
                    "priority": "low",
                    "user_assignment_type": "new",
                    "new_user_name": "Busy Owner",
                    "new_user_email": "busy.owner@example.com"
                }),
            ))
            .await
            .expect("create request failed");
        assert_eq!(StatusCode::CREATED, create_response.status());

        let create_body: ApiResponse<dto::Task> =
            deserialize_body(create_response.into_body()).await;
        let owner_id = create_body.data.expect("created task missing").user_id;

        let delete_response = app
            .clone()
            .oneshot(
                Request::delete(format!("/users/{owner_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("delete request failed");
        assert_eq!(StatusCode::BAD_REQUEST, delete_response.status());

        let failure_body: ApiErrorResponse = deserialize_body(delete_response.into_body()).await;
        assert_eq!(
            "Cannot delete user. User has 1 associated tasks.",
            failure_body.message
        );

        let fetch_response = app
            .oneshot(
                Request::get(format!("/users/{owner_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("fetch request failed");
        assert_eq!(StatusCode::OK, fetch_response.status());
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn filtered_listings_report_pagination_metadata() {
    test_util::prepare_db_and_test(|db| async move {
        let app = test_util::test_router(db);

        let user_response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/users",
                json!({
                    "name": "Task Owner",
                    "email": "task.owner@example.com"
                }),
            ))
            .await
            .expect("user create failed");
        let user_body: ApiResponse<dto::User> = deserialize_body(user_response.into_body()).await;
        let owner_id = user_body.data.expect("created user missing").id;

        for index in 0..5 {
            let status = if index < 2 { "completed" } else { "pending" };
            let task_response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/tasks",
                    json!({
                        "title": format!("Task number {index}"),
                        "status": status,
                        "priority": "medium",
                        "user_assignment_type": "existing",
                        "user_id": owner_id
                    }),
                ))
                .await
                .expect("task create failed");
            assert_eq!(StatusCode::CREATED, task_response.status());
        }

        let list_response = app
            .oneshot(
                Request::get("/tasks?status=completed&per_page=12")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("list request failed");
        assert_eq!(StatusCode::OK, list_response.status());

        let list_body: ApiResponse<Paginated<dto::Task>> =
            deserialize_body(list_response.into_body()).await;
        let page = list_body.data.expect("task page missing");
        assert_eq!(2, page.total);
        assert_eq!(1, page.last_page);
        assert_eq!(2, page.data.len());
        assert!(!page.has_more_pages);
    });
}
