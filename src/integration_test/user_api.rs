use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::json;
use tower::ServiceExt;

use crate::api::test_util::deserialize_body;
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
fn can_create_and_fetch_a_user() {
    test_util::prepare_db_and_test(|db| async move {
        let app = test_util::test_router(db);

        let create_response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/users",
                json!({
                    "name": "Evan Rittenhouse",
                    "email": "evan@example.com"
                }),
            ))
            .await
            .expect("create request failed");
        assert_eq!(StatusCode::CREATED, create_response.status());

        let create_body: ApiResponse<dto::User> =
            deserialize_body(create_response.into_body()).await;
        let created = create_body.data.expect("created user missing");

        let fetch_response = app
            .oneshot(
                Request::get(format!("/users/{}", created.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("fetch request failed");
        assert_eq!(StatusCode::OK, fetch_response.status());

        let fetch_body: ApiResponse<dto::User> = deserialize_body(fetch_response.into_body()).await;
        let fetched = fetch_body.data.expect("fetched user missing");
        assert_eq!("Evan Rittenhouse", fetched.name);
        assert_eq!(Some(0), fetched.tasks_count);
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn duplicate_emails_get_rejected_by_the_api() {
    test_util::prepare_db_and_test(|db| async move {
        let app = test_util::test_router(db);
        let user_body = json!({
            "name": "Evan Rittenhouse",
            "email": "evan@example.com"
        });

        let first_response = app
            .clone()
            .oneshot(json_request("POST", "/users", user_body.clone()))
            .await
            .expect("first create failed");
        assert_eq!(StatusCode::CREATED, first_response.status());

        let second_response = app
            .oneshot(json_request(
                "POST",
                "/users",
                json!({
                    "name": "Evan Imposter",
                    "email": "EVAN@example.com"
                }),
            ))
            .await
            .expect("second create failed");
        assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, second_response.status());

        let failure_body: ApiErrorResponse = deserialize_body(second_response.into_body()).await;
        assert!(failure_body.errors.expect("error map missing").contains_key("email"));
    });
}
