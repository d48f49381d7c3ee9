//! End-to-end tests: real server on a local port, real client over HTTP.

use std::sync::Arc;

use axum::http::StatusCode;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use rpc_tree::auth::KeyRing;
use rpc_tree::client::{CallOptions, CallResult, ClientError};
use rpc_tree::demo::{self, DemoApi, LoginInput, LoginOutput, Session};
use rpc_tree::rpc::{ApiError, Procedure, RouteTree};

mod common;

fn demo_ring() -> Arc<KeyRing> {
    Arc::new(KeyRing::new(["e2e-secret"]).unwrap())
}

#[tokio::test]
async fn test_typed_login_round_trip() {
    let server = common::spawn_server(demo::routes(demo_ring())).await;
    let api = DemoApi::new(&server.client());

    let result = api
        .auth()
        .login()
        .query(&LoginInput::new("u"), CallOptions::new())
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({ "data": { "mong": "u" }, "error": null })
    );
    assert_eq!(
        result.unwrap_data().unwrap(),
        LoginOutput { mong: "u".into() }
    );
}

#[tokio::test]
async fn test_query_values_are_escaped() {
    let server = common::spawn_server(demo::routes(demo_ring())).await;
    let api = DemoApi::new(&server.client());

    let input = LoginInput {
        username: "&inject=true".into(),
        password: Some("nice".into()),
    };
    let output = api
        .auth()
        .login()
        .query(&input, CallOptions::new())
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(output.mong, "&inject=true");
}

#[tokio::test]
async fn test_handler_error_reaches_client() {
    let server = common::spawn_server(demo::routes(demo_ring())).await;
    let api = DemoApi::new(&server.client());

    let result = api
        .auth()
        .login()
        .query(&LoginInput::new(""), CallOptions::new())
        .await
        .unwrap();

    let (data, error) = result.into_parts();
    assert!(data.is_none());
    assert_eq!(error.unwrap().name, "EmptyUsername");
}

#[tokio::test]
async fn test_declared_error_type_with_default_status() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Nice {
        name: String,
        message: String,
    }

    let tree = RouteTree::new().route(
        "login",
        Procedure::<()>::new()
            .input(|_| Ok(()))
            .error::<Nice>()
            .query(|cx| async move {
                Err::<(), _>(cx.error(
                    Nice {
                        name: "nice".into(),
                        message: "nia".into(),
                    },
                    None,
                ))
            }),
    );
    let server = common::spawn_server(tree).await;

    let response = common::http_client()
        .get(format!("{}/login", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST.as_u16());

    let result: CallResult<Value, Nice> = server
        .client()
        .at("login")
        .query(&(), CallOptions::new())
        .await
        .unwrap();
    assert_eq!(
        result.error(),
        Some(&Nice {
            name: "nice".into(),
            message: "nia".into()
        })
    );
}

#[tokio::test]
async fn test_unknown_path_and_wrong_verb() {
    let server = common::spawn_server(demo::routes(demo_ring())).await;
    let http = common::http_client();

    let response = http
        .get(format!("{}/auth/missing", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND.as_u16());
    assert!(response.bytes().await.unwrap().is_empty());

    let response = http
        .post(format!("{}/auth/login", server.base_url))
        .body(r#"{"username":"u"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED.as_u16());
    assert!(response.bytes().await.unwrap().is_empty());

    // an empty error body cannot be decoded into the declared error type
    let err = server
        .client()
        .at("auth")
        .at("missing")
        .query::<_, Value, ApiError>(&(), CallOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode { status: 404, .. }));
}

#[tokio::test]
async fn test_bearer_flow() {
    let server = common::spawn_server(demo::routes(demo_ring())).await;
    let api = DemoApi::new(&server.client());

    let unauthorized = api.auth().me().query(&(), CallOptions::new()).await.unwrap();
    assert_eq!(unauthorized.error().unwrap().name, "Unauthorized");

    let token = api
        .auth()
        .token()
        .mutate(&LoginInput::new("u"), CallOptions::new())
        .await
        .unwrap()
        .unwrap_data()
        .unwrap()
        .token;

    let session = api
        .auth()
        .me()
        .query(&(), CallOptions::new().bearer(token))
        .await
        .unwrap()
        .unwrap_data()
        .unwrap();
    assert_eq!(session, Session { username: "u".into() });
}

#[tokio::test]
async fn test_rotation_over_http() {
    let ring = demo_ring();
    let server = common::spawn_server(demo::routes(ring.clone())).await;
    let api = DemoApi::new(&server.client());

    let old_token = ring.sign(&Session { username: "old".into() }).unwrap();
    ring.add_secret("e2e-secret-2");
    let new_token = ring.sign(&Session { username: "new".into() }).unwrap();

    for (token, expected) in [(&old_token, "old"), (&new_token, "new")] {
        let session = api
            .auth()
            .me()
            .query(&(), CallOptions::new().bearer(token.as_str()))
            .await
            .unwrap()
            .unwrap_data()
            .unwrap();
        assert_eq!(session.username, expected);
    }

    ring.remove_secret(0).unwrap();
    let result = api
        .auth()
        .me()
        .query(&(), CallOptions::new().bearer(old_token))
        .await
        .unwrap();
    assert!(!result.is_success());
}

#[tokio::test]
async fn test_plain_text_output_and_caller_headers() {
    let tree = RouteTree::new()
        .route(
            "greeting",
            Procedure::<()>::new()
                .input(|_| Ok(()))
                .query(|_cx| async move { Ok("hello") }),
        )
        .route(
            "count",
            Procedure::<()>::new()
                .input(|raw| Ok(raw))
                .mutation(|cx| async move { Ok(cx.data.as_array().map_or(0, Vec::len)) }),
        );
    let server = common::spawn_server(tree).await;
    let client = server.client();

    let greeting: CallResult<String, ApiError> = client
        .at("greeting")
        .query(&(), CallOptions::new())
        .await
        .unwrap();
    assert_eq!(greeting.data().map(String::as_str), Some("hello"));

    // the caller's content type replaces the default; the body is still JSON
    let count: CallResult<u32, ApiError> = client
        .at("count")
        .mutate(
            &json!([1, 2, 3]),
            CallOptions::new().header(CONTENT_TYPE, HeaderValue::from_static("text/plain")),
        )
        .await
        .unwrap();
    assert_eq!(count.into_result().unwrap(), 3);
}
