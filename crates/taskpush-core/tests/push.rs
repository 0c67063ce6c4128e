mod common;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{TimeZone, Utc};
use common::*;
use serde_json::json;
use taskpush_core::{
    HttpMethod, PushOptions, PushResult, QueueError, RetryInterval, RetryPolicy, Schedule,
    TaskRequest,
};
use tokio::time::Instant;

#[tokio::test]
async fn push_builds_create_task_request() {
    let transport = Arc::new(MockTransport::new(|_, _| {
        status(200, json!({ "name": "projects/p/locations/l/queues/q/tasks/1" }))
    }));
    let tokens = Arc::new(CountingTokenProvider::new("test-token"));
    let client = build_client(
        base_config().with_method("POST").with_pathname("/hello"),
        transport.clone(),
        tokens.clone(),
    );

    let result = client
        .push(
            TaskRequest::new().with_body(json!({ "name": "t1" })),
            PushOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.status, 200);
    assert_eq!(
        result.data,
        Some(json!({ "name": "projects/p/locations/l/queues/q/tasks/1" }))
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].url, TASKS_URL);
    assert_eq!(
        requests[0].headers.get("Authorization").map(String::as_str),
        Some("Bearer test-token")
    );

    let body = transport.body_json(0);
    let http = &body["task"]["appEngineHttpRequest"];
    assert_eq!(http["httpMethod"], "POST");
    assert_eq!(http["relativeUri"], "/hello");
    assert_eq!(
        http["body"],
        base64::engine::general_purpose::STANDARD.encode(r#"{"name":"t1"}"#)
    );
    assert_eq!(body["responseView"], "FULL");
    assert!(body["task"].get("name").is_none());
    assert_eq!(tokens.token_calls(), 1);
}

#[tokio::test]
async fn push_merges_headers_and_names_task() {
    let transport = Arc::new(MockTransport::ok());
    let client = build_client(
        base_config()
            .with_header("client", "1")
            .with_header("shared", "client"),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    client
        .push(
            TaskRequest::new()
                .with_id("123")
                .with_method(HttpMethod::Get)
                .with_pathname("service-01")
                .with_header("shared", "call")
                .with_body(json!({ "ignored": true })),
            PushOptions::new(),
        )
        .await
        .unwrap();

    let body = transport.body_json(0);
    assert_eq!(
        body["task"]["appEngineHttpRequest"]["headers"],
        json!({ "client": "1", "shared": "call" })
    );
    assert_eq!(body["task"]["appEngineHttpRequest"]["relativeUri"], "/service-01");
    // GET callbacks never carry a body.
    assert!(body["task"]["appEngineHttpRequest"].get("body").is_none());
    assert_eq!(
        body["task"]["name"],
        "projects/my-super-project/locations/asia-northeast1/queues/your-queue-name/tasks/123"
    );
}

#[tokio::test]
async fn push_sends_normalized_schedule() {
    let transport = Arc::new(MockTransport::ok());
    let client = build_client(
        base_config(),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    client
        .push(
            TaskRequest::new().with_schedule(Utc.timestamp_millis_opt(4_105_083_600_000).unwrap()),
            PushOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        transport.body_json(0)["task"]["scheduleTime"],
        "2100-01-31T13:00:00.000Z"
    );
}

#[tokio::test]
async fn invalid_schedule_fails_before_any_network_call() {
    let transport = Arc::new(MockTransport::ok());
    let tokens = Arc::new(CountingTokenProvider::new("t"));
    let client = build_client(base_config(), transport.clone(), tokens.clone());

    let err = client
        .push(
            TaskRequest::new().with_schedule(Schedule::iso("dewde")),
            PushOptions::new().with_retry_catch(|_| Ok(PushResult::new(299, None))),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Invalid argument exception. 'schedule' dewde is an invalid date"
    );
    assert_eq!(transport.calls(), 0);
    assert_eq!(tokens.token_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn push_retries_until_third_attempt_succeeds() {
    let transport = Arc::new(MockTransport::new(|_, index| {
        if index < 2 {
            status(503, json!({ "error": { "message": "try again" } }))
        } else {
            status(200, json!({ "attempt": index + 1 }))
        }
    }));
    let client = build_client(
        base_config().with_retry_policy(
            RetryPolicy::default().with_interval(RetryInterval::Fixed(Duration::from_millis(800))),
        ),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );
    let started = Instant::now();

    let result = client
        .push(TaskRequest::new(), PushOptions::new())
        .await
        .unwrap();

    assert_eq!(result.data, Some(json!({ "attempt": 3 })));
    assert_eq!(transport.calls(), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(1600));
}

#[tokio::test(start_paused = true)]
async fn iam_denial_is_not_retried() {
    let transport = Arc::new(MockTransport::new(|_, _| {
        status(
            403,
            json!({ "error": { "code": 403, "message": "Principal lacks IAM permission \"cloudtasks.tasks.create\"" } }),
        )
    }));
    let client = build_client(
        base_config(),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    let err = client
        .push(TaskRequest::new(), PushOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, QueueError::Authorization { status: 403, .. }));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_are_reported_distinctly() {
    let transport = Arc::new(MockTransport::new(|_, _| {
        status(409, json!({ "error": { "message": "task already exists" } }))
    }));
    let client = build_client(
        base_config(),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    let err = client
        .push(
            TaskRequest::new().with_id("dup"),
            PushOptions::new().with_timeout(Duration::from_secs(2)),
        )
        .await
        .unwrap_err();

    match &err {
        QueueError::RetriesExhausted { attempts, .. } => assert_eq!(*attempts, 3),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_conflict());
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn failures_surface_as_is_without_ignore_failure() {
    let transport = Arc::new(MockTransport::new(|_, _| status(500, json!({}))));
    let client = build_client(
        no_retries(base_config()),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    let err = client
        .push(TaskRequest::new(), PushOptions::new())
        .await
        .unwrap_err();

    match err {
        QueueError::Http {
            status,
            method,
            uri,
            ..
        } => {
            assert_eq!(status, 500);
            assert_eq!(method, HttpMethod::Post);
            assert_eq!(uri, TASKS_URL);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn retry_catch_replaces_the_final_error() {
    let transport = Arc::new(MockTransport::new(|_, _| status(500, json!({}))));
    let client = build_client(
        no_retries(base_config()),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    let result = client
        .push(
            TaskRequest::new(),
            PushOptions::new().with_retry_catch(|error| {
                Ok(PushResult::new(
                    202,
                    Some(json!({ "fallback": error.status() })),
                ))
            }),
        )
        .await
        .unwrap();

    assert_eq!(result, PushResult::new(202, Some(json!({ "fallback": 500 }))));
}

#[tokio::test]
async fn transport_failures_carry_request_context() {
    let transport = Arc::new(MockTransport::new(|_, _| {
        Err(taskpush_traits::TransportError::Connection(
            "connection refused".to_string(),
        ))
    }));
    let client = build_client(
        no_retries(base_config()),
        transport,
        Arc::new(CountingTokenProvider::new("t")),
    );

    let err = client
        .push(TaskRequest::new(), PushOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "transport");
    assert!(err.to_string().starts_with(&format!("POST {} failed", TASKS_URL)));
}

#[tokio::test]
async fn project_id_is_looked_up_once() {
    let transport = Arc::new(MockTransport::ok());
    let tokens = Arc::new(CountingTokenProvider::new("t").with_project_id("from-provider"));
    let client = build_client(
        taskpush_core::QueueConfig::builder(QUEUE).with_location_id(LOCATION),
        transport.clone(),
        tokens.clone(),
    );

    for _ in 0..2 {
        client
            .push(TaskRequest::new(), PushOptions::new())
            .await
            .unwrap();
    }

    assert_eq!(tokens.project_calls(), 1);
    assert!(
        transport.requests()[1]
            .url
            .contains("/projects/from-provider/locations/asia-northeast1/")
    );
}

#[tokio::test]
async fn missing_project_id_is_a_configuration_error() {
    let transport = Arc::new(MockTransport::ok());
    let client = build_client(
        taskpush_core::QueueConfig::builder(QUEUE).with_location_id(LOCATION),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    let err = client
        .push(TaskRequest::new(), PushOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "configuration");
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn target_layers_headers_between_client_and_send() {
    let transport = Arc::new(MockTransport::ok());
    let client = build_client(
        base_config()
            .with_header("layer", "client")
            .with_header("client-only", "1"),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    let target = client
        .target(Some("/service-01"))
        .with_header("layer", "target")
        .with_header("target-only", "1");

    target
        .send(
            json!({ "hello": "world" }),
            taskpush_core::SendOptions::new()
                .with_method(HttpMethod::Post)
                .with_header("send-only", "1"),
        )
        .await
        .unwrap();
    target
        .send(
            json!({}),
            taskpush_core::SendOptions::new().with_header("layer", "send"),
        )
        .await
        .unwrap();

    let first = transport.body_json(0);
    assert_eq!(
        first["task"]["appEngineHttpRequest"]["headers"],
        json!({ "layer": "target", "client-only": "1", "target-only": "1", "send-only": "1" })
    );
    assert_eq!(first["task"]["appEngineHttpRequest"]["relativeUri"], "/service-01");
    assert_eq!(
        transport.body_json(1)["task"]["appEngineHttpRequest"]["headers"]["layer"],
        "send"
    );
    // A fresh target starts from the client defaults again.
    assert!(client.target(None).pathname().is_none());
}
