mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use serde_json::json;
use taskpush_core::{
    BatchOptions, PushResult, QueueError, Schedule, SendOptions, TaskRequest,
};

fn numbered_tasks(count: usize) -> Vec<TaskRequest> {
    (1..=count)
        .map(|n| {
            TaskRequest::new()
                .with_id(n.to_string())
                .with_body(json!({ "n": n }))
        })
        .collect()
}

/// Fails every request whose task name ends with `/tasks/{id}`.
fn failing_for(id: &'static str) -> MockTransport {
    MockTransport::new(move |request, _| {
        let body: serde_json::Value =
            serde_json::from_str(request.body.as_deref().unwrap_or("{}")).unwrap();
        let name = body["task"]["name"].as_str().unwrap_or_default();
        if name.ends_with(&format!("/tasks/{}", id)) {
            status(500, json!({ "error": { "message": "backend exploded" } }))
        } else {
            status(200, json!({ "name": name }))
        }
    })
}

#[tokio::test]
async fn one_failing_task_does_not_block_its_siblings() {
    let transport = Arc::new(failing_for("2"));
    let client = build_client(
        no_retries(base_config().with_method("POST")),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    let err = client
        .batch(numbered_tasks(3), BatchOptions::new())
        .await
        .unwrap_err();

    let failure = match err {
        QueueError::Batch(failure) => failure,
        other => panic!("unexpected error: {:?}", other),
    };
    assert_eq!(failure.total, 3);
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(failure.successes.len(), 2);
    assert_eq!(failure.to_string(), "1 failed and 2 succeeded out of 3");

    let failed = &failure.failures[0];
    assert_eq!(failed.index, 1);
    assert_eq!(failed.task.id.as_deref(), Some("2"));
    assert_eq!(failed.task.body, Some(json!({ "n": 2 })));
    assert_eq!(failed.status, Some(500));
    assert!(failed.message.contains("backend exploded"));

    let indices: Vec<usize> = failure.successes.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![0, 2]);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn results_follow_input_order() {
    let transport = Arc::new(MockTransport::new(|request, _| {
        let body: serde_json::Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        status(200, json!({ "name": body["task"]["name"] }))
    }));
    let client = build_client(
        base_config(),
        transport,
        Arc::new(CountingTokenProvider::new("t")),
    );

    let results = client
        .batch(numbered_tasks(5), BatchOptions::new().with_batch_size(2))
        .await
        .unwrap();

    let names: Vec<String> = results
        .iter()
        .map(|r| {
            r.data.as_ref().unwrap()["name"]
                .as_str()
                .unwrap()
                .rsplit('/')
                .next()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(names, vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test(start_paused = true)]
async fn chunks_run_one_after_another() {
    let transport = Arc::new(MockTransport::ok().with_delay(Duration::from_millis(50)));
    let client = build_client(
        base_config(),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    let results = client
        .batch(
            numbered_tasks(7),
            BatchOptions::new().with_batch_size(3).with_debug(true),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 7);
    assert_eq!(transport.calls(), 7);
    assert_eq!(transport.max_in_flight(), 3);
}

#[tokio::test]
async fn invalid_schedule_aborts_the_whole_batch() {
    let transport = Arc::new(MockTransport::ok());
    let tokens = Arc::new(CountingTokenProvider::new("t"));
    let client = build_client(base_config(), transport.clone(), tokens.clone());

    let mut tasks = numbered_tasks(3);
    tasks[2] = tasks[2].clone().with_schedule(Schedule::iso("dewde"));

    let err = client
        .batch(tasks, BatchOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(err, QueueError::InvalidSchedule { .. }));
    assert_eq!(transport.calls(), 0);
    assert_eq!(tokens.token_calls(), 0);
}

#[tokio::test]
async fn empty_batch_makes_no_calls() {
    let transport = Arc::new(MockTransport::ok());
    let tokens = Arc::new(CountingTokenProvider::new("t"));
    let client = build_client(base_config(), transport.clone(), tokens.clone());

    let results = client
        .batch(Vec::new(), BatchOptions::new().with_batch_size(0))
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(transport.calls(), 0);
    assert_eq!(tokens.token_calls(), 0);
}

#[tokio::test]
async fn retry_catch_applies_per_task() {
    let transport = Arc::new(failing_for("1"));
    let client = build_client(
        no_retries(base_config()),
        transport,
        Arc::new(CountingTokenProvider::new("t")),
    );

    let results = client
        .batch(
            numbered_tasks(2),
            BatchOptions::new().with_retry_catch(|_| Ok(PushResult::new(299, None))),
        )
        .await
        .unwrap();

    assert_eq!(results[0], PushResult::new(299, None));
    assert_eq!(results[1].status, 200);
}

#[tokio::test]
async fn target_send_all_derives_options_from_bodies() {
    let transport = Arc::new(MockTransport::ok());
    let client = build_client(
        base_config().with_method("PUT"),
        transport.clone(),
        Arc::new(CountingTokenProvider::new("t")),
    );

    let bodies = vec![json!({ "id": "a" }), json!({ "id": "b" })];
    client
        .target(Some("/sync"))
        .with_header("target", "1")
        .send_all(
            bodies,
            |body| {
                SendOptions::new()
                    .with_id(body["id"].as_str().unwrap_or_default())
                    .with_header("per-task", body["id"].as_str().unwrap_or_default())
            },
            BatchOptions::new(),
        )
        .await
        .unwrap();

    let mut seen: Vec<(String, String)> = (0..2)
        .map(|i| {
            let body = transport.body_json(i);
            (
                body["task"]["name"].as_str().unwrap().to_string(),
                body["task"]["appEngineHttpRequest"]["headers"]["per-task"]
                    .as_str()
                    .unwrap()
                    .to_string(),
            )
        })
        .collect();
    seen.sort();

    assert!(seen[0].0.ends_with("/tasks/a"));
    assert_eq!(seen[0].1, "a");
    assert!(seen[1].0.ends_with("/tasks/b"));
    assert_eq!(
        transport.body_json(0)["task"]["appEngineHttpRequest"]["relativeUri"],
        "/sync"
    );
}
