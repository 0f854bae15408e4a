//! End-to-end: HTTP ingestion -> durable queue -> batch accumulator -> store -> HTTP query

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use syspulse::config::Config;
use syspulse::handlers::logs::AppState;
use syspulse::queue::{LogQueue, SqliteQueue};
use syspulse::server::create_router;
use syspulse::signals::{shutdown_channel, ShutdownSignal};
use syspulse::store::{LogStore, SqliteLogStore};
use syspulse::worker::{spawn_worker, AccumulatorConfig, BatchAccumulator, Step};
use tempfile::TempDir;
use tower::ServiceExt;

struct Pipeline {
    _dir: TempDir,
    queue: Arc<SqliteQueue>,
    store: Arc<SqliteLogStore>,
    app: Router,
}

async fn pipeline() -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let queue_url = format!("sqlite:{}", dir.path().join("queue.db").display());
    let store_url = format!("sqlite:{}", dir.path().join("logs.db").display());

    let queue = Arc::new(SqliteQueue::connect(&queue_url, "logs", 2).await.unwrap());
    let store = Arc::new(SqliteLogStore::connect(&store_url, 2).await.unwrap());

    let state = AppState {
        queue: queue.clone(),
        store: store.clone(),
        page_size: 50,
    };
    let app = create_router(&Config::default(), state, None).unwrap();

    Pipeline {
        _dir: dir,
        queue,
        store,
        app,
    }
}

async fn post_log(app: &Router, body: Value) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri("/logs")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

async fn get_logs(app: &Router, query: &str) -> Vec<Value> {
    let request = Request::builder()
        .uri(format!("/logs{}", query))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice::<Vec<Value>>(&body).unwrap()
}

fn accumulator(p: &Pipeline, batch_size: usize) -> BatchAccumulator {
    let queue: Arc<dyn LogQueue> = p.queue.clone();
    let store: Arc<dyn LogStore> = p.store.clone();
    BatchAccumulator::new(
        queue,
        store,
        AccumulatorConfig {
            batch_size,
            time_limit: Duration::from_secs(3600),
            ..AccumulatorConfig::default()
        },
    )
}

#[tokio::test]
async fn test_posted_logs_become_queryable_after_flush() {
    let p = pipeline().await;

    for i in 0..12 {
        let level = if i % 3 == 0 { "ERROR" } else { "INFO" };
        let status = post_log(
            &p.app,
            json!({
                "service": "checkout",
                "level": level,
                "message": format!("request {} finished", i),
                // ignored: the server stamps every record
                "timestamp": "1999-01-01T00:00:00Z",
                "metadata": {"seq": i},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(p.queue.len().await.unwrap(), 12);

    // Nothing is visible until the worker persists it
    assert!(get_logs(&p.app, "").await.is_empty());

    let mut acc = accumulator(&p, 10);
    let mut flushed = Vec::new();
    loop {
        match acc.step().await {
            Step::Flushed(n) => flushed.push(n),
            Step::QueueEmpty => break,
            Step::Buffered => {}
            other => panic!("unexpected step {:?}", other),
        }
    }
    assert_eq!(flushed, vec![10]);
    assert_eq!(acc.buffered().len(), 2);
    assert_eq!(acc.flush().await, Step::Flushed(2));

    let all = get_logs(&p.app, "").await;
    assert_eq!(all.len(), 12);
    assert_eq!(all[0]["message"], "request 11 finished");
    assert_eq!(all[11]["message"], "request 0 finished");
    assert_eq!(all[0]["metadata"], json!({"seq": 11}));
    assert!(all.iter().all(|row| row["id"].as_i64().is_some()));
    assert!(all
        .iter()
        .all(|row| !row["timestamp"].as_str().unwrap().starts_with("1999")));

    let errors = get_logs(&p.app, "?level=ERROR").await;
    assert_eq!(errors.len(), 4);
    assert!(errors.iter().all(|row| row["level"] == "ERROR"));

    let narrowed = get_logs(
        &p.app,
        "?level=ERROR&search=request%206&startDate=2000-01-01&endDate=2999-12-31",
    )
    .await;
    let messages: Vec<_> = narrowed.iter().map(|row| row["message"].clone()).collect();
    assert_eq!(messages, vec![json!("request 6 finished")]);

    // A range that would only match the client's claimed time finds nothing
    assert!(get_logs(&p.app, "?endDate=1999-12-31").await.is_empty());
}

#[tokio::test]
async fn test_rejected_log_never_reaches_queue() {
    let p = pipeline().await;

    let status = post_log(
        &p.app,
        json!({"service": "checkout", "level": "TRACE", "message": "nope"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status = post_log(&p.app, json!({"service": "checkout", "level": "INFO"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(p.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_worker_task_flushes_on_shutdown() {
    let p = pipeline().await;

    for i in 0..3 {
        post_log(
            &p.app,
            json!({"service": "auth", "level": "WARN", "message": format!("retry {}", i)}),
        )
        .await;
    }

    let shutdown_tx = shutdown_channel();
    let queue: Arc<dyn LogQueue> = p.queue.clone();
    let store: Arc<dyn LogStore> = p.store.clone();
    let handle = spawn_worker(
        queue,
        store,
        AccumulatorConfig {
            batch_size: 10,
            time_limit: Duration::from_secs(3600),
            idle_wait: Duration::from_millis(20),
            ..AccumulatorConfig::default()
        },
        shutdown_tx.subscribe(),
    );

    // Wait until the worker has drained the queue into its buffer
    for _ in 0..200 {
        if p.queue.len().await.unwrap() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(p.store.count().await.unwrap(), 0);

    shutdown_tx.send(ShutdownSignal::Graceful).unwrap();
    let report = handle.await.unwrap();

    assert_eq!(report.unpersisted, 0);
    assert_eq!(report.flushed, 3);
    assert_eq!(get_logs(&p.app, "?level=WARN").await.len(), 3);
}
