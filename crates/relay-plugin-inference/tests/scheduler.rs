use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use relay_core::{RelayError, Result};
use relay_plugin_inference::{
    BackoffPolicy, CompletionBackend, CompletionRequest, InferenceRequest, InferenceScheduler,
    InferenceService, Priority, SchedulerHandle, SchedulerSettings, FALLBACK_TEXT,
};
use serde_json::json;
use tokio::sync::{mpsc, Semaphore};

fn settings() -> SchedulerSettings {
    SchedulerSettings {
        prompt_format: "{prompt}".into(),
        system: "You are Wizard.".into(),
        default_tokens: 128,
        temperature: 0.7,
        stop: vec!["user:".into()],
        repeat_penalty: 1.2,
        backoff: BackoffPolicy::default(),
        fallback: FALLBACK_TEXT.into(),
        default_latency: Duration::from_secs(120),
    }
}

/// Echoes the prompt back once the test lets it through.
struct GatedEcho {
    gate: Semaphore,
    started: mpsc::UnboundedSender<String>,
    seen: Mutex<Vec<CompletionRequest>>,
}

#[async_trait]
impl CompletionBackend for GatedEcho {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.seen.lock().unwrap().push(request.clone());
        let _ = self.started.send(request.prompt.clone());
        let _permit = self.gate.acquire().await.expect("gate open");
        Ok(request.prompt.clone())
    }
}

struct AlwaysDown {
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionBackend for AlwaysDown {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RelayError::InferenceError("connection refused".into()))
    }
}

struct Slow {
    delay: Duration,
}

#[async_trait]
impl CompletionBackend for Slow {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(format!("done {}", request.prompt))
    }
}

fn collecting(
    handle: &SchedulerHandle,
    tx: &mpsc::UnboundedSender<String>,
    prompt: &str,
    priority: Priority,
) {
    let tx = tx.clone();
    handle.submit(
        InferenceRequest::new(prompt, move |out| async move {
            tx.send(out)?;
            Ok(())
        })
        .priority(priority),
    );
}

#[tokio::test]
async fn supervisory_jobs_jump_the_queue() {
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let backend = Arc::new(GatedEcho {
        gate: Semaphore::new(0),
        started: started_tx,
        seen: Mutex::new(Vec::new()),
    });
    let (handle, _worker) = InferenceScheduler::new(backend.clone(), settings()).spawn();
    let (tx, mut rx) = mpsc::unbounded_channel();

    collecting(&handle, &tx, "busy", Priority::Normal);
    assert_eq!(started_rx.recv().await.unwrap(), "busy");

    collecting(&handle, &tx, "n1", Priority::Normal);
    collecting(&handle, &tx, "n2", Priority::Normal);
    collecting(&handle, &tx, "s1", Priority::Supervisory);
    collecting(&handle, &tx, "n3", Priority::Normal);
    collecting(&handle, &tx, "s2", Priority::Supervisory);
    assert_eq!(handle.queue_len(), 5);

    backend.gate.add_permits(16);
    let mut order = Vec::new();
    for _ in 0..6 {
        order.push(rx.recv().await.unwrap());
    }
    assert_eq!(order, ["busy", "s1", "s2", "n1", "n2", "n3"]);
    assert_eq!(handle.completed(), 6);
    assert_eq!(handle.queue_len(), 0);
}

#[tokio::test]
async fn payload_carries_overrides_and_sanitized_prompt() {
    let (started_tx, _started_rx) = mpsc::unbounded_channel();
    let backend = Arc::new(GatedEcho {
        gate: Semaphore::new(16),
        started: started_tx,
        seen: Mutex::new(Vec::new()),
    });
    let mut settings = settings();
    settings.prompt_format = "{system}\n{user}: {prompt}".into();
    let (handle, _worker) = InferenceScheduler::new(backend.clone(), settings).spawn();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let tx1 = tx.clone();
    handle.submit(
        InferenceRequest::new("<@42> hello", move |out| async move {
            tx1.send(out)?;
            Ok(())
        })
        .role("alice"),
    );
    handle.submit(
        InferenceRequest::new("summarize", move |out| async move {
            tx.send(out)?;
            Ok(())
        })
        .role("supervizor")
        .max_output_tokens(2048),
    );

    assert_eq!(rx.recv().await.unwrap(), "You are Wizard.\nalice:  hello");
    rx.recv().await.unwrap();

    let seen = backend.seen.lock().unwrap();
    assert_eq!(seen[0].n_predict, 128);
    assert_eq!(seen[0].stop, ["user:"]);
    assert_eq!(seen[0].repeat_penalty, 1.2);
    assert_eq!(seen[1].n_predict, 2048);
    assert_eq!(seen[1].prompt, "You are Wizard.\nsupervizor: summarize");
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_complete_with_fallback() {
    let backend = Arc::new(AlwaysDown {
        calls: AtomicUsize::new(0),
    });
    let (handle, _worker) = InferenceScheduler::new(backend.clone(), settings()).spawn();
    let (tx, mut rx) = mpsc::unbounded_channel();

    collecting(&handle, &tx, "Hi", Priority::Normal);

    assert_eq!(rx.recv().await.unwrap(), FALLBACK_TEXT);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 5);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn failing_callbacks_do_not_stop_the_worker() {
    let backend = Arc::new(Slow {
        delay: Duration::from_millis(1),
    });
    let (handle, worker) = InferenceScheduler::new(backend, settings()).spawn();
    let (tx, mut rx) = mpsc::unbounded_channel();

    handle.submit(InferenceRequest::new(
        "boom",
        |_: String| -> std::future::Ready<anyhow::Result<()>> { panic!("callback exploded") },
    ));
    handle.submit(InferenceRequest::new("err", |_| async {
        Err::<(), _>(anyhow::anyhow!("edit rejected"))
    }));
    collecting(&handle, &tx, "ok", Priority::Normal);

    assert_eq!(rx.recv().await.unwrap(), "done ok");
    assert_eq!(handle.completed(), 3);
    assert!(!worker.is_finished());
}

#[tokio::test(start_paused = true)]
async fn average_latency_is_mean_of_turnarounds() {
    let backend = Arc::new(Slow {
        delay: Duration::from_secs(2),
    });
    let (handle, _worker) = InferenceScheduler::new(backend, settings()).spawn();
    assert_eq!(handle.average_latency(), Duration::from_secs(120));

    let (tx, mut rx) = mpsc::unbounded_channel();
    collecting(&handle, &tx, "a", Priority::Normal);
    collecting(&handle, &tx, "b", Priority::Normal);
    rx.recv().await.unwrap();
    rx.recv().await.unwrap();

    // Both were queued at t=0 and finished at t=2s and t=4s.
    let average = handle.average_latency();
    assert!(
        average >= Duration::from_secs(3) && average < Duration::from_millis(3050),
        "{average:?}"
    );
}

#[tokio::test]
async fn end_to_end_against_http_endpoint() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/completion")
                .json_body_partial(r#"{"prompt": "Hi", "n_predict": 128}"#);
            then.status(200).json_body(json!({"content": "Hello!"}));
        })
        .await;

    let service =
        InferenceService::new(server.url("/completion"), Duration::from_secs(5)).unwrap();
    let (handle, _worker) = InferenceScheduler::new(Arc::new(service), settings()).spawn();
    let (tx, mut rx) = mpsc::unbounded_channel();

    collecting(&handle, &tx, "Hi", Priority::Normal);

    assert_eq!(rx.recv().await.unwrap(), "Hello!");
    mock.assert_async().await;
}

#[tokio::test]
async fn end_to_end_unreachable_endpoint_falls_back() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/completion");
            then.status(500);
        })
        .await;

    let service =
        InferenceService::new(server.url("/completion"), Duration::from_secs(5)).unwrap();
    let mut settings = settings();
    settings.backoff = BackoffPolicy::new(5, Duration::from_millis(1));
    let (handle, _worker) = InferenceScheduler::new(Arc::new(service), settings).spawn();
    let (tx, mut rx) = mpsc::unbounded_channel();

    collecting(&handle, &tx, "Hi", Priority::Normal);

    assert_eq!(rx.recv().await.unwrap(), FALLBACK_TEXT);
    mock.assert_hits_async(5).await;
}
