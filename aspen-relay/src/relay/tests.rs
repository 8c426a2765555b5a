// Copyright 2026 The Aspen Project
// SPDX-License-Identifier: Apache-2.0

// Tests for the stream relay
//
//  1. Request forwarded unmodified (method, URL, body, content type, deadline)
//  2. Chunks forwarded verbatim and in order
//  3. Each chunk forwarded before the next one exists
//  4. Non-success status -> terminal error with status + body, nothing streamed
//  5. Success without body -> distinct error
//  6. Mid-stream read error -> delivered on the stream after earlier chunks
//  7. Transport failure / timeout before any response
//  8. Downstream disconnect releases the upstream body
//  9. Observable state: open -> streaming -> closed / errored

use super::forwarder::forward;
use super::*;
use crate::upstream::{ByteStream, HttpError, HttpResponse};
use async_trait::async_trait;
use axum::http::{header, Method, StatusCode};
use std::sync::Mutex;
use tokio::time::{timeout, Duration};
use tokio_stream::StreamExt;

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Hands out one prepared response and records the request it was given.
struct ScriptedSender {
    response: Mutex<Option<Result<HttpResponse, HttpError>>>,
    captured: Mutex<Option<HttpRequest>>,
}

impl ScriptedSender {
    fn new(response: Result<HttpResponse, HttpError>) -> Self {
        Self {
            response: Mutex::new(Some(response)),
            captured: Mutex::new(None),
        }
    }

    fn captured(&self) -> HttpRequest {
        self.captured.lock().unwrap().clone().expect("no request sent")
    }
}

#[async_trait]
impl HttpSender for ScriptedSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        *self.captured.lock().unwrap() = Some(request);
        self.response
            .lock()
            .unwrap()
            .take()
            .expect("ScriptedSender used twice")
    }
}

fn response(status: StatusCode, body: Option<ByteStream>) -> Result<HttpResponse, HttpError> {
    Ok(HttpResponse {
        status,
        body,
    })
}

fn body_of(items: Vec<Result<&'static [u8], HttpError>>) -> Option<ByteStream> {
    let items: Vec<Result<Bytes, HttpError>> = items
        .into_iter()
        .map(|r| r.map(Bytes::from_static))
        .collect();
    Some(Box::pin(tokio_stream::iter(items)))
}

/// An upstream body fed by the test, one chunk at a time.
fn channel_body() -> (mpsc::Sender<Result<Bytes, HttpError>>, ByteStream) {
    let (tx, rx) = mpsc::channel(16);
    (tx, Box::pin(ReceiverStream::new(rx)))
}

fn upstream_config() -> UpstreamConfig {
    UpstreamConfig {
        url: "http://backend.test/agent_chat".to_string(),
        timeout_ms: Some(1500),
    }
}

fn relay_with(sender: Arc<ScriptedSender>) -> StreamRelay {
    StreamRelay::new(sender, upstream_config())
}

async fn drain(stream: &mut RelayStream) -> Vec<Result<Bytes, RelayError>> {
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item);
    }
    items
}

// ---------------------------------------------------------------------------
// 1. Request shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn request_forwarded_unmodified() {
    let sender = Arc::new(ScriptedSender::new(response(StatusCode::OK, body_of(vec![]))));
    let relay = relay_with(sender.clone());

    let body = Bytes::from_static(br#"{"message":"list files","extra":[1,2]}"#);
    let mut stream = relay.relay(body.clone()).await.unwrap();
    drain(&mut stream).await;

    let req = sender.captured();
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.url, "http://backend.test/agent_chat");
    assert_eq!(req.body, body);
    assert_eq!(req.headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
    assert_eq!(req.timeout_ms, Some(1500));
}

#[tokio::test]
async fn relay_json_serializes_payload() {
    let sender = Arc::new(ScriptedSender::new(response(StatusCode::OK, body_of(vec![]))));
    let relay = relay_with(sender.clone());

    let payload = serde_json::json!({ "message": "hi" });
    let mut stream = relay.relay_json(&payload).await.unwrap();
    drain(&mut stream).await;

    let sent: serde_json::Value = serde_json::from_slice(&sender.captured().body).unwrap();
    assert_eq!(sent, payload);
}

// ---------------------------------------------------------------------------
// 2. Verbatim, ordered forwarding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chunks_forwarded_verbatim_in_order() {
    // The second chunk boundary cuts a multi-byte character; the relay must not care.
    let chunks: Vec<Result<&'static [u8], HttpError>> = vec![
        Ok(b"{\"te".as_slice()),
        Ok(b"xt\":\"12 \xE2".as_slice()),
        Ok(b"\x82\xAC\"}\n".as_slice()),
    ];

    let sender = Arc::new(ScriptedSender::new(response(StatusCode::OK, body_of(chunks))));
    let relay = relay_with(sender);

    let mut stream = relay.relay(Bytes::from_static(b"{}")).await.unwrap();
    let items = drain(&mut stream).await;
    let got: Vec<Bytes> = items.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(
        got,
        vec![
            Bytes::from_static(b"{\"te"),
            Bytes::from_static(b"xt\":\"12 \xE2"),
            Bytes::from_static(b"\x82\xAC\"}\n"),
        ]
    );

    let summary = stream.summary().await.unwrap();
    assert_eq!(summary.state, RelayState::Closed);
    assert_eq!(summary.chunks, 3);
    assert_eq!(summary.bytes, got.iter().map(|b| b.len()).sum::<usize>());
    assert_eq!(summary.error, None);
}

#[tokio::test]
async fn empty_upstream_body_ends_cleanly() {
    let sender = Arc::new(ScriptedSender::new(response(StatusCode::OK, body_of(vec![]))));
    let relay = relay_with(sender);

    let mut stream = relay.relay(Bytes::from_static(b"{}")).await.unwrap();
    assert!(drain(&mut stream).await.is_empty());
    let summary = stream.summary().await.unwrap();
    assert_eq!(summary.state, RelayState::Closed);
    assert_eq!(summary.chunks, 0);
}

// ---------------------------------------------------------------------------
// 3. No batching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn each_chunk_forwarded_before_next_arrives() {
    let (upstream_tx, body) = channel_body();
    let sender = Arc::new(ScriptedSender::new(response(StatusCode::OK, Some(body))));
    let relay = relay_with(sender);

    let mut stream = relay.relay(Bytes::from_static(b"{}")).await.unwrap();

    for part in ["{\"text\":\"a\"}\n", "{\"text\":\"b\"}\n"] {
        upstream_tx.send(Ok(Bytes::from(part))).await.unwrap();
        let got = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("chunk should be forwarded without waiting for more")
            .unwrap()
            .unwrap();
        assert_eq!(got, Bytes::from(part));
    }

    drop(upstream_tx);
    assert!(stream.next().await.is_none());
}

// ---------------------------------------------------------------------------
// 4-5. Fail fast before streaming
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_success_status_is_terminal_error_with_body() {
    let sender = Arc::new(ScriptedSender::new(response(
        StatusCode::INTERNAL_SERVER_ERROR,
        body_of(vec![Ok(b"{\"detail\":\"agent ".as_slice()), Ok(b"crashed\"}".as_slice())]),
    )));
    let relay = relay_with(sender);

    let err = relay.relay(Bytes::from_static(b"{}")).await.err().unwrap();
    assert_eq!(
        err,
        RelayError::UpstreamStatus {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "{\"detail\":\"agent crashed\"}".to_string(),
        }
    );
}

#[tokio::test]
async fn non_success_status_with_ndjson_body_is_not_streamed() {
    let sender = Arc::new(ScriptedSender::new(response(
        StatusCode::BAD_REQUEST,
        body_of(vec![Ok(b"{\"text\":\"should not be relayed\"}\n".as_slice())]),
    )));
    let relay = relay_with(sender);

    match relay.relay(Bytes::from_static(b"{}")).await {
        Err(RelayError::UpstreamStatus { status, body }) => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body.contains("should not be relayed"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("error status must not produce a stream"),
    }
}

#[tokio::test]
async fn success_without_body_is_distinct_error() {
    let sender = Arc::new(ScriptedSender::new(response(StatusCode::NO_CONTENT, None)));
    let relay = relay_with(sender);

    let err = relay.relay(Bytes::from_static(b"{}")).await.err().unwrap();
    assert_eq!(err, RelayError::UpstreamBodyMissing);
}

// ---------------------------------------------------------------------------
// 6. Mid-stream failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mid_stream_read_error_delivered_after_earlier_chunks() {
    let sender = Arc::new(ScriptedSender::new(response(
        StatusCode::OK,
        body_of(vec![
            Ok(b"{\"text\":\"partial\"}\n".as_slice()),
            Err(HttpError::Transport("connection reset".into())),
            Ok(b"{\"text\":\"never\"}\n".as_slice()),
        ]),
    )));
    let relay = relay_with(sender);

    let mut stream = relay.relay(Bytes::from_static(b"{}")).await.unwrap();
    let items = drain(&mut stream).await;

    assert_eq!(items.len(), 2, "nothing after the error: {items:?}");
    assert_eq!(
        items[0].as_ref().unwrap(),
        &Bytes::from_static(b"{\"text\":\"partial\"}\n")
    );
    assert_eq!(
        items[1].as_ref().unwrap_err(),
        &RelayError::UpstreamRead("connection reset".into())
    );

    let summary = stream.summary().await.unwrap();
    assert_eq!(summary.state, RelayState::Errored);
    assert_eq!(summary.chunks, 1);
    assert_eq!(
        summary.error,
        Some(RelayError::UpstreamRead("connection reset".into()))
    );
}

#[tokio::test]
async fn mid_stream_timeout_reported_as_timeout() {
    let sender = Arc::new(ScriptedSender::new(response(
        StatusCode::OK,
        body_of(vec![Err(HttpError::Timeout("deadline".into()))]),
    )));
    let relay = relay_with(sender);

    let mut stream = relay.relay(Bytes::from_static(b"{}")).await.unwrap();
    let items = drain(&mut stream).await;
    assert_eq!(
        items,
        vec![Err(RelayError::UpstreamTimeout("deadline".into()))]
    );
}

// ---------------------------------------------------------------------------
// 7. No response at all
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transport_failure_before_response() {
    let sender = Arc::new(ScriptedSender::new(Err(HttpError::Transport(
        "connection refused".into(),
    ))));
    let relay = relay_with(sender);

    let err = relay.relay(Bytes::from_static(b"{}")).await.err().unwrap();
    assert_eq!(err, RelayError::UpstreamTransport("connection refused".into()));
}

#[tokio::test]
async fn timeout_before_response() {
    let sender = Arc::new(ScriptedSender::new(Err(HttpError::Timeout("slow".into()))));
    let relay = relay_with(sender);

    let err = relay.relay(Bytes::from_static(b"{}")).await.err().unwrap();
    assert_eq!(err, RelayError::UpstreamTimeout("slow".into()));
}

// ---------------------------------------------------------------------------
// 8. Cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropping_relay_stream_releases_idle_upstream() {
    let (upstream_tx, body) = channel_body();
    let sender = Arc::new(ScriptedSender::new(response(StatusCode::OK, Some(body))));
    let relay = relay_with(sender);

    let stream = relay.relay(Bytes::from_static(b"{}")).await.unwrap();
    drop(stream);

    // The upstream body is dropped even though upstream never sends anything.
    timeout(Duration::from_secs(1), upstream_tx.closed())
        .await
        .expect("upstream body should be released after downstream goes away");
}

#[tokio::test]
async fn forward_reports_downstream_write_error() {
    let (upstream_tx, body) = channel_body();
    let (tx, rx) = mpsc::channel(1);

    let (state_tx, _state_rx) = watch::channel(RelayState::Open);

    let task = tokio::spawn(forward(body, tx, state_tx, "req-1".to_string()));

    upstream_tx.send(Ok(Bytes::from("first"))).await.unwrap();
    drop(rx);
    upstream_tx.send(Ok(Bytes::from("second"))).await.ok();

    let summary = timeout(Duration::from_secs(1), task)
        .await
        .expect("forwarding should stop")
        .unwrap();
    assert_eq!(summary.state, RelayState::Errored);
    assert_eq!(summary.error, Some(RelayError::DownstreamWrite));

    timeout(Duration::from_secs(1), upstream_tx.closed())
        .await
        .expect("upstream body should be released");
}

#[tokio::test]
async fn forward_skips_empty_chunks() {
    let body = body_of(vec![Ok(b"".as_slice()), Ok(b"x".as_slice()), Ok(b"".as_slice())]).unwrap();
    let (tx, rx) = mpsc::channel(4);

    let (state_tx, state_rx) = watch::channel(RelayState::Open);

    let summary = forward(body, tx, state_tx, "req-2".to_string()).await;
    let got: Vec<_> = ReceiverStream::new(rx).collect().await;

    assert_eq!(got, vec![Ok(Bytes::from_static(b"x"))]);
    assert_eq!(summary.chunks, 1);
    assert_eq!(summary.state, RelayState::Closed);
    assert_eq!(*state_rx.borrow(), RelayState::Closed);
}

// ---------------------------------------------------------------------------
// 9. State
// ---------------------------------------------------------------------------

#[tokio::test]
async fn state_moves_from_open_through_streaming_to_closed() {
    let (upstream_tx, body) = channel_body();
    let sender = Arc::new(ScriptedSender::new(response(StatusCode::OK, Some(body))));
    let relay = relay_with(sender);

    let mut stream = relay.relay(Bytes::from_static(b"{}")).await.unwrap();
    assert_eq!(stream.state(), RelayState::Open);

    upstream_tx
        .send(Ok(Bytes::from_static(b"{\"text\":\"a\"}\n")))
        .await
        .unwrap();
    stream.next().await.unwrap().unwrap();
    assert_eq!(stream.state(), RelayState::Streaming);

    drop(upstream_tx);
    assert!(stream.next().await.is_none());
    assert_eq!(stream.state(), RelayState::Closed);
}

#[tokio::test]
async fn state_ends_errored_after_read_failure() {
    let sender = Arc::new(ScriptedSender::new(response(
        StatusCode::OK,
        body_of(vec![Err(HttpError::Transport("reset".into()))]),
    )));
    let relay = relay_with(sender);

    let mut stream = relay.relay(Bytes::from_static(b"{}")).await.unwrap();
    drain(&mut stream).await;
    assert_eq!(stream.state(), RelayState::Errored);
}

#[tokio::test]
async fn empty_body_closes_without_streaming() {
    let (state_tx, state_rx) = watch::channel(RelayState::Open);
    let (tx, _rx) = mpsc::channel(1);

    let summary = forward(body_of(vec![]).unwrap(), tx, state_tx, "req-3".to_string()).await;

    assert_eq!(summary.state, RelayState::Closed);
    assert_eq!(*state_rx.borrow(), RelayState::Closed);
}

#[tokio::test]
async fn summary_is_none_when_forwarding_task_panics() {
    let (_tx, rx) = mpsc::channel(1);
    let (_state_tx, state_rx) = watch::channel(RelayState::Open);
    let task: JoinHandle<RelaySummary> = tokio::spawn(async {
        if true {
            panic!("forwarder crashed");
        }
        RelaySummary::open()
    });
    let stream = RelayStream {
        inner: ReceiverStream::new(rx),
        task,
        state: state_rx,
        request_id: "req-4".to_string(),
    };

    assert_eq!(stream.summary().await, None);
}
