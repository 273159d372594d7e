use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use wire::{Citation, encode_record};

use super::*;
use crate::session::Conversation;

type BodyItem = Result<Bytes, std::io::Error>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn line(record: &WireRecord) -> String {
    encode_record(record).unwrap()
}

fn request(query: &str) -> (TurnRequest, CancellationToken) {
    let req = Conversation::new().submit(query).unwrap();
    let cancel = req.cancel.clone();
    (req, cancel)
}

/// Serve a body whose items are pushed through the returned sender.
async fn channel_server() -> (String, mpsc::Sender<BodyItem>) {
    let (body_tx, body_rx) = mpsc::channel::<BodyItem>(16);
    let slot = Arc::new(Mutex::new(Some(body_rx)));
    let router = Router::new().route(
        ANSWER_PATH,
        post(move || {
            let slot = Arc::clone(&slot);
            async move {
                let rx = slot.lock().unwrap().take().unwrap();
                let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                });
                Body::from_stream(stream)
            }
        }),
    );
    (serve(router).await, body_tx)
}

async fn run_turn(base: &str, query: &str) -> Vec<TurnEvent> {
    let client = RelayClient::new(base).unwrap();
    let (req, _cancel) = request(query);
    let (tx, mut rx) = mpsc::channel(64);
    client.stream_turn(req, tx).await;

    let mut events = Vec::new();
    while let Some(update) = rx.recv().await {
        events.push(update.event);
    }
    events
}

fn records(events: &[TurnEvent]) -> Vec<&WireRecord> {
    events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Record(r) => Some(r),
            _ => None,
        })
        .collect()
}

#[test]
fn endpoint_joins_base_without_double_slash() {
    let client = RelayClient::new("http://127.0.0.1:3000/").unwrap();
    assert_eq!(client.endpoint(), "http://127.0.0.1:3000/api/exaanswer");
}

#[test]
fn error_message_prefers_error_field() {
    assert_eq!(error_message(r#"{"error":"query is required"}"#), "query is required");
    assert_eq!(error_message(" bad gateway \n"), "bad gateway");
}

#[tokio::test]
async fn streams_records_in_order_then_completes() {
    let citation = Citation { id: "a".into(), url: "https://a.test".into(), title: "A".into(), ..Citation::default() };
    let body = [
        line(&WireRecord::CitationUpdate(vec![citation.clone()])),
        line(&WireRecord::ContentDelta("Hi".into())),
        line(&WireRecord::ContentDelta(" there".into())),
    ]
    .concat();
    let router = Router::new().route(ANSWER_PATH, post(move || async move { body }));
    let base = serve(router).await;

    let events = run_turn(&base, "hello").await;
    assert_eq!(
        records(&events),
        vec![
            &WireRecord::CitationUpdate(vec![citation]),
            &WireRecord::ContentDelta("Hi".into()),
            &WireRecord::ContentDelta(" there".into()),
        ]
    );
    assert!(matches!(events.last(), Some(TurnEvent::Completed)));
}

#[tokio::test]
async fn posts_query_as_json_body() {
    let router = Router::new().route(
        ANSWER_PATH,
        post(|Json(body): Json<Value>| async move {
            let query = body["query"].as_str().unwrap_or_default().to_owned();
            line(&WireRecord::ContentDelta(query))
        }),
    );
    let base = serve(router).await;

    let events = run_turn(&base, "User: hi\nwhat next?").await;
    assert_eq!(records(&events), vec![&WireRecord::ContentDelta("User: hi\nwhat next?".into())]);
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let body = format!(
        "{}not json\n{{\"choices\":[]}}\n\n{}",
        line(&WireRecord::ContentDelta("a".into())),
        line(&WireRecord::ContentDelta("b".into())),
    );
    let router = Router::new().route(ANSWER_PATH, post(move || async move { body }));
    let base = serve(router).await;

    let events = run_turn(&base, "q").await;
    assert_eq!(
        records(&events),
        vec![&WireRecord::ContentDelta("a".into()), &WireRecord::ContentDelta("b".into())]
    );
    assert!(matches!(events.last(), Some(TurnEvent::Completed)));
}

#[tokio::test]
async fn unterminated_last_line_is_still_delivered() {
    let body = line(&WireRecord::ContentDelta("tail".into())).trim_end().to_owned();
    let router = Router::new().route(ANSWER_PATH, post(move || async move { body }));
    let base = serve(router).await;

    let events = run_turn(&base, "q").await;
    assert_eq!(records(&events), vec![&WireRecord::ContentDelta("tail".into())]);
}

#[tokio::test]
async fn error_status_fails_turn_with_server_message() {
    let router = Router::new().route(
        ANSWER_PATH,
        post(|| async {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Failed to perform search | boom" })))
        }),
    );
    let base = serve(router).await;

    let events = run_turn(&base, "q").await;
    assert_eq!(events.len(), 1);
    let TurnEvent::Failed(reason) = &events[0] else {
        panic!("expected failure, got {events:?}");
    };
    assert!(reason.contains("500"));
    assert!(reason.contains("Failed to perform search | boom"));
}

#[tokio::test]
async fn connection_refused_fails_turn() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let events = run_turn(&format!("http://{addr}"), "q").await;
    assert!(matches!(events.as_slice(), [TurnEvent::Failed(_)]));
}

#[tokio::test]
async fn truncated_body_fails_turn_after_delivered_records() {
    let (base, body_tx) = channel_server().await;
    let client = RelayClient::new(&base).unwrap();
    let (req, _cancel) = request("q");
    let (tx, mut rx) = mpsc::channel(64);
    let task = tokio::spawn(async move { client.stream_turn(req, tx).await });

    body_tx.send(Ok(Bytes::from(line(&WireRecord::ContentDelta("part".into()))))).await.unwrap();
    let first = rx.recv().await.unwrap();
    assert!(matches!(first.event, TurnEvent::Record(WireRecord::ContentDelta(ref s)) if s == "part"));

    body_tx.send(Err(std::io::Error::other("upstream reset"))).await.unwrap();
    task.await.unwrap();

    let last = rx.recv().await.unwrap();
    assert!(matches!(last.event, TurnEvent::Failed(_)));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn cancellation_stops_updates_without_terminal_event() {
    let (base, body_tx) = channel_server().await;
    let client = RelayClient::new(&base).unwrap();
    let (req, cancel) = request("q");
    let (tx, mut rx) = mpsc::channel(64);
    let task = tokio::spawn(async move { client.stream_turn(req, tx).await });

    body_tx.send(Ok(Bytes::from(line(&WireRecord::ContentDelta("first".into()))))).await.unwrap();
    let first = rx.recv().await.unwrap();
    assert!(matches!(first.event, TurnEvent::Record(WireRecord::ContentDelta(ref s)) if s == "first"));

    cancel.cancel();
    task.await.unwrap();
    // The body may still be writable; nothing sent now reaches the receiver.
    let _ = body_tx.send(Ok(Bytes::from(line(&WireRecord::ContentDelta("late".into()))))).await;

    assert!(rx.recv().await.is_none());
}
