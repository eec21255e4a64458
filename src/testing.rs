//! In-process mock servers for provider tests.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::http::Uri;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::stream;
use serde_json::Value;
use tokio::net::TcpListener;

/// Every request a mock server received, as `(path, json body)`.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<(String, Value)>>>);

impl Recorded {
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, path: String, body: Value) {
        self.0.lock().unwrap().push((path, body));
    }
}

/// Start a server on an ephemeral port that answers every request with
/// `respond(path)`. Returns its base URL.
pub async fn spawn_server<F>(recorded: Recorded, respond: F) -> String
where
    F: Fn(&str) -> Response + Clone + Send + Sync + 'static,
{
    let app = Router::new().fallback(move |uri: Uri, body: Bytes| {
        let recorded = recorded.clone();
        let respond = respond.clone();
        async move {
            let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
            recorded.push(uri.path().to_string(), json);
            respond(uri.path())
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A chunked newline-delimited JSON body, one body frame per entry.
pub fn ndjson_body(chunks: Vec<Vec<u8>>) -> Response {
    let chunks = stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
    axum::http::Response::builder()
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(chunks))
        .unwrap()
}

/// A server-sent event stream with one `data:` event per value.
pub fn sse_body(events: Vec<Value>) -> Response {
    let events = stream::iter(
        events
            .into_iter()
            .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_string()))),
    );
    Sse::new(events).into_response()
}
