use crate::request::{Body, HttpRequest, Method};
use anyhow::Context;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Body chunks in transport order.
pub type ChunkStream = BoxStream<'static, anyhow::Result<Vec<u8>>>;

pub struct StreamingResponse {
    pub status: u16,
    pub chunks: ChunkStream,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Drains the rest of the body; used for error responses.
    pub async fn collect_body(mut self) -> anyhow::Result<Vec<u8>> {
        let mut body = Vec::new();
        while let Some(chunk) = self.chunks.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(body)
    }
}

fn request_builder(
    client: &reqwest::Client,
    req: &HttpRequest,
) -> anyhow::Result<reqwest::RequestBuilder> {
    let mut headers = HeaderMap::new();
    for (k, v) in &req.headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .with_context(|| format!("invalid header name: {k}"))?;
        let value =
            HeaderValue::from_str(v).with_context(|| format!("invalid header value for {k}"))?;
        headers.insert(name, value);
    }

    let builder = match req.method {
        Method::Get => client.get(&req.url),
        Method::Post => client.post(&req.url),
        Method::Put => client.put(&req.url),
        Method::Delete => client.delete(&req.url),
    }
    .headers(headers);

    Ok(match &req.body {
        Body::Empty => builder,
        Body::Json(s) => builder.body(s.clone()),
    })
}

pub async fn execute(req: &HttpRequest, timeouts: Timeouts) -> anyhow::Result<HttpResponse> {
    // Important: without an explicit timeout, a broken endpoint can hang a
    // confirmation indefinitely.
    let client = reqwest::Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.request)
        .build()
        .context("build http client")?;

    log::debug!("http {} {}", req.method, req.url);
    let resp = request_builder(&client, req)?
        .send()
        .await
        .context("http request failed")?;
    let status = resp.status().as_u16();
    let body = resp
        .bytes()
        .await
        .context("failed reading response body")?
        .to_vec();

    Ok(HttpResponse { status, body })
}

/// Sends the request and hands back the body as it arrives.
///
/// Only the connect phase is bounded; a chat answer may legitimately take
/// longer than any fixed request timeout.
pub async fn open_stream(
    req: &HttpRequest,
    connect_timeout: Duration,
) -> anyhow::Result<StreamingResponse> {
    let client = reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .context("build http client")?;

    log::debug!("http stream {} {}", req.method, req.url);
    let resp = request_builder(&client, req)?
        .send()
        .await
        .context("http request failed")?;
    let status = resp.status().as_u16();
    let chunks = resp
        .bytes_stream()
        .map(|chunk| {
            chunk
                .map(|b| b.to_vec())
                .map_err(|e| anyhow::Error::new(e).context("stream read failed"))
        })
        .boxed();

    Ok(StreamingResponse { status, chunks })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndjson::FrameReader;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn execute_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/bookings/batch"))
            .respond_with(ResponseTemplate::new(400).set_body_raw(
                r#"{"error":"Aucune réservation"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let req = HttpRequest::new(Method::Delete, format!("{}/api/bookings/batch", server.uri()));
        let resp = execute(&req, Timeouts::default()).await.unwrap();
        assert_eq!(resp.status, 400);
        assert!(!resp.is_success());
        assert!(String::from_utf8_lossy(&resp.body).contains("Aucune"));
    }

    #[tokio::test]
    async fn open_stream_yields_full_body() {
        let server = MockServer::start().await;
        let body = "{\"type\":\"delta\",\"content\":\"a\"}\n{\"type\":\"delta\",\"content\":\"b\"}\n";
        Mock::given(method("POST"))
            .and(path("/api/chat/message"))
            .and(header("authorization", "Bearer t"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let req = HttpRequest::new(Method::Post, format!("{}/api/chat/message", server.uri()))
            .bearer("t")
            .json(r#"{"message":"hi"}"#);
        let mut resp = open_stream(&req, Duration::from_secs(2)).await.unwrap();
        assert!(resp.is_success());

        let mut reader = FrameReader::new();
        let mut records = Vec::new();
        while let Some(chunk) = resp.chunks.next().await {
            records.extend(reader.push(&chunk.unwrap()));
        }
        records.extend(reader.finish());
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn json_body_and_headers_reach_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/chat/context"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({"last_booking_id": 5})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let req = HttpRequest::new(Method::Put, format!("{}/api/chat/context", server.uri()))
            .json(r#"{"last_booking_id":5}"#);
        assert!(execute(&req, Timeouts::default()).await.unwrap().is_success());
    }

    #[tokio::test]
    async fn connection_refused_is_an_error() {
        let req = HttpRequest::new(Method::Get, "http://127.0.0.1:9/");
        let timeouts = Timeouts {
            connect: Duration::from_secs(1),
            request: Duration::from_secs(2),
        };
        assert!(execute(&req, timeouts).await.is_err());
    }
}
