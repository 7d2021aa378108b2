use reqwest::header;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use super::{Destination, ObjectStore, PartReceipt, StoreError};

/// Client for an HTTP object store exposing a JSON session API:
///
/// - `POST   /sessions`                         → `{"session_id": "..."}`
/// - `PUT    /sessions/{id}/parts/{n}`          → integrity tag in `ETag`
/// - `POST   /sessions/{id}/complete`
/// - `DELETE /sessions/{id}`
///
/// Part bodies are streamed straight from the staged file, never buffered
/// whole.
#[derive(Clone)]
pub struct HttpStore {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    container: &'a str,
    key: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    session_id: String,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    container: &'a str,
    key: &'a str,
    parts: &'a [PartReceipt],
}

impl HttpStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }

    fn check(resp: &reqwest::Response) -> Result<(), StoreError> {
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Status(resp.status().as_u16()))
        }
    }
}

impl ObjectStore for HttpStore {
    async fn create_session(&self, dest: &Destination) -> Result<String, StoreError> {
        let resp = self
            .client
            .post(format!("{}/sessions", self.endpoint))
            .json(&SessionRequest {
                container: &dest.container,
                key: &dest.key,
            })
            .send()
            .await?;
        Self::check(&resp)?;

        let session: SessionResponse = resp
            .json()
            .await
            .map_err(|err| StoreError::Response(err.to_string()))?;
        Ok(session.session_id)
    }

    async fn upload_part(
        &self,
        dest: &Destination,
        session_id: &str,
        part_number: u32,
        body: tokio::fs::File,
        content_length: u64,
    ) -> Result<PartReceipt, StoreError> {
        let resp = self
            .client
            .put(format!(
                "{}/sessions/{}/parts/{}",
                self.endpoint, session_id, part_number
            ))
            .query(&[("container", &dest.container), ("key", &dest.key)])
            .header(header::CONTENT_LENGTH, content_length)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(body)))
            .send()
            .await?;
        Self::check(&resp)?;

        let integrity_tag = resp
            .headers()
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string())
            .ok_or_else(|| StoreError::Response("missing ETag header".to_string()))?;

        Ok(PartReceipt {
            part_number,
            integrity_tag,
        })
    }

    async fn complete_session(
        &self,
        dest: &Destination,
        session_id: &str,
        parts: &[PartReceipt],
    ) -> Result<(), StoreError> {
        let resp = self
            .client
            .post(format!("{}/sessions/{}/complete", self.endpoint, session_id))
            .json(&CompleteRequest {
                container: &dest.container,
                key: &dest.key,
                parts,
            })
            .send()
            .await?;
        Self::check(&resp)
    }

    async fn abort_session(&self, dest: &Destination, session_id: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .delete(format!("{}/sessions/{}", self.endpoint, session_id))
            .query(&[("container", &dest.container), ("key", &dest.key)])
            .send()
            .await?;
        Self::check(&resp)
    }
}
