use std::io;
use std::path::Path;

use futures::TryStreamExt;
use reqwest::{header, StatusCode};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

use crate::error::TransferError;
use crate::partition::Range;
use crate::store::{Destination, ObjectStore, PartReceipt};

/// Everything one part worker needs, owned by value. Workers share no
/// mutable state, which is what makes parallel dispatch safe.
#[derive(Debug, Clone)]
pub struct PartTask {
    pub source_url: String,
    pub range: Range,
    pub session_id: String,
    pub destination: Destination,
}

/// Fetches one byte range from the source and uploads it as one numbered
/// part of the multipart session.
///
/// The fetched body is staged in an unlinked temp file under `staging_dir`
/// rather than held in memory; the file vanishes with its descriptor, so a
/// failed attempt leaves nothing behind.
pub async fn transfer_part<S: ObjectStore>(
    client: &reqwest::Client,
    store: &S,
    task: &PartTask,
    staging_dir: &Path,
) -> Result<PartReceipt, TransferError> {
    let range = task.range;
    // The partitioner never emits an inverted range, but the worker is the
    // safety boundary for its own inputs.
    if range.start > range.end {
        return Err(TransferError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }

    let resp = client
        .get(&task.source_url)
        .header(header::RANGE, range.header_value())
        .send()
        .await?;
    if resp.status() != StatusCode::PARTIAL_CONTENT {
        // The source stopped honoring ranges; retrying cannot fix that.
        return Err(TransferError::UnexpectedStatus {
            status: resp.status().as_u16(),
        });
    }

    let staged = tempfile::tempfile_in(staging_dir)?;
    let mut staged = tokio::fs::File::from_std(staged);
    let mut body = StreamReader::new(resp.bytes_stream().map_err(io::Error::other));
    let content_length = tokio::io::copy(&mut body, &mut staged).await?;
    staged.flush().await?;
    staged.seek(io::SeekFrom::Start(0)).await?;

    let receipt = store
        .upload_part(
            &task.destination,
            &task.session_id,
            range.index,
            staged,
            content_length,
        )
        .await
        .map_err(TransferError::PartUpload)?;

    tracing::debug!(
        part = range.index,
        bytes = content_length,
        "uploaded part"
    );

    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    fn source_data() -> Vec<u8> {
        (0u8..64).collect()
    }

    // Honors Range headers the way a real HTTP server does, including
    // clamping an overshooting end offset.
    async fn ranged_source(headers: HeaderMap) -> Response {
        let data = source_data();
        let Some(range) = headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
        else {
            return data.into_response();
        };

        let (start, end) = range.split_once('-').unwrap();
        let start: usize = start.parse().unwrap();
        let end: usize = end.parse::<usize>().unwrap().min(data.len() - 1);
        (StatusCode::PARTIAL_CONTENT, data[start..=end].to_vec()).into_response()
    }

    // Ignores the Range header and replies with the full body.
    async fn full_body_source() -> Response {
        source_data().into_response()
    }

    async fn start_source(counter: Arc<AtomicUsize>) -> SocketAddr {
        let app = Router::new()
            .route(
                "/file.bin",
                get(move |headers: HeaderMap| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    ranged_source(headers)
                }),
            )
            .route("/stubborn.bin", get(full_body_source));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[derive(Default)]
    struct CaptureStore {
        uploads: Mutex<Vec<(u32, Vec<u8>)>>,
        fail_status: Option<u16>,
    }

    impl ObjectStore for CaptureStore {
        async fn create_session(&self, _dest: &Destination) -> Result<String, StoreError> {
            Ok("sess-1".to_string())
        }

        async fn upload_part(
            &self,
            _dest: &Destination,
            _session_id: &str,
            part_number: u32,
            mut body: tokio::fs::File,
            content_length: u64,
        ) -> Result<PartReceipt, StoreError> {
            if let Some(status) = self.fail_status {
                return Err(StoreError::Status(status));
            }
            let mut buf = Vec::new();
            tokio::io::AsyncReadExt::read_to_end(&mut body, &mut buf)
                .await
                .unwrap();
            assert_eq!(buf.len() as u64, content_length);
            self.uploads.lock().unwrap().push((part_number, buf));
            Ok(PartReceipt {
                part_number,
                integrity_tag: format!("tag-{}", part_number),
            })
        }

        async fn complete_session(
            &self,
            _dest: &Destination,
            _session_id: &str,
            _parts: &[PartReceipt],
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn abort_session(
            &self,
            _dest: &Destination,
            _session_id: &str,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn task(url: String, range: Range) -> PartTask {
        PartTask {
            source_url: url,
            range,
            session_id: "sess-1".to_string(),
            destination: Destination {
                container: "bucket".to_string(),
                key: "file.bin".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_fetches_exact_range_and_uploads_it() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = start_source(hits.clone()).await;
        let client = reqwest::Client::new();
        let store = CaptureStore::default();
        let staging = std::env::temp_dir();

        let task = task(
            format!("http://{}/file.bin", addr),
            Range {
                index: 2,
                start: 4,
                end: 10,
            },
        );
        let receipt = transfer_part(&client, &store, &task, &staging)
            .await
            .unwrap();

        assert_eq!(receipt.part_number, 2);
        assert_eq!(receipt.integrity_tag, "tag-2");
        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, 2);
        assert_eq!(uploads[0].1, source_data()[4..=10].to_vec());
    }

    #[tokio::test]
    async fn test_overshooting_final_range_is_clamped_by_source() {
        let addr = start_source(Arc::new(AtomicUsize::new(0))).await;
        let client = reqwest::Client::new();
        let store = CaptureStore::default();

        // Last range of partition(64, 9) overshoots by one byte.
        let task = task(
            format!("http://{}/file.bin", addr),
            Range {
                index: 7,
                start: 60,
                end: 64,
            },
        );
        transfer_part(&client, &store, &task, &std::env::temp_dir())
            .await
            .unwrap();

        let uploads = store.uploads.lock().unwrap();
        assert_eq!(uploads[0].1, source_data()[60..].to_vec());
    }

    #[tokio::test]
    async fn test_inverted_range_fails_before_any_fetch() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = start_source(hits.clone()).await;
        let client = reqwest::Client::new();
        let store = CaptureStore::default();

        let task = task(
            format!("http://{}/file.bin", addr),
            Range {
                index: 1,
                start: 20,
                end: 10,
            },
        );
        let err = transfer_part(&client, &store, &task, &std::env::temp_dir())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::InvalidRange { start: 20, end: 10 }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(store.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_partial_content_response_is_rejected() {
        let addr = start_source(Arc::new(AtomicUsize::new(0))).await;
        let client = reqwest::Client::new();
        let store = CaptureStore::default();

        let task = task(
            format!("http://{}/stubborn.bin", addr),
            Range {
                index: 1,
                start: 0,
                end: 10,
            },
        );
        let err = transfer_part(&client, &store, &task, &std::env::temp_dir())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::UnexpectedStatus { status: 200 }
        ));
        assert!(store.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_rejection_surfaces_as_upload_error() {
        let addr = start_source(Arc::new(AtomicUsize::new(0))).await;
        let client = reqwest::Client::new();
        let store = CaptureStore {
            fail_status: Some(400),
            ..CaptureStore::default()
        };

        let task = task(
            format!("http://{}/file.bin", addr),
            Range {
                index: 1,
                start: 0,
                end: 10,
            },
        );
        let err = transfer_part(&client, &store, &task, &std::env::temp_dir())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::PartUpload(StoreError::Status(400))
        ));
    }
}
