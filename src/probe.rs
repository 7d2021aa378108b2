use reqwest::header;

use crate::error::TransferError;

#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub total_length: u64,
}

/// Issues a metadata-only request against the source and verifies it is
/// suitable for a ranged transfer.
///
/// The source must advertise `Accept-Ranges: bytes` and a definitive
/// `Content-Length`; both are structural properties of the resource, so
/// violations are terminal rather than retried.
pub async fn probe(client: &reqwest::Client, url: &str) -> Result<ProbeOutcome, TransferError> {
    let resp = client.head(url).send().await?;
    let headers = resp.headers();

    let ranges_supported = headers
        .get(header::ACCEPT_RANGES)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("bytes"))
        .unwrap_or(false);
    if !ranges_supported {
        return Err(TransferError::RangesUnsupported);
    }

    let total_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or(TransferError::SizeUnknown)?;

    tracing::debug!(url, total_length, "probed source");

    Ok(ProbeOutcome { total_length })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn rangeable_resource() -> impl IntoResponse {
        ([(header::ACCEPT_RANGES, "bytes")], vec![0u8; 100])
    }

    async fn plain_resource() -> impl IntoResponse {
        vec![0u8; 100]
    }

    // Streamed body: no Content-Length on the wire.
    async fn sizeless_resource() -> impl IntoResponse {
        let stream = futures::stream::once(async { Ok::<_, std::io::Error>(vec![0u8; 16]) });
        (
            [(header::ACCEPT_RANGES, "bytes")],
            Body::from_stream(stream),
        )
    }

    async fn start_mock_source() -> SocketAddr {
        let app = Router::new()
            .route("/ranged", get(rangeable_resource))
            .route("/plain", get(plain_resource))
            .route("/sizeless", get(sizeless_resource));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_probe_reports_length() {
        let addr = start_mock_source().await;
        let client = reqwest::Client::new();

        let outcome = probe(&client, &format!("http://{}/ranged", addr))
            .await
            .unwrap();
        assert_eq!(outcome.total_length, 100);
    }

    #[tokio::test]
    async fn test_probe_rejects_source_without_range_support() {
        let addr = start_mock_source().await;
        let client = reqwest::Client::new();

        let err = probe(&client, &format!("http://{}/plain", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::RangesUnsupported));
    }

    #[tokio::test]
    async fn test_probe_rejects_source_without_length() {
        let addr = start_mock_source().await;
        let client = reqwest::Client::new();

        let err = probe(&client, &format!("http://{}/sizeless", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::SizeUnknown));
    }

    #[tokio::test]
    async fn test_probe_unreachable_source() {
        let client = reqwest::Client::new();
        let result = probe(&client, "http://127.0.0.1:1/nothing").await;
        assert!(matches!(result, Err(TransferError::SourceRequest(_))));
    }
}
