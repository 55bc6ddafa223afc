//! Unix socket delivery of finished documents.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::instrument;

/// Connect-and-send timeout.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Streams `document` to the listener at `socket` and closes the write half.
///
/// # Errors
///
/// Returns an error if the socket cannot be reached, the write fails, or
/// the whole exchange exceeds 30 seconds.
#[instrument(skip_all, fields(socket = %socket.display()))]
pub async fn deliver(socket: &Path, document: &[u8]) -> Result<()> {
    let send = async {
        let mut stream = UnixStream::connect(socket).await?;
        stream.write_all(document).await?;
        stream.shutdown().await
    };
    tokio::time::timeout(DELIVERY_TIMEOUT, send)
        .await
        .with_context(|| format!("timed out delivering to {}", socket.display()))?
        .with_context(|| format!("failed to send to socket {}", socket.display()))?;

    tracing::info!(bytes = document.len(), "Feed delivered");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;

    use super::*;

    #[tokio::test]
    async fn test_deliver_sends_whole_document() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epg.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        });

        // Act
        deliver(&path, b"<tv></tv>\n").await.unwrap();

        // Assert
        assert_eq!(server.await.unwrap(), b"<tv></tv>\n");
    }

    #[tokio::test]
    async fn test_deliver_missing_socket() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.sock");

        // Act
        let result = deliver(&path, b"<tv/>").await;

        // Assert
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("failed to send to socket")
        );
    }
}
