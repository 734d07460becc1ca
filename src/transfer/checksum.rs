//! Checksum verification (spec §4.10): compares a local file's SHA-256
//! against the remote checksum the API reports.

use sha2::{Digest, Sha256};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::api::Api;
use super::error::Error;

/// Streams `reader` through SHA-256 and fetches the remote checksum via
/// `api.checksum(remote, force)` concurrently, returning
/// [`Error::ChecksumMismatch`] if they differ.
///
/// The two subtasks run in parallel via `tokio::join!` rather than
/// sequentially, since the remote fetch is a round trip independent of
/// the local read; `cancel` is honored at every suspension point in the
/// local digest loop.
pub async fn verify<A, R>(
    api: &A,
    reader: R,
    remote: &str,
    force: bool,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    A: Api,
    R: AsyncRead + Unpin,
{
    let (local, remote_sum) = tokio::join!(
        local_sha256(reader, cancel),
        async { api.checksum(remote, force).await },
    );
    let local = local?;
    let remote_sum: Vec<u8> = remote_sum?;

    if local != remote_sum {
        return Err(Error::ChecksumMismatch {
            local: hex(&local),
            remote: hex(&remote_sum),
        });
    }
    Ok(())
}

pub(super) async fn local_sha256<R: AsyncRead + Unpin>(
    mut reader: R,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, Error> {
    use tokio::io::AsyncReadExt;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            n = reader.read(&mut buf) => n.map_err(Error::Io)?,
        };
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_sha256_matches_reference_digest() {
        let mut expected = Sha256::new();
        expected.update(b"hello world");
        let expected = expected.finalize().to_vec();

        let cancel = CancellationToken::new();
        let reader = tokio::io::BufReader::new(std::io::Cursor::new(b"hello world".to_vec()));
        let got = local_sha256(reader, &cancel).await.unwrap();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn local_sha256_honors_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reader = tokio::io::BufReader::new(std::io::Cursor::new(b"hello world".to_vec()));
        let err = local_sha256(reader, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn hex_formats_lowercase() {
        assert_eq!(hex(&[0xAB, 0x01]), "ab01");
    }
}
