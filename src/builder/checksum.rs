//! Content digests for payloads and artifacts.
//!
//! Payload integrity defines use SHA-512 reported as base64 (the hashing
//! collaborator's fixed encoding); finished-artifact checksums use SHA-256
//! hex. Files are read in 8 KiB chunks.

use crate::error::{ErrorExt, Result};
use base64::Engine;
use sha2::{Digest, Sha256, Sha512};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// SHA-256 of a file, hex-encoded (64 characters).
pub async fn sha256_hex(path: &Path) -> Result<String> {
    let digest = digest_file::<Sha256>(path).await?;
    Ok(hex::encode(digest))
}

/// SHA-512 of a file, base64-encoded.
pub async fn sha512_base64(path: &Path) -> Result<String> {
    let digest = digest_file::<Sha512>(path).await?;
    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}

async fn digest_file<D: Digest>(path: &Path) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path)
        .await
        .fs_context("opening file for hashing", path)?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .fs_context("reading file for hash calculation", path)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sha256_matches_known_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        tokio::fs::write(&path, b"abc").await.unwrap();
        assert_eq!(
            sha256_hex(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn sha512_base64_round_trips_through_hex_reencoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        tokio::fs::write(&path, b"payload bytes").await.unwrap();
        let b64 = sha512_base64(&path).await.unwrap();
        let hexed = crate::builder::symbols::base64_to_hex_upper(&b64).unwrap();
        let back = base64::engine::general_purpose::STANDARD
            .encode(hex::decode(hexed.to_lowercase()).unwrap());
        assert_eq!(back, b64);
    }
}
