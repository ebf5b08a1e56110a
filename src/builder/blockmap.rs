//! Differential-update metadata.
//!
//! Self-contained installers get a content-addressed chunk index (block
//! map) over the finished binary so the updater can fetch only changed byte
//! ranges. Web installers skip that and instead get a manifest mapping
//! architecture to packaged-file descriptor, consulted at download time.

use crate::builder::symbols::PackagedPayload;
use crate::error::{ErrorExt, Result};
use crate::settings::Settings;
use base64::Engine;
use flate2::Compression as GzLevel;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

const CHUNK_MIN: u32 = 16 * 1024;
const CHUNK_AVG: u32 = 32 * 1024;
const CHUNK_MAX: u32 = 64 * 1024;

/// Content-addressed chunk index of one artifact.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlockMap {
    /// Format version.
    pub version: String,
    /// Indexed files (always one entry for an installer binary).
    pub files: Vec<BlockMapFile>,
}

/// Chunk index for a single file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlockMapFile {
    /// File name within the artifact set.
    pub name: String,
    /// Byte offset of the indexed region.
    pub offset: u64,
    /// Base64 SHA-256 per chunk, in order.
    pub checksums: Vec<String>,
    /// Chunk sizes in bytes, parallel to `checksums`.
    pub sizes: Vec<u32>,
}

/// Computes the chunk index over `data` using content-defined chunking.
///
/// Deterministic for identical input, and chunk boundaries survive small
/// insertions elsewhere in the file, which is what makes delta downloads
/// effective.
pub fn compute_block_map(name: &str, data: &[u8]) -> BlockMap {
    let mut checksums = Vec::new();
    let mut sizes = Vec::new();
    for chunk in fastcdc::v2020::FastCDC::new(data, CHUNK_MIN, CHUNK_AVG, CHUNK_MAX) {
        let digest = Sha256::digest(&data[chunk.offset..chunk.offset + chunk.length]);
        checksums.push(base64::engine::general_purpose::STANDARD.encode(digest));
        sizes.push(chunk.length as u32);
    }
    BlockMap {
        version: "2".to_string(),
        files: vec![BlockMapFile {
            name: name.to_string(),
            offset: 0,
            checksums,
            sizes,
        }],
    }
}

/// Writes `<artifact>.blockmap` (gzipped JSON) next to the artifact.
pub async fn write_block_map(artifact: &Path) -> Result<PathBuf> {
    let data = tokio::fs::read(artifact)
        .await
        .fs_context("reading artifact for block map", artifact)?;
    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let map = compute_block_map(&name, &data);

    let json = serde_json::to_vec(&map)?;
    let mut encoder = GzEncoder::new(Vec::new(), GzLevel::best());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    let out = artifact.with_extension(format!(
        "{}blockmap",
        artifact
            .extension()
            .map(|e| format!("{}.", e.to_string_lossy()))
            .unwrap_or_default()
    ));
    tokio::fs::write(&out, compressed)
        .await
        .fs_context("writing block map", &out)?;
    log::info!("wrote block map {}", out.display());
    Ok(out)
}

/// Update metadata for one finished installer artifact.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    /// Installer file name.
    pub file_name: String,
    /// Installer size in bytes.
    pub size: u64,
    /// SHA-512 of the installer, base64.
    pub sha512: String,
    /// The updater must pre-authorize elevation before an in-place update.
    pub is_admin_rights_required: bool,
    /// Block-map sidecar, when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_map_file: Option<PathBuf>,
}

/// One entry of the web-installer download manifest.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebPackageEntry {
    /// Packaged archive file name.
    pub file: String,
    /// Archive size in bytes.
    pub size: u64,
    /// SHA-512 of the archive, base64.
    pub sha512: String,
}

/// Whether an in-place update of this install needs elevated rights.
pub fn is_admin_rights_required(settings: &Settings) -> bool {
    settings.installer().per_machine || settings.installer().pack_elevation_helper
}

/// Writes the web-installer manifest mapping arch token to package
/// descriptor.
///
/// Consulted by the generated installer at download time, not compile time.
pub async fn write_web_manifest(
    out_dir: &Path,
    artifact_stem: &str,
    payloads: &[PackagedPayload],
) -> Result<PathBuf> {
    let entries: std::collections::BTreeMap<&str, WebPackageEntry> = payloads
        .iter()
        .map(|p| {
            (
                p.arch.token(),
                WebPackageEntry {
                    file: p.file_name.clone(),
                    size: p.archive_size,
                    sha512: p.sha512_base64.clone(),
                },
            )
        })
        .collect();

    let out = out_dir.join(format!("{artifact_stem}.packages.json"));
    let json = serde_json::to_vec_pretty(&entries)?;
    tokio::fs::write(&out, json)
        .await
        .fs_context("writing web package manifest", &out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Arch;

    fn sample_data() -> Vec<u8> {
        // Enough data to span several chunks, not all identical.
        (0..200_000u32).flat_map(|i| i.to_le_bytes()).collect()
    }

    #[test]
    fn block_map_is_deterministic() {
        let data = sample_data();
        let a = compute_block_map("setup.exe", &data);
        let b = compute_block_map("setup.exe", &data);
        assert_eq!(a.files[0].checksums, b.files[0].checksums);
        assert_eq!(a.files[0].sizes, b.files[0].sizes);
    }

    #[test]
    fn chunk_sizes_cover_the_input_exactly() {
        let data = sample_data();
        let map = compute_block_map("setup.exe", &data);
        let total: u64 = map.files[0].sizes.iter().map(|s| u64::from(*s)).sum();
        assert_eq!(total, data.len() as u64);
        assert_eq!(map.files[0].checksums.len(), map.files[0].sizes.len());
        assert!(map.files[0].sizes.len() > 1);
    }

    #[tokio::test]
    async fn block_map_sidecar_lands_next_to_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("App Setup 1.0.0.exe");
        tokio::fs::write(&artifact, sample_data()).await.unwrap();
        let sidecar = write_block_map(&artifact).await.unwrap();
        assert_eq!(
            sidecar.file_name().unwrap().to_string_lossy(),
            "App Setup 1.0.0.exe.blockmap"
        );
        assert!(sidecar.exists());
    }

    #[tokio::test]
    async fn web_manifest_maps_arch_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let payloads = vec![
            PackagedPayload {
                arch: Arch::X64,
                path: dir.path().join("a-x64.7z"),
                file_name: "a-x64.7z".into(),
                sha512_base64: "aGFzaA==".into(),
                archive_size: 5,
                unpacked_size: 10,
            },
            PackagedPayload {
                arch: Arch::Arm64,
                path: dir.path().join("a-arm64.7z"),
                file_name: "a-arm64.7z".into(),
                sha512_base64: "aGFzaDI=".into(),
                archive_size: 20,
                unpacked_size: 40,
            },
        ];
        let manifest = write_web_manifest(dir.path(), "App-Setup-1.0.0", &payloads)
            .await
            .unwrap();
        let text = tokio::fs::read_to_string(&manifest).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["x64"]["file"], "a-x64.7z");
        assert_eq!(value["arm64"]["size"], 20);
    }
}
