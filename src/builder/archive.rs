//! Archive collaborator: payload packing and advisory listing.
//!
//! Packing and listing shell out to 7-Zip. The listing parse feeds only the
//! registry size-estimate hint; it is a regular-expression match over
//! human-readable tool output and silently degrades to "no estimate" when
//! the format does not match.

use crate::error::{Error, Result};
use crate::settings::Compression;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;

/// Locates the 7-Zip binary on PATH (`7za`, then `7z`).
pub fn find_seven_zip() -> Result<PathBuf> {
    which::which("7za")
        .or_else(|_| which::which("7z"))
        .map_err(|_| Error::ToolNotFound {
            tool: "7za".into(),
            hint: "install p7zip (e.g. apt-get install p7zip-full)".into(),
        })
}

/// Packs a payload directory into a 7z archive.
pub async fn pack_directory(
    seven_zip: &Path,
    source_dir: &Path,
    archive: &Path,
    compression: Compression,
) -> Result<()> {
    let level = match compression {
        Compression::None => "-mx=0",
        Compression::Zlib | Compression::Bzip2 => "-mx=3",
        Compression::Lzma => "-mx=9",
    };

    let output = Command::new(seven_zip)
        .arg("a")
        .arg("-t7z")
        .arg(level)
        .arg(archive)
        .arg(source_dir.join("*"))
        .output()
        .await
        .map_err(|e| Error::ExecFailed {
            command: seven_zip.display().to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::ExecFailed {
            command: seven_zip.display().to_string(),
            reason: combined_output(&output),
        });
    }
    Ok(())
}

/// Sums per-entry uncompressed sizes from the archive listing.
///
/// Advisory only: any spawn or parse failure returns `None` and the caller
/// omits its size estimate rather than failing the build.
pub async fn list_entry_sizes_total(seven_zip: &Path, archive: &Path) -> Option<u64> {
    let output = Command::new(seven_zip)
        .arg("l")
        .arg(archive)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        log::warn!(
            "archive listing of {} failed; omitting size estimate",
            archive.display()
        );
        return None;
    }
    let listing = String::from_utf8_lossy(&output.stdout);
    let total = parse_listing_entry_sizes(&listing);
    if total.is_none() {
        log::warn!(
            "could not parse archive listing of {}; omitting size estimate",
            archive.display()
        );
    }
    total
}

/// Parses per-entry sizes from `7z l` output and sums them.
///
/// Entry lines look like:
/// `2024-05-01 10:22:33 ....A       123456        6789  bin/app.exe`
pub fn parse_listing_entry_sizes(listing: &str) -> Option<u64> {
    static ENTRY: OnceLock<Regex> = OnceLock::new();
    let entry = ENTRY.get_or_init(|| {
        // The attribute column keeps the summary line (digits there) from
        // being counted as an entry.
        Regex::new(r"(?m)^\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\s+[A-Za-z.]+\s+(\d+)\s+")
            .expect("entry regex is valid")
    });

    let mut total: u64 = 0;
    let mut matched = false;
    for capture in entry.captures_iter(listing) {
        matched = true;
        total = total.checked_add(capture[1].parse().ok()?)?;
    }
    matched.then_some(total)
}

fn combined_output(output: &std::process::Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
   Date      Time    Attr         Size   Compressed  Name
------------------- ----- ------------ ------------  ------------------------
2024-05-01 10:22:33 ....A       123456         6789  bin/app.exe
2024-05-01 10:22:34 ....A         1024          512  resources/app.dat
------------------- ----- ------------ ------------  ------------------------
2024-05-01 10:22:34             124480         7301  2 files
";

    #[test]
    fn sums_per_entry_sizes() {
        assert_eq!(parse_listing_entry_sizes(LISTING), Some(124_480));
    }

    #[test]
    fn unrecognized_output_degrades_to_none() {
        assert_eq!(parse_listing_entry_sizes("something else entirely"), None);
        assert_eq!(parse_listing_entry_sizes(""), None);
    }
}
