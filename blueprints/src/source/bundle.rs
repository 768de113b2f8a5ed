//! Cloud bundle archives: metadata, hashing and packing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::SourceResult;

/// Description of the current bundle, as served by the metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Download location of the zip archive.
    pub url: String,
    /// Lowercase hex SHA-256 of the archive.
    pub hash: String,
}

impl BundleMetadata {
    /// Compare hashes ignoring case.
    pub fn hash_matches(&self, other: &str) -> bool {
        self.hash.trim().eq_ignore_ascii_case(other.trim())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash a file without loading it whole.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Pack every `*.<file_type>` file under `dir` into the zip archive `out`.
///
/// Entry names are relative to `dir` with `/` separators, so the data path
/// of `dir/npc/Enemies.csv` is `npc/Enemies`. Returns the metadata to
/// publish for the archive, `url` being its future download location.
pub fn write_bundle(dir: &Path, out: &Path, file_type: &str, url: &str) -> SourceResult<BundleMetadata> {
    let suffix = format!(".{}", file_type.trim_start_matches('.'));
    let mut files = Vec::new();
    collect_files(dir, &suffix, &mut files)?;
    files.sort();

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(File::create(out)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in &files {
        let name = entry_name(dir, file);
        writer.start_file(name, options)?;
        writer.write_all(&std::fs::read(file)?)?;
    }
    writer.finish()?;

    Ok(BundleMetadata {
        url: url.to_string(),
        hash: file_sha256(out)?,
    })
}

fn collect_files(dir: &Path, suffix: &str, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, suffix, files)?;
        } else if path.to_string_lossy().ends_with(suffix) {
            files.push(path);
        }
    }
    Ok(())
}

fn entry_name(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
