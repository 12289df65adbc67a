use std::io::ErrorKind;
use std::path::Path;

use tokio::io::AsyncReadExt;

use crate::{Algorithm, AnyHasher, ContentHash, Hasher, Result};

const READ_BUFFER: usize = 64 * 1024;

/// Digest a file on disk without loading it into memory.
pub async fn digest_file(path: &Path, algorithm: Algorithm) -> Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = AnyHasher::new(algorithm);
    let mut buffer = vec![0u8; READ_BUFFER];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Whether `path` exists and hashes to `expected`.
///
/// A missing file is `Ok(false)`; other I/O errors are propagated.
pub async fn file_matches(path: &Path, expected: &ContentHash) -> Result<bool> {
    match digest_file(path, expected.algorithm()).await {
        Ok(actual) => Ok(expected.matches(&actual)),
        Err(crate::VerifyError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
