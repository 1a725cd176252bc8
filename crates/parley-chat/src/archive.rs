//! Password-encrypted conversation archives.
//!
//! An archive is the rendered chat log sealed with
//! [`parley_shared::crypto::seal_with_password`]:
//! `[rounds: u32 LE][salt: 16][nonce: 12][ciphertext + tag]`. The round count
//! travels with the file so archives written with any setting stay readable.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use parley_shared::constants::MIN_CIPHERTEXT_SIZE;
use parley_shared::crypto::{open_with_password, seal_with_password, SEALED_HEADER_SIZE};
use tracing::info;

use crate::error::ArchiveError;

pub const ARCHIVE_EXTENSION: &str = "arc";

/// Smallest well-formed archive (empty log).
pub const MIN_ARCHIVE_SIZE: usize = SEALED_HEADER_SIZE + MIN_CIPHERTEXT_SIZE;

/// Encrypt `log_text` under `password` into a new timestamped file inside
/// `dir`, creating the directory if needed. Returns the file's path.
pub fn archive_chat(
    log_text: &str,
    password: &[u8],
    dir: &Path,
    rounds: u32,
) -> Result<PathBuf, ArchiveError> {
    let sealed = seal_with_password(password, log_text.as_bytes(), rounds)?;

    fs::create_dir_all(dir)?;
    let stem = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let (path, mut file) = create_unique(dir, &stem)?;
    file.write_all(&sealed)?;
    file.sync_all()?;

    info!(path = %path.display(), rounds, len = sealed.len(), "Wrote archive");
    Ok(path)
}

/// Two archives in the same second get `-1`, `-2`, ... suffixes instead of
/// overwriting each other.
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, fs::File), ArchiveError> {
    let mut suffix = 0u32;
    loop {
        let name = match suffix {
            0 => format!("{stem}.{ARCHIVE_EXTENSION}"),
            n => format!("{stem}-{n}.{ARCHIVE_EXTENSION}"),
        };
        let path = dir.join(name);
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Read back an archive written by [`archive_chat`].
pub fn decrypt_archive(path: &Path, password: &[u8]) -> Result<String, ArchiveError> {
    let data = fs::read(path)?;
    if data.len() < MIN_ARCHIVE_SIZE {
        return Err(ArchiveError::InvalidArchive {
            size: data.len(),
            min: MIN_ARCHIVE_SIZE,
        });
    }

    let plaintext = open_with_password(password, &data)?;
    String::from_utf8(plaintext).map_err(|_| ArchiveError::InvalidText)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_shared::constants::ARCHIVE_KDF_ROUNDS;
    use parley_shared::error::CryptoError;

    const LOG: &str = "alice @ 12:00:00: hi\nbob @ 12:00:01: hello";

    #[test]
    fn test_archive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = archive_chat(LOG, b"hunter2", dir.path(), ARCHIVE_KDF_ROUNDS).unwrap();

        assert_eq!(path.extension().unwrap(), ARCHIVE_EXTENSION);
        assert_eq!(decrypt_archive(&path, b"hunter2").unwrap(), LOG);
    }

    #[test]
    fn test_rounds_stored_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = archive_chat(LOG, b"pw", dir.path(), 16).unwrap();

        let data = fs::read(&path).unwrap();
        assert_eq!(data[..4], 16u32.to_le_bytes());
        assert_eq!(decrypt_archive(&path, b"pw").unwrap(), LOG);
    }

    #[test]
    fn test_wrong_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = archive_chat(LOG, b"hunter2", dir.path(), 16).unwrap();

        assert!(matches!(
            decrypt_archive(&path, b"hunter3"),
            Err(ArchiveError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = archive_chat("", b"pw", &nested, 16).unwrap();

        assert!(path.starts_with(&nested));
        assert_eq!(decrypt_archive(&path, b"pw").unwrap(), "");
    }

    #[test]
    fn test_same_second_archives_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let first = archive_chat("one", b"pw", dir.path(), 16).unwrap();
        let second = archive_chat("two", b"pw", dir.path(), 16).unwrap();

        assert_ne!(first, second);
        assert_eq!(decrypt_archive(&first, b"pw").unwrap(), "one");
        assert_eq!(decrypt_archive(&second, b"pw").unwrap(), "two");
    }

    #[test]
    fn test_short_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.arc");
        fs::write(&path, [0u8; 10]).unwrap();

        assert!(matches!(
            decrypt_archive(&path, b"pw"),
            Err(ArchiveError::InvalidArchive { size: 10, .. })
        ));
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            archive_chat(LOG, b"pw", dir.path(), 0),
            Err(ArchiveError::Crypto(CryptoError::InvalidRounds { .. }))
        ));
    }

    #[test]
    fn test_corrupt_round_count_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = archive_chat(LOG, b"pw", dir.path(), 16).unwrap();

        let mut data = fs::read(&path).unwrap();
        data[..4].copy_from_slice(&u32::MAX.to_le_bytes());
        fs::write(&path, &data).unwrap();

        assert!(matches!(
            decrypt_archive(&path, b"pw"),
            Err(ArchiveError::Crypto(CryptoError::InvalidRounds { .. }))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            decrypt_archive(&dir.path().join("nope.arc"), b"pw"),
            Err(ArchiveError::Io(_))
        ));
    }
}
