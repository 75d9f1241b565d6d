//! Input resolution: validate a user-supplied path and classify its contents.
//!
//! ## Why sniff instead of trusting the extension?
//!
//! Timing sheets are downloaded from several federation sites and often
//! arrive renamed. We check the `%PDF` magic bytes and fall back to a UTF-8
//! check so a `pdftotext` export saved as `.pdf` (or a PDF saved as `.txt`)
//! still reaches the right backend, and anything else fails with a clear
//! message instead of a pdfium crash.

use crate::error::ExtractError;
use crate::output::SourceKind;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Bytes examined when deciding whether a non-PDF file is a text dump.
const SNIFF_LEN: usize = 8 * 1024;

/// A validated input, either on disk already or copied from memory.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: SourceKind },
    /// Input came from a byte buffer; the temp file lives as long as this value.
    Buffered {
        path: PathBuf,
        kind: SourceKind,
        _temp_file: NamedTempFile,
    },
}

impl ResolvedInput {
    /// Get the path to the file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Buffered { path, .. } => path,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            ResolvedInput::Local { kind, .. } | ResolvedInput::Buffered { kind, .. } => *kind,
        }
    }
}

/// Resolve a local file path, validating existence, readability and format.
pub fn resolve_input(path_str: &str) -> Result<ResolvedInput, ExtractError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ExtractError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(ExtractError::UnsupportedInput {
            path,
            reason: "is a directory".into(),
        });
    }

    let mut head = Vec::with_capacity(SNIFF_LEN);
    match std::fs::File::open(&path) {
        Ok(f) => {
            f.take(SNIFF_LEN as u64)
                .read_to_end(&mut head)
                .map_err(|e| ExtractError::UnsupportedInput {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound { path });
        }
    }

    let kind = classify(&head).ok_or_else(|| ExtractError::UnsupportedInput {
        path: path.clone(),
        reason: "neither a PDF nor a UTF-8 text export".into(),
    })?;

    debug!("Resolved {:?} input: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

/// Copy an in-memory document to a managed temp file and resolve it.
///
/// pdfium needs a file-system path; the temp file is deleted when the
/// returned value is dropped.
pub fn resolve_bytes(bytes: &[u8]) -> Result<ResolvedInput, ExtractError> {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    let kind = classify(head).ok_or_else(|| ExtractError::UnsupportedInput {
        path: PathBuf::from("<memory>"),
        reason: "neither a PDF nor a UTF-8 text export".into(),
    })?;

    let mut tmp =
        NamedTempFile::new().map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;
    tmp.flush()
        .map_err(|e| ExtractError::Internal(format!("tempfile flush: {e}")))?;

    Ok(ResolvedInput::Buffered {
        path: tmp.path().to_path_buf(),
        kind,
        _temp_file: tmp,
    })
}

/// `Pdf` for `%PDF` magic, `Text` for valid UTF-8, otherwise `None`.
fn classify(head: &[u8]) -> Option<SourceKind> {
    if head.starts_with(b"%PDF") {
        return Some(SourceKind::Pdf);
    }
    match std::str::from_utf8(head) {
        Ok(_) => Some(SourceKind::Text),
        // The sniff window may cut a multi-byte character in half.
        Err(e) if e.error_len().is_none() => Some(SourceKind::Text),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_magic_and_text() {
        assert_eq!(classify(b"%PDF-1.7\n..."), Some(SourceKind::Pdf));
        assert_eq!(classify(b"1.\n12 SMITH JOHN\n"), Some(SourceKind::Text));
        assert_eq!(classify(&[0xff, 0xfe, 0x00, 0x81]), None);
    }

    #[test]
    fn truncated_utf8_is_still_text() {
        let s = "MÜLLER";
        let bytes = s.as_bytes();
        // Cut inside the two-byte Ü.
        assert_eq!(classify(&bytes[..2]), Some(SourceKind::Text));
    }

    #[test]
    fn missing_file_is_not_found() {
        let r = resolve_input("/definitely/not/here.pdf");
        assert!(matches!(r, Err(ExtractError::FileNotFound { .. })));
    }

    #[test]
    fn directory_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolve_input(dir.path().to_str().unwrap());
        assert!(matches!(r, Err(ExtractError::UnsupportedInput { .. })));
    }

    #[test]
    fn bytes_round_trip_through_temp_file() {
        let resolved = resolve_bytes(b"1.\n12 SMITH JOHN\n").unwrap();
        assert_eq!(resolved.kind(), SourceKind::Text);
        let path = resolved.path().to_path_buf();
        assert!(path.exists());
        drop(resolved);
        assert!(!path.exists());
    }
}
