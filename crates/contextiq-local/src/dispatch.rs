//! File-type dispatch: route uploaded bytes to the right extractor.
//!
//! Both gates (size, extension allow-list) run before any extractor touches a
//! byte. Dispatch is a closed match over the enumerated format kinds with an
//! explicit unsupported arm, so an unknown extension can never fall through to
//! the wrong extractor.

use contextiq_core::{Error, Result, UploadPolicy, MIN_FILE_TEXT_CHARS};

use crate::{extract, normalize, ocr};

/// Closed set of formats the dispatcher recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    PlainText,
    Pdf,
    Docx,
    Image,
    /// Legacy binary Word format: recognized so it can be rejected with
    /// guidance instead of being attempted.
    LegacyDoc,
}

/// Lowercase trailing extension of a file name, if any.
pub fn extension(name: &str) -> Option<String> {
    let ext = name.rsplit_once('.')?.1;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn kind_for_extension(ext: &str) -> Option<FileKind> {
    match ext {
        "txt" | "md" | "csv" | "rtf" => Some(FileKind::PlainText),
        "pdf" => Some(FileKind::Pdf),
        "docx" => Some(FileKind::Docx),
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" => Some(FileKind::Image),
        "doc" => Some(FileKind::LegacyDoc),
        _ => None,
    }
}

fn gate(policy: &UploadPolicy, name: &str, len: u64) -> Result<FileKind> {
    if len > policy.max_bytes() {
        return Err(Error::SizeExceeded {
            got_mb: len.div_ceil(1024 * 1024),
            max_mb: policy.max_upload_mb,
        });
    }

    let Some(ext) = extension(name) else {
        return Err(Error::UnsupportedType(format!(
            "{name} has no file extension (allowed: {})",
            policy.allowed_extensions.join(", ")
        )));
    };

    match kind_for_extension(&ext) {
        Some(FileKind::LegacyDoc) => Err(Error::UnsupportedType(
            "legacy .doc is not supported; save the document as .docx or plain text and retry"
                .to_string(),
        )),
        Some(kind) if policy.allows(&ext) => Ok(kind),
        _ => Err(Error::UnsupportedType(format!(
            ".{ext} (allowed: {})",
            policy.allowed_extensions.join(", ")
        ))),
    }
}

/// Extract a normalized text buffer from an uploaded file.
///
/// Blocking decode work (PDF parsing, DOCX unzip, OCR shellout) runs off the
/// async runtime. All paths converge on the same minimum-length floor and
/// whitespace normalization.
pub async fn extract_file(
    policy: &UploadPolicy,
    name: &str,
    bytes: &[u8],
    progress: Option<ocr::Progress>,
) -> Result<String> {
    let kind = gate(policy, name, bytes.len() as u64)?;

    let raw = match kind {
        FileKind::PlainText => extract::plain_text(bytes),
        FileKind::Pdf => {
            let owned = bytes.to_vec();
            tokio::task::spawn_blocking(move || extract::pdf_to_text(&owned))
                .await
                .map_err(|e| Error::ExtractionFailed(format!("pdf task join failed: {e}")))??
        }
        FileKind::Docx => {
            let owned = bytes.to_vec();
            tokio::task::spawn_blocking(move || extract::docx_to_text(&owned))
                .await
                .map_err(|e| Error::ExtractionFailed(format!("docx task join failed: {e}")))??
        }
        FileKind::Image => {
            let owned = bytes.to_vec();
            let ext = extension(name).unwrap_or_default();
            tokio::task::spawn_blocking(move || ocr::image_to_text(&owned, &ext, progress))
                .await
                .map_err(|e| Error::ExtractionFailed(format!("ocr task join failed: {e}")))??
        }
        // gate() already rejected this arm; keep the same terminal error if a
        // future caller bypasses the gate.
        FileKind::LegacyDoc => {
            return Err(Error::UnsupportedType(
                "legacy .doc is not supported; save the document as .docx or plain text and retry"
                    .to_string(),
            ))
        }
    };

    let text = normalize::clean_text(&raw);
    normalize::ensure_min_chars(&text, MIN_FILE_TEXT_CHARS)?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn size_gate_runs_before_any_extractor() {
        let policy = UploadPolicy {
            max_upload_mb: 1,
            ..UploadPolicy::default()
        };
        // Valid text content; the size gate must reject it regardless.
        let big = vec![b'a'; 2 * 1024 * 1024];
        let err = extract_file(&policy, "notes.txt", &big, None)
            .await
            .unwrap_err();
        match err {
            Error::SizeExceeded { got_mb: 2, max_mb: 1 } => {}
            other => panic!("expected SizeExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disallowed_extension_is_rejected_before_decoding() {
        let policy = UploadPolicy::default();
        // Garbage bytes: if a decoder ran, it would fail differently.
        let err = extract_file(&policy, "payload.exe", b"\x00\x01\x02garbage", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn legacy_doc_is_rejected_with_guidance() {
        let policy = UploadPolicy::default();
        let err = extract_file(&policy, "old-report.doc", b"\xd0\xcf\x11\xe0junk", None)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(".docx"), "unexpected message: {msg}");
    }

    #[tokio::test]
    async fn missing_extension_is_unsupported() {
        let policy = UploadPolicy::default();
        let err = extract_file(&policy, "README", b"some plain text body", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn txt_upload_round_trips_with_unix_line_endings() {
        let policy = UploadPolicy::default();
        let text = extract_file(&policy, "Notes.TXT", b"line one\r\nline two\r\n", None)
            .await
            .unwrap();
        assert_eq!(text, "line one\nline two");
    }

    #[tokio::test]
    async fn floor_accepts_exactly_ten_chars_and_rejects_nine() {
        let policy = UploadPolicy::default();
        let ok = extract_file(&policy, "a.txt", b"abcdefghij", None).await;
        assert_eq!(ok.unwrap(), "abcdefghij");

        let err = extract_file(&policy, "a.txt", b"abcdefghi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContentTooShort { got: 9, min: 10 }));
    }

    #[tokio::test]
    async fn docx_upload_is_dispatched_to_the_docx_extractor() {
        use std::io::Write;
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let opts = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", opts).unwrap();
        zip.write_all(
            b"<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
              <w:body><w:p><w:r><w:t>Hello from a document body.</w:t></w:r></w:p></w:body>\
              </w:document>",
        )
        .unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let policy = UploadPolicy::default();
        let text = extract_file(&policy, "memo.docx", &bytes, None).await.unwrap();
        assert_eq!(text, "Hello from a document body.");
    }

    #[test]
    fn extension_parsing_is_lowercase_and_trailing() {
        assert_eq!(extension("a.b.TXT").as_deref(), Some("txt"));
        assert_eq!(extension("archive."), None);
        assert_eq!(extension("noext"), None);
    }
}
