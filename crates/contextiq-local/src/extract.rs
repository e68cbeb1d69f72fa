//! Per-format extractors: plain text, PDF, DOCX.
//!
//! Every extractor takes raw file bytes and produces UTF-8 text or fails with
//! `ExtractionFailed`. Failures are terminal for the file; there is no
//! per-extractor retry.

use contextiq_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::Read;

use crate::normalize;

/// Decode an uploaded plain-text body (also used for md/csv/rtf uploads).
pub fn plain_text(bytes: &[u8]) -> String {
    normalize::normalize_line_endings(&String::from_utf8_lossy(bytes))
}

/// Extract text from a PDF body (in-memory bytes).
///
/// `pdf-extract` walks every page in order and joins page text; corrupt or
/// password-protected documents surface as errors here.
pub fn pdf_to_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        Error::ExtractionFailed(format!(
            "pdf: {e} (the document may be corrupt or password-protected)"
        ))
    })
}

fn docx_failure(detail: impl std::fmt::Display) -> Error {
    Error::ExtractionFailed(format!(
        "docx: {detail} (re-save the document as plain text and retry)"
    ))
}

/// Extract raw text from a `.docx` body.
///
/// A docx file is a ZIP container; the document body lives in
/// `word/document.xml` as `<w:t>` runs grouped into `<w:p>` paragraphs.
/// Paragraph boundaries become newlines, tabs become spaces.
pub fn docx_to_text(bytes: &[u8]) -> Result<String> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(docx_failure)?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(docx_failure)?
        .read_to_string(&mut xml)
        .map_err(docx_failure)?;

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" => out.push('\n'),
                b"tab" => out.push(' '),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if in_text_run {
                    out.push_str(&t.unescape().map_err(docx_failure)?);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(docx_failure(e)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect::<String>();
        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        );

        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let opts = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", opts).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn plain_text_normalizes_line_endings() {
        assert_eq!(plain_text(b"a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn plain_text_decodes_invalid_utf8_lossily() {
        let out = plain_text(b"ok \xff bytes");
        assert!(out.starts_with("ok "));
        assert!(out.ends_with(" bytes"));
    }

    #[test]
    fn docx_extracts_paragraphs_joined_with_newlines() {
        let bytes = minimal_docx(&["First paragraph.", "Second paragraph."]);
        let text = docx_to_text(&bytes).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.\n");
    }

    #[test]
    fn docx_unescapes_xml_entities_in_runs() {
        let bytes = minimal_docx(&["a &amp; b"]);
        assert_eq!(docx_to_text(&bytes).unwrap(), "a & b\n");
    }

    #[test]
    fn docx_rejects_non_zip_bytes_with_guidance() {
        let err = docx_to_text(b"this is not a zip file").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("docx"), "unexpected message: {msg}");
        assert!(msg.contains("plain text"), "unexpected message: {msg}");
    }

    #[test]
    fn docx_rejects_zip_without_document_xml() {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let opts = zip::write::SimpleFileOptions::default();
        zip.start_file("word/other.xml", opts).unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(docx_to_text(&bytes).is_err());
    }

    #[test]
    fn pdf_rejects_garbage_bytes_as_terminal_failure() {
        let err = pdf_to_text(b"%PDF-1.7 truncated garbage").unwrap_err();
        assert!(err.to_string().contains("pdf"));
    }
}
