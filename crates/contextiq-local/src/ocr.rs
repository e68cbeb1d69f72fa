//! Image OCR via an opportunistic shellout to the local `tesseract` binary.
//!
//! Goals:
//! - **Bounded**: a coarse timeout plus an output cap, so a wedged binary can
//!   never hang or flood an acquisition.
//! - **Scoped temp files**: the input image lives in a RAII temp file that is
//!   removed on success and failure alike.
//! - **No secrets**: nothing from the environment is logged.

use contextiq_core::{Error, Result, MIN_OCR_TEXT_CHARS};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Coarse progress observer for OCR (0–100). Progress is advisory only and
/// never changes the success/failure contract.
pub type Progress = Arc<dyn Fn(u8) + Send + Sync>;

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn normalize_mode(s: Option<String>) -> String {
    match s.as_deref() {
        Some("off") => "off".to_string(),
        // Unknown values behave like the default.
        _ => "auto".to_string(),
    }
}

pub fn ocr_mode_from_env() -> String {
    normalize_mode(env("CONTEXTIQ_OCR"))
}

pub fn timeout_from_env_ms(key: &str, default_ms: u64) -> Duration {
    let ms = env(key)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default_ms)
        .clamp(50, 300_000);
    Duration::from_millis(ms)
}

pub fn max_chars_from_env(key: &str, default_chars: usize) -> usize {
    env(key)
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default_chars)
        .clamp(200, 2_000_000)
}

pub fn which(bin: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let cand = dir.join(bin);
        if cand.is_file() {
            return Some(cand);
        }
    }
    None
}

pub fn has(bin: &str) -> bool {
    which(bin).is_some()
}

/// Run a command and capture stdout (bounded) with a coarse timeout.
fn run_stdout_bounded(
    mut cmd: Command,
    timeout: Duration,
    max_stdout_bytes: usize,
) -> std::result::Result<Vec<u8>, String> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            "tool not found".to_string()
        } else {
            format!("spawn failed: {e}")
        }
    })?;

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return Err(format!("nonzero exit: {status}"));
                }
                break;
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    return Err("timed out".to_string());
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(e) => return Err(format!("wait failed: {e}")),
        }
    }

    let mut out = Vec::new();
    if let Some(s) = child.stdout.take() {
        use std::io::Read;
        s.take(max_stdout_bytes as u64)
            .read_to_end(&mut out)
            .map_err(|e| format!("read failed: {e}"))?;
    }
    Ok(out)
}

fn write_temp_file(bytes: &[u8], suffix: &str) -> Result<tempfile::NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .prefix("contextiq-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| Error::ExtractionFailed(format!("ocr temp file: {e}")))?;
    use std::io::Write;
    tmp.write_all(bytes)
        .map_err(|e| Error::ExtractionFailed(format!("ocr temp file write: {e}")))?;
    Ok(tmp)
}

pub fn suffix_for_extension(ext: &str) -> &'static str {
    match ext.trim().to_ascii_lowercase().as_str() {
        "png" => ".png",
        "jpg" | "jpeg" => ".jpg",
        "gif" => ".gif",
        "bmp" => ".bmp",
        "webp" => ".webp",
        _ => ".img",
    }
}

fn report(progress: &Option<Progress>, pct: u8) {
    if let Some(cb) = progress {
        cb(pct);
    }
}

/// Run English OCR against image bytes.
///
/// The only extractor with a progress signal: coarse stages are reported
/// through `progress` while the work runs. Output below
/// [`MIN_OCR_TEXT_CHARS`] characters counts as "no readable text".
pub fn image_to_text(bytes: &[u8], ext: &str, progress: Option<Progress>) -> Result<String> {
    if ocr_mode_from_env() == "off" {
        return Err(Error::ExtractionFailed(
            "ocr is disabled (CONTEXTIQ_OCR=off)".to_string(),
        ));
    }
    if !has("tesseract") {
        return Err(Error::ExtractionFailed(
            "tesseract not found (install tesseract-ocr)".to_string(),
        ));
    }
    report(&progress, 0);

    let timeout = timeout_from_env_ms("CONTEXTIQ_OCR_TIMEOUT_MS", 30_000);
    let max_chars = max_chars_from_env("CONTEXTIQ_OCR_MAX_CHARS", 50_000);
    let max_stdout_bytes = max_chars.saturating_mul(4).clamp(1_000, 4_000_000);

    let tmp = write_temp_file(bytes, suffix_for_extension(ext))?;
    let in_path = tmp.path().to_string_lossy().to_string();
    report(&progress, 25);

    let mut cmd = Command::new("tesseract");
    cmd.arg(&in_path).arg("stdout").args(["-l", "eng"]);
    let out = run_stdout_bounded(cmd, timeout, max_stdout_bytes)
        .map_err(|reason| Error::ExtractionFailed(format!("ocr: tesseract {reason}")))?;
    report(&progress, 90);

    let text: String = String::from_utf8_lossy(&out)
        .chars()
        .take(max_chars)
        .collect();
    if text.trim().chars().count() < MIN_OCR_TEXT_CHARS {
        return Err(Error::ExtractionFailed(
            "no readable text found in image".to_string(),
        ));
    }
    report(&progress, 100);
    Ok(text)
}
