//! HTTP client wrapper for downloading reference manuals.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::{DEFAULT_MAX_RESPONSE_SIZE, HTTP_TIMEOUT_SECS};
use crate::error::{Result, ScanError};

/// User agent string identifying this scanner.
const USER_AGENT: &str = concat!("regscan/", env!("CARGO_PKG_VERSION"));

/// Attempts made before a transient failure is reported.
const MAX_RETRIES: u32 = 3;

/// Wait before the second attempt; doubled for each later one.
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Create a configured HTTP client.
pub fn create_client() -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Result of one request.
enum Attempt {
    Done(Vec<u8>),
    Transient(String),
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS << attempt.saturating_sub(1).min(16))
}

fn check_size(size: u64, limit: u64) -> Result<()> {
    if size > limit {
        return Err(ScanError::ResponseTooLarge { size, limit });
    }
    Ok(())
}

fn fetch_once(client: &Client, url: &str, max_size: u64) -> Result<Attempt> {
    let response = match client.get(url).send() {
        Ok(response) => response,
        Err(e) if e.is_connect() || e.is_timeout() => {
            return Ok(Attempt::Transient(e.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let status = response.status();
    if status.is_server_error() {
        return Ok(Attempt::Transient(format!("Server error: {status}")));
    }
    let response = response.error_for_status()?;
    if let Some(size) = response.content_length() {
        check_size(size, max_size)?;
    }
    let body = response.bytes()?;
    check_size(body.len() as u64, max_size)?;
    Ok(Attempt::Done(body.to_vec()))
}

/// Fetch `url`, refusing bodies larger than `max_size` bytes.
///
/// Connection failures, timeouts and 5xx answers are retried with a
/// doubling delay; anything else fails at once.
pub fn download_bytes(client: &Client, url: &str, max_size: u64) -> Result<Vec<u8>> {
    let mut last_error = String::from("no attempt made");

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay = backoff(attempt);
            tracing::debug!(url, attempt, delay_ms = delay.as_millis() as u64, "Waiting before retry");
            thread::sleep(delay);
        }
        match fetch_once(client, url, max_size)? {
            Attempt::Done(body) => return Ok(body),
            Attempt::Transient(message) => {
                tracing::warn!(url, attempt = attempt + 1, %message, "Download failed");
                last_error = message;
            }
        }
    }

    Err(ScanError::RetriesExhausted {
        attempts: MAX_RETRIES,
        message: last_error,
    })
}

/// Make sure the document at `path` exists, downloading it from `url` if not.
///
/// The body is written to a temporary file next to `path` and renamed into
/// place once complete.
pub fn ensure_document(path: &Path, url: Option<&str>) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let Some(url) = url else {
        return Err(ScanError::Config(format!(
            "{} does not exist and no download url is configured",
            path.display()
        )));
    };

    tracing::info!(url, path = %path.display(), "Downloading manual");
    let client = create_client()?;
    let bytes = download_bytes(&client, url, DEFAULT_MAX_RESPONSE_SIZE)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manual".to_string());
    let temp_file = path.with_file_name(format!(".{file_name}.part"));
    {
        let mut file = File::create(&temp_file)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&temp_file, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client() {
        let client = create_client();
        assert!(client.is_ok());
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_millis(500));
        assert_eq!(backoff(2), Duration::from_millis(1000));
        assert_eq!(backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_size_limit() {
        assert!(check_size(10, 10).is_ok());
        assert!(matches!(
            check_size(11, 10),
            Err(ScanError::ResponseTooLarge { size: 11, limit: 10 })
        ));
    }

    #[test]
    fn test_existing_document_is_not_downloaded() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ensure_document(file.path(), Some("http://invalid.invalid/manual.pdf")).is_ok());
    }

    #[test]
    fn test_missing_document_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_document(&dir.path().join("manual.pdf"), None).unwrap_err();
        assert!(matches!(err, ScanError::Config(_)));
        assert!(err.to_string().contains("no download url"));
    }
}
