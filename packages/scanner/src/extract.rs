//! Page text sources.
//!
//! The scanner never reads a PDF itself. It asks a [`PageSource`] for the
//! layout-preserving text of a page range; [`PdfToText`] shells out to
//! `pdftotext`, [`TextPages`] serves text that was extracted beforehand.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use unicode_normalization::UnicodeNormalization;

use crate::config::{ScanConfig, SourceSettings, DEFAULT_PDFTOTEXT, PDFTOTEXT_ENV};
use crate::error::{Result, ScanError};
use crate::http::ensure_document;

/// Page separator in extracted text.
pub const PAGE_BREAK: char = '\x0c';

/// Provides the text of inclusive, 1-based page ranges.
pub trait PageSource {
    /// Text of pages `start..=end`, pages separated by form feeds.
    fn pages(&self, start: u32, end: u32) -> Result<String>;
}

/// Apply compatibility normalization (NFKC) so ligatures and other
/// presentation forms match plain-ASCII patterns.
///
/// # Examples
/// ```
/// use regscan_scanner::extract::normalize;
///
/// assert_eq!(normalize("\u{FB01}eld"), "field");
/// ```
#[must_use]
pub fn normalize(text: &str) -> String {
    text.nfkc().collect()
}

/// Runs `pdftotext -layout` on a PDF for every requested range.
#[derive(Debug, Clone)]
pub struct PdfToText {
    program: PathBuf,
    pdf: PathBuf,
}

impl PdfToText {
    /// Use `program` if given, else `$REGSCAN_PDFTOTEXT`, else `pdftotext`.
    pub fn new(pdf: impl Into<PathBuf>, program: Option<PathBuf>) -> Self {
        let program = program
            .or_else(|| env::var_os(PDFTOTEXT_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PDFTOTEXT));
        Self {
            program,
            pdf: pdf.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn args(&self, start: u32, end: u32) -> Vec<OsString> {
        vec![
            "-layout".into(),
            "-enc".into(),
            "UTF-8".into(),
            self.pdf.clone().into_os_string(),
            "-".into(),
            "-f".into(),
            start.to_string().into(),
            "-l".into(),
            end.to_string().into(),
        ]
    }
}

impl PageSource for PdfToText {
    fn pages(&self, start: u32, end: u32) -> Result<String> {
        tracing::debug!(start, end, program = %self.program.display(), "Extracting pages");
        let output = Command::new(&self.program)
            .args(self.args(start, end))
            .output()
            .map_err(|e| ScanError::TextExtraction {
                start,
                end,
                message: format!("cannot run {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            return Err(ScanError::TextExtraction {
                start,
                end,
                message: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(normalize(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Pre-extracted text held in memory, split into pages on form feeds.
#[derive(Debug, Clone, Default)]
pub struct TextPages {
    pages: Vec<String>,
}

impl TextPages {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let text = normalize(text);
        let body = text.strip_suffix(PAGE_BREAK).unwrap_or(&text);
        let pages = if body.is_empty() {
            Vec::new()
        } else {
            body.split(PAGE_BREAK).map(str::to_string).collect()
        };
        Self { pages }
    }

    /// Read a text file produced by e.g. `pdftotext -layout`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::new(&text))
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

impl PageSource for TextPages {
    /// Page 0 is treated as page 1 and ranges past the last page are cut
    /// short, the same way `pdftotext` treats them.
    fn pages(&self, start: u32, end: u32) -> Result<String> {
        let first = start.max(1) as usize;
        let last = (end as usize).min(self.pages.len());
        if first > last {
            return Ok(String::new());
        }

        let mut text = String::new();
        for page in &self.pages[first - 1..last] {
            text.push_str(page);
            text.push(PAGE_BREAK);
        }
        Ok(text)
    }
}

/// Open the page source described by a configuration.
///
/// A PDF that is missing locally is downloaded first when a URL is set.
pub fn open_source(config: &ScanConfig) -> Result<Box<dyn PageSource>> {
    match &config.source {
        SourceSettings::Pdf {
            path,
            url,
            pdftotext,
        } => {
            ensure_document(path, url.as_deref())?;
            Ok(Box::new(PdfToText::new(path.clone(), pdftotext.clone())))
        }
        SourceSettings::Text { path } => Ok(Box::new(TextPages::load(path)?)),
    }
}
