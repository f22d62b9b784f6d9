//! Configuration loading and pattern compilation.
//!
//! A configuration file maps configuration names (usually one per device or
//! manual) to scan settings:
//!
//! ```yaml
//! MSP430FR5969:
//!   source:
//!     pdf:
//!       path: slau367.pdf
//!       url: https://www.ti.com/lit/ug/slau367p/slau367p.pdf
//!   end_of_toc: 12
//!   subsequent_pages: 1
//!   register_exceptions: [SYSRSTIV]
//!   patterns:
//!     section: ^\d+\.\d+\s+(?P<section>.*Registers)\s*$
//!     register: ...
//!     bitfield_header: ...
//!     bitfield_line: ...
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::{Result, ScanError};
use crate::types::RegisterEntry;

/// Configuration file looked up when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "regscan.yaml";

/// Environment variable overriding the text extraction program.
pub const PDFTOTEXT_ENV: &str = "REGSCAN_PDFTOTEXT";

/// Text extraction program used when nothing else is configured.
pub const DEFAULT_PDFTOTEXT: &str = "pdftotext";

/// Pages scanned after a register's own page.
pub const DEFAULT_SUBSEQUENT_PAGES: u32 = 1;

/// Register width in bits. A row covering the top bit starts a new table.
pub const DEFAULT_REGISTER_WIDTH: u32 = 16;

/// HTTP timeout in seconds. Reference manuals run to tens of megabytes.
pub const HTTP_TIMEOUT_SECS: u64 = 120;

/// Maximum size of a downloaded manual (200 MB).
pub const DEFAULT_MAX_RESPONSE_SIZE: u64 = 200 * 1024 * 1024;

const SECTION_GROUPS: &[&str] = &["section"];
const REGISTER_GROUPS: &[&str] = &["regname", "offset", "pagenum"];
const HEADER_GROUPS: &[&str] = &["regname"];
const ROW_GROUPS: &[&str] = &["fieldname", "hibit"];

/// Where the manual text comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum SourceSettings {
    /// A PDF rendered page by page with `pdftotext -layout`.
    Pdf {
        path: PathBuf,
        /// Download location used when `path` does not exist yet.
        #[serde(default)]
        url: Option<String>,
        /// Extraction program, overriding the environment and default.
        #[serde(default)]
        pdftotext: Option<PathBuf>,
    },
    /// Already extracted text, pages separated by form feeds.
    Text { path: PathBuf },
}

impl SourceSettings {
    fn resolve(self, base_dir: &Path) -> Self {
        match self {
            Self::Pdf {
                path,
                url,
                pdftotext,
            } => Self::Pdf {
                path: base_dir.join(path),
                url,
                pdftotext,
            },
            Self::Text { path } => Self::Text {
                path: base_dir.join(path),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatternSettings {
    section: String,
    register: String,
    bitfield_header: String,
    bitfield_line: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    source: SourceSettings,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default = "default_subsequent_pages")]
    subsequent_pages: u32,
    end_of_toc: u32,
    #[serde(default)]
    register_exceptions: Vec<String>,
    #[serde(default)]
    extra_entries: BTreeMap<String, Vec<RegisterEntry>>,
    #[serde(default = "default_register_width")]
    register_width: u32,
    #[serde(default = "default_verbose")]
    verbose_patterns: bool,
    patterns: PatternSettings,
}

fn default_subsequent_pages() -> u32 {
    DEFAULT_SUBSEQUENT_PAGES
}

fn default_register_width() -> u32 {
    DEFAULT_REGISTER_WIDTH
}

fn default_verbose() -> bool {
    true
}

/// Compiled line patterns.
#[derive(Debug, Clone)]
pub struct Patterns {
    /// Peripheral heading in the table of contents.
    pub section: Regex,
    /// Register row in the table of contents.
    pub register: Regex,
    /// Bit-field table header.
    pub bitfield_header: Regex,
    /// Bit-field table row.
    pub bitfield_line: Regex,
}

/// A fully loaded and validated configuration.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Configuration name, also used as the device name.
    pub name: String,
    pub source: SourceSettings,
    pub output_dir: PathBuf,
    pub subsequent_pages: u32,
    /// Last page of the table of contents.
    pub end_of_toc: u32,
    pub register_exceptions: Vec<String>,
    /// Registers missing from the table of contents, per peripheral name.
    pub extra_entries: BTreeMap<String, Vec<RegisterEntry>>,
    pub register_width: u32,
    pub patterns: Patterns,
}

impl ScanConfig {
    /// Load configuration `name` from the file at `path`.
    ///
    /// Without a name the file must hold exactly one configuration.
    pub fn load(path: &Path, name: Option<&str>) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ScanError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or(Path::new(""));
        Self::parse(&text, path, base_dir, name)
    }

    /// Parse configuration text; relative paths resolve against `base_dir`.
    pub fn from_yaml(text: &str, base_dir: &Path, name: Option<&str>) -> Result<Self> {
        Self::parse(text, Path::new("<inline>"), base_dir, name)
    }

    fn parse(text: &str, origin: &Path, base_dir: &Path, name: Option<&str>) -> Result<Self> {
        let mut all: BTreeMap<String, RawSettings> =
            serde_yaml_ng::from_str(text).map_err(|source| ScanError::ConfigParse {
                path: origin.to_path_buf(),
                source,
            })?;

        let name = match name {
            Some(n) => n.to_string(),
            None if all.len() == 1 => all.keys().next().cloned().unwrap_or_default(),
            None if all.is_empty() => {
                return Err(ScanError::Config("no configurations defined".to_string()))
            }
            None => {
                return Err(ScanError::Config(format!(
                    "several configurations defined, choose one of: {}",
                    all.keys().cloned().collect::<Vec<_>>().join(", ")
                )))
            }
        };

        let Some(raw) = all.remove(&name) else {
            let available: Vec<String> = all.into_keys().collect();
            return Err(ScanError::UnknownConfiguration { name, available });
        };

        tracing::debug!(configuration = %name, "Loaded configuration");
        Self::from_raw(name, raw, base_dir)
    }

    fn from_raw(name: String, raw: RawSettings, base_dir: &Path) -> Result<Self> {
        if raw.end_of_toc == 0 {
            return Err(ScanError::Config("end_of_toc must be at least 1".to_string()));
        }
        if raw.register_width == 0 || raw.register_width > 64 {
            return Err(ScanError::Config(format!(
                "register_width must be between 1 and 64, got {}",
                raw.register_width
            )));
        }

        let verbose = raw.verbose_patterns;
        let p = raw.patterns;
        let patterns = Patterns {
            section: compile_pattern("section", &p.section, verbose, SECTION_GROUPS)?,
            register: compile_pattern("register", &p.register, verbose, REGISTER_GROUPS)?,
            bitfield_header: compile_pattern(
                "bitfield_header",
                &p.bitfield_header,
                verbose,
                HEADER_GROUPS,
            )?,
            bitfield_line: compile_pattern("bitfield_line", &p.bitfield_line, verbose, ROW_GROUPS)?,
        };

        let output_dir = match raw.output_dir {
            Some(dir) => base_dir.join(dir),
            None => base_dir.to_path_buf(),
        };

        Ok(Self {
            name,
            source: raw.source.resolve(base_dir),
            output_dir,
            subsequent_pages: raw.subsequent_pages,
            end_of_toc: raw.end_of_toc,
            register_exceptions: raw.register_exceptions,
            extra_entries: raw.extra_entries,
            register_width: raw.register_width,
            patterns,
        })
    }

    /// Whether `register` is configured to be skipped.
    #[must_use]
    pub fn is_excluded(&self, register: &str) -> bool {
        self.register_exceptions.iter().any(|r| r == register)
    }
}

/// Compile a configured pattern and check that it defines `required` groups.
///
/// In verbose mode whitespace in the pattern is insignificant (also inside
/// character classes) and `#` starts a comment.
///
/// # Examples
/// ```
/// use regscan_scanner::config::compile_pattern;
///
/// let re = compile_pattern("section", r"^\d+ \. \s+ (?P<section>.*)", true, &["section"]).unwrap();
/// assert!(re.is_match("4. Timer Registers"));
/// assert!(compile_pattern("section", r"^(?P<title>.*)", false, &["section"]).is_err());
/// ```
pub fn compile_pattern(
    name: &'static str,
    source: &str,
    verbose: bool,
    required: &[&'static str],
) -> Result<Regex> {
    let re = RegexBuilder::new(source.trim())
        .ignore_whitespace(verbose)
        .build()
        .map_err(|source| ScanError::InvalidPattern {
            pattern: name,
            source,
        })?;

    for &group in required {
        if !re.capture_names().flatten().any(|n| n == group) {
            return Err(ScanError::MissingCaptureGroup {
                pattern: name,
                group,
            });
        }
    }
    Ok(re)
}
