//! Core data types for the scanner.
//!
//! A scan produces a tree of [`RegNode`] values: one device at the root,
//! peripherals below it, registers below those and bit-fields as leaves.

use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer};

use crate::error::{Result, ScanError};

/// Mnemonic in parentheses inside a section heading, e.g. `(ADC)`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PERIPHERAL_MNEMONIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((?P<name>\w+)\)").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SLUG_NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Text of a named group that the pattern is required to capture.
pub(crate) fn required<'h>(
    caps: &Captures<'h>,
    pattern: &'static str,
    group: &'static str,
) -> Result<&'h str> {
    caps.name(group)
        .map(|m| m.as_str())
        .ok_or_else(|| ScanError::MissingCapture {
            pattern,
            group,
            line: caps
                .get(0)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
}

/// Text of an optional named group, `None` when absent or empty.
pub(crate) fn optional<'h>(caps: &Captures<'h>, group: &str) -> Option<&'h str> {
    caps.name(group)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Parse a hexadecimal number with an optional `0x`/`0X` prefix.
///
/// # Examples
/// ```
/// use regscan_scanner::types::parse_hex;
///
/// assert_eq!(parse_hex("offset", "0x10").unwrap(), 16);
/// assert_eq!(parse_hex("offset", "FF").unwrap(), 255);
/// assert!(parse_hex("offset", "0xZZ").is_err());
/// ```
pub fn parse_hex(field: &'static str, value: &str) -> Result<u64> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16).map_err(|_| ScanError::InvalidNumber {
        field,
        value: value.to_string(),
        radix: "hexadecimal",
    })
}

/// Parse a decimal number.
pub fn parse_dec(field: &'static str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| ScanError::InvalidNumber {
            field,
            value: value.to_string(),
            radix: "decimal",
        })
}

/// The device described by a manual; root of every scan tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// File-name friendly form of the device name.
    ///
    /// # Examples
    /// ```
    /// use regscan_scanner::types::Device;
    ///
    /// assert_eq!(Device::new("MSP430 FR5xx").to_slug(), "msp430_fr5xx");
    /// ```
    #[must_use]
    pub fn to_slug(&self) -> String {
        let text = self.name.to_lowercase();
        let text = SLUG_NON_WORD.replace_all(&text, "_");
        let slug = text.trim_matches('_');
        if slug.is_empty() {
            "device".to_string()
        } else {
            slug.to_string()
        }
    }
}

/// A peripheral section of the register map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peripheral {
    pub name: String,
}

impl Peripheral {
    /// Derive the peripheral name from a section heading.
    ///
    /// The first parenthesized mnemonic wins; without one the heading is
    /// used with all whitespace removed.
    ///
    /// # Examples
    /// ```
    /// use regscan_scanner::types::Peripheral;
    ///
    /// assert_eq!(Peripheral::from_heading("FOO (ABC) Registers").name, "ABC");
    /// assert_eq!(Peripheral::from_heading("Port Registers").name, "PortRegisters");
    /// ```
    #[must_use]
    pub fn from_heading(section: &str) -> Self {
        let name = match PERIPHERAL_MNEMONIC.captures(section) {
            Some(caps) => caps["name"].to_string(),
            None => section.split_whitespace().collect(),
        };
        Self { name }
    }

    pub(crate) fn from_captures(caps: &Captures<'_>) -> Result<Self> {
        Ok(Self::from_heading(required(caps, "section", "section")?))
    }
}

/// A register listed in the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterEntry {
    pub name: String,
    /// Byte offset from the peripheral base.
    #[serde(deserialize_with = "hex_or_int")]
    pub offset: u64,
    #[serde(default, deserialize_with = "hex_or_int")]
    pub reset: u64,
    /// Page of the manual holding the bit-field table.
    pub page: u32,
}

impl RegisterEntry {
    pub(crate) fn from_captures(caps: &Captures<'_>) -> Result<Self> {
        let name = required(caps, "register", "regname")?.to_string();
        let offset = parse_hex("offset", required(caps, "register", "offset")?)?;
        let reset = optional(caps, "reset")
            .map(|r| parse_hex("reset", r))
            .transpose()?
            .unwrap_or(0);
        let page = parse_dec("pagenum", required(caps, "register", "pagenum")?)?;
        Ok(Self {
            name,
            offset,
            reset,
            page,
        })
    }
}

/// Accepts `0x10`, `"0x10"` or `16` for manually configured numbers.
fn hex_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => parse_hex("value", &s).map_err(serde::de::Error::custom),
    }
}

/// Inclusive bit range, `hi` never below `lo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRange {
    pub hi: u32,
    pub lo: u32,
}

impl BitRange {
    /// Build a range, swapping the bounds when given low-first.
    #[must_use]
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            hi: a.max(b),
            lo: a.min(b),
        }
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hi, self.lo)
    }
}

/// A bit-field of a register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfieldEntry {
    pub name: String,
    /// Bits as laid out in the register.
    pub bits: BitRange,
    /// Bits as seen by software, equal to `bits` unless documented otherwise.
    pub logical_bits: BitRange,
    pub reset: u64,
}

/// Value stored in every node of a scan tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegNode {
    Device(Device),
    Peripheral(Peripheral),
    Register(RegisterEntry),
    Bitfield(BitfieldEntry),
}

impl RegNode {
    /// Name of the wrapped item.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Device(d) => &d.name,
            Self::Peripheral(p) => &p.name,
            Self::Register(r) => &r.name,
            Self::Bitfield(b) => &b.name,
        }
    }

    #[must_use]
    pub fn as_register(&self) -> Option<&RegisterEntry> {
        match self {
            Self::Register(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for RegNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(r) => write!(f, "Reg {} p{}", r.name, r.page),
            other => f.write_str(other.name()),
        }
    }
}
