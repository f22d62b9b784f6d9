//! regscan - Extract register and bit-field definitions from reference manuals.
//!
//! This crate reads the text of a hardware reference manual, page by page,
//! and recovers its register map: peripherals from the table of contents,
//! their registers with offsets and reset values, and the bit-field layout
//! of every register from the tables on its detail pages.
//!
//! # Example
//!
//! ```
//! use regex::Regex;
//! use regscan_scanner::bitfield::{extract_bitfields, Extraction, ScanSession};
//!
//! let header = Regex::new(r"^(?P<regname>\w+) Register").unwrap();
//! let row = Regex::new(r"^(?P<hibit>\d+)\s+(?P<lobit>\d+)\s+(?P<fieldname>\w+)").unwrap();
//! let text = "ABC_CTRL Register\n15 14 MODE\n13 0 VALUE\n";
//!
//! let mut session = ScanSession::new(16);
//! let found = extract_bitfields(&mut session, "ABC_CTRL", text, &header, &row).unwrap();
//! assert!(matches!(found, Extraction::Found(fields) if fields.len() == 2));
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Configuration file loading and pattern compilation
//! - [`types`]: Node types (Device, Peripheral, RegisterEntry, BitfieldEntry)
//! - [`error`]: Error types and Result alias
//! - [`extract`]: Page text sources (`pdftotext`, pre-extracted text)
//! - [`http`]: Manual download
//! - [`toc`]: Table-of-contents extraction
//! - [`bitfield`]: Bit-field table extraction
//! - [`scan`]: Main scanner service
//! - [`visit`]: Typed tree traversal
//! - [`yaml`]: YAML output generation
//! - [`cli`]: Command-line interface

pub mod bitfield;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod http;
pub mod scan;
pub mod toc;
pub mod types;
pub mod visit;
pub mod yaml;

pub use scan::{prune_empty, scan_manual, table_of_contents, ScanReport};

pub use config::ScanConfig;
pub use error::{Result, ScanError};
pub use types::{BitRange, BitfieldEntry, Device, Peripheral, RegNode, RegisterEntry};
