//! Pattern-driven tree building over line-oriented text.
//!
//! This crate turns loosely formatted text (such as pages extracted from a
//! PDF with their layout preserved) into a hierarchy by matching each line
//! against a small set of patterns ordered by nesting depth.
//!
//! # Example
//!
//! ```
//! use regex::Regex;
//! use regscan_tree::{Level, Step, Tree, TreeBuilder};
//!
//! let heading = Level::new(Regex::new(r"^# (?P<t>.+)").unwrap(), |_, caps| {
//!     Ok::<_, String>(Step::node(caps["t"].to_string()))
//! });
//! let item = Level::new(Regex::new(r"^- (?P<t>.+)").unwrap(), |_, caps| {
//!     Ok::<_, String>(Step::node(caps["t"].to_string()))
//! });
//!
//! let mut builder: TreeBuilder<'_, (), String, String> =
//!     TreeBuilder::new(Tree::new("doc".to_string()), vec![heading, item]);
//! builder.build("# One\n- a\n- b\n# Two\n- c\n").unwrap();
//!
//! assert_eq!(builder.tree().len(), 6);
//! ```
//!
//! # Architecture
//!
//! - [`tree`]: arena-backed ordered tree with parent links
//! - [`builder`]: the level-indexed builder and its [`Step`] protocol
//! - [`filter`]: a builder run behind a screened header level

pub mod builder;
pub mod filter;
pub mod tree;

pub use builder::{split_lines, Factory, Flow, Level, Step, TreeBuilder};
pub use filter::{filter_scan, FilterOutcome, FilterScan, RowFactory, RowLevel, Tally, Verdict};
pub use tree::{Iter, Nested, NodeId, Tree, PLACEHOLDER_KEY};
