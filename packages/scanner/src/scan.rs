//! Main scanner service that ties all components together.

use regscan_tree::Tree;

use crate::bitfield::{extract_bitfields, Extraction, ScanSession};
use crate::config::ScanConfig;
use crate::error::Result;
use crate::extract::PageSource;
use crate::toc::TableOfContents;
use crate::types::{RegNode, RegisterEntry};

/// Outcome of a complete scan.
#[derive(Debug)]
pub struct ScanReport {
    /// Device tree with bit-fields grafted under their registers.
    pub tree: Tree<RegNode>,
    /// Registers whose bit-field table could not be found.
    pub exceptions: Vec<String>,
    /// Registers skipped because the configuration excludes them.
    pub skipped: Vec<String>,
    /// Number of registers visited, skipped ones included.
    pub registers: usize,
}

/// Build the table of contents of the manual.
pub fn table_of_contents(config: &ScanConfig, source: &dyn PageSource) -> Result<TableOfContents> {
    let text = source.pages(1, config.end_of_toc)?;
    TableOfContents::build(
        &config.name,
        &text,
        &config.patterns.section,
        &config.patterns.register,
        config.extra_entries.clone(),
    )
}

/// Scan a manual: table of contents first, then each register's bit-fields.
///
/// `on_register` is called before each register is processed.
pub fn scan_manual(
    config: &ScanConfig,
    source: &dyn PageSource,
    mut on_register: impl FnMut(&RegisterEntry),
) -> Result<ScanReport> {
    let mut toc = table_of_contents(config, source)?;
    tracing::info!(
        device = %config.name,
        registers = toc.register_count(),
        "Table of contents read"
    );

    let mut session = ScanSession::new(config.register_width);
    let mut exceptions = Vec::new();
    let mut skipped = Vec::new();
    let mut registers = 0;

    while let Some(id) = toc.next_register() {
        let Some(entry) = toc.register(id).cloned() else {
            continue;
        };
        registers += 1;
        on_register(&entry);

        if config.is_excluded(&entry.name) {
            tracing::debug!(register = %entry.name, "Excluded by configuration");
            skipped.push(entry.name);
            continue;
        }

        let text = source.pages(entry.page, entry.page.saturating_add(config.subsequent_pages))?;
        match extract_bitfields(
            &mut session,
            &entry.name,
            &text,
            &config.patterns.bitfield_header,
            &config.patterns.bitfield_line,
        )? {
            Extraction::Found(fields) => {
                tracing::info!(register = %entry.name, page = entry.page, fields = fields.len(), "Register");
                let tree = toc.tree_mut();
                for field in fields {
                    tree.add_tree(id, field);
                }
            }
            Extraction::NoUsableData => {
                tracing::warn!(register = %entry.name, page = entry.page, "No bit-field table found");
                exceptions.push(entry.name);
            }
        }
    }

    Ok(ScanReport {
        tree: toc.into_tree(),
        exceptions,
        skipped,
        registers,
    })
}

/// Drop registers without bit-fields, then peripherals left without registers.
pub fn prune_empty(tree: &mut Tree<RegNode>) {
    tree.prune(2, 1);
    tree.prune(1, 1);
}
