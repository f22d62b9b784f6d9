//! Filtering sub-scanner.
//!
//! Runs a [`TreeBuilder`] with a synthetic level 0 in front of the caller's
//! row levels. Every level-0 match (a table header) is screened by a
//! predicate that sees the running number of accepted headers; rows only
//! produce nodes once at least one header has been accepted.
//!
//! A scan goes through three explicit phases: [`FilterScan::begin`],
//! [`FilterScan::run`] and the consuming [`FilterScan::finish`], which turns
//! "nothing was accepted" into [`FilterOutcome::NoUsableData`] instead of an
//! empty success.

use std::fmt;

use regex::{Captures, Regex};

use crate::builder::{Flow, Level, Step, TreeBuilder};
use crate::tree::Tree;

/// Decision taken for a header match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A different table starts; end the scan if something was accepted.
    Stop,
    /// The wanted table; count it and keep scanning.
    Accept,
    /// Neither; keep scanning without counting.
    Ignore,
}

/// Context threaded through a filtered scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Number of accepted headers so far.
    pub accepted: usize,
}

/// Row factory: turns a row match into an optional node value.
pub type RowFactory<'a, V, E> =
    dyn FnMut(&Captures<'_>) -> std::result::Result<Option<V>, E> + 'a;

/// A row pattern and its factory.
pub struct RowLevel<'a, V, E> {
    pattern: Regex,
    factory: Box<RowFactory<'a, V, E>>,
}

impl<'a, V, E> RowLevel<'a, V, E> {
    pub fn new(
        pattern: Regex,
        factory: impl FnMut(&Captures<'_>) -> std::result::Result<Option<V>, E> + 'a,
    ) -> Self {
        Self {
            pattern,
            factory: Box::new(factory),
        }
    }
}

impl<V, E> fmt::Debug for RowLevel<'_, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowLevel")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Result of a finished scan.
#[derive(Debug)]
pub enum FilterOutcome<V> {
    /// At least one node was accepted. Each entry is one top-level node
    /// with its subtree, in document order.
    Accepted {
        nodes: Vec<Tree<V>>,
        stopped_early: bool,
    },
    /// No node was ever accepted under the synthetic level.
    NoUsableData,
}

impl<V> FilterOutcome<V> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoUsableData)
    }
}

/// An in-progress filtered scan.
pub struct FilterScan<'a, V, E> {
    builder: TreeBuilder<'a, Tally, V, E>,
    stopped_early: bool,
}

impl<'a, V: fmt::Display + 'a, E: 'a> FilterScan<'a, V, E> {
    /// Begin a scan with `header` as level 0 and `rows` as the deeper levels.
    pub fn begin(
        header: Regex,
        mut predicate: impl FnMut(&Captures<'_>, usize) -> Verdict + 'a,
        rows: Vec<RowLevel<'a, V, E>>,
    ) -> Self {
        let mut levels: Vec<Level<'a, Tally, V, E>> = Vec::with_capacity(rows.len() + 1);

        levels.push(Level::new(header, move |ctx: Option<Tally>, caps| {
            let mut tally = ctx.unwrap_or_default();
            match predicate(caps, tally.accepted) {
                Verdict::Stop if tally.accepted > 0 => {
                    tracing::debug!(accepted = tally.accepted, "Different table header, stopping");
                    return Ok(Step::Stop {
                        context: Some(tally),
                    });
                }
                Verdict::Stop | Verdict::Ignore => {}
                Verdict::Accept => tally.accepted += 1,
            }
            Ok(Step::carry(tally, None))
        }));

        for row in rows {
            let RowLevel {
                pattern,
                mut factory,
            } = row;
            levels.push(Level::new(pattern, move |ctx: Option<Tally>, caps| {
                let tally = ctx.unwrap_or_default();
                if tally.accepted < 1 {
                    return Ok(Step::carry(tally, None));
                }
                let value = factory(caps)?;
                Ok(Step::carry(tally, value))
            }));
        }

        Self {
            builder: TreeBuilder::new(Tree::placeholder(), levels),
            stopped_early: false,
        }
    }

    /// Feed `text` until it runs out or a stop verdict ends the scan.
    ///
    /// # Errors
    /// Returns the first row factory error; the scan is unusable afterwards.
    pub fn run(&mut self, text: &str) -> std::result::Result<(), E> {
        if self.stopped_early {
            return Ok(());
        }
        if self.builder.build(text)? == Flow::Stop {
            self.stopped_early = true;
        }
        Ok(())
    }

    /// Number of accepted headers so far.
    #[must_use]
    pub fn accepted(&self) -> usize {
        self.builder.context().map_or(0, |t| t.accepted)
    }

    /// Finish the scan and hand out the accepted nodes.
    #[must_use]
    pub fn finish(self) -> FilterOutcome<V> {
        let stopped_early = self.stopped_early;
        let tree = self.builder.into_tree();
        if tree.children(tree.root()).next().is_none() {
            return FilterOutcome::NoUsableData;
        }
        FilterOutcome::Accepted {
            nodes: tree.into_children(),
            stopped_early,
        }
    }
}

/// Run a complete filtered scan over `text`.
///
/// # Errors
/// Returns the first row factory error.
pub fn filter_scan<'a, V: fmt::Display + 'a, E: 'a>(
    text: &str,
    header: Regex,
    predicate: impl FnMut(&Captures<'_>, usize) -> Verdict + 'a,
    rows: Vec<RowLevel<'a, V, E>>,
) -> std::result::Result<FilterOutcome<V>, E> {
    let mut scan = FilterScan::begin(header, predicate, rows);
    scan.run(text)?;
    Ok(scan.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows() -> Vec<RowLevel<'static, String, String>> {
        vec![RowLevel::new(
            Regex::new(r"^\s+(?P<field>\w+)$").unwrap(),
            |caps| Ok(Some(caps["field"].to_string())),
        )]
    }

    fn want(name: &'static str) -> impl FnMut(&Captures<'_>, usize) -> Verdict {
        move |caps, accepted| {
            if &caps["name"] == name {
                Verdict::Accept
            } else if accepted > 0 {
                Verdict::Stop
            } else {
                Verdict::Ignore
            }
        }
    }

    fn header() -> Regex {
        Regex::new(r"^TABLE (?P<name>\w+)").unwrap()
    }

    fn values(outcome: FilterOutcome<String>) -> (Vec<String>, bool) {
        match outcome {
            FilterOutcome::Accepted {
                nodes,
                stopped_early,
            } => (
                nodes.iter().flat_map(|t| t.values().cloned()).collect(),
                stopped_early,
            ),
            FilterOutcome::NoUsableData => panic!("expected accepted nodes"),
        }
    }

    #[test]
    fn test_rows_before_acceptance_are_dropped() {
        let text = "TABLE OTHER\n  skipped\nTABLE WANTED\n  kept\n  also\n";
        let outcome = filter_scan(text, header(), want("WANTED"), rows()).unwrap();

        assert_eq!(
            values(outcome),
            (vec!["kept".to_string(), "also".to_string()], false)
        );
    }

    #[test]
    fn test_second_foreign_header_stops_scan() {
        let text = "TABLE WANTED\n  a\nTABLE NEXT\n  b\nTABLE WANTED\n  c\n";
        let outcome = filter_scan(text, header(), want("WANTED"), rows()).unwrap();

        assert_eq!(values(outcome), (vec!["a".to_string()], true));
    }

    #[test]
    fn test_no_accepted_header_is_no_usable_data() {
        let text = "TABLE OTHER\n  a\n  b\n";
        let outcome = filter_scan(text, header(), want("WANTED"), rows()).unwrap();
        assert!(outcome.is_empty());

        let outcome = filter_scan("no tables here\n", header(), want("WANTED"), rows()).unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_accepted_header_without_rows_is_no_usable_data() {
        let outcome = filter_scan("TABLE WANTED\n", header(), want("WANTED"), rows()).unwrap();
        assert!(outcome.is_empty());
    }

    #[test]
    fn test_stop_before_any_acceptance_is_ignored() {
        let always_stop = |_: &Captures<'_>, _| Verdict::Stop;
        let mut scan = FilterScan::begin(header(), always_stop, rows());
        scan.run("TABLE A\n  a\nTABLE B\n").unwrap();

        assert_eq!(scan.accepted(), 0);
        assert!(scan.finish().is_empty());
    }

    #[test]
    fn test_row_error_propagates() {
        let failing = vec![RowLevel::new(Regex::new(r"^\s+bad").unwrap(), |_| {
            Err::<Option<String>, _>("malformed row".to_string())
        })];
        let result = filter_scan("TABLE WANTED\n  bad\n", header(), want("WANTED"), failing);
        assert_eq!(result.err(), Some("malformed row".to_string()));
    }
}
