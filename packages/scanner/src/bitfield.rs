//! Bit-field table extraction.
//!
//! The detail pages of a register usually show several tables. Each table
//! starts with a header naming its register; the header pattern is screened
//! so only the wanted register's table is read, and reading stops at the
//! next foreign header.
//!
//! Tables also end implicitly: once a row reaching bit 0 has been read the
//! register is fully described and further rows are ignored, until a row
//! covering the register's top bit starts a new table.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use regscan_tree::{filter_scan, FilterOutcome, RowLevel, Tree, Verdict};

use crate::error::{Result, ScanError};
use crate::types::{optional, parse_dec, parse_hex, required, BitRange, BitfieldEntry, RegNode};

/// Word marking padding fields in a table.
const RESERVED_MARKER: &str = "Reserved";

/// Start of every word in a descriptive register name.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static WORD_INITIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]").expect("valid regex"));

/// Abbreviation written right before the word "Register".
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static NAME_BEFORE_REGISTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][A-Z0-9_]+) Register").expect("valid regex"));

/// State that outlives a single register: the reserved-field counter.
#[derive(Debug, Clone)]
pub struct ScanSession {
    reserved: usize,
    register_width: u32,
}

impl ScanSession {
    #[must_use]
    pub fn new(register_width: u32) -> Self {
        Self {
            reserved: 0,
            register_width,
        }
    }

    /// Number of reserved fields renamed so far.
    #[must_use]
    pub fn reserved_count(&self) -> usize {
        self.reserved
    }

    fn next_reserved(&mut self) -> String {
        let name = format!("__reserved{}", self.reserved);
        self.reserved += 1;
        name
    }

    /// Bit whose appearance as a high bit starts a new table.
    fn top_bit(&self) -> u32 {
        self.register_width.saturating_sub(1)
    }
}

/// Names a table header may be referring to.
///
/// The explicit register name, the initials of the descriptive name and the
/// abbreviation preceding the word "Register" in the descriptive name.
pub fn header_candidates(caps: &Captures<'_>) -> Result<Vec<String>> {
    let mut candidates = vec![required(caps, "bitfield_header", "regname")?.to_string()];
    let fullname = caps.name("fullname").map_or("", |m| m.as_str());

    let initials: String = WORD_INITIAL
        .find_iter(fullname)
        .map(|m| m.as_str())
        .collect();
    if !initials.is_empty() {
        candidates.push(initials);
    }
    if let Some(previous) = NAME_BEFORE_REGISTER.captures(fullname) {
        candidates.push(previous[1].to_string());
    }
    Ok(candidates)
}

/// Row parser for one table scan.
struct RowParser<'s> {
    session: &'s mut ScanSession,
    exhausted: bool,
}

impl RowParser<'_> {
    fn parse(&mut self, caps: &Captures<'_>) -> Result<Option<RegNode>> {
        let fieldname = required(caps, "bitfield_line", "fieldname")?.trim();
        let hi = parse_dec("hibit", required(caps, "bitfield_line", "hibit")?)?;
        let lo = optional(caps, "lobit")
            .map(|b| parse_dec("lobit", b))
            .transpose()?
            .unwrap_or(hi);
        let bits = BitRange::new(hi, lo);
        // Reserved rows draw a number even when the row is then discarded.
        let name = if fieldname.contains(RESERVED_MARKER) {
            self.session.next_reserved()
        } else {
            fieldname.to_string()
        };

        if bits.hi == self.session.top_bit() && self.exhausted {
            tracing::debug!(field = fieldname, "Top bit seen, reading rows again");
            self.exhausted = false;
        }
        if self.exhausted {
            tracing::debug!(field = fieldname, "Register exhausted, skipping row");
            return Ok(None);
        }
        if bits.lo == 0 {
            self.exhausted = true;
        }

        let logical_bits = match optional(caps, "hibit_log") {
            Some(hi_log) => {
                let hi_log = parse_dec("hibit_log", hi_log)?;
                let lo_log = optional(caps, "lobit_log")
                    .map(|b| parse_dec("lobit_log", b))
                    .transpose()?
                    .unwrap_or(hi_log);
                BitRange::new(hi_log, lo_log)
            }
            None => bits,
        };
        let reset = optional(caps, "reset")
            .map(|r| parse_hex("reset", r))
            .transpose()?
            .unwrap_or(0);

        tracing::debug!(field = %name, bits = %bits, "Bit-field");

        Ok(Some(RegNode::Bitfield(BitfieldEntry {
            name,
            bits,
            logical_bits,
            reset,
        })))
    }
}

/// Bit-fields found for a register.
#[derive(Debug)]
pub enum Extraction {
    /// One tree per bit-field, in table order.
    Found(Vec<Tree<RegNode>>),
    /// No table for the register was found in the text.
    NoUsableData,
}

/// Extract the bit-fields of `register` from its detail pages.
///
/// # Errors
/// Fails when a match lacks a required group or carries an unparsable
/// number; a missing table is reported as [`Extraction::NoUsableData`].
pub fn extract_bitfields(
    session: &mut ScanSession,
    register: &str,
    text: &str,
    header: &Regex,
    row: &Regex,
) -> Result<Extraction> {
    let mut parser = RowParser {
        session,
        exhausted: false,
    };
    let rows = vec![RowLevel::new(row.clone(), move |caps: &Captures<'_>| {
        parser.parse(caps)
    })];

    let mut header_error: Option<ScanError> = None;
    let outcome = filter_scan(text, header.clone(), |caps, accepted| {
        let candidates = match header_candidates(caps) {
            Ok(c) => c,
            Err(e) => {
                header_error.get_or_insert(e);
                return Verdict::Ignore;
            }
        };
        tracing::debug!(register, ?candidates, "Table header");
        if candidates.iter().any(|c| c == register) {
            Verdict::Accept
        } else if accepted > 0 {
            Verdict::Stop
        } else {
            Verdict::Ignore
        }
    }, rows)?;
    if let Some(e) = header_error {
        return Err(e);
    }

    Ok(match outcome {
        FilterOutcome::Accepted {
            nodes,
            stopped_early,
        } => {
            tracing::debug!(register, fields = nodes.len(), stopped_early, "Table read");
            Extraction::Found(nodes)
        }
        FilterOutcome::NoUsableData => Extraction::NoUsableData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header() -> Regex {
        Regex::new(r"^\s*(?P<regname>[A-Z][A-Z0-9_]+)\s+Register(?:\s+\((?P<fullname>[^)]*)\))?")
            .unwrap()
    }

    fn row() -> Regex {
        Regex::new(
            r"^\s*(?P<hibit>\d+)\s+(?:(?P<lobit>\d+)\s+)?(?P<fieldname>[A-Za-z_][\w ]*?)\s+(?P<reset>0x[0-9A-Fa-f]+)",
        )
        .unwrap()
    }

    fn scan(session: &mut ScanSession, register: &str, text: &str) -> Vec<BitfieldEntry> {
        match extract_bitfields(session, register, text, &header(), &row()).unwrap() {
            Extraction::Found(trees) => trees
                .iter()
                .flat_map(|t| t.values().cloned())
                .filter_map(|v| match v {
                    RegNode::Bitfield(b) => Some(b),
                    _ => None,
                })
                .collect(),
            Extraction::NoUsableData => panic!("expected bit-fields for {register}"),
        }
    }

    fn names(fields: &[BitfieldEntry]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_basic_table() {
        let mut session = ScanSession::new(16);
        let text = "ABC_CTRL Register\n15 14 MODE 0x0\n13 0 VALUE 0x0\n";
        let fields = scan(&mut session, "ABC_CTRL", text);

        assert_eq!(
            fields,
            vec![
                BitfieldEntry {
                    name: "MODE".to_string(),
                    bits: BitRange { hi: 15, lo: 14 },
                    logical_bits: BitRange { hi: 15, lo: 14 },
                    reset: 0,
                },
                BitfieldEntry {
                    name: "VALUE".to_string(),
                    bits: BitRange { hi: 13, lo: 0 },
                    logical_bits: BitRange { hi: 13, lo: 0 },
                    reset: 0,
                },
            ]
        );
    }

    #[test]
    fn test_exhaustion_discards_rows_until_top_bit() {
        let mut session = ScanSession::new(16);
        let text = "ABC_CTRL Register\n\
                    15 14 MODE 0x0\n\
                    13 0 VALUE 0x0\n\
                    12 0 EXTRA 0x0\n\
                    15 0 NEXT 0x1\n";
        let fields = scan(&mut session, "ABC_CTRL", text);

        assert_eq!(names(&fields), vec!["MODE", "VALUE", "NEXT"]);
        assert_eq!(fields[2].reset, 1);
    }

    #[test]
    fn test_rows_above_bit_zero_never_exhaust() {
        let mut session = ScanSession::new(16);
        let text = "ABC_CTRL Register\n7 4 HIGH 0x0\n3 1 MID 0x0\n9 8 MORE 0x0\n";
        let fields = scan(&mut session, "ABC_CTRL", text);
        assert_eq!(names(&fields), vec!["HIGH", "MID", "MORE"]);
    }

    #[test]
    fn test_single_bit_and_reversed_ranges() {
        let mut session = ScanSession::new(16);
        let text = "ABC_CTRL Register\n15 EN 0x1\n1 14 LOW_FIRST 0x0\n";
        let fields = scan(&mut session, "ABC_CTRL", text);

        assert_eq!(fields[0].bits, BitRange { hi: 15, lo: 15 });
        assert_eq!(fields[0].reset, 1);
        assert_eq!(fields[1].bits, BitRange { hi: 14, lo: 1 });
    }

    #[test]
    fn test_stops_at_next_register_table() {
        let mut session = ScanSession::new(16);
        let text = "ABC_CTRL Register\n15 8 HI 0x0\nABC_STAT Register\n7 0 FLAGS 0x0\n";
        let fields = scan(&mut session, "ABC_CTRL", text);
        assert_eq!(names(&fields), vec!["HI"]);
    }

    #[test]
    fn test_foreign_tables_before_the_wanted_one_are_skipped() {
        let mut session = ScanSession::new(16);
        let text = "ABC_STAT Register\n7 0 FLAGS 0x0\nABC_CTRL Register\n15 0 ALL 0x0\n";
        let fields = scan(&mut session, "ABC_CTRL", text);
        assert_eq!(names(&fields), vec!["ALL"]);
    }

    #[test]
    fn test_reserved_fields_are_numbered_across_registers() {
        let mut session = ScanSession::new(16);
        let first = scan(
            &mut session,
            "ABC_CTRL",
            "ABC_CTRL Register\n15 8 Reserved bits 0x0\n7 0 DATA 0x0\n",
        );
        let second = scan(
            &mut session,
            "ABC_STAT",
            "ABC_STAT Register\n15 1 Reserved 0x0\n0 DONE 0x0\n",
        );

        assert_eq!(names(&first), vec!["__reserved0", "DATA"]);
        assert_eq!(names(&second), vec!["__reserved1", "DONE"]);
        assert_eq!(session.reserved_count(), 2);
    }

    #[test]
    fn test_discarded_reserved_row_still_takes_a_number() {
        let mut session = ScanSession::new(16);
        let first = scan(
            &mut session,
            "ABC_CTRL",
            "ABC_CTRL Register\n15 0 DATA 0x0\n7 0 Reserved 0x0\n",
        );
        let second = scan(
            &mut session,
            "ABC_STAT",
            "ABC_STAT Register\n15 0 Reserved 0x0\n",
        );

        assert_eq!(names(&first), vec!["DATA"]);
        assert_eq!(names(&second), vec!["__reserved1"]);
        assert_eq!(session.reserved_count(), 2);
    }

    #[test]
    fn test_header_without_table_is_no_usable_data() {
        let mut session = ScanSession::new(16);
        let outcome =
            extract_bitfields(&mut session, "ABC_CTRL", "nothing here\n", &header(), &row()).unwrap();
        assert!(matches!(outcome, Extraction::NoUsableData));

        let outcome = extract_bitfields(
            &mut session,
            "ABC_CTRL",
            "ABC_STAT Register\n7 0 FLAGS 0x0\n",
            &header(),
            &row(),
        )
        .unwrap();
        assert!(matches!(outcome, Extraction::NoUsableData));
    }

    #[test]
    fn test_wider_registers_rearm_on_their_top_bit() {
        let mut session = ScanSession::new(32);
        let text = "ABC_CTRL Register\n31 0 WORD 0x0\n15 0 HALF 0x0\n31 16 UPPER 0x0\n";
        let fields = scan(&mut session, "ABC_CTRL", text);
        assert_eq!(names(&fields), vec!["WORD", "UPPER"]);
    }

    #[test]
    fn test_logical_bits() {
        let row = Regex::new(
            r"^\s*(?P<hibit>\d+)\s+(?P<lobit>\d+)\s+(?P<fieldname>\w+)(?:\s+(?P<hibit_log>\d+)(?:-(?P<lobit_log>\d+))?)?",
        )
        .unwrap();
        let mut session = ScanSession::new(16);
        let text = "ABC_CTRL Register\n15 12 SHIFTED 3-0\n11 8 PLAIN\n7 7 SINGLE 4\n";
        let outcome = extract_bitfields(&mut session, "ABC_CTRL", text, &header(), &row).unwrap();
        let Extraction::Found(trees) = outcome else {
            panic!("expected bit-fields");
        };
        let logical: Vec<BitRange> = trees
            .iter()
            .filter_map(|t| match t.value(t.root()) {
                Some(RegNode::Bitfield(b)) => Some(b.logical_bits),
                _ => None,
            })
            .collect();

        assert_eq!(
            logical,
            vec![
                BitRange { hi: 3, lo: 0 },
                BitRange { hi: 11, lo: 8 },
                BitRange { hi: 4, lo: 4 },
            ]
        );
    }

    #[test]
    fn test_candidates_from_descriptive_name() {
        let caps = header()
            .captures("CTL Register (Timer_A TA0CTL Register)")
            .unwrap();
        let candidates = header_candidates(&caps).unwrap();
        assert_eq!(candidates, vec!["CTL", "TTR", "TA0CTL"]);

        let caps = header().captures("ABC_CTRL Register").unwrap();
        assert_eq!(header_candidates(&caps).unwrap(), vec!["ABC_CTRL"]);
    }

    #[test]
    fn test_descriptive_name_accepts_table() {
        let mut session = ScanSession::new(16);
        let text = "CTL Register (Watchdog Timer Control Register)\n15 0 ALL 0x0\n";
        let fields = scan(&mut session, "WTCR", text);
        assert_eq!(names(&fields), vec!["ALL"]);
    }

    #[test]
    fn test_malformed_row_aborts() {
        let row = Regex::new(r"^\s*(?P<hibit>\w+)\s+(?P<fieldname>\w+)$").unwrap();
        let mut session = ScanSession::new(16);
        let err = extract_bitfields(
            &mut session,
            "ABC_CTRL",
            "ABC_CTRL Register\nhigh MODE\n",
            &header(),
            &row,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::InvalidNumber { field: "hibit", .. }));
    }
}
