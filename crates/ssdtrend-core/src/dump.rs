//! Dump parser: one decoded snapshot text into a list of object blocks.
//!
//! # Grammar
//!
//! ```text
//! FooObj, Core 0, Uid 7, Major 1, Minor 2, Data Area 3, byte Size 64, ref-xyz
//!     bar : 42
//!     stats :
//!         hits : 10
//! #########
//! ```
//!
//! - A comma-separated line whose second part starts with `Core` is a block
//!   signature. All eight parts must parse or the block is discarded.
//! - A line containing `#########`, or the next signature, ends the current
//!   block. Blank lines inside a block are skipped.
//! - Field lines are `name : value`, indented in four-space units. A line with
//!   an empty value opens a sub-structure when the next field line is deeper,
//!   and is a null leaf otherwise.
//!
//! Malformed input is never fatal: lines are skipped and counted in the
//! [`ParseReport`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::{ObjectId, Reading};

const TERMINATOR: &str = "#########";
const INDENT_WIDTH: usize = 4;

/// Default number of malformed lines per snapshot before a warning is logged.
pub const DEFAULT_MALFORMED_WARN_THRESHOLD: usize = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How field lines are turned into field paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Path is the field name alone; one reading per field per block.
    Flat,
    /// Path is the dotted chain of enclosing sub-structure names.
    #[default]
    Nested,
}

/// The eight signature attributes of an object block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSignature {
    pub name: String,
    pub core: i64,
    pub uid: ObjectId,
    pub major: i64,
    pub minor: i64,
    pub data_area: i64,
    pub byte_size: i64,
    pub reference: String,
}

/// One leaf value as it appeared in the dump.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafReading {
    pub raw: String,
    pub value: Reading,
}

impl LeafReading {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            value: Reading::interpret(raw),
        }
    }
}

/// One telemetry object instance inside a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBlock {
    pub signature: BlockSignature,
    /// Field path → readings in line order (duplicates append).
    pub fields: BTreeMap<String, Vec<LeafReading>>,
}

/// Per-snapshot parse statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub lines: usize,
    pub blocks: usize,
    pub malformed_lines: usize,
    pub incomplete_signatures: usize,
    pub unmatched_indents: usize,
    pub duplicate_fields: usize,
    /// Lines outside any block (preamble, or after a discarded signature).
    pub ignored_lines: usize,
}

impl ParseReport {
    pub fn absorb(&mut self, other: &ParseReport) {
        self.lines += other.lines;
        self.blocks += other.blocks;
        self.malformed_lines += other.malformed_lines;
        self.incomplete_signatures += other.incomplete_signatures;
        self.unmatched_indents += other.unmatched_indents;
        self.duplicate_fields += other.duplicate_fields;
        self.ignored_lines += other.ignored_lines;
    }
}

/// Blocks of one snapshot plus parse statistics.
#[derive(Debug, Clone, Default)]
pub struct ParsedSnapshot {
    pub blocks: Vec<ObjectBlock>,
    pub report: ParseReport,
}

impl ParsedSnapshot {
    /// A snapshot with no valid block.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

fn is_terminator(line: &str) -> bool {
    line.contains(TERMINATOR)
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Comma parts of a signature-looking line.
fn signature_parts(line: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() < 2 || parts[0].contains(':') {
        return None;
    }
    let second = parts[1].trim_start();
    if second.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("core")) {
        Some(parts)
    } else {
        None
    }
}

/// `"<label words> <integer>"` → integer, matching the label case-insensitively.
fn labelled_int(part: &str, label: &[&str]) -> Option<i64> {
    let words: Vec<&str> = part.split_whitespace().collect();
    if words.len() != label.len() + 1 {
        return None;
    }
    let matches = words
        .iter()
        .zip(label)
        .all(|(w, l)| w.eq_ignore_ascii_case(l));
    if !matches {
        return None;
    }
    words[label.len()].parse().ok()
}

fn parse_signature(parts: &[&str]) -> Option<BlockSignature> {
    if parts.len() != 8 {
        return None;
    }
    let name = parts[0].trim();
    let reference = parts[7].trim();
    if name.is_empty() || reference.is_empty() {
        return None;
    }
    let uid = labelled_int(parts[2], &["uid"])?;
    Some(BlockSignature {
        name: name.to_string(),
        core: labelled_int(parts[1], &["core"])?,
        uid: ObjectId(u64::try_from(uid).ok()?),
        major: labelled_int(parts[3], &["major"])?,
        minor: labelled_int(parts[4], &["minor"])?,
        data_area: labelled_int(parts[5], &["data", "area"])?,
        byte_size: labelled_int(parts[6], &["byte", "size"])?,
        reference: reference.to_string(),
    })
}

/// Indent level (four-space units, a tab counts as one unit) and the rest.
fn split_indent(line: &str) -> (usize, &str) {
    let mut width = 0;
    for (idx, ch) in line.char_indices() {
        match ch {
            ' ' => width += 1,
            '\t' => width += INDENT_WIDTH,
            _ => return (width / INDENT_WIDTH, &line[idx..]),
        }
    }
    (width / INDENT_WIDTH, "")
}

/// `(level, name, value)` of a field line.
fn field_line(line: &str) -> Option<(usize, &str, &str)> {
    let (level, body) = split_indent(line);
    let (name, value) = body.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((level, name, value.trim()))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct OpenBlock {
    block: ObjectBlock,
    headers: Vec<(usize, String)>,
    base_level: Option<usize>,
}

/// Stateless dump parser; one call per snapshot.
#[derive(Debug, Clone)]
pub struct DumpParser {
    pub mode: ParseMode,
    pub malformed_warn_threshold: usize,
}

impl Default for DumpParser {
    fn default() -> Self {
        Self {
            mode: ParseMode::Nested,
            malformed_warn_threshold: DEFAULT_MALFORMED_WARN_THRESHOLD,
        }
    }
}

impl DumpParser {
    pub fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Parse one snapshot. `origin` names the snapshot in log messages.
    pub fn parse(&self, text: &str, origin: &str) -> ParsedSnapshot {
        let lines: Vec<&str> = text.lines().collect();
        let mut out = ParsedSnapshot::default();
        let mut open: Option<OpenBlock> = None;

        for (idx, &line) in lines.iter().enumerate() {
            out.report.lines += 1;

            if is_terminator(line) {
                close(&mut open, &mut out);
                continue;
            }
            if is_blank(line) {
                continue;
            }

            if let Some(parts) = signature_parts(line) {
                close(&mut open, &mut out);
                match parse_signature(&parts) {
                    Some(signature) => {
                        open = Some(OpenBlock {
                            block: ObjectBlock {
                                signature,
                                fields: BTreeMap::new(),
                            },
                            headers: Vec::new(),
                            base_level: None,
                        });
                    }
                    None => {
                        out.report.incomplete_signatures += 1;
                        log::warn!(
                            "{origin}:{}: incomplete object signature, block discarded",
                            idx + 1
                        );
                    }
                }
                continue;
            }

            let Some(current) = open.as_mut() else {
                out.report.ignored_lines += 1;
                continue;
            };

            let Some((level, name, value)) = field_line(line) else {
                out.report.malformed_lines += 1;
                log::debug!("{origin}:{}: malformed line skipped", idx + 1);
                continue;
            };

            let base = *current.base_level.get_or_insert(level);
            let opens_structure = value.is_empty() && next_field_level(&lines[idx + 1..]) > Some(level);

            match self.mode {
                ParseMode::Nested => {
                    while current.headers.last().is_some_and(|(l, _)| *l >= level) {
                        current.headers.pop();
                    }
                    if level > base && current.headers.last().map(|(l, _)| *l + 1) != Some(level) {
                        out.report.unmatched_indents += 1;
                        log::debug!("{origin}:{}: indent has no matching parent", idx + 1);
                    }
                    if opens_structure {
                        current.headers.push((level, name.to_string()));
                        continue;
                    }
                    let mut path: Vec<&str> =
                        current.headers.iter().map(|(_, h)| h.as_str()).collect();
                    path.push(name);
                    let readings = current.block.fields.entry(path.join(".")).or_default();
                    if !readings.is_empty() {
                        out.report.duplicate_fields += 1;
                    }
                    readings.push(LeafReading::new(value));
                }
                ParseMode::Flat => {
                    if opens_structure {
                        continue;
                    }
                    let readings = current.block.fields.entry(name.to_string()).or_default();
                    if readings.is_empty() {
                        readings.push(LeafReading::new(value));
                    } else {
                        out.report.duplicate_fields += 1;
                    }
                }
            }
        }
        close(&mut open, &mut out);

        if out.report.malformed_lines > self.malformed_warn_threshold {
            log::warn!(
                "{origin}: {} malformed lines skipped",
                out.report.malformed_lines
            );
        }
        out
    }
}

fn close(open: &mut Option<OpenBlock>, out: &mut ParsedSnapshot) {
    if let Some(done) = open.take() {
        out.report.blocks += 1;
        out.blocks.push(done.block);
    }
}

/// Indent level of the next field line inside the current block, if any.
fn next_field_level(rest: &[&str]) -> Option<usize> {
    for line in rest {
        if is_terminator(line) || signature_parts(line).is_some() {
            return None;
        }
        if is_blank(line) {
            continue;
        }
        if let Some((level, _, _)) = field_line(line) {
            return Some(level);
        }
    }
    None
}
