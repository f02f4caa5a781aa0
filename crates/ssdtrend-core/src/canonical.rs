//! Canonical dataset formats.
//!
//! Two plain-text encodings of a [`Dataset`], both deterministic and
//! round-trippable:
//!
//! - **Sections** (`.ini`): one `[uid-N]` section per object, keys sorted,
//!   `name`/`uid`/`ref` as bare scalars and every series as a list literal
//!   such as `[42, 'hello', None, 0.5]`.
//! - **Rows** (`.tsv`): one `uid-N.<path>\t<value>` line per series. A
//!   homogeneous list is flattened to comma-separated tokens when that is
//!   unambiguous; otherwise the list literal is written.
//!
//! Series stored under the scalar key names are always written as literals,
//! which is how the readers tell them apart from the scalars. Keys escape `\`,
//! `=`, tab and line breaks with a backslash so neither separator can occur
//! inside a written key.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::dataset::{Dataset, ObjectId, ObjectSeries, Reading, TIMESTAMP_UID};
use crate::error::{Error, Result};

const NAME_KEY: &str = "name";
const UID_KEY: &str = "uid";
const REF_KEY: &str = "ref";

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for ch in key.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '=' => out.push_str("\\="),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_key(key: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('=') => out.push('='),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(c) => return Err(format!("unknown escape '\\{c}' in key")),
            None => return Err("key ends in a lone backslash".into()),
        }
    }
    Ok(out)
}

fn render_item(r: &Reading) -> String {
    match r {
        Reading::Null => "None".to_string(),
        Reading::Int(v) => v.to_string(),
        Reading::Real(v) => format!("{v:?}"),
        Reading::Text(s) => quote(s),
    }
}

/// List literal, e.g. `[1, 'a', None]`.
pub fn render_list(readings: &[Reading]) -> String {
    let items: Vec<String> = readings.iter().map(render_item).collect();
    format!("[{}]", items.join(", "))
}

fn is_scalar_key(key: &str) -> bool {
    matches!(key, NAME_KEY | UID_KEY | REF_KEY)
}

/// Text token that survives a bare comma-separated rendering.
fn flattenable_text(s: &str) -> bool {
    !s.is_empty()
        && s != "None"
        && s.trim() == s
        && !s.contains([',', '\t', '\n', '\r', '[', ']', '\'', '"', '\\'])
        && s.parse::<i64>().is_err()
        && s.parse::<f64>().is_err()
}

fn render_flat(readings: &[Reading]) -> Option<String> {
    let first = readings.first()?;
    let tokens: Option<Vec<String>> = match first {
        Reading::Int(_) => readings
            .iter()
            .map(|r| match r {
                Reading::Int(v) => Some(v.to_string()),
                _ => None,
            })
            .collect(),
        Reading::Real(_) => readings
            .iter()
            .map(|r| match r {
                Reading::Real(v) => Some(format!("{v:?}")),
                _ => None,
            })
            .collect(),
        Reading::Text(_) => readings
            .iter()
            .map(|r| match r {
                Reading::Text(s) if flattenable_text(s) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        Reading::Null => None,
    };
    tokens.map(|t| t.join(","))
}

/// Sorted `(key, value)` entries of one object.
fn object_entries(object: &ObjectSeries, flatten: bool) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    entries.push((NAME_KEY.to_string(), object.name.clone()));
    if object.uid != TIMESTAMP_UID {
        entries.push((UID_KEY.to_string(), object.uid.0.to_string()));
    }
    if let Some(r) = &object.reference {
        entries.push((REF_KEY.to_string(), r.clone()));
    }
    for (path, readings) in &object.fields {
        let value = if flatten && !is_scalar_key(path) {
            render_flat(readings).unwrap_or_else(|| render_list(readings))
        } else {
            render_list(readings)
        };
        entries.push((path.clone(), value));
    }
    // Stable: a scalar sorts before a same-named series.
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

/// Section-major text.
pub fn write_sections(dataset: &Dataset) -> String {
    let mut out = String::new();
    for (i, object) in dataset.objects().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "[{}]", object.uid);
        for (key, value) in object_entries(object, false) {
            let _ = writeln!(out, "{} = {value}", escape_key(&key));
        }
    }
    out
}

/// Row-major tab-separated text.
pub fn write_rows(dataset: &Dataset) -> String {
    let mut out = String::new();
    for object in dataset.objects() {
        for (key, value) in object_entries(object, true) {
            let _ = writeln!(out, "{}.{}\t{value}", object.uid, escape_key(&key));
        }
    }
    out
}

/// SHA-256 of the section text; equal datasets have equal fingerprints.
pub fn fingerprint(dataset: &Dataset) -> String {
    let digest = Sha256::digest(write_sections(dataset).as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct LiteralParser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> LiteralParser<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars().peekable(),
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expect(&mut self, want: char) -> std::result::Result<(), String> {
        self.skip_ws();
        match self.chars.next() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(format!("expected '{want}', found '{c}'")),
            None => Err(format!("expected '{want}', found end of value")),
        }
    }

    fn quoted(&mut self) -> std::result::Result<String, String> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err("unterminated string".into()),
                Some('\'') => return Ok(out),
                Some('\\') => match self.chars.next() {
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('t') => out.push('\t'),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some(c) => return Err(format!("unknown escape '\\{c}'")),
                    None => return Err("unterminated escape".into()),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn bare(&mut self) -> std::result::Result<Reading, String> {
        let mut token = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == ',' || c == ']' {
                break;
            }
            token.push(c);
            self.chars.next();
        }
        parse_token(token.trim()).ok_or_else(|| format!("unrecognised item '{}'", token.trim()))
    }

    fn list(&mut self) -> std::result::Result<Vec<Reading>, String> {
        self.expect('[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.chars.peek() == Some(&']') {
            self.chars.next();
        } else {
            loop {
                self.skip_ws();
                let item = if self.chars.peek() == Some(&'\'') {
                    self.chars.next();
                    Reading::Text(self.quoted()?)
                } else {
                    self.bare()?
                };
                items.push(item);
                self.skip_ws();
                match self.chars.next() {
                    Some(',') => continue,
                    Some(']') => break,
                    Some(c) => return Err(format!("expected ',' or ']', found '{c}'")),
                    None => return Err("unterminated list".into()),
                }
            }
        }
        self.skip_ws();
        match self.chars.next() {
            None => Ok(items),
            Some(c) => Err(format!("trailing '{c}' after list")),
        }
    }
}

fn parse_token(token: &str) -> Option<Reading> {
    if token == "None" {
        return Some(Reading::Null);
    }
    if let Ok(v) = token.parse::<i64>() {
        if v.to_string() == token {
            return Some(Reading::Int(v));
        }
    }
    token.parse::<f64>().ok().map(Reading::Real)
}

/// Parse a list literal.
pub fn parse_list(value: &str) -> std::result::Result<Vec<Reading>, String> {
    LiteralParser::new(value).list()
}

fn parse_flat(value: &str) -> Vec<Reading> {
    value
        .split(',')
        .map(|t| parse_token(t).unwrap_or_else(|| Reading::Text(t.to_string())))
        .collect()
}

#[derive(Default)]
struct PartialObject {
    name: Option<String>,
    reference: Option<String>,
    fields: BTreeMap<String, Vec<Reading>>,
}

impl PartialObject {
    fn apply(
        &mut self,
        key: &str,
        value: &str,
        flat_allowed: bool,
    ) -> std::result::Result<(), String> {
        if is_scalar_key(key) && !value.starts_with('[') {
            match key {
                NAME_KEY => self.name = Some(value.to_string()),
                REF_KEY => self.reference = Some(value.to_string()),
                _ => {
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("invalid uid '{value}'"))?;
                }
            }
            return Ok(());
        }
        let readings = if value.starts_with('[') {
            parse_list(value)?
        } else if flat_allowed {
            parse_flat(value)
        } else {
            return Err(format!("expected a list literal for '{key}'"));
        };
        self.fields.insert(key.to_string(), readings);
        Ok(())
    }

    fn finish(self, uid: ObjectId) -> ObjectSeries {
        ObjectSeries {
            uid,
            name: self.name.unwrap_or_default(),
            reference: self.reference,
            fields: self.fields,
        }
    }
}

/// Parse section-major text.
pub fn read_sections(text: &str, origin: &str) -> Result<Dataset> {
    let mut objects: BTreeMap<ObjectId, PartialObject> = BTreeMap::new();
    let mut current: Option<ObjectId> = None;

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') && !line.contains(" = ") {
            let uid: ObjectId = line[1..line.len() - 1]
                .parse()
                .map_err(|e: String| Error::format(origin, lineno, e))?;
            objects.entry(uid).or_default();
            current = Some(uid);
            continue;
        }
        let Some(uid) = current else {
            return Err(Error::format(origin, lineno, "key outside of any section"));
        };
        let (key, value) = line
            .split_once(" = ")
            .ok_or_else(|| Error::format(origin, lineno, "expected 'key = value'"))?;
        let key = unescape_key(key).map_err(|e| Error::format(origin, lineno, e))?;
        objects
            .entry(uid)
            .or_default()
            .apply(&key, value, false)
            .map_err(|e| Error::format(origin, lineno, e))?;
    }

    Ok(Dataset::from_objects(
        objects.into_iter().map(|(uid, p)| p.finish(uid)),
    ))
}

/// Parse row-major text.
pub fn read_rows(text: &str, origin: &str) -> Result<Dataset> {
    let mut objects: BTreeMap<ObjectId, PartialObject> = BTreeMap::new();

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('\t')
            .ok_or_else(|| Error::format(origin, lineno, "expected '<key>\\t<value>'"))?;
        let (object, field) = key
            .split_once('.')
            .ok_or_else(|| Error::format(origin, lineno, "key lacks an object prefix"))?;
        let uid: ObjectId = object
            .parse()
            .map_err(|e: String| Error::format(origin, lineno, e))?;
        let field = unescape_key(field).map_err(|e| Error::format(origin, lineno, e))?;
        objects
            .entry(uid)
            .or_default()
            .apply(&field, value, true)
            .map_err(|e| Error::format(origin, lineno, e))?;
    }

    Ok(Dataset::from_objects(
        objects.into_iter().map(|(uid, p)| p.finish(uid)),
    ))
}

/// Read a dataset file, choosing the format by extension.
pub fn read_path(path: &Path) -> Result<Dataset> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let origin = path.display().to_string();
    match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") | Some("csv") => read_rows(&text, &origin),
        _ => read_sections(&text, &origin),
    }
}

/// Paths written by [`write_files`].
#[derive(Debug, Clone)]
pub struct CanonicalFiles {
    pub sections: PathBuf,
    pub rows: PathBuf,
}

/// Write `<stem>.ini` and `<stem>.tsv` into `dir`.
pub fn write_files(dataset: &Dataset, dir: &Path, stem: &str) -> Result<CanonicalFiles> {
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let sections = dir.join(format!("{stem}.ini"));
    let rows = dir.join(format!("{stem}.tsv"));
    fs::write(&sections, write_sections(dataset)).map_err(|e| Error::io(&sections, e))?;
    fs::write(&rows, write_rows(dataset)).map_err(|e| Error::io(&rows, e))?;
    Ok(CanonicalFiles { sections, rows })
}
