//! Schema discovery: which objects and field paths exist, and their domains.
//!
//! The schema only grows. A field path first seen at snapshot `k` is kept for
//! the rest of the corpus, and domains widen but never narrow.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::dataset::{ObjectId, ObjectSeries, Reading};

/// Value domain of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// No observation yet.
    Unknown,
    Integer,
    /// Free-form or categorical text; absorbs mixed series.
    Enumeration,
    /// Installed derived series.
    Real,
}

impl Domain {
    /// Least upper bound of two domains.
    pub fn widen(self, other: Domain) -> Domain {
        use Domain::*;
        match (self, other) {
            (Unknown, d) | (d, Unknown) => d,
            (a, b) if a == b => a,
            (Integer, Real) | (Real, Integer) => Real,
            _ => Enumeration,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Domain::Integer | Domain::Real)
    }

    pub fn label(self) -> &'static str {
        match self {
            Domain::Unknown => "unknown",
            Domain::Integer => "integer",
            Domain::Enumeration => "enumeration",
            Domain::Real => "real",
        }
    }
}

/// Fields of one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectSchema {
    pub fields: BTreeMap<String, Domain>,
    /// Paths that are prefixes of other paths.
    #[serde(skip)]
    pub interior: BTreeSet<String>,
}

/// Outcome of placing a field path into the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    /// Path the reading must be stored under.
    pub path: String,
    /// Existing leaves moved to `<leaf>.value`, as `(old, new)`.
    pub renamed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    objects: BTreeMap<ObjectId, ObjectSchema>,
}

impl Schema {
    /// Register an object; true if it was new.
    pub fn ensure_object(&mut self, uid: ObjectId) -> bool {
        if self.objects.contains_key(&uid) {
            return false;
        }
        self.objects.insert(uid, ObjectSchema::default());
        true
    }

    pub fn object(&self, uid: ObjectId) -> Option<&ObjectSchema> {
        self.objects.get(&uid)
    }

    pub fn object_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.keys().copied()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn field_count(&self) -> usize {
        self.objects.values().map(|o| o.fields.len()).sum()
    }

    pub fn domain(&self, uid: ObjectId, path: &str) -> Option<Domain> {
        self.objects.get(&uid)?.fields.get(path).copied()
    }

    /// Place `path` for `uid`, resolving structural depth conflicts.
    ///
    /// The deeper form always wins: a leaf that is already an interior prefix
    /// is stored as `<path>.value`, and an existing leaf that becomes the
    /// ancestor of a new path is renamed to `<leaf>.value`.
    pub fn resolve_path(&mut self, uid: ObjectId, path: &str) -> ResolvedPath {
        let object = self.objects.entry(uid).or_default();
        let mut path = path.to_string();
        while object.interior.contains(&path) {
            log::warn!("{uid}: leaf '{path}' shadows a sub-structure, storing as '{path}.value'");
            path.push_str(".value");
        }

        let mut renamed = Vec::new();
        for (idx, _) in path.match_indices('.') {
            let ancestor = &path[..idx];
            if let Some(domain) = object.fields.remove(ancestor) {
                let moved = format!("{ancestor}.value");
                log::warn!("{uid}: '{ancestor}' gained sub-fields, moving its series to '{moved}'");
                object.fields.insert(moved.clone(), domain);
                renamed.push((ancestor.to_string(), moved));
            }
            object.interior.insert(ancestor.to_string());
        }

        ResolvedPath { path, renamed }
    }

    /// Record one reading; returns true when the field path is new.
    pub fn observe(&mut self, uid: ObjectId, path: &str, reading: &Reading) -> bool {
        let object = self.objects.entry(uid).or_default();
        let incoming = reading.domain();
        match object.fields.get_mut(path) {
            Some(domain) => {
                let widened = domain.widen(incoming);
                if widened != *domain {
                    if *domain != Domain::Unknown {
                        log::info!(
                            "{uid}.{path}: domain widened from {} to {}",
                            domain.label(),
                            widened.label()
                        );
                    }
                    *domain = widened;
                }
                false
            }
            None => {
                object.fields.insert(path.to_string(), incoming);
                true
            }
        }
    }

    /// Schema implied by a set of object series.
    pub fn infer<'a>(objects: impl IntoIterator<Item = &'a ObjectSeries>) -> Schema {
        let mut schema = Schema::default();
        for object in objects {
            let entry = schema.objects.entry(object.uid).or_default();
            for (path, readings) in &object.fields {
                let domain = readings
                    .iter()
                    .filter(|r| r.is_observed())
                    .fold(Domain::Unknown, |d, r| d.widen(r.domain()));
                entry.fields.insert(path.clone(), domain);
                for (idx, _) in path.match_indices('.') {
                    entry.interior.insert(path[..idx].to_string());
                }
            }
        }
        schema
    }

    /// True when every object and field of `other` is present here.
    pub fn is_superset_of(&self, other: &Schema) -> bool {
        other.objects.iter().all(|(uid, theirs)| {
            self.objects
                .get(uid)
                .is_some_and(|ours| theirs.fields.keys().all(|p| ours.fields.contains_key(p)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_widening() {
        assert_eq!(Domain::Unknown.widen(Domain::Integer), Domain::Integer);
        assert_eq!(Domain::Integer.widen(Domain::Integer), Domain::Integer);
        assert_eq!(Domain::Integer.widen(Domain::Enumeration), Domain::Enumeration);
        assert_eq!(Domain::Enumeration.widen(Domain::Integer), Domain::Enumeration);
        assert_eq!(Domain::Integer.widen(Domain::Real), Domain::Real);
        assert_eq!(Domain::Real.widen(Domain::Enumeration), Domain::Enumeration);
    }

    #[test]
    fn test_observe_new_and_widen() {
        let mut s = Schema::default();
        let uid = ObjectId(1);
        assert!(s.observe(uid, "x", &Reading::Int(5)));
        assert!(!s.observe(uid, "x", &Reading::Text("hello".into())));
        assert_eq!(s.domain(uid, "x"), Some(Domain::Enumeration));
        assert!(!s.observe(uid, "x", &Reading::Int(6)));
        assert_eq!(s.domain(uid, "x"), Some(Domain::Enumeration));
    }

    #[test]
    fn test_null_reading_keeps_unknown() {
        let mut s = Schema::default();
        s.observe(ObjectId(1), "e", &Reading::Null);
        assert_eq!(s.domain(ObjectId(1), "e"), Some(Domain::Unknown));
        s.observe(ObjectId(1), "e", &Reading::Int(1));
        assert_eq!(s.domain(ObjectId(1), "e"), Some(Domain::Integer));
    }

    #[test]
    fn test_deeper_path_renames_existing_leaf() {
        let mut s = Schema::default();
        let uid = ObjectId(9);
        s.observe(uid, "x", &Reading::Int(5));
        let r = s.resolve_path(uid, "x.y");
        assert_eq!(r.path, "x.y");
        assert_eq!(r.renamed, vec![("x".to_string(), "x.value".to_string())]);
        assert_eq!(s.domain(uid, "x.value"), Some(Domain::Integer));
        assert!(s.domain(uid, "x").is_none());
    }

    #[test]
    fn test_shallow_leaf_coerced_to_value() {
        let mut s = Schema::default();
        let uid = ObjectId(9);
        let r = s.resolve_path(uid, "x.y");
        s.observe(uid, &r.path, &Reading::Int(1));
        let r = s.resolve_path(uid, "x");
        assert_eq!(r.path, "x.value");
        assert!(r.renamed.is_empty());
    }

    #[test]
    fn test_superset() {
        let mut a = Schema::default();
        a.observe(ObjectId(1), "x", &Reading::Int(1));
        let mut b = a.clone();
        b.observe(ObjectId(1), "y", &Reading::Int(1));
        b.observe(ObjectId(2), "z", &Reading::Int(1));
        assert!(b.is_superset_of(&a));
        assert!(!a.is_superset_of(&b));
    }

    #[test]
    fn test_infer_ignores_sentinels() {
        let mut o = ObjectSeries::new(ObjectId(4), "O", None);
        o.fields.insert(
            "t".into(),
            vec![Reading::Text("a".into()), Reading::Text(String::new())],
        );
        o.fields.insert("n".into(), vec![Reading::Null, Reading::Int(2)]);
        o.fields.insert("u".into(), vec![Reading::Null]);
        let s = Schema::infer([&o]);
        assert_eq!(s.domain(ObjectId(4), "t"), Some(Domain::Enumeration));
        assert_eq!(s.domain(ObjectId(4), "n"), Some(Domain::Integer));
        assert_eq!(s.domain(ObjectId(4), "u"), Some(Domain::Unknown));
    }
}
