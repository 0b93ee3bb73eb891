//! Dotted field addressing into a profile document.
//!
//! A `FieldPath` renders as `requirements.hard_skills_required` or
//! `process.stakeholders[1].email`. The same vocabulary is used for
//! validation issue locations, repair targets, confidence keys, locked
//! fields and migration rules.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses `a.b[2].c`. Returns `None` for empty segments or malformed indices.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Some(Self::root());
        }
        let mut segments = Vec::new();
        for part in raw.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if name.is_empty() {
                return None;
            }
            segments.push(Segment::Key(name.to_string()));
            while !rest.is_empty() {
                let close = rest.find(']')?;
                let index = rest.get(1..close)?.parse::<usize>().ok()?;
                segments.push(Segment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return None;
                }
            }
        }
        Some(Self { segments })
    }

    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.to_string()));
        Self { segments }
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The top-level section this path lives in, if any.
    pub fn section(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Truncates to the declared `section.field` address, dropping list
    /// indices and record sub-fields. Confidence is tracked at this grain.
    pub fn declared_field(&self) -> Self {
        let segments = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Key(_)))
            .take(2)
            .cloned()
            .collect();
        Self { segments }
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    pub fn get<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(doc, |node, segment| match segment {
                Segment::Key(k) => node.as_object()?.get(k),
                Segment::Index(i) => node.as_array()?.get(*i),
            })
    }

    pub fn get_mut<'a>(&self, doc: &'a mut Value) -> Option<&'a mut Value> {
        self.segments
            .iter()
            .try_fold(doc, |node, segment| match segment {
                Segment::Key(k) => node.as_object_mut()?.get_mut(k),
                Segment::Index(i) => node.as_array_mut()?.get_mut(*i),
            })
    }

    /// Writes `value` at this path, creating intermediate objects for key
    /// segments. Fails (returns `false`) when an intermediate node has the
    /// wrong shape or an index is out of bounds.
    pub fn set(&self, doc: &mut Value, value: Value) -> bool {
        let Some((last, parents)) = self.segments.split_last() else {
            *doc = value;
            return true;
        };
        let mut node = doc;
        for segment in parents {
            node = match segment {
                Segment::Key(k) => {
                    if node.is_null() {
                        *node = Value::Object(Map::new());
                    }
                    let Some(map) = node.as_object_mut() else {
                        return false;
                    };
                    map.entry(k.clone())
                        .or_insert_with(|| Value::Object(Map::new()))
                }
                Segment::Index(i) => match node.as_array_mut().and_then(|a| a.get_mut(*i)) {
                    Some(next) => next,
                    None => return false,
                },
            };
        }
        match last {
            Segment::Key(k) => {
                if node.is_null() {
                    *node = Value::Object(Map::new());
                }
                match node.as_object_mut() {
                    Some(map) => {
                        map.insert(k.clone(), value);
                        true
                    }
                    None => false,
                }
            }
            Segment::Index(i) => match node.as_array_mut().and_then(|a| a.get_mut(*i)) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
        }
    }

    /// Removes and returns the value at this path. Removing a list element
    /// shifts later indices, so callers removing several siblings must go
    /// from the highest index down.
    pub fn remove(&self, doc: &mut Value) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let parent = Self {
            segments: parents.to_vec(),
        };
        let node = parent.get_mut(doc)?;
        match last {
            Segment::Key(k) => node.as_object_mut()?.remove(k),
            Segment::Index(i) => {
                let arr = node.as_array_mut()?;
                (*i < arr.len()).then(|| arr.remove(*i))
            }
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            match segment {
                Segment::Key(k) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                Segment::Index(i) => write!(f, "[{i}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FieldPath::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid field path '{raw}'")))
    }
}
