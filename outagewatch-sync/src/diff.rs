//! Snapshot differ and commit message rendering.
//!
//! Records are keyed by `_id`. When several records share a key they are told
//! apart by occurrence order: the second becomes `<key>#2`, the third
//! `<key>#3`, and so on.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::{Map, Value};
use similar::TextDiff;

use outagewatch_core::Snapshot;

use crate::error::{io_err, DiffError, SyncError};

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// One field whose value differs. `None` means the field is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// A record present on both sides with differing fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Modification {
    pub key: String,
    pub changes: Vec<FieldChange>,
}

/// A record present on one side only.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRecord {
    pub key: String,
    pub record: Map<String, Value>,
}

/// Differences between two snapshots, each list sorted by key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeSet {
    pub added: Vec<KeyedRecord>,
    pub removed: Vec<KeyedRecord>,
    pub modified: Vec<Modification>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// First line of the commit message.
    pub fn subject(&self) -> String {
        if self.is_empty() {
            return "no changes".to_string();
        }
        format!(
            "{} added, {} removed, {} changed",
            self.added.len(),
            self.removed.len(),
            self.modified.len()
        )
    }

    /// The full commit message.
    pub fn render(&self) -> String {
        let mut out = self.subject();
        out.push('\n');

        if !self.added.is_empty() {
            out.push_str("\nAdded:\n");
            for entry in &self.added {
                let _ = writeln!(out, "  {}", entry.key);
            }
        }
        if !self.removed.is_empty() {
            out.push_str("\nRemoved:\n");
            for entry in &self.removed {
                let _ = writeln!(out, "  {}", entry.key);
            }
        }
        if !self.modified.is_empty() {
            out.push_str("\nChanged:\n");
            for modification in &self.modified {
                let _ = writeln!(out, "  {}", modification.key);
                for change in &modification.changes {
                    let _ = writeln!(
                        out,
                        "    {}: {} => {}",
                        change.field,
                        display(change.old.as_ref()),
                        display(change.new.as_ref())
                    );
                }
            }
        }
        out
    }
}

fn display(value: Option<&Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "(absent)".to_string(),
    }
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

/// Compare `current` against `previous`; no previous snapshot is an empty one.
pub fn diff(previous: Option<&Snapshot>, current: &Snapshot) -> Result<ChangeSet, DiffError> {
    let old = match previous {
        Some(snapshot) => keyed(snapshot, "previous")?,
        None => BTreeMap::new(),
    };
    let new = keyed(current, "new")?;

    let mut changes = ChangeSet::default();
    for (key, record) in &new {
        match old.get(key) {
            None => changes.added.push(KeyedRecord {
                key: key.clone(),
                record: (*record).clone(),
            }),
            Some(before) => {
                let fields = field_changes(before, record);
                if !fields.is_empty() {
                    changes.modified.push(Modification {
                        key: key.clone(),
                        changes: fields,
                    });
                }
            }
        }
    }
    for (key, record) in &old {
        if !new.contains_key(key) {
            changes.removed.push(KeyedRecord {
                key: key.clone(),
                record: (*record).clone(),
            });
        }
    }
    Ok(changes)
}

fn keyed<'a>(
    snapshot: &'a Snapshot,
    side: &'static str,
) -> Result<BTreeMap<String, &'a Map<String, Value>>, DiffError> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut out = BTreeMap::new();
    for (index, record) in snapshot.records().iter().enumerate() {
        let key = record
            .get("_id")
            .and_then(Value::as_str)
            .ok_or(DiffError::MissingKey { side, index })?;
        let count = seen.entry(key).or_insert(0);
        *count += 1;
        if *count > 1 {
            tracing::warn!("{side} snapshot: duplicate _id {key} (occurrence {count})");
        }
        let mut unique = if *count == 1 {
            key.to_string()
        } else {
            format!("{key}#{count}")
        };
        // A literal `_id` may already look like a disambiguated one.
        while out.contains_key(&unique) {
            *count += 1;
            unique = format!("{key}#{count}");
        }
        out.insert(unique, record);
    }
    Ok(out)
}

fn field_changes(old: &Map<String, Value>, new: &Map<String, Value>) -> Vec<FieldChange> {
    let fields: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    fields
        .into_iter()
        .filter_map(|field| {
            let before = old.get(field);
            let after = new.get(field);
            (before != after).then(|| FieldChange {
                field: field.clone(),
                old: before.cloned(),
                new: after.cloned(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Read a snapshot file; `None` if it does not exist.
pub fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Line diff of two snapshot files, headers `a/<name>` and `b/<name>`.
///
/// Missing files read as empty. Returns an empty string when equal.
pub fn unified_diff(old: &Path, new: &Path) -> Result<String, SyncError> {
    let before = read_existing_or_empty(old)?;
    let after = read_existing_or_empty(new)?;
    if before == after {
        return Ok(String::new());
    }
    let old_header = format!("a/{}", file_name(old));
    let new_header = format!("b/{}", file_name(new));
    Ok(TextDiff::from_lines(&before, &after)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(normalize_line_endings(&content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

pub(crate) fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
