//! Note data model and recency ordering.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A user-authored note anchored to a gateway artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Content identifier of the backing artifact. Unique across sources;
    /// the dedup key when merging local and remote collections.
    pub cid: String,
    /// Authored text. The gateway listing may omit it, in which case it is
    /// empty.
    #[serde(default)]
    pub text: String,
    /// Locator for the backing artifact.
    pub url: String,
    /// Creation timestamp as an RFC 3339 string. Used only for ordering.
    pub created_at: String,
}

impl Note {
    /// Parse the creation timestamp. `None` if the string is not RFC 3339.
    pub fn parsed_created_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.created_at).ok()
    }
}

/// An ordered collection of notes, unique by cid, newest first.
///
/// A freshly authored local note is prepended ahead of chronological order;
/// the next merge restores strict recency order. Serialized as a bare JSON
/// array so the durable value matches the gateway's wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteCollection {
    notes: Vec<Note>,
}

impl NoteCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from already-deduplicated notes.
    pub fn from_notes(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    /// The notes in display order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Whether a note with this cid is already held.
    pub fn contains(&self, cid: &str) -> bool {
        self.notes.iter().any(|n| n.cid == cid)
    }

    /// Put `note` at the head, ahead of chronological order.
    pub fn prepend(&mut self, note: Note) {
        self.notes.insert(0, note);
    }

    /// Stable sort, newest first. An unparseable timestamp orders below
    /// every parseable instant, so those notes end up last; ties keep their
    /// relative order.
    pub fn sort_by_recency(&mut self) {
        self.notes
            .sort_by(|a, b| b.parsed_created_at().cmp(&a.parsed_created_at()));
    }
}
