//! Permission codes and sets.
//!
//! Permissions are single-character codes attached to nodes. A user's
//! effective set at a node is the nearest explicit assignment along the
//! node's path, falling back to the user's group default codes. An explicit
//! assignment identical to the defaults is a no-op and is never persisted.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single permission code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PermissionCode {
    /// Browse/read a node (`R`).
    Read,
    /// Create children (`C`).
    Create,
    /// Update content (`U`).
    Update,
    /// Delete / move to recycle bin (`D`).
    Delete,
    /// Publish and unpublish (`P`).
    Publish,
    /// Send to the approval queue (`H`).
    SendForApproval,
    /// Move within the tree (`M`).
    Move,
    /// Copy a subtree (`O`).
    Copy,
    /// Reorder children (`S`).
    Sort,
}

impl PermissionCode {
    /// The persisted single-character code.
    pub fn letter(self) -> char {
        match self {
            Self::Read => 'R',
            Self::Create => 'C',
            Self::Update => 'U',
            Self::Delete => 'D',
            Self::Publish => 'P',
            Self::SendForApproval => 'H',
            Self::Move => 'M',
            Self::Copy => 'O',
            Self::Sort => 'S',
        }
    }

    /// Parse a persisted code letter. Unknown letters yield None.
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'R' => Some(Self::Read),
            'C' => Some(Self::Create),
            'U' => Some(Self::Update),
            'D' => Some(Self::Delete),
            'P' => Some(Self::Publish),
            'H' => Some(Self::SendForApproval),
            'M' => Some(Self::Move),
            'O' => Some(Self::Copy),
            'S' => Some(Self::Sort),
            _ => None,
        }
    }
}

/// A set of permission codes at one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    codes: BTreeSet<PermissionCode>,
}

impl PermissionSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from codes.
    pub fn from_codes(codes: impl IntoIterator<Item = PermissionCode>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    /// Parse from persisted letters, ignoring unknown characters.
    pub fn from_letters(letters: &str) -> Self {
        Self {
            codes: letters.chars().filter_map(PermissionCode::from_letter).collect(),
        }
    }

    /// Persisted letter form, sorted.
    pub fn letters(&self) -> String {
        self.codes.iter().map(|c| c.letter()).collect()
    }

    /// Insert a code.
    pub fn insert(&mut self, code: PermissionCode) {
        self.codes.insert(code);
    }

    /// Whether the set contains a code.
    pub fn contains(&self, code: PermissionCode) -> bool {
        self.codes.contains(&code)
    }

    /// Whether the set contains every required code. A partial match fails
    /// the whole check; an empty requirement always passes.
    pub fn contains_all(&self, required: &[PermissionCode]) -> bool {
        required.iter().all(|c| self.codes.contains(c))
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

/// Resolve the effective set: an explicit assignment overrides the group
/// defaults entirely; with no assignment the defaults apply.
pub fn effective(defaults: &PermissionSet, assigned: Option<&PermissionSet>) -> PermissionSet {
    match assigned {
        Some(set) => set.clone(),
        None => defaults.clone(),
    }
}

/// Normalize an assignment before persisting: an assignment identical to
/// the defaults is a no-op override and is stored as absent.
pub fn normalize_assignment(
    defaults: &PermissionSet,
    assigned: PermissionSet,
) -> Option<PermissionSet> {
    if assigned == *defaults {
        None
    } else {
        Some(assigned)
    }
}
