//! Scope paths and configuration keys

use crate::{Error, Result, Scope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A non-empty, root-first sequence of scopes addressing one snapshot.
///
/// The last scope is the *defining scope* of whatever snapshot the path
/// addresses. The textual form joins scopes with `/`:
///
/// ```
/// use scope_model::ScopePath;
///
/// let path: ScopePath = "global/tenant[id=acme]/user[id=alice]".parse().unwrap();
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.last_scope().property("id"), Some("alice"));
/// assert_eq!(path.parent_path().unwrap().to_string(), "global/tenant[id=acme]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<Scope>", into = "Vec<Scope>")]
pub struct ScopePath {
    scopes: Vec<Scope>,
}

impl ScopePath {
    /// Create a path from a root-first sequence of scopes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyScopePath`] if `scopes` is empty.
    pub fn new(scopes: Vec<Scope>) -> Result<Self> {
        if scopes.is_empty() {
            return Err(Error::EmptyScopePath);
        }
        Ok(Self { scopes })
    }

    /// A single-level path.
    pub fn root(scope: Scope) -> Self {
        Self {
            scopes: vec![scope],
        }
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn root_scope(&self) -> &Scope {
        &self.scopes[0]
    }

    /// The defining scope of the addressed snapshot.
    pub fn last_scope(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    /// The path without its last scope, or `None` for a single-level path.
    pub fn parent_path(&self) -> Option<ScopePath> {
        if self.scopes.len() < 2 {
            return None;
        }
        Some(Self {
            scopes: self.scopes[..self.scopes.len() - 1].to_vec(),
        })
    }

    /// Append a scope below the current leaf.
    #[must_use]
    pub fn child(&self, scope: Scope) -> ScopePath {
        let mut scopes = self.scopes.clone();
        scopes.push(scope);
        Self { scopes }
    }

    /// First scope with the given name, searching root to leaf.
    pub fn find_scope_by_name(&self, name: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.name() == name)
    }

    /// Whether `prefix`'s scopes equal a leading sub-sequence of this path.
    pub fn starts_with(&self, prefix: &ScopePath) -> bool {
        self.scopes.starts_with(&prefix.scopes)
    }

    /// All prefixes from the single-root path up to and including this path.
    ///
    /// Used to fetch one snapshot per scope level, root first.
    pub fn ancestor_paths(&self) -> Vec<ScopePath> {
        (1..=self.scopes.len())
            .map(|n| Self {
                scopes: self.scopes[..n].to_vec(),
            })
            .collect()
    }
}

impl TryFrom<Vec<Scope>> for ScopePath {
    type Error = Error;

    fn try_from(scopes: Vec<Scope>) -> Result<Self> {
        Self::new(scopes)
    }
}

impl From<ScopePath> for Vec<Scope> {
    fn from(path: ScopePath) -> Self {
        path.scopes
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, scope) in self.scopes.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{scope}")?;
        }
        Ok(())
    }
}

impl FromStr for ScopePath {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let mut scopes = Vec::new();
        for segment in input.split('/') {
            scopes.push(parse_scope(input, segment.trim())?);
        }
        Self::new(scopes)
    }
}

fn parse_scope(input: &str, segment: &str) -> Result<Scope> {
    if segment.is_empty() {
        return Err(Error::invalid_path(input, "empty scope segment"));
    }

    let Some(open) = segment.find('[') else {
        return Scope::named(segment);
    };
    let Some(body) = segment[open + 1..].strip_suffix(']') else {
        return Err(Error::invalid_path(input, format!("unterminated '[' in '{segment}'")));
    };

    let mut properties = Vec::new();
    for pair in body.split(',').filter(|p| !p.trim().is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::invalid_path(input, format!("expected key=value, got '{pair}'")));
        };
        properties.push((key.trim().to_string(), value.trim().to_string()));
    }

    Scope::new(&segment[..open], properties)
}

/// Address of one persisted snapshot: the root configuration type plus the
/// scope path it is defined at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey {
    pub type_name: String,
    pub path: ScopePath,
}

impl ConfigKey {
    pub fn new(type_name: impl Into<String>, path: ScopePath) -> Self {
        Self {
            type_name: type_name.into(),
            path,
        }
    }

    /// The key of the same type one scope level up.
    pub fn parent(&self) -> Option<ConfigKey> {
        self.path
            .parent_path()
            .map(|path| ConfigKey::new(self.type_name.clone(), path))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.type_name, self.path)
    }
}
