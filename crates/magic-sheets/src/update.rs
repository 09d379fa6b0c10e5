//! Cell updates proposed by users, tools and analysis runs

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Assignment of a formula or literal to one cell reference
///
/// `formula` starting with `=` is evaluated; anything else is stored as a
/// literal. `target` is not validated until the update is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellUpdate {
    pub formula: String,
    pub target: String,
}

impl CellUpdate {
    pub fn new<T: Into<String>, F: Into<String>>(target: T, formula: F) -> Self {
        Self {
            formula: formula.into(),
            target: target.into(),
        }
    }

    /// Whether the assignment goes through the formula engine
    pub fn is_formula(&self) -> bool {
        self.formula.starts_with('=')
    }
}

impl fmt::Display for CellUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.formula)
    }
}

/// Reject a batch that assigns the same target more than once
pub fn ensure_unique_targets(updates: &[CellUpdate]) -> Result<()> {
    let mut seen = HashSet::with_capacity(updates.len());
    for update in updates {
        if !seen.insert(update.target.as_str()) {
            return Err(SessionError::DuplicateTarget(update.target.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let update: CellUpdate =
            serde_json::from_str(r#"{"formula":"=B1 * 0.08","target":"B2"}"#).unwrap();
        assert_eq!(update, CellUpdate::new("B2", "=B1 * 0.08"));
        assert!(update.is_formula());
        assert_eq!(update.to_string(), "B2: =B1 * 0.08");
    }

    #[test]
    fn test_duplicate_targets() {
        let batch = vec![
            CellUpdate::new("A1", "1"),
            CellUpdate::new("B1", "2"),
            CellUpdate::new("A1", "3"),
        ];
        assert!(matches!(
            ensure_unique_targets(&batch),
            Err(SessionError::DuplicateTarget(target)) if target == "A1"
        ));
        assert!(ensure_unique_targets(&batch[..2]).is_ok());
    }
}
