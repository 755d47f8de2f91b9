use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{BenefitError, Result};

/// Procedure codes chosen for costing, in the order they were picked.
///
/// Toggle semantics: a code appears at most once, and toggling a selected code
/// removes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct SelectionSet {
    codes: Vec<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selection from an ordered list, rejecting blank and repeated codes.
    pub fn from_codes<I, S>(codes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut selection = Self::new();
        for code in codes {
            let code = code.into();
            if code.trim().is_empty() {
                return Err(BenefitError::validation("selection", "Procedure code cannot be empty"));
            }
            if !seen.insert(code.clone()) {
                return Err(BenefitError::validation(
                    "selection",
                    format!("Procedure {} selected more than once", code),
                ));
            }
            selection.codes.push(code);
        }
        Ok(selection)
    }

    /// Add the code if absent, remove it if present. Returns whether the code
    /// is selected afterwards.
    pub fn toggle(&mut self, code: &str) -> bool {
        if let Some(pos) = self.codes.iter().position(|c| c == code) {
            self.codes.remove(pos);
            false
        } else {
            self.codes.push(code.to_string());
            true
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn clear(&mut self) {
        self.codes.clear();
    }
}

impl TryFrom<Vec<String>> for SelectionSet {
    type Error = BenefitError;

    fn try_from(codes: Vec<String>) -> Result<Self> {
        Self::from_codes(codes)
    }
}

impl From<SelectionSet> for Vec<String> {
    fn from(selection: SelectionSet) -> Self {
        selection.codes
    }
}
