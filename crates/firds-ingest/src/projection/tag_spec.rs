//! Column declarations for the projection engine

use super::record::RecordTemplate;
use super::{ProjectionError, Result};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Columns extracted from FIRDS DLTINS reference data files
pub const DEFAULT_TAGS: [&str; 6] = [
    "FinInstrmGnlAttrbts.Id",
    "FinInstrmGnlAttrbts.FullNm",
    "FinInstrmGnlAttrbts.ClssfctnTp",
    "FinInstrmGnlAttrbts.CmmdtyDerivInd",
    "FinInstrmGnlAttrbts.NtnlCcy",
    "Issr",
];

/// Ordered, unique set of tag keys defining the output columns
///
/// A key is either a bare tag (`Issr`) or a `Parent.Child` path. Deeper paths
/// are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    keys: Vec<String>,
    bare: HashMap<String, usize>,
    // parent -> child -> column
    compound: HashMap<String, HashMap<String, usize>>,
}

impl TagSpec {
    /// Build a spec from keys in column order
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = Self {
            keys: Vec::new(),
            bare: HashMap::new(),
            compound: HashMap::new(),
        };

        for key in keys {
            spec.push(key.into())?;
        }

        if spec.keys.is_empty() {
            return Err(ProjectionError::InvalidTagSpec(
                "at least one tag is required".to_string(),
            ));
        }

        Ok(spec)
    }

    /// The DLTINS column set (see [`DEFAULT_TAGS`])
    #[allow(clippy::expect_used)]
    pub fn firds_default() -> Self {
        Self::new(DEFAULT_TAGS).expect("default tags are valid")
    }

    fn push(&mut self, key: String) -> Result<()> {
        let column = self.keys.len();

        match key.split_once('.') {
            None => {
                if key.trim().is_empty() {
                    return Err(ProjectionError::InvalidTagSpec("empty tag".to_string()));
                }
                if self.bare.insert(key.clone(), column).is_some() {
                    return Err(ProjectionError::InvalidTagSpec(format!("duplicate tag '{}'", key)));
                }
            },
            Some((parent, child)) => {
                if parent.is_empty() || child.is_empty() || child.contains('.') {
                    return Err(ProjectionError::InvalidTagSpec(format!(
                        "'{}' must be a bare tag or a Parent.Child path",
                        key
                    )));
                }
                let children = self.compound.entry(parent.to_string()).or_default();
                if children.insert(child.to_string(), column).is_some() {
                    return Err(ProjectionError::InvalidTagSpec(format!("duplicate tag '{}'", key)));
                }
            },
        }

        self.keys.push(key);
        Ok(())
    }

    /// Keys in column order; also the CSV header
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Candidate record-boundary tags: each bare key, or the parent of a path
    pub fn main_tags(&self) -> HashSet<&str> {
        self.keys
            .iter()
            .map(|key| key.split_once('.').map_or(key.as_str(), |(parent, _)| parent))
            .collect()
    }

    /// Column of a bare key equal to `tag`
    pub fn bare_column(&self, tag: &str) -> Option<usize> {
        self.bare.get(tag).copied()
    }

    /// Column of the `parent.child` key
    pub fn compound_column(&self, parent: &str, child: &str) -> Option<usize> {
        self.compound.get(parent)?.get(child).copied()
    }

    /// An all-empty record with one slot per key
    pub fn template(&self) -> RecordTemplate {
        RecordTemplate::new(self.keys.len())
    }
}

impl Default for TagSpec {
    fn default() -> Self {
        Self::firds_default()
    }
}

impl FromStr for TagSpec {
    type Err = ProjectionError;

    /// Parse a comma-separated key list, e.g. `"Parent.Id,Issr"`
    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.split(',').map(str::trim).filter(|key| !key.is_empty()))
    }
}
