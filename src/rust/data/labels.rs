use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::error::EvalError;

/// Bidirectional mapping between class names and dense ids in `[0, num_classes)`.
///
/// Ids are assigned in order of first appearance, so the same corpus always yields
/// the same mapping. The mapping never changes once built; persist it with
/// [`ClassLabelMapping::save_json`] to decode predictions later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelMapping {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl ClassLabelMapping {
    /// Builds the mapping from an iterator of (possibly repeated) class names.
    ///
    /// # Example
    /// ```
    /// use finetune_eval::ClassLabelMapping;
    ///
    /// let mapping = ClassLabelMapping::from_labels(["spam", "ham", "spam"]);
    /// assert_eq!(mapping.id("ham"), Some(1));
    /// assert_eq!(mapping.name(0), Some("spam"));
    /// ```
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = Vec::new();
        let mut ids = HashMap::new();
        for label in labels {
            let label = label.as_ref();
            if !ids.contains_key(label) {
                ids.insert(label.to_string(), names.len());
                names.push(label.to_string());
            }
        }
        Self { names, ids }
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Class names ordered by id
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Writes the mapping as `{"0": "name", "1": "other", ...}`.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), EvalError> {
        let map: BTreeMap<String, &str> = self
            .names
            .iter()
            .enumerate()
            .map(|(id, name)| (id.to_string(), name.as_str()))
            .collect();
        fs::write(path, serde_json::to_string(&map)?)?;
        Ok(())
    }

    /// Reads a mapping written by [`ClassLabelMapping::save_json`].
    ///
    /// The ids must be exactly `0..n`; gaps or duplicates are rejected.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let raw: HashMap<String, String> = serde_json::from_str(&fs::read_to_string(path)?)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (key, name) in raw {
            let id: usize = key
                .parse()
                .map_err(|_| EvalError::Serialization(format!("Invalid class id '{}'", key)))?;
            entries.push((id, name));
        }
        entries.sort_by_key(|(id, _)| *id);

        if entries.iter().enumerate().any(|(expected, (id, _))| *id != expected) {
            return Err(EvalError::Serialization(
                "Class ids must be dense and start at 0".into(),
            ));
        }
        let mapping = Self::from_labels(entries.iter().map(|(_, name)| name.as_str()));
        if mapping.len() != entries.len() {
            return Err(EvalError::Serialization("Duplicate class names in mapping".into()));
        }
        Ok(mapping)
    }
}
