use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Configured label to class-index table used when rendering `class_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassMap {
    entries: BTreeMap<String, u32>,
}

impl ClassMap {
    pub fn new(entries: BTreeMap<String, u32>) -> Self {
        Self { entries }
    }

    /// Parse `label=index,label=index`.
    pub fn parse(value: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (label, index) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("class map entry '{}' is not label=index", pair))?;
            let label = label.trim();
            if label.is_empty() {
                return Err(anyhow!("class map entry '{}' has an empty label", pair));
            }
            let index: u32 = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("class map entry '{}' has a non-numeric index", pair))?;
            entries.insert(label.to_string(), index);
        }
        if entries.is_empty() {
            return Err(anyhow!("class map is empty"));
        }
        Ok(Self { entries })
    }

    pub fn index_of(&self, label: &str) -> Option<u32> {
        self.entries.get(label).copied()
    }

    /// `"{index}-{label}"`, or `None` when the label is not configured.
    pub fn class_id(&self, label: &str) -> Option<String> {
        self.index_of(label).map(|index| format!("{}-{}", index, label))
    }

    /// Labels ordered by their index.
    pub fn labels_by_index(&self) -> Vec<String> {
        let mut pairs: Vec<(&String, &u32)> = self.entries.iter().collect();
        pairs.sort_by_key(|(label, index)| (**index, (*label).clone()));
        pairs.into_iter().map(|(label, _)| label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ClassMap {
    fn default() -> Self {
        let entries = [
            ("hole", 0),
            ("broken", 1),
            ("rusty", 2),
            ("scratch", 3),
            ("sd", 4),
            ("hd", 5),
            ("vd", 6),
        ]
        .into_iter()
        .map(|(label, index)| (label.to_string(), index))
        .collect();
        Self { entries }
    }
}
