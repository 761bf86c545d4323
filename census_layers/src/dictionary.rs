use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::LayerType;

/// One entry of the field dictionary: the column title used in the spreadsheets
/// of a layer, and the canonical key it is stored under.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FieldEntry {
    #[serde(rename = "layerType")]
    pub layer_type: LayerType,
    #[serde(rename = "contentKey")]
    pub content_key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The read-only lookup table from `(layer, column title)` to canonical field.
///
/// Entries keep the order in which they were declared, which is also the order
/// in which they are served for labeling.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<FieldEntry>", into = "Vec<FieldEntry>")]
pub struct FieldDictionary {
    entries: Vec<FieldEntry>,
    index: HashMap<(LayerType, String), usize>,
}

impl FieldDictionary {
    pub fn new(entries: Vec<FieldEntry>) -> FieldDictionary {
        let mut index: HashMap<(LayerType, String), usize> = HashMap::new();
        for (idx, e) in entries.iter().enumerate() {
            // The first declaration wins, as in a linear scan.
            index.entry((e.layer_type, e.title.clone())).or_insert(idx);
        }
        FieldDictionary { entries, index }
    }

    pub fn lookup(&self, layer_type: LayerType, title: &str) -> Option<&FieldEntry> {
        self.index
            .get(&(layer_type, title.to_string()))
            .and_then(|idx| self.entries.get(*idx))
    }

    pub fn entries(&self) -> &[FieldEntry] {
        &self.entries
    }

    pub fn layer_entries(&self, layer_type: LayerType) -> impl Iterator<Item = &FieldEntry> {
        self.entries
            .iter()
            .filter(move |e| e.layer_type == layer_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<FieldEntry>> for FieldDictionary {
    fn from(entries: Vec<FieldEntry>) -> Self {
        FieldDictionary::new(entries)
    }
}

impl From<FieldDictionary> for Vec<FieldEntry> {
    fn from(d: FieldDictionary) -> Self {
        d.entries
    }
}
