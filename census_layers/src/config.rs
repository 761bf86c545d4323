// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

use crate::{LayerError, LayerResult};

/// The content of one spreadsheet cell, as read from a workbook.
///
/// Blank cells are kept as `Empty` rather than being dropped, so that every row
/// carries one entry per column of the header.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// True for empty cells and for text cells that only contain whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// The textual form of the cell. Integral numbers are written without a
    /// fractional part, so that `6001400100.0` and `"6001400100"` agree.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One row of a sheet: the column headers (taken from the first row of the sheet)
/// associated with the cell of this row, in column order.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn new(cells: Vec<(String, Cell)>) -> Row {
        Row { cells }
    }

    pub fn get(&self, header: &str) -> Option<&Cell> {
        self.cells.iter().find(|(h, _)| h == header).map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Cell)> {
        self.cells.iter()
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, c)| c.is_blank())
    }
}

// ******** Record data structures *********

/// The three layers stored for every census tract.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Demographics,
    Cdc,
    Spi,
}

impl LayerType {
    pub const ALL: [LayerType; 3] = [LayerType::Spi, LayerType::Cdc, LayerType::Demographics];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerType::Demographics => "demographics",
            LayerType::Cdc => "cdc",
            LayerType::Spi => "spi",
        }
    }
}

impl Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LayerType {
    type Err = LayerError;

    fn from_str(s: &str) -> LayerResult<LayerType> {
        LayerType::ALL
            .iter()
            .find(|lt| lt.as_str() == s)
            .copied()
            .ok_or_else(|| LayerError::InvalidLayerType {
                layer: s.to_string(),
            })
    }
}

/// An index metric: its value, and the annotations added by the rankings and
/// scorecards sheets.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpiMetric {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scorecard: Option<String>,
}

/// The index layer. Serialized as one object in which every metric key maps to a
/// `{value, ranking, scorecard}` triple, except `peerGroups` which maps to a list
/// of labels.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpiLayer {
    #[serde(
        rename = "peerGroups",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub peer_groups: Option<Vec<String>>,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, SpiMetric>,
}

/// All the data known for one census tract in one year.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GeographyRecord {
    #[serde(rename = "geoId")]
    pub geo_id: String,
    pub demographics: BTreeMap<String, f64>,
    pub cdc: BTreeMap<String, f64>,
    pub spi: SpiLayer,
}

impl GeographyRecord {
    pub fn new(geo_id: &str, demographics: BTreeMap<String, f64>) -> GeographyRecord {
        GeographyRecord {
            geo_id: geo_id.to_string(),
            demographics,
            cdc: BTreeMap::new(),
            spi: SpiLayer::default(),
        }
    }

    pub fn metric(&self, key: &str) -> Option<&SpiMetric> {
        self.spi.metrics.get(key)
    }
}

/// The baselayer of one year. It is built in full by a single ingestion and
/// never updated afterwards.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct YearSnapshot {
    pub year: i32,
    pub geographies: Vec<GeographyRecord>,
}

impl YearSnapshot {
    pub fn geography(&self, geo_id: &str) -> Option<&GeographyRecord> {
        self.geographies.iter().find(|g| g.geo_id == geo_id)
    }
}

/// A row of an overlay sheet, kept as-is.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OverlayRecord {
    #[serde(rename = "overlayType")]
    pub overlay_type: String,
    pub content: JSMap<String, JSValue>,
}

impl OverlayRecord {
    pub fn from_row(overlay_type: &str, row: &Row) -> OverlayRecord {
        let mut content: JSMap<String, JSValue> = JSMap::new();
        for (header, cell) in row.iter() {
            let v = match cell {
                Cell::Empty => JSValue::Null,
                Cell::Number(n) => serde_json::Number::from_f64(*n)
                    .map(JSValue::Number)
                    .unwrap_or(JSValue::Null),
                Cell::Text(s) => JSValue::String(s.clone()),
            };
            content.insert(header.clone(), v);
        }
        OverlayRecord {
            overlay_type: overlay_type.to_string(),
            content,
        }
    }
}

// ********* Configuration **********

/// What to do with a row of a later sheet whose geography id never appeared in
/// the demographics sheet.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Fail the ingestion.
    Reject,
    /// Log a warning and drop the row.
    Skip,
}

impl Default for OrphanPolicy {
    fn default() -> Self {
        OrphanPolicy::Reject
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_text_drops_integral_fraction() {
        assert_eq!(Cell::Number(6001400100.0).as_text(), "6001400100");
        assert_eq!(Cell::Number(62.3).as_text(), "62.3");
        assert_eq!(Cell::Text(" 06001400100 ".to_string()).as_text(), "06001400100");
        assert_eq!(Cell::Empty.as_text(), "");
    }

    #[test]
    fn layer_type_parsing() {
        assert_eq!("spi".parse::<LayerType>().unwrap(), LayerType::Spi);
        assert_eq!("cdc".parse::<LayerType>().unwrap(), LayerType::Cdc);
        assert!(matches!(
            "overlays".parse::<LayerType>(),
            Err(LayerError::InvalidLayerType { .. })
        ));
    }

    #[test]
    fn spi_layer_serializes_peer_groups_next_to_metrics() {
        let mut spi = SpiLayer::default();
        spi.metrics.insert(
            "spi".to_string(),
            SpiMetric {
                value: 62.3,
                ranking: Some(4),
                scorecard: Some("Expected".to_string()),
            },
        );
        spi.peer_groups = Some(vec!["A".to_string(), "B".to_string()]);
        let js = serde_json::to_value(&spi).unwrap();
        assert_eq!(
            js,
            serde_json::json!({
                "spi": {"value": 62.3, "ranking": 4, "scorecard": "Expected"},
                "peerGroups": ["A", "B"]
            })
        );
        let back: SpiLayer = serde_json::from_value(js).unwrap();
        assert_eq!(back, spi);
    }

    #[test]
    fn overlay_content_keeps_blank_cells() {
        let row = Row::new(vec![
            ("Name".to_string(), Cell::Text("Lake Park".to_string())),
            ("Acres".to_string(), Cell::Number(12.5)),
            ("Notes".to_string(), Cell::Empty),
        ]);
        let rec = OverlayRecord::from_row("parks", &row);
        assert_eq!(rec.overlay_type, "parks");
        assert_eq!(rec.content["Name"], "Lake Park");
        assert_eq!(rec.content["Acres"], 12.5);
        assert!(rec.content["Notes"].is_null());
    }
}
