use std::collections::HashMap;

use crate::layers::io_workbook::open_workbook_bytes;
use crate::layers::*;

use serde::Serialize;
use snafu::prelude::*;

const GEO_ID_TYPE: &str = "CENSUS_TRACT";

/// One layer of one geography, as served by the layer listings.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct LayerEntry {
    #[serde(rename = "geoId")]
    pub geo_id: String,
    #[serde(rename = "geoIdType")]
    pub geo_id_type: &'static str,
    #[serde(rename = "layerType")]
    pub layer_type: LayerType,
    pub content: JSValue,
}

fn parse_layer(layer: &str) -> TractResult<LayerType> {
    layer.parse::<LayerType>().ok().context(InvalidLayerSnafu { layer })
}

fn find_year(store: &dyn DocumentStore, year: i32) -> TractResult<Stored<YearSnapshot>> {
    store.find_by_year(year)?.context(NotFoundSnafu {
        what: format!("Baselayer for {}", year),
    })
}

pub fn list_baselayers(
    store: &dyn DocumentStore,
    filter: &SnapshotFilter,
) -> TractResult<Vec<Stored<YearSnapshot>>> {
    store.find_all(filter)
}

pub fn get_baselayer(store: &dyn DocumentStore, year: i32) -> TractResult<Stored<YearSnapshot>> {
    find_year(store, year)
}

/// The content of one layer for every geography of a year.
pub fn get_layer(store: &dyn DocumentStore, year: i32, layer: &str) -> TractResult<Vec<LayerEntry>> {
    let layer_type = parse_layer(layer)?;
    let snapshot = find_year(store, year)?;
    snapshot
        .doc
        .geographies
        .iter()
        .map(|g| -> TractResult<LayerEntry> {
            let content = match layer_type {
                LayerType::Demographics => serde_json::to_value(&g.demographics),
                LayerType::Cdc => serde_json::to_value(&g.cdc),
                LayerType::Spi => serde_json::to_value(&g.spi),
            }
            .context(WritingJsonSnafu {})?;
            Ok(LayerEntry {
                geo_id: g.geo_id.clone(),
                geo_id_type: GEO_ID_TYPE,
                layer_type,
                content,
            })
        })
        .collect()
}

/// One field of one layer for every geography of a year. For the index layer,
/// the field is the value of the metric. Absent fields are null.
pub fn get_layer_key(
    store: &dyn DocumentStore,
    year: i32,
    layer: &str,
    key: &str,
) -> TractResult<Vec<LayerEntry>> {
    let layer_type = parse_layer(layer)?;
    let snapshot = find_year(store, year)?;
    let res = snapshot
        .doc
        .geographies
        .iter()
        .map(|g| {
            let value = match layer_type {
                LayerType::Demographics => g.demographics.get(key).copied(),
                LayerType::Cdc => g.cdc.get(key).copied(),
                LayerType::Spi => g.metric(key).map(|m| m.value),
            };
            LayerEntry {
                geo_id: g.geo_id.clone(),
                geo_id_type: GEO_ID_TYPE,
                layer_type,
                content: json!({ "value": value }),
            }
        })
        .collect();
    Ok(res)
}

/// The scorecard of a tract, compared with the previous year.
///
/// Both years must have been ingested, and the tract must exist in `year`. A
/// tract that did not exist the year before only has N/A deltas.
pub fn get_scorecard(
    config: &LayerConfig,
    store: &dyn DocumentStore,
    year: i32,
    geo_id: &str,
) -> TractResult<JSValue> {
    let current = find_year(store, year)?;
    let previous = find_year(store, year - 1)?;
    let current_tract = current.doc.geography(geo_id).context(NotFoundSnafu {
        what: format!("Census tract {} in {}", geo_id, year),
    })?;
    let previous_tract = previous.doc.geography(geo_id);
    if previous_tract.is_none() {
        info!("get_scorecard: {} is not in {}", geo_id, year - 1);
    }
    build_scorecard(&config.scorecard, current_tract, previous_tract).context(LayersSnafu {})
}

/// Ingests the workbook of a year. Nothing is stored unless every sheet could
/// be read and merged.
pub fn create_baselayer(
    config: &LayerConfig,
    store: &mut dyn DocumentStore,
    year: i32,
    name: &str,
    bytes: Vec<u8>,
) -> TractResult<Stored<YearSnapshot>> {
    ensure!(store.find_by_year(year)?.is_none(), DuplicateYearSnafu { year });

    let mut workbook = open_workbook_bytes(name, bytes)?;
    workbook.check_sheets(&baselayer_sheet_names())?;

    let mut sheets: HashMap<SheetKind, Vec<Row>> = HashMap::new();
    for kind in SheetKind::PIPELINE {
        let rows = workbook.read_rows(kind.sheet_name())?;
        sheets.insert(kind, rows);
    }
    let snapshot = build_snapshot(year, &config.normalizer(), config.orphan_rows, &sheets)
        .context(LayersSnafu {})?;
    info!(
        "create_baselayer: {}: {} geographies for {}",
        name,
        snapshot.geographies.len(),
        year
    );
    store.insert(snapshot)
}

pub fn delete_baselayer(store: &mut dyn DocumentStore, year: i32) -> TractResult<()> {
    let snapshot = find_year(store, year)?;
    store.delete_by_id(snapshot.id)?;
    info!("delete_baselayer: deleted {} (id {})", year, snapshot.id);
    Ok(())
}

/// The field dictionary, for labeling.
pub fn dictionary(config: &LayerConfig) -> &[FieldEntry] {
    config.dictionary.entries()
}
