use crate::layers::io_workbook::open_workbook_bytes;
use crate::layers::*;

/// The overlay types, one sheet per type in an overlay workbook.
pub fn overlay_types(config: &LayerConfig) -> &[String] {
    &config.overlay_types
}

pub fn get_overlays(
    store: &dyn DocumentStore,
    overlay_type: &str,
) -> TractResult<Vec<Stored<OverlayRecord>>> {
    store.find_overlays(overlay_type)
}

/// Replaces all the overlays with the content of the workbook.
///
/// Every row of every overlay sheet becomes one record, its columns kept as-is.
/// The previous overlays are only deleted once the whole workbook was read.
pub fn upload_overlays(
    config: &LayerConfig,
    store: &mut dyn DocumentStore,
    name: &str,
    bytes: Vec<u8>,
) -> TractResult<Vec<Stored<OverlayRecord>>> {
    let mut workbook = open_workbook_bytes(name, bytes)?;
    workbook.check_sheets(&config.overlay_types)?;

    let mut overlays: Vec<OverlayRecord> = Vec::new();
    for overlay_type in config.overlay_types.iter() {
        let rows = workbook.read_rows(overlay_type)?;
        debug!("upload_overlays: {}: {} rows", overlay_type, rows.len());
        overlays.extend(rows.iter().map(|r| OverlayRecord::from_row(overlay_type, r)));
    }

    store.delete_all_overlays()?;
    let stored = store.insert_overlays(overlays)?;
    info!("upload_overlays: {}: {} overlays", name, stored.len());
    Ok(stored)
}
