use std::io::Cursor;

use calamine::{DataType, Reader, Xlsx};
use census_layers::{Cell, Row};
use log::{debug, warn};
use snafu::prelude::*;

use crate::layers::*;

/// A workbook opened from an in-memory buffer.
pub struct Workbook {
    name: String,
    inner: Xlsx<Cursor<Vec<u8>>>,
}

impl std::fmt::Debug for Workbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbook").field("name", &self.name).finish()
    }
}

/// Opens a workbook. `name` is only used in messages.
pub fn open_workbook_bytes(name: &str, bytes: Vec<u8>) -> TractResult<Workbook> {
    debug!("open_workbook_bytes: {}: {} bytes", name, bytes.len());
    let inner: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).context(OpeningWorkbookSnafu { name })?;
    Ok(Workbook {
        name: name.to_string(),
        inner,
    })
}

impl Workbook {
    pub fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names().to_vec()
    }

    /// Fails with the full list of missing sheets, in the order of `required`.
    pub fn check_sheets(&self, required: &[String]) -> TractResult<()> {
        if let Some(sheets) = find_missing_sheets(&self.sheet_names(), required) {
            return MissingSheetsSnafu { sheets }.fail();
        }
        Ok(())
    }

    /// The rows of a sheet below its header row. Each row holds one cell per
    /// column, blank cells included. A column without a title is only left out
    /// when all its cells are blank. Fully blank rows are not returned.
    pub fn read_rows(&mut self, sheet: &str) -> TractResult<Vec<Row>> {
        let wrange = self
            .inner
            .worksheet_range(sheet)
            .context(MissingSheetSnafu { sheet })?
            .context(ReadingSheetSnafu { sheet })?;

        let mut iter = wrange.rows();
        let header: Vec<String> = match iter.next() {
            Some(h) => h.iter().map(|c| read_cell(sheet, c).as_text()).collect(),
            None => {
                debug!("read_rows: {}: empty sheet", sheet);
                return Ok(vec![]);
            }
        };
        debug!("read_rows: {}: header: {:?}", sheet, header);

        let data: Vec<Vec<Cell>> = iter
            .map(|r| r.iter().map(|c| read_cell(sheet, c)).collect())
            .collect();
        let columns: Vec<usize> = (0..header.len())
            .filter(|&idx| {
                !header[idx].is_empty()
                    || data
                        .iter()
                        .any(|r| r.get(idx).map_or(false, |c| !c.is_blank()))
            })
            .collect();
        if columns.len() < header.len() {
            debug!(
                "read_rows: {}: {} blank untitled columns left out",
                sheet,
                header.len() - columns.len()
            );
        }

        let mut res: Vec<Row> = Vec::new();
        for cells in data {
            let row = Row::new(
                columns
                    .iter()
                    .map(|&idx| {
                        let cell = cells.get(idx).cloned().unwrap_or(Cell::Empty);
                        (header[idx].clone(), cell)
                    })
                    .collect(),
            );
            if row.is_blank() {
                continue;
            }
            res.push(row);
        }
        debug!("read_rows: {}: {} rows", sheet, res.len());
        Ok(res)
    }
}

fn read_cell(sheet: &str, cell: &DataType) -> Cell {
    match cell {
        DataType::Empty => Cell::Empty,
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::DateTime(f) => Cell::Number(*f),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        DataType::Error(e) => {
            warn!("read_cell: {}: error cell {:?} read as empty", sheet, e);
            Cell::Empty
        }
        #[allow(unreachable_patterns)]
        other => Cell::Text(other.to_string()),
    }
}
