use std::collections::BTreeMap;

use log::debug;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::config::{format_number, Cell, Row};
use crate::dictionary::FieldDictionary;
use crate::sheet::SheetKind;
use crate::*;

/// The scorecard category used when a scorecard cell is left blank.
pub const DEFAULT_SCORECARD: &str = "Expected";

/// The canonical attributes read from one row, as they will be merged into the
/// record of the row's geography.
#[derive(PartialEq, Debug, Clone)]
pub enum SheetValues {
    /// Demographics and cdc indicators.
    Numbers(BTreeMap<String, f64>),
    /// Index metric values.
    Values(BTreeMap<String, f64>),
    Rankings(BTreeMap<String, i64>),
    Scorecards(BTreeMap<String, String>),
    PeerGroups(Vec<String>),
}

/// A row that went through the dictionary. The identifier column is not part
/// of the values: it is the key of the row.
#[derive(PartialEq, Debug, Clone)]
pub struct NormalizedRow {
    pub geo_id: String,
    pub values: SheetValues,
}

/// Converts the raw rows of a sheet into canonical attributes.
pub struct Normalizer<'a> {
    pub dictionary: &'a FieldDictionary,
    /// The header of the column holding the geography id, in every sheet.
    pub identifier_column: &'a str,
    /// The header of the column holding the peer groups in the peer groups sheet.
    pub peer_group_column: &'a str,
}

impl<'a> Normalizer<'a> {
    pub fn normalize_sheet(&self, kind: SheetKind, rows: &[Row]) -> LayerResult<Vec<NormalizedRow>> {
        debug!("normalize_sheet: {}: {} rows", kind, rows.len());
        rows.iter()
            .enumerate()
            // Row 1 is the header of the sheet.
            .map(|(idx, row)| self.normalize_row(kind, idx + 2, row))
            .collect()
    }

    pub fn normalize_row(&self, kind: SheetKind, lineno: usize, row: &Row) -> LayerResult<NormalizedRow> {
        let sheet = kind.sheet_name();
        let mut geo_id: Option<String> = None;
        let mut numbers: BTreeMap<String, f64> = BTreeMap::new();
        let mut rankings: BTreeMap<String, i64> = BTreeMap::new();
        let mut scorecards: BTreeMap<String, String> = BTreeMap::new();
        let mut peer_groups: Vec<String> = Vec::new();

        for (header, cell) in row.iter() {
            if header == self.identifier_column {
                geo_id = Some(cell.as_text());
                continue;
            }
            if kind == SheetKind::SpiPeerGroups {
                ensure!(
                    header == self.peer_group_column,
                    UnknownFieldSnafu { sheet, header }
                );
                peer_groups = match cell {
                    Cell::Empty => vec![],
                    Cell::Number(n) => vec![format_number(*n)],
                    Cell::Text(s) => parse_peer_groups(s)?,
                };
                continue;
            }
            let entry = self
                .dictionary
                .lookup(kind.layer_type(), header)
                .context(UnknownFieldSnafu { sheet, header })?;
            let key = entry.content_key.clone();
            match kind {
                SheetKind::SpiRankings => {
                    rankings.insert(key, read_integer(cell, sheet, header, lineno)?);
                }
                SheetKind::SpiScorecards => {
                    scorecards.insert(key, read_category(cell));
                }
                _ => {
                    numbers.insert(key, read_number(cell, sheet, header, lineno)?);
                }
            }
        }

        let geo_id = geo_id
            .filter(|s| !s.is_empty())
            .context(MissingIdentifierSnafu {
                sheet,
                column: self.identifier_column,
                lineno,
            })?;

        let values = match kind {
            SheetKind::Demographics | SheetKind::Cdc => SheetValues::Numbers(numbers),
            SheetKind::SpiValues => SheetValues::Values(numbers),
            SheetKind::SpiRankings => SheetValues::Rankings(rankings),
            SheetKind::SpiScorecards => SheetValues::Scorecards(scorecards),
            SheetKind::SpiPeerGroups => SheetValues::PeerGroups(peer_groups),
        };
        Ok(NormalizedRow { geo_id, values })
    }
}

// Blank cells count as zero. Non-finite values cannot be stored.
fn read_number(cell: &Cell, sheet: &str, header: &str, lineno: usize) -> LayerResult<f64> {
    let x = match cell {
        Cell::Empty => 0.0,
        Cell::Number(n) => *n,
        Cell::Text(s) if s.trim().is_empty() => 0.0,
        Cell::Text(s) => s.trim().parse::<f64>().ok().context(InvalidNumberSnafu {
            sheet,
            header,
            lineno,
            content: s,
        })?,
    };
    ensure!(
        x.is_finite(),
        InvalidNumberSnafu {
            sheet,
            header,
            lineno,
            content: cell.as_text(),
        }
    );
    Ok(x)
}

// Rankings are truncated towards zero.
fn read_integer(cell: &Cell, sheet: &str, header: &str, lineno: usize) -> LayerResult<i64> {
    let x = read_number(cell, sheet, header, lineno)?;
    Ok(x.trunc() as i64)
}

fn read_category(cell: &Cell) -> String {
    if cell.is_blank() {
        DEFAULT_SCORECARD.to_string()
    } else {
        cell.as_text()
    }
}

/// Parses the content of a peer group cell: comma-separated tokens without any
/// surrounding brackets, such as `A,B,C` or `3, 7`.
///
/// Every token must be non-empty. A token may already be a quoted string, bare
/// tokens are quoted before the list is parsed.
pub fn parse_peer_groups(input: &str) -> LayerResult<Vec<String>> {
    if input.trim().is_empty() {
        return Ok(vec![]);
    }
    let mut tokens: Vec<String> = Vec::new();
    for token in input.split(',').map(|t| t.trim()) {
        ensure!(
            !token.is_empty(),
            MalformedPeerGroupSnafu {
                content: input,
                reason: "empty element",
            }
        );
        if token.starts_with('"') {
            tokens.push(token.to_string());
        } else {
            tokens.push(format!("\"{}\"", token.replace('\\', "\\\\").replace('"', "\\\"")));
        }
    }
    let formatted = format!("[{}]", tokens.join(", "));
    debug!("parse_peer_groups: {:?} -> {}", input, formatted);

    let parsed: Vec<JSValue> = match serde_json::from_str(&formatted) {
        Ok(x) => x,
        Err(e) => {
            return MalformedPeerGroupSnafu {
                content: input,
                reason: e.to_string(),
            }
            .fail()
        }
    };
    parsed
        .into_iter()
        .map(|v| match v {
            JSValue::String(s) => Ok(s),
            JSValue::Number(n) => Ok(n.to_string()),
            other => MalformedPeerGroupSnafu {
                content: input,
                reason: format!("unexpected element {}", other),
            }
            .fail(),
        })
        .collect()
}
