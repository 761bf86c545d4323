//! Census tract layers: reading the sheets of a yearly baselayer workbook into
//! one record per tract, and comparing the index metrics of a tract across two
//! years.
//!
//! The crate does not read files. It works on rows of [`Cell`]s that are
//! produced by a workbook reader, and on records that are persisted by a
//! document store.

mod config;
pub mod compare;
pub mod dictionary;
pub mod merge;
pub mod normalize;
pub mod scorecard;
pub mod sheet;

use snafu::prelude::*;

pub use crate::compare::{compare_rank, compare_years, Comparison, Performance, RankDelta};
pub use crate::config::*;
pub use crate::dictionary::{FieldDictionary, FieldEntry};
pub use crate::merge::build_snapshot;
pub use crate::normalize::Normalizer;
pub use crate::scorecard::{build_scorecard, default_schema, ScorecardNode};
pub use crate::sheet::{baselayer_sheet_names, find_missing_sheets, SheetKind};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LayerError {
    #[snafu(display("Unknown layer type {layer:?}: expected one of spi, cdc, demographics"))]
    InvalidLayerType { layer: String },

    #[snafu(display("Unknown field in {sheet}: {header:?}"))]
    UnknownField { sheet: String, header: String },
    #[snafu(display("Missing identifier in {sheet}, line {lineno}: column {column:?} is blank"))]
    MissingIdentifier {
        sheet: String,
        column: String,
        lineno: usize,
    },
    #[snafu(display("Invalid number in {sheet}, line {lineno}, column {header:?}: {content:?}"))]
    InvalidNumber {
        sheet: String,
        header: String,
        lineno: usize,
        content: String,
    },
    #[snafu(display("Malformed peer groups {content:?}: {reason}"))]
    MalformedPeerGroup { content: String, reason: String },

    #[snafu(display("{sheet}: no value for {key} in geography {geo_id}"))]
    MissingValue {
        sheet: String,
        geo_id: String,
        key: String,
    },
    #[snafu(display("{sheet}: geography {geo_id} is not in the demographics sheet"))]
    MissingRecord { sheet: String, geo_id: String },
    #[snafu(display("Cannot merge {stage} before {missing}"))]
    StageOrder { stage: String, missing: String },
    #[snafu(display("Sheet {stage} was already merged"))]
    StageRepeated { stage: String },
    #[snafu(display("No rows were provided for sheet {sheet}"))]
    MissingSheet { sheet: String },

    #[snafu(display("Cannot compare {key}: {message}"))]
    Computation { key: String, message: String },
    #[snafu(display("Error serializing a scorecard: {source}"))]
    Serializing { source: serde_json::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type LayerResult<T> = Result<T, LayerError>;
