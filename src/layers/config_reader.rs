use crate::layers::*;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

const DEFAULT_CONFIG: &str = include_str!("../../data/default_config.json");

fn default_identifier_column() -> String {
    "Census Tract".to_string()
}

fn default_peer_group_column() -> String {
    "Census Tract Peer Group".to_string()
}

/// The reference data of the ingestion: how the sheets are titled, and what the
/// scorecard looks like. Loaded once, then only read.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(rename = "identifierColumn", default = "default_identifier_column")]
    pub identifier_column: String,
    #[serde(rename = "peerGroupColumn", default = "default_peer_group_column")]
    pub peer_group_column: String,
    pub dictionary: FieldDictionary,
    #[serde(rename = "overlayTypes", default)]
    pub overlay_types: Vec<String>,
    #[serde(default = "default_schema")]
    pub scorecard: Vec<ScorecardNode>,
    #[serde(rename = "orphanRows", default)]
    pub orphan_rows: OrphanPolicy,
}

impl LayerConfig {
    pub fn normalizer(&self) -> Normalizer<'_> {
        Normalizer {
            dictionary: &self.dictionary,
            identifier_column: &self.identifier_column,
            peer_group_column: &self.peer_group_column,
        }
    }
}

fn parse_config(contents: &str, path: &str) -> TractResult<LayerConfig> {
    let config: LayerConfig =
        serde_json::from_str(contents).context(ParsingJsonSnafu { path })?;
    if config.identifier_column.trim().is_empty() {
        whatever!("{}: identifierColumn may not be empty", path);
    }
    debug!(
        "parse_config: {}: identifier column {:?}, orphan rows {:?}",
        path, config.identifier_column, config.orphan_rows
    );
    Ok(config)
}

/// The configuration shipped with the program.
pub fn default_config() -> TractResult<LayerConfig> {
    parse_config(DEFAULT_CONFIG, "<default config>")
}

/// Reads the configuration file at `path`, or the default one.
pub fn read_config(path: Option<&str>) -> TractResult<LayerConfig> {
    match path {
        None => default_config(),
        Some(p) => {
            info!("Reading configuration {}", p);
            let contents = fs::read_to_string(p).context(ReadingFileSnafu { path: p })?;
            parse_config(&contents, p)
        }
    }
}
