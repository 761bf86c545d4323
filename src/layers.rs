use log::{debug, info, warn};

use census_layers::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command};
use crate::layers::config_reader::*;
use crate::layers::store::*;

pub mod baselayer;
pub mod config_reader;
pub mod io_workbook;
pub mod overlay;
pub mod store;

/// The store used when no `--store` path is given.
pub const DEFAULT_STORE_PATH: &str = "tractlayers.json";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TractError {
    #[snafu(display("Error opening workbook {name}: {source}"))]
    OpeningWorkbook {
        source: calamine::XlsxError,
        name: String,
    },
    #[snafu(display("Error reading sheet {sheet}: {source}"))]
    ReadingSheet {
        source: calamine::XlsxError,
        sheet: String,
    },
    #[snafu(display("Missing sheet {sheet}"))]
    MissingSheet { sheet: String },
    #[snafu(display("The following sheets are missing: {}", sheets.join(", ")))]
    MissingSheets { sheets: Vec<String> },

    #[snafu(display("Base layer already exists for {year}"))]
    DuplicateYear { year: i32 },
    #[snafu(display("{what} not found"))]
    NotFound { what: String },
    #[snafu(display("Invalid layer type {layer:?}"))]
    InvalidLayer { layer: String },
    #[snafu(display("{source}"))]
    Layers { source: LayerError },

    #[snafu(display("Error reading {path}: {source}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}: {source}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON in {path}: {source}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON: {source}"))]
    WritingJson { source: serde_json::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TractResult<T> = Result<T, TractError>;

fn read_input(path: &str) -> TractResult<(String, Vec<u8>)> {
    let bytes = fs::read(path).context(ReadingFileSnafu { path })?;
    let name = Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string();
    Ok((name, bytes))
}

fn to_js<T: serde::Serialize>(x: &T) -> TractResult<JSValue> {
    serde_json::to_value(x).context(WritingJsonSnafu {})
}

/// Runs one command against a store and returns its JSON output.
pub fn execute(
    config: &LayerConfig,
    store: &mut dyn DocumentStore,
    command: &Command,
) -> TractResult<JSValue> {
    debug!("execute: {:?}", command);
    match command {
        Command::Ingest { year, input } => {
            let (name, bytes) = read_input(input)?;
            let stored = baselayer::create_baselayer(config, store, *year, &name, bytes)?;
            to_js(&stored)
        }
        Command::List { year } => {
            let filter = SnapshotFilter { year: *year };
            to_js(&baselayer::list_baselayers(store, &filter)?)
        }
        Command::Show { year } => to_js(&baselayer::get_baselayer(store, *year)?),
        Command::Layer { year, layer } => to_js(&baselayer::get_layer(store, *year, layer)?),
        Command::Metric { year, layer, key } => {
            to_js(&baselayer::get_layer_key(store, *year, layer, key)?)
        }
        Command::Scorecard { year, geo_id } => {
            baselayer::get_scorecard(config, store, *year, geo_id)
        }
        Command::Delete { year } => {
            baselayer::delete_baselayer(store, *year)?;
            Ok(json!(format!("{} has been deleted.", year)))
        }
        Command::Dictionary => to_js(&baselayer::dictionary(config)),
        Command::OverlayTypes => to_js(&overlay::overlay_types(config)),
        Command::Overlays { overlay_type } => {
            to_js(&overlay::get_overlays(store, overlay_type)?)
        }
        Command::UploadOverlays { input } => {
            let (name, bytes) = read_input(input)?;
            to_js(&overlay::upload_overlays(config, store, &name, bytes)?)
        }
    }
}

fn write_output(pretty: &str, out: Option<&str>) -> TractResult<()> {
    match out {
        None | Some("stdout") => {
            println!("{}", pretty);
        }
        Some(path) => {
            info!("Writing output to {}", path);
            fs::write(path, pretty).context(WritingFileSnafu { path })?;
        }
    }
    Ok(())
}

fn check_reference(pretty: &str, reference_path: &str) -> TractResult<()> {
    let contents =
        fs::read_to_string(reference_path).context(ReadingFileSnafu { path: reference_path })?;
    let reference: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu {
        path: reference_path,
    })?;
    let pretty_reference = serde_json::to_string_pretty(&reference).context(WritingJsonSnafu {})?;
    if pretty_reference != pretty {
        warn!("Found differences with the reference {}", reference_path);
        print_diff(pretty_reference.as_str(), pretty, "\n");
        whatever!("Difference detected between the output and the reference {}", reference_path)
    }
    Ok(())
}

pub fn run(args: &Args) -> TractResult<()> {
    let config = read_config(args.config.as_deref())?;
    info!(
        "config: {} dictionary entries, {} overlay types",
        config.dictionary.len(),
        config.overlay_types.len()
    );
    let store_path = args.store.as_deref().unwrap_or(DEFAULT_STORE_PATH);
    let mut store = JsonFileStore::new(store_path);

    let result = execute(&config, &mut store, &args.command)?;
    let pretty = serde_json::to_string_pretty(&result).context(WritingJsonSnafu {})?;
    write_output(&pretty, args.out.as_deref())?;

    // The reference output, if provided for comparison
    if let Some(reference_path) = &args.reference {
        check_reference(&pretty, reference_path)?;
    }
    Ok(())
}
