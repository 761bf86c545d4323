use clap::{Parser, Subcommand};

/// This is a program to ingest and query census tract data: yearly baselayers
/// (demographics, health and social progress index) and geographic overlays.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The configuration in JSON format: the field dictionary, the overlay types and
    /// the scorecard layout. If not provided, the configuration shipped with the program is used.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// (file path, default tractlayers.json) The JSON file that holds the stored baselayers and overlays.
    /// It is created by the first command that stores something.
    #[clap(short, long, value_parser, global = true)]
    pub store: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the output of the command will be written in JSON format
    /// to the given location instead of the standard output.
    #[clap(short, long, value_parser, global = true)]
    pub out: Option<String>,

    /// (file path) A reference file containing the expected output in JSON format. If provided, the program
    /// will check that the output matches the reference.
    #[clap(short, long, value_parser, global = true)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Ingests the baselayer workbook of a year. The workbook must contain the sheets demographics, cdc,
    /// spi-values, spi-rankings, spi-scorecards and spi-peer-groups.
    Ingest {
        #[clap(value_parser)]
        year: i32,
        /// (file path) The workbook (.xlsx)
        #[clap(short, long, value_parser)]
        input: String,
    },
    /// Lists the stored baselayers.
    List {
        /// Only lists the baselayer of this year.
        #[clap(long, value_parser)]
        year: Option<i32>,
    },
    /// Shows the baselayer of a year.
    Show {
        #[clap(value_parser)]
        year: i32,
    },
    /// Shows one layer (spi, cdc or demographics) of every census tract of a year.
    Layer {
        #[clap(value_parser)]
        year: i32,
        #[clap(value_parser)]
        layer: String,
    },
    /// Shows one field of one layer for every census tract of a year.
    Metric {
        #[clap(value_parser)]
        year: i32,
        #[clap(value_parser)]
        layer: String,
        #[clap(value_parser)]
        key: String,
    },
    /// Shows the scorecard of a census tract, compared with the previous year.
    Scorecard {
        #[clap(value_parser)]
        year: i32,
        #[clap(value_parser)]
        geo_id: String,
    },
    /// Deletes the baselayer of a year.
    Delete {
        #[clap(value_parser)]
        year: i32,
    },
    /// Shows the field dictionary.
    Dictionary,
    /// Shows the overlay types.
    OverlayTypes,
    /// Shows the overlays of one type.
    Overlays {
        #[clap(value_parser)]
        overlay_type: String,
    },
    /// Replaces all the overlays with the content of a workbook that has one sheet per overlay type.
    UploadOverlays {
        /// (file path) The workbook (.xlsx)
        #[clap(short, long, value_parser)]
        input: String,
    },
}
