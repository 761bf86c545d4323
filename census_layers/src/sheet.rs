use std::fmt::Display;

use crate::config::LayerType;

/// The sheets of a baselayer workbook.
///
/// The declaration order is the processing order: later sheets annotate the
/// records created by earlier ones.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum SheetKind {
    Demographics,
    Cdc,
    SpiValues,
    SpiRankings,
    SpiScorecards,
    SpiPeerGroups,
}

impl SheetKind {
    /// All the sheets, in processing order.
    pub const PIPELINE: [SheetKind; 6] = [
        SheetKind::Demographics,
        SheetKind::Cdc,
        SheetKind::SpiValues,
        SheetKind::SpiRankings,
        SheetKind::SpiScorecards,
        SheetKind::SpiPeerGroups,
    ];

    /// The name of the sheet in the workbook.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            SheetKind::Demographics => "demographics",
            SheetKind::Cdc => "cdc",
            SheetKind::SpiValues => "spi-values",
            SheetKind::SpiRankings => "spi-rankings",
            SheetKind::SpiScorecards => "spi-scorecards",
            SheetKind::SpiPeerGroups => "spi-peer-groups",
        }
    }

    /// The dictionary layer used to resolve the column titles of this sheet.
    pub fn layer_type(&self) -> LayerType {
        match self {
            SheetKind::Demographics => LayerType::Demographics,
            SheetKind::Cdc => LayerType::Cdc,
            _ => LayerType::Spi,
        }
    }

    /// The sheets that must have been merged before this one can be.
    pub fn requires(&self) -> &'static [SheetKind] {
        match self {
            SheetKind::Demographics => &[],
            SheetKind::Cdc | SheetKind::SpiValues | SheetKind::SpiPeerGroups => {
                &[SheetKind::Demographics]
            }
            SheetKind::SpiRankings | SheetKind::SpiScorecards => {
                &[SheetKind::Demographics, SheetKind::SpiValues]
            }
        }
    }
}

impl Display for SheetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sheet_name())
    }
}

/// The names of the sheets required in a baselayer workbook.
pub fn baselayer_sheet_names() -> Vec<String> {
    SheetKind::PIPELINE
        .iter()
        .map(|k| k.sheet_name().to_string())
        .collect()
}

/// Returns the required sheets that are not in `available`, in the order of
/// `required`, or `None` when nothing is missing.
pub fn find_missing_sheets(available: &[String], required: &[String]) -> Option<Vec<String>> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !available.contains(name))
        .cloned()
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(missing)
    }
}
