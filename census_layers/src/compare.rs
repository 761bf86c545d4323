use serde::{Serialize, Serializer};
use snafu::prelude::*;

use crate::config::GeographyRecord;
use crate::*;

/// The label used when a year-over-year difference cannot be computed.
pub const NOT_APPLICABLE: &str = "N/A";

/// The difference of a metric between two years.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum RankDelta {
    Delta(f64),
    NotApplicable,
}

impl Serialize for RankDelta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RankDelta::Delta(d) => serializer.serialize_f64(*d),
            RankDelta::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
        }
    }
}

/// The compact performance code of a scorecard category.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
pub enum Performance {
    /// Very underperforming
    U,
    /// Underperforming
    I,
    /// Very overperforming
    O,
    /// Overperforming
    E,
    /// Expected, and any other category.
    S,
}

impl Performance {
    pub fn from_scorecard(category: &str) -> Performance {
        match category {
            "Very Underperforming" => Performance::U,
            "Underperforming" => Performance::I,
            "Very Overperforming" => Performance::O,
            "Overperforming" => Performance::E,
            _ => Performance::S,
        }
    }
}

/// One metric of a scorecard: the current rank, value and performance, and the
/// change of value since the previous year.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct Comparison {
    pub rank: i64,
    pub value: f64,
    pub performance: Performance,
    pub compared_to_last_year: RankDelta,
}

// Zero counts as missing, like a blank cell.
fn present_value(record: Option<&GeographyRecord>, key: &str) -> Option<f64> {
    record
        .and_then(|r| r.metric(key))
        .map(|m| m.value)
        .filter(|v| *v != 0.0 && !v.is_nan())
}

/// The difference between the current and the previous value of the index
/// metric `key`. Not applicable when either value is missing or zero.
pub fn compare_rank(
    current: Option<&GeographyRecord>,
    previous: Option<&GeographyRecord>,
    key: &str,
) -> LayerResult<RankDelta> {
    match (present_value(current, key), present_value(previous, key)) {
        (Some(cur), Some(prev)) => {
            let d = cur - prev;
            ensure!(
                d.is_finite(),
                ComputationSnafu {
                    key,
                    message: format!("difference between {} and {} is not finite", cur, prev),
                }
            );
            Ok(RankDelta::Delta(d))
        }
        _ => Ok(RankDelta::NotApplicable),
    }
}

/// The scorecard entry of the index metric `key`. Missing data reads as zero.
pub fn compare_years(
    current: Option<&GeographyRecord>,
    previous: Option<&GeographyRecord>,
    key: &str,
) -> LayerResult<Comparison> {
    let metric = current.and_then(|r| r.metric(key));
    let rank = metric.and_then(|m| m.ranking).unwrap_or(0);
    let value = metric.map(|m| m.value).filter(|v| !v.is_nan()).unwrap_or(0.0);
    let performance = Performance::from_scorecard(
        metric.and_then(|m| m.scorecard.as_deref()).unwrap_or(""),
    );
    let compared_to_last_year = compare_rank(current, previous, key)?;
    Ok(Comparison {
        rank,
        value,
        performance,
        compared_to_last_year,
    })
}
