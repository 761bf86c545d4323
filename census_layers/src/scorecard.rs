//! The scorecard of a census tract: the comparison of every index metric with
//! the previous year, nested along the hierarchy of the index.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::compare::{compare_rank, compare_years};
use crate::config::GeographyRecord;
use crate::*;

/// A node of the scorecard hierarchy.
///
/// A node without children is rendered as the comparison of its metric. A node
/// with children is rendered as an object holding the comparison of its own
/// metric under `valueRank`, one entry per child, and its delta under
/// `compared_to_last_year`.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardNode {
    pub key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ScorecardNode>,
}

impl ScorecardNode {
    pub fn leaf(key: &str) -> ScorecardNode {
        ScorecardNode {
            key: key.to_string(),
            children: vec![],
        }
    }
}

type Component = (&'static str, &'static [&'static str]);

// Dimension -> components -> indicators.
const DEFAULT_TREE: &[(&str, &[Component])] = &[
    ("spi", &[]),
    (
        "bhn",
        &[
            ("ps", &["ps_violent", "ps_property", "ps_accidents"]),
            (
                "ws",
                &["ws_groundwater", "ws_inspections", "ws_drinkingwater", "ws_hazardouswaste"],
            ),
            (
                "nbm",
                &[
                    "nbm_vax",
                    "nbm_dental",
                    "nbm_foodstamps",
                    "nbm_preventative",
                    "nbm_supermarketaccess",
                ],
            ),
            (
                "housing",
                &[
                    "s_rapi",
                    "s_eviction",
                    "s_overcrowded",
                    "s_hburdenowner",
                    "s_hburdenrenter",
                ],
            ),
        ],
    ),
    (
        "wf",
        &[
            (
                "eq",
                &["eq_no2", "eq_pm25", "eq_ozone", "eq_wildfirehp", "eq_carbonfootprint"],
            ),
            (
                "hw",
                &[
                    "hw_cancer",
                    "hw_obesity",
                    "hw_diabetes",
                    "hw_mentalhealth",
                    "hw_under5_physicalhealth",
                ],
            ),
            (
                "abk",
                &[
                    "abk_g8math",
                    "abk_g3reading",
                    "abk_hsincomplete",
                    "abk_preschoolenroll",
                    "abk_under5_comskills",
                    "abk_under5_socioemotional",
                ],
            ),
            (
                "aic",
                &[
                    "aic_celldata",
                    "aic_broadband",
                    "aic_nointernet",
                    "aic_hascomputer",
                    "aic_broadbandspeed",
                ],
            ),
        ],
    ),
    (
        "opportunity",
        &[
            ("pr", &["pr_turnout", "pr_registration", "pr_homeownership"]),
            ("aae", &["aae_graduate", "aae_bachelors", "aae_associates"]),
            (
                "pfc",
                &[
                    "pfc_walkindex",
                    "pfc_cleancommute",
                    "pfc_disconnected",
                    "pfc_childcaredeserts",
                ],
            ),
            (
                "inclusiveness",
                &["i_isolation", "i_linguistic", "i_genderpaygap", "i_dissimilarity"],
            ),
        ],
    ),
];

/// The hierarchy of the social progress index, from the overall score to the
/// individual indicators.
pub fn default_schema() -> Vec<ScorecardNode> {
    DEFAULT_TREE
        .iter()
        .map(|(dimension, components)| ScorecardNode {
            key: dimension.to_string(),
            children: components
                .iter()
                .map(|(component, indicators)| ScorecardNode {
                    key: component.to_string(),
                    children: indicators.iter().map(|k| ScorecardNode::leaf(k)).collect(),
                })
                .collect(),
        })
        .collect()
}

/// All the metric keys of a schema, parents before children.
pub fn schema_keys(schema: &[ScorecardNode]) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    for node in schema {
        res.push(node.key.clone());
        res.extend(schema_keys(&node.children));
    }
    res
}

fn render_node(
    node: &ScorecardNode,
    current: &GeographyRecord,
    previous: Option<&GeographyRecord>,
) -> LayerResult<JSValue> {
    let value_rank = compare_years(Some(current), previous, &node.key)?;
    if node.children.is_empty() {
        return serde_json::to_value(value_rank).context(SerializingSnafu {});
    }
    let mut obj: JSMap<String, JSValue> = JSMap::new();
    obj.insert(
        "valueRank".to_string(),
        serde_json::to_value(value_rank).context(SerializingSnafu {})?,
    );
    for child in node.children.iter() {
        obj.insert(child.key.clone(), render_node(child, current, previous)?);
    }
    let delta = compare_rank(Some(current), previous, &node.key)?;
    obj.insert(
        "compared_to_last_year".to_string(),
        serde_json::to_value(delta).context(SerializingSnafu {})?,
    );
    Ok(JSValue::Object(obj))
}

/// Renders the metrics of a schema for one tract, one entry per top-level node.
pub fn render_schema(
    schema: &[ScorecardNode],
    current: &GeographyRecord,
    previous: Option<&GeographyRecord>,
) -> LayerResult<JSMap<String, JSValue>> {
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for node in schema {
        res.insert(node.key.clone(), render_node(node, current, previous)?);
    }
    Ok(res)
}

/// The full scorecard of a tract.
///
/// `previous` is the record of the same tract in the previous year, if any.
/// Missing previous data only affects the year-over-year deltas.
pub fn build_scorecard(
    schema: &[ScorecardNode],
    current: &GeographyRecord,
    previous: Option<&GeographyRecord>,
) -> LayerResult<JSValue> {
    debug!(
        "build_scorecard: {} (previous year: {})",
        current.geo_id,
        previous.is_some()
    );
    let mut res: JSMap<String, JSValue> = JSMap::new();
    res.insert("name".to_string(), json!(current.geo_id));
    res.insert("fullName".to_string(), json!(current.geo_id));
    res.extend(render_schema(schema, current, previous)?);
    res.insert(
        "mhi".to_string(),
        json!({
            "rank": null,
            "value": current.demographics.get("medianhhinc"),
            "performance": null,
            "compared_to_last_year": null,
        }),
    );
    res.insert(
        "similarLabels".to_string(),
        json!([current.spi.peer_groups]),
    );
    res.insert("url".to_string(), json!(""));
    Ok(JSValue::Object(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpiMetric;
    use std::collections::BTreeMap;

    fn record(geo_id: &str, metrics: &[(&str, f64, i64, &str)]) -> GeographyRecord {
        let mut demographics = BTreeMap::new();
        demographics.insert("medianhhinc".to_string(), 75000.0);
        let mut r = GeographyRecord::new(geo_id, demographics);
        for (k, value, ranking, scorecard) in metrics {
            r.spi.metrics.insert(
                k.to_string(),
                SpiMetric {
                    value: *value,
                    ranking: Some(*ranking),
                    scorecard: Some(scorecard.to_string()),
                },
            );
        }
        r.spi.peer_groups = Some(vec!["3".to_string(), "7".to_string()]);
        r
    }

    #[test]
    fn default_schema_shape() {
        let schema = default_schema();
        let top: Vec<&str> = schema.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(top, vec!["spi", "bhn", "wf", "opportunity"]);
        assert!(schema[0].children.is_empty());
        let bhn: Vec<&str> = schema[1].children.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(bhn, vec!["ps", "ws", "nbm", "housing"]);
        let keys = schema_keys(&schema);
        assert_eq!(keys.len(), 68);
        assert!(keys.contains(&"abk_under5_socioemotional".to_string()));
    }

    #[test]
    fn schema_reads_from_json() {
        let schema: Vec<ScorecardNode> = serde_json::from_str(
            r#"[{"key": "spi"}, {"key": "bhn", "children": [{"key": "ps", "children": [{"key": "ps_violent"}]}]}]"#,
        )
        .unwrap();
        assert_eq!(schema[1].children[0].children[0], ScorecardNode::leaf("ps_violent"));
    }

    #[test]
    fn nested_rendering() {
        let schema: Vec<ScorecardNode> = serde_json::from_value(json!([
            {"key": "spi"},
            {"key": "bhn", "children": [
                {"key": "ps", "children": [{"key": "ps_violent"}, {"key": "ps_property"}]}
            ]}
        ]))
        .unwrap();
        let cur = record(
            "A",
            &[
                ("spi", 62.5, 4, "Overperforming"),
                ("bhn", 70.0, 2, "Expected"),
                ("ps", 50.0, 10, "Very Underperforming"),
                ("ps_violent", 20.0, 1, "Underperforming"),
            ],
        );
        let prev = record("A", &[("spi", 60.0, 5, "Expected"), ("ps", 55.0, 8, "Expected")]);
        let sc = build_scorecard(&schema, &cur, Some(&prev)).unwrap();

        assert_eq!(sc["name"], "A");
        assert_eq!(sc["fullName"], "A");
        assert_eq!(
            sc["spi"],
            json!({"rank": 4, "value": 62.5, "performance": "E", "compared_to_last_year": 2.5})
        );
        assert_eq!(sc["bhn"]["valueRank"]["rank"], 2);
        assert_eq!(sc["bhn"]["compared_to_last_year"], "N/A");
        assert_eq!(sc["bhn"]["ps"]["valueRank"]["performance"], "U");
        assert_eq!(sc["bhn"]["ps"]["compared_to_last_year"], -5.0);
        assert_eq!(
            sc["bhn"]["ps"]["ps_violent"],
            json!({"rank": 1, "value": 20.0, "performance": "I", "compared_to_last_year": "N/A"})
        );
        assert_eq!(
            sc["bhn"]["ps"]["ps_property"],
            json!({"rank": 0, "value": 0.0, "performance": "S", "compared_to_last_year": "N/A"})
        );
        assert_eq!(
            sc["mhi"],
            json!({"rank": null, "value": 75000.0, "performance": null, "compared_to_last_year": null})
        );
        assert_eq!(sc["similarLabels"], json!([["3", "7"]]));
        assert_eq!(sc["url"], "");
    }

    #[test]
    fn scorecard_without_previous_year_record() {
        let cur = record("A", &[("spi", 62.3, 4, "Expected")]);
        let sc = build_scorecard(&default_schema(), &cur, None).unwrap();
        assert_eq!(sc["spi"]["compared_to_last_year"], "N/A");
        assert_eq!(sc["opportunity"]["inclusiveness"]["compared_to_last_year"], "N/A");
        assert_eq!(sc["wf"]["hw"]["hw_obesity"]["value"], 0.0);
    }
}
