use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};
use snafu::prelude::*;

use crate::config::*;
use crate::normalize::{NormalizedRow, Normalizer, SheetValues};
use crate::sheet::SheetKind;
use crate::*;

/// Folds the normalized sheets of a baselayer workbook into one record per
/// geography.
///
/// Each sheet is a stage with a precondition: the stages it annotates must have
/// been merged before (see [`SheetKind::requires`]), and a stage can only be
/// merged once. Breaking the order is reported as an error instead of silently
/// producing partial records.
///
/// ```
/// use census_layers::merge::RecordMerger;
/// use census_layers::normalize::{NormalizedRow, SheetValues};
/// use census_layers::{OrphanPolicy, SheetKind};
/// # use census_layers::LayerError;
///
/// let mut merger = RecordMerger::new(OrphanPolicy::Reject);
/// let rankings = vec![NormalizedRow {
///     geo_id: "06001400100".to_string(),
///     values: SheetValues::Rankings([("spi".to_string(), 3)].into_iter().collect()),
/// }];
/// // The rankings annotate values that do not exist yet.
/// assert!(merger.merge(SheetKind::SpiRankings, rankings).is_err());
/// # Ok::<(), LayerError>(())
/// ```
pub struct RecordMerger {
    orphan_policy: OrphanPolicy,
    records: Vec<GeographyRecord>,
    // Position of each geography in `records`.
    positions: HashMap<String, usize>,
    merged: HashSet<SheetKind>,
}

impl RecordMerger {
    pub fn new(orphan_policy: OrphanPolicy) -> RecordMerger {
        RecordMerger {
            orphan_policy,
            records: Vec::new(),
            positions: HashMap::new(),
            merged: HashSet::new(),
        }
    }

    /// Merges the rows of one sheet.
    pub fn merge(&mut self, kind: SheetKind, rows: Vec<NormalizedRow>) -> LayerResult<()> {
        ensure!(
            !self.merged.contains(&kind),
            StageRepeatedSnafu {
                stage: kind.sheet_name()
            }
        );
        for req in kind.requires() {
            ensure!(
                self.merged.contains(req),
                StageOrderSnafu {
                    stage: kind.sheet_name(),
                    missing: req.sheet_name(),
                }
            );
        }
        debug!("merge: stage {} with {} rows", kind, rows.len());

        for row in rows {
            let NormalizedRow { geo_id, values } = row;
            match (kind, values) {
                (SheetKind::Demographics, SheetValues::Numbers(demographics)) => {
                    self.create(&geo_id, demographics);
                }
                (SheetKind::Cdc, SheetValues::Numbers(cdc)) => {
                    if let Some(rec) = self.annotated(kind, &geo_id)? {
                        rec.cdc = cdc;
                    }
                }
                (SheetKind::SpiValues, SheetValues::Values(values)) => {
                    if let Some(rec) = self.annotated(kind, &geo_id)? {
                        rec.spi.metrics = values
                            .into_iter()
                            .map(|(k, value)| {
                                (
                                    k,
                                    SpiMetric {
                                        value,
                                        ranking: None,
                                        scorecard: None,
                                    },
                                )
                            })
                            .collect();
                    }
                }
                (SheetKind::SpiRankings, SheetValues::Rankings(rankings)) => {
                    if let Some(rec) = self.annotated(kind, &geo_id)? {
                        for (key, ranking) in rankings {
                            let metric = rec.spi.metrics.get_mut(&key).context(MissingValueSnafu {
                                sheet: kind.sheet_name(),
                                geo_id: &geo_id,
                                key: &key,
                            })?;
                            metric.ranking = Some(ranking);
                        }
                    }
                }
                (SheetKind::SpiScorecards, SheetValues::Scorecards(scorecards)) => {
                    if let Some(rec) = self.annotated(kind, &geo_id)? {
                        for (key, scorecard) in scorecards {
                            let metric = rec.spi.metrics.get_mut(&key).context(MissingValueSnafu {
                                sheet: kind.sheet_name(),
                                geo_id: &geo_id,
                                key: &key,
                            })?;
                            metric.scorecard = Some(scorecard);
                        }
                    }
                }
                (SheetKind::SpiPeerGroups, SheetValues::PeerGroups(groups)) => {
                    if let Some(rec) = self.annotated(kind, &geo_id)? {
                        rec.spi.peer_groups = Some(groups);
                    }
                }
                (_, values) => {
                    whatever!(
                        "Values {:?} of {} cannot be merged as sheet {}",
                        values,
                        geo_id,
                        kind
                    )
                }
            }
        }
        self.merged.insert(kind);
        Ok(())
    }

    /// Returns the records once every stage has been merged.
    pub fn finish(self, year: i32) -> LayerResult<YearSnapshot> {
        for kind in SheetKind::PIPELINE.iter() {
            ensure!(
                self.merged.contains(kind),
                StageOrderSnafu {
                    stage: "the snapshot",
                    missing: kind.sheet_name(),
                }
            );
        }
        info!(
            "Merged {} geographies for year {}",
            self.records.len(),
            year
        );
        Ok(YearSnapshot {
            year,
            geographies: self.records,
        })
    }

    fn create(&mut self, geo_id: &str, demographics: std::collections::BTreeMap<String, f64>) {
        if let Some(pos) = self.positions.get(geo_id) {
            // A later row for the same tract replaces the earlier one.
            warn!("merge: duplicate geography {} in demographics", geo_id);
            self.records[*pos] = GeographyRecord::new(geo_id, demographics);
        } else {
            self.positions.insert(geo_id.to_string(), self.records.len());
            self.records.push(GeographyRecord::new(geo_id, demographics));
        }
    }

    // The record that a later sheet annotates, or None when the row is skipped.
    fn annotated(
        &mut self,
        kind: SheetKind,
        geo_id: &str,
    ) -> LayerResult<Option<&mut GeographyRecord>> {
        match self.positions.get(geo_id) {
            Some(pos) => Ok(self.records.get_mut(*pos)),
            None => match self.orphan_policy {
                OrphanPolicy::Reject => MissingRecordSnafu {
                    sheet: kind.sheet_name(),
                    geo_id,
                }
                .fail(),
                OrphanPolicy::Skip => {
                    warn!(
                        "merge: skipping {} in {}: not present in demographics",
                        geo_id, kind
                    );
                    Ok(None)
                }
            },
        }
    }
}

/// Builds the snapshot of a year from the raw rows of every sheet, merged in
/// pipeline order.
pub fn build_snapshot(
    year: i32,
    normalizer: &Normalizer,
    orphan_policy: OrphanPolicy,
    sheets: &HashMap<SheetKind, Vec<Row>>,
) -> LayerResult<YearSnapshot> {
    let mut merger = RecordMerger::new(orphan_policy);
    for kind in SheetKind::PIPELINE {
        let rows = sheets.get(&kind).context(MissingSheetSnafu {
            sheet: kind.sheet_name(),
        })?;
        let normalized = normalizer.normalize_sheet(kind, rows)?;
        merger.merge(kind, normalized)?;
    }
    merger.finish(year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::collections::BTreeMap;

    fn numbers(l: &[(&str, f64)]) -> BTreeMap<String, f64> {
        l.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn nrow(geo_id: &str, values: SheetValues) -> NormalizedRow {
        NormalizedRow {
            geo_id: geo_id.to_string(),
            values,
        }
    }

    fn with_values(merger: &mut RecordMerger) {
        merger
            .merge(
                SheetKind::Demographics,
                vec![
                    nrow("A", SheetValues::Numbers(numbers(&[("medianhhinc", 75000.0)]))),
                    nrow("B", SheetValues::Numbers(numbers(&[("medianhhinc", 41000.0)]))),
                ],
            )
            .unwrap();
        merger
            .merge(
                SheetKind::SpiValues,
                vec![nrow("A", SheetValues::Values(numbers(&[("spi", 62.3), ("bhn", 70.0)])))],
            )
            .unwrap();
    }

    #[test]
    fn example_workbook() {
        init_logger();
        let d = sample_dictionary();
        let normalizer = Normalizer {
            dictionary: &d,
            identifier_column: ID_COLUMN,
            peer_group_column: PEER_COLUMN,
        };
        let snapshot = build_snapshot(2023, &normalizer, OrphanPolicy::Reject, &sample_sheets()).unwrap();
        assert_eq!(snapshot.year, 2023);
        assert_eq!(snapshot.geographies.len(), 2);
        let rec = snapshot.geography("06001400100").unwrap();
        assert_eq!(rec.demographics["medianhhinc"], 75000.0);
        assert_eq!(rec.cdc["casthma"], 9.1);
        let spi = rec.metric("spi").unwrap();
        assert_eq!(spi.value, 62.3);
        assert_eq!(spi.ranking, Some(4));
        assert_eq!(spi.scorecard.as_deref(), Some("Overperforming"));
        assert_eq!(
            rec.spi.peer_groups,
            Some(vec!["A".to_string(), "B".to_string(), "C".to_string()])
        );
        // Demographics order is kept.
        assert_eq!(snapshot.geographies[1].geo_id, "06001400200");
    }

    #[test]
    fn rankings_before_values_fail() {
        let mut merger = RecordMerger::new(OrphanPolicy::Reject);
        merger
            .merge(
                SheetKind::Demographics,
                vec![nrow("A", SheetValues::Numbers(numbers(&[])))],
            )
            .unwrap();
        let err = merger
            .merge(
                SheetKind::SpiRankings,
                vec![nrow("A", SheetValues::Rankings([("spi".to_string(), 1)].into_iter().collect()))],
            )
            .unwrap_err();
        assert!(matches!(err, LayerError::StageOrder { .. }), "{:?}", err);
        let err = merger
            .merge(
                SheetKind::SpiScorecards,
                vec![],
            )
            .unwrap_err();
        assert!(matches!(err, LayerError::StageOrder { .. }), "{:?}", err);
    }

    #[test]
    fn ranking_without_value_fails() {
        let mut merger = RecordMerger::new(OrphanPolicy::Reject);
        with_values(&mut merger);
        let err = merger
            .merge(
                SheetKind::SpiRankings,
                vec![nrow(
                    "A",
                    SheetValues::Rankings(
                        [("spi".to_string(), 1), ("ps".to_string(), 2)].into_iter().collect(),
                    ),
                )],
            )
            .unwrap_err();
        match err {
            LayerError::MissingValue { sheet, geo_id, key } => {
                assert_eq!(sheet, "spi-rankings");
                assert_eq!(geo_id, "A");
                assert_eq!(key, "ps");
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn scorecard_for_tract_without_values_fails() {
        let mut merger = RecordMerger::new(OrphanPolicy::Reject);
        with_values(&mut merger);
        // B exists but has no spi values.
        let err = merger
            .merge(
                SheetKind::SpiScorecards,
                vec![nrow(
                    "B",
                    SheetValues::Scorecards([("spi".to_string(), "Expected".to_string())].into_iter().collect()),
                )],
            )
            .unwrap_err();
        assert!(matches!(err, LayerError::MissingValue { .. }));
    }

    #[test]
    fn orphan_rows() {
        let mut merger = RecordMerger::new(OrphanPolicy::Reject);
        with_values(&mut merger);
        let err = merger
            .merge(
                SheetKind::Cdc,
                vec![nrow("Z", SheetValues::Numbers(numbers(&[("casthma", 1.0)])))],
            )
            .unwrap_err();
        assert!(matches!(err, LayerError::MissingRecord { .. }));

        let mut merger = RecordMerger::new(OrphanPolicy::Skip);
        with_values(&mut merger);
        merger
            .merge(
                SheetKind::Cdc,
                vec![
                    nrow("Z", SheetValues::Numbers(numbers(&[("casthma", 1.0)]))),
                    nrow("A", SheetValues::Numbers(numbers(&[("casthma", 2.0)]))),
                ],
            )
            .unwrap();
        merger.merge(SheetKind::SpiRankings, vec![]).unwrap();
        merger.merge(SheetKind::SpiScorecards, vec![]).unwrap();
        merger.merge(SheetKind::SpiPeerGroups, vec![]).unwrap();
        let snapshot = merger.finish(2020).unwrap();
        assert_eq!(snapshot.geographies.len(), 2);
        assert!(snapshot.geography("Z").is_none());
        assert_eq!(snapshot.geography("A").unwrap().cdc["casthma"], 2.0);
    }

    #[test]
    fn duplicate_demographics_row_replaces() {
        let mut merger = RecordMerger::new(OrphanPolicy::Reject);
        merger
            .merge(
                SheetKind::Demographics,
                vec![
                    nrow("A", SheetValues::Numbers(numbers(&[("medianhhinc", 1.0)]))),
                    nrow("B", SheetValues::Numbers(numbers(&[]))),
                    nrow("A", SheetValues::Numbers(numbers(&[("medianhhinc", 2.0)]))),
                ],
            )
            .unwrap();
        assert_eq!(merger.records.len(), 2);
        assert_eq!(merger.records[0].demographics["medianhhinc"], 2.0);
    }

    #[test]
    fn stages_run_once_and_all_are_needed() {
        let mut merger = RecordMerger::new(OrphanPolicy::Reject);
        merger.merge(SheetKind::Demographics, vec![]).unwrap();
        assert!(matches!(
            merger.merge(SheetKind::Demographics, vec![]),
            Err(LayerError::StageRepeated { .. })
        ));
        merger.merge(SheetKind::Cdc, vec![]).unwrap();
        assert!(matches!(
            merger.finish(2021),
            Err(LayerError::StageOrder { .. })
        ));
    }

    #[test]
    fn missing_sheet_rows() {
        let d = sample_dictionary();
        let normalizer = Normalizer {
            dictionary: &d,
            identifier_column: ID_COLUMN,
            peer_group_column: PEER_COLUMN,
        };
        let mut sheets = sample_sheets();
        sheets.remove(&SheetKind::SpiScorecards);
        let err = build_snapshot(2023, &normalizer, OrphanPolicy::Reject, &sheets).unwrap_err();
        assert!(matches!(err, LayerError::MissingSheet { .. }));
    }
}
