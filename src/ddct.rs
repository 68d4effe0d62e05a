use std::collections::HashMap;

use itertools::Itertools;
use tracing::{debug, warn};

use crate::{
    cell::Row,
    config::AnalysisConfig,
    error::{DdctError, Result},
    math::{arithmetic_mean, delta_ct, expression_factor},
    results::{AnalysisResults, ControlBaseline, GeneSummary, LongObservation, WideRow, WideTable},
};

/// Runs the delta-delta-Ct analysis over `rows`
pub fn analyze(rows: &[Row], config: &AnalysisConfig) -> Result<AnalysisResults> {
    DeltaDeltaCt::new(rows, config).run()
}

/// An implementation of the delta-delta-Ct relative expression method
///
/// Every target gene is normalized against the housekeeping gene and against
/// the mean Ct values of the control group for that gene.
pub struct DeltaDeltaCt<'a> {
    rows: &'a [Row],
    config: &'a AnalysisConfig,
}

/// Running state of a single target gene
#[derive(Default)]
struct GeneAccumulator {
    processed: usize,
    discarded: usize,
    control_housekeeping: Vec<f64>,
    control_target: Vec<f64>,
}
impl GeneAccumulator {
    fn baseline(&self) -> Option<ControlBaseline> {
        if self.control_target.is_empty() {
            return None;
        }
        Some(ControlBaseline::new(
            arithmetic_mean(&self.control_housekeeping),
            arithmetic_mean(&self.control_target),
        ))
    }
}

/// The gene-independent fields of a row
struct RowFields {
    sample_id: String,
    group: String,
    housekeeping: Option<f64>,
}
impl RowFields {
    /// Housekeeping and target Ct of a valid (row, gene) pair
    fn valid_pair(&self, row: &Row, gene: &str) -> Option<(f64, f64)> {
        if self.sample_id.is_empty() || self.group.is_empty() {
            return None;
        }
        Some((self.housekeeping?, row.ct(gene)?))
    }
}

impl<'a> DeltaDeltaCt<'a> {
    pub fn new(rows: &'a [Row], config: &'a AnalysisConfig) -> Self {
        Self { rows, config }
    }

    /// Run the analysis
    ///
    /// The analysis is a four-step process:
    /// 1. Count discarded pairs and collect control-group Ct values per gene
    /// 2. Compute the control baselines, failing if any gene lacks one
    /// 3. Normalize every valid (row, gene) pair into the long table
    /// 4. Pivot the long table into the wide table
    pub fn run(&self) -> Result<AnalysisResults> {
        let genes = &self.config.target_columns;
        // Group labels are compared trimmed on both sides
        let control_group = self.config.control_group.trim();

        // Discard accounting and control collection
        let mut accumulators = genes
            .iter()
            .map(|_| GeneAccumulator::default())
            .collect::<Vec<_>>();
        let mut group_labels = Vec::new();
        for row in self.rows {
            let fields = self.row_fields(row);
            if !fields.group.is_empty() {
                group_labels.push(fields.group.clone());
            }
            for (gene, acc) in genes.iter().zip(accumulators.iter_mut()) {
                match fields.valid_pair(row, gene) {
                    None => acc.discarded += 1,
                    Some((hk, target)) if fields.group == control_group => {
                        acc.control_housekeeping.push(hk);
                        acc.control_target.push(target);
                    }
                    Some(_) => {}
                }
            }
        }
        let groups = group_labels.into_iter().unique().collect::<Vec<_>>();

        // Control baselines
        let baselines = match accumulators
            .iter()
            .map(GeneAccumulator::baseline)
            .collect::<Option<Vec<_>>>()
        {
            Some(baselines) => baselines,
            None => {
                let missing = genes
                    .iter()
                    .zip(accumulators.iter())
                    .filter(|(_, acc)| acc.baseline().is_none())
                    .map(|(gene, _)| gene.clone())
                    .collect::<Vec<_>>();
                debug!(control_group, genes = ?missing, "control baseline missing");
                return Err(DdctError::ControlBaselineMissing { genes: missing });
            }
        };

        // Normalize every valid observation
        let mut long = Vec::new();
        for row in self.rows {
            let fields = self.row_fields(row);
            for ((gene, acc), baseline) in genes
                .iter()
                .zip(accumulators.iter_mut())
                .zip(baselines.iter())
            {
                let Some((hk, target)) = fields.valid_pair(row, gene) else {
                    continue;
                };
                long.push(normalize(&fields, gene, baseline, hk, target));
                acc.processed += 1;
            }
        }

        let wide = pivot_wide(&long, genes);

        let summary = genes
            .iter()
            .zip(accumulators.iter())
            .zip(baselines.iter())
            .map(|((gene, acc), baseline)| {
                GeneSummary::new(gene.clone(), acc.processed, acc.discarded, Some(*baseline))
            })
            .collect::<Vec<_>>();

        for s in &summary {
            debug!(
                gene = %s.gene,
                processed = s.processed,
                discarded = s.discarded,
                "gene normalized"
            );
        }

        Ok(AnalysisResults {
            long,
            wide,
            summary,
            groups,
        })
    }

    fn row_fields(&self, row: &Row) -> RowFields {
        RowFields {
            sample_id: row.text(&self.config.sample_column),
            group: row.text(&self.config.group_column),
            housekeeping: row.ct(&self.config.housekeeping_column),
        }
    }
}

/// Normalizes one valid observation against its gene's control baseline
fn normalize(
    fields: &RowFields,
    gene: &str,
    baseline: &ControlBaseline,
    hk: f64,
    target: f64,
) -> LongObservation {
    let delta_ct_housekeeping = delta_ct(baseline.housekeeping_mean, hk);
    let delta_ct_target = delta_ct(baseline.target_mean, target);
    let housekeeping_factor = expression_factor(delta_ct_housekeeping);
    let target_factor = expression_factor(delta_ct_target);
    // Exponentiate the difference: both factors underflow to zero at large Ct
    let normalized_expression = expression_factor(delta_ct_target - delta_ct_housekeeping);

    LongObservation::builder()
        .sample_id(fields.sample_id.as_str())
        .group(fields.group.as_str())
        .gene(gene)
        .ct_housekeeping(hk)
        .ct_target(target)
        .delta_ct_housekeeping(delta_ct_housekeeping)
        .delta_ct_target(delta_ct_target)
        .housekeeping_factor(housekeeping_factor)
        .target_factor(target_factor)
        .normalized_expression(normalized_expression)
        .log2_expression(normalized_expression.log2())
        .build()
}

/// Folds the long table into one row per (sample, group), first-seen order
///
/// A repeated (sample, group, gene) key overwrites the earlier value.
fn pivot_wide(long: &[LongObservation], genes: &[String]) -> WideTable {
    let columns = genes
        .iter()
        .enumerate()
        .map(|(idx, gene)| (gene.as_str(), idx))
        .collect::<HashMap<_, _>>();

    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut rows: Vec<WideRow> = Vec::new();
    for obs in long {
        let Some(&column) = columns.get(obs.gene.as_str()) else {
            continue;
        };
        let position = *index
            .entry((obs.sample_id.as_str(), obs.group.as_str()))
            .or_insert_with(|| {
                rows.push(WideRow::new(
                    obs.sample_id.clone(),
                    obs.group.clone(),
                    vec![None; genes.len()],
                ));
                rows.len() - 1
            });
        let slot = &mut rows[position].log2_expression[column];
        if slot.is_some() {
            warn!(
                sample_id = %obs.sample_id,
                group = %obs.group,
                gene = %obs.gene,
                "duplicate observation in wide table, keeping the last value"
            );
        }
        *slot = Some(obs.log2_expression);
    }

    WideTable {
        genes: genes.to_vec(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::cell::RawValue;

    fn row(id: &str, grp: &str, hk: impl Into<RawValue>, targets: &[(&str, RawValue)]) -> Row {
        let mut row = Row::new().with("id", id).with("grp", grp).with("HK", hk);
        for (gene, value) in targets {
            row.insert(*gene, value.clone());
        }
        row
    }

    fn config(targets: &[&str]) -> AnalysisConfig {
        AnalysisConfig::builder()
            .sample_column("id")
            .group_column("grp")
            .housekeeping_column("HK")
            .target_columns(targets.iter().map(|s| s.to_string()).collect())
            .control_group("Ctrl")
            .build()
    }

    fn scenario_rows() -> Vec<Row> {
        vec![
            row("S1", "Ctrl", 20.0, &[("GeneA", 25.0.into())]),
            row("S2", "Ctrl", 22.0, &[("GeneA", 27.0.into())]),
            row("S3", "Treat", 21.0, &[("GeneA", 24.0.into())]),
        ]
    }

    #[test]
    fn test_single_gene_scenario() {
        let results = analyze(&scenario_rows(), &config(&["GeneA"])).unwrap();

        let summary = &results.summary[0];
        assert_eq!(summary.gene, "GeneA");
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.discarded, 0);
        let baseline = summary.baseline.unwrap();
        assert_relative_eq!(baseline.housekeeping_mean, 21.0);
        assert_relative_eq!(baseline.target_mean, 26.0);

        assert_eq!(results.long.len(), 3);
        let s3 = &results.long[2];
        assert_eq!(s3.sample_id, "S3");
        assert_eq!(s3.group, "Treat");
        assert_relative_eq!(s3.delta_ct_housekeeping, 0.0);
        assert_relative_eq!(s3.housekeeping_factor, 1.0);
        assert_relative_eq!(s3.delta_ct_target, 2.0);
        assert_relative_eq!(s3.target_factor, 4.0);
        assert_relative_eq!(s3.normalized_expression, 4.0);
        assert_relative_eq!(s3.log2_expression, 2.0);

        // Controls normalize to unit expression in this layout
        assert_relative_eq!(results.long[0].log2_expression, 0.0);
        assert_relative_eq!(results.long[1].log2_expression, 0.0);

        assert_eq!(results.groups, vec!["Ctrl", "Treat"]);
    }

    #[test]
    fn test_higher_ct_gives_negative_log2() {
        let mut rows = scenario_rows();
        rows.push(row("S4", "Treat", 21.0, &[("GeneA", 28.0.into())]));
        let results = analyze(&rows, &config(&["GeneA"])).unwrap();
        assert_relative_eq!(results.long[3].log2_expression, -2.0);
        assert_relative_eq!(results.long[3].normalized_expression, 0.25);
    }

    #[test]
    fn test_zero_housekeeping_is_discarded() {
        let mut rows = scenario_rows();
        rows.push(row("S4", "Treat", "0", &[("GeneA", 24.0.into())]));
        let results = analyze(&rows, &config(&["GeneA"])).unwrap();
        assert_eq!(results.summary[0].processed, 3);
        assert_eq!(results.summary[0].discarded, 1);
        assert!(results.long.iter().all(|obs| obs.sample_id != "S4"));
    }

    #[test]
    fn test_missing_control_for_one_gene_fails() {
        let rows = vec![
            row("S1", "Ctrl", 20.0, &[("GeneX", 25.0.into()), ("GeneY", "".into())]),
            row("S2", "Treat", 21.0, &[("GeneX", 24.0.into()), ("GeneY", 30.0.into())]),
        ];
        let err = analyze(&rows, &config(&["GeneX", "GeneY"])).unwrap_err();
        match err {
            DdctError::ControlBaselineMissing { genes } => assert_eq!(genes, vec!["GeneY"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_genes_reported_in_configured_order() {
        let rows = vec![row("S1", "Treat", 20.0, &[("A", 25.0.into()), ("B", 26.0.into())])];
        let err = analyze(&rows, &config(&["B", "A"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "control group has no valid samples for: B, A"
        );
    }

    #[test]
    fn test_unmatched_control_group_fails() {
        let mut config = config(&["GeneA"]);
        config.control_group = "Vehicle".to_string();
        assert!(analyze(&scenario_rows(), &config).is_err());
    }

    #[test]
    fn test_per_gene_validity() {
        let rows = vec![
            row("S1", "Ctrl", 20.0, &[("A", 25.0.into()), ("B", 30.0.into())]),
            row("S2", "Ctrl", 20.0, &[("A", 25.0.into()), ("B", 30.0.into())]),
            row("S3", "Treat", 21.0, &[("A", "Undetermined".into()), ("B", 29.0.into())]),
        ];
        let results = analyze(&rows, &config(&["A", "B"])).unwrap();
        assert_eq!(results.summary[0].processed, 2);
        assert_eq!(results.summary[0].discarded, 1);
        assert_eq!(results.summary[1].processed, 3);
        assert_eq!(results.summary[1].discarded, 0);

        // Row order first, then configured gene order
        let order = results
            .long
            .iter()
            .map(|obs| (obs.sample_id.as_str(), obs.gene.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            order,
            vec![("S1", "A"), ("S1", "B"), ("S2", "A"), ("S2", "B"), ("S3", "B")]
        );

        assert_eq!(results.wide.len(), 3);
        assert_eq!(results.wide.value(2, "A"), None);
        assert_relative_eq!(results.wide.value(2, "B").unwrap(), 2.0);
    }

    #[test]
    fn test_rows_without_sample_or_group_are_discarded_for_every_gene() {
        let mut rows = scenario_rows();
        rows.push(row("", "Treat", 21.0, &[("GeneA", 24.0.into())]));
        rows.push(row("S5", "  ", 21.0, &[("GeneA", 24.0.into())]));
        let results = analyze(&rows, &config(&["GeneA"])).unwrap();
        assert_eq!(results.summary[0].processed, 3);
        assert_eq!(results.summary[0].discarded, 2);
    }

    #[test]
    fn test_groups_include_rows_invalid_for_every_gene() {
        let mut rows = scenario_rows();
        rows.push(row("S4", "Knockdown", "", &[("GeneA", 24.0.into())]));
        let results = analyze(&rows, &config(&["GeneA"])).unwrap();
        assert_eq!(results.groups, vec!["Ctrl", "Treat", "Knockdown"]);
        assert!(results.long.iter().all(|obs| obs.group != "Knockdown"));
    }

    #[test]
    fn test_counts_partition_rows() {
        let rows = vec![
            row("S1", "Ctrl", 20.0, &[("A", 25.0.into()), ("B", 0.0.into())]),
            row("S2", "Ctrl", 22.5, &[("A", "x".into()), ("B", 30.0.into())]),
            row("S3", "Treat", "", &[("A", 24.0.into()), ("B", 31.0.into())]),
            row("S4", "Treat", 21.0, &[("A", 23.0.into()), ("B", 29.0.into())]),
        ];
        let results = analyze(&rows, &config(&["A", "B"])).unwrap();
        for summary in &results.summary {
            assert_eq!(summary.processed + summary.discarded, rows.len());
        }
        assert_eq!(results.summary[0].discarded, 2);
        assert_eq!(results.summary[1].discarded, 2);
    }

    #[test]
    fn test_baseline_matches_recomputation() {
        let rows = vec![
            row("S1", "Ctrl", 19.7, &[("A", 24.1.into())]),
            row("S2", "Ctrl", 20.3, &[("A", 25.9.into())]),
            row("S3", "Ctrl", 0.0, &[("A", 26.0.into())]),
            row("S4", "Ctrl", 21.1, &[("A", 23.4.into())]),
            row("S5", "Treat", 20.0, &[("A", 22.0.into())]),
        ];
        let results = analyze(&rows, &config(&["A"])).unwrap();
        let baseline = results.summary[0].baseline.unwrap();
        assert_eq!(baseline.housekeeping_mean, (19.7 + 20.3 + 21.1) / 3.0);
        assert_eq!(baseline.target_mean, (24.1 + 25.9 + 23.4) / 3.0);
    }

    #[test]
    fn test_expression_is_positive_and_log2_consistent() {
        let rows = vec![
            row("S1", "Ctrl", 18.0, &[("A", 35.0.into())]),
            row("S2", "Ctrl", 30.0, &[("A", 15.0.into())]),
            row("S3", "Treat", 12.0, &[("A", 39.9.into())]),
            row("S4", "Treat", 38.0, &[("A", 11.0.into())]),
        ];
        let results = analyze(&rows, &config(&["A"])).unwrap();
        for obs in &results.long {
            assert!(obs.normalized_expression > 0.0);
            assert_eq!(obs.log2_expression, obs.normalized_expression.log2());
        }
    }

    #[test]
    fn test_large_ct_values_stay_positive() {
        let rows = vec![
            row("S1", "Ctrl", 20.0, &[("A", 25.0.into())]),
            row("S2", "Treat", 2000.0, &[("A", 2000.0.into())]),
        ];
        let results = analyze(&rows, &config(&["A"])).unwrap();
        let obs = &results.long[1];
        assert_eq!(obs.housekeeping_factor, 0.0);
        assert_eq!(obs.target_factor, 0.0);
        assert_relative_eq!(obs.normalized_expression, 32.0);
        assert_relative_eq!(obs.log2_expression, 5.0);
    }

    #[test]
    fn test_control_label_is_trimmed() {
        let mut config = config(&["GeneA"]);
        config.control_group = " Ctrl ".to_string();
        let results = analyze(&scenario_rows(), &config).unwrap();
        let baseline = results.summary[0].baseline.unwrap();
        assert_relative_eq!(baseline.target_mean, 26.0);
    }

    #[test]
    fn test_wide_pivot_last_value_wins() {
        let rows = vec![
            row("S1", "Ctrl", 20.0, &[("A", 25.0.into())]),
            row("S2", "Ctrl", 20.0, &[("A", 25.0.into())]),
            row("S3", "Treat", 20.0, &[("A", 24.0.into())]),
            row("S3", "Treat", 20.0, &[("A", 23.0.into())]),
        ];
        let results = analyze(&rows, &config(&["A"])).unwrap();
        assert_eq!(results.long.len(), 4);
        assert_eq!(results.wide.len(), 3);
        assert_eq!(results.wide.rows[2].sample_id, "S3");
        assert_relative_eq!(results.wide.value(2, "A").unwrap(), 2.0);
    }

    #[test]
    fn test_wide_keys_match_long_keys() {
        let rows = vec![
            row("S1", "Ctrl", 20.0, &[("A", 25.0.into()), ("B", 30.0.into())]),
            row("S1", "Treat", 20.0, &[("A", 24.0.into()), ("B", 30.0.into())]),
            row("S2", "Ctrl", 21.0, &[("A", 25.0.into()), ("B", 31.0.into())]),
        ];
        let results = analyze(&rows, &config(&["A", "B"])).unwrap();
        let long_keys = results
            .long
            .iter()
            .map(|obs| (obs.sample_id.as_str(), obs.group.as_str()))
            .unique()
            .collect::<Vec<_>>();
        let wide_keys = results
            .wide
            .rows
            .iter()
            .map(|row| (row.sample_id.as_str(), row.group.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(long_keys, wide_keys);
        assert!(results.wide.len() <= results.long.len());
    }

    #[test]
    fn test_empty_targets_degenerate_to_empty_output() {
        let results = analyze(&scenario_rows(), &config(&[])).unwrap();
        assert!(results.long.is_empty());
        assert!(results.wide.is_empty());
        assert!(results.summary.is_empty());
        assert_eq!(results.groups, vec!["Ctrl", "Treat"]);
    }
}
