use bon::Builder;
use derive_new::new;
use serde::Serialize;

/// Control-group means of one gene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, new)]
pub struct ControlBaseline {
    pub housekeeping_mean: f64,
    pub target_mean: f64,
}

/// A single normalized (sample, gene) observation
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
pub struct LongObservation {
    #[builder(into)]
    pub sample_id: String,
    #[builder(into)]
    pub group: String,
    #[builder(into)]
    pub gene: String,
    pub ct_housekeeping: f64,
    pub ct_target: f64,
    pub delta_ct_housekeeping: f64,
    pub delta_ct_target: f64,
    #[serde(rename = "pow2_delta_ct_housekeeping")]
    pub housekeeping_factor: f64,
    #[serde(rename = "pow2_delta_ct_target")]
    pub target_factor: f64,
    pub normalized_expression: f64,
    pub log2_expression: f64,
}

/// One sample of the wide table
///
/// `log2_expression` is aligned with [`WideTable::genes`]; `None` where the
/// sample had no valid observation for that gene.
#[derive(Debug, Clone, PartialEq, new)]
pub struct WideRow {
    pub sample_id: String,
    pub group: String,
    pub log2_expression: Vec<Option<f64>>,
}

/// Log2 expression pivoted to one row per (sample, group)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideTable {
    pub genes: Vec<String>,
    pub rows: Vec<WideRow>,
}
impl WideTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Log2 expression of `gene` in row `index`
    pub fn value(&self, index: usize, gene: &str) -> Option<f64> {
        let column = self.genes.iter().position(|g| g == gene)?;
        self.rows.get(index)?.log2_expression[column]
    }
}

/// Per-gene processing counts and baseline
#[derive(Debug, Clone, PartialEq, Serialize, new)]
pub struct GeneSummary {
    pub gene: String,
    pub processed: usize,
    pub discarded: usize,
    pub baseline: Option<ControlBaseline>,
}

/// Log2 values of one gene within one group, in long-table order
#[derive(Debug, Clone, PartialEq, Serialize, new)]
pub struct GroupSeries {
    pub group: String,
    pub log2_expression: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct AnalysisResults {
    pub long: Vec<LongObservation>,
    pub wide: WideTable,
    pub summary: Vec<GeneSummary>,
    pub groups: Vec<String>,
}
impl AnalysisResults {
    /// Observations of a single gene
    pub fn observations_for<'a>(
        &'a self,
        gene: &'a str,
    ) -> impl Iterator<Item = &'a LongObservation> + 'a {
        self.long.iter().filter(move |obs| obs.gene == gene)
    }

    /// Log2 expression of `gene` split by group, groups in first-seen order
    pub fn gene_series(&self, gene: &str) -> Vec<GroupSeries> {
        let mut series: Vec<GroupSeries> = Vec::new();
        for obs in self.observations_for(gene) {
            match series.iter_mut().find(|s| s.group == obs.group) {
                Some(s) => s.log2_expression.push(obs.log2_expression),
                None => series.push(GroupSeries::new(
                    obs.group.clone(),
                    vec![obs.log2_expression],
                )),
            }
        }
        series
    }

    pub fn pprint(&self, control_group: &str) {
        println!("Gene\tControl\tProcessed\tDiscarded\tControl HK Mean\tControl Target Mean");
        for summary in &self.summary {
            let (hk, target) = match summary.baseline {
                Some(b) => (b.housekeeping_mean.to_string(), b.target_mean.to_string()),
                None => ("NA".to_string(), "NA".to_string()),
            };
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                summary.gene, control_group, summary.processed, summary.discarded, hk, target
            );
        }
    }
}
