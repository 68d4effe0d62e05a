use bon::Builder;
use itertools::Itertools;

use crate::error::{DdctError, Result};

/// Column selection and control group for one analysis run
#[derive(Debug, Clone, Builder)]
pub struct AnalysisConfig {
    /// Column holding the sample identifier
    #[builder(into)]
    pub sample_column: String,
    /// Column holding the group label
    #[builder(into)]
    pub group_column: String,
    /// Column holding the housekeeping-gene Ct
    #[builder(into)]
    pub housekeeping_column: String,
    /// Target-gene Ct columns, in output order
    pub target_columns: Vec<String>,
    /// Group label used as the normalization baseline
    #[builder(into)]
    pub control_group: String,
}

impl AnalysisConfig {
    /// Checks the preconditions the analysis assumes against a table's headers
    ///
    /// The analysis itself never calls this: unmatched columns there simply
    /// produce discarded observations.
    pub fn validate(&self, headers: &[String]) -> Result<()> {
        let named = [
            ("sample", &self.sample_column),
            ("group", &self.group_column),
            ("housekeeping", &self.housekeeping_column),
        ];
        for (role, column) in named {
            if column.trim().is_empty() {
                return Err(DdctError::InvalidConfig(format!(
                    "no {role} column selected"
                )));
            }
        }
        if self.control_group.trim().is_empty() {
            return Err(DdctError::InvalidConfig(
                "no control group selected".to_string(),
            ));
        }
        if self.target_columns.is_empty() {
            return Err(DdctError::InvalidConfig(
                "at least one target gene must be selected".to_string(),
            ));
        }
        if let Some(gene) = self.target_columns.iter().duplicates().next() {
            return Err(DdctError::InvalidConfig(format!(
                "target gene '{gene}' selected more than once"
            )));
        }

        let columns = named
            .iter()
            .map(|(_, column)| *column)
            .chain(self.target_columns.iter());
        for column in columns {
            if !headers.contains(column) {
                return Err(DdctError::MissingColumn(column.clone()));
            }
        }
        Ok(())
    }
}
