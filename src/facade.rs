use std::collections::BTreeMap;

use crate::core::{DataHeader, DataSet, Parameter};
use crate::error::{IndexError, Result};
use crate::read::Container;
use crate::{
    ALGORITHM_PARAM_PREFIX, CHIP_SUMMARY_PREFIX, PARAM_ALGORITHM_NAME, PARAM_CHIP_TYPE,
    PARAM_NUM_COLUMNS, PARAM_NUM_ROWS,
};

/// Convenience view over a container's root header and primary data set.
///
/// Well-known parameters are lifted into named fields; prefixed algorithm
/// parameters and chip summary statistics are collected into maps keyed by the
/// name with its prefix removed.
#[derive(Debug)]
pub struct Facade<'a> {
    container: &'a Container,
    primary: &'a DataSet,
    pub chip_type: Option<String>,
    pub algorithm_name: Option<String>,
    pub num_rows: usize,
    pub num_columns: usize,
    pub parameters: BTreeMap<String, String>,
    pub statistics: BTreeMap<String, String>,
}
impl<'a> Facade<'a> {
    /// Builds the view, taking the first data set of the first group as primary
    pub fn new(container: &'a Container) -> Result<Self> {
        let group = container
            .data_groups()
            .first()
            .ok_or(IndexError::EmptyContainer)?;
        let primary = group.data_set(0)?;

        let mut facade = Self {
            container,
            primary,
            chip_type: None,
            algorithm_name: None,
            num_rows: 0,
            num_columns: 0,
            parameters: BTreeMap::new(),
            statistics: BTreeMap::new(),
        };
        for param in container.root_header().parameters() {
            facade.absorb(param);
        }
        Ok(facade)
    }

    fn absorb(&mut self, param: &Parameter) {
        match param.name.as_str() {
            PARAM_NUM_COLUMNS => self.num_columns = dimension(param),
            PARAM_NUM_ROWS => self.num_rows = dimension(param),
            PARAM_CHIP_TYPE => self.chip_type = Some(param.value_text()),
            PARAM_ALGORITHM_NAME => self.algorithm_name = Some(param.value_text()),
            name => {
                if let Some(key) = name.strip_prefix(ALGORITHM_PARAM_PREFIX) {
                    self.parameters.insert(key.to_string(), param.value_text());
                } else if let Some(key) = name.strip_prefix(CHIP_SUMMARY_PREFIX) {
                    self.statistics.insert(key.to_string(), param.value_text());
                }
            }
        }
    }

    #[must_use]
    pub fn container(&self) -> &'a Container {
        self.container
    }

    #[must_use]
    pub fn header(&self) -> &'a DataHeader {
        self.container.root_header()
    }

    /// The data set the facade reports on
    #[must_use]
    pub fn primary(&self) -> &'a DataSet {
        self.primary
    }

    /// Root header parameter with exactly this name
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&'a Parameter> {
        self.container.root_header().parameter(name)
    }

    /// Column names of the primary data set, in order
    #[must_use]
    pub fn quantitation_types(&self) -> Vec<&'a str> {
        self.primary.columns().iter().map(|c| c.name()).collect()
    }

    /// Number of features on the array, saturating on absurd dimensions
    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.num_rows.saturating_mul(self.num_columns)
    }
}

fn dimension(param: &Parameter) -> usize {
    param
        .value
        .as_i64()
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or_default()
}
