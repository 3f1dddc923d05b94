//! Record filters
//!
//! Narrow a heterogeneous archive to one consistent cube before grouping.
//! Filtering to nothing is allowed and yields an empty dataset.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::error::{Result, TdlpackError};

use super::axis::{AxisName, AxisValue};

/// Filters keyed by axis
pub type Filters = BTreeMap<AxisName, Filter>;

/// Which coordinate values to keep along one axis
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Exact(AxisValue),
    Values(Vec<AxisValue>),
    /// Half-open: `start <= value < end`
    Range { start: AxisValue, end: AxisValue },
}

impl Filter {
    pub fn exact(value: impl Into<AxisValue>) -> Self {
        Filter::Exact(value.into())
    }

    pub fn values(values: impl IntoIterator<Item = AxisValue>) -> Self {
        Filter::Values(values.into_iter().collect())
    }

    pub fn range(range: Range<AxisValue>) -> Self {
        Filter::Range {
            start: range.start,
            end: range.end,
        }
    }

    pub fn matches(&self, value: &AxisValue) -> bool {
        match self {
            Filter::Exact(want) => want == value,
            Filter::Values(wanted) => wanted.contains(value),
            Filter::Range { start, end } => start <= value && value < end,
        }
    }

    fn values_iter(&self) -> Box<dyn Iterator<Item = &AxisValue> + '_> {
        match self {
            Filter::Exact(value) => Box::new(std::iter::once(value)),
            Filter::Values(values) => Box::new(values.iter()),
            Filter::Range { start, end } => Box::new([start, end].into_iter()),
        }
    }
}

/// Reject filters on geometry axes or with values of the wrong kind
pub(crate) fn check_filters(filters: &Filters) -> Result<()> {
    for (axis, filter) in filters {
        if axis.is_spatial() {
            return Err(TdlpackError::validation(format!(
                "cannot filter records on geometry axis '{}'",
                axis
            )));
        }
        if let Some(value) = filter.values_iter().find(|value| !value.fits(*axis)) {
            return Err(TdlpackError::validation(format!(
                "filter value {} does not fit axis '{}'",
                value, axis
            )));
        }
    }
    Ok(())
}
