//! Statistics of a group.

use std::collections::HashMap;

use crate::columns::ColId;

/// Statistics shared by all expressions of a group.
///
/// Row counts may be estimates; they only feed the cost model and never
/// affect plan correctness.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Statistics {
    row_count: f64,
    column_stats: HashMap<ColId, ColumnStatistics>,
}

/// Statistics of one column.
#[derive(Clone, PartialEq, Debug)]
pub struct ColumnStatistics {
    /// Number of distinct values.
    pub ndv: f64,
}

impl Statistics {
    pub const DEFAULT_FILTER_SELECTIVITY: f64 = 0.25;

    pub fn with_row_count(row_count: f64) -> Self {
        Self {
            row_count,
            column_stats: HashMap::new(),
        }
    }

    pub fn row_count(&self) -> f64 {
        self.row_count
    }

    pub fn column_stats(&self, col: ColId) -> Option<&ColumnStatistics> {
        self.column_stats.get(&col)
    }

    pub fn set_column_stats(&mut self, col: ColId, stats: ColumnStatistics) {
        self.column_stats.insert(col, stats);
    }

    /// Apply a selectivity factor, scaling rows and per-column ndv.
    pub fn scaled(&self, selectivity: f64) -> Statistics {
        Statistics {
            row_count: self.row_count * selectivity,
            column_stats: self
                .column_stats
                .iter()
                .map(|(col, stats)| {
                    (
                        *col,
                        ColumnStatistics {
                            ndv: (stats.ndv * selectivity).max(1.0),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_keeps_ndv_at_least_one() {
        let mut stats = Statistics::with_row_count(1000.0);
        stats.set_column_stats(ColId(1), ColumnStatistics { ndv: 2.0 });

        let scaled = stats.scaled(0.1);
        assert_eq!(100.0, scaled.row_count());
        assert_eq!(1.0, scaled.column_stats(ColId(1)).unwrap().ndv);
    }
}
