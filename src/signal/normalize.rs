use crate::signal::ScoreTable;

/// Rescale every signal column independently onto [0, 1] with min-max scaling
/// for this evaluation only. A column with no spread carries no ranking
/// information and maps deterministically to all zeros instead of dividing by
/// a zero range.
pub fn min_max(table: &mut ScoreTable) {
    let kinds: Vec<_> = table.kinds().collect();
    for kind in kinds {
        let Some(column) = table.column_mut(kind) else {
            continue;
        };
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in column.iter() {
            min = min.min(v);
            max = max.max(v);
        }
        let range = max - min;
        if range > f64::EPSILON {
            for v in column.iter_mut() {
                *v = (*v - min) / range;
            }
        } else {
            for v in column.iter_mut() {
                *v = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::signal::SignalKind;

    fn table_with(kind: SignalKind, values: Vec<f64>) -> ScoreTable {
        let cfg = Config::reference().signals;
        let mut table = ScoreTable::new(values.len());
        table.insert_column(kind, values.into_iter().map(Ok).collect(), &cfg);
        table
    }

    #[test]
    fn scales_to_unit_range() {
        let mut table = table_with(SignalKind::Frequency, vec![2.0, 4.0, 6.0]);
        min_max(&mut table);
        let column = table.column(SignalKind::Frequency).unwrap();
        assert_eq!(column, &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn negative_ranges_are_handled() {
        let mut table = table_with(SignalKind::TrendSlope, vec![-1.0, 0.0, 3.0]);
        min_max(&mut table);
        let column = table.column(SignalKind::TrendSlope).unwrap();
        assert_eq!(column[0], 0.0);
        assert_eq!(column[2], 1.0);
        assert!((column[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn constant_column_becomes_zeros() {
        let mut table = table_with(SignalKind::Momentum, vec![0.7, 0.7, 0.7]);
        min_max(&mut table);
        let column = table.column(SignalKind::Momentum).unwrap();
        assert_eq!(column, &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn idempotent() {
        let mut table = table_with(SignalKind::Frequency, vec![1.0, 3.0, 5.0, 2.0]);
        min_max(&mut table);
        let first: Vec<f64> = table.column(SignalKind::Frequency).unwrap().to_vec();
        min_max(&mut table);
        assert_eq!(table.column(SignalKind::Frequency).unwrap(), first.as_slice());
    }
}
