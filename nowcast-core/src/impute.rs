//! Missing-value imputation for covariate tables.
//!
//! Two passes per column, in row order:
//! 1. backward fill from the nearest later observation
//! 2. linear interpolation between neighbours; trailing gaps carry the last
//!    observation forward, leading gaps stay missing
//!
//! After pass 1 the only gaps left are trailing ones, so in practice pass 2
//! extends the last observation. A column with no observations stays empty.

use crate::frame::Frame;

/// Impute every column of `frame`. Observed values are never changed.
pub fn impute(frame: &Frame) -> Frame {
    let mut out = frame.clone();
    for column in out.columns_mut() {
        backfill(&mut column.values);
        interpolate_linear(&mut column.values);
    }
    out
}

/// Replace each gap with the nearest later observed value.
pub fn backfill(values: &mut [Option<f64>]) {
    let mut next = None;
    for v in values.iter_mut().rev() {
        match v {
            Some(x) => next = Some(*x),
            None => *v = next,
        }
    }
}

/// Fill gaps on the straight line between the surrounding observations.
///
/// Gaps after the last observation take its value; gaps before the first
/// observation are left alone.
pub fn interpolate_linear(values: &mut [Option<f64>]) {
    let mut prev: Option<(usize, f64)> = None;
    let mut i = 0;
    while i < values.len() {
        let Some(x) = values[i] else {
            i += 1;
            continue;
        };
        if let Some((p, px)) = prev {
            let span = (i - p) as f64;
            for (k, slot) in values.iter_mut().enumerate().take(i).skip(p + 1) {
                let t = (k - p) as f64 / span;
                *slot = Some(px + (x - px) * t);
            }
        }
        prev = Some((i, x));
        i += 1;
    }
    if let Some((p, px)) = prev {
        for slot in &mut values[p + 1..] {
            *slot = Some(px);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;

    #[test]
    fn backfill_uses_next_observation() {
        let mut v = vec![None, Some(2.0), None, None, Some(5.0), None];
        backfill(&mut v);
        assert_eq!(v, vec![Some(2.0), Some(2.0), Some(5.0), Some(5.0), Some(5.0), None]);
    }

    #[test]
    fn interpolation_is_linear_between_neighbours() {
        let mut v = vec![Some(1.0), None, None, Some(4.0)];
        interpolate_linear(&mut v);
        assert_eq!(v, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn interpolation_extends_trailing_gap() {
        let mut v = vec![Some(1.0), Some(3.0), None, None];
        interpolate_linear(&mut v);
        assert_eq!(v, vec![Some(1.0), Some(3.0), Some(3.0), Some(3.0)]);
    }

    #[test]
    fn interpolation_leaves_leading_gap() {
        let mut v = vec![None, Some(3.0)];
        interpolate_linear(&mut v);
        assert_eq!(v, vec![None, Some(3.0)]);
    }

    #[test]
    fn impute_fills_trailing_gap_after_backfill() {
        let frame = Frame::from_columns(
            5,
            vec![Column::new("x", vec![None, Some(2.0), None, Some(4.0), None])],
        )
        .unwrap();
        let out = impute(&frame);
        assert_eq!(
            out.column("x").unwrap().values,
            vec![Some(2.0), Some(2.0), Some(4.0), Some(4.0), Some(4.0)]
        );
    }

    #[test]
    fn all_missing_column_stays_missing() {
        let frame = Frame::from_columns(3, vec![Column::new("x", vec![None; 3])]).unwrap();
        assert_eq!(impute(&frame), frame);
    }

    #[test]
    fn empty_frame_is_unchanged() {
        let frame = Frame::empty(7);
        assert_eq!(impute(&frame), frame);
    }

    #[test]
    fn dense_frame_is_unchanged() {
        let frame = Frame::from_columns(2, vec![Column::dense("x", &[1.0, 2.0])]).unwrap();
        assert_eq!(impute(&frame), frame);
    }
}
