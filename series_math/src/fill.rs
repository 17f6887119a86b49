//! Gap filling

use crate::{is_observed, MathError, Result};

/// Carry the last observation forward over gaps. Leading gaps stay gaps.
pub fn forward_fill(values: &mut [f64]) {
    let mut last = f64::NAN;
    for v in values.iter_mut() {
        if is_observed(*v) {
            last = *v;
        } else {
            *v = last;
        }
    }
}

/// Fill gaps in `values` from the same position in `fallback`.
pub fn fill_missing(values: &mut [f64], fallback: &[f64]) -> Result<()> {
    if values.len() != fallback.len() {
        return Err(MathError::LengthMismatch {
            expected: values.len(),
            got: fallback.len(),
        });
    }
    for (v, f) in values.iter_mut().zip(fallback) {
        if !is_observed(*v) {
            *v = *f;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_fill() {
        let mut values = [f64::NAN, 1.0, f64::NAN, f64::NAN, 4.0, f64::NAN];
        forward_fill(&mut values);
        assert!(values[0].is_nan());
        assert_eq!(&values[1..], &[1.0, 1.0, 1.0, 4.0, 4.0]);
    }

    #[test]
    fn test_fill_missing_only_touches_gaps() {
        let mut values = [1.0, f64::NAN, 3.0];
        fill_missing(&mut values, &[9.0, 2.0, 9.0]).unwrap();
        assert_eq!(values, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fill_missing_length_mismatch() {
        let mut values = [1.0];
        assert_eq!(
            fill_missing(&mut values, &[1.0, 2.0]),
            Err(MathError::LengthMismatch {
                expected: 1,
                got: 2
            })
        );
    }
}
