//! Test data generators for synthetic sweep measurements.
//!
//! These generators create predictable, verifiable sweep patterns that can
//! be used across the test suite.

/// Evenly spaced values from `start` to `stop` (inclusive).
///
/// # Example
///
/// ```
/// use test_utils::linspace;
///
/// assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
/// ```
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Flattened meshgrid coordinates of a nested sweep.
///
/// The first axis is swept slowest, the last one fastest (row-major). The
/// returned vectors are in the same order as `axes`, each with
/// `product(len)` entries.
///
/// # Example
///
/// ```
/// use test_utils::sweep_coordinates;
///
/// let coords = sweep_coordinates(&[vec![0.0, 1.0], vec![5.0, 6.0, 7.0]]);
/// assert_eq!(coords[0], vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
/// assert_eq!(coords[1], vec![5.0, 6.0, 7.0, 5.0, 6.0, 7.0]);
/// ```
pub fn sweep_coordinates(axes: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let total: usize = axes.iter().map(Vec::len).product();
    let mut coords: Vec<Vec<f64>> = axes.iter().map(|_| Vec::with_capacity(total)).collect();

    for idx in 0..total {
        let mut rest = idx;
        for (dim, axis) in axes.iter().enumerate().rev() {
            coords[dim].push(axis[rest % axis.len()]);
            rest /= axis.len();
        }
    }
    coords
}

/// Predictable dependent values for a sweep: the record index times `scale`.
pub fn ramp(n: usize, scale: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 * scale).collect()
}

/// Copy of `data` with NaN at the given indices.
pub fn with_nans(data: &[f64], nan_positions: &[usize]) -> Vec<f64> {
    let mut out = data.to_vec();
    for &i in nan_positions {
        if i < out.len() {
            out[i] = f64::NAN;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace() {
        let v = linspace(-1.0, 1.0, 5);
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], -1.0);
        assert_eq!(v[4], 1.0);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_sweep_coordinates_three_axes() {
        let coords = sweep_coordinates(&[vec![0.0, 1.0], vec![0.0, 1.0], vec![0.0, 1.0, 2.0]]);
        assert_eq!(coords.len(), 3);
        assert!(coords.iter().all(|c| c.len() == 12));
        assert_eq!(coords[0][6], 1.0);
        assert_eq!(coords[1][3], 1.0);
        assert_eq!(coords[2][5], 2.0);
    }

    #[test]
    fn test_with_nans() {
        let data = with_nans(&ramp(5, 1.0), &[1, 10]);
        assert!(data[1].is_nan());
        assert_eq!(data[2], 2.0);
    }
}
