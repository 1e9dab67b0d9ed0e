//! Numerical helpers: invalid-aware comparison, reshaping with padding,
//! sweep-period detection and meshgrid vertex repair.

use std::cmp::Ordering;

use ndarray::{ArrayD, ArrayViewMut1, Axis};
use tracing::debug;

use crate::error::{DataDictError, Result};
use crate::values::{DType, Values};

/// Default relative tolerance used by [`arrays_equal`].
pub const DEFAULT_RTOL: f64 = 1e-8;

/// Absolute tolerance used together with the relative tolerance.
const ATOL: f64 = 1e-8;

/// Percentile spread used as the jump threshold in switch detection.
const SWITCH_PERCENTILE: f64 = 25.0;

const ZERO_TOL: f64 = 1e-15;

/// Repetition period of an axis in a flattened sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPeriod {
    /// The sweep direction flips every `n` records.
    Finite(usize),
    /// The direction never flipped: the axis is not (yet) repeating.
    Unbounded,
}

/// Element-wise invalid markers of `values`.
pub fn is_invalid(values: &Values) -> ArrayD<bool> {
    values.invalid_mask()
}

/// Content equality of two arrays.
///
/// Elements compare equal when they are identical, close within `rtol` (float
/// and complex only), or both invalid. Arrays of different shape are never
/// equal.
pub fn arrays_equal(a: &Values, b: &Values, rtol: f64) -> bool {
    if a.shape() != b.shape() {
        return false;
    }
    let invalid_a = a.invalid_mask();
    let invalid_b = b.invalid_mask();

    match a.dtype().promote(b.dtype()) {
        DType::Complex128 => {
            let (ca, cb) = (a.to_complex(), b.to_complex());
            let invalid = invalid_a.iter().zip(invalid_b.iter());
            ca.iter().zip(cb.iter()).zip(invalid).all(|((x, y), (ia, ib))| {
                (*ia && *ib) || x == y || (x - y).norm() <= ATOL + rtol * y.norm()
            })
        }
        DType::Float64 => {
            let (fa, fb) = (a.to_f64(), b.to_f64());
            let invalid = invalid_a.iter().zip(invalid_b.iter());
            fa.iter().zip(fb.iter()).zip(invalid).all(|((x, y), (ia, ib))| {
                (*ia && *ib) || x == y || (x - y).abs() <= ATOL + rtol * y.abs()
            })
        }
        DType::Int64 | DType::Bool => match (a.cast(DType::Int64), b.cast(DType::Int64)) {
            (Ok(Values::Int(x)), Ok(Values::Int(y))) => x == y,
            _ => false,
        },
    }
}

/// Flatten `values` and bring them into `target_shape`.
///
/// Surplus elements are cut off at the end; missing elements are filled with
/// invalid entries. Integer and boolean input is promoted to float so that it
/// can hold NaN padding.
pub fn array1d_to_meshgrid(values: &Values, target_shape: &[usize]) -> Result<Values> {
    let flat = values.flatten();
    let size = flat.size();
    let newsize: usize = target_shape.iter().product();

    if newsize <= size {
        return flat.slice_rows(0, newsize).reshape(target_shape);
    }

    let dtype = if flat.dtype() == DType::Complex128 {
        DType::Complex128
    } else {
        DType::Float64
    };
    let padding = Values::invalid(dtype, &[newsize - size]);
    flat.cast(dtype)?.concat_rows(&padding)?.reshape(target_shape)
}

/// Percentile of sorted data with linear interpolation between neighbours.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q / 100.0 * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Sign with `sign(0) == 0`.
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Indices of the deltas at which the sweep direction switches.
fn find_switches(vals: &[f64]) -> Vec<usize> {
    let mut valid: Vec<f64> = vals.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        return Vec::new();
    }
    valid.sort_by(f64::total_cmp);

    let deltas: Vec<Option<f64>> = vals
        .windows(2)
        .map(|w| {
            if w[0].is_nan() || w[1].is_nan() {
                None
            } else {
                Some(w[1] - w[0])
            }
        })
        .collect();

    let hi = percentile(&valid, 100.0 - SWITCH_PERCENTILE);
    let lo = percentile(&valid, SWITCH_PERCENTILE);
    let spread = (hi - lo).abs();
    if !(spread > ZERO_TOL) {
        return Vec::new();
    }

    let candidates: Vec<usize> = deltas
        .iter()
        .enumerate()
        .filter_map(|(i, d)| match d {
            Some(d) if i > 0 && d.abs() >= spread => Some(i),
            _ => None,
        })
        .collect();
    let Some(&first) = candidates.first() else {
        return Vec::new();
    };

    // Switches run against the direction of the sweep before the first jump.
    let prior: Vec<f64> = deltas[..first].iter().flatten().copied().collect();
    let direction = if prior.is_empty() {
        0.0
    } else {
        sign(prior.iter().sum::<f64>() / prior.len() as f64)
    };

    candidates
        .into_iter()
        .filter(|&i| deltas[i].map(sign) == Some(-direction))
        .collect()
}

/// Number of records after which the sweep direction of `vals` flips.
///
/// Returns `None` when no unique period exists. With `ignore_last`, a shorter
/// final period (an incomplete last sweep) is disregarded.
pub fn find_direction_period(vals: &[f64], ignore_last: bool) -> Option<SweepPeriod> {
    let mut switches = find_switches(vals);
    let size = vals.len();

    match switches.len() {
        0 => return Some(SweepPeriod::Unbounded),
        1 => {
            return if switches[0] as f64 >= size as f64 / 2.0 - 1.0 {
                Some(SweepPeriod::Finite(switches[0] + 1))
            } else {
                None
            };
        }
        _ => {}
    }

    if switches.last().is_some_and(|&last| last < size - 1) {
        switches.push(size - 1);
    }
    let mut periods: Vec<usize> = switches.windows(2).map(|w| w[1] - w[0]).collect();
    if ignore_last && periods.len() > 1 && periods[periods.len() - 1] < periods[0] {
        periods.pop();
    }

    match periods.first() {
        None => Some(SweepPeriod::Finite(size)),
        Some(&p) if periods.iter().all(|&q| q == p) => Some(SweepPeriod::Finite(p)),
        Some(_) => None,
    }
}

/// Likelihood of an unbounded axis being slow: the less diverse, the larger.
fn diversity_cost(vals: &[f64]) -> f64 {
    let valid: Vec<f64> = vals.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        return f64::INFINITY;
    }
    let n = valid.len() as f64;
    let mut mean = valid.iter().sum::<f64>() / n;
    let std = (valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std == 0.0 {
        return f64::INFINITY;
    }
    if mean == 0.0 {
        let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
        mean = max.abs().max(min.abs());
    }
    1.0 / (std / mean).abs()
}

/// Infer axis order and grid shape from flattened sweep coordinates.
///
/// Returns the axis names ordered slow to fast and the matching shape, or
/// `None` when the sweep is ambiguous. Axes with equal sort keys keep their
/// input order.
pub fn guess_grid_from_sweep_direction(
    axes: &[(&str, &[f64])],
) -> Result<Option<(Vec<String>, Vec<usize>)>> {
    let Some((_, first)) = axes.first() else {
        return Err(DataDictError::invalid_argument("empty input"));
    };
    let size = first.len();

    let mut entries: Vec<(usize, f64, SweepPeriod)> = Vec::with_capacity(axes.len());
    for (idx, (name, vals)) in axes.iter().enumerate() {
        if vals.len() != size {
            return Err(DataDictError::invalid_argument(format!(
                "non-matching array sizes: '{name}' has {} values, expected {size}",
                vals.len()
            )));
        }
        let Some(period) = find_direction_period(vals, true) else {
            debug!(axis = %name, "no unique sweep period");
            return Ok(None);
        };
        let key = match period {
            SweepPeriod::Finite(p) => p as f64,
            SweepPeriod::Unbounded => size as f64 + diversity_cost(vals),
        };
        entries.push((idx, key, period));
    }

    // Fast to slow; later inputs first on ties so the reversed order keeps input order.
    entries.sort_by(|a, b| match a.1.total_cmp(&b.1) {
        Ordering::Equal => b.0.cmp(&a.0),
        other => other,
    });

    let mut divisor = 1usize;
    let mut shape = Vec::with_capacity(entries.len());
    for (_, _, period) in &entries {
        let extent = match period {
            SweepPeriod::Unbounded if size % divisor > 0 => size / divisor + 1,
            SweepPeriod::Unbounded => size / divisor,
            SweepPeriod::Finite(p) => p / divisor,
        };
        if extent == 0 {
            return Ok(None);
        }
        shape.push(extent);
        divisor *= extent;
    }

    if divisor < size {
        return Ok(None);
    }

    let names = entries
        .iter()
        .rev()
        .map(|(idx, _, _)| axes[*idx].0.to_string())
        .collect();
    shape.reverse();
    Ok(Some((names, shape)))
}

/// Fill invalid vertices of a meshgrid coordinate array.
///
/// Along every dimension other than `sweep_dim` the coordinate is constant, so
/// gaps are linearly interpolated and trailing gaps forward-filled. Along
/// `sweep_dim` only interior gaps are interpolated.
pub fn interpolate_vertices(arr: &ArrayD<f64>, sweep_dim: usize) -> ArrayD<f64> {
    let mut out = arr.clone();
    for dim in 0..out.ndim() {
        if dim == sweep_dim {
            continue;
        }
        for mut lane in out.lanes_mut(Axis(dim)) {
            fill_lane(&mut lane, true);
        }
    }
    if sweep_dim < out.ndim() {
        for mut lane in out.lanes_mut(Axis(sweep_dim)) {
            fill_lane(&mut lane, false);
        }
    }
    out
}

fn fill_lane(lane: &mut ArrayViewMut1<'_, f64>, forward_fill: bool) {
    let n = lane.len();
    let mut prev: Option<usize> = None;
    for i in 0..n {
        if lane[i].is_nan() {
            continue;
        }
        if let Some(p) = prev {
            if i - p > 1 {
                let (start, end) = (lane[p], lane[i]);
                let span = (i - p) as f64;
                for j in p + 1..i {
                    lane[j] = start + (end - start) * (j - p) as f64 / span;
                }
            }
        }
        prev = Some(i);
    }
    if forward_fill {
        if let Some(p) = prev {
            let last = lane[p];
            for j in p + 1..n {
                lane[j] = last;
            }
        }
    }
}

/// Indices to keep per dimension so that every mask is free of invalid entries.
///
/// First drops hyperslices that are entirely invalid in any mask, then drops
/// trailing slices of the outermost offending dimension until the remaining
/// block is fully valid. All masks must share one shape.
pub fn crop_valid_indices(masks: &[ArrayD<bool>]) -> Vec<Vec<usize>> {
    let Some(first) = masks.first() else {
        return Vec::new();
    };
    let shape = first.shape().to_vec();
    let mut keep: Vec<Vec<usize>> = shape.iter().map(|&n| (0..n).collect()).collect();

    for (dim, kept) in keep.iter_mut().enumerate() {
        kept.retain(|&i| {
            masks
                .iter()
                .all(|m| !m.index_axis(Axis(dim), i).iter().all(|&invalid| invalid))
        });
    }

    loop {
        let blocks: Vec<ArrayD<bool>> = masks.iter().map(|m| select_block(m, &keep)).collect();
        if blocks.iter().all(|b| b.iter().all(|&invalid| !invalid)) {
            break;
        }
        let offending = (0..keep.len()).find(|&dim| {
            !keep[dim].is_empty()
                && blocks.iter().any(|b| {
                    let last = b.len_of(Axis(dim)) - 1;
                    b.index_axis(Axis(dim), last).iter().any(|&invalid| invalid)
                })
        });
        match offending {
            Some(dim) => {
                keep[dim].pop();
            }
            None => break,
        }
    }
    keep
}

fn select_block(mask: &ArrayD<bool>, keep: &[Vec<usize>]) -> ArrayD<bool> {
    keep.iter()
        .enumerate()
        .fold(mask.clone(), |block, (dim, idx)| block.select(Axis(dim), idx))
}
