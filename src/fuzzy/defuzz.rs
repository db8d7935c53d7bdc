//! Output-universe sampling and centroid defuzzification.

/// Sample points `lo, lo + step, ...` up to and including `hi`.
pub fn sample_universe(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    let n = ((hi - lo) / step + 1e-9).floor() as usize;
    let mut xs: Vec<f64> = (0..=n).map(|k| (lo + k as f64 * step).min(hi)).collect();
    if let Some(&last) = xs.last() {
        if hi - last > step * 1e-6 {
            xs.push(hi);
        }
    }
    xs
}

/// Centre of gravity of the piecewise-linear function through `(xs[i], ys[i])`.
///
/// Each segment is integrated as a trapezoid. Returns `None` when the total
/// area is zero (nothing fired), which callers map to a neutral fallback.
pub fn centroid(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let mut area = 0.0;
    let mut moment = 0.0;
    for (x, y) in xs.windows(2).zip(ys.windows(2)) {
        let (x1, x2) = (x[0], x[1]);
        let (y1, y2) = (y[0], y[1]);
        let dx = x2 - x1;
        let h = y1 + y2;
        if dx <= 0.0 || h <= 0.0 {
            continue;
        }
        let seg_area = h * dx / 2.0;
        let seg_centroid = x1 + dx * (y1 + 2.0 * y2) / (3.0 * h);
        area += seg_area;
        moment += seg_area * seg_centroid;
    }
    if area > 0.0 && moment.is_finite() {
        Some(moment / area)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_include_both_ends() {
        let xs = sample_universe(0.0, 1.0, 0.1);
        assert_eq!(xs.len(), 11);
        assert_eq!(xs[0], 0.0);
        assert_eq!(*xs.last().unwrap(), 1.0);

        let uneven = sample_universe(0.0, 1.0, 0.3);
        assert_eq!(uneven.len(), 5);
        assert_eq!(*uneven.last().unwrap(), 1.0);
    }

    #[test]
    fn symmetric_shape_centroid_is_its_axis() {
        let xs = sample_universe(0.0, 1.0, 0.1);
        let ys: Vec<f64> = xs
            .iter()
            .map(|&x| (1.0 - (x - 0.5).abs() / 0.2).max(0.0))
            .collect();
        let c = centroid(&xs, &ys).unwrap();
        assert!((c - 0.5).abs() < 1e-9, "got {c}");
    }

    #[test]
    fn flat_function_centroid_is_midpoint() {
        let xs = sample_universe(0.0, 1.0, 0.1);
        let ys = vec![0.4; xs.len()];
        assert!((centroid(&xs, &ys).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn zero_function_has_no_centroid() {
        let xs = sample_universe(0.0, 1.0, 0.1);
        let ys = vec![0.0; xs.len()];
        assert!(centroid(&xs, &ys).is_none());
    }

    #[test]
    fn single_ramp_centroid() {
        // y = x on [0, 1]: centroid 2/3.
        let xs = vec![0.0, 1.0];
        let ys = vec![0.0, 1.0];
        assert!((centroid(&xs, &ys).unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }
}
