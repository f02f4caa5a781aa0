//! Matrix profile via STOMP.
//!
//! For every length-`w` sub-sequence of a series, the matrix profile holds the
//! z-normalised Euclidean distance to its nearest non-trivial neighbour in the
//! same series. Values near zero mark repeated shapes (motifs), the largest
//! values mark anomalies (discords).
//!
//! The first row of sliding dot products is computed with an FFT convolution;
//! every later row is derived from the previous one in O(n), giving the usual
//! O(n²) STOMP total.

use rustfft::{FftPlanner, num_complex::Complex};

/// Default sub-sequence window.
pub const DEFAULT_WINDOW: usize = 20;

// ═══════════════════════════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Matrix profile of one series.
#[derive(Debug, Clone)]
pub struct MatrixProfile {
    pub window: usize,
    /// Nearest-neighbour distance per sub-sequence; length `n - w + 1`.
    pub profile: Vec<f64>,
    /// Offset of that nearest neighbour.
    pub index: Vec<usize>,
}

impl MatrixProfile {
    pub fn len(&self) -> usize {
        self.profile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profile.is_empty()
    }
}

/// A motif: a sub-sequence and its nearest neighbour.
#[derive(Debug, Clone, PartialEq)]
pub struct Motif {
    pub index: usize,
    pub neighbor: usize,
    pub distance: f64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Resample `values` onto `n` uniform points.
///
/// Snapshots are treated as uniformly spaced, so this is the identity.
// TODO: interpolate on per-reading timestamps once snapshots carry acquisition spacing.
pub fn resample(values: &[f64], n: usize) -> Vec<f64> {
    debug_assert_eq!(values.len(), n);
    values.to_vec()
}

/// True when `i` and `j` are trivial matches for window `w` (`|i - j| <= w/4`).
pub fn in_exclusion_zone(i: usize, j: usize, w: usize) -> bool {
    4 * i.abs_diff(j) <= w
}

/// Per-window mean and population standard deviation.
pub fn moving_mean_std(values: &[f64], w: usize) -> (Vec<f64>, Vec<f64>) {
    if w == 0 || w > values.len() {
        return (Vec::new(), Vec::new());
    }
    let count = values.len() - w + 1;
    let mut means = Vec::with_capacity(count);
    let mut stds = Vec::with_capacity(count);
    for window in values.windows(w) {
        let mean = window.iter().sum::<f64>() / w as f64;
        let var = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / w as f64;
        means.push(mean);
        stds.push(var.sqrt());
    }
    (means, stds)
}

/// Dot product of `query` against every same-length window of `series`,
/// computed as an FFT convolution.
pub fn sliding_dot_product(query: &[f64], series: &[f64]) -> Vec<f64> {
    let m = query.len();
    let n = series.len();
    if m == 0 || m > n {
        return Vec::new();
    }
    let size = n + m;

    let mut a: Vec<Complex<f64>> = series
        .iter()
        .map(|&x| Complex { re: x, im: 0.0 })
        .chain(std::iter::repeat_n(Complex { re: 0.0, im: 0.0 }, m))
        .collect();
    let mut b: Vec<Complex<f64>> = query
        .iter()
        .rev()
        .map(|&x| Complex { re: x, im: 0.0 })
        .chain(std::iter::repeat_n(Complex { re: 0.0, im: 0.0 }, n))
        .collect();

    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(size);
    forward.process(&mut a);
    forward.process(&mut b);
    for (x, y) in a.iter_mut().zip(&b) {
        *x *= *y;
    }
    let inverse = planner.plan_fft_inverse(size);
    inverse.process(&mut a);

    let scale = size as f64;
    (0..=n - m).map(|j| a[j + m - 1].re / scale).collect()
}

fn is_flat(mean: f64, std: f64) -> bool {
    std <= 1e-12 * (1.0 + mean.abs())
}

/// z-normalised distance from a precomputed dot product.
///
/// Two flat windows are identical (0); a flat window against a varying one is
/// at the uncorrelated distance √w.
fn znorm_distance(qt: f64, w: usize, mu_i: f64, sd_i: f64, mu_j: f64, sd_j: f64) -> f64 {
    let wf = w as f64;
    match (is_flat(mu_i, sd_i), is_flat(mu_j, sd_j)) {
        (true, true) => 0.0,
        (true, false) | (false, true) => wf.sqrt(),
        (false, false) => {
            let corr = ((qt - wf * mu_i * mu_j) / (wf * sd_i * sd_j)).clamp(-1.0, 1.0);
            (2.0 * wf * (1.0 - corr)).max(0.0).sqrt()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STOMP
// ═══════════════════════════════════════════════════════════════════════════════

/// Self-join matrix profile of `values` with window `w`.
///
/// Returns `None` for degenerate input: `w == 0`, `2·w > n`, or a series
/// whose values are all identical.
pub fn stomp(values: &[f64], w: usize) -> Option<MatrixProfile> {
    let n = values.len();
    if w == 0 || 2 * w > n {
        return None;
    }
    let first = values[0];
    if values.iter().all(|&v| v == first) {
        return None;
    }

    let l = n - w + 1;
    let (means, stds) = moving_mean_std(values, w);
    let first_row = sliding_dot_product(&values[..w], values);

    let mut qt = first_row.clone();
    let mut profile = vec![f64::INFINITY; l];
    let mut index = vec![0usize; l];
    let ceiling = 2.0 * (w as f64).sqrt();

    for i in 0..l {
        if i > 0 {
            for j in (1..l).rev() {
                qt[j] = qt[j - 1] - values[i - 1] * values[j - 1]
                    + values[i + w - 1] * values[j + w - 1];
            }
            qt[0] = first_row[i];
        }
        for j in 0..l {
            if in_exclusion_zone(i, j, w) {
                continue;
            }
            let d = znorm_distance(qt[j], w, means[i], stds[i], means[j], stds[j]);
            if d < profile[i] {
                profile[i] = d;
                index[i] = j;
            }
        }
        if !profile[i].is_finite() {
            profile[i] = ceiling;
            index[i] = i;
        }
    }

    Some(MatrixProfile {
        window: w,
        profile,
        index,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// Motifs and discords
// ═══════════════════════════════════════════════════════════════════════════════

/// Offsets of the `k` largest profile values, each at least `zone` apart.
pub fn top_discords(mp: &MatrixProfile, k: usize, zone: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..mp.len()).collect();
    order.sort_by(|&a, &b| {
        mp.profile[b]
            .partial_cmp(&mp.profile[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut picked: Vec<usize> = Vec::new();
    for i in order {
        if picked.len() >= k {
            break;
        }
        if picked.iter().all(|&p| p.abs_diff(i) > zone) {
            picked.push(i);
        }
    }
    picked
}

/// The `k` closest sub-sequence pairs, no member within `zone` of an earlier motif.
pub fn top_motifs(mp: &MatrixProfile, k: usize, zone: usize) -> Vec<Motif> {
    let mut order: Vec<usize> = (0..mp.len()).collect();
    order.sort_by(|&a, &b| {
        mp.profile[a]
            .partial_cmp(&mp.profile[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut motifs: Vec<Motif> = Vec::new();
    for i in order {
        if motifs.len() >= k {
            break;
        }
        let neighbor = mp.index[i];
        let taken = motifs.iter().any(|m| {
            [m.index, m.neighbor]
                .iter()
                .any(|&p| p.abs_diff(i) <= zone || p.abs_diff(neighbor) <= zone)
        });
        if !taken {
            motifs.push(Motif {
                index: i,
                neighbor,
                distance: mp.profile[i],
            });
        }
    }
    motifs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::perturb;

    fn naive_dot(query: &[f64], series: &[f64]) -> Vec<f64> {
        series
            .windows(query.len())
            .map(|w| w.iter().zip(query).map(|(a, b)| a * b).sum())
            .collect()
    }

    #[test]
    fn test_sliding_dot_product_matches_naive() {
        let series: Vec<f64> = (0..37).map(|i| ((i * 7) % 11) as f64 - 3.0).collect();
        let query = &series[5..12];
        let fast = sliding_dot_product(query, &series);
        let slow = naive_dot(query, &series);
        assert_eq!(fast.len(), slow.len());
        for (a, b) in fast.iter().zip(&slow) {
            assert!((a - b).abs() < 1e-8, "{a} vs {b}");
        }
    }

    #[test]
    fn test_moving_mean_std() {
        let (m, s) = moving_mean_std(&[1.0, 1.0, 3.0, 3.0], 2);
        assert_eq!(m, vec![1.0, 2.0, 3.0]);
        assert_eq!(s, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_exclusion_zone() {
        assert!(in_exclusion_zone(5, 5, 4));
        assert!(in_exclusion_zone(5, 6, 4));
        assert!(!in_exclusion_zone(5, 7, 4));
        assert!(in_exclusion_zone(10, 15, 20));
        assert!(!in_exclusion_zone(10, 16, 20));
    }

    #[test]
    fn test_periodic_series_profile_near_zero() {
        let base: Vec<f64> = [0.0, 1.0, 2.0, 3.0].repeat(3);
        let noisy = perturb(&base, f64::EPSILON, Some(3));
        let mp = stomp(&noisy, 4).unwrap();
        assert_eq!(mp.len(), 9);
        for &d in &mp.profile {
            assert!(d >= 0.0);
            assert!(d < 1e-3, "d = {d}");
        }
    }

    #[test]
    fn test_profile_length_and_non_negative() {
        let series: Vec<f64> = (0..64).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();
        let mp = stomp(&series, 8).unwrap();
        assert_eq!(mp.len(), 64 - 8 + 1);
        assert!(mp.profile.iter().all(|&d| d >= 0.0 && d.is_finite()));
        for (i, &j) in mp.index.iter().enumerate() {
            assert!(!in_exclusion_zone(i, j, 8));
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(stomp(&[1.0, 2.0, 3.0], 0).is_none());
        assert!(stomp(&[1.0, 2.0, 3.0, 4.0], 3).is_none());
        assert!(stomp(&[5.0; 40], 4).is_none());
    }

    #[test]
    fn test_discord_found_at_anomaly() {
        let mut series: Vec<f64> = (0..120).map(|i| (i as f64 * 0.5).sin()).collect();
        for v in series.iter_mut().skip(60).take(6) {
            *v += 3.0;
        }
        let mp = stomp(&series, 10).unwrap();
        let discords = top_discords(&mp, 1, 5);
        assert_eq!(discords.len(), 1);
        assert!((50..=66).contains(&discords[0]), "discord at {}", discords[0]);
    }

    #[test]
    fn test_motifs_respect_zone() {
        let series: Vec<f64> = (0..80).map(|i| ((i % 8) as f64).powi(2)).collect();
        let noisy = perturb(&series, 1e-9, Some(11));
        let mp = stomp(&noisy, 8).unwrap();
        let motifs = top_motifs(&mp, 3, 4);
        assert!(!motifs.is_empty());
        for (a, m) in motifs.iter().enumerate() {
            for other in &motifs[a + 1..] {
                assert!(m.index.abs_diff(other.index) > 4);
            }
        }
    }

    #[test]
    fn test_resample_identity() {
        let v = vec![1.0, 4.0, 2.0];
        assert_eq!(resample(&v, 3), v);
    }
}
