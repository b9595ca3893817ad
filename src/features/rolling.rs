//! Trailing-window statistics over one entity's ordered values.

/// z-score and delta-from-mean at one position; `None` when undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStat {
    pub z: Option<f64>,
    pub d: Option<f64>,
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Statistics for every position of `values`. The window grows from the
/// series start until it holds `window` observations; nothing is defined
/// before `min_periods` observations. Standard deviation uses n-1.
pub fn trailing_stats(values: &[f64], window: usize, min_periods: usize) -> Vec<WindowStat> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let win = &values[start..=i];
        let n = win.len();
        if n < min_periods.max(1) {
            out.push(WindowStat::default());
            continue;
        }

        // a run of identical values has zero spread whatever `sum / n` rounds to
        if win[0].is_finite() && win.iter().all(|&v| v == win[0]) {
            out.push(WindowStat { z: None, d: Some(0.0) });
            continue;
        }

        let mean = win.iter().sum::<f64>() / n as f64;
        let d = finite(values[i] - mean);
        let z = if n < 2 {
            None
        } else {
            let var = win.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            let std = var.sqrt();
            if std == 0.0 {
                None
            } else {
                d.and_then(|d| finite(d / std))
            }
        };
        out.push(WindowStat { z, d });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_is_undefined() {
        let s = trailing_stats(&[1.0, 2.0, 4.0], 7, 3);
        assert_eq!(s[0], WindowStat::default());
        assert_eq!(s[1], WindowStat::default());
        assert!(s[2].z.is_some() && s[2].d.is_some());
    }

    #[test]
    fn constant_window_has_delta_but_no_z() {
        let s = trailing_stats(&[5.0; 4], 7, 3);
        assert_eq!(s[3].z, None);
        assert_eq!(s[3].d, Some(0.0));
    }

    #[test]
    fn inexact_constants_are_zero_variance() {
        for c in [7.1, 0.1, 1e-3] {
            let s = trailing_stats(&[c; 5], 7, 3);
            for stat in &s[2..] {
                assert_eq!(stat.z, None, "constant {c}");
                assert_eq!(stat.d, Some(0.0), "constant {c}");
            }
        }
    }

    #[test]
    fn change_after_constant_run_is_scored() {
        let s = trailing_stats(&[7.1, 7.1, 7.1, 4.0], 7, 3);
        assert!(s[3].z.unwrap() < -1.0);
        assert!(s[3].d.unwrap() < 0.0);
    }

    #[test]
    fn window_slides_after_filling() {
        // last window is [2, 3, 4]: mean 3, std 1
        let s = trailing_stats(&[100.0, 2.0, 3.0, 4.0], 3, 2);
        let last = s[3];
        assert!((last.d.unwrap() - 1.0).abs() < 1e-12);
        assert!((last.z.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn single_observation_window_has_no_z() {
        let s = trailing_stats(&[3.0, 9.0], 1, 1);
        assert_eq!(s[1].d, Some(0.0));
        assert_eq!(s[1].z, None);
    }

    #[test]
    fn infinite_inputs_normalize_to_undefined() {
        let s = trailing_stats(&[1.0, f64::INFINITY, 2.0], 3, 1);
        assert_eq!(s[1].d, None);
        assert_eq!(s[2].z, None);
    }
}
