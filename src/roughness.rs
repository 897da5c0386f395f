//! Accelerometer roughness primitives: population standard deviation, the
//! empirical IRI approximation, and vertical-shock severity classification.

use crate::models::event::Severity;

/// Milli-g thresholds separating calm driving from roughness severities.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub medium_mg: i32,
    pub high_mg: i32,
    pub critical_mg: i32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            medium_mg: 2000,
            high_mg: 2500,
            critical_mg: 3500,
        }
    }
}

/// Classify an absolute vertical acceleration (milli-g). `None` means the
/// sample is below every threshold.
pub fn classify_mg(abs_mg: i32, t: &Thresholds) -> Option<Severity> {
    if abs_mg > t.critical_mg {
        Some(Severity::Critical)
    } else if abs_mg > t.high_mg {
        Some(Severity::High)
    } else if abs_mg > t.medium_mg {
        Some(Severity::Medium)
    } else {
        None
    }
}

/// Tuning constants for the IRI estimate.
#[derive(Debug, Clone, Copy)]
pub struct IriParams {
    pub k: f64,
    pub speed_baseline_kmh: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

impl Default for IriParams {
    fn default() -> Self {
        Self {
            k: 15.0,
            speed_baseline_kmh: 30.0,
            good: 2.5,
            fair: 4.0,
            poor: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IriEstimate {
    /// m/km, clamped to [0, 20].
    pub iri: f64,
    pub category: &'static str,
}

/// Population standard deviation (divisor n), rounded to 2 decimals.
/// Working on deviations from the mean cancels the ~1000 milli-g gravity
/// bias in vertical-axis samples. Returns 0 for fewer than two samples.
pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    round2(variance.sqrt())
}

/// Empirical IRI approximation from vertical-axis spread and travel speed.
/// Below 5 km/h the vibration signal is dominated by engine idle and
/// loading-shovel contact, so the estimate is pinned to smooth.
pub fn estimate_iri(xs: &[f64], speed_kmh: f64, params: &IriParams) -> IriEstimate {
    if speed_kmh < 5.0 {
        return IriEstimate {
            iri: 0.0,
            category: "good",
        };
    }
    let r = std_dev(xs);
    let speed_factor = params.speed_baseline_kmh / speed_kmh;
    let iri = (r / 1000.0 * params.k * speed_factor).clamp(0.0, 20.0);
    IriEstimate {
        iri,
        category: categorize(iri, params),
    }
}

fn categorize(iri: f64, params: &IriParams) -> &'static str {
    if iri < params.good {
        "good"
    } else if iri < params.fair {
        "fair"
    } else if iri < params.poor {
        "poor"
    } else {
        "very_poor"
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_dev_of_known_population() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(std_dev(&xs), 2.0);
    }

    #[test]
    fn std_dev_short_inputs_are_zero() {
        assert_eq!(std_dev(&[]), 0.0);
        assert_eq!(std_dev(&[42.0]), 0.0);
    }

    #[test]
    fn std_dev_rounds_to_two_decimals() {
        // population sd of [1,2,3] = sqrt(2/3) = 0.8164...
        assert_eq!(std_dev(&[1.0, 2.0, 3.0]), 0.82);
    }

    #[test]
    fn std_dev_ignores_constant_offset() {
        let xs = [120.0, -340.0, 410.0, 55.0];
        let shifted: Vec<f64> = xs.iter().map(|x| x + 1000.0).collect();
        assert_eq!(std_dev(&xs), std_dev(&shifted));
    }

    #[test]
    fn iri_is_zero_below_speed_gate() {
        let est = estimate_iri(&[0.0, 5000.0, -5000.0], 4.9, &IriParams::default());
        assert_eq!(est, IriEstimate { iri: 0.0, category: "good" });
    }

    #[test]
    fn iri_is_monotone_in_spread() {
        let params = IriParams::default();
        let calm = estimate_iri(&[0.0, 10.0, -10.0], 30.0, &params);
        let rough = estimate_iri(&[0.0, 400.0, -400.0], 30.0, &params);
        assert!(rough.iri >= calm.iri);
    }

    #[test]
    fn iri_scales_inversely_with_speed() {
        let params = IriParams::default();
        let xs = [0.0, 300.0, -300.0, 150.0];
        let slow = estimate_iri(&xs, 15.0, &params);
        let fast = estimate_iri(&xs, 60.0, &params);
        assert!(slow.iri > fast.iri);
    }

    #[test]
    fn iri_clamps_at_twenty() {
        let xs = [0.0, 30_000.0, -30_000.0, 30_000.0, -30_000.0];
        let est = estimate_iri(&xs, 30.0, &IriParams::default());
        assert_eq!(est.iri, 20.0);
        assert_eq!(est.category, "very_poor");
    }

    #[test]
    fn category_boundaries_are_lower_inclusive() {
        let params = IriParams::default();
        assert_eq!(categorize(0.0, &params), "good");
        assert_eq!(categorize(2.49, &params), "good");
        assert_eq!(categorize(2.5, &params), "fair");
        assert_eq!(categorize(4.0, &params), "poor");
        assert_eq!(categorize(5.99, &params), "poor");
        assert_eq!(categorize(6.0, &params), "very_poor");
    }

    #[test]
    fn classify_follows_thresholds() {
        let t = Thresholds::default();
        assert_eq!(classify_mg(2000, &t), None);
        assert_eq!(classify_mg(2001, &t), Some(Severity::Medium));
        assert_eq!(classify_mg(2600, &t), Some(Severity::High));
        assert_eq!(classify_mg(3501, &t), Some(Severity::Critical));
    }

    #[test]
    fn severity_order_is_total() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }
}
