use chrono::NaiveDate;

use crate::models::{AdequacyScore, AdequacyTargets, DailyIntake, DailyNutritionSummary, Nutrient};

/// Percentage of `target` reached by `value`, rounded and clamped to 0..=100.
///
/// Zero, negative or non-finite values score 0, as does a non-positive target.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn adequacy(value: f64, target: f64) -> u8 {
    if !value.is_finite() || value <= 0.0 || !target.is_finite() || target <= 0.0 {
        return 0;
    }
    (value / target * 100.0).round().clamp(0.0, 100.0) as u8
}

#[must_use]
pub fn daily_adequacy(
    summary: &DailyNutritionSummary,
    hydration_ml: f64,
    targets: &AdequacyTargets,
) -> AdequacyScore {
    AdequacyScore {
        date: summary.date,
        iron: adequacy(summary.iron_mg, targets.iron_mg),
        folate: adequacy(summary.folate_mcg, targets.folate_mcg),
        calcium: adequacy(summary.calcium_mg, targets.calcium_mg),
        hydration: adequacy(hydration_ml, targets.hydration_ml),
    }
}

/// Mean score per nutrient over `days`, rounded. Zero for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn average_adequacy(days: &[DailyIntake]) -> Vec<(Nutrient, u8)> {
    Nutrient::ALL
        .iter()
        .map(|&nutrient| {
            if days.is_empty() {
                return (nutrient, 0);
            }
            let total: f64 = days
                .iter()
                .map(|d| f64::from(d.adequacy.get(nutrient)))
                .sum();
            let mean = (total / days.len() as f64).round().clamp(0.0, 100.0);
            (nutrient, mean as u8)
        })
        .collect()
}

/// Mean nutrient totals over `days`, keyed to the first day of the window.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_summary(days: &[DailyIntake]) -> (DailyNutritionSummary, f64) {
    let first = days
        .first()
        .map_or(NaiveDate::MIN, |d| d.summary.date);
    let mut avg = DailyNutritionSummary::zeroed(first);
    if days.is_empty() {
        return (avg, 0.0);
    }
    let n = days.len() as f64;
    for day in days {
        let s = &day.summary;
        avg.energy_kcal += s.energy_kcal / n;
        avg.protein_g += s.protein_g / n;
        avg.fat_g += s.fat_g / n;
        avg.carbohydrate_g += s.carbohydrate_g / n;
        avg.iron_mg += s.iron_mg / n;
        avg.folate_mcg += s.folate_mcg / n;
        avg.calcium_mg += s.calcium_mg / n;
    }
    let hydration = days.iter().map(|d| d.hydration_ml).sum::<f64>() / n;
    (avg, hydration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn intake(d: u32, iron_mg: f64, hydration_ml: f64) -> DailyIntake {
        let mut summary = DailyNutritionSummary::zeroed(date(d));
        summary.iron_mg = iron_mg;
        let adequacy = daily_adequacy(&summary, hydration_ml, &AdequacyTargets::default());
        DailyIntake {
            summary,
            hydration_ml,
            adequacy,
        }
    }

    #[test]
    fn test_adequacy_properties() {
        for target in [27.0, 600.0, 1000.0, 2300.0] {
            assert_eq!(adequacy(0.0, target), 0);
            assert_eq!(adequacy(target, target), 100);
            assert_eq!(adequacy(2.0 * target, target), 100);
            assert_eq!(adequacy(target / 2.0, target), 50);
        }
    }

    #[test]
    fn test_adequacy_rounds() {
        // 2.1 / 27 = 7.78%
        assert_eq!(adequacy(2.1, 27.0), 8);
        // 1 / 600 = 0.17%
        assert_eq!(adequacy(1.0, 600.0), 0);
        assert_eq!(adequacy(3.0, 600.0), 1);
    }

    #[test]
    fn test_adequacy_degenerate_inputs() {
        assert_eq!(adequacy(-5.0, 27.0), 0);
        assert_eq!(adequacy(f64::NAN, 27.0), 0);
        assert_eq!(adequacy(10.0, 0.0), 0);
        assert_eq!(adequacy(f64::INFINITY, 27.0), 0);
    }

    #[test]
    fn test_daily_adequacy_uses_injected_targets() {
        let mut summary = DailyNutritionSummary::zeroed(date(1));
        summary.iron_mg = 15.0;
        summary.folate_mcg = 300.0;
        summary.calcium_mg = 1500.0;
        let targets = AdequacyTargets {
            iron_mg: 30.0,
            ..AdequacyTargets::default()
        };
        let score = daily_adequacy(&summary, 1150.0, &targets);
        assert_eq!(score.date, date(1));
        assert_eq!(score.iron, 50);
        assert_eq!(score.folate, 50);
        assert_eq!(score.calcium, 100);
        assert_eq!(score.hydration, 50);
    }

    #[test]
    fn test_average_adequacy() {
        let days = vec![intake(1, 27.0, 2300.0), intake(2, 0.0, 1150.0)];
        let avg = average_adequacy(&days);
        assert_eq!(
            avg,
            vec![
                (Nutrient::Iron, 50),
                (Nutrient::Folate, 0),
                (Nutrient::Calcium, 0),
                (Nutrient::Hydration, 75),
            ]
        );
        assert!(average_adequacy(&[]).iter().all(|(_, v)| *v == 0));
    }

    #[test]
    fn test_average_summary() {
        let days = vec![intake(1, 10.0, 2000.0), intake(2, 20.0, 1000.0)];
        let (avg, hydration) = average_summary(&days);
        assert!((avg.iron_mg - 15.0).abs() < 1e-9);
        assert!((hydration - 1500.0).abs() < 1e-9);

        let (empty, hydration) = average_summary(&[]);
        assert!(empty.iron_mg.abs() < f64::EPSILON);
        assert!(hydration.abs() < f64::EPSILON);
    }
}
