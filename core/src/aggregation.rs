//! Per-day and per-range totals derived from raw store rows.
//!
//! Every function here is total: empty inputs produce zeroed outputs, never
//! an error.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::adequacy::daily_adequacy;
use crate::error::ReportError;
use crate::models::{
    AdequacyTargets, CategoryStatistics, DailyIntake, DailyNutritionSummary, DateRange,
    GlucoseCategory, GlycemicStatistics, GlycemicTargets, HydrationEntry, LoggedServing,
    MeasurementRecord,
};

/// Every calendar day from `start` to `end`, both included.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, ReportError> {
    Ok(DateRange::new(start, end)?.days().collect())
}

/// Nutrient totals for one day. Rows dated on other days are ignored.
#[must_use]
pub fn summarize_day(date: NaiveDate, servings: &[LoggedServing]) -> DailyNutritionSummary {
    let mut summary = DailyNutritionSummary::zeroed(date);
    for serving in servings.iter().filter(|s| s.date == date) {
        summary.add_servings(&serving.food, serving.servings);
    }
    summary
}

/// One summary per day of `range`, built from a single range query's rows.
#[must_use]
pub fn daily_nutrition_summaries(
    range: DateRange,
    servings: &[LoggedServing],
) -> Vec<DailyNutritionSummary> {
    let mut by_day: BTreeMap<NaiveDate, DailyNutritionSummary> = range
        .days()
        .map(|d| (d, DailyNutritionSummary::zeroed(d)))
        .collect();
    for serving in servings {
        if let Some(summary) = by_day.get_mut(&serving.date) {
            summary.add_servings(&serving.food, serving.servings);
        }
    }
    by_day.into_values().collect()
}

/// Total hydration per day of `range`, zero for days without entries.
#[must_use]
pub fn hydration_totals(range: DateRange, entries: &[HydrationEntry]) -> Vec<(NaiveDate, f64)> {
    let mut by_day: BTreeMap<NaiveDate, f64> = range.days().map(|d| (d, 0.0)).collect();
    for entry in entries {
        if let Some(total) = by_day.get_mut(&entry.date) {
            *total += entry.volume_ml;
        }
    }
    by_day.into_iter().collect()
}

/// Nutrition, hydration and adequacy for each day of `range`.
#[must_use]
pub fn daily_intake(
    range: DateRange,
    servings: &[LoggedServing],
    hydration: &[HydrationEntry],
    targets: &AdequacyTargets,
) -> Vec<DailyIntake> {
    daily_nutrition_summaries(range, servings)
        .into_iter()
        .zip(hydration_totals(range, hydration))
        .map(|(summary, (_, hydration_ml))| {
            let adequacy = daily_adequacy(&summary, hydration_ml, targets);
            DailyIntake {
                summary,
                hydration_ml,
                adequacy,
            }
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn category_statistics(
    records: &[MeasurementRecord],
    category: GlucoseCategory,
) -> CategoryStatistics {
    let values: Vec<f64> = records
        .iter()
        .filter(|r| r.category == category)
        .map(|r| r.value)
        .collect();
    CategoryStatistics {
        count: values.len(),
        mean: mean(&values),
    }
}

#[must_use]
pub fn glycemic_statistics(records: &[MeasurementRecord]) -> GlycemicStatistics {
    if records.is_empty() {
        return GlycemicStatistics::default();
    }
    let values: Vec<f64> = records.iter().map(|r| r.value).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    GlycemicStatistics {
        count: values.len(),
        mean: mean(&values),
        min,
        max,
        fasting: category_statistics(records, GlucoseCategory::Fasting),
        post_meal: category_statistics(records, GlucoseCategory::PostMeal),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AboveTarget {
    pub fasting: usize,
    pub post_meal: usize,
}

impl AboveTarget {
    #[must_use]
    pub fn get(&self, category: GlucoseCategory) -> usize {
        match category {
            GlucoseCategory::Fasting => self.fasting,
            GlucoseCategory::PostMeal => self.post_meal,
        }
    }
}

#[must_use]
pub fn is_above_target(record: &MeasurementRecord, targets: &GlycemicTargets) -> bool {
    record.value > targets.ceiling(record.category)
}

#[must_use]
pub fn readings_above_target(
    records: &[MeasurementRecord],
    targets: &GlycemicTargets,
) -> AboveTarget {
    let mut above = AboveTarget::default();
    for record in records.iter().filter(|r| is_above_target(r, targets)) {
        match record.category {
            GlucoseCategory::Fasting => above.fasting += 1,
            GlucoseCategory::PostMeal => above.post_meal += 1,
        }
    }
    above
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::FoodComposition;
    use chrono::NaiveTime;

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn reading(
        d: NaiveDate,
        hour: u32,
        value: f64,
        category: GlucoseCategory,
    ) -> MeasurementRecord {
        MeasurementRecord {
            id: 0,
            uuid: String::new(),
            owner_id: "u1".to_string(),
            value,
            category,
            date: d,
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            note: None,
            created_at: String::new(),
        }
    }

    fn iron_food(iron_mg: f64) -> FoodComposition {
        FoodComposition {
            id: 1,
            name: "Beans".to_string(),
            energy_kcal: 120.0,
            protein_g: 8.0,
            fat_g: 0.5,
            carbohydrate_g: 21.0,
            iron_mg,
            folate_mcg: 150.0,
            calcium_mg: 40.0,
            created_at: String::new(),
        }
    }

    fn serving(d: NaiveDate, servings: f64, food: FoodComposition) -> LoggedServing {
        LoggedServing {
            date: d,
            time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            servings,
            food,
        }
    }

    fn water(d: NaiveDate, volume_ml: f64) -> HydrationEntry {
        HydrationEntry {
            id: 0,
            uuid: String::new(),
            owner_id: "u1".to_string(),
            volume_ml,
            date: d,
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            created_at: String::new(),
        }
    }

    #[test]
    fn test_date_range_inclusive_consecutive() {
        let cases = [
            (date(2024, 1, 1), date(2024, 1, 1)),
            (date(2024, 1, 1), date(2024, 1, 7)),
            (date(2024, 2, 25), date(2024, 3, 3)),
            (date(2023, 12, 30), date(2024, 1, 2)),
        ];
        for (start, end) in cases {
            let days = date_range(start, end).unwrap();
            let expected = (end - start).num_days() + 1;
            assert_eq!(days.len() as i64, expected);
            assert_eq!(days.first(), Some(&start));
            assert_eq!(days.last(), Some(&end));
            for pair in days.windows(2) {
                assert_eq!(pair[1] - pair[0], chrono::Duration::days(1));
            }
        }
    }

    #[test]
    fn test_date_range_leap_day() {
        let days = date_range(date(2024, 2, 28), date(2024, 3, 1)).unwrap();
        assert_eq!(days, vec![date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]);
    }

    #[test]
    fn test_date_range_inverted_is_rejected() {
        let err = date_range(date(2024, 1, 2), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRange { .. }));
    }

    #[test]
    fn test_summarize_day_without_meals_is_zero() {
        let summary = summarize_day(date(2024, 1, 1), &[]);
        assert_eq!(summary, DailyNutritionSummary::zeroed(date(2024, 1, 1)));
        assert!(summary.iron_mg.abs() < f64::EPSILON);
        assert!(summary.energy_kcal.abs() < f64::EPSILON);
    }

    #[test]
    fn test_summarize_day_multiplies_servings() {
        let d = date(2024, 1, 1);
        let rows = vec![
            serving(d, 1.5, iron_food(2.0)),
            serving(d, 1.0, iron_food(1.0)),
            serving(date(2024, 1, 2), 10.0, iron_food(5.0)),
        ];
        let summary = summarize_day(d, &rows);
        assert!((summary.iron_mg - 4.0).abs() < 1e-9);
        assert!((summary.energy_kcal - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_range_summaries_match_per_day_summaries() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 4)).unwrap();
        let rows = vec![
            serving(date(2024, 1, 1), 1.0, iron_food(2.1)),
            serving(date(2024, 1, 3), 2.0, iron_food(3.0)),
            serving(date(2024, 1, 3), 1.0, iron_food(1.0)),
        ];
        let grouped = daily_nutrition_summaries(range, &rows);
        assert_eq!(grouped.len(), 4);
        for summary in &grouped {
            assert_eq!(summary, &summarize_day(summary.date, &rows));
        }
        assert!(grouped[1].iron_mg.abs() < f64::EPSILON);
        assert!((grouped[2].iron_mg - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_hydration_totals_fill_missing_days() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 3)).unwrap();
        let entries = vec![
            water(date(2024, 1, 1), 500.0),
            water(date(2024, 1, 1), 250.0),
            water(date(2024, 1, 3), 1000.0),
            water(date(2024, 1, 9), 800.0),
        ];
        let totals = hydration_totals(range, &entries);
        assert_eq!(
            totals,
            vec![
                (date(2024, 1, 1), 750.0),
                (date(2024, 1, 2), 0.0),
                (date(2024, 1, 3), 1000.0),
            ]
        );
    }

    #[test]
    fn test_daily_intake_iron_scenario() {
        let d = date(2024, 1, 1);
        let range = DateRange::single(d);
        let rows = vec![serving(d, 1.0, iron_food(2.1))];
        let days = daily_intake(range, &rows, &[], &AdequacyTargets::default());
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].adequacy.iron, 8);
        assert_eq!(days[0].adequacy.hydration, 0);
    }

    #[test]
    fn test_glycemic_statistics_empty_is_zero() {
        let stats = glycemic_statistics(&[]);
        assert_eq!(stats, GlycemicStatistics::default());
        assert_eq!(stats.count, 0);
        assert!(stats.min.abs() < f64::EPSILON);
        assert!(stats.max.abs() < f64::EPSILON);
    }

    #[test]
    fn test_glycemic_statistics_by_category() {
        let d = date(2024, 1, 1);
        let records = vec![
            reading(d, 7, 90.0, GlucoseCategory::Fasting),
            reading(d, 13, 150.0, GlucoseCategory::PostMeal),
            reading(date(2024, 1, 2), 7, 84.0, GlucoseCategory::Fasting),
        ];
        let stats = glycemic_statistics(&records);
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 108.0).abs() < 1e-9);
        assert!((stats.min - 84.0).abs() < f64::EPSILON);
        assert!((stats.max - 150.0).abs() < f64::EPSILON);
        assert_eq!(stats.fasting.count, 2);
        assert!((stats.fasting.mean - 87.0).abs() < 1e-9);
        assert_eq!(stats.post_meal.count, 1);
        assert!((stats.post_meal.mean - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_readings_above_target() {
        let d = date(2024, 1, 1);
        let records = vec![
            reading(d, 7, 90.0, GlucoseCategory::Fasting),
            reading(d, 8, 101.0, GlucoseCategory::Fasting),
            reading(d, 13, 150.0, GlucoseCategory::PostMeal),
            reading(d, 20, 140.0, GlucoseCategory::PostMeal),
        ];
        let above = readings_above_target(&records, &GlycemicTargets::default());
        assert_eq!(above, AboveTarget { fasting: 1, post_meal: 1 });
        assert_eq!(above.get(GlucoseCategory::PostMeal), 1);
    }
}
