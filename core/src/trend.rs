use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DailyIntake, MeasurementRecord, Nutrient};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TrendPoint {
    #[must_use]
    pub fn label(&self) -> String {
        self.date.format("%d/%m").to_string()
    }
}

/// Mean glucose per day, ascending by date.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn glycemic_trend(records: &[MeasurementRecord]) -> Vec<TrendPoint> {
    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for record in records {
        let slot = by_day.entry(record.date).or_insert((0.0, 0));
        slot.0 += record.value;
        slot.1 += 1;
    }
    by_day
        .into_iter()
        .map(|(date, (sum, count))| TrendPoint {
            date,
            value: sum / count as f64,
        })
        .collect()
}

/// Per-nutrient adequacy percentages sharing the date axis of the input days.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdequacySeries {
    pub iron: Vec<TrendPoint>,
    pub folate: Vec<TrendPoint>,
    pub calcium: Vec<TrendPoint>,
    pub hydration: Vec<TrendPoint>,
}

impl AdequacySeries {
    #[must_use]
    pub fn get(&self, nutrient: Nutrient) -> &[TrendPoint] {
        match nutrient {
            Nutrient::Iron => &self.iron,
            Nutrient::Folate => &self.folate,
            Nutrient::Calcium => &self.calcium,
            Nutrient::Hydration => &self.hydration,
        }
    }
}

#[must_use]
pub fn adequacy_series(days: &[DailyIntake]) -> AdequacySeries {
    let series = |nutrient: Nutrient| -> Vec<TrendPoint> {
        days.iter()
            .map(|d| TrendPoint {
                date: d.date(),
                value: f64::from(d.adequacy.get(nutrient)),
            })
            .collect()
    };
    AdequacySeries {
        iron: series(Nutrient::Iron),
        folate: series(Nutrient::Folate),
        calcium: series(Nutrient::Calcium),
        hydration: series(Nutrient::Hydration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adequacy::daily_adequacy;
    use crate::aggregation::tests::{date, reading};
    use crate::models::{AdequacyTargets, DailyNutritionSummary, GlucoseCategory};

    #[test]
    fn test_glycemic_trend_groups_and_sorts() {
        let records = vec![
            reading(date(2024, 1, 3), 7, 80.0, GlucoseCategory::Fasting),
            reading(date(2024, 1, 1), 7, 90.0, GlucoseCategory::Fasting),
            reading(date(2024, 1, 1), 13, 150.0, GlucoseCategory::PostMeal),
            reading(date(2024, 1, 3), 13, 120.0, GlucoseCategory::PostMeal),
        ];
        let trend = glycemic_trend(&records);
        assert_eq!(
            trend,
            vec![
                TrendPoint {
                    date: date(2024, 1, 1),
                    value: 120.0,
                },
                TrendPoint {
                    date: date(2024, 1, 3),
                    value: 100.0,
                },
            ]
        );
    }

    #[test]
    fn test_glycemic_trend_single_point_and_empty() {
        let records = vec![reading(date(2024, 1, 1), 7, 90.0, GlucoseCategory::Fasting)];
        assert_eq!(glycemic_trend(&records).len(), 1);
        assert!(glycemic_trend(&[]).is_empty());
    }

    #[test]
    fn test_adequacy_series_aligned_to_days() {
        let targets = AdequacyTargets::default();
        let days: Vec<DailyIntake> = (1..=3)
            .map(|d| {
                let mut summary = DailyNutritionSummary::zeroed(date(2024, 1, d));
                summary.iron_mg = 13.5 * f64::from(d - 1);
                let adequacy = daily_adequacy(&summary, 2300.0, &targets);
                DailyIntake {
                    summary,
                    hydration_ml: 2300.0,
                    adequacy,
                }
            })
            .collect();
        let series = adequacy_series(&days);
        for nutrient in Nutrient::ALL {
            let points = series.get(nutrient);
            assert_eq!(points.len(), 3);
            let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
            assert_eq!(dates, vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)]);
        }
        let iron: Vec<f64> = series.iron.iter().map(|p| p.value).collect();
        assert_eq!(iron, vec![0.0, 50.0, 100.0]);
        assert!(series.hydration.iter().all(|p| (p.value - 100.0).abs() < f64::EPSILON));
        assert!(series.folate.iter().all(|p| p.value.abs() < f64::EPSILON));
    }

    #[test]
    fn test_point_label() {
        let point = TrendPoint {
            date: date(2024, 3, 9),
            value: 1.0,
        };
        assert_eq!(point.label(), "09/03");
    }
}
