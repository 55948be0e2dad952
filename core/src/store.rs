use anyhow::Result;
use chrono::NaiveDate;

use crate::aggregation;
use crate::models::{
    DailyNutritionSummary, DateRange, GlycemicStatistics, HydrationEntry, LoggedServing,
    MeasurementRecord, Owner,
};

/// Lookup of the people reports are generated for.
pub trait OwnerDirectory {
    fn get_owner(&self, owner_id: &str) -> Result<Option<Owner>>;
}

/// Read-only access to an owner's logged measurements.
///
/// Implementors only need to answer the raw range queries; the per-day and
/// statistics queries have default implementations built on top of them.
pub trait MeasurementStore {
    /// Glycemic records ordered by date and time. `None` means the whole history.
    fn glycemic_records(
        &self,
        owner_id: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<MeasurementRecord>>;

    /// Nutrition entries in the range, each joined with its food composition.
    fn logged_servings(&self, owner_id: &str, range: DateRange) -> Result<Vec<LoggedServing>>;

    fn hydration_entries(&self, owner_id: &str, range: DateRange) -> Result<Vec<HydrationEntry>>;

    fn glycemic_statistics(
        &self,
        owner_id: &str,
        range: Option<DateRange>,
    ) -> Result<GlycemicStatistics> {
        let records = self.glycemic_records(owner_id, range)?;
        Ok(aggregation::glycemic_statistics(&records))
    }

    fn daily_nutrition_summary(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> Result<DailyNutritionSummary> {
        let servings = self.logged_servings(owner_id, DateRange::single(date))?;
        Ok(aggregation::summarize_day(date, &servings))
    }

    fn hydration_total(&self, owner_id: &str, date: NaiveDate) -> Result<f64> {
        let entries = self.hydration_entries(owner_id, DateRange::single(date))?;
        Ok(entries.iter().map(|e| e.volume_ml).sum())
    }
}
