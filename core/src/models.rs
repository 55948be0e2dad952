use anyhow::{Result, bail};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewOwner {
    pub id: String,
    pub name: String,
    pub due_date: Option<NaiveDate>,
}

// --- Glycemic measurements ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GlucoseCategory {
    Fasting,
    PostMeal,
}

impl GlucoseCategory {
    pub const ALL: [Self; 2] = [Self::Fasting, Self::PostMeal];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fasting => "fasting",
            Self::PostMeal => "post-meal",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Fasting => "Fasting",
            Self::PostMeal => "Post-meal",
        }
    }

    /// Parse a category name, accepting `post-meal`, `post_meal` and `postmeal`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fasting" => Ok(Self::Fasting),
            "post-meal" | "post_meal" | "postmeal" => Ok(Self::PostMeal),
            _ => bail!("Invalid glucose category '{s}'. Must be one of: fasting, post-meal"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasurementRecord {
    pub id: i64,
    pub uuid: String,
    pub owner_id: String,
    /// Capillary glucose in mg/dL.
    pub value: f64,
    pub category: GlucoseCategory,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMeasurement {
    pub owner_id: String,
    pub value: f64,
    pub category: GlucoseCategory,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub note: Option<String>,
}

// --- Nutrition ---

/// Nutrient values for a single serving of a food.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodComposition {
    pub id: i64,
    pub name: String,
    pub energy_kcal: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbohydrate_g: f64,
    pub iron_mg: f64,
    pub folate_mcg: f64,
    pub calcium_mg: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewFood {
    pub name: String,
    pub energy_kcal: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbohydrate_g: f64,
    pub iron_mg: f64,
    pub folate_mcg: f64,
    pub calcium_mg: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NutritionEntry {
    pub id: i64,
    pub uuid: String,
    pub owner_id: String,
    pub food_id: i64,
    pub servings: f64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewNutritionEntry {
    pub owner_id: String,
    pub food_id: i64,
    pub servings: f64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// A nutrition entry joined with the composition of the food it references.
#[derive(Debug, Clone)]
pub struct LoggedServing {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub servings: f64,
    pub food: FoodComposition,
}

// --- Hydration ---

#[derive(Debug, Clone, Serialize)]
pub struct HydrationEntry {
    pub id: i64,
    pub uuid: String,
    pub owner_id: String,
    pub volume_ml: f64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewHydrationEntry {
    pub owner_id: String,
    pub volume_ml: f64,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

// --- Derived values ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyNutritionSummary {
    pub date: NaiveDate,
    pub energy_kcal: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub carbohydrate_g: f64,
    pub iron_mg: f64,
    pub folate_mcg: f64,
    pub calcium_mg: f64,
}

impl DailyNutritionSummary {
    #[must_use]
    pub fn zeroed(date: NaiveDate) -> Self {
        Self {
            date,
            energy_kcal: 0.0,
            protein_g: 0.0,
            fat_g: 0.0,
            carbohydrate_g: 0.0,
            iron_mg: 0.0,
            folate_mcg: 0.0,
            calcium_mg: 0.0,
        }
    }

    pub fn add_servings(&mut self, food: &FoodComposition, servings: f64) {
        self.energy_kcal += food.energy_kcal * servings;
        self.protein_g += food.protein_g * servings;
        self.fat_g += food.fat_g * servings;
        self.carbohydrate_g += food.carbohydrate_g * servings;
        self.iron_mg += food.iron_mg * servings;
        self.folate_mcg += food.folate_mcg * servings;
        self.calcium_mg += food.calcium_mg * servings;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryStatistics {
    pub count: usize,
    pub mean: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GlycemicStatistics {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub fasting: CategoryStatistics,
    pub post_meal: CategoryStatistics,
}

impl GlycemicStatistics {
    #[must_use]
    pub fn category(&self, category: GlucoseCategory) -> CategoryStatistics {
        match category {
            GlucoseCategory::Fasting => self.fasting,
            GlucoseCategory::PostMeal => self.post_meal,
        }
    }
}

/// Daily reference values the adequacy scores are measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdequacyTargets {
    pub iron_mg: f64,
    pub folate_mcg: f64,
    pub calcium_mg: f64,
    pub hydration_ml: f64,
}

impl Default for AdequacyTargets {
    fn default() -> Self {
        Self {
            iron_mg: 27.0,
            folate_mcg: 600.0,
            calcium_mg: 1000.0,
            hydration_ml: 2300.0,
        }
    }
}

impl AdequacyTargets {
    #[must_use]
    pub fn target(&self, nutrient: Nutrient) -> f64 {
        match nutrient {
            Nutrient::Iron => self.iron_mg,
            Nutrient::Folate => self.folate_mcg,
            Nutrient::Calcium => self.calcium_mg,
            Nutrient::Hydration => self.hydration_ml,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for nutrient in Nutrient::ALL {
            let value = self.target(nutrient);
            if !value.is_finite() || value <= 0.0 {
                bail!(
                    "Target for {} must be greater than 0 (got {value})",
                    nutrient.label()
                );
            }
        }
        Ok(())
    }
}

/// Upper limits for a reading to count as within target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlycemicTargets {
    pub fasting_max: f64,
    pub post_meal_max: f64,
}

impl Default for GlycemicTargets {
    fn default() -> Self {
        Self {
            fasting_max: 95.0,
            post_meal_max: 140.0,
        }
    }
}

impl GlycemicTargets {
    #[must_use]
    pub fn ceiling(&self, category: GlucoseCategory) -> f64 {
        match category {
            GlucoseCategory::Fasting => self.fasting_max,
            GlucoseCategory::PostMeal => self.post_meal_max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Nutrient {
    Iron,
    Folate,
    Calcium,
    Hydration,
}

impl Nutrient {
    pub const ALL: [Self; 4] = [Self::Iron, Self::Folate, Self::Calcium, Self::Hydration];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Iron => "Iron",
            Self::Folate => "Folate",
            Self::Calcium => "Calcium",
            Self::Hydration => "Hydration",
        }
    }

    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Iron | Self::Calcium => "mg",
            Self::Folate => "mcg",
            Self::Hydration => "ml",
        }
    }
}

/// Percentage of each daily target met, always within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdequacyScore {
    pub date: NaiveDate,
    pub iron: u8,
    pub folate: u8,
    pub calcium: u8,
    pub hydration: u8,
}

impl AdequacyScore {
    #[must_use]
    pub fn get(&self, nutrient: Nutrient) -> u8 {
        match nutrient {
            Nutrient::Iron => self.iron,
            Nutrient::Folate => self.folate,
            Nutrient::Calcium => self.calcium,
            Nutrient::Hydration => self.hydration,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyIntake {
    pub summary: DailyNutritionSummary,
    pub hydration_ml: f64,
    pub adequacy: AdequacyScore,
}

impl DailyIntake {
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.summary.date
    }
}

// --- Date ranges ---

/// Inclusive calendar date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, both ends included.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn len(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

// --- Report requests ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Full clinician report: glycemic, nutrition, adequacy and hydration sections.
    Clinician,
    /// Patient-facing report with the glycemic sections only.
    Patient,
}

impl ReportKind {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Clinician => "Clinical Report - Glycemia, Nutrition and Hydration",
            Self::Patient => "Glycemic Report",
        }
    }

    #[must_use]
    pub fn filename_prefix(self) -> &'static str {
        match self {
            Self::Clinician => "relatorio-medico",
            Self::Patient => "relatorio-glicemia",
        }
    }

    #[must_use]
    pub fn filename(self, owner_id: &str, timestamp_ms: i64) -> String {
        format!("{}-{owner_id}-{timestamp_ms}.pdf", self.filename_prefix())
    }

    #[must_use]
    pub fn includes_nutrition(self) -> bool {
        matches!(self, Self::Clinician)
    }
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub owner_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: ReportKind,
}

// --- Validation ---

pub fn validate_owner_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("Owner id must not be empty");
    }
    if id.chars().any(|c| c.is_whitespace() || c == '/') {
        bail!("Owner id '{id}' must not contain whitespace or '/'");
    }
    Ok(())
}

pub fn validate_glucose_value(value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        bail!("Glucose value must be greater than 0");
    }
    if value > 1000.0 {
        bail!("Glucose value {value} mg/dL is out of range");
    }
    Ok(())
}

pub fn validate_servings(servings: f64) -> Result<()> {
    if !servings.is_finite() || servings <= 0.0 {
        bail!("Servings must be greater than 0");
    }
    Ok(())
}

pub fn validate_volume(volume_ml: f64) -> Result<()> {
    if !volume_ml.is_finite() || volume_ml <= 0.0 {
        bail!("Volume must be greater than 0");
    }
    Ok(())
}

/// Validate a food composition: name must not be empty, nutrients must not be negative.
pub fn validate_food(food: &NewFood) -> Result<()> {
    if food.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    let fields = [
        ("energy_kcal", food.energy_kcal),
        ("protein_g", food.protein_g),
        ("fat_g", food.fat_g),
        ("carbohydrate_g", food.carbohydrate_g),
        ("iron_mg", food.iron_mg),
        ("folate_mcg", food.folate_mcg),
        ("calcium_mg", food.calcium_mg),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            bail!("{name} must not be negative");
        }
    }
    Ok(())
}
