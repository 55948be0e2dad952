use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use gestar_core::adequacy::daily_adequacy;
use gestar_core::aggregation::daily_intake;
use gestar_core::db::Database;
use gestar_core::models::{AdequacyTargets, DailyIntake, DateRange, Nutrient};
use gestar_core::store::MeasurementStore;

use super::helpers::{no_neg_zero, parse_date, require_owner};

pub(crate) fn cmd_summary(
    db: &Database,
    owner: &str,
    date: Option<String>,
    targets: &AdequacyTargets,
    json: bool,
) -> Result<()> {
    let owner = require_owner(db, owner)?;
    let date = parse_date(date)?;
    let summary = db.daily_nutrition_summary(&owner.id, date)?;
    let hydration_ml = db.hydration_total(&owner.id, date)?;
    let adequacy = daily_adequacy(&summary, hydration_ml, targets);
    let day = DailyIntake {
        summary,
        hydration_ml,
        adequacy,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&day)?);
        return Ok(());
    }

    let s = &day.summary;
    if s.energy_kcal <= 0.0 && day.hydration_ml <= 0.0 {
        eprintln!("No entries for {} on {date}", owner.name);
        process::exit(2);
    }

    println!("=== {} | {date} ===\n", owner.name);
    println!(
        "  {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g\n",
        no_neg_zero(s.energy_kcal),
        no_neg_zero(s.protein_g),
        no_neg_zero(s.carbohydrate_g),
        no_neg_zero(s.fat_g)
    );
    for nutrient in Nutrient::ALL {
        let value = match nutrient {
            Nutrient::Iron => s.iron_mg,
            Nutrient::Folate => s.folate_mcg,
            Nutrient::Calcium => s.calcium_mg,
            Nutrient::Hydration => day.hydration_ml,
        };
        println!(
            "  {:<10} {:>7.1} / {:<5.0} {:<3} {:>3}%",
            nutrient.label(),
            no_neg_zero(value),
            targets.target(nutrient),
            nutrient.unit(),
            day.adequacy.get(nutrient)
        );
    }
    Ok(())
}

/// The `days` days ending at `today`, inclusive.
fn history_range(today: NaiveDate, days: u32) -> Result<DateRange> {
    let start = today
        .checked_sub_signed(Duration::days(i64::from(days.max(1)) - 1))
        .ok_or_else(|| anyhow::anyhow!("--days {days} reaches before the supported calendar"))?;
    Ok(DateRange::new(start, today)?)
}

pub(crate) fn cmd_history(
    db: &Database,
    owner: &str,
    days: u32,
    targets: &AdequacyTargets,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "kcal")]
        energy: String,
        #[tabled(rename = "Iron")]
        iron: String,
        #[tabled(rename = "Folate")]
        folate: String,
        #[tabled(rename = "Calcium")]
        calcium: String,
        #[tabled(rename = "Water")]
        hydration: String,
    }

    let owner = require_owner(db, owner)?;
    let today = Local::now().date_naive();
    let range = history_range(today, days)?;
    let servings = db.logged_servings(&owner.id, range)?;
    let hydration = db.hydration_entries(&owner.id, range)?;
    let mut intake = daily_intake(range, &servings, &hydration, targets);
    intake.reverse();

    if json {
        println!("{}", serde_json::to_string_pretty(&intake)?);
        return Ok(());
    }

    if servings.is_empty() && hydration.is_empty() {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = intake
        .iter()
        .map(|d| HistoryRow {
            date: d.date().format("%Y-%m-%d").to_string(),
            energy: format!("{:.0}", no_neg_zero(d.summary.energy_kcal)),
            iron: format!("{}%", d.adequacy.iron),
            folate: format!("{}%", d.adequacy.folate),
            calcium: format!("{}%", d.adequacy.calcium),
            hydration: format!("{}%", d.adequacy.hydration),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
