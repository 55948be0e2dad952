use anyhow::Result;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use gestar_core::aggregation::{AboveTarget, readings_above_target};
use gestar_core::db::Database;
use gestar_core::models::{
    DateRange, GlucoseCategory, GlycemicStatistics, GlycemicTargets, NewHydrationEntry,
    NewMeasurement, NewNutritionEntry, validate_glucose_value, validate_servings, validate_volume,
};
use gestar_core::store::MeasurementStore;

use super::helpers::{parse_date, parse_period, parse_time, require_owner};

pub(crate) struct LogArgs {
    pub owner: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub json: bool,
}

pub(crate) fn cmd_glucose_log(
    db: &Database,
    args: LogArgs,
    value: f64,
    category: &str,
    note: Option<String>,
    targets: &GlycemicTargets,
) -> Result<()> {
    validate_glucose_value(value)?;
    let category = GlucoseCategory::parse(category)?;
    let owner = require_owner(db, &args.owner)?;
    let record = db.insert_glucose(&NewMeasurement {
        owner_id: owner.id,
        value,
        category,
        date: parse_date(args.date)?,
        time: parse_time(args.time)?,
        note,
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        let ceiling = targets.ceiling(category);
        let status = if value > ceiling { "above target" } else { "within target" };
        println!(
            "Logged {} {:.0} mg/dL on {} at {} ({status}, limit {ceiling:.0})",
            category.as_str(),
            record.value,
            record.date.format("%Y-%m-%d"),
            record.time.format("%H:%M")
        );
    }
    Ok(())
}

pub(crate) fn cmd_glucose_stats(
    db: &Database,
    owner: &str,
    start: Option<String>,
    end: Option<String>,
    targets: &GlycemicTargets,
    json: bool,
) -> Result<()> {
    #[derive(Serialize)]
    struct StatsOutput {
        owner_id: String,
        range: DateRange,
        statistics: GlycemicStatistics,
        above_target: AboveTarget,
    }

    #[derive(Tabled)]
    struct StatsRow {
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Readings")]
        count: usize,
        #[tabled(rename = "Mean")]
        mean: String,
        #[tabled(rename = "Limit")]
        limit: String,
        #[tabled(rename = "Above")]
        above: usize,
    }

    let owner = require_owner(db, owner)?;
    let (start, end) = parse_period(start, end)?;
    let range = DateRange::new(start, end)?;
    let statistics = db.glycemic_statistics(&owner.id, Some(range))?;
    let records = db.glycemic_records(&owner.id, Some(range))?;
    let above_target = readings_above_target(&records, targets);

    if json {
        let output = StatsOutput {
            owner_id: owner.id,
            range,
            statistics,
            above_target,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("=== {} | {start} to {end} ===\n", owner.name);
    if statistics.count == 0 {
        println!("  No glucose readings in this period.");
        return Ok(());
    }
    println!(
        "  {} readings, mean {:.1} mg/dL (min {:.0}, max {:.0})\n",
        statistics.count, statistics.mean, statistics.min, statistics.max
    );
    let rows: Vec<StatsRow> = GlucoseCategory::ALL
        .iter()
        .map(|&c| {
            let stats = statistics.category(c);
            StatsRow {
                category: c.label().to_string(),
                count: stats.count,
                mean: format!("{:.1}", stats.mean),
                limit: format!("{:.0}", targets.ceiling(c)),
                above: above_target.get(c),
            }
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_meal_log(
    db: &Database,
    args: LogArgs,
    food_id: i64,
    servings: f64,
) -> Result<()> {
    validate_servings(servings)?;
    let owner = require_owner(db, &args.owner)?;
    let food = db.get_food(food_id)?;
    let entry = db.insert_meal(&NewNutritionEntry {
        owner_id: owner.id,
        food_id,
        servings,
        date: parse_date(args.date)?,
        time: parse_time(args.time)?,
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged {servings} x {} on {} at {} (iron {:.1} mg, folate {:.0} mcg, calcium {:.0} mg)",
            food.name,
            entry.date.format("%Y-%m-%d"),
            entry.time.format("%H:%M"),
            food.iron_mg * servings,
            food.folate_mcg * servings,
            food.calcium_mg * servings
        );
    }
    Ok(())
}

pub(crate) fn cmd_water_log(db: &Database, args: LogArgs, volume_ml: f64) -> Result<()> {
    validate_volume(volume_ml)?;
    let owner = require_owner(db, &args.owner)?;
    let entry = db.insert_hydration(&NewHydrationEntry {
        owner_id: owner.id,
        volume_ml,
        date: parse_date(args.date)?,
        time: parse_time(args.time)?,
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let total = db.hydration_total(&entry.owner_id, entry.date)?;
        println!(
            "Logged {volume_ml:.0} ml on {} ({total:.0} ml that day)",
            entry.date.format("%Y-%m-%d")
        );
    }
    Ok(())
}
