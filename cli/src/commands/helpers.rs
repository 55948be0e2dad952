use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use gestar_core::db::Database;
use gestar_core::models::{FoodComposition, Owner};
use gestar_core::store::OwnerDirectory;

/// Days covered by a report when no start date is given.
pub(crate) const DEFAULT_REPORT_DAYS: i64 = 30;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse `HH:MM` or `HH:MM:SS`, defaulting to the current minute.
pub(crate) fn parse_time(time_str: Option<String>) -> Result<NaiveTime> {
    match time_str {
        None => {
            let now = Local::now().time();
            NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).context("Invalid local time")
        }
        Some(s) => NaiveTime::parse_from_str(&s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .with_context(|| format!("Invalid time '{s}'. Use HH:MM")),
    }
}

/// Resolve `--start`/`--end`, ending today and covering the last
/// `DEFAULT_REPORT_DAYS` days when omitted.
pub(crate) fn parse_period(
    start: Option<String>,
    end: Option<String>,
) -> Result<(NaiveDate, NaiveDate)> {
    let end = parse_date(end)?;
    let start = match start {
        Some(s) => parse_date(Some(s))?,
        None => end - chrono::Duration::days(DEFAULT_REPORT_DAYS - 1),
    };
    if start > end {
        bail!("Start date {start} is after end date {end}");
    }
    Ok((start, end))
}

pub(crate) fn require_owner(db: &Database, owner_id: &str) -> Result<Owner> {
    db.get_owner(owner_id)?.with_context(|| {
        format!("Owner '{owner_id}' not found. Add it with: gestar owner add {owner_id} <name>")
    })
}

pub(crate) fn print_food_table(foods: &[FoodComposition]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "kcal")]
        energy: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Iron")]
        iron: String,
        #[tabled(rename = "Folate")]
        folate: String,
        #[tabled(rename = "Calcium")]
        calcium: String,
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            id: f.id,
            name: truncate(&f.name, 35),
            energy: format!("{:.0}", f.energy_kcal),
            protein: format!("{:.1}g", f.protein_g),
            iron: format!("{:.1}mg", f.iron_mg),
            folate: format!("{:.0}mcg", f.folate_mcg),
            calcium: format!("{:.0}mg", f.calcium_mg),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
