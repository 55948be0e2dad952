use anyhow::Result;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use gestar_core::db::Database;
use gestar_core::models::{GlycemicStatistics, NewOwner, Owner, validate_owner_id};
use gestar_core::store::MeasurementStore;

use super::helpers::{parse_date, require_owner};

pub(crate) fn cmd_owner_add(
    db: &Database,
    id: &str,
    name: &str,
    due_date: Option<String>,
    json: bool,
) -> Result<()> {
    validate_owner_id(id)?;
    if name.trim().is_empty() {
        anyhow::bail!("Owner name must not be empty");
    }
    let due_date = due_date.map(|d| parse_date(Some(d))).transpose()?;
    let owner = db.insert_owner(&NewOwner {
        id: id.to_string(),
        name: name.trim().to_string(),
        due_date,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&owner)?);
    } else {
        println!("Added owner {} ({})", owner.id, owner.name);
        if let Some(due) = owner.due_date {
            println!("  Due date: {}", due.format("%Y-%m-%d"));
        }
    }
    Ok(())
}

pub(crate) fn cmd_owner_show(db: &Database, id: &str, json: bool) -> Result<()> {
    #[derive(Serialize)]
    struct OwnerDetail {
        #[serde(flatten)]
        owner: Owner,
        glucose: GlycemicStatistics,
    }

    let owner = require_owner(db, id)?;
    let glucose = db.glycemic_statistics(&owner.id, None)?;

    if json {
        let detail = OwnerDetail { owner, glucose };
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!("{} ({})", owner.name, owner.id);
    if let Some(due) = owner.due_date {
        println!("  Due date: {}", due.format("%Y-%m-%d"));
    }
    println!("  Glucose readings: {}", glucose.count);
    if glucose.count > 0 {
        println!(
            "  Mean {:.1} mg/dL (fasting {:.1}, post-meal {:.1})",
            glucose.mean, glucose.fasting.mean, glucose.post_meal.mean
        );
    }
    Ok(())
}

pub(crate) fn cmd_owner_list(db: &Database, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct OwnerRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Due date")]
        due_date: String,
    }

    let owners = db.list_owners()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&owners)?);
        return Ok(());
    }
    if owners.is_empty() {
        eprintln!("No owners yet. Add one with: gestar owner add <id> <name>");
        return Ok(());
    }
    let rows: Vec<OwnerRow> = owners
        .into_iter()
        .map(|o| OwnerRow {
            id: o.id,
            name: o.name,
            due_date: o
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}
