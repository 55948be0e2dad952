use anyhow::Result;

use gestar_core::db::Database;
use gestar_core::models::{NewFood, validate_food};

use super::helpers::print_food_table;

pub(crate) fn cmd_food_add(db: &Database, food: &NewFood, json: bool) -> Result<()> {
    validate_food(food)?;
    let created = db.insert_food(food)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        println!("Added food [{}] {}", created.id, created.name);
        println!(
            "  Per serving: {:.0} kcal | iron {:.1} mg | folate {:.0} mcg | calcium {:.0} mg",
            created.energy_kcal, created.iron_mg, created.folate_mcg, created.calcium_mg
        );
    }
    Ok(())
}

pub(crate) fn cmd_food_list(db: &Database, search: Option<&str>, json: bool) -> Result<()> {
    let foods = db.list_foods(search)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
        return Ok(());
    }

    if foods.is_empty() {
        match search {
            Some(q) => eprintln!("No foods matching '{q}'"),
            None => eprintln!("No foods yet. Add one with: gestar food add <name> ..."),
        }
        return Ok(());
    }
    print_food_table(&foods);
    Ok(())
}
