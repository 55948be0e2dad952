use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::models::{
    CategoryStatistics, DateRange, FoodComposition, GlucoseCategory, GlycemicStatistics,
    HydrationEntry, LoggedServing, MeasurementRecord, NewFood, NewHydrationEntry, NewMeasurement,
    NewNutritionEntry, NewOwner, NutritionEntry, Owner,
};
use crate::store::{MeasurementStore, OwnerDirectory};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS owners (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    due_date TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    energy_kcal REAL NOT NULL DEFAULT 0,
                    protein_g REAL NOT NULL DEFAULT 0,
                    fat_g REAL NOT NULL DEFAULT 0,
                    carbohydrate_g REAL NOT NULL DEFAULT 0,
                    iron_mg REAL NOT NULL DEFAULT 0,
                    folate_mcg REAL NOT NULL DEFAULT 0,
                    calcium_mg REAL NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS glucose_readings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    owner_id TEXT NOT NULL REFERENCES owners(id),
                    value REAL NOT NULL,
                    category TEXT NOT NULL CHECK (category IN ('fasting', 'post-meal')),
                    date TEXT NOT NULL,
                    time TEXT NOT NULL,
                    note TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    owner_id TEXT NOT NULL REFERENCES owners(id),
                    food_id INTEGER NOT NULL REFERENCES foods(id),
                    servings REAL NOT NULL,
                    date TEXT NOT NULL,
                    time TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS hydration_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    owner_id TEXT NOT NULL REFERENCES owners(id),
                    volume_ml REAL NOT NULL,
                    date TEXT NOT NULL,
                    time TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_glucose_owner_date ON glucose_readings(owner_id, date);
                CREATE INDEX IF NOT EXISTS idx_meal_entries_owner_date ON meal_entries(owner_id, date);
                CREATE INDEX IF NOT EXISTS idx_hydration_owner_date ON hydration_entries(owner_id, date);
                CREATE INDEX IF NOT EXISTS idx_foods_name ON foods(name);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
        let raw: String = row.get(idx)?;
        NaiveDate::parse_from_str(&raw, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn time_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveTime> {
        let raw: String = row.get(idx)?;
        NaiveTime::parse_from_str(&raw, TIME_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn category_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<GlucoseCategory> {
        let raw: String = row.get(idx)?;
        GlucoseCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == raw)
            .ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    Type::Text,
                    format!("unknown glucose category '{raw}'").into(),
                )
            })
    }

    fn owner_from_row(row: &rusqlite::Row) -> rusqlite::Result<Owner> {
        let due_date = match row.get::<_, Option<String>>(2)? {
            Some(_) => Some(Self::date_column(row, 2)?),
            None => None,
        };
        Ok(Owner {
            id: row.get(0)?,
            name: row.get(1)?,
            due_date,
            created_at: row.get(3)?,
        })
    }

    // Expects the ten food columns starting at `offset`:
    // id, name, energy_kcal, protein_g, fat_g, carbohydrate_g,
    // iron_mg, folate_mcg, calcium_mg, created_at
    fn food_columns(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<FoodComposition> {
        Ok(FoodComposition {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            energy_kcal: row.get(offset + 2)?,
            protein_g: row.get(offset + 3)?,
            fat_g: row.get(offset + 4)?,
            carbohydrate_g: row.get(offset + 5)?,
            iron_mg: row.get(offset + 6)?,
            folate_mcg: row.get(offset + 7)?,
            calcium_mg: row.get(offset + 8)?,
            created_at: row.get(offset + 9)?,
        })
    }

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodComposition> {
        Self::food_columns(row, 0)
    }

    fn reading_from_row(row: &rusqlite::Row) -> rusqlite::Result<MeasurementRecord> {
        Ok(MeasurementRecord {
            id: row.get(0)?,
            uuid: row.get(1)?,
            owner_id: row.get(2)?,
            value: row.get(3)?,
            category: Self::category_column(row, 4)?,
            date: Self::date_column(row, 5)?,
            time: Self::time_column(row, 6)?,
            note: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn meal_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<NutritionEntry> {
        Ok(NutritionEntry {
            id: row.get(0)?,
            uuid: row.get(1)?,
            owner_id: row.get(2)?,
            food_id: row.get(3)?,
            servings: row.get(4)?,
            date: Self::date_column(row, 5)?,
            time: Self::time_column(row, 6)?,
            created_at: row.get(7)?,
        })
    }

    // Expects columns:
    // 0: me.date, 1: me.time, 2: me.servings, 3..=12: food columns
    fn logged_serving_from_row(row: &rusqlite::Row) -> rusqlite::Result<LoggedServing> {
        Ok(LoggedServing {
            date: Self::date_column(row, 0)?,
            time: Self::time_column(row, 1)?,
            servings: row.get(2)?,
            food: Self::food_columns(row, 3)?,
        })
    }

    fn hydration_from_row(row: &rusqlite::Row) -> rusqlite::Result<HydrationEntry> {
        Ok(HydrationEntry {
            id: row.get(0)?,
            uuid: row.get(1)?,
            owner_id: row.get(2)?,
            volume_ml: row.get(3)?,
            date: Self::date_column(row, 4)?,
            time: Self::time_column(row, 5)?,
            created_at: row.get(6)?,
        })
    }

    /// Inclusive date bounds for a range query. `None` covers every row.
    fn bounds(range: Option<DateRange>) -> (String, String) {
        match range {
            Some(r) => (
                r.start().format(DATE_FORMAT).to_string(),
                r.end().format(DATE_FORMAT).to_string(),
            ),
            None => ("0000-01-01".to_string(), "9999-12-31".to_string()),
        }
    }

    // --- Owners ---

    pub fn insert_owner(&self, owner: &NewOwner) -> Result<Owner> {
        let now = Local::now().to_rfc3339();
        let due_date = owner.due_date.map(|d| d.format(DATE_FORMAT).to_string());
        self.conn
            .execute(
                "INSERT INTO owners (id, name, due_date, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![owner.id, owner.name, due_date, now],
            )
            .with_context(|| format!("Failed to add owner '{}'", owner.id))?;
        self.get_owner(&owner.id)?
            .context("Owner not found after insert")
    }

    pub fn list_owners(&self) -> Result<Vec<Owner>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, due_date, created_at FROM owners ORDER BY id")?;
        let owners = stmt
            .query_map([], Self::owner_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }

    // --- Foods ---

    pub fn insert_food(&self, food: &NewFood) -> Result<FoodComposition> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO foods (name, energy_kcal, protein_g, fat_g, carbohydrate_g, iron_mg, folate_mcg, calcium_mg, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                food.name,
                food.energy_kcal,
                food.protein_g,
                food.fat_g,
                food.carbohydrate_g,
                food.iron_mg,
                food.folate_mcg,
                food.calcium_mg,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_food(id)
    }

    pub fn get_food(&self, id: i64) -> Result<FoodComposition> {
        self.conn
            .query_row(
                "SELECT id, name, energy_kcal, protein_g, fat_g, carbohydrate_g, iron_mg, folate_mcg, calcium_mg, created_at
                 FROM foods WHERE id = ?1",
                params![id],
                Self::food_from_row,
            )
            .with_context(|| format!("Food {id} not found"))
    }

    pub fn list_foods(&self, search: Option<&str>) -> Result<Vec<FoodComposition>> {
        let pattern = search.map(|query| {
            let escaped = query
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        });
        let mut stmt = self.conn.prepare(
            "SELECT id, name, energy_kcal, protein_g, fat_g, carbohydrate_g, iron_mg, folate_mcg, calcium_mg, created_at
             FROM foods
             WHERE ?1 IS NULL OR name LIKE ?1 ESCAPE '\\'
             ORDER BY name LIMIT 100",
        )?;
        let foods = stmt
            .query_map(params![pattern], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    // --- Glucose readings ---

    pub fn insert_glucose(&self, reading: &NewMeasurement) -> Result<MeasurementRecord> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO glucose_readings (uuid, owner_id, value, category, date, time, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    uuid,
                    reading.owner_id,
                    reading.value,
                    reading.category.as_str(),
                    reading.date.format(DATE_FORMAT).to_string(),
                    reading.time.format(TIME_FORMAT).to_string(),
                    reading.note,
                    now,
                ],
            )
            .with_context(|| format!("Failed to log reading for owner '{}'", reading.owner_id))?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, uuid, owner_id, value, category, date, time, note, created_at
                 FROM glucose_readings WHERE id = ?1",
                params![id],
                Self::reading_from_row,
            )
            .context("Glucose reading not found after insert")
    }

    // --- Meal entries ---

    pub fn insert_meal(&self, entry: &NewNutritionEntry) -> Result<NutritionEntry> {
        self.get_food(entry.food_id)?;
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO meal_entries (uuid, owner_id, food_id, servings, date, time, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    uuid,
                    entry.owner_id,
                    entry.food_id,
                    entry.servings,
                    entry.date.format(DATE_FORMAT).to_string(),
                    entry.time.format(TIME_FORMAT).to_string(),
                    now,
                ],
            )
            .with_context(|| format!("Failed to log meal for owner '{}'", entry.owner_id))?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, uuid, owner_id, food_id, servings, date, time, created_at
                 FROM meal_entries WHERE id = ?1",
                params![id],
                Self::meal_entry_from_row,
            )
            .context("Meal entry not found after insert")
    }

    // --- Hydration ---

    pub fn insert_hydration(&self, entry: &NewHydrationEntry) -> Result<HydrationEntry> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO hydration_entries (uuid, owner_id, volume_ml, date, time, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    uuid,
                    entry.owner_id,
                    entry.volume_ml,
                    entry.date.format(DATE_FORMAT).to_string(),
                    entry.time.format(TIME_FORMAT).to_string(),
                    now,
                ],
            )
            .with_context(|| format!("Failed to log water for owner '{}'", entry.owner_id))?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, uuid, owner_id, volume_ml, date, time, created_at
                 FROM hydration_entries WHERE id = ?1",
                params![id],
                Self::hydration_from_row,
            )
            .context("Hydration entry not found after insert")
    }
}

impl OwnerDirectory for Database {
    fn get_owner(&self, owner_id: &str) -> Result<Option<Owner>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, due_date, created_at FROM owners WHERE id = ?1")?;
        let mut rows = stmt.query(params![owner_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::owner_from_row(row)?))
        } else {
            Ok(None)
        }
    }
}

impl MeasurementStore for Database {
    fn glycemic_records(
        &self,
        owner_id: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<MeasurementRecord>> {
        let (start, end) = Self::bounds(range);
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, owner_id, value, category, date, time, note, created_at
             FROM glucose_readings
             WHERE owner_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, time, id",
        )?;
        let records = stmt
            .query_map(params![owner_id, start, end], Self::reading_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read glucose readings")?;
        Ok(records)
    }

    fn logged_servings(&self, owner_id: &str, range: DateRange) -> Result<Vec<LoggedServing>> {
        let (start, end) = Self::bounds(Some(range));
        let mut stmt = self.conn.prepare(
            "SELECT me.date, me.time, me.servings,
                    f.id, f.name, f.energy_kcal, f.protein_g, f.fat_g, f.carbohydrate_g,
                    f.iron_mg, f.folate_mcg, f.calcium_mg, f.created_at
             FROM meal_entries me
             JOIN foods f ON me.food_id = f.id
             WHERE me.owner_id = ?1 AND me.date >= ?2 AND me.date <= ?3
             ORDER BY me.date, me.time, me.id",
        )?;
        let servings = stmt
            .query_map(params![owner_id, start, end], Self::logged_serving_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read meal entries")?;
        Ok(servings)
    }

    fn hydration_entries(&self, owner_id: &str, range: DateRange) -> Result<Vec<HydrationEntry>> {
        let (start, end) = Self::bounds(Some(range));
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, owner_id, volume_ml, date, time, created_at
             FROM hydration_entries
             WHERE owner_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, time, id",
        )?;
        let entries = stmt
            .query_map(params![owner_id, start, end], Self::hydration_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read hydration entries")?;
        Ok(entries)
    }

    /// One aggregate query instead of loading every reading.
    #[allow(clippy::cast_sign_loss)]
    fn glycemic_statistics(
        &self,
        owner_id: &str,
        range: Option<DateRange>,
    ) -> Result<GlycemicStatistics> {
        let (start, end) = Self::bounds(range);
        let row: (i64, f64, f64, f64, i64, f64, i64, f64) = self
            .conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(AVG(value), 0), COALESCE(MIN(value), 0), COALESCE(MAX(value), 0),
                        COALESCE(SUM(CASE WHEN category = 'fasting' THEN 1 ELSE 0 END), 0),
                        COALESCE(AVG(CASE WHEN category = 'fasting' THEN value END), 0),
                        COALESCE(SUM(CASE WHEN category = 'post-meal' THEN 1 ELSE 0 END), 0),
                        COALESCE(AVG(CASE WHEN category = 'post-meal' THEN value END), 0)
                 FROM glucose_readings
                 WHERE owner_id = ?1 AND date >= ?2 AND date <= ?3",
                params![owner_id, start, end],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ))
                },
            )
            .context("Failed to compute glucose statistics")?;
        let (count, mean, min, max, fasting_count, fasting_mean, post_count, post_mean) = row;
        Ok(GlycemicStatistics {
            count: count as usize,
            mean,
            min,
            max,
            fasting: CategoryStatistics {
                count: fasting_count as usize,
                mean: fasting_mean,
            },
            post_meal: CategoryStatistics {
                count: post_count as usize,
                mean: post_mean,
            },
        })
    }
}
