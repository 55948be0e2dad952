mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    LogArgs, cmd_food_add, cmd_food_list, cmd_glucose_log, cmd_glucose_stats, cmd_history,
    cmd_meal_log, cmd_owner_add, cmd_owner_list, cmd_owner_show, cmd_report, cmd_summary,
    cmd_water_log,
};
use crate::config::Config;
use gestar_core::db::Database;
use gestar_core::models::{NewFood, ReportKind};

const DEFAULT_LOG_FILTER: &str = "warn,gestar=info,gestar_core=info";

#[derive(Parser)]
#[command(
    name = "gestar",
    version,
    about = "Pregnancy glycemic, nutrition and hydration tracker",
    long_about = "Log glucose readings, meals and water intake during pregnancy, \
                  and compile clinical PDF reports for the care team."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage tracked owners
    Owner {
        #[command(subcommand)]
        command: OwnerCommands,
    },
    /// Manage the food composition table
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Capillary glucose readings
    Glucose {
        #[command(subcommand)]
        command: GlucoseCommands,
    },
    /// Meal entries
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Water intake
    Water {
        #[command(subcommand)]
        command: WaterCommands,
    },
    /// Show nutrition and adequacy for one day (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Owner ID
        #[arg(short, long)]
        owner: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daily adequacy for the last N days
    History {
        /// Owner ID
        #[arg(short, long)]
        owner: String,
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compile a PDF report
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Start the report HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum OwnerCommands {
    /// Register an owner
    Add {
        /// Owner ID (no whitespace or '/')
        id: String,
        /// Display name printed on reports
        name: String,
        /// Expected due date (YYYY-MM-DD)
        #[arg(long)]
        due_date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show an owner with overall glucose statistics
    Show {
        /// Owner ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all owners
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food with its nutrient content per serving
    Add {
        /// Food name
        name: String,
        /// Energy (kcal)
        #[arg(long)]
        kcal: f64,
        /// Protein (g)
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Fat (g)
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Carbohydrate (g)
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Iron (mg)
        #[arg(long, default_value = "0")]
        iron: f64,
        /// Folate (mcg)
        #[arg(long, default_value = "0")]
        folate: f64,
        /// Calcium (mg)
        #[arg(long, default_value = "0")]
        calcium: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List/search the food table
    List {
        /// Search query to filter foods
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GlucoseCommands {
    /// Log a glucose reading
    Log {
        /// Owner ID
        owner: String,
        /// Glucose value in mg/dL
        value: f64,
        /// Category: fasting or post-meal
        #[arg(short, long, default_value = "fasting")]
        category: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Time (HH:MM, default: now)
        #[arg(long)]
        time: Option<String>,
        /// Optional note
        #[arg(long)]
        note: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show glucose statistics for a period (default: last 30 days)
    Stats {
        /// Owner ID
        owner: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Last day (YYYY-MM-DD, default: today)
        #[arg(long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Log servings of a food
    Log {
        /// Owner ID
        owner: String,
        /// Food ID (see `gestar food list`)
        food_id: i64,
        /// Number of servings
        #[arg(short, long, default_value = "1")]
        servings: f64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Time (HH:MM, default: now)
        #[arg(long)]
        time: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WaterCommands {
    /// Log water intake
    Log {
        /// Owner ID
        owner: String,
        /// Volume in ml
        volume: f64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Time (HH:MM, default: now)
        #[arg(long)]
        time: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Full clinician report (glycemia, nutrition, hydration)
    Doctor {
        #[command(flatten)]
        args: ReportArgs,
    },
    /// Patient report (glycemia only)
    Patient {
        #[command(flatten)]
        args: ReportArgs,
    },
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Owner ID
    owner: String,
    /// First day (YYYY-MM-DD, default: 30 days before --end)
    #[arg(long)]
    start: Option<String>,
    /// Last day (YYYY-MM-DD, default: today)
    #[arg(long)]
    end: Option<String>,
    /// Output file or directory (default: generated name in the current directory)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let report_config = config.load_report_config()?;
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Owner { command } => match command {
            OwnerCommands::Add {
                id,
                name,
                due_date,
                json,
            } => cmd_owner_add(&db, &id, &name, due_date, json),
            OwnerCommands::Show { id, json } => cmd_owner_show(&db, &id, json),
            OwnerCommands::List { json } => cmd_owner_list(&db, json),
        },
        Commands::Food { command } => match command {
            FoodCommands::Add {
                name,
                kcal,
                protein,
                fat,
                carbs,
                iron,
                folate,
                calcium,
                json,
            } => {
                let food = NewFood {
                    name,
                    energy_kcal: kcal,
                    protein_g: protein,
                    fat_g: fat,
                    carbohydrate_g: carbs,
                    iron_mg: iron,
                    folate_mcg: folate,
                    calcium_mg: calcium,
                };
                cmd_food_add(&db, &food, json)
            }
            FoodCommands::List { search, json } => cmd_food_list(&db, search.as_deref(), json),
        },
        Commands::Glucose { command } => match command {
            GlucoseCommands::Log {
                owner,
                value,
                category,
                date,
                time,
                note,
                json,
            } => cmd_glucose_log(
                &db,
                LogArgs {
                    owner,
                    date,
                    time,
                    json,
                },
                value,
                &category,
                note,
                &report_config.glycemic_targets,
            ),
            GlucoseCommands::Stats {
                owner,
                start,
                end,
                json,
            } => cmd_glucose_stats(
                &db,
                &owner,
                start,
                end,
                &report_config.glycemic_targets,
                json,
            ),
        },
        Commands::Meal { command } => match command {
            MealCommands::Log {
                owner,
                food_id,
                servings,
                date,
                time,
                json,
            } => cmd_meal_log(
                &db,
                LogArgs {
                    owner,
                    date,
                    time,
                    json,
                },
                food_id,
                servings,
            ),
        },
        Commands::Water { command } => match command {
            WaterCommands::Log {
                owner,
                volume,
                date,
                time,
                json,
            } => cmd_water_log(
                &db,
                LogArgs {
                    owner,
                    date,
                    time,
                    json,
                },
                volume,
            ),
        },
        Commands::Summary { date, owner, json } => {
            cmd_summary(&db, &owner, date, &report_config.targets, json)
        }
        Commands::History { owner, days, json } => {
            cmd_history(&db, &owner, days, &report_config.targets, json)
        }
        Commands::Report { command } => {
            let (kind, args) = match command {
                ReportCommands::Doctor { args } => (ReportKind::Clinician, args),
                ReportCommands::Patient { args } => (ReportKind::Patient, args),
            };
            cmd_report(
                &db,
                &report_config,
                kind,
                &args.owner,
                args.start,
                args.end,
                args.output,
                args.json,
            )
        }
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let (api_key, new_api_key) = if no_auth {
                (None, false)
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                (Some(key), new)
            };
            server::start_server(db, report_config, port, &bind, api_key, new_api_key).await
        }
    }
}
