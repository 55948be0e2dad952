mod food;
mod helpers;
mod log;
mod owner;
mod report;
mod summary;

pub(crate) use food::{cmd_food_add, cmd_food_list};
pub(crate) use helpers::DEFAULT_REPORT_DAYS;
pub(crate) use log::{LogArgs, cmd_glucose_log, cmd_glucose_stats, cmd_meal_log, cmd_water_log};
pub(crate) use owner::{cmd_owner_add, cmd_owner_list, cmd_owner_show};
pub(crate) use report::cmd_report;
pub(crate) use summary::{cmd_history, cmd_summary};
