pub mod adequacy;
pub mod aggregation;
pub mod canvas;
pub mod chart;
pub mod db;
pub mod error;
pub mod models;
pub mod pdf;
pub mod quick_access;
pub mod report;
pub mod store;
pub mod trend;
