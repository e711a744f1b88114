//! Regional UK house price trends, normalized for inflation and currency

pub mod cli;
pub mod config;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod types;
