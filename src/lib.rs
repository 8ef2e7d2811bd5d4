pub mod config;
pub mod errors;
pub mod feeds;
pub mod models;
pub mod report;
pub mod risk;
pub mod simulation;
