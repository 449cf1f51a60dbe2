pub mod ability;
pub mod board;
pub mod cli;
pub mod config;
pub mod forecast;
pub mod simulation;
