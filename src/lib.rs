pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod generate;
pub mod git;
pub mod guard;
pub mod logging;
pub mod prompt;
pub mod provider;
pub mod sink;
pub mod ui;
