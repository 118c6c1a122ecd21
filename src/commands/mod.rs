pub mod config;
mod history;
mod output;

pub use history::{HistoryOptions, history, run};
