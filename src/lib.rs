#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod content;
pub mod daily;
pub mod data;
pub mod entries;
pub mod logging;
pub mod nav;
pub mod preferences;
pub mod reader;
pub mod storage;
pub mod theme;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
