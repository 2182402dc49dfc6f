pub mod app;
pub mod config;
pub mod decoder;
pub mod domain;
pub mod error;
pub mod filters;
pub mod fs_util;
pub mod output;
pub mod record;
pub mod service;
pub mod state;
pub mod tui;
pub mod viewer;
