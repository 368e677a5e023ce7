//! 点検チェックリスト・不具合記録エンジン

pub mod assets;
pub mod capture;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod report;
pub mod rounds;
pub mod store;
pub mod workflow;

pub use inspection_common as common;
