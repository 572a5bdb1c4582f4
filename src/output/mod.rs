//! Output module for sweep results
//!
//! This module handles:
//! - Writing discovered item ids to a newline-delimited list
//! - Loading a list of already downloaded ids to skip
//! - Printing the run report

mod items;
mod report;

pub use items::{load_item_list, write_item_list};
pub use report::{format_report, print_report};
