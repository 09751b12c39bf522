#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unused_self,
    clippy::unnecessary_wraps
)]

use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod gateway;
pub mod providers;
pub mod resources;
pub mod sessions;
pub mod shell;

pub use config::Config;

/// Where `kairos chat` sends each turn
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum ChatBackendKind {
    /// Run the pipeline in this process
    #[default]
    Direct,
    /// Call a running gateway's `POST /chat`
    Http,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Dump the full configuration JSON Schema to stdout
    Schema,
    /// Print the path of the active config file
    Path,
}
