//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; the route table dispatches to the generation workflow.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_generation_summary, format_provider_list_json, format_provider_list_text,
    ProviderListing,
};
pub use route::RunContext;
