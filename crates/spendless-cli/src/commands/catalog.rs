use clap::Subcommand;
use spendless_core::Config;

use super::{open_api, print_response, CommandResult};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List all challenge templates
    List,
}

pub async fn run(action: CatalogAction, config: &Config) -> CommandResult {
    let api = open_api(config)?;
    match action {
        CatalogAction::List => print_response(&api.templates().await),
    }
}
