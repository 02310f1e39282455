//! Sync subcommand: refresh a user's transactions from the configured
//! provider (JSON exports or the HTTP aggregation service).

use spendless_core::Config;

use super::{open_api, print_response, CommandResult};

pub async fn run(config: &Config, user_id: &str, days: Option<u32>) -> CommandResult {
    let api = open_api(config)?;
    print_response(&api.sync(user_id, days).await)
}
