//! Enrollment commands: join, check-in and the read-only views.

use chrono::NaiveDate;
use spendless_core::Config;

use super::{open_api, print_response, CommandResult};

pub async fn join(config: &Config, user_id: &str, template_id: &str) -> CommandResult {
    let api = open_api(config)?;
    print_response(&api.join(user_id, template_id).await)
}

pub async fn check_in(config: &Config, user_id: &str, template_id: &str, date: Option<NaiveDate>) -> CommandResult {
    let api = open_api(config)?;
    print_response(&api.check_in(user_id, template_id, date).await)
}

pub async fn streak(config: &Config, user_id: &str, template_id: &str) -> CommandResult {
    let api = open_api(config)?;
    print_response(&api.streak(user_id, template_id).await)
}

pub async fn history(config: &Config, user_id: &str, template_id: &str) -> CommandResult {
    let api = open_api(config)?;
    print_response(&api.history(user_id, template_id).await)
}

pub async fn enrollments(config: &Config, user_id: &str) -> CommandResult {
    let api = open_api(config)?;
    print_response(&api.enrollments(user_id).await)
}
