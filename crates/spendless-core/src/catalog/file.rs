//! TOML template files.
//!
//! ```toml
//! [[templates]]
//! id = "no-takeout-10d"
//! title = "No Takeout"
//! duration_days = 10
//!
//! [templates.rule]
//! type = "spend_block"
//! category_filter = "FOOD_AND_DRINK_FAST_FOOD"
//! ```

use serde::Deserialize;

use crate::error::CatalogError;
use crate::model::ChallengeTemplate;

#[derive(Deserialize)]
struct TemplatesFile {
    #[serde(default)]
    templates: Vec<ChallengeTemplate>,
}

pub(super) fn parse(content: &str) -> Result<Vec<ChallengeTemplate>, CatalogError> {
    let file: TemplatesFile = toml::from_str(content)?;
    Ok(file.templates)
}
