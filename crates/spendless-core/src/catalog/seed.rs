//! Built-in challenge templates.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde_json::json;

use crate::model::{ChallengeTemplate, Difficulty, Rule};

fn reward(points: u32, badge: &str) -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([
        ("points".to_string(), json!(points)),
        ("badge".to_string(), json!(badge)),
    ])
}

pub(super) fn templates() -> Vec<ChallengeTemplate> {
    vec![
        ChallengeTemplate {
            id: "no-fast-food-7d".into(),
            title: "No Fast Food Week".into(),
            description: "Skip fast food for 7 days straight.".into(),
            duration_days: 7,
            rule: Rule::SpendBlock {
                category_filter: Some("FOOD_AND_DRINK_FAST_FOOD".into()),
                merchants: vec![],
            },
            difficulty: Difficulty::Medium,
            reward: reward(100, "drive-thru-dodger"),
        },
        ChallengeTemplate {
            id: "coffee-cap-14d".into(),
            title: "Coffee Budget".into(),
            description: "Keep coffee shop spending at or under $25 for two weeks.".into(),
            duration_days: 14,
            rule: Rule::SpendCap {
                category_filter: "FOOD_AND_DRINK_COFFEE".into(),
                cap_amount: Decimal::new(2500, 2),
            },
            difficulty: Difficulty::Medium,
            reward: reward(150, "bean-counter"),
        },
        ChallengeTemplate {
            id: "cook-at-home-7d".into(),
            title: "Cook at Home".into(),
            description: "Swap restaurant meals for groceries this week.".into(),
            duration_days: 7,
            rule: Rule::Replacement {
                from_category: "FOOD_AND_DRINK_RESTAURANT".into(),
                to_category: "FOOD_AND_DRINK_GROCERIES".into(),
            },
            difficulty: Difficulty::Hard,
            reward: reward(200, "home-chef"),
        },
        ChallengeTemplate {
            id: "daily-groceries-5d".into(),
            title: "Fresh Every Day".into(),
            description: "Buy groceries every day for 5 days instead of eating out.".into(),
            duration_days: 5,
            rule: Rule::StreakGoal {
                category_filter: "FOOD_AND_DRINK_GROCERIES".into(),
                duration: 5,
            },
            difficulty: Difficulty::Hard,
            reward: reward(120, "market-regular"),
        },
        ChallengeTemplate {
            id: "no-rideshare-3d".into(),
            title: "Walk It Off".into(),
            description: "No taxis or ride shares for a long weekend.".into(),
            duration_days: 3,
            rule: Rule::SpendBlock {
                category_filter: Some("TRANSPORTATION_TAXIS_AND_RIDE_SHARES".into()),
                merchants: vec!["Uber".into(), "Lyft".into()],
            },
            difficulty: Difficulty::Easy,
            reward: reward(50, "pedestrian"),
        },
    ]
}
