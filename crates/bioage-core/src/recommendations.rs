//! Static recommendation catalogue shown with a result.

use serde::{Deserialize, Serialize};

/// Number of recommendations shown with a result.
pub const SHOWN_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub priority: Priority,
}

const CATALOGUE: [(&str, &str, &str, &str, Priority); 5] = [
    (
        "1",
        "Vitamin D",
        "Take 2000IU of vitamin D a day to support cell renewal and immunity.",
        "pill",
        Priority::High,
    ),
    (
        "2",
        "Intermittent fasting",
        "A 16:8 fasting window activates autophagy and slows cellular ageing.",
        "timer",
        Priority::High,
    ),
    (
        "3",
        "More aerobic exercise",
        "Walk or jog for 30 minutes at least three times a week to improve cardiovascular fitness.",
        "activity",
        Priority::Medium,
    ),
    (
        "4",
        "Drink more water",
        "Drink at least 2L of water a day for skin elasticity and detoxification.",
        "droplets",
        Priority::Medium,
    ),
    (
        "5",
        "Sun protection",
        "Use SPF 50+ sunscreen every day to prevent photoageing.",
        "sun",
        Priority::Low,
    ),
];

/// The full catalogue, highest priority first.
pub fn catalogue() -> Vec<Recommendation> {
    let mut all: Vec<Recommendation> = CATALOGUE
        .iter()
        .map(|&(id, title, description, icon, priority)| Recommendation {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            icon: icon.into(),
            priority,
        })
        .collect();
    all.sort_by_key(|r| r.priority);
    all
}

/// Recommendations attached to a result.
pub fn select() -> Vec<Recommendation> {
    catalogue().into_iter().take(SHOWN_RECOMMENDATIONS).collect()
}
