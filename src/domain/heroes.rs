//! Hero domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{default_true, double_option, empty_as_none};

fn default_power_level() -> i64 {
    1
}

/// Trim and capitalise the first letter of every word, lowercasing the rest.
/// A word starts after any non-alphabetic character, so "spider-man" becomes
/// "Spider-Man".
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_alpha = false;

    for c in s.trim().chars() {
        if c.is_alphabetic() {
            if prev_is_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_alpha = true;
        } else {
            out.push(c);
            prev_is_alpha = false;
        }
    }

    out
}

/// Request DTO for creating a hero
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateHeroRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(length(
        min = 1,
        max = 100,
        message = "Secret name must be between 1 and 100 characters"
    ))]
    pub secret_name: String,
    #[serde(default)]
    #[validate(range(min = 0, max = 1000, message = "Age must be between 0 and 1000"))]
    pub age: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[serde(default = "default_power_level")]
    #[validate(range(min = 1, max = 100, message = "Power level must be between 1 and 100"))]
    pub power_level: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    #[validate(length(max = 500, message = "Avatar URL must be at most 500 characters"))]
    pub avatar_url: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "Team must be at most 100 characters"))]
    pub team: Option<String>,
    #[serde(default)]
    pub abilities: Option<Vec<String>>,
    #[serde(default)]
    #[validate(length(max = 500, message = "Weakness must be at most 500 characters"))]
    pub weakness: Option<String>,
}

/// Request DTO for updating a hero.
///
/// Absent fields are left unchanged. An explicit `null` clears a nullable
/// field.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateHeroRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(
        min = 1,
        max = 100,
        message = "Secret name must be between 1 and 100 characters"
    ))]
    pub secret_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(range(min = 0, max = 1000, message = "Age must be between 0 and 1000"))]
    pub age: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<Option<String>>,
    #[serde(default)]
    #[validate(range(min = 1, max = 100, message = "Power level must be between 1 and 100"))]
    pub power_level: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 500, message = "Avatar URL must be at most 500 characters"))]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 100, message = "Team must be at most 100 characters"))]
    pub team: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub abilities: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "double_option")]
    #[validate(length(max = 500, message = "Weakness must be at most 500 characters"))]
    pub weakness: Option<Option<String>>,
}

/// List filters for heroes; combined with page/size from the same query string.
/// Empty `team` or `search` values are ignored.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HeroFilter {
    #[serde(default = "default_true")]
    pub active_only: bool,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub team: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 100, message = "min_power_level must be between 1 and 100"))]
    pub min_power_level: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 1, max = 100, message = "max_power_level must be between 1 and 100"))]
    pub max_power_level: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 100, message = "search must be at most 100 characters"))]
    pub search: Option<String>,
}

/// Response DTO for hero
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroResponse {
    pub id: i64,
    pub name: String,
    pub secret_name: String,
    pub age: Option<i64>,
    pub description: Option<String>,
    pub power_level: i64,
    pub is_active: bool,
    pub avatar_url: Option<String>,
    pub team: Option<String>,
    pub abilities: Option<Vec<String>>,
    pub weakness: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Power-level bucket used by the distribution statistics
#[derive(Debug, Clone, Copy)]
pub struct PowerRange {
    pub min: i64,
    pub max: i64,
    pub label: &'static str,
}

pub const POWER_RANGES: [PowerRange; 4] = [
    PowerRange { min: 1, max: 20, label: "Low" },
    PowerRange { min: 21, max: 50, label: "Medium" },
    PowerRange { min: 51, max: 80, label: "High" },
    PowerRange { min: 81, max: 100, label: "Legendary" },
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerStatistics {
    pub min_power: Option<i64>,
    pub max_power: Option<i64>,
    pub avg_power: f64,
    pub total_heroes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerBucket {
    pub range: String,
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerDistribution {
    pub statistics: PowerStatistics,
    pub distribution: Vec<PowerBucket>,
}
