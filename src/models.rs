// Cost entry domain types
// Wire/at-rest shape: { id?, costName, amount, month, year, category }

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lowest year the entry form accepts.
pub const MIN_YEAR: i32 = 1900;

/// Highest year the entry form accepts.
pub const MAX_YEAR: i32 = 2022;

// ============================================================================
// CATEGORY
// ============================================================================

/// Closed set of categories offered by the entry form.
/// The store keeps the category as plain text, so adding a variant needs no migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Living,
    Car,
    Lifestyle,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Living, Category::Car, Category::Lifestyle];

    /// Stored value
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Living => "Living",
            Category::Car => "Car",
            Category::Lifestyle => "Lifestyle",
        }
    }

    /// Label shown by the entry form
    pub fn label(&self) -> &'static str {
        match self {
            Category::Living => "Living",
            Category::Car => "Car Expenses",
            Category::Lifestyle => "Life Style",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .iter()
            .find(|c| {
                c.as_str().eq_ignore_ascii_case(wanted) || c.label().eq_ignore_ascii_case(wanted)
            })
            .copied()
            .ok_or_else(|| format!("Unknown category '{}'", wanted))
    }
}

// ============================================================================
// PERIOD
// ============================================================================

/// (month, year) pair used as the composite lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub month: u32,
    pub year: i32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Self {
        Self { month, year }
    }
}

impl Default for Period {
    /// The filter form starts at January 1990.
    fn default() -> Self {
        Self {
            month: 1,
            year: 1990,
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

// ============================================================================
// COST ENTRY
// ============================================================================

/// A committed cost entry. `id` is assigned by the store on first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    pub id: i64,
    pub cost_name: String,
    pub amount: f64,
    pub month: u32,
    pub year: i32,
    pub category: Category,
}

impl CostEntry {
    pub fn period(&self) -> Period {
        Period::new(self.month, self.year)
    }

    /// Same content, ignoring the assigned id.
    pub fn same_content(&self, other: &CostEntry) -> bool {
        self.cost_name == other.cost_name
            && self.amount == other.amount
            && self.month == other.month
            && self.year == other.year
            && self.category == other.category
    }
}

/// Unvalidated entry as submitted by a caller. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntryInput {
    #[serde(default)]
    pub cost_name: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
}

impl CostEntryInput {
    pub fn new(
        cost_name: &str,
        amount: f64,
        month: u32,
        year: i32,
        category: &str,
    ) -> Self {
        Self {
            cost_name: Some(cost_name.to_string()),
            amount: Some(amount),
            month: Some(month),
            year: Some(year),
            category: Some(category.to_string()),
        }
    }
}

impl From<&CostEntry> for CostEntryInput {
    fn from(entry: &CostEntry) -> Self {
        CostEntryInput::new(
            &entry.cost_name,
            entry.amount,
            entry.month,
            entry.year,
            entry.category.as_str(),
        )
    }
}

/// Entry that passed validation and has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCost {
    pub cost_name: String,
    pub amount: f64,
    pub month: u32,
    pub year: i32,
    pub category: Category,
}

impl NewCost {
    pub fn with_id(self, id: i64) -> CostEntry {
        CostEntry {
            id,
            cost_name: self.cost_name,
            amount: self.amount,
            month: self.month,
            year: self.year,
            category: self.category,
        }
    }
}
