// Input validation for cost entries
// Every field is checked so the caller gets the full list of problems at once.

use crate::error::CostError;
use crate::models::{Category, CostEntryInput, NewCost, MAX_YEAR, MIN_YEAR};

// ============================================================================
// VALIDATION ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn missing(field: &str) -> Self {
        Self::new(field, "Required field is missing")
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Check an input and turn it into a storable entry.
/// Zero and blank values count as missing, like an untouched form field.
pub fn validate(input: &CostEntryInput) -> Result<NewCost, CostError> {
    let mut errors = Vec::new();

    let cost_name = match input.cost_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(name.to_string()),
        _ => {
            errors.push(ValidationError::missing("costName"));
            None
        }
    };

    let amount = match input.amount {
        None => {
            errors.push(ValidationError::missing("amount"));
            None
        }
        Some(a) if !a.is_finite() => {
            errors.push(ValidationError::new("amount", "Must be a finite number"));
            None
        }
        Some(a) if a == 0.0 => {
            errors.push(ValidationError::missing("amount"));
            None
        }
        Some(a) if a < 0.0 => {
            errors.push(ValidationError::new(
                "amount",
                format!("Must be positive, got {}", a),
            ));
            None
        }
        Some(a) => Some(a),
    };

    let month = match input.month {
        None | Some(0) => {
            errors.push(ValidationError::missing("month"));
            None
        }
        Some(m) if m > 12 => {
            errors.push(ValidationError::new(
                "month",
                format!("Must be between 1 and 12, got {}", m),
            ));
            None
        }
        Some(m) => Some(m),
    };

    let year = match input.year {
        None | Some(0) => {
            errors.push(ValidationError::missing("year"));
            None
        }
        Some(y) if !(MIN_YEAR..=MAX_YEAR).contains(&y) => {
            errors.push(ValidationError::new(
                "year",
                format!("Must be between {} and {}, got {}", MIN_YEAR, MAX_YEAR, y),
            ));
            None
        }
        Some(y) => Some(y),
    };

    let category = match input.category.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => match raw.parse::<Category>() {
            Ok(c) => Some(c),
            Err(message) => {
                errors.push(ValidationError::new("category", message));
                None
            }
        },
        _ => {
            errors.push(ValidationError::missing("category"));
            None
        }
    };

    match (cost_name, amount, month, year, category) {
        (Some(cost_name), Some(amount), Some(month), Some(year), Some(category))
            if errors.is_empty() =>
        {
            Ok(NewCost {
                cost_name,
                amount,
                month,
                year,
                category,
            })
        }
        _ => Err(CostError::Validation(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_fields(input: &CostEntryInput) -> Vec<String> {
        match validate(input) {
            Err(CostError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_input_passes() {
        let cost = validate(&CostEntryInput::new("  Rent ", 1200.0, 1, 1990, "Living")).unwrap();

        assert_eq!(cost.cost_name, "Rent");
        assert_eq!(cost.amount, 1200.0);
        assert_eq!(cost.month, 1);
        assert_eq!(cost.year, 1990);
        assert_eq!(cost.category, Category::Living);
    }

    #[test]
    fn test_empty_input_reports_every_field() {
        let fields = failing_fields(&CostEntryInput::default());
        assert_eq!(fields, vec!["costName", "amount", "month", "year", "category"]);
    }

    #[test]
    fn test_zero_values_count_as_missing() {
        let input = CostEntryInput::new("Gas", 0.0, 0, 0, "Car");
        assert_eq!(failing_fields(&input), vec!["amount", "month", "year"]);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert_eq!(failing_fields(&CostEntryInput::new("Gas", 40.0, 13, 1990, "Car")), vec!["month"]);
        assert_eq!(failing_fields(&CostEntryInput::new("Gas", 40.0, 2, 1899, "Car")), vec!["year"]);
        assert_eq!(failing_fields(&CostEntryInput::new("Gas", 40.0, 2, 2023, "Car")), vec!["year"]);
        assert_eq!(failing_fields(&CostEntryInput::new("Gas", -1.0, 2, 1990, "Car")), vec!["amount"]);
        assert_eq!(
            failing_fields(&CostEntryInput::new("Gas", f64::NAN, 2, 1990, "Car")),
            vec!["amount"]
        );
    }

    #[test]
    fn test_blank_name_and_unknown_category() {
        let input = CostEntryInput::new("   ", 40.0, 2, 1990, "Groceries");
        assert_eq!(failing_fields(&input), vec!["costName", "category"]);
    }

    #[test]
    fn test_year_bounds_are_inclusive() {
        assert!(validate(&CostEntryInput::new("Old", 1.0, 12, MIN_YEAR, "Living")).is_ok());
        assert!(validate(&CostEntryInput::new("New", 1.0, 12, MAX_YEAR, "Lifestyle")).is_ok());
    }
}
