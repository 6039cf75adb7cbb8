use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const DEFAULT_WEEKLY_FREQUENCY: i64 = 7;

/// A tracked recurring behaviour with a target number of completions per week.
///
/// Fields stay private so every mutation runs through validation; the count of
/// logged instances is kept in sync by the owning collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    name: String,
    category: String,
    weekly_frequency: u32,
    instance_count: u64,
}

impl Habit {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        weekly_frequency: i64,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let category = category.into();
        require_non_empty("name", &name)?;
        require_non_empty("category", &category)?;
        let weekly_frequency = require_positive_frequency(weekly_frequency)?;
        Ok(Self {
            name,
            category,
            weekly_frequency,
            instance_count: 0,
        })
    }

    /// Like [`Habit::new`] with the target left at seven completions a week.
    pub fn with_default_frequency(
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::new(name, category, DEFAULT_WEEKLY_FREQUENCY)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn weekly_frequency(&self) -> u32 {
        self.weekly_frequency
    }

    pub fn instance_count(&self) -> u64 {
        self.instance_count
    }

    /// Re-applying the current name is a no-op success, not an error.
    pub fn rename(&mut self, new_name: impl Into<String>) -> Result<(), ValidationError> {
        let new_name = new_name.into();
        require_non_empty("name", &new_name)?;
        self.name = new_name;
        Ok(())
    }

    pub fn recategorize(&mut self, new_category: impl Into<String>) -> Result<(), ValidationError> {
        let new_category = new_category.into();
        require_non_empty("category", &new_category)?;
        self.category = new_category;
        Ok(())
    }

    pub fn set_weekly_frequency(&mut self, new_frequency: i64) -> Result<(), ValidationError> {
        self.weekly_frequency = require_positive_frequency(new_frequency)?;
        Ok(())
    }

    /// The unsigned parameter makes the non-negative invariant structural;
    /// textual sources reject negative counts where the cell is parsed.
    pub fn set_instance_count(&mut self, count: u64) {
        self.instance_count = count;
    }

    /// Human-readable summary for display and logs. Nothing parses this.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Habit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Habit: {} ({}), target {}x per week, {} logged",
            self.name, self.category, self.weekly_frequency, self.instance_count
        )
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    Ok(())
}

fn require_positive_frequency(frequency: i64) -> Result<u32, ValidationError> {
    if frequency <= 0 {
        return Err(ValidationError::NonPositiveFrequency(frequency));
    }
    u32::try_from(frequency).map_err(|_| ValidationError::NonPositiveFrequency(frequency))
}
