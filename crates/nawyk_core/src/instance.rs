use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Accepted input formats, tried in order. Day-first wins over ISO so
/// `05/03/2024` reads as the fifth of March.
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%B %d, %Y", "%d %B %Y"];

/// The one canonical rendering used for display and storage alike.
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// One logged occurrence of a habit on a calendar date.
///
/// The habit is referenced by name, never by object, so an instance survives
/// the referenced habit being renamed or absent entirely; the collection does
/// not enforce referential integrity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitInstance {
    habit_name: String,
    date: NaiveDate,
    done: bool,
    out_of_control: bool,
}

impl HabitInstance {
    pub fn new(
        habit_name: impl Into<String>,
        date: &str,
        done: bool,
        out_of_control: bool,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            habit_name: habit_name.into(),
            date: parse_date(date)?,
            done,
            out_of_control,
        })
    }

    pub fn habit_name(&self) -> &str {
        &self.habit_name
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn out_of_control(&self) -> bool {
        self.out_of_control
    }

    pub fn set_done(&mut self, done: bool) {
        self.done = done;
    }

    /// Marks the instance as affected by circumstances outside the user's
    /// control, e.g. a gym closure on a training day.
    pub fn set_out_of_control(&mut self, out_of_control: bool) {
        self.out_of_control = out_of_control;
    }

    pub fn formatted_date(&self) -> String {
        self.date.format(DISPLAY_DATE_FORMAT).to_string()
    }
}

impl fmt::Display for HabitInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}: {}",
            self.habit_name,
            self.formatted_date(),
            if self.done { "done" } else { "missed" }
        )?;
        if self.out_of_control {
            write!(f, " (conditions out of control)")?;
        }
        Ok(())
    }
}

pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = input.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    Err(ValidationError::UnparsableDate(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_every_accepted_input_format() {
        for input in ["2024-3-5", "05/03/2024", "March 5, 2024", "5 March 2024"] {
            let instance = HabitInstance::new("Exercise", input, false, false).unwrap();
            assert_eq!(instance.formatted_date(), "05/03/2024", "input `{input}`");
        }
    }

    #[test]
    fn day_first_beats_iso_on_slashed_dates() {
        let instance = HabitInstance::new("Exercise", "01/02/2024", false, false).unwrap();
        assert_eq!(
            instance.date(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[test]
    fn rejects_unparsable_dates() {
        for input in ["not a date", "32/01/2024", ""] {
            assert_eq!(
                HabitInstance::new("Exercise", input, false, false),
                Err(ValidationError::UnparsableDate(input.to_string()))
            );
        }
    }

    #[test]
    fn flags_mutate_in_place() {
        let mut instance = HabitInstance::new("Exercise", "01/01/2024", false, false).unwrap();
        instance.set_done(true);
        instance.set_out_of_control(true);
        assert!(instance.done());
        assert!(instance.out_of_control());
    }
}
