use serde::{Deserialize, Serialize};

use crate::instance::HabitInstance;

/// How a single habit is going, computed from the logged instances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HabitStats {
    pub habit: String,
    pub instances: usize,
    pub completed: usize,
    /// Percentage of logged instances marked done; zero when nothing is logged.
    pub completion_rate: f64,
}

pub fn collect(habit_name: &str, instances: &[HabitInstance]) -> HabitStats {
    let mut logged = 0usize;
    let mut completed = 0usize;
    for instance in instances {
        if instance.habit_name() != habit_name {
            continue;
        }
        logged += 1;
        if instance.done() {
            completed += 1;
        }
    }
    let completion_rate = if logged == 0 {
        0.0
    } else {
        completed as f64 / logged as f64 * 100.0
    };
    HabitStats {
        habit: habit_name.to_string(),
        instances: logged,
        completed,
        completion_rate,
    }
}
