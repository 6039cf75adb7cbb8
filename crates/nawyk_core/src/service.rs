use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PersistenceError, ValidationError};
use crate::habit::Habit;
use crate::instance::HabitInstance;
use crate::notifications::TableObserver;
use crate::stats::{self, HabitStats};
use crate::store::CsvStore;
use crate::table::{
    records_from_projection, TableAdapter, TableKind, TableProjection, TableRecord,
};

/// Insertion-order handle for a habit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HabitId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub usize);

/// Both projections in one payload, for shells that redraw everything at once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub habits: TableProjection,
    pub instances: TableProjection,
}

/// Facade over the two collections. All mutators take `&self`; the adapters
/// sit behind locks so the shell can hold the service wherever it likes.
pub struct HabitService {
    habits: RwLock<TableAdapter<Habit>>,
    instances: RwLock<TableAdapter<HabitInstance>>,
}

pub struct HabitServiceBuilder {
    habit_observers: Vec<Box<dyn TableObserver>>,
    instance_observers: Vec<Box<dyn TableObserver>>,
    habit_file: Option<PathBuf>,
    instance_file: Option<PathBuf>,
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            habit_observers: Vec::new(),
            instance_observers: Vec::new(),
            habit_file: None,
            instance_file: None,
        }
    }

    pub fn with_observer(mut self, kind: TableKind, observer: Box<dyn TableObserver>) -> Self {
        match kind {
            TableKind::Habits => self.habit_observers.push(observer),
            TableKind::Instances => self.instance_observers.push(observer),
        }
        self
    }

    pub fn with_habit_file(mut self, path: impl AsRef<Path>) -> Self {
        self.habit_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_instance_file(mut self, path: impl AsRef<Path>) -> Self {
        self.instance_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> Result<HabitService, PersistenceError> {
        let mut habits = TableAdapter::new();
        for observer in self.habit_observers {
            habits.subscribe(observer);
        }
        let mut instances = TableAdapter::new();
        for observer in self.instance_observers {
            instances.subscribe(observer);
        }
        let service = HabitService {
            habits: RwLock::new(habits),
            instances: RwLock::new(instances),
        };
        if let Some(path) = &self.habit_file {
            service.load(TableKind::Habits, path)?;
        }
        if let Some(path) = &self.instance_file {
            service.load(TableKind::Instances, path)?;
        }
        Ok(service)
    }
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    /// Rejects empty fields, non-positive frequencies and duplicate names.
    /// On success the habit table already shows the new row.
    pub fn add_habit(
        &self,
        name: &str,
        category: &str,
        weekly_frequency: i64,
    ) -> Result<HabitId, ValidationError> {
        let habit = Habit::new(name, category, weekly_frequency)?;
        let mut habits = self.habits.write();
        if habits
            .records()
            .iter()
            .any(|existing| existing.name() == habit.name())
        {
            return Err(ValidationError::DuplicateName(habit.name().to_string()));
        }
        let id = HabitId(habits.records().len());
        debug!(name = habit.name(), "habit added");
        habits.append(habit);
        Ok(id)
    }

    /// The habit is referenced by name and need not exist in the habit table;
    /// instance counts are recomputed afterwards for the habits that do.
    pub fn add_instance(
        &self,
        habit_name: &str,
        date: &str,
        done: bool,
        out_of_control: bool,
    ) -> Result<InstanceId, ValidationError> {
        let instance = HabitInstance::new(habit_name, date, done, out_of_control)?;
        let id = {
            let mut instances = self.instances.write();
            let id = InstanceId(instances.records().len());
            debug!(habit = habit_name, date = %instance.formatted_date(), "instance added");
            instances.append(instance);
            id
        };
        self.recount_instances();
        Ok(id)
    }

    /// Multi-field habit edit. Everything is validated against a draft first,
    /// so a failed edit leaves the table untouched.
    pub fn alter_habit(
        &self,
        id: HabitId,
        new_name: Option<&str>,
        new_category: Option<&str>,
        new_frequency: Option<i64>,
    ) -> Result<(), ValidationError> {
        let mut habits = self.habits.write();
        let records = habits.records();
        let Some(current) = records.get(id.0) else {
            return Err(ValidationError::UnknownHabitId(id.0));
        };
        if let Some(name) = new_name {
            let taken = records
                .iter()
                .enumerate()
                .any(|(index, other)| index != id.0 && other.name() == name);
            if taken {
                return Err(ValidationError::DuplicateName(name.to_string()));
            }
        }
        let mut draft = current.clone();
        if let Some(name) = new_name {
            draft.rename(name)?;
        }
        if let Some(category) = new_category {
            draft.recategorize(category)?;
        }
        if let Some(frequency) = new_frequency {
            draft.set_weekly_frequency(frequency)?;
        }
        habits.update(|records| records[id.0] = draft);
        Ok(())
    }

    pub fn set_instance_done(&self, id: InstanceId, done: bool) -> Result<(), ValidationError> {
        self.edit_instance(id, |instance| instance.set_done(done))
    }

    pub fn set_instance_out_of_control(
        &self,
        id: InstanceId,
        out_of_control: bool,
    ) -> Result<(), ValidationError> {
        self.edit_instance(id, |instance| instance.set_out_of_control(out_of_control))
    }

    fn edit_instance(
        &self,
        id: InstanceId,
        apply: impl FnOnce(&mut HabitInstance),
    ) -> Result<(), ValidationError> {
        let mut instances = self.instances.write();
        if id.0 >= instances.records().len() {
            return Err(ValidationError::UnknownInstanceId(id.0));
        }
        instances.update(|records| {
            if let Some(instance) = records.get_mut(id.0) {
                apply(instance);
            }
        });
        Ok(())
    }

    pub fn subscribe(&self, kind: TableKind, observer: Box<dyn TableObserver>) {
        match kind {
            TableKind::Habits => self.habits.write().subscribe(observer),
            TableKind::Instances => self.instances.write().subscribe(observer),
        }
    }

    /// Snapshot of the current projection; display layers never see records.
    pub fn table(&self, kind: TableKind) -> TableProjection {
        match kind {
            TableKind::Habits => self.habits.read().projection().clone(),
            TableKind::Instances => self.instances.read().projection().clone(),
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            habits: self.table(TableKind::Habits),
            instances: self.table(TableKind::Instances),
        }
    }

    /// The payload shells consume over the JSON bridge.
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.snapshot())
    }

    pub fn habit_stats(&self, habit_name: &str) -> Result<HabitStats, ValidationError> {
        let known = self
            .habits
            .read()
            .records()
            .iter()
            .any(|habit| habit.name() == habit_name);
        if !known {
            return Err(ValidationError::UnknownHabit(habit_name.to_string()));
        }
        let instances = self.instances.read();
        Ok(stats::collect(habit_name, instances.records()))
    }

    pub fn save(&self, kind: TableKind, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let store = CsvStore::new(path.as_ref());
        match kind {
            TableKind::Habits => self.habits.read().export(&store),
            TableKind::Instances => self.instances.read().export(&store),
        }
    }

    /// Replaces the backing collection with the file's contents. A missing
    /// file fails open to an empty table; any other failure leaves the
    /// in-memory state exactly as it was.
    pub fn load(&self, kind: TableKind, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let projection = match CsvStore::new(path.as_ref()).load() {
            Ok(projection) => Some(projection),
            Err(PersistenceError::NotFound(missing)) => {
                warn!(path = %missing.display(), "no saved table, starting empty");
                None
            }
            Err(err) => return Err(err),
        };
        match kind {
            TableKind::Habits => {
                let records = match &projection {
                    Some(projection) => habits_from_projection(projection)?,
                    None => Vec::new(),
                };
                self.habits.write().replace_records(records);
            }
            TableKind::Instances => {
                let records = match &projection {
                    Some(projection) => instances_from_projection(projection)?,
                    None => Vec::new(),
                };
                self.instances.write().replace_records(records);
                self.recount_instances();
            }
        }
        Ok(())
    }

    /// Derives every habit's instance count from the instance log. Runs after
    /// each instance-table mutation; counts loaded from a habit file stand
    /// until the log next changes.
    fn recount_instances(&self) {
        let counts: HashMap<String, u64> = {
            let instances = self.instances.read();
            let mut counts = HashMap::new();
            for instance in instances.records() {
                *counts.entry(instance.habit_name().to_string()).or_insert(0) += 1;
            }
            counts
        };
        let mut habits = self.habits.write();
        let stale = habits.records().iter().any(|habit| {
            habit.instance_count() != counts.get(habit.name()).copied().unwrap_or(0)
        });
        if !stale {
            return;
        }
        habits.update(|records| {
            for habit in records.iter_mut() {
                habit.set_instance_count(counts.get(habit.name()).copied().unwrap_or(0));
            }
        });
    }
}

const LEGACY_HABIT_HEADERS: [&str; 4] = ["Habit", "Type", "Frequency", "Done"];

fn habits_from_projection(projection: &TableProjection) -> Result<Vec<Habit>, PersistenceError> {
    let headers: Vec<&str> = projection.headers.iter().map(String::as_str).collect();
    if headers.as_slice() == LEGACY_HABIT_HEADERS {
        return legacy_habits_from_rows(&projection.rows);
    }
    if headers.as_slice() != Habit::headers() {
        return Err(unrecognized_header("habit", &projection.headers));
    }
    records_from_projection(projection)
}

fn instances_from_projection(
    projection: &TableProjection,
) -> Result<Vec<HabitInstance>, PersistenceError> {
    let headers: Vec<&str> = projection.headers.iter().map(String::as_str).collect();
    let full = HabitInstance::headers();
    // The out-of-control column arrived late; three-column files still load.
    if headers.as_slice() != full && headers.as_slice() != &full[..3] {
        return Err(unrecognized_header("instance", &projection.headers));
    }
    records_from_projection(projection)
}

fn legacy_habits_from_rows(rows: &[Vec<String>]) -> Result<Vec<Habit>, PersistenceError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let name = row.first().map(String::as_str).unwrap_or_default();
            let category = row.get(1).map(String::as_str).unwrap_or_default();
            let raw_frequency = row.get(2).map(String::as_str).unwrap_or_default();
            let frequency: i64 =
                raw_frequency
                    .trim()
                    .parse()
                    .map_err(|_| PersistenceError::Corrupt {
                        line: index + 2,
                        reason: format!("bad frequency `{raw_frequency}`"),
                    })?;
            // The legacy Done column predates per-date instances; dropped.
            Habit::new(name, category, frequency).map_err(|err| corrupt_row(index, err))
        })
        .collect()
}

fn corrupt_row(index: usize, err: ValidationError) -> PersistenceError {
    PersistenceError::Corrupt {
        line: index + 2,
        reason: err.to_string(),
    }
}

fn unrecognized_header(table: &str, headers: &[String]) -> PersistenceError {
    PersistenceError::Corrupt {
        line: 1,
        reason: format!("unrecognized {table} header `{}`", headers.join(",")),
    }
}
