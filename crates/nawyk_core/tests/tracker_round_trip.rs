use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nawyk_core::error::{PersistenceError, ValidationError};
use nawyk_core::notifications::TableObserver;
use nawyk_core::table::TableKind;
use nawyk_core::HabitService;
use tempfile::tempdir;

struct CountingObserver {
    hits: Arc<AtomicUsize>,
}

impl TableObserver for CountingObserver {
    fn table_changed(&self, _table: TableKind) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn add_save_and_reload_round_trip() {
    let temp = tempdir().expect("tempdir");
    let habit_path = temp.path().join("habits.csv");
    let instance_path = temp.path().join("instances.csv");

    let service = HabitService::builder().build().expect("build service");

    service
        .add_habit("Exercise", "Health", 3)
        .expect("add habit");
    let habits = service.table(TableKind::Habits);
    assert_eq!(
        habits.headers,
        vec!["Name", "Type", "Weekly Frequency", "Instances"]
    );
    assert_eq!(habits.rows, vec![vec!["Exercise", "Health", "3", "0"]]);

    service
        .add_instance("Exercise", "01/01/2024", true, false)
        .expect("add instance");
    let instances = service.table(TableKind::Instances);
    assert_eq!(
        instances.headers,
        vec!["Habit", "Date", "Done?", "Conditions Out of Control?"]
    );
    assert_eq!(
        instances.rows,
        vec![vec!["Exercise", "01/01/2024", "True", "False"]]
    );

    // The habit row now carries the derived count.
    let habits = service.table(TableKind::Habits);
    assert_eq!(habits.rows, vec![vec!["Exercise", "Health", "3", "1"]]);

    service
        .save(TableKind::Habits, &habit_path)
        .expect("save habits");
    service
        .save(TableKind::Instances, &instance_path)
        .expect("save instances");

    let reloaded = HabitService::builder()
        .with_habit_file(&habit_path)
        .with_instance_file(&instance_path)
        .build()
        .expect("reload service");
    assert_eq!(reloaded.table(TableKind::Habits), habits);
    assert_eq!(
        reloaded.table(TableKind::Instances),
        service.table(TableKind::Instances)
    );
}

#[test]
fn rejected_operations_leave_tables_unchanged() {
    let service = HabitService::builder().build().expect("build service");
    service
        .add_habit("Exercise", "Health", 3)
        .expect("add habit");

    assert_eq!(
        service.add_habit("", "Health", 3),
        Err(ValidationError::EmptyField { field: "name" })
    );
    assert_eq!(
        service.add_habit("Exercise", "Health", 0),
        Err(ValidationError::NonPositiveFrequency(0))
    );
    assert_eq!(
        service.add_habit("Exercise", "Health", -1),
        Err(ValidationError::NonPositiveFrequency(-1))
    );
    assert_eq!(
        service.add_habit("Exercise", "Fitness", 5),
        Err(ValidationError::DuplicateName("Exercise".to_string()))
    );
    assert!(matches!(
        service.add_instance("Exercise", "yesterday-ish", true, false),
        Err(ValidationError::UnparsableDate(_))
    ));

    assert_eq!(service.table(TableKind::Habits).row_count(), 1);
    assert_eq!(service.table(TableKind::Instances).row_count(), 0);
}

#[test]
fn missing_file_fails_open_to_an_empty_table() {
    let temp = tempdir().expect("tempdir");
    let service = HabitService::builder().build().expect("build service");
    service.add_habit("Exercise", "Health", 3).expect("add");

    service
        .load(TableKind::Habits, temp.path().join("absent.csv"))
        .expect("load missing file");
    let habits = service.table(TableKind::Habits);
    assert_eq!(
        habits.headers,
        vec!["Name", "Type", "Weekly Frequency", "Instances"]
    );
    assert!(habits.rows.is_empty());
}

#[test]
fn corrupt_file_leaves_the_previous_table_intact() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("habits.csv");
    fs::write(
        &path,
        "Name,Type,Weekly Frequency,Instances\nExercise,Health,three,0\n",
    )
    .expect("write fixture");

    let service = HabitService::builder().build().expect("build service");
    service.add_habit("Read", "Leisure", 7).expect("add");

    let err = service
        .load(TableKind::Habits, &path)
        .expect_err("corrupt load must fail");
    assert!(matches!(err, PersistenceError::Corrupt { line: 2, .. }));
    assert_eq!(
        service.table(TableKind::Habits).rows,
        vec![vec!["Read", "Leisure", "7", "0"]]
    );
}

#[test]
fn legacy_semicolon_habit_files_import() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("legacy.csv");
    fs::write(
        &path,
        "Habit;Type;Frequency;Done\nExercise;Health;3;True\nRead;Leisure;7;False\n",
    )
    .expect("write fixture");

    let service = HabitService::builder().build().expect("build service");
    service.load(TableKind::Habits, &path).expect("legacy load");
    assert_eq!(
        service.table(TableKind::Habits).rows,
        vec![
            vec!["Exercise", "Health", "3", "0"],
            vec!["Read", "Leisure", "7", "0"],
        ]
    );
}

#[test]
fn observers_fire_per_successful_mutation_only() {
    let hits = Arc::new(AtomicUsize::new(0));
    let service = HabitService::builder()
        .with_observer(
            TableKind::Habits,
            Box::new(CountingObserver { hits: hits.clone() }),
        )
        .build()
        .expect("build service");

    service.add_habit("Exercise", "Health", 3).expect("add");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    service
        .add_habit("", "Health", 3)
        .expect_err("empty name must fail");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Adding an instance recounts, which rebuilds the habit projection too.
    service
        .add_instance("Exercise", "01/01/2024", true, false)
        .expect("add instance");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn alter_habit_validates_before_applying() {
    let service = HabitService::builder().build().expect("build service");
    let id = service.add_habit("Exercise", "Health", 3).expect("add");
    service.add_habit("Read", "Leisure", 7).expect("add");

    assert_eq!(
        service.alter_habit(id, Some("Read"), None, None),
        Err(ValidationError::DuplicateName("Read".to_string()))
    );
    assert_eq!(
        service.alter_habit(id, Some("Running"), None, Some(0)),
        Err(ValidationError::NonPositiveFrequency(0))
    );
    // The failed edit above must not have applied the rename half.
    assert_eq!(
        service.table(TableKind::Habits).rows[0],
        vec!["Exercise", "Health", "3", "0"]
    );

    service
        .alter_habit(id, Some("Running"), Some("Fitness"), Some(5))
        .expect("alter habit");
    assert_eq!(
        service.table(TableKind::Habits).rows[0],
        vec!["Running", "Fitness", "5", "0"]
    );
}

#[test]
fn instance_flags_flow_into_the_projection() {
    let service = HabitService::builder().build().expect("build service");
    service.add_habit("Exercise", "Health", 3).expect("add");
    let id = service
        .add_instance("Exercise", "2024-01-02", false, false)
        .expect("add instance");

    service.set_instance_done(id, true).expect("set done");
    service
        .set_instance_out_of_control(id, true)
        .expect("set out of control");
    assert_eq!(
        service.table(TableKind::Instances).rows,
        vec![vec!["Exercise", "02/01/2024", "True", "True"]]
    );

    let stats = service.habit_stats("Exercise").expect("stats");
    assert_eq!(stats.instances, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.completion_rate, 100.0);
    assert_eq!(
        service.habit_stats("Absent"),
        Err(ValidationError::UnknownHabit("Absent".to_string()))
    );
}

#[test]
fn snapshot_json_carries_both_tables() {
    let service = HabitService::builder().build().expect("build service");
    service.add_habit("Exercise", "Health", 3).expect("add");
    let json = service.snapshot_json().expect("snapshot json");
    assert!(json.contains("\"habits\""));
    assert!(json.contains("\"instances\""));
    assert!(json.contains("Exercise"));
}
