use std::path::PathBuf;

use anyhow::{Context, Result};
use nawyk_core::table::{TableKind, TableProjection};
use nawyk_core::HabitService;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub habit_file: Option<PathBuf>,
    pub instance_file: Option<PathBuf>,
}

impl AppConfig {
    /// Positional arguments only: an optional habit CSV followed by an
    /// optional instance CSV. Extra arguments are ignored.
    pub fn from_args(args: impl Iterator<Item = String>) -> Self {
        let mut config = Self::default();
        for arg in args {
            let path = PathBuf::from(arg);
            if config.habit_file.is_none() {
                config.habit_file = Some(path);
            } else if config.instance_file.is_none() {
                config.instance_file = Some(path);
            }
        }
        config
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    let mut builder = HabitService::builder();
    if let Some(path) = &config.habit_file {
        info!(path = %path.display(), "loading habit table");
        builder = builder.with_habit_file(path);
    }
    if let Some(path) = &config.instance_file {
        info!(path = %path.display(), "loading instance table");
        builder = builder.with_instance_file(path);
    }
    let service = builder.build().context("unable to load tracker data")?;

    let habits = service.table(TableKind::Habits);
    print!("{}", render_table("Habits", &habits));
    print!(
        "{}",
        render_table("Habit instances", &service.table(TableKind::Instances))
    );

    for row in &habits.rows {
        let Some(name) = row.first() else { continue };
        let stats = service.habit_stats(name)?;
        println!(
            "{}: {} of {} instances done ({:.2}%)",
            stats.habit, stats.completed, stats.instances, stats.completion_rate
        );
    }
    Ok(())
}

fn render_table(title: &str, projection: &TableProjection) -> String {
    let mut widths: Vec<usize> = projection.headers.iter().map(String::len).collect();
    for row in &projection.rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.len());
            }
        }
    }

    let mut out = format!("{title}\n");
    out.push_str(&format_row(&projection.headers, &widths));
    let ruler: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    out.push_str(&format_row(&ruler, &widths));
    for row in &projection.rows {
        out.push_str(&format_row(row, &widths));
    }
    out.push('\n');
    out
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (index, cell) in cells.iter().enumerate() {
        if index > 0 {
            line.push_str("  ");
        }
        let width = widths.get(index).copied().unwrap_or(cell.len());
        line.push_str(&format!("{cell:<width$}"));
    }
    while line.ends_with(' ') {
        line.pop();
    }
    line.push('\n');
    line
}
