//! Plain-text rendering of a snapshot.

use std::fmt::Write;

use vismon_sdk::Snapshot;

/// Render projects, objects, phase averages and recent changes.
pub fn render(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, snapshot);
    out
}

fn write_report(out: &mut String, snapshot: &Snapshot) -> std::fmt::Result {
    writeln!(
        out,
        "Snapshot at {} ms (schema {}.{})",
        snapshot.timestamp_ms, snapshot.version.major, snapshot.version.minor
    )?;

    writeln!(out, "\nProjects ({})", snapshot.projects.len())?;
    for project in snapshot.projects.values() {
        writeln!(
            out,
            "  {:<20} {:>4} objects   last activity {} ms",
            project.name, project.member_count, project.last_activity_ms
        )?;
    }

    writeln!(out, "\nObjects ({})", snapshot.objects.len())?;
    for object in &snapshot.objects {
        match &object.category {
            Some(category) => writeln!(
                out,
                "  #{} {} [{}] ({}, {})",
                object.id, object.name, object.project, object.type_name, category
            )?,
            None => writeln!(
                out,
                "  #{} {} [{}] ({})",
                object.id, object.name, object.project, object.type_name
            )?,
        }
        for (field, value) in &object.fields {
            writeln!(out, "      {} = {}", field, value)?;
        }
    }

    if !snapshot.phases.is_empty() {
        writeln!(out, "\nPhases")?;
        writeln!(
            out,
            "  {:<20} {:>6} {:>12} {:>12} {:>12}",
            "phase", "count", "mean", "min", "max"
        )?;
        for (phase, stats) in &snapshot.phases {
            writeln!(
                out,
                "  {:<20} {:>6} {:>12} {:>12} {:>12}",
                phase,
                stats.count,
                stats.mean.to_string(),
                stats.min.to_string(),
                stats.max.to_string()
            )?;
        }
    }

    if !snapshot.recent_changes.is_empty() {
        writeln!(out, "\nRecent changes ({})", snapshot.recent_changes.len())?;
        for event in &snapshot.recent_changes {
            writeln!(out, "  {}", crate::console::format_change(event))?;
        }
    }
    Ok(())
}
