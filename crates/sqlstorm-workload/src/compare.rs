//! Dual-engine execution: run one SELECT on the primary and the secondary
//! engine and fail the whole run when the result sets differ.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlstorm_client::ResultGrid;
use sqlstorm_core::table::Table;
use sqlstorm_core::Opt;

use crate::logging::print_and_log;
use crate::worker::Worker;

/// Compares two result grids cell by cell. NULL and the empty string are
/// different values.
pub fn grids_match(a: &ResultGrid, b: &ResultGrid) -> std::result::Result<(), String> {
    if a.rows.len() != b.rows.len() {
        return Err("Number of rows in result set do not match".to_string());
    }
    for (i, (left, right)) in a.rows.iter().zip(b.rows.iter()).enumerate() {
        if left.len() != right.len() {
            return Err(format!("Number of columns in row {i} do not match"));
        }
        for (j, (lc, rc)) in left.iter().zip(right.iter()).enumerate() {
            if lc != rc {
                return Err(format!("Result set do not match at row {i}, column {j}"));
            }
        }
    }
    Ok(())
}

fn dump_grid(grid: &ResultGrid, logdir: &str, file_name: &str) {
    let path = Path::new(logdir).join(file_name);
    let Ok(mut file) = File::create(&path) else {
        eprintln!("Failed to open file {}", path.display());
        return;
    };
    for row in &grid.rows {
        for cell in row {
            let _ = write!(file, "{},", cell.as_deref().unwrap_or(""));
        }
        let _ = writeln!(file);
    }
}

/// Runs `sql` on the primary engine (secondary disabled), then again on the
/// dedicated comparison connection, and aborts the run on any mismatch.
///
/// While the primary result is captured the shared side of the table's DML
/// gate is held, like any other DML reader, so no schema mutation can slide
/// between the two executions; the re-execution happens on a detached
/// thread that is joined before comparing.
pub fn between_engines(worker: &mut Worker, table: &Arc<Table>, sql: &str) {
    let opts = Arc::clone(&worker.run.opts);
    let secondary = worker.run.env.secondary_engine.clone();
    let only_select = opts.get_bool(Opt::OnlySelect);
    let delay_bound = opts.get_int(Opt::DelayInSecondary);

    let gate = (!only_select).then(|| table.dml_shared());

    if secondary.is_some() {
        worker.execute_sql("COMMIT");
        worker.execute_sql("SET @@SESSION.USE_SECONDARY_ENGINE=OFF");
    }

    if !worker.execute_sql(sql) {
        print_and_log(&mut worker.logs, &format!("Failed in primary: {sql}"));
        drop(gate);
        restore_session(worker);
        return;
    }
    let primary = worker.last_result.take().unwrap_or_default();

    if secondary.is_some() {
        worker.execute_sql("SET @@SESSION.USE_SECONDARY_ENGINE=FORCED ");
    }

    let delay = (delay_bound > 0).then(|| worker.ctx.rng.int(delay_bound));

    let Some(alt) = worker.alt_session.as_mut() else {
        drop(gate);
        restore_session(worker);
        return;
    };

    let secondary_result = std::thread::scope(|scope| {
        let handle = scope.spawn(|| {
            if let Some(secondary) = &secondary {
                let _ = alt.execute("SET @@SESSION.USE_SECONDARY_ENGINE=FORCED");
                if let Some(delay) = delay {
                    let _ = alt.execute(&format!(
                        "SET @@SESSION.{}_sleep_after_gtid_lookup_ms={delay}",
                        secondary.to_ascii_lowercase()
                    ));
                }
            }
            alt.execute(sql)
        });
        // Give the re-execution a head start, then release the gate so
        // schema changes may resume while it runs.
        std::thread::sleep(Duration::from_millis(10));
        drop(gate);
        handle.join()
    });

    let secondary_grid = match secondary_result {
        Ok(Ok(outcome)) => outcome.rows.unwrap_or_default(),
        Ok(Err(err)) => {
            print_and_log(&mut worker.logs, &format!("Failed in secondary: {sql} {err}"));
            restore_session(worker);
            return;
        }
        Err(_) => {
            print_and_log(&mut worker.logs, "comparison thread panicked");
            worker.run.set_failed();
            return;
        }
    };

    if let Err(reason) = grids_match(&secondary_grid, &primary) {
        let logdir = worker.params.logdir.clone();
        dump_grid(&secondary_grid, &logdir, "secondary_result.csv");
        dump_grid(&primary, &logdir, "mysql_result.csv");
        print_and_log(&mut worker.logs, &format!("{reason}: result set mismatch for {sql}"));
        worker.run.set_failed();
        std::process::exit(1);
    }

    restore_session(worker);
}

/// Puts the session's secondary-engine routing back to its steady state.
fn restore_session(worker: &mut Worker) {
    let Some(secondary) = worker.run.env.secondary_engine.clone() else {
        return;
    };
    if worker.run.opts.get_bool(Opt::SelectInSecondary) {
        worker.execute_sql("SET @@SESSION.USE_SECONDARY_ENGINE=FORCED");
    } else {
        worker.execute_sql("SET @@SESSION.USE_SECONDARY_ENGINE=DEFAULT ");
    }
    if worker.run.opts.get_int(Opt::DelayInSecondary) > 0 {
        let reset = format!(
            "SET @@SESSION.{}_sleep_after_gtid_lookup_ms=DEFAULT",
            secondary.to_ascii_lowercase()
        );
        if let Some(alt) = worker.alt_session.as_mut() {
            let _ = alt.execute(&reset);
        }
    }
}
