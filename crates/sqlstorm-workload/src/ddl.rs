//! Operation dispatch: maps a selected option to the table-level or
//! instance-level statement, wiring the plan/execute/apply protocol of the
//! schema model to the connection.

use std::sync::Arc;

use sqlstorm_core::table::{Table, TableKind, TableVariant};
use sqlstorm_core::{dml, partition, Opt};

use crate::compare;
use crate::grammar;
use crate::logging::print_and_log;
use crate::worker::Worker;

/// Runs one selected operation against the chosen table.
pub fn dispatch(worker: &mut Worker, opt: Opt, table: &Arc<Table>) {
    match opt {
        // ----- DML ---------------------------------------------------------
        Opt::SelectAllRow => select_all_row(worker, table, false),
        Opt::SelectRowUsingPkey => select_random_row(worker, table, false),
        Opt::SelectForUpdate => select_random_row(worker, table, true),
        Opt::SelectForUpdateBulk => select_all_row(worker, table, true),
        Opt::InsertRandomRow => dml_under_gate(worker, table, |w, s| {
            dml::insert_random_row_sql(&table.name, s, &mut w.ctx)
        }),
        Opt::UpdateRowUsingPkey => dml_under_gate(worker, table, |w, s| {
            dml::update_random_row_sql(&table.name, s, &mut w.ctx)
        }),
        Opt::UpdateAllRows => dml_under_gate(worker, table, |w, s| {
            dml::update_all_rows_sql(&table.name, s, &mut w.ctx)
        }),
        Opt::DeleteRowUsingPkey => dml_under_gate(worker, table, |w, s| {
            dml::delete_random_row_sql(&table.name, s, &mut w.ctx)
        }),
        Opt::DeleteAllRows => dml_under_gate(worker, table, |w, s| {
            dml::delete_all_rows_sql(&table.name, s, &mut w.ctx)
        }),
        Opt::CallFunction => create_function(worker, table),
        Opt::GrammarSql => grammar::run_grammar_sql(worker, table),
        Opt::SetGlobalVariable => set_server_variable(worker),
        Opt::ThrottleSleep => std::thread::sleep(std::time::Duration::from_millis(10)),

        // ----- Column / index DDL -----------------------------------------
        Opt::AddColumn => {
            let plan = table.plan_add_column(&mut worker.ctx, &worker.run.env);
            if ddl_under_gate(worker, table, &plan.sql) {
                table.apply_add_column(plan);
            }
        }
        Opt::DropColumn => {
            if let Some(plan) = table.plan_drop_column(&mut worker.ctx, &worker.run.env) {
                if ddl_under_gate(worker, table, &plan.sql) {
                    table.apply_drop_column(&plan);
                }
            }
        }
        Opt::AlterColumnModify => {
            if let Some(plan) = table.plan_modify_column(&mut worker.ctx, &worker.run.env) {
                if ddl_under_gate(worker, table, &plan.sql) {
                    table.apply_modify_column(plan);
                }
            }
        }
        Opt::RenameColumn => {
            let plan = table.plan_rename_column(&mut worker.ctx, &worker.run.env);
            if ddl_under_gate(worker, table, &plan.sql) {
                table.apply_rename_column(&plan);
            }
        }
        Opt::RenameIndex => {
            if let Some(plan) = table.plan_rename_index(&mut worker.ctx, &worker.run.env) {
                if ddl_under_gate(worker, table, &plan.sql) {
                    table.apply_rename_index(&plan);
                }
            }
        }
        Opt::AddIndex => {
            let plan = table.plan_add_index(&mut worker.ctx, &worker.run.env);
            if ddl_under_gate(worker, table, &plan.sql) {
                table.apply_add_index(plan);
            }
        }
        Opt::DropIndex => {
            if let Some(plan) = table.plan_drop_index(&mut worker.ctx, &worker.run.env) {
                if ddl_under_gate(worker, table, &plan.sql) {
                    table.apply_drop_index(&plan);
                }
            } else {
                let name = table.name.clone();
                worker.logs.line(&format!("no index to drop {name}"));
            }
        }

        // ----- Table DDL ---------------------------------------------------
        Opt::Truncate => {
            let sql = table.truncate_sql(&mut worker.ctx, &worker.run.env);
            ddl_under_gate(worker, table, &sql);
        }
        Opt::Optimize => {
            let sql = table.maintenance_sql("OPTIMIZE", &mut worker.ctx);
            ddl_under_gate(worker, table, &sql);
        }
        Opt::Analyze => {
            let sql = table.maintenance_sql("ANALYZE", &mut worker.ctx);
            ddl_under_gate(worker, table, &sql);
        }
        Opt::CheckTable => {
            let sql = table.maintenance_sql("CHECK", &mut worker.ctx);
            let _gate = table.dml_exclusive();
            check_result(worker, &sql);
        }
        Opt::DropCreate => drop_create(worker, table),
        Opt::AddNewTable => add_new_table(worker),
        Opt::AddDropPartition => add_drop_partition(worker, table),
        Opt::AlterTableEncryption => {
            if let Some(plan) = table.plan_set_encryption(&mut worker.ctx, &worker.run.env)
            {
                if ddl_under_gate(worker, table, &plan.sql) {
                    table.apply_set_encryption(&plan);
                }
            }
        }
        Opt::AlterTableCompression => {
            if let Some(plan) = table.plan_set_compression(&mut worker.ctx, &worker.run.env)
            {
                if ddl_under_gate(worker, table, &plan.sql) {
                    table.apply_set_compression(&plan);
                }
            }
        }
        Opt::AlterDiscardTablespace => {
            let sql = format!("ALTER TABLE {} DISCARD TABLESPACE", table.name);
            ddl_under_gate(worker, table, &sql);
            // A discarded tablespace leaves the table unusable; recreate it.
            drop_create(worker, table);
        }

        // ----- Secondary engine --------------------------------------------
        Opt::AlterSecondaryEngine => set_secondary_engine(worker, table),
        Opt::ModifyColumnSecondaryEngine => modify_column_secondary_engine(worker, table),
        Opt::EnforceMerge => enforce_rebuild_in_secondary(worker, table),
        Opt::SecondaryGc => {
            if let Some(secondary) = worker.run.env.secondary_engine.clone() {
                let sql = format!(
                    "SET GLOBAL {secondary} PRAGMA = \"{}_garbage_collect\"",
                    secondary.to_ascii_lowercase()
                );
                ddl_under_gate(worker, table, &sql);
            }
        }

        // ----- Tablespace / database / instance ---------------------------
        Opt::AlterTablespaceEncryption => {
            let _gate = table.dml_exclusive();
            alter_tablespace_encryption(worker);
        }
        Opt::AlterTablespaceRename => {
            let _gate = table.dml_exclusive();
            alter_tablespace_rename(worker);
        }
        Opt::AlterDatabaseEncryption => {
            let database = worker.params.database.clone();
            let mode = if worker.ctx.rng.int(1) == 0 { "'Y'" } else { "'N'" };
            ddl_under_gate(
                worker,
                table,
                &format!("ALTER DATABASE {database} ENCRYPTION {mode}"),
            );
        }
        Opt::UndoSql => {
            let _gate = table.dml_exclusive();
            undo_tablespace_sql(worker);
        }
        Opt::AlterMasterKey => {
            ddl_under_gate(worker, table, "ALTER INSTANCE ROTATE INNODB MASTER KEY");
        }
        Opt::AlterEncryptionKey => {
            let key = worker.ctx.rng.int(9);
            ddl_under_gate(
                worker,
                table,
                &format!("ALTER INSTANCE ROTATE INNODB SYSTEM KEY {key}"),
            );
        }
        Opt::AlterInstanceReloadKeyring => {
            if worker.run.env.probe.keyring_active {
                ddl_under_gate(worker, table, "ALTER INSTANCE RELOAD KEYRING");
            }
        }
        Opt::RotateRedoLogKey => {
            ddl_under_gate(worker, table, "SELECT rotate_system_key(\"percona_redo\")");
        }
        Opt::AlterRedoLogging => {
            let toggle = if worker.ctx.rng.int(1) == 0 { "DISABLE" } else { "ENABLE" };
            ddl_under_gate(
                worker,
                table,
                &format!("ALTER INSTANCE {toggle} INNODB REDO_LOG"),
            );
        }

        other => {
            tracing::warn!(option = other.name(), "selected option has no operation");
        }
    }
}

// ---------------------------------------------------------------------------
// Gate helpers: DML executes under the shared side of the table's DML gate,
// schema mutation under the exclusive side, so DML proceeds in parallel but
// never overlaps an in-flight DDL statement.
// ---------------------------------------------------------------------------

fn dml_under_gate(
    worker: &mut Worker,
    table: &Arc<Table>,
    build: impl FnOnce(&mut Worker, &sqlstorm_core::TableState) -> String,
) {
    // Snapshot under the DDL lock, build and execute with it released.
    let snapshot = table.state().clone();
    let sql = build(worker, &snapshot);
    let _gate = table.dml_shared();
    worker.execute_sql(&sql);
}

/// Executes one DDL statement while holding the exclusive side of the
/// table's DML gate.
fn ddl_under_gate(worker: &mut Worker, table: &Arc<Table>, sql: &str) -> bool {
    let _gate = table.dml_exclusive();
    worker.execute_sql(sql)
}

fn select_random_row(worker: &mut Worker, table: &Arc<Table>, for_update: bool) {
    let sql = {
        let snapshot = table.state().clone();
        dml::select_random_row_sql(&table.name, &snapshot, for_update, &mut worker.ctx)
    };
    if worker.run.opts.get_bool(Opt::CompareResult) {
        compare::between_engines(worker, table, &sql);
    } else {
        if worker.run.opts.get_bool(Opt::SelectInSecondary) {
            worker.execute_sql("COMMIT");
        }
        worker.execute_sql(&sql);
    }
}

fn select_all_row(worker: &mut Worker, table: &Arc<Table>, for_update: bool) {
    let sql = {
        let snapshot = table.state().clone();
        dml::select_all_row_sql(&table.name, &snapshot, for_update, &mut worker.ctx)
    };
    if worker.run.opts.get_bool(Opt::SelectInSecondary) {
        worker.execute_sql("COMMIT");
    }
    worker.execute_sql(&sql);
}

/// DROP FUNCTION / CREATE FUNCTION wrapping a few rounds of the enabled DML
/// kinds, then a SELECT that calls it.
fn create_function(worker: &mut Worker, table: &Arc<Table>) {
    let opts = Arc::clone(&worker.run.opts);
    let mut kinds = Vec::new();
    if !opts.get_bool(Opt::NoInsert) {
        kinds.push("INSERT");
    }
    if !opts.get_bool(Opt::NoUpdate) {
        kinds.push("UPDATE");
    }
    if !opts.get_bool(Opt::NoDelete) {
        kinds.push("DELETE");
    }
    if kinds.is_empty() {
        return;
    }

    worker.execute_sql(&format!("DROP FUNCTION IF EXISTS f{}", table.name));

    let body = {
        let snapshot = table.state().clone();
        let mut body = String::new();
        for _ in 0..worker.ctx.rng.int_in(4, 1) {
            for kind in &kinds {
                match *kind {
                    "INSERT" => {
                        for _ in 0..worker.ctx.rng.int_in(3, 1) {
                            body.push_str(&format!(
                                "INSERT INTO {}{}; ",
                                table.name,
                                dml::column_values(&snapshot, &mut worker.ctx)
                            ));
                        }
                    }
                    "UPDATE" => {
                        for _ in 0..worker.ctx.rng.int_in(4, 1) {
                            body.push_str(&format!(
                                "UPDATE {}{} SET {}{}; ",
                                dml::ignore_clause(&mut worker.ctx),
                                table.name,
                                dml::set_clause(&snapshot, &mut worker.ctx),
                                dml::where_precise(&snapshot, &mut worker.ctx)
                            ));
                        }
                    }
                    _ => {
                        for _ in 0..worker.ctx.rng.int_in(4, 1) {
                            body.push_str(&format!(
                                "DELETE {} FROM {}{}; ",
                                dml::ignore_clause(&mut worker.ctx),
                                table.name,
                                dml::where_precise(&snapshot, &mut worker.ctx)
                            ));
                        }
                    }
                }
            }
        }
        body
    };

    let sql = format!(
        "CREATE FUNCTION f{}() RETURNS INT DETERMINISTIC BEGIN {body}RETURN 1; END",
        table.name
    );
    worker.execute_sql(&sql);
    worker.execute_sql(&format!("SELECT f{}()", table.name));
}

/// SET GLOBAL/SESSION over the configured server variables.
fn set_server_variable(worker: &mut Worker) {
    if worker.run.server_variables.is_empty() {
        return;
    }
    let variables = worker.run.server_variables.clone();
    let variable = &variables[worker.ctx.rng.int(variables.len() as i64 - 1) as usize];
    let scope = if worker.ctx.rng.int(3) == 0 { "SESSION" } else { "GLOBAL" };
    let value = &variable.values[worker.ctx.rng.int(variable.values.len() as i64 - 1) as usize];
    let sql = format!(" SET {scope} {}={value}", variable.name);
    worker.execute_sql(&sql);
}

// ---------------------------------------------------------------------------
// Table DDL helpers
// ---------------------------------------------------------------------------

/// CHECK TABLE / CHECK PARTITION: success means the fourth result column
/// reads OK.
pub fn check_result(worker: &mut Worker, sql: &str) -> bool {
    if !worker.execute_sql(sql) {
        return false;
    }
    let Some(grid) = worker.last_result.as_ref() else {
        return true;
    };
    let Some(row) = grid.rows.first() else {
        return true;
    };
    if grid.columns >= 4 {
        if let Some(Some(text)) = row.get(3) {
            if text != "OK" {
                let line = format!(
                    "Error: {} {} {} {}",
                    row.first().and_then(|c| c.as_deref()).unwrap_or(""),
                    row.get(1).and_then(|c| c.as_deref()).unwrap_or(""),
                    row.get(2).and_then(|c| c.as_deref()).unwrap_or(""),
                    text
                );
                worker.logs.line(&line);
                return false;
            }
        }
    }
    true
}

/// The preload sweep: CHECK every partition (or the whole table).
pub fn check_table_preload(worker: &mut Worker, table: &Arc<Table>) -> bool {
    let targets: Vec<String> = {
        let state = table.state();
        match &state.variant {
            TableVariant::Partition(layout) => {
                let names: Vec<String> = match layout.strategy {
                    partition::PartitionStrategy::Range => {
                        layout.ranges.iter().map(|p| p.name.clone()).collect()
                    }
                    partition::PartitionStrategy::List => {
                        layout.lists.iter().map(|p| p.name.clone()).collect()
                    }
                    _ => (0..layout.count).map(|i| format!("p{i}")).collect(),
                };
                names
                    .into_iter()
                    .map(|p| format!("ALTER TABLE {} CHECK PARTITION {p}", table.name))
                    .collect()
            }
            _ => vec![format!("CHECK TABLE {}", table.name)],
        }
    };
    let mut ok = true;
    for sql in targets {
        ok &= check_result(worker, &sql);
    }
    ok
}

/// DROP TABLE then CREATE TABLE; when the plain re-create fails, retry the
/// tablespace-rename and flipped-encryption variants.
///
/// The exclusive DML gate is held across the whole sequence: between the
/// DROP and a successful re-create the table does not exist, and no DML may
/// observe that window.
fn drop_create(worker: &mut Worker, table: &Arc<Table>) {
    let _gate = table.dml_exclusive();
    if !worker.execute_sql(&format!("DROP TABLE {}", table.name)) {
        return;
    }
    let env = worker.run.env.clone();
    let def = table.create_sql(true, true, &mut worker.ctx, &env);
    if worker.execute_sql(&def) {
        return;
    }
    let (tablespace, encryption) = {
        let state = table.state();
        (state.tablespace.clone(), state.encryption.clone())
    };
    if tablespace.is_empty() {
        return;
    }
    let renamed = format!(" TABLESPACE={tablespace}_rename");
    if worker.execute_sql(&format!("{def}{renamed}")) {
        return;
    }
    if env.no_encryption {
        return;
    }
    let flipped = format!(" ENCRYPTION = '{encryption}'");
    if worker.execute_sql(&format!("{def}{flipped}"))
        || worker.execute_sql(&format!("{def}{flipped}{renamed}"))
    {
        table.flip_encryption();
    }
}

/// Creates an additional table mid-run; FK children are drawn with the
/// configured probability.
fn add_new_table(worker: &mut Worker) {
    let opts = Arc::clone(&worker.run.opts);
    let id = worker.ctx.rng.int_in(opts.get_int(Opt::Tables), 1);
    let kind = if !opts.get_bool(Opt::NoFk)
        && opts.get_int(Opt::FkProb) > worker.ctx.rng.int(100)
    {
        TableKind::Fk
    } else {
        TableKind::Normal
    };
    let env = worker.run.env.clone();
    let table = Arc::new(Table::random(kind, id, true, &mut worker.ctx, &env));
    let sql = table.create_sql(true, true, &mut worker.ctx, &env);
    if !ddl_under_gate(worker, &table, &sql) {
        return;
    }
    let name = table.name.clone();
    worker.run.catalog.add(table);
    print_and_log(&mut worker.logs, &format!("Created new table {name}"));
}

fn add_drop_partition(worker: &mut Worker, table: &Arc<Table>) {
    if table.kind != TableKind::Partition {
        return;
    }
    let env = worker.run.env.clone();
    let planned = {
        let state = table.state();
        match &state.variant {
            TableVariant::Partition(layout) => {
                partition::plan_add_drop(&table.name, layout, &mut worker.ctx, &env)
            }
            _ => None,
        }
    };
    let Some((sql, plan)) = planned else {
        return;
    };
    if ddl_under_gate(worker, table, &sql) {
        let mut state = table.state();
        if let TableVariant::Partition(layout) = &mut state.variant {
            partition::apply_add_drop(layout, &plan);
        }
    }
}

// ---------------------------------------------------------------------------
// Secondary engine helpers
// ---------------------------------------------------------------------------

fn set_secondary_engine(worker: &mut Worker, table: &Arc<Table>) {
    let Some(secondary) = worker.run.env.secondary_engine.clone() else {
        return;
    };
    let target = if worker.ctx.rng.int(1) == 0 {
        secondary.clone()
    } else {
        "NULL".to_string()
    };
    worker.execute_sql("COMMIT");
    let sql = format!("ALTER TABLE {} SECONDARY_ENGINE={target}", table.name);
    // The sync poll below can take minutes; only the ALTER itself holds
    // the gate.
    ddl_under_gate(worker, table, &sql);
    if target == secondary && worker.run.opts.get_bool(Opt::WaitForSync) {
        worker.wait_till_sync(&table.name);
    }
}

/// Toggles NOT SECONDARY on a slice of the columns.
fn modify_column_secondary_engine(worker: &mut Worker, table: &Arc<Table>) {
    let env = worker.run.env.clone();
    let percentage = worker.run.opts.get_int(Opt::ModifyColumnSecondaryEngine);
    let names: Vec<String> = {
        let state = table.state();
        let budget = (state.columns.len() as i64 * percentage) / 100;
        state
            .columns
            .iter()
            .take(budget.max(0) as usize)
            .map(|c| c.name.clone())
            .collect()
    };
    for name in names {
        let plan = {
            let state = table.state();
            let Some(col) = state.column(&name) else { continue };
            let mut toggled = col.clone();
            toggled.not_secondary = !toggled.not_secondary;
            let sql = format!(
                "ALTER TABLE {} MODIFY COLUMN {},{}",
                table.name,
                toggled.definition(),
                env.algorithm_lock_clause(&mut worker.ctx.rng)
            );
            sqlstorm_core::table::ModifyColumnPlan { sql, column: toggled }
        };
        if ddl_under_gate(worker, table, &plan.sql) {
            table.apply_modify_column(plan);
        }
    }
}

/// The secondary engine's rewrite PRAGMA for one table.
fn enforce_rebuild_in_secondary(worker: &mut Worker, table: &Arc<Table>) {
    let Some(secondary) = worker.run.env.secondary_engine.clone() else {
        return;
    };
    let database = worker.params.database.clone();
    let sql = format!(
        "SET GLOBAL {secondary} PRAGMA = \"rewrite_table({database}.{})\"",
        table.name
    );
    ddl_under_gate(worker, table, &sql);
}

// ---------------------------------------------------------------------------
// Tablespace / undo helpers
// ---------------------------------------------------------------------------

fn alter_tablespace_encryption(worker: &mut Worker) {
    let env = &worker.run.env;
    let tablespace = if (worker.ctx.rng.int(10) < 2 && env.probe.version >= 80000)
        || env.tablespaces.is_empty()
    {
        "mysql".to_string()
    } else {
        env.tablespaces[worker.ctx.rng.int(env.tablespaces.len() as i64 - 1) as usize].clone()
    };
    let mode = if worker.ctx.rng.int(1) == 0 { "'Y'" } else { "'N'" };
    worker.execute_sql(&format!("ALTER TABLESPACE {tablespace} ENCRYPTION {mode}"));
}

fn alter_tablespace_rename(worker: &mut Worker) {
    let env = &worker.run.env;
    // innodb_system sits at a fixed slot and is never renamed.
    let candidates: Vec<&String> = env
        .tablespaces
        .iter()
        .filter(|t| *t != "innodb_system")
        .collect();
    if candidates.is_empty() {
        return;
    }
    let tablespace =
        candidates[worker.ctx.rng.int(candidates.len() as i64 - 1) as usize].clone();
    let sql = if worker.ctx.rng.int(1) == 0 {
        format!("ALTER TABLESPACE {tablespace}_rename RENAME TO {tablespace}")
    } else {
        format!("ALTER TABLESPACE {tablespace} RENAME TO {tablespace}_rename")
    };
    worker.execute_sql(&sql);
}

/// CREATE / DROP / SET ACTIVE|INACTIVE over the undo tablespace pool.
fn undo_tablespace_sql(worker: &mut Worker) {
    let undo = worker.run.env.undo_tablespaces.clone();
    if undo.is_empty() {
        return;
    }
    let pick =
        |w: &mut Worker| undo[w.ctx.rng.int(undo.len() as i64 - 1) as usize].clone();
    let x = worker.ctx.rng.int(100);
    if x < 20 {
        let name = pick(worker);
        worker.execute_sql(&format!(
            "CREATE UNDO TABLESPACE {name} ADD DATAFILE '{name}.ibu'"
        ));
    }
    if x < 40 {
        let name = pick(worker);
        worker.execute_sql(&format!("DROP UNDO TABLESPACE {name}"));
    } else {
        let name = pick(worker);
        let toggle = if worker.ctx.rng.int(1) == 0 { "ACTIVE" } else { "INACTIVE" };
        worker.execute_sql(&format!("ALTER UNDO TABLESPACE {name} SET {toggle}"));
    }
}
