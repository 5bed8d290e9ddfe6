//! Initial table load: CREATE TABLE, the batched bulk insert, secondary
//! indexes, and the foreign-key constraint.

use std::collections::HashMap;
use std::sync::Arc;

use sqlstorm_core::column::TypeTag;
use sqlstorm_core::partition::{PartitionStrategy, MAX_RECORDS_PER_LIST_PARTITION};
use sqlstorm_core::table::{fk_constraint_sql, Table, TableKind, TableState, TableVariant};
use sqlstorm_core::{GenContext, Opt};

use crate::logging::print_and_log;
use crate::worker::Worker;

/// Flush threshold of the batched INSERT payload.
const MAX_INSERT_PAYLOAD: usize = 1024 * 1024;

/// One batched INSERT statement ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBatch {
    pub sql: String,
}

/// Creates the table on the server, loads its initial data, adds the
/// secondary indexes and (for FK children) the constraint. Returns `false`
/// and raises the stop flag on unrecoverable failures.
pub fn load_table(worker: &mut Worker, table: &Arc<Table>, bulk_insert: bool) -> bool {
    worker.ddl_query = true;
    let create = {
        let env = worker.run.env.clone();
        table.create_sql(false, false, &mut worker.ctx, &env)
    };
    if !worker.execute_sql(&create) {
        worker.run.set_failed();
        return false;
    }

    let opts = Arc::clone(&worker.run.opts);
    if !opts.get_bool(Opt::JustLoadDdl) && bulk_insert {
        if opts.get_bool(Opt::WaitForSync) && !opts.get_bool(Opt::SecondaryAfterCreate) {
            worker.wait_till_sync(&table.name);
        }
        worker.ddl_query = false;
        if !insert_bulk_records(worker, table) {
            return false;
        }
    }

    if opts.get_bool(Opt::SecondaryAfterCreate) {
        if let Some(secondary) = worker.run.env.secondary_engine.clone() {
            let sql = format!("ALTER TABLE {} SECONDARY_ENGINE={secondary}", table.name);
            worker.ddl_query = true;
            if !worker.execute_sql(&sql) {
                print_and_log(
                    &mut worker.logs,
                    &format!("Failed to set secondary engine for table {}", table.name),
                );
                return false;
            }
            if opts.get_bool(Opt::WaitForSync) {
                worker.wait_till_sync(&table.name);
            }
        }
    }

    worker.ddl_query = true;
    if !load_secondary_indexes(worker, table) {
        return false;
    }

    if table.kind == TableKind::Fk && !load_fk_constraint(worker, table) {
        return false;
    }

    if worker.run.failed() {
        worker
            .logs
            .line("another thread failed, aborting the initial load");
        return false;
    }
    true
}

/// Adds every index but the inline auto-increment one.
fn load_secondary_indexes(worker: &mut Worker, table: &Arc<Table>) -> bool {
    let statements: Vec<(String, String)> = {
        let state = table.state();
        state
            .indexes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != state.auto_inc_index)
            .map(|(_, index)| {
                (
                    index.name.clone(),
                    format!("ALTER TABLE {} ADD {}", table.name, index.definition()),
                )
            })
            .collect()
    };
    for (name, sql) in statements {
        if !worker.execute_sql(&sql) {
            print_and_log(
                &mut worker.logs,
                &format!("Failed to add index {name} on {}", table.name),
            );
            worker.run.set_failed();
            return false;
        }
    }
    true
}

/// Adds the named FOREIGN KEY constraint.
fn load_fk_constraint(worker: &mut Worker, table: &Arc<Table>) -> bool {
    let sql = {
        let state = table.state();
        let TableVariant::Fk { on_update, on_delete } = &state.variant else {
            return true;
        };
        let constraint = format!("{}_{}", table.name, worker.ctx.rng.int(100));
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {constraint}{}",
            table.name,
            fk_constraint_sql(&table.name, *on_update, *on_delete)
        )
    };
    if !worker.execute_sql(&sql) {
        print_and_log(
            &mut worker.logs,
            &format!("Failed to add fk constraint on {}", table.name),
        );
        worker.run.set_failed();
        return false;
    }
    true
}

/// Loads the table's initial rows in batched INSERTs.
fn insert_bulk_records(worker: &mut Worker, table: &Arc<Table>) -> bool {
    // A child without parent rows stays empty.
    if table.kind == TableKind::Fk {
        let parent = table.name.trim_end_matches("_fk");
        let parent_empty = worker
            .run
            .catalog
            .find(parent)
            .map(|p| p.state().initial_records == 0)
            .unwrap_or(false);
        if parent_empty {
            table.state().initial_records = 0;
        }
    }

    let parent_keys = if table.kind == TableKind::Fk {
        std::mem::take(&mut worker.unique_keys)
    } else {
        Vec::new()
    };

    let batches = {
        let mut state = table.state();
        generate_bulk_batches(&table.name, &mut state, &parent_keys, &mut worker.ctx, &mut worker.unique_keys)
    };

    for batch in batches {
        if !worker.execute_sql(&batch.sql) {
            print_and_log(
                &mut worker.logs,
                &format!("Bulk insert failed for table {}", table.name),
            );
            worker.run.set_failed();
            return false;
        }
        if worker.run.failed() {
            return false;
        }
    }
    true
}

/// Builds the batched INSERT statements for a table.
///
/// Unique-indexed INT columns draw from pre-generated unique vectors; the
/// primary-key vector is left in `pk_keys_out` for a subsequent FK child,
/// which samples `parent_keys` instead (truncating its row count when the
/// parent has fewer keys). LIST-partitioned tables insert with IGNORE since
/// generated partition-key values may fall outside the defined membership.
pub fn generate_bulk_batches(
    name: &str,
    state: &mut TableState,
    parent_keys: &[i64],
    ctx: &mut GenContext,
    pk_keys_out: &mut Vec<i64>,
) -> Vec<InsertBatch> {
    if state.initial_records == 0 {
        return Vec::new();
    }
    if state.has_primary_key() {
        *pk_keys_out = ctx.unique_keys(state.initial_records);
    }

    let is_fk_child = state.columns.iter().any(|c| c.name == "ifk_col");
    if is_fk_child {
        if parent_keys.is_empty() {
            state.initial_records = 0;
            return Vec::new();
        }
        state.initial_records = state.initial_records.min(parent_keys.len() as i64);
    }

    // Pre-generate unique vectors for every unique-indexed INT column.
    let mut unique_columns: HashMap<String, Vec<i64>> = HashMap::new();
    for index in &state.indexes {
        if !index.unique {
            continue;
        }
        for key in &index.columns {
            let Some(col) = state.columns.iter().find(|c| c.name == key.column) else {
                continue;
            };
            if col.tag != TypeTag::Int || col.primary_key || unique_columns.contains_key(&col.name)
            {
                continue;
            }
            if col.name == "ifk_col" {
                unique_columns.insert(col.name.clone(), sample_unique(parent_keys, state.initial_records, ctx));
            } else {
                unique_columns.insert(col.name.clone(), ctx.unique_keys(state.initial_records));
            }
        }
    }

    let is_list_partition = matches!(
        &state.variant,
        TableVariant::Partition(layout) if layout.strategy == PartitionStrategy::List
    );
    let list_domain =
        MAX_RECORDS_PER_LIST_PARTITION * ctx.opts.get_int(Opt::MaxPartitions);

    let mut prefix = String::from("INSERT ");
    if is_list_partition {
        prefix.push_str("IGNORE ");
    }
    let column_names: Vec<&str> = state.columns.iter().map(|c| c.name.as_str()).collect();
    prefix.push_str(&format!("INTO {name} ({})", column_names.join(", ")));

    let mut batches = Vec::new();
    let mut values = String::from(" VALUES");
    for record in 0..state.initial_records {
        let mut row = String::from("(");
        for (i, col) in state.columns.iter().enumerate() {
            if i > 0 {
                row.push_str(", ");
            }
            let value = if let Some(keys) = unique_columns.get(&col.name) {
                keys[record as usize].to_string()
            } else if col.name == "ifk_col" {
                parent_keys[ctx.rng.int(parent_keys.len() as i64 - 1) as usize].to_string()
            } else if col.tag == TypeTag::Generated {
                "DEFAULT".to_string()
            } else if col.primary_key {
                pk_keys_out[record as usize].to_string()
            } else if col.auto_increment {
                "NULL".to_string()
            } else if is_list_partition && col.name == "ip_col" {
                ctx.rng.int(list_domain).to_string()
            } else {
                ctx.column_value(col)
            };
            row.push_str(&value);
        }
        row.push(')');
        values.push_str(&row);

        if values.len() > MAX_INSERT_PAYLOAD || record + 1 == state.initial_records {
            batches.push(InsertBatch {
                sql: format!("{prefix}{values}"),
            });
            values = String::from(" VALUES");
        } else {
            values.push(',');
        }
    }
    batches
}

/// Samples `n` distinct values out of the parent key vector.
fn sample_unique(parent_keys: &[i64], n: i64, ctx: &mut GenContext) -> Vec<i64> {
    if parent_keys.len() as i64 <= n {
        return parent_keys.to_vec();
    }
    let mut pool: Vec<i64> = parent_keys.to_vec();
    let mut out = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let at = ctx.rng.int(pool.len() as i64 - 1) as usize;
        out.push(pool.swap_remove(at));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlstorm_core::column::Column;
    use sqlstorm_core::index::{Index, IndexColumn};
    use sqlstorm_core::rng::StringPool;
    use sqlstorm_core::OptionRegistry;

    fn context() -> GenContext {
        let mut opts = OptionRegistry::new();
        opts.set_int(Opt::InitialRecords, 50);
        GenContext::new(
            5,
            Arc::new(StringPool::generate(5)),
            Arc::new(opts),
        )
    }

    fn parent_state(records: i64) -> TableState {
        let mut pkey = Column::plain("ipkey", TypeTag::Int);
        pkey.primary_key = true;
        TableState {
            row_format: String::new(),
            tablespace: String::new(),
            encryption: "N".to_string(),
            compression: String::new(),
            key_block_size: 0,
            initial_records: records,
            auto_inc_index: 0,
            variant: TableVariant::Normal,
            columns: vec![pkey, Column::plain("i1", TypeTag::Int)],
            indexes: Vec::new(),
        }
    }

    fn child_state(records: i64) -> TableState {
        let mut state = parent_state(records);
        state.variant = TableVariant::Fk {
            on_update: sqlstorm_core::FkAction::Cascade,
            on_delete: sqlstorm_core::FkAction::Cascade,
        };
        state.columns = vec![
            Column::plain("ifk_col", TypeTag::Integer),
            Column::plain("i1", TypeTag::Int),
        ];
        state
    }

    fn extract_rows(batches: &[InsertBatch]) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        for batch in batches {
            let values = batch.sql.split(" VALUES").nth(1).unwrap();
            for row in values.split("),(") {
                let row = row.trim_matches(|c| c == '(' || c == ')');
                rows.push(row.split(", ").map(str::to_string).collect());
            }
        }
        rows
    }

    #[test]
    fn fk_values_are_subset_of_parent_keys() {
        let mut ctx = context();
        let mut parent = parent_state(40);
        let mut parent_keys = Vec::new();
        generate_bulk_batches("tt_1", &mut parent, &[], &mut ctx, &mut parent_keys);
        assert_eq!(parent_keys.len(), 40);

        let mut child = child_state(40);
        let mut child_pk = Vec::new();
        let batches =
            generate_bulk_batches("tt_1_fk", &mut child, &parent_keys, &mut ctx, &mut child_pk);
        for row in extract_rows(&batches) {
            let fk: i64 = row[0].parse().unwrap();
            assert!(parent_keys.contains(&fk), "{fk} not a parent key");
        }
    }

    #[test]
    fn fk_child_truncates_to_parent_size() {
        let mut ctx = context();
        let parent_keys = vec![1, 2, 3];
        let mut child = child_state(40);
        let mut child_pk = Vec::new();
        let batches =
            generate_bulk_batches("tt_1_fk", &mut child, &parent_keys, &mut ctx, &mut child_pk);
        assert_eq!(child.initial_records, 3);
        assert_eq!(extract_rows(&batches).len(), 3);
    }

    #[test]
    fn fk_child_with_no_parent_rows_stays_empty() {
        let mut ctx = context();
        let mut child = child_state(10);
        let mut child_pk = Vec::new();
        let batches = generate_bulk_batches("tt_1_fk", &mut child, &[], &mut ctx, &mut child_pk);
        assert!(batches.is_empty());
        assert_eq!(child.initial_records, 0);
    }

    #[test]
    fn primary_key_values_are_the_unique_vector() {
        let mut ctx = context();
        let mut state = parent_state(20);
        let mut keys = Vec::new();
        let batches = generate_bulk_batches("tt_1", &mut state, &[], &mut ctx, &mut keys);
        let rows = extract_rows(&batches);
        assert_eq!(rows.len(), 20);
        for (row, key) in rows.iter().zip(&keys) {
            assert_eq!(row[0], key.to_string());
        }
    }

    #[test]
    fn unique_index_columns_get_distinct_values() {
        let mut ctx = context();
        let mut state = parent_state(30);
        state.indexes.push(Index {
            name: "u0".to_string(),
            unique: true,
            columns: vec![IndexColumn { column: "i1".to_string(), desc: false, prefix: None }],
        });
        let mut keys = Vec::new();
        let batches = generate_bulk_batches("tt_1", &mut state, &[], &mut ctx, &mut keys);
        let rows = extract_rows(&batches);
        let mut seen: Vec<&str> = rows.iter().map(|r| r[1].as_str()).collect();
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), total, "unique column repeated a value");
    }

    #[test]
    fn list_partition_inserts_with_ignore() {
        let mut ctx = context();
        let mut state = parent_state(5);
        state.columns.insert(1, {
            let mut c = Column::plain("ip_col", TypeTag::Integer);
            c.nullable = false;
            c
        });
        state.variant = TableVariant::Partition(sqlstorm_core::PartitionLayout {
            strategy: PartitionStrategy::List,
            count: 1,
            ranges: Vec::new(),
            lists: vec![sqlstorm_core::ListPartition { name: "p0".into(), values: vec![1, 2] }],
            pool: vec![3],
        });
        let mut keys = Vec::new();
        let batches = generate_bulk_batches("tt_1_p", &mut state, &[], &mut ctx, &mut keys);
        assert!(batches[0].sql.starts_with("INSERT IGNORE INTO tt_1_p"));
    }

    #[test]
    fn batches_flush_by_payload_size() {
        let mut opts = OptionRegistry::new();
        opts.set_int(Opt::InitialRecords, 120_000);
        let mut ctx = GenContext::new(9, Arc::new(StringPool::generate(9)), Arc::new(opts));
        let mut state = parent_state(120_000);
        let mut keys = Vec::new();
        let batches = generate_bulk_batches("tt_1", &mut state, &[], &mut ctx, &mut keys);
        assert!(batches.len() > 1, "expected multiple batches");
        for batch in &batches {
            assert!(batch.sql.len() <= MAX_INSERT_PAYLOAD + 64 * 1024);
            assert!(batch.sql.starts_with("INSERT INTO tt_1 (ipkey, i1) VALUES("));
        }
    }
}
