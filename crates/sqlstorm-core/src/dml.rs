//! Random DML text builders: WHERE clauses, column lists, SET clauses and
//! the full statements the workload executes.
//!
//! Builders are pure over a locked [`TableState`]; callers hold the table's
//! DDL lock while building and release it before executing.

use crate::column::{Column, TypeTag};
use crate::options::Opt;
use crate::table::{TableState, TableVariant};
use crate::value::GenContext;

/// Picks the column DML predicates target. Prefers the primary key, then
/// the first column of a random index, then a uniform draw that strongly
/// down-weights BOOL, INTEGER, FLOAT and DOUBLE.
pub fn random_column<'a>(state: &'a TableState, ctx: &mut GenContext) -> &'a Column {
    if ctx.rng.int(100) < ctx.opts.get_int(Opt::UsingPkProb) {
        if let Some(pk) = state.columns.iter().find(|c| c.primary_key) {
            return pk;
        }
    }

    if !state.indexes.is_empty() {
        let index = &state.indexes[ctx.rng.int(state.indexes.len() as i64 - 1) as usize];
        if ctx.rng.int(100) > ctx.opts.get_int(Opt::UsingPkProb) && !index.columns.is_empty() {
            if let Some(col) = state.column(&index.columns[0].column) {
                if !matches!(col.tag, TypeTag::Bool | TypeTag::Float) {
                    return col;
                }
            }
        }
    }

    let only_bool = state.columns.iter().all(|c| c.tag == TypeTag::Bool);
    let mut float_tries = 0;
    loop {
        let col = &state.columns[ctx.rng.int(state.columns.len() as i64 - 1) as usize];
        match col.tag {
            TypeTag::Bool => {
                if ctx.rng.int(10_000) == 1 || only_bool {
                    return col;
                }
            }
            TypeTag::Integer => {
                if ctx.rng.int(1000) < 10 {
                    return col;
                }
            }
            TypeTag::Float | TypeTag::Double => {
                if float_tries == 50 {
                    return col;
                }
                float_tries += 1;
            }
            _ => return col,
        }
    }
}

/// ` PARTITION (p1, p3)` on a fifth of the statements against partitioned
/// tables, empty otherwise.
pub fn random_partition_clause(state: &TableState, ctx: &mut GenContext) -> String {
    let TableVariant::Partition(layout) = &state.variant else {
        return String::new();
    };
    if ctx.rng.int(10) >= 2 {
        return String::new();
    }
    let Some(first) = layout.random_partition_name(ctx) else {
        return String::new();
    };
    let mut clause = format!(" PARTITION ({first}");
    for _ in 0..ctx.rng.int(3) {
        if ctx.rng.int(2) == 1 {
            if let Some(more) = layout.random_partition_name(ctx) {
                clause.push_str(&format!(",{more}"));
            }
        }
    }
    clause.push(')');
    clause
}

/// ` IGNORE ` with the configured probability.
pub fn ignore_clause(ctx: &mut GenContext) -> String {
    if ctx.rng.int_in(100, 1) < ctx.opts.get_int(Opt::IgnoreDmlClause) {
        " IGNORE ".to_string()
    } else {
        String::new()
    }
}

/// A point predicate: equality heavy, with IN pairs, `instr` probes on
/// BLOBs, and IS [NOT] NULL when the drawn literal is NULL.
pub fn where_precise(state: &TableState, ctx: &mut GenContext) -> String {
    let col = random_column(state, ctx);
    let partition = random_partition_clause(state, ctx);
    let head = format!("{partition} WHERE {}", col.name);

    let value = ctx.column_value(col);
    if value == "NULL" {
        let form = if ctx.rng.int(1000) == 1 { "NOT NULL" } else { "NULL" };
        return format!("{head} IS {form}");
    }

    if ctx.rng.int(100) > 3 {
        return format!("{head} = {value}");
    }

    if col.value_tag() == TypeTag::Blob && ctx.rng.int(100) == 1 {
        return format!(
            "{partition} WHERE instr( {},_binary'{}%')",
            col.name,
            ctx.rand_string(10, 3)
        );
    }

    let second = ctx.column_value(col);
    if second == "NULL" {
        if ctx.rng.int(100) > 3 {
            return format!("{head} = {value} AND {} IS NOT NULL", col.name);
        }
        return format!("{head} = {value} OR {} IS NULL", col.name);
    }

    if ctx.rng.int(100) > 50 {
        return format!("{head} IN ({value}, {second})");
    }
    format!("{head} = {value}")
}

/// A range predicate: BETWEEN / NOT BETWEEN / open ranges / LIKE, biased
/// toward ranges; an empty string (full-table statement) once in a hundred.
pub fn where_bulk(state: &TableState, ctx: &mut GenContext) -> String {
    let col = random_column(state, ctx);
    let partition = random_partition_clause(state, ctx);
    let head = format!("{partition} WHERE {}", col.name);

    let value = ctx.column_value(col);
    if value == "NULL" {
        let form = if ctx.rng.int(1000) == 1 { "NOT NULL" } else { "NULL" };
        return format!("{head} IS {form}");
    }

    if col.is_numeric() && ctx.rng.int(100) < 40 {
        if let Ok(upper) = value.parse::<i64>() {
            let lower = upper - ctx.rng.int_in(100, 3);
            return format!("{head} BETWEEN {lower} AND {upper}");
        }
    }

    if col.is_comparable() {
        if ctx.rng.int(100) == 1 {
            return format!("{head} >= {value}");
        }
        if ctx.rng.int(100) == 1 {
            return format!("{head} <= {value}");
        }
        let second = ctx.column_value(col);
        if second == "NULL" {
            return format!("{head} >= {value} AND {} IS NOT NULL", col.name);
        }
        if ctx.rng.int(100) < 20 {
            return format!("{head} >= {value} AND {} <= {second}", col.name);
        }
        if ctx.rng.int(100) < 10 {
            return format!("{head} <= {value} AND {} >= {second}", col.name);
        }
    }

    if col.is_string_like() && ctx.rng.int(100) < 20 {
        return format!("{head} LIKE '{}%'", ctx.rand_string(10, 3));
    }

    if col.is_string_like() && ctx.rng.int(100) < 90 {
        let second = ctx.column_value(col);
        if second == "NULL" {
            return format!("{head} = {value} OR {} IS NULL", col.name);
        }
        if ctx.rng.int(100) < 80 {
            return format!("{head} BETWEEN {value} AND {second}");
        }
        let a = ctx.column_value(col);
        let b = ctx.column_value(col);
        return format!("{head} NOT BETWEEN {a} and {b}");
    }

    if ctx.rng.int(100) == 1 {
        return String::new();
    }
    let fresh = ctx.column_value(col);
    format!("{head} = {fresh}")
}

/// The projection: one random column, with a 20% chance of appending a
/// random subset of the remaining columns (skipping NOT SECONDARY ones).
pub fn select_columns(state: &TableState, ctx: &mut GenContext) -> String {
    let mut select = state.columns[ctx.rng.int(state.columns.len() as i64 - 1) as usize]
        .name
        .clone();
    if ctx.rng.int(100) < 20 {
        for col in &state.columns {
            if col.not_secondary {
                continue;
            }
            if ctx.rng.int(100) < 50 {
                select.push_str(&format!(", {}", col.name));
            }
        }
    }
    select
}

/// The SET clause of an UPDATE: one non-generated column, with a 10% chance
/// of appending further columns at 50% each.
pub fn set_clause(state: &TableState, ctx: &mut GenContext) -> String {
    let plain: Vec<&Column> = state
        .columns
        .iter()
        .filter(|c| c.tag != TypeTag::Generated)
        .collect();
    // A table of only generated columns cannot be updated; let the server
    // report it rather than spinning here.
    let col = if plain.is_empty() {
        &state.columns[0]
    } else {
        plain[ctx.rng.int(plain.len() as i64 - 1) as usize]
    };
    let mut clause = format!("{} = {}", col.name, ctx.column_value(col));
    if ctx.rng.int(100) < 10 {
        for other in &plain {
            if other.name != col.name && ctx.rng.int(100) > 50 {
                clause.push_str(&format!(", {} = {}", other.name, ctx.column_value(other)));
            }
        }
    }
    clause.push(' ');
    clause
}

/// `(c1, c2, ...) VALUES (v1, v2, ...)` for single-row inserts; generated
/// columns insert DEFAULT, auto-increment columns NULL a tenth of the time.
pub fn column_values(state: &TableState, ctx: &mut GenContext) -> String {
    let mut names = Vec::with_capacity(state.columns.len());
    let mut values = Vec::with_capacity(state.columns.len());
    for col in &state.columns {
        names.push(col.name.clone());
        let value = if col.tag == TypeTag::Generated {
            "default".to_string()
        } else if col.auto_increment && ctx.rng.int(100) < 10 {
            "NULL".to_string()
        } else {
            ctx.column_value(col)
        };
        values.push(value);
    }
    format!(" ({}) VALUES ({})", names.join(", "), values.join(", "))
}

// ---------------------------------------------------------------------------
// Full statements
// ---------------------------------------------------------------------------

/// Point SELECT; ordered by every column when result comparison needs a
/// stable row order, FOR UPDATE SKIP LOCKED when requested.
pub fn select_random_row_sql(
    name: &str,
    state: &TableState,
    for_update: bool,
    ctx: &mut GenContext,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM {name}{}",
        select_columns(state, ctx),
        where_precise(state, ctx)
    );
    if ctx.opts.get_bool(Opt::CompareResult) {
        let order: Vec<&str> = state.columns.iter().map(|c| c.name.as_str()).collect();
        sql.push_str(&format!(" order by {}", order.join(", ")));
    }
    if for_update && ctx.opts.get_str(Opt::SecondaryEngine).is_empty() {
        sql.push_str(" FOR UPDATE SKIP LOCKED");
    }
    sql
}

/// Bulk SELECT.
pub fn select_all_row_sql(
    name: &str,
    state: &TableState,
    for_update: bool,
    ctx: &mut GenContext,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM {name}{}",
        select_columns(state, ctx),
        where_bulk(state, ctx)
    );
    if for_update && ctx.opts.get_str(Opt::SecondaryEngine).is_empty() {
        sql.push_str(" FOR UPDATE SKIP LOCKED");
    }
    sql
}

/// Point UPDATE, or REPLACE INTO roughly a third of the time.
pub fn update_random_row_sql(name: &str, state: &TableState, ctx: &mut GenContext) -> String {
    if ctx.rng.int(100) >= 30 {
        format!(
            "UPDATE {}{name} SET {}{}",
            ignore_clause(ctx),
            set_clause(state, ctx),
            where_precise(state, ctx)
        )
    } else {
        format!("REPLACE INTO {name}{}", column_values(state, ctx))
    }
}

/// Bulk UPDATE.
pub fn update_all_rows_sql(name: &str, state: &TableState, ctx: &mut GenContext) -> String {
    format!(
        "UPDATE {}{name} SET {}{}",
        ignore_clause(ctx),
        set_clause(state, ctx),
        where_bulk(state, ctx)
    )
}

/// Point DELETE.
pub fn delete_random_row_sql(name: &str, state: &TableState, ctx: &mut GenContext) -> String {
    format!(
        "DELETE {} FROM {name}{}",
        ignore_clause(ctx),
        where_precise(state, ctx)
    )
}

/// Bulk DELETE.
pub fn delete_all_rows_sql(name: &str, state: &TableState, ctx: &mut GenContext) -> String {
    format!(
        "DELETE {} FROM {name}{}",
        ignore_clause(ctx),
        where_bulk(state, ctx)
    )
}

/// Single-row INSERT.
pub fn insert_random_row_sql(name: &str, state: &TableState, ctx: &mut GenContext) -> String {
    format!(
        "INSERT {} INTO {name}{}",
        ignore_clause(ctx),
        column_values(state, ctx)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionRegistry;
    use crate::test_support::{table_with, test_context};
    use std::sync::Arc;

    #[test]
    fn where_precise_is_equality_heavy() {
        let (mut ctx, _env) = test_context(107);
        let table = table_with(|_| {});
        let state = table.state();
        let mut equals = 0;
        let total = 500;
        for _ in 0..total {
            let clause = where_precise(&state, &mut ctx);
            assert!(clause.contains(" WHERE "), "{clause}");
            if clause.contains(" = ") && !clause.contains(" IN (") {
                equals += 1;
            }
        }
        assert!(equals > total * 8 / 10, "only {equals}/{total} equality predicates");
    }

    #[test]
    fn where_clauses_reference_real_columns() {
        let (mut ctx, _env) = test_context(109);
        let table = table_with(|_| {});
        let state = table.state();
        for _ in 0..200 {
            for clause in [where_precise(&state, &mut ctx), where_bulk(&state, &mut ctx)] {
                if clause.is_empty() {
                    continue;
                }
                let after = clause.split(" WHERE ").nth(1).unwrap_or("");
                let column = after.split_whitespace().next().unwrap_or("");
                let column = column.trim_start_matches("instr(").trim_end_matches(',');
                if !column.is_empty() {
                    assert!(
                        state.column(column).is_some() || after.starts_with("instr"),
                        "unknown column in {clause}"
                    );
                }
            }
        }
    }

    #[test]
    fn set_clause_skips_generated_columns() {
        let (mut ctx, _env) = test_context(113);
        let table = table_with(|state| {
            let mut r#gen = crate::column::Column::plain("g1", crate::column::TypeTag::Generated);
            r#gen.generated_expr = Some(" INT GENERATED ALWAYS AS ( i2+1)".into());
            r#gen.generated_tag = Some(crate::column::TypeTag::Int);
            state.columns.push(r#gen);
        });
        let state = table.state();
        for _ in 0..200 {
            let clause = set_clause(&state, &mut ctx);
            assert!(!clause.contains("g1 ="), "generated column updated: {clause}");
        }
    }

    #[test]
    fn column_values_inserts_default_for_generated() {
        let (mut ctx, _env) = test_context(127);
        let table = table_with(|state| {
            let mut r#gen = crate::column::Column::plain("g1", crate::column::TypeTag::Generated);
            r#gen.generated_expr = Some(" INT GENERATED ALWAYS AS ( i2+1)".into());
            r#gen.generated_tag = Some(crate::column::TypeTag::Int);
            state.columns.push(r#gen);
        });
        let state = table.state();
        let values = column_values(&state, &mut ctx);
        assert!(values.contains("g1"), "{values}");
        assert!(values.contains("default"), "{values}");
    }

    #[test]
    fn compare_result_orders_every_column() {
        let (mut ctx, _env) = test_context(131);
        let mut opts = OptionRegistry::new();
        opts.set_bool(crate::options::Opt::CompareResult, true);
        ctx.opts = Arc::new(opts);
        let table = table_with(|_| {});
        let state = table.state();
        let sql = select_random_row_sql("tt_1", &state, false, &mut ctx);
        assert!(sql.contains(" order by ipkey, i2, v1"), "{sql}");
    }

    #[test]
    fn for_update_suffix_depends_on_secondary() {
        let (mut ctx, _env) = test_context(137);
        let table = table_with(|_| {});
        let state = table.state();
        let sql = select_random_row_sql("tt_1", &state, true, &mut ctx);
        assert!(sql.ends_with(" FOR UPDATE SKIP LOCKED"), "{sql}");

        let mut opts = OptionRegistry::new();
        opts.set_str(crate::options::Opt::SecondaryEngine, "COLUMNAR");
        ctx.opts = Arc::new(opts);
        let sql = select_random_row_sql("tt_1", &state, true, &mut ctx);
        assert!(!sql.contains("FOR UPDATE"), "{sql}");
    }

    #[test]
    fn pk_bias_holds() {
        let (mut ctx, _env) = test_context(139);
        let table = table_with(|_| {});
        let state = table.state();
        let mut pk_hits = 0;
        for _ in 0..1000 {
            if random_column(&state, &mut ctx).name == "ipkey" {
                pk_hits += 1;
            }
        }
        // using-pk-prob defaults to 50 and the pk also leads an index.
        assert!(pk_hits > 400, "pk drawn only {pk_hits}/1000 times");
    }
}
