//! Grammar SQL: user templates with `T{i}`, `T{i}_{TYPE}_{j}` and
//! `RAND_INT` placeholders, parsed once into descriptors and bound to real
//! tables per execution.

use std::fs;
use std::sync::Arc;

use sqlstorm_core::column::TypeTag;
use sqlstorm_core::table::{Table, TableState};
use sqlstorm_core::{GenContext, Opt};

use crate::compare;
use crate::error::{Result, WorkloadError};
use crate::logging::print_and_log;
use crate::worker::Worker;

/// Column types a placeholder may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarType {
    Int,
    Char,
    Varchar,
    Datetime,
    Date,
    Timestamp,
    Float,
    Text,
}

/// All grammar types, indexable by `GrammarType as usize`.
pub const GRAMMAR_TYPES: [GrammarType; 8] = [
    GrammarType::Int,
    GrammarType::Char,
    GrammarType::Varchar,
    GrammarType::Datetime,
    GrammarType::Date,
    GrammarType::Timestamp,
    GrammarType::Float,
    GrammarType::Text,
];

impl GrammarType {
    pub fn as_str(self) -> &'static str {
        match self {
            GrammarType::Int => "INT",
            GrammarType::Char => "CHAR",
            GrammarType::Varchar => "VARCHAR",
            GrammarType::Datetime => "DATETIME",
            GrammarType::Date => "DATE",
            GrammarType::Timestamp => "TIMESTAMP",
            GrammarType::Float => "FLOAT",
            GrammarType::Text => "TEXT",
        }
    }

    /// Maps a column's value type onto a grammar type.
    fn of_column(tag: TypeTag) -> Option<GrammarType> {
        Some(match tag {
            TypeTag::Int => GrammarType::Int,
            TypeTag::Char => GrammarType::Char,
            TypeTag::Varchar => GrammarType::Varchar,
            TypeTag::DateTime => GrammarType::Datetime,
            TypeTag::Date => GrammarType::Date,
            TypeTag::Timestamp => GrammarType::Timestamp,
            TypeTag::Float => GrammarType::Float,
            TypeTag::Text => GrammarType::Text,
            _ => return None,
        })
    }
}

/// One virtual table of a template and its required column counts per type.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateTable {
    /// The placeholder token, e.g. `T1`.
    pub token: String,
    pub counts: [usize; GRAMMAR_TYPES.len()],
}

impl TemplateTable {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarTemplate {
    pub sql: String,
    pub tables: Vec<TemplateTable>,
}

/// Columns bound for one virtual table: `(column name, random value)` per
/// type, in placeholder index order.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    pub table_name: String,
    pub columns: [Vec<(String, String)>; GRAMMAR_TYPES.len()],
}

/// Parses the grammar file text: one SQL per line, `#` comments and blank
/// lines ignored.
pub fn parse_templates(text: &str) -> Vec<GrammarTemplate> {
    let mut templates = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let sql = line.to_string();
        let mut tables = Vec::new();
        let mut i = 1;
        loop {
            let token = format!("T{i}");
            if !sql.contains(&token) {
                break;
            }
            let mut counts = [0usize; GRAMMAR_TYPES.len()];
            for (t, grammar_type) in GRAMMAR_TYPES.iter().enumerate() {
                let mut j = 1;
                while sql.contains(&format!("{token}_{}_{j}", grammar_type.as_str())) {
                    counts[t] += 1;
                    j += 1;
                }
            }
            tables.push(TemplateTable { token, counts });
            i += 1;
        }
        templates.push(GrammarTemplate { sql, tables });
    }
    templates
}

/// Loads and parses the grammar file.
pub fn load_templates(path: &str) -> Result<Vec<GrammarTemplate>> {
    let text = fs::read_to_string(path).map_err(|source| WorkloadError::LogIo {
        path: path.to_string(),
        source,
    })?;
    Ok(parse_templates(&text))
}

/// Tries to bind every required column of one virtual table against a
/// table's columns. NOT SECONDARY columns are skipped.
pub fn try_bind_columns(
    template: &TemplateTable,
    state: &TableState,
    ctx: &mut GenContext,
) -> Option<[Vec<(String, String)>; GRAMMAR_TYPES.len()]> {
    let mut bound: [Vec<(String, String)>; GRAMMAR_TYPES.len()] = Default::default();
    let total = template.total();
    let mut filled = 0;
    let mut tries = 20;
    while filled < total && tries > 0 {
        tries -= 1;
        let col = &state.columns[ctx.rng.int(state.columns.len() as i64 - 1) as usize];
        if col.not_secondary {
            continue;
        }
        let Some(grammar_type) = GrammarType::of_column(col.value_tag()) else {
            continue;
        };
        let t = grammar_type as usize;
        if bound[t].len() < template.counts[t] {
            let value = ctx.column_value(col);
            bound[t].push((col.name.clone(), value));
            filled += 1;
        }
    }
    (filled == total).then_some(bound)
}

/// Substitutes bound tables, columns and values into the template.
pub fn substitute(template: &GrammarTemplate, bindings: &[Binding], rand_int: i64) -> String {
    let mut sql = template.sql.clone();

    for (table, binding) in template.tables.iter().zip(bindings) {
        for (t, grammar_type) in GRAMMAR_TYPES.iter().enumerate() {
            for (j, (column, value)) in binding.columns[t].iter().enumerate() {
                let placeholder = format!("{}_{}_{}", table.token, grammar_type.as_str(), j + 1);
                for op in [">=", "<=", "!=", "<>", "=", ">", "<"] {
                    sql = sql.replace(
                        &format!("{placeholder}{op}RAND"),
                        &format!("{}.{column} {op} {value}", table.token),
                    );
                }
                sql = sql.replace(&placeholder, &format!("{}.{column}", table.token));
            }
        }
    }

    for (table, binding) in template.tables.iter().zip(bindings) {
        sql = qualify_table_token(&sql, &table.token, &binding.table_name);
    }

    sql.replace("RAND_INT", &rand_int.to_string())
}

/// Rewrites every `T{i}` followed by a space, a closing parenthesis or the
/// end of line into `<real name> T{i}`, turning the token into an alias.
fn qualify_table_token(sql: &str, token: &str, real_name: &str) -> String {
    let mut out = String::with_capacity(sql.len() + real_name.len());
    let mut rest = sql;
    while let Some(at) = rest.find(token) {
        out.push_str(&rest[..at]);
        let after = &rest[at + token.len()..];
        let delimited = matches!(after.chars().next(), None | Some(' ') | Some(')'));
        if delimited {
            out.push_str(real_name);
            out.push(' ');
        }
        out.push_str(token);
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Picks a template, binds it against the catalog (or against the enforced
/// table in comparison mode), substitutes, and executes.
pub fn run_grammar_sql(worker: &mut Worker, enforce_table: &Arc<Table>) {
    if worker.run.grammar.is_empty() {
        return;
    }
    let compare_result = worker.run.opts.get_bool(Opt::CompareResult);
    let template = worker.run.grammar
        [worker.ctx.rng.int(worker.run.grammar.len() as i64 - 1) as usize]
        .clone();

    if compare_result {
        worker.execute_sql("COMMIT");
    }

    let mut bindings = Vec::with_capacity(template.tables.len());
    for table_template in &template.tables {
        let mut bound = None;
        let mut table_check = 100;
        while bound.is_none() && table_check > 0 {
            table_check -= 1;
            let working = if compare_result {
                Arc::clone(enforce_table)
            } else {
                match worker.run.catalog.random(&mut worker.ctx.rng) {
                    Some(table) => table,
                    None => return,
                }
            };
            let columns = {
                let state = working.state();
                try_bind_columns(table_template, &state, &mut worker.ctx)
            };
            if let Some(columns) = columns {
                bound = Some(Binding {
                    table_name: working.name.clone(),
                    columns,
                });
            }
            if compare_result {
                // Binding is pinned to the enforced table; one shot.
                break;
            }
        }
        let Some(binding) = bound else {
            worker
                .logs
                .line(&format!("Could not find table to execute SQL {}", template.sql));
            return;
        };
        bindings.push(binding);
    }

    let rand_int = worker.ctx.rng.int(100);
    let sql = substitute(&template, &bindings, rand_int);

    if compare_result {
        compare::between_engines(worker, enforce_table, &sql);
    } else if !worker.execute_sql(&sql) {
        print_and_log(&mut worker.logs, &format!("Grammar SQL failed {sql}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlstorm_core::rng::StringPool;
    use sqlstorm_core::{Column, OptionRegistry};

    #[test]
    fn parse_counts_tables_and_columns() {
        let text = "# header\n\nSELECT T1_INT_1, T1_INT_2, T2_VARCHAR_1 FROM T1, T2 WHERE T1_INT_1=RAND\n";
        let templates = parse_templates(text);
        assert_eq!(templates.len(), 1);
        let template = &templates[0];
        assert_eq!(template.tables.len(), 2);
        assert_eq!(template.tables[0].token, "T1");
        assert_eq!(template.tables[0].counts[GrammarType::Int as usize], 2);
        assert_eq!(template.tables[1].counts[GrammarType::Varchar as usize], 1);
        assert_eq!(template.tables[1].total(), 1);
    }

    #[test]
    fn parse_skips_comments_and_blanks() {
        let templates = parse_templates("# only a comment\n\n   \n");
        assert!(templates.is_empty());
    }

    fn binding(table: &str, columns: &[(GrammarType, &str, &str)]) -> Binding {
        let mut b = Binding {
            table_name: table.to_string(),
            columns: Default::default(),
        };
        for (t, name, value) in columns {
            b.columns[*t as usize].push((name.to_string(), value.to_string()));
        }
        b
    }

    #[test]
    fn substitute_columns_tables_and_rand() {
        let templates =
            parse_templates("SELECT T1_INT_1 FROM T1 WHERE T1_INT_1>=RAND AND T1_INT_1 < RAND_INT");
        let template = &templates[0];
        let bindings = vec![binding("tt_3", &[(GrammarType::Int, "ipkey", "42")])];
        let sql = substitute(template, &bindings, 7);
        assert_eq!(
            sql,
            "SELECT T1.ipkey FROM tt_3 T1 WHERE T1.ipkey >= 42 AND T1.ipkey < 7"
        );
    }

    #[test]
    fn substitute_handles_parenthesized_token() {
        let templates = parse_templates("SELECT count(*) FROM (T1)");
        let template = &templates[0];
        let bindings = vec![binding("tt_9", &[])];
        let sql = substitute(template, &bindings, 1);
        assert_eq!(sql, "SELECT count(*) FROM (tt_9 T1)");
    }

    #[test]
    fn try_bind_finds_matching_columns() {
        let templates = parse_templates("SELECT T1_INT_1, T1_VARCHAR_1 FROM T1");
        let template = &templates[0].tables[0];

        let table = fixture_table();
        let mut ctx = fixture_ctx();
        let state = table.state();
        let bound = try_bind_columns(template, &state, &mut ctx).expect("bindable");
        assert_eq!(bound[GrammarType::Int as usize].len(), 1);
        assert_eq!(bound[GrammarType::Varchar as usize].len(), 1);
        assert_eq!(bound[GrammarType::Varchar as usize][0].0, "v1");
    }

    #[test]
    fn try_bind_fails_when_types_missing() {
        let templates = parse_templates("SELECT T1_TIMESTAMP_1 FROM T1");
        let template = &templates[0].tables[0];
        let table = fixture_table();
        let mut ctx = fixture_ctx();
        let state = table.state();
        assert!(try_bind_columns(template, &state, &mut ctx).is_none());
    }

    fn fixture_ctx() -> GenContext {
        GenContext::new(
            3,
            std::sync::Arc::new(StringPool::generate(3)),
            std::sync::Arc::new(OptionRegistry::new()),
        )
    }

    fn fixture_table() -> Table {
        use sqlstorm_core::table::{TableKind, TableVariant};
        let mut v1 = Column::plain("v1", TypeTag::Varchar);
        v1.length = 10;
        let state = TableState {
            row_format: String::new(),
            tablespace: String::new(),
            encryption: "N".to_string(),
            compression: String::new(),
            key_block_size: 0,
            initial_records: 10,
            auto_inc_index: 0,
            variant: TableVariant::Normal,
            columns: vec![Column::plain("ipkey", TypeTag::Int), v1],
            indexes: Vec::new(),
        };
        Table::new("tt_1".to_string(), TableKind::Normal, "INNODB".to_string(), state)
    }
}
