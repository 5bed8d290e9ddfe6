//! Table model: variants, random creation, CREATE TABLE emission, and the
//! plan/apply halves of every schema mutation.
//!
//! Mutations follow one shape: under the table's state lock a `plan_*`
//! method builds the SQL text plus the model delta, the caller executes the
//! SQL with the lock released, and only on server success applies the delta
//! with `apply_*`. A failed statement therefore leaves the in-memory model
//! untouched.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::column::{Column, TypeTag};
use crate::env::RunEnv;
use crate::index::{Index, IndexColumn};
use crate::options::Opt;
use crate::partition::{PartitionLayout, PartitionStrategy};
use crate::value::GenContext;

/// Prefix of every generated table name.
pub const TABLE_PREFIX: &str = "tt_";

/// A foreign-key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FkAction {
    #[serde(rename = "RESTRICT")]
    Restrict,
    #[serde(rename = "SET NULL")]
    SetNull,
    #[serde(rename = "NO ACTION")]
    NoAction,
    #[serde(rename = "SET DEFAULT")]
    SetDefault,
    #[serde(rename = "CASCADE")]
    Cascade,
}

impl FkAction {
    pub fn as_str(self) -> &'static str {
        match self {
            FkAction::Restrict => "RESTRICT",
            FkAction::SetNull => "SET NULL",
            FkAction::NoAction => "NO ACTION",
            FkAction::SetDefault => "SET DEFAULT",
            FkAction::Cascade => "CASCADE",
        }
    }

    /// A random action. A child with a STORED generated column over the
    /// foreign-key column must use SET DEFAULT; `no-fk-cascade` removes
    /// CASCADE from the draw.
    fn random(ctx: &mut GenContext, columns: &[Column]) -> Self {
        let depends_on_fk_col = columns.iter().any(|col| {
            col.tag == TypeTag::Generated
                && col
                    .generated_expr
                    .as_deref()
                    .is_some_and(|e| e.contains("fk_col") && e.contains("STORED"))
        });
        if depends_on_fk_col {
            return FkAction::SetDefault;
        }
        const ALL: [FkAction; 5] = [
            FkAction::Restrict,
            FkAction::SetNull,
            FkAction::NoAction,
            FkAction::SetDefault,
            FkAction::Cascade,
        ];
        let upper = if ctx.opts.get_bool(Opt::NoFkCascade) { 3 } else { 4 };
        ALL[ctx.rng.int(upper) as usize]
    }
}

/// Which of the four table shapes a table is. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Normal,
    Partition,
    Fk,
    Temporary,
}

impl TableKind {
    /// Table-name suffix for this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            TableKind::Normal => "",
            TableKind::Partition => "_p",
            TableKind::Fk => "_fk",
            TableKind::Temporary => "_t",
        }
    }
}

/// Variant payload of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum TableVariant {
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "TEMPORARY")]
    Temporary,
    #[serde(rename = "FK")]
    Fk { on_update: FkAction, on_delete: FkAction },
    #[serde(rename = "PARTITION")]
    Partition(PartitionLayout),
}

impl TableVariant {
    pub fn kind(&self) -> TableKind {
        match self {
            TableVariant::Normal => TableKind::Normal,
            TableVariant::Temporary => TableKind::Temporary,
            TableVariant::Fk { .. } => TableKind::Fk,
            TableVariant::Partition(_) => TableKind::Partition,
        }
    }
}

/// The mutable part of a table, guarded by the table's DDL lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableState {
    pub row_format: String,
    pub tablespace: String,
    pub encryption: String,
    pub compression: String,
    pub key_block_size: i64,
    pub initial_records: i64,
    pub auto_inc_index: usize,
    #[serde(flatten)]
    pub variant: TableVariant,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
}

impl TableState {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    /// Generated columns whose expression references the given column.
    fn dependent_generated(&self, base: &str) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| {
                c.tag == TypeTag::Generated
                    && c.generated_expr.as_deref().is_some_and(|e| e.contains(base))
            })
            .map(|c| c.name.clone())
            .collect()
    }

    /// Removes a column and repairs the indexes: an index whose only key was
    /// the column disappears, others just lose that key.
    fn remove_column_with_index_repair(&mut self, name: &str) {
        self.indexes.retain_mut(|index| {
            if !index.references(name) {
                return true;
            }
            if index.columns.len() == 1 {
                false
            } else {
                index.columns.retain(|key| key.column != name);
                true
            }
        });
        self.columns.retain(|c| c.name != name);
    }
}

/// A table alive in the catalog.
#[derive(Debug)]
pub struct Table {
    pub name: String,
    pub kind: TableKind,
    pub engine: String,
    state: Mutex<TableState>,
    dml_gate: RwLock<()>,
}

// ---------------------------------------------------------------------------
// Schema-mutation plans
// ---------------------------------------------------------------------------

/// ALTER TABLE ADD COLUMN.
pub struct AddColumnPlan {
    pub sql: String,
    pub column: Column,
}

/// ALTER TABLE DROP COLUMN, with the generated columns that must go with it.
pub struct DropColumnPlan {
    pub sql: String,
    pub column: String,
    pub dependents: Vec<String>,
}

/// ALTER TABLE MODIFY COLUMN; `column` is the post-modification form.
pub struct ModifyColumnPlan {
    pub sql: String,
    pub column: Column,
}

/// ALTER TABLE ADD INDEX.
pub struct AddIndexPlan {
    pub sql: String,
    pub index: Index,
}

/// ALTER TABLE DROP INDEX.
pub struct DropIndexPlan {
    pub sql: String,
    pub index: String,
}

/// ALTER TABLE RENAME COLUMN/INDEX; renaming toggles a `_rename` suffix.
pub struct RenamePlan {
    pub sql: String,
    pub from: String,
    pub to: String,
}

/// ALTER TABLE ENCRYPTION / COMPRESSION; `value` is the new attribute.
pub struct SetAttrPlan {
    pub sql: String,
    pub value: String,
}

const RENAME_SUFFIX: &str = "_rename";

fn toggle_rename(name: &str) -> String {
    match name.strip_suffix(RENAME_SUFFIX) {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => format!("{name}{RENAME_SUFFIX}"),
    }
}

impl Table {
    pub fn new(name: String, kind: TableKind, engine: String, state: TableState) -> Self {
        Self {
            name,
            kind,
            engine,
            state: Mutex::new(state),
            dml_gate: RwLock::new(()),
        }
    }

    /// Acquires the table's DDL lock.
    pub fn state(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Shared side of the DML gate; DML holds this while executing.
    pub fn dml_shared(&self) -> RwLockReadGuard<'_, ()> {
        self.dml_gate.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Exclusive side of the DML gate; the comparator holds this while it
    /// snapshots the primary result.
    pub fn dml_exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.dml_gate.write().unwrap_or_else(|e| e.into_inner())
    }

    // -- Creation ------------------------------------------------------------

    /// Creates a random table. `suffix` appends a random numeric tail to the
    /// base name, used for tables added mid-run so names never collide.
    pub fn random(kind: TableKind, id: i64, suffix: bool, ctx: &mut GenContext, env: &RunEnv) -> Self {
        let mut name = format!("{TABLE_PREFIX}{id}");
        if suffix {
            name.push_str(&format!("_{}", ctx.rng.int(1_000_000)));
        }
        name.push_str(kind.suffix());

        let layout = (kind == TableKind::Partition).then(|| PartitionLayout::random(ctx, env));

        let initial_records = if ctx.opts.get_bool(Opt::ExactRecords) {
            ctx.opts.get_int(Opt::InitialRecords)
        } else {
            ctx.rng.int(ctx.opts.get_int(Opt::InitialRecords))
        };

        let mut state = TableState {
            row_format: String::new(),
            tablespace: String::new(),
            encryption: "N".to_string(),
            compression: String::new(),
            key_block_size: 0,
            initial_records,
            auto_inc_index: 0,
            variant: TableVariant::Normal,
            columns: Vec::new(),
            indexes: Vec::new(),
        };

        Self::pick_attributes(kind, &mut state, ctx, env);

        let list_partitioned =
            matches!(&layout, Some(l) if l.strategy == PartitionStrategy::List);
        state.columns = random_columns(kind, list_partitioned, ctx, env);
        let (indexes, auto_inc_index) = random_indexes(&name, &state.columns, ctx, env);
        state.indexes = indexes;
        state.auto_inc_index = auto_inc_index;

        state.variant = match kind {
            TableKind::Normal => TableVariant::Normal,
            TableKind::Temporary => TableVariant::Temporary,
            TableKind::Partition => TableVariant::Partition(layout.unwrap_or_else(|| {
                PartitionLayout::random(ctx, env)
            })),
            TableKind::Fk => TableVariant::Fk {
                on_update: FkAction::random(ctx, &state.columns),
                on_delete: FkAction::random(ctx, &state.columns),
            },
        };

        let engine = ctx.opts.get_str(Opt::Engine).to_string();
        Table::new(name, kind, engine, state)
    }

    fn pick_attributes(kind: TableKind, state: &mut TableState, ctx: &mut GenContext, env: &RunEnv) {
        // Temporary tables on 8.0 cannot carry a key block size.
        if !(env.probe.version >= 80000 && kind == TableKind::Temporary) {
            if !env.key_block_sizes.is_empty() {
                state.key_block_size =
                    env.key_block_sizes[ctx.rng.int(env.key_block_sizes.len() as i64 - 1) as usize];
            }
            if state.key_block_size > 0 && ctx.rng.int(2) == 0 {
                state.row_format = "COMPRESSED".to_string();
            }
            if state.key_block_size == 0 && !env.row_formats.is_empty() {
                state.row_format =
                    env.row_formats[ctx.rng.int(env.row_formats.len() as i64 - 1) as usize].clone();
            }
        }

        let tbs_count = ctx.opts.get_int(Opt::GeneralTablespaces);
        if kind == TableKind::Partition && !env.no_encryption {
            state.encryption =
                env.encryption_modes[ctx.rng.int(env.encryption_modes.len() as i64 - 1) as usize].clone();
        } else if kind != TableKind::Temporary && !env.no_encryption {
            let mode =
                env.encryption_modes[ctx.rng.int(env.encryption_modes.len() as i64 - 1) as usize].clone();
            if mode == "Y" || mode == "N" {
                state.encryption = mode;
                if !env.tablespaces.is_empty() && ctx.rng.int(tbs_count) != 0 {
                    let tablespace =
                        env.tablespaces[ctx.rng.int(env.tablespaces.len() as i64 - 1) as usize].clone();
                    if tablespace.ends_with("_e") {
                        state.encryption = "Y".to_string();
                    }
                    state.row_format.clear();
                    state.key_block_size = tablespace_key_block_size(&tablespace, env);
                    state.tablespace = tablespace;
                }
            } else {
                state.encryption = mode;
            }
        }

        if env.probe.encrypted_temp_tables && kind == TableKind::Temporary {
            state.encryption = "Y".to_string();
        }
        if env.probe.encrypted_system_tablespace && state.tablespace == "innodb_system" {
            state.encryption = "Y".to_string();
        }

        // A quarter of plain file-per-table tables get page compression.
        if kind != TableKind::Temporary
            && state.tablespace.is_empty()
            && ctx.rng.int(3) == 1
            && !env.compressions.is_empty()
        {
            state.compression =
                env.compressions[ctx.rng.int(env.compressions.len() as i64 - 1) as usize].clone();
            state.row_format.clear();
            state.key_block_size = 0;
        }
    }

    // -- Emission ------------------------------------------------------------

    /// The CREATE TABLE statement. `with_index` controls whether secondary
    /// indexes are emitted inline (the auto-increment index always is);
    /// `with_fk` controls the inline FOREIGN KEY constraint.
    pub fn create_sql(&self, with_index: bool, with_fk: bool, ctx: &mut GenContext, env: &RunEnv) -> String {
        let state = self.state();
        let mut parts: Vec<String> = state.columns.iter().map(Column::definition).collect();

        for col in &state.columns {
            if col.primary_key {
                let key = if self.kind == TableKind::Partition {
                    if ctx.rng.int(1) == 0 {
                        format!("{}, ip_col", col.name)
                    } else {
                        format!("ip_col, {}", col.name)
                    }
                } else {
                    col.name.clone()
                };
                parts.push(format!(" PRIMARY KEY({key})"));
            }
        }

        if with_index {
            parts.extend(state.indexes.iter().map(Index::definition));
        } else if let Some(auto_inc) = state.indexes.get(state.auto_inc_index) {
            parts.push(auto_inc.definition());
        }

        if with_fk {
            if let TableVariant::Fk { on_update, on_delete } = &state.variant {
                parts.push(fk_constraint_sql(&self.name, *on_update, *on_delete));
            }
        }

        let mut def = String::from("CREATE");
        if self.kind == TableKind::Temporary {
            def.push_str(" TEMPORARY");
        }
        def.push_str(&format!(" TABLE {} ({} )", self.name, parts.join(", ")));

        let mut keyring_key = false;
        if !env.no_encryption && self.kind != TableKind::Temporary {
            match state.encryption.as_str() {
                "Y" | "N" => def.push_str(&format!(" ENCRYPTION='{}'", state.encryption)),
                "KEYRING" => {
                    keyring_key = true;
                    match ctx.rng.int(2) {
                        0 => def.push_str(" ENCRYPTION='KEYRING'"),
                        1 => def.push_str(&format!(" ENCRYPTION_KEY_ID={}", ctx.rng.int(9))),
                        _ => def.push_str(&format!(
                            " ENCRYPTION='KEYRING' ENCRYPTION_KEY_ID={}",
                            ctx.rng.int(9)
                        )),
                    }
                }
                _ => {}
            }
        }

        if !state.compression.is_empty() {
            def.push_str(&format!(" COMPRESSION='{}'", state.compression));
        }
        if !state.tablespace.is_empty() && !keyring_key {
            def.push_str(&format!(" TABLESPACE={}", state.tablespace));
        }
        if state.key_block_size > 1 {
            def.push_str(&format!(" KEY_BLOCK_SIZE={}", state.key_block_size));
        }
        if !state.row_format.is_empty() {
            def.push_str(&format!(" ROW_FORMAT={}", state.row_format));
        }
        if !self.engine.is_empty() {
            def.push_str(&format!(" ENGINE={}", self.engine));
        }
        if let Some(secondary) = &env.secondary_engine {
            if !env.secondary_after_create {
                def.push_str(&format!(", SECONDARY_ENGINE={secondary}"));
            }
        }

        if let TableVariant::Partition(layout) = &state.variant {
            def.push_str(&layout.definition());
        }
        def
    }

    // -- Column DDL ----------------------------------------------------------

    /// Plans ADD COLUMN. `AFTER <col>` placement is only attempted when the
    /// algorithm and virtual-column constraints permit it.
    pub fn plan_add_column(&self, ctx: &mut GenContext, env: &RunEnv) -> AddColumnPlan {
        let state = self.state();
        let no_virtual = ctx.opts.get_bool(Opt::NoVirtualColumns)
            || (state.columns.len() == 1 && state.columns[0].auto_increment);

        let name_id = format!("N{}", ctx.rng.int(300));
        let column = loop {
            let tag = random_added_column_tag(!no_virtual, ctx);
            if tag == TypeTag::Generated {
                if let Some(col) = random_generated_column(&name_id, &state.columns, ctx, env) {
                    break col;
                }
                continue;
            }
            break random_typed_column(&name_id, tag, ctx, env);
        };

        let (algo_lock, algo) = env.algorithm_lock(&mut ctx.rng);
        let has_virtual = column.tag == TypeTag::Generated
            || state.columns.iter().any(|c| c.tag == TypeTag::Generated);

        let mut sql = format!("ALTER TABLE {} ADD COLUMN {}", self.name, column.definition());
        let instant_family = algo == "INSTANT" || algo == "INPLACE";
        let after_allowed = if instant_family {
            !has_virtual && state.key_block_size == 1
        } else {
            true
        };
        if after_allowed && ctx.rng.int_in(10, 1) <= 7 {
            let anchor = &state.columns[ctx.rng.int(state.columns.len() as i64 - 1) as usize];
            sql.push_str(&format!(" AFTER {}", anchor.name));
        }
        sql.push(',');
        sql.push_str(&algo_lock);
        AddColumnPlan { sql, column }
    }

    pub fn apply_add_column(&self, plan: AddColumnPlan) {
        let mut state = self.state();
        if state.column(&plan.column.name).is_none() {
            state.columns.push(plan.column);
        }
    }

    /// Plans DROP COLUMN, or `None` when only one column remains or the
    /// primary key column was drawn while primary keys are in force.
    pub fn plan_drop_column(&self, ctx: &mut GenContext, env: &RunEnv) -> Option<DropColumnPlan> {
        let state = self.state();
        if state.columns.len() <= 1 {
            return None;
        }
        let target = state.columns[ctx.rng.int(state.columns.len() as i64 - 1) as usize]
            .name
            .clone();
        if ctx.rng.int_in(100, 1) <= ctx.opts.get_int(Opt::PrimaryKeyProb) && target.contains("pkey")
        {
            return None;
        }
        let dependents: Vec<String> = state
            .dependent_generated(&target)
            .into_iter()
            .filter(|name| *name != target)
            .collect();
        let mut sql = format!("ALTER TABLE {}", self.name);
        for dependent in &dependents {
            sql.push_str(&format!(" DROP COLUMN {dependent},"));
        }
        sql.push_str(&format!(" DROP COLUMN {target},"));
        sql.push_str(&env.algorithm_lock_clause(&mut ctx.rng));
        Some(DropColumnPlan {
            sql,
            column: target,
            dependents,
        })
    }

    pub fn apply_drop_column(&self, plan: &DropColumnPlan) {
        let mut state = self.state();
        for dependent in &plan.dependents {
            state.remove_column_with_index_repair(dependent);
        }
        state.remove_column_with_index_repair(&plan.column);
    }

    /// Plans MODIFY COLUMN: length re-roll, auto-increment / compressed /
    /// not-secondary toggles. `None` when no eligible column exists.
    pub fn plan_modify_column(&self, ctx: &mut GenContext, env: &RunEnv) -> Option<ModifyColumnPlan> {
        let state = self.state();
        let mut column = None;
        for _ in 0..50 {
            let candidate = &state.columns[ctx.rng.int(state.columns.len() as i64 - 1) as usize];
            if candidate.tag != TypeTag::Bool {
                column = Some(candidate.clone());
                break;
            }
        }
        let mut column = column?;

        if column.length != 0 {
            column.length = ctx.rng.int_in(env.max_column_length, 5);
        }
        if column.auto_increment && ctx.rng.int(5) == 0 {
            column.auto_increment = false;
        }
        if column.compressed && ctx.rng.int(4) == 0 {
            column.compressed = false;
        } else if !ctx.opts.get_bool(Opt::NoColumnCompression)
            && matches!(
                column.tag,
                TypeTag::Blob | TypeTag::Generated | TypeTag::Varchar | TypeTag::Text
            )
        {
            column.compressed = true;
        } else if column.not_secondary && ctx.rng.int(3) == 0 {
            column.not_secondary = false;
        }

        let sql = format!(
            "ALTER TABLE {} MODIFY COLUMN {},{}",
            self.name,
            column.definition(),
            env.algorithm_lock_clause(&mut ctx.rng)
        );
        Some(ModifyColumnPlan { sql, column })
    }

    pub fn apply_modify_column(&self, plan: ModifyColumnPlan) {
        let mut state = self.state();
        if let Some(slot) = state.columns.iter_mut().find(|c| c.name == plan.column.name) {
            *slot = plan.column;
        }
    }

    /// Plans RENAME COLUMN, toggling the `_rename` suffix.
    pub fn plan_rename_column(&self, ctx: &mut GenContext, env: &RunEnv) -> RenamePlan {
        let state = self.state();
        let from = state.columns[ctx.rng.int(state.columns.len() as i64 - 1) as usize]
            .name
            .clone();
        let to = toggle_rename(&from);
        let sql = format!(
            "ALTER TABLE {} RENAME COLUMN {from} To {to},{}",
            self.name,
            env.algorithm_lock_clause(&mut ctx.rng)
        );
        RenamePlan { sql, from, to }
    }

    pub fn apply_rename_column(&self, plan: &RenamePlan) {
        let mut state = self.state();
        if let Some(col) = state.columns.iter_mut().find(|c| c.name == plan.from) {
            col.name = plan.to.clone();
        }
        for index in &mut state.indexes {
            for key in &mut index.columns {
                if key.column == plan.from {
                    key.column = plan.to.clone();
                }
            }
        }
        // Generated expressions keep referencing the old name; the server
        // rewrites them itself, and the model only needs the reference for
        // drop cascades, which match by the current expression text.
    }

    /// Plans RENAME INDEX, or `None` when the table has no indexes.
    pub fn plan_rename_index(&self, ctx: &mut GenContext, env: &RunEnv) -> Option<RenamePlan> {
        let state = self.state();
        if state.indexes.is_empty() {
            return None;
        }
        let from = state.indexes[ctx.rng.int(state.indexes.len() as i64 - 1) as usize]
            .name
            .clone();
        let to = toggle_rename(&from);
        let sql = format!(
            "ALTER TABLE {} RENAME INDEX {from} To {to},{}",
            self.name,
            env.algorithm_lock_clause(&mut ctx.rng)
        );
        Some(RenamePlan { sql, from, to })
    }

    pub fn apply_rename_index(&self, plan: &RenamePlan) {
        let mut state = self.state();
        if let Some(index) = state.indexes.iter_mut().find(|i| i.name == plan.from) {
            index.name = plan.to.clone();
        }
    }

    // -- Index DDL -----------------------------------------------------------

    /// Plans ADD INDEX over a random column subset.
    pub fn plan_add_index(&self, ctx: &mut GenContext, env: &RunEnv) -> AddIndexPlan {
        let state = self.state();
        let mut index = Index::new(format!("{}{}", self.name, ctx.rng.int(1000)));

        let max_key_parts = ctx.opts.get_int(Opt::IndexColumns).max(1);
        let parts = ctx
            .rng
            .int_in(max_key_parts.min(state.columns.len() as i64), 1);
        let mut picked: Vec<usize> = Vec::new();
        let mut tries = 0;
        while (picked.len() as i64) < parts && tries < 10_000 {
            tries += 1;
            let at = ctx.rng.int(state.columns.len() as i64 - 1) as usize;
            if !picked.contains(&at) {
                picked.push(at);
            }
        }
        let no_desc = ctx.opts.get_bool(Opt::NoDescIndex);
        let desc_prob = ctx.opts.get_int(Opt::DescIndexProb);
        for at in picked {
            let col = &state.columns[at];
            index.columns.push(IndexColumn {
                column: col.name.clone(),
                desc: !no_desc && ctx.rng.int(100) < desc_prob,
                prefix: col
                    .value_tag()
                    .is_lob()
                    .then(|| ctx.rng.int_in(env.max_column_length, 1) as u32),
            });
        }
        if ctx.rng.int(1000) <= ctx.opts.get_int(Opt::UniqueIndexProbK) {
            index.unique = true;
        }
        let sql = format!(
            "ALTER TABLE {} ADD {},{}",
            self.name,
            index.definition(),
            env.algorithm_lock_clause(&mut ctx.rng)
        );
        AddIndexPlan { sql, index }
    }

    pub fn apply_add_index(&self, plan: AddIndexPlan) {
        let mut state = self.state();
        if !state.indexes.iter().any(|i| i.name == plan.index.name) {
            state.indexes.push(plan.index);
        }
    }

    /// Plans DROP INDEX, or `None` when the table has no indexes.
    pub fn plan_drop_index(&self, ctx: &mut GenContext, env: &RunEnv) -> Option<DropIndexPlan> {
        let state = self.state();
        if state.indexes.is_empty() {
            return None;
        }
        let index = state.indexes[ctx.rng.int(state.indexes.len() as i64 - 1) as usize]
            .name
            .clone();
        let sql = format!(
            "ALTER TABLE {} DROP INDEX {index},{}",
            self.name,
            env.algorithm_lock_clause(&mut ctx.rng)
        );
        Some(DropIndexPlan { sql, index })
    }

    pub fn apply_drop_index(&self, plan: &DropIndexPlan) {
        let mut state = self.state();
        state.indexes.retain(|i| i.name != plan.index);
    }

    // -- Table attributes ----------------------------------------------------

    /// Plans ALTER TABLE ENCRYPTION with a random permitted mode.
    pub fn plan_set_encryption(&self, ctx: &mut GenContext, env: &RunEnv) -> Option<SetAttrPlan> {
        if env.encryption_modes.is_empty() {
            return None;
        }
        let value =
            env.encryption_modes[ctx.rng.int(env.encryption_modes.len() as i64 - 1) as usize].clone();
        let sql = format!("ALTER TABLE {} ENCRYPTION = '{value}'", self.name);
        Some(SetAttrPlan { sql, value })
    }

    pub fn apply_set_encryption(&self, plan: &SetAttrPlan) {
        self.state().encryption = plan.value.clone();
    }

    /// Plans ALTER TABLE COMPRESSION with a random permitted codec.
    pub fn plan_set_compression(&self, ctx: &mut GenContext, env: &RunEnv) -> Option<SetAttrPlan> {
        if env.compressions.is_empty() {
            return None;
        }
        let value =
            env.compressions[ctx.rng.int(env.compressions.len() as i64 - 1) as usize].clone();
        let sql = format!("ALTER TABLE {} COMPRESSION= '{value}'", self.name);
        Some(SetAttrPlan { sql, value })
    }

    pub fn apply_set_compression(&self, plan: &SetAttrPlan) {
        self.state().compression = plan.value.clone();
    }

    /// Toggles the stored encryption mode between Y and N, used after a
    /// DROP/CREATE retry succeeded with the flipped mode.
    pub fn flip_encryption(&self) {
        let mut state = self.state();
        state.encryption = match state.encryption.as_str() {
            "Y" => "N".to_string(),
            "N" => "Y".to_string(),
            other => other.to_string(),
        };
    }

    // -- Maintenance statement targets ----------------------------------------

    /// TRUNCATE TABLE, or with 99% probability on partitioned tables a
    /// single-partition truncate.
    pub fn truncate_sql(&self, ctx: &mut GenContext, env: &RunEnv) -> String {
        let state = self.state();
        if let TableVariant::Partition(layout) = &state.variant {
            if ctx.rng.int(100) > 1 {
                if let Some(partition) = layout.random_partition_name(ctx) {
                    return format!(
                        "ALTER TABLE {}{}, TRUNCATE PARTITION {partition}",
                        self.name,
                        env.algorithm_lock_clause(&mut ctx.rng)
                    );
                }
            }
        }
        format!("TRUNCATE TABLE {}", self.name)
    }

    /// OPTIMIZE/ANALYZE/CHECK, scoped to one partition in a quarter of the
    /// calls on partitioned tables.
    pub fn maintenance_sql(&self, verb: &str, ctx: &mut GenContext) -> String {
        let state = self.state();
        if let TableVariant::Partition(layout) = &state.variant {
            if ctx.rng.int(4) == 1 {
                if let Some(partition) = layout.random_partition_name(ctx) {
                    let verb = verb.to_ascii_uppercase();
                    return format!("ALTER TABLE {} {verb} PARTITION {partition}", self.name);
                }
            }
        }
        format!("{} TABLE {}", verb.to_ascii_uppercase(), self.name)
    }
}

/// The inline FOREIGN KEY clause of a child table. The parent is the first
/// two `_`-separated segments of the child's name.
pub fn fk_constraint_sql(child: &str, on_update: FkAction, on_delete: FkAction) -> String {
    let parent: String = child.split('_').take(2).collect::<Vec<_>>().join("_");
    format!(
        " FOREIGN KEY (ifk_col) REFERENCES {parent} (ipkey) ON UPDATE {} ON DELETE {}",
        on_update.as_str(),
        on_delete.as_str()
    )
}

fn tablespace_key_block_size(tablespace: &str, env: &RunEnv) -> i64 {
    if env.probe.innodb_page_size > crate::env::INNODB_16K_PAGE_SIZE
        || tablespace == "innodb_system"
    {
        return 0;
    }
    let size: i64 = tablespace
        .get(3..5)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    if size == env.probe.innodb_page_size { 0 } else { size }
}

// ---------------------------------------------------------------------------
// Random column construction
// ---------------------------------------------------------------------------

/// Draws a column type for CREATE TABLE with the 24-slot weight table,
/// honoring the per-type disables. Falls back to INT if every type has been
/// disabled.
fn random_column_tag(ctx: &mut GenContext) -> TypeTag {
    for _ in 0..1000 {
        let prob = ctx.rng.int(23);
        let opts = &ctx.opts;
        let tag = if !opts.get_bool(Opt::NoInt) && prob < 5 {
            TypeTag::Int
        } else if !opts.get_bool(Opt::NoInteger) && prob < 6 {
            TypeTag::Integer
        } else if !opts.get_bool(Opt::NoFloat) && prob < 8 {
            TypeTag::Float
        } else if !opts.get_bool(Opt::NoDouble) && prob < 10 {
            TypeTag::Double
        } else if !opts.get_bool(Opt::NoVarchar) && prob < 14 {
            TypeTag::Varchar
        } else if !opts.get_bool(Opt::NoChar) && prob < 16 {
            TypeTag::Char
        } else if !opts.get_bool(Opt::NoText) && prob == 17 {
            TypeTag::Text
        } else if !opts.get_bool(Opt::NoBlob) && prob == 18 {
            TypeTag::Blob
        } else if !opts.get_bool(Opt::NoBool) && prob == 19 {
            TypeTag::Bool
        } else if prob == 20 && !opts.get_bool(Opt::NoDate) {
            TypeTag::Date
        } else if prob == 21 && !opts.get_bool(Opt::NoDatetime) {
            TypeTag::DateTime
        } else if prob == 22 && !opts.get_bool(Opt::NoTimestamp) {
            TypeTag::Timestamp
        } else if prob == 23 && !opts.get_bool(Opt::NoBit) {
            TypeTag::Bit
        } else {
            continue;
        };
        return tag;
    }
    TypeTag::Int
}

/// Column type draw for ALTER TABLE ADD COLUMN; generated columns come with
/// a 1-in-24 weight here rather than the tail-heavy CREATE TABLE rule.
fn random_added_column_tag(allow_generated: bool, ctx: &mut GenContext) -> TypeTag {
    if allow_generated && ctx.rng.int(23) == 1 {
        return TypeTag::Generated;
    }
    random_column_tag(ctx)
}

/// Builds a typed column with the type-prefixed name and type-specific
/// length rules.
fn random_typed_column(id: &str, tag: TypeTag, ctx: &mut GenContext, env: &RunEnv) -> Column {
    match tag {
        TypeTag::Blob => return random_lob_column(id, TypeTag::Blob, ctx),
        TypeTag::Text => return random_lob_column(id, TypeTag::Text, ctx),
        _ => {}
    }
    let prefix = match tag {
        TypeTag::Int | TypeTag::Integer => "i",
        TypeTag::Char => "c",
        TypeTag::Varchar => "v",
        TypeTag::Float => "f",
        TypeTag::Double => "d",
        TypeTag::Bool => "t",
        TypeTag::Date => "dt",
        TypeTag::DateTime => "dtm",
        TypeTag::Timestamp => "ts",
        TypeTag::Bit => "bt",
        TypeTag::Blob | TypeTag::Text | TypeTag::Generated => unreachable!(),
    };
    let mut col = Column::plain(format!("{prefix}{id}"), tag);
    match tag {
        TypeTag::Char | TypeTag::Varchar => col.length = ctx.rng.int_in(env.max_column_length, 5),
        TypeTag::Int | TypeTag::Integer => {
            if ctx.rng.int(10) == 1 {
                col.length = ctx.rng.int_in(100, 20);
            }
        }
        TypeTag::Bit => col.length = ctx.rng.int_in(64, 5),
        _ => {}
    }
    col
}

/// Builds a BLOB or TEXT column with a random TINY/plain/MEDIUM/LONG
/// sub-type; half of them are compressed when column compression is on.
fn random_lob_column(id: &str, tag: TypeTag, ctx: &mut GenContext) -> Column {
    let text = tag == TypeTag::Text;
    let (sub_type, prefix, length) = match ctx.rng.int_in(4, 1) {
        1 => (
            if text { "TINYTEXT" } else { "TINYBLOB" },
            if text { "t" } else { "tb" },
            ctx.rng.int_in(255, 100),
        ),
        2 => (
            if text { "TEXT" } else { "BLOB" },
            if text { "t" } else { "b" },
            if text { ctx.rng.int_in(1000, 500) } else { ctx.rng.int_in(1000, 100) },
        ),
        3 => (
            if text { "MEDIUMTEXT" } else { "MEDIUMBLOB" },
            if text { "mt" } else { "mb" },
            ctx.rng.int_in(3000, 1000),
        ),
        _ => (
            if text { "LONGTEXT" } else { "LONGBLOB" },
            if text { "lt" } else { "lb" },
            if text { ctx.rng.int_in(4000, 2000) } else { ctx.rng.int_in(4000, 100) },
        ),
    };
    let mut col = Column::plain(format!("{prefix}{id}"), tag);
    col.sub_type = Some(sub_type.to_string());
    col.length = length;
    if !ctx.opts.get_bool(Opt::NoColumnCompression) && ctx.rng.int(1) == 1 {
        col.compressed = true;
    }
    col
}

/// Builds a generated column over the existing columns, or `None` when no
/// eligible base column exists.
fn random_generated_column(
    id: &str,
    existing: &[Column],
    ctx: &mut GenContext,
    env: &RunEnv,
) -> Option<Column> {
    let eligible: Vec<usize> = existing
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.auto_increment && c.tag != TypeTag::Generated)
        .map(|(i, _)| i)
        .collect();
    if eligible.is_empty() {
        return None;
    }

    // Resulting type distribution 4:2:2:1:1 (INT:VARCHAR:CHAR:BLOB:TEXT).
    let mut inner = None;
    for _ in 0..1000 {
        let x = ctx.rng.int_in(10, 1);
        inner = if x <= 4 && !ctx.opts.get_bool(Opt::NoInt) {
            Some(TypeTag::Int)
        } else if x <= 6 && !ctx.opts.get_bool(Opt::NoVarchar) {
            Some(TypeTag::Varchar)
        } else if x <= 8 && !ctx.opts.get_bool(Opt::NoChar) {
            Some(TypeTag::Char)
        } else if x == 9 && !ctx.opts.get_bool(Opt::NoBlob) {
            Some(TypeTag::Blob)
        } else if x == 10 && !ctx.opts.get_bool(Opt::NoText) {
            Some(TypeTag::Text)
        } else {
            continue;
        };
        break;
    }
    let inner = inner?;

    let mut col = Column::plain(format!("g{id}"), TypeTag::Generated);
    col.generated_tag = Some(inner);
    if !ctx.opts.get_bool(Opt::NoColumnCompression) && ctx.rng.int(1) == 1 && inner.is_lob() {
        col.compressed = true;
    }

    let mut base_count = (ctx.rng.int((existing.len() as f64 * 0.6) as i64) + 1) as usize;
    if base_count > 4 {
        base_count = 2;
    }
    let bases: Vec<&Column> = (0..base_count)
        .map(|_| &existing[eligible[ctx.rng.int(eligible.len() as i64 - 1) as usize]])
        .collect();

    let mut expr;
    if inner == TypeTag::Int {
        let mut terms = Vec::with_capacity(bases.len());
        for base in &bases {
            let term = match base.tag {
                TypeTag::Varchar | TypeTag::Char | TypeTag::Blob | TypeTag::Text | TypeTag::Bit => {
                    format!(" LENGTH({})", base.name)
                }
                TypeTag::Int | TypeTag::Integer | TypeTag::Bool | TypeTag::Float | TypeTag::Double => {
                    if ctx.rng.int(2) == 1 {
                        format!(" ({}-100)", base.name)
                    } else {
                        format!(" {}", base.name)
                    }
                }
                TypeTag::Date | TypeTag::DateTime | TypeTag::Timestamp => {
                    format!(" DATEDIFF('{}',{})", ctx.rng.date(), base.name)
                }
                TypeTag::Generated => unreachable!("generated columns are never base columns"),
            };
            terms.push(term);
        }
        expr = format!(" INT GENERATED ALWAYS AS ({})", terms.join("+"));
    } else {
        let target_length = if inner.is_lob() {
            ctx.rng.int_in(5000, 5)
        } else {
            ctx.rng.int_in(env.max_column_length, 10)
        };
        let max_piece = ((target_length / bases.len() as i64) * 2).max(2);
        let mut actual = 0;
        let mut pieces = Vec::with_capacity(bases.len());
        for base in &bases {
            let width = match base.tag {
                TypeTag::Int | TypeTag::Integer | TypeTag::Float | TypeTag::Double => 10,
                TypeTag::Date | TypeTag::DateTime | TypeTag::Timestamp => 19,
                TypeTag::Bool => 2,
                TypeTag::Varchar | TypeTag::Char | TypeTag::Blob | TypeTag::Text | TypeTag::Bit => {
                    base.length
                }
                TypeTag::Generated => unreachable!("generated columns are never base columns"),
            };
            let piece = ctx.rng.int_in(max_piece, 2);
            if width > piece {
                actual += piece;
                if base.tag == TypeTag::Bit {
                    pieces.push(format!(
                        "lpad(bin({} >> ({width} - {piece})),{piece},'0')",
                        base.name
                    ));
                } else {
                    pieces.push(format!("SUBSTRING({},1,{piece})", base.name));
                }
            } else {
                actual += width;
                if base.tag == TypeTag::Bit {
                    pieces.push(format!("lpad(bin({}),{width},'0')", base.name));
                } else {
                    pieces.push(base.name.clone());
                }
            }
        }
        expr = format!(" {}", inner.as_str());
        if matches!(inner, TypeTag::Varchar | TypeTag::Char) {
            expr.push_str(&format!("({})", actual.max(2)));
        }
        expr.push_str(&format!(" GENERATED ALWAYS AS (CONCAT({}))", pieces.join(",")));
        col.length = actual.max(2);
    }

    if ctx.rng.int(2) == 1 || col.compressed || env.secondary_engine.is_some() {
        expr.push_str(" STORED");
    }
    col.generated_expr = Some(expr);
    Some(col)
}

/// Builds the column list of a new table.
fn random_columns(
    kind: TableKind,
    list_partitioned: bool,
    ctx: &mut GenContext,
    env: &RunEnv,
) -> Vec<Column> {
    let mut columns: Vec<Column> = Vec::new();

    if kind == TableKind::Fk {
        columns.push(random_typed_column("fk_col", TypeTag::Integer, ctx, env));
    }
    if kind == TableKind::Partition {
        // LIST partitions key on small integers so values stay inside the
        // finite membership domain.
        let tag = if list_partitioned { TypeTag::Integer } else { TypeTag::Int };
        let mut col = random_typed_column("p_col", tag, ctx, env);
        col.nullable = false;
        columns.push(col);
    }

    let max_columns = if ctx.opts.get_bool(Opt::ExactColumns) {
        ctx.opts.get_int(Opt::Columns)
    } else {
        ctx.rng.int_in(ctx.opts.get_int(Opt::Columns), 1)
    };

    let no_auto_inc = ctx.opts.get_bool(Opt::NoAutoInc);
    let mut has_auto_increment = false;
    let mut not_secondary_left =
        (ctx.opts.get_int(Opt::NotSecondary) * max_columns) / 100;

    for i in 0..max_columns {
        if i == 0 && ctx.rng.int_in(100, 1) <= ctx.opts.get_int(Opt::PrimaryKeyProb) {
            let mut col = random_typed_column("pkey", TypeTag::Int, ctx, env);
            col.length = 0;
            col.primary_key = true;
            if ctx.rng.int(100) < ctx.opts.get_int(Opt::PkColumnAutoinc) {
                col.auto_increment = true;
                has_auto_increment = true;
            }
            columns.push(col);
            continue;
        }

        let id = i.to_string();
        let generated_zone = !ctx.opts.get_bool(Opt::NoVirtualColumns)
            && (i as f64) >= 0.8 * max_columns as f64
            && ctx.rng.int(1) == 1;
        let mut col = if generated_zone {
            match random_generated_column(&id, &columns, ctx, env) {
                Some(col) => col,
                None => random_typed_column(&id, random_column_tag(ctx), ctx, env),
            }
        } else {
            random_typed_column(&id, random_column_tag(ctx), ctx, env)
        };

        // A quarter of eligible INT columns take the auto-increment slot.
        if col.tag == TypeTag::Int && !no_auto_inc && !has_auto_increment && ctx.rng.int(100) > 25 {
            col.auto_increment = true;
            has_auto_increment = true;
        }
        if not_secondary_left > 0 {
            col.not_secondary = true;
            not_secondary_left -= 1;
        }
        if ctx.rng.int_in(100, 1) < 30 && col.tag != TypeTag::Generated && kind != TableKind::Fk {
            col.nullable = false;
        }
        columns.push(col);
    }
    columns
}

/// Builds the index list of a new table and picks which index leads with the
/// auto-increment column. Compressed columns never join an index.
fn random_indexes(
    table_name: &str,
    columns: &[Column],
    ctx: &mut GenContext,
    env: &RunEnv,
) -> (Vec<Index>, usize) {
    let max_indexes = ctx.opts.get_int(Opt::Indexes);
    if max_indexes == 0 || columns.is_empty() {
        return (Vec::new(), 0);
    }
    let mut count = ctx
        .rng
        .int_in(max_indexes.min(columns.len() as i64), 1);
    if ctx.opts.get_bool(Opt::ExactIndexes) {
        count = max_indexes;
    }

    let auto_inc_pos = columns.iter().position(|c| c.auto_increment);
    let auto_inc_index = ctx.rng.int(count - 1) as usize;

    let usable: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.compressed)
        .map(|(i, _)| i)
        .collect();
    if usable.is_empty() {
        return (Vec::new(), 0);
    }

    let max_key_parts = ctx.opts.get_int(Opt::IndexColumns).max(1);
    let no_desc = ctx.opts.get_bool(Opt::NoDescIndex);
    let desc_prob = ctx.opts.get_int(Opt::DescIndexProb);
    let unique_prob = ctx.opts.get_int(Opt::UniqueIndexProbK);

    let mut indexes = Vec::with_capacity(count as usize);
    for i in 0..count {
        let mut index = Index::new(format!("{table_name}i{i}"));
        let parts = ctx.rng.int_in(max_key_parts.min(usable.len() as i64), 1);

        let mut picked: Vec<usize> = Vec::new();
        if let Some(pos) = auto_inc_pos {
            if i as usize == auto_inc_index {
                picked.push(pos);
            }
        }
        let mut tries = 0;
        while (picked.len() as i64) < parts && tries < 10_000 {
            tries += 1;
            let at = usable[ctx.rng.int(usable.len() as i64 - 1) as usize];
            if !picked.contains(&at) {
                picked.push(at);
            }
        }

        let has_int = picked.iter().any(|&at| columns[at].tag == TypeTag::Int);
        if has_int && ctx.rng.int(1000) < unique_prob {
            index.unique = true;
        }

        for at in picked {
            let col = &columns[at];
            index.columns.push(IndexColumn {
                column: col.name.clone(),
                desc: !no_desc && ctx.rng.int(100) < desc_prob,
                prefix: col
                    .value_tag()
                    .is_lob()
                    .then(|| ctx.rng.int_in(env.max_column_length, 1) as u32),
            });
        }
        indexes.push(index);
    }
    (indexes, auto_inc_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{table_with, test_context};
    use pretty_assertions::assert_eq;

    fn invariants(state: &TableState) {
        let auto_inc = state.columns.iter().filter(|c| c.auto_increment).count();
        assert!(auto_inc <= 1, "more than one auto-increment column");
        let pk = state.columns.iter().filter(|c| c.primary_key).count();
        assert!(pk <= 1, "more than one primary-key column");
        let mut names: Vec<&str> = state.columns.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.windows(2).for_each(|w| assert_ne!(w[0], w[1], "duplicate column name"));
        let mut index_names: Vec<&str> = state.indexes.iter().map(|i| i.name.as_str()).collect();
        index_names.sort_unstable();
        index_names
            .windows(2)
            .for_each(|w| assert_ne!(w[0], w[1], "duplicate index name"));
        for index in &state.indexes {
            for key in &index.columns {
                let col = state
                    .column(&key.column)
                    .unwrap_or_else(|| panic!("index {} references ghost column {}", index.name, key.column));
                if col.value_tag().is_lob() {
                    let prefix = key.prefix.expect("lob key without prefix length");
                    assert!((1..=30).contains(&prefix));
                }
            }
        }
    }

    #[test]
    fn random_tables_hold_invariants() {
        let (mut ctx, env) = test_context(61);
        for id in 1..40 {
            for kind in [TableKind::Normal, TableKind::Partition, TableKind::Fk, TableKind::Temporary] {
                let table = Table::random(kind, id, false, &mut ctx, &env);
                invariants(&table.state());
            }
        }
    }

    #[test]
    fn create_sql_option_order() {
        let (mut ctx, env) = test_context(67);
        let table = table_with(|state| {
            state.encryption = "Y".into();
            state.compression = "zlib".into();
            state.row_format = "DYNAMIC".into();
        });
        let sql = table.create_sql(true, true, &mut ctx, &env);
        let enc = sql.find("ENCRYPTION=").expect("encryption emitted");
        let comp = sql.find("COMPRESSION=").expect("compression emitted");
        let rf = sql.find("ROW_FORMAT=").expect("row format emitted");
        let engine = sql.find("ENGINE=").expect("engine emitted");
        assert!(enc < comp && comp < rf && rf < engine, "bad option order: {sql}");
    }

    #[test]
    fn fk_parent_is_first_two_segments() {
        let sql = fk_constraint_sql("tt_3_fk", FkAction::Cascade, FkAction::SetNull);
        assert!(sql.contains("REFERENCES tt_3 (ipkey)"), "{sql}");
        assert!(sql.contains("ON UPDATE CASCADE"));
        assert!(sql.contains("ON DELETE SET NULL"));

        let sql = fk_constraint_sql("tt_5_901283_fk", FkAction::Restrict, FkAction::NoAction);
        assert!(sql.contains("REFERENCES tt_5 (ipkey)"), "{sql}");
    }

    #[test]
    fn drop_column_cascades_into_indexes() {
        let table = table_with(|_| {});
        let plan = DropColumnPlan {
            sql: String::new(),
            column: "v1".into(),
            dependents: Vec::new(),
        };
        table.apply_drop_column(&plan);
        let state = table.state();
        assert!(state.column("v1").is_none());
        // The index that held only v1 is gone; the mixed index lost the key.
        assert!(state.indexes.iter().all(|i| !i.references("v1")));
        assert!(state.indexes.iter().any(|i| i.references("ipkey")));
        invariants(&state);
    }

    #[test]
    fn drop_column_takes_dependent_generated_columns() {
        let (mut ctx, env) = test_context(71);
        let table = table_with(|state| {
            let mut r#gen = Column::plain("g9", TypeTag::Generated);
            r#gen.generated_expr = Some(" INT GENERATED ALWAYS AS ( i2+1) STORED".into());
            r#gen.generated_tag = Some(TypeTag::Int);
            state.columns.push(r#gen);
        });
        // Plan repeatedly until the draw lands on i2.
        let mut found = false;
        for _ in 0..500 {
            if let Some(plan) = table.plan_drop_column(&mut ctx, &env) {
                if plan.column == "i2" {
                    assert_eq!(plan.dependents, vec!["g9".to_string()]);
                    assert!(plan.sql.contains("DROP COLUMN g9,"));
                    table.apply_drop_column(&plan);
                    found = true;
                    break;
                }
            }
        }
        assert!(found, "never drew the base column");
        let state = table.state();
        assert!(state.column("i2").is_none());
        assert!(state.column("g9").is_none());
    }

    #[test]
    fn never_drops_last_column() {
        let (mut ctx, env) = test_context(73);
        let table = table_with(|state| {
            state.columns.truncate(1);
            state.indexes.clear();
        });
        for _ in 0..50 {
            assert!(table.plan_drop_column(&mut ctx, &env).is_none());
        }
    }

    #[test]
    fn rename_column_is_involution() {
        let (mut ctx, env) = test_context(79);
        let table = table_with(|_| {});
        let before = table.state().clone();
        let plan = table.plan_rename_column(&mut ctx, &env);
        table.apply_rename_column(&plan);
        let back = RenamePlan {
            sql: String::new(),
            from: plan.to.clone(),
            to: toggle_rename(&plan.to),
        };
        assert_eq!(back.to, plan.from);
        table.apply_rename_column(&back);
        assert_eq!(*table.state(), before);
    }

    #[test]
    fn rename_index_is_involution() {
        let (mut ctx, env) = test_context(83);
        let table = table_with(|_| {});
        let before = table.state().clone();
        let plan = table.plan_rename_index(&mut ctx, &env).expect("has indexes");
        table.apply_rename_index(&plan);
        let back = RenamePlan {
            sql: String::new(),
            from: plan.to.clone(),
            to: toggle_rename(&plan.to),
        };
        table.apply_rename_index(&back);
        assert_eq!(*table.state(), before);
    }

    #[test]
    fn rename_column_updates_index_references() {
        let (mut ctx, env) = test_context(89);
        let table = table_with(|_| {});
        loop {
            let plan = table.plan_rename_column(&mut ctx, &env);
            if plan.from == "ipkey" {
                table.apply_rename_column(&plan);
                break;
            }
        }
        let state = table.state();
        assert!(state.indexes.iter().any(|i| i.references("ipkey_rename")));
        assert!(state.indexes.iter().all(|i| !i.references("ipkey")));
    }

    #[test]
    fn modify_column_plan_leaves_model_until_applied() {
        let (mut ctx, env) = test_context(97);
        let table = table_with(|_| {});
        let before = table.state().clone();
        let plan = table.plan_modify_column(&mut ctx, &env).expect("eligible column");
        assert_eq!(*table.state(), before, "planning must not mutate");
        table.apply_modify_column(plan);
    }

    #[test]
    fn truncate_names_existing_partition() {
        let (mut ctx, env) = test_context(101);
        let table = table_with(|state| {
            state.variant = TableVariant::Partition(PartitionLayout {
                strategy: PartitionStrategy::Range,
                count: 2,
                ranges: vec![
                    crate::partition::RangeBound { name: "p0".into(), upper: 10 },
                    crate::partition::RangeBound { name: "p1".into(), upper: 20 },
                ],
                lists: Vec::new(),
                pool: Vec::new(),
            });
        });
        for _ in 0..100 {
            let sql = table.truncate_sql(&mut ctx, &env);
            if let Some(at) = sql.find("TRUNCATE PARTITION ") {
                let name = &sql[at + "TRUNCATE PARTITION ".len()..];
                assert!(name == "p0" || name == "p1", "unknown partition {name}");
            } else {
                assert!(sql.starts_with("TRUNCATE TABLE "));
            }
        }
    }

    #[test]
    fn add_index_prefixes_lob_keys() {
        let (mut ctx, env) = test_context(103);
        let table = table_with(|state| {
            let mut lob = Column::plain("b7", TypeTag::Blob);
            lob.sub_type = Some("BLOB".into());
            lob.length = 500;
            state.columns.push(lob);
        });
        for _ in 0..100 {
            let plan = table.plan_add_index(&mut ctx, &env);
            for key in &plan.index.columns {
                if key.column == "b7" {
                    let prefix = key.prefix.expect("blob key needs a prefix");
                    assert!((1..=30).contains(&prefix));
                }
            }
        }
    }

    #[test]
    fn variant_serde_tags() {
        let variant = TableVariant::Fk {
            on_update: FkAction::SetNull,
            on_delete: FkAction::Cascade,
        };
        let json = serde_json::to_string(&variant).unwrap();
        assert!(json.contains(r#""variant":"FK""#), "{json}");
        assert!(json.contains(r#""on_update":"SET NULL""#), "{json}");
        let back: TableVariant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, variant);
    }
}
