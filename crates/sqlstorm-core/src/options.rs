//! The option registry.
//!
//! Every tunable of the engine is declared once in the [`define_options!`]
//! table below: tag, kind, long CLI name, default, help text, and
//! classification flags. The registry is the single source of truth for CLI
//! generation, the workload-operation probability table, and the per-option
//! success counters.
//!
//! Values are mutated only during startup (CLI application, probability
//! file, feature disables). Once workers are running the registry is shared
//! behind an `Arc` and only the atomic counters change.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CoreError, Result};

/// The kind of value an option carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Bool,
    Int,
    Str,
}

/// An option's current value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

// ---------------------------------------------------------------------------
// Macro: declares the Opt enum plus all per-option metadata in one table.
// Flags: `sql` marks an option that produces SQL (its int value is the
// workload weight); `ddl` additionally marks it as schema-mutating.
// ---------------------------------------------------------------------------
macro_rules! define_options {
    (
        $( ($variant:ident, $kind:ident, $name:literal, $default:expr, $help:literal $(, $flag:ident)*) ),+ $(,)?
    ) => {
        /// Tag for every registered option.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opt {
            $( $variant, )+
        }

        /// Number of registered options.
        pub const OPTION_COUNT: usize = Opt::ALL.len();

        impl Opt {
            /// Every option, in declaration order.
            pub const ALL: &'static [Opt] = &[ $( Opt::$variant, )+ ];

            /// The long CLI name (kebab-case, no leading dashes).
            pub fn name(self) -> &'static str {
                match self { $( Opt::$variant => $name, )+ }
            }

            /// One-line help text.
            pub fn help(self) -> &'static str {
                match self { $( Opt::$variant => $help, )+ }
            }

            /// The kind of value this option carries.
            pub fn kind(self) -> OptionKind {
                match self { $( Opt::$variant => OptionKind::$kind, )+ }
            }

            /// Returns `true` if this option produces SQL (weighted).
            pub fn is_sql(self) -> bool {
                match self {
                    $( Opt::$variant => {
                        const FLAGS: &[&str] = &[ $( stringify!($flag), )* ];
                        FLAGS.contains(&"sql")
                    } )+
                }
            }

            /// Returns `true` if this option produces schema-mutating SQL.
            pub fn is_ddl(self) -> bool {
                match self {
                    $( Opt::$variant => {
                        const FLAGS: &[&str] = &[ $( stringify!($flag), )* ];
                        FLAGS.contains(&"ddl")
                    } )+
                }
            }

            fn default_value(self) -> OptionValue {
                match self { $( Opt::$variant => OptionValue::$kind(($default).into()), )+ }
            }

            /// Resolves a long name back to its tag.
            pub fn from_name(name: &str) -> Option<Opt> {
                Opt::ALL.iter().copied().find(|o| o.name() == name)
            }
        }
    };
}

define_options! {
    // ===== Scale =====
    (InitialSeed, Int, "initial-seed", 42, "Initial random seed; each step adds the step number"),
    (Step, Int, "step", 1, "Step number of this invocation; steps share state via the checkpoint"),
    (Tables, Int, "tables", 10, "Number of initial tables"),
    (Columns, Int, "columns", 7, "Maximum columns per table"),
    (Indexes, Int, "indexes", 4, "Maximum indexes per table"),
    (IndexColumns, Int, "index-columns", 2, "Maximum columns per index"),
    (InitialRecords, Int, "initial-records-in-table", 1000, "Target row count for the bulk load of each table"),
    (UniqueRange, Int, "unique-range", 5, "Multiplier bounding the domain of pre-generated unique integers"),
    (GeneralTablespaces, Int, "number-of-general-tablespace", 1, "Number of extra general tablespaces"),
    (UndoTablespaces, Int, "number-of-undo-tablespace", 2, "Number of undo tablespaces"),
    (MaxPartitions, Int, "max-partitions", 25, "Maximum partitions per partitioned table (1..=8192)"),
    (Threads, Int, "threads", 10, "Worker threads per endpoint"),
    (Seconds, Int, "seconds", 60, "Wall-clock seconds of random workload"),

    // ===== Probabilities =====
    (PrimaryKeyProb, Int, "primary-key", 50, "Probability (of 100) that a table's first column is an INT primary key"),
    (PkColumnAutoinc, Int, "pk-column-autoinc", 50, "Probability (of 100) that the primary key column is AUTO_INCREMENT"),
    (UniqueIndexProbK, Int, "unique-index-prob-k", 1, "Probability (of 1000) that an index is UNIQUE"),
    (FkProb, Int, "fk-prob", 10, "Probability (of 100) of creating a foreign-key child per table"),
    (PartitionProb, Int, "partition-prob", 10, "Probability (of 100) of creating a partitioned sibling per table"),
    (TemporaryProb, Int, "temporary-prob", 10, "Divisor for per-session temporary table count"),
    (NullProb, Int, "null-prob", 5, "Probability (of 1000) that a generated value is NULL"),
    (PositiveIntProb, Int, "positive-int-prob", 990, "Probability (of 1000) that a generated integer stays positive"),
    (UsingPkProb, Int, "using-pk-prob", 50, "Probability (of 100) that WHERE clauses target the primary key column"),
    (DescIndexProb, Int, "desc-index-prob", 34, "Probability (of 100) that an index key column is DESC"),
    (IgnoreDmlClause, Int, "ignore-dml-clause", 30, "Probability (of 100) of adding IGNORE to DML"),
    (TransactionProbK, Int, "transaction-prob-k", 2, "Probability (of 1000) of starting a transaction"),
    (TransactionsSize, Int, "transactions-size", 20, "Maximum statements per transaction"),
    (CommitProb, Int, "commit-prob", 90, "Probability (of 100) that a finished transaction commits rather than rolls back"),
    (SavepointProbK, Int, "savepoint-prob-k", 2, "Probability (of 1000) of creating a savepoint inside a transaction"),
    (NotSecondary, Int, "not-secondary", 0, "Percentage of columns declared NOT SECONDARY"),
    (DelayInSecondary, Int, "delay-in-secondary", 0, "Upper bound (ms) of the random post-GTID-lookup delay in the secondary"),

    // ===== Workload weights: DML =====
    (SelectAllRow, Int, "select-all-row", 80, "Weight of bulk SELECT", sql),
    (SelectRowUsingPkey, Int, "select-row-using-pkey", 800, "Weight of point SELECT", sql),
    (SelectForUpdate, Int, "select-for-update", 20, "Weight of point SELECT ... FOR UPDATE", sql),
    (SelectForUpdateBulk, Int, "select-for-update-bulk", 2, "Weight of bulk SELECT ... FOR UPDATE", sql),
    (InsertRandomRow, Int, "insert-random-row", 600, "Weight of single-row INSERT", sql),
    (UpdateRowUsingPkey, Int, "update-row-using-pkey", 200, "Weight of point UPDATE", sql),
    (UpdateAllRows, Int, "update-all-rows", 5, "Weight of bulk UPDATE", sql),
    (DeleteRowUsingPkey, Int, "delete-row-using-pkey", 150, "Weight of point DELETE", sql),
    (DeleteAllRows, Int, "delete-all-rows", 2, "Weight of bulk DELETE", sql),
    (CallFunction, Int, "call-function", 2, "Weight of create-and-call stored function", sql),
    (GrammarSql, Int, "grammar-sql", 0, "Weight of grammar-template SQL", sql),
    (SetGlobalVariable, Int, "set-global-variable", 0, "Weight of SET GLOBAL/SESSION server variable", sql),
    (ThrottleSleep, Int, "throttle-sleep", 0, "Weight of a no-op pause operation", sql),

    // ===== Workload weights: DDL =====
    (DropIndex, Int, "drop-index", 1, "Weight of ALTER TABLE DROP INDEX", sql, ddl),
    (AddIndex, Int, "add-index", 1, "Weight of ALTER TABLE ADD INDEX", sql, ddl),
    (DropColumn, Int, "drop-column", 1, "Weight of ALTER TABLE DROP COLUMN", sql, ddl),
    (AddColumn, Int, "add-column", 1, "Weight of ALTER TABLE ADD COLUMN", sql, ddl),
    (RenameColumn, Int, "rename-column", 1, "Weight of ALTER TABLE RENAME COLUMN", sql, ddl),
    (RenameIndex, Int, "rename-index", 1, "Weight of ALTER TABLE RENAME INDEX", sql, ddl),
    (AlterColumnModify, Int, "alter-column-modify", 1, "Weight of ALTER TABLE MODIFY COLUMN", sql, ddl),
    (Truncate, Int, "truncate", 1, "Weight of TRUNCATE TABLE / TRUNCATE PARTITION", sql, ddl),
    (DropCreate, Int, "drop-create", 1, "Weight of DROP TABLE followed by CREATE TABLE", sql, ddl),
    (Optimize, Int, "optimize", 1, "Weight of OPTIMIZE TABLE / OPTIMIZE PARTITION", sql, ddl),
    (Analyze, Int, "analyze", 1, "Weight of ANALYZE TABLE / ANALYZE PARTITION", sql, ddl),
    (CheckTable, Int, "check-table", 1, "Weight of CHECK TABLE / CHECK PARTITION", sql, ddl),
    (AddDropPartition, Int, "add-drop-partition", 1, "Weight of partition add/drop/coalesce/reorganize", sql, ddl),
    (AddNewTable, Int, "add-new-table", 1, "Weight of creating an additional table mid-run", sql, ddl),
    (AlterTableEncryption, Int, "alter-table-encryption", 1, "Weight of ALTER TABLE ENCRYPTION", sql, ddl),
    (AlterTableCompression, Int, "alter-table-compression", 1, "Weight of ALTER TABLE COMPRESSION", sql, ddl),
    (AlterDiscardTablespace, Int, "alter-discard-tablespace", 0, "Weight of ALTER TABLE DISCARD TABLESPACE", sql, ddl),
    (AlterTablespaceEncryption, Int, "alter-tablespace-encryption", 1, "Weight of ALTER TABLESPACE ENCRYPTION", sql, ddl),
    (AlterTablespaceRename, Int, "alter-tablespace-rename", 1, "Weight of ALTER TABLESPACE RENAME", sql, ddl),
    (AlterDatabaseEncryption, Int, "alter-database-encryption", 1, "Weight of ALTER DATABASE ENCRYPTION", sql, ddl),
    (AlterMasterKey, Int, "alter-master-key", 1, "Weight of ALTER INSTANCE ROTATE INNODB MASTER KEY", sql, ddl),
    (AlterEncryptionKey, Int, "alter-encryption-key", 1, "Weight of ALTER INSTANCE ROTATE INNODB SYSTEM KEY", sql, ddl),
    (RotateRedoLogKey, Int, "rotate-redo-log-key", 0, "Weight of SELECT rotate_system_key for the redo log", sql, ddl),
    (AlterInstanceReloadKeyring, Int, "alter-instance-reload-keyring", 1, "Weight of ALTER INSTANCE RELOAD KEYRING", sql, ddl),
    (AlterRedoLogging, Int, "alter-redo-logging", 1, "Weight of ALTER INSTANCE ENABLE/DISABLE INNODB REDO_LOG", sql, ddl),
    (UndoSql, Int, "undo-sql", 1, "Weight of CREATE/ALTER/DROP UNDO TABLESPACE", sql, ddl),
    (AlterSecondaryEngine, Int, "alter-secondary-engine", 0, "Weight of ALTER TABLE SECONDARY_ENGINE", sql, ddl),
    (ModifyColumnSecondaryEngine, Int, "modify-column-secondary-engine", 0, "Weight of toggling NOT SECONDARY on columns", sql, ddl),
    (EnforceMerge, Int, "enforce-merge", 0, "Weight of the secondary-engine rewrite_table PRAGMA", sql, ddl),
    (SecondaryGc, Int, "secondary-gc", 0, "Weight of the secondary-engine garbage-collect PRAGMA", sql, ddl),

    // ===== Class disables =====
    (NoDdl, Bool, "no-ddl", false, "Disable every DDL-producing operation"),
    (OnlyClDdl, Bool, "only-cl-ddl", false, "Keep only the DDL weights set on the command line"),
    (OnlyClSql, Bool, "only-cl-sql", false, "Keep only the SQL weights set on the command line"),
    (NoSelect, Bool, "no-select", false, "Disable all SELECT operations"),
    (NoInsert, Bool, "no-insert", false, "Disable all INSERT operations"),
    (NoUpdate, Bool, "no-update", false, "Disable all UPDATE operations"),
    (NoDelete, Bool, "no-delete", false, "Disable all DELETE operations"),
    (OnlySelect, Bool, "only-select", false, "Disable INSERT, UPDATE and DELETE"),
    (NoEncryption, Bool, "no-encryption", false, "Disable all encryption features"),
    (NoTableCompression, Bool, "no-table-compression", false, "Disable table compression"),
    (NoColumnCompression, Bool, "no-column-compression", false, "Disable the compressed-column format"),
    (NoTablespace, Bool, "no-tablespace", false, "Disable general tablespaces"),
    (NoTemporary, Bool, "no-temporary", false, "Do not create temporary tables"),
    (NoPartition, Bool, "no-partition", false, "Do not create partitioned tables"),
    (NoFk, Bool, "no-fk", false, "Do not create foreign-key child tables"),
    (NoFkCascade, Bool, "no-fk-cascade", false, "Never pick CASCADE as a foreign-key action"),
    (OnlyTemporary, Bool, "only-temporary", false, "Create only temporary tables"),
    (OnlyPartition, Bool, "only-partition", false, "Create only partitioned tables"),
    (NoAutoInc, Bool, "no-auto-inc", false, "Do not create AUTO_INCREMENT columns"),
    (NoDescIndex, Bool, "no-desc-index", false, "Do not create descending index keys"),
    (NoVirtualColumns, Bool, "no-virtual-columns", false, "Do not create generated columns"),
    (NoInt, Bool, "no-int", false, "Remove INT from the column type pool"),
    (NoInteger, Bool, "no-integer", false, "Remove INTEGER from the column type pool"),
    (NoFloat, Bool, "no-float", false, "Remove FLOAT from the column type pool"),
    (NoDouble, Bool, "no-double", false, "Remove DOUBLE from the column type pool"),
    (NoChar, Bool, "no-char", false, "Remove CHAR from the column type pool"),
    (NoVarchar, Bool, "no-varchar", false, "Remove VARCHAR from the column type pool"),
    (NoText, Bool, "no-text", false, "Remove TEXT from the column type pool"),
    (NoBlob, Bool, "no-blob", false, "Remove BLOB from the column type pool"),
    (NoBool, Bool, "no-bool", false, "Remove BOOL from the column type pool"),
    (NoDate, Bool, "no-date", false, "Remove DATE from the column type pool"),
    (NoDatetime, Bool, "no-datetime", false, "Remove DATETIME from the column type pool"),
    (NoTimestamp, Bool, "no-timestamp", false, "Remove TIMESTAMP from the column type pool"),
    (NoBit, Bool, "no-bit", false, "Remove BIT from the column type pool"),

    // ===== Modes =====
    (Prepare, Bool, "prepare", false, "Create database, tablespaces, tables and initial data, then stop"),
    (JustLoadDdl, Bool, "just-load-ddl", false, "Create schema objects but skip the bulk load and workload"),
    (ExactRecords, Bool, "exact-records", false, "Load exactly initial-records-in-table rows instead of a random count"),
    (ExactColumns, Bool, "exact-columns", false, "Create exactly `columns` columns instead of a random count"),
    (ExactIndexes, Bool, "exact-indexes", false, "Create exactly `indexes` indexes instead of a random count"),
    (SingleThreadDdl, Bool, "single-thread-ddl", false, "Run DDL operations only on the first worker thread"),
    (ThreadPerTable, Bool, "thread-per-table", false, "Pin each worker thread to the table matching its id"),
    (CheckTablePreload, Bool, "check-table-preload", false, "CHECK every table and partition before the workload"),
    (CompareResult, Bool, "compare-result", false, "Run SELECTs on both engines and compare result sets"),
    (WaitForSync, Bool, "wait-for-sync", false, "Wait for tables to sync to the secondary engine"),
    (SecondaryAfterCreate, Bool, "secondary-after-create", false, "Attach the secondary engine after CREATE TABLE instead of inline"),
    (SelectInSecondary, Bool, "select-in-secondary", false, "Force SELECTs to the secondary engine for the session"),
    (PlainRewrite, Bool, "plain-rewrite", false, "Emit the rewrite_table PRAGMA without tuning arguments"),
    (TestConnection, Bool, "test-connection", false, "Connect, report the server version, and exit"),
    (Verbose, Bool, "verbose", false, "Enable verbose diagnostics on stderr"),

    // ===== Logging =====
    (LogAllQueries, Bool, "log-all-queries", false, "Log every SQL statement"),
    (LogFailedQueries, Bool, "log-failed-queries", false, "Log failed SQL statements"),
    (LogSucceededQueries, Bool, "log-succeeded-queries", false, "Log successful SQL statements"),
    (LogQueryDuration, Bool, "log-query-duration", false, "Prefix logged statements with their duration"),
    (LogClientOutput, Bool, "log-client-output", false, "Dump result rows to the client log"),
    (LogQueryNumbers, Bool, "log-query-numbers", false, "Number the rows in the client log"),

    // ===== Strings =====
    (Engine, Str, "engine", "INNODB", "Storage engine for created tables"),
    (EncryptionType, Str, "encryption-type", "all", "Permitted encryption modes: all, oracle, Y, N or KEYRING"),
    (RowFormat, Str, "row-format", "all", "Permitted row formats: all, uncompressed, none or a literal format"),
    (Algorithm, Str, "algorithm", "all", "Permitted ALTER algorithms (comma list or all)"),
    (Lock, Str, "lock", "all", "Permitted ALTER locks (comma list or all)"),
    (PartitionSupported, Str, "partition-supported", "all", "Permitted partition strategies (comma list or all)"),
    (ColumnTypes, Str, "column-types", "all", "Permitted column types (comma list or all)"),
    (IgnoreErrors, Str, "ignore-errors", "", "Comma list of server error numbers to ignore, or all"),
    (SecondaryEngine, Str, "secondary-engine", "", "Name of the secondary execution engine"),
    (Database, Str, "database", "test", "Database to create and run against"),
    (Address, Str, "address", "localhost", "Server host name or address"),
    (Socket, Str, "socket", "/tmp/mysql.sock", "Server UNIX socket path"),
    (User, Str, "user", "root", "User name"),
    (Password, Str, "password", "", "Password"),
    (Port, Str, "port", "3306", "Server port, or a comma list for one node per port"),
    (Logdir, Str, "logdir", "/tmp", "Directory for log files"),
    (MetadataPath, Str, "metadata-path", "", "Directory for checkpoint files (defaults to logdir)"),
    (ConfigFile, Str, "config-file", "", "INI file with one section per endpoint"),
    (GrammarFile, Str, "grammar-file", "grammar.sql", "File of SQL templates with placeholders"),
    (OptionProbFile, Str, "option-prob-file", "", "File of OPTION=N lines overriding integer options"),
    (ServerOptionFile, Str, "server-option-file", "", "File of server variables for set-global-variable"),
    (ServerOption, Str, "server-option", "", "Inline server variable spec name=v1,v2 for set-global-variable"),
}

/// One registered option: its metadata, current value and counters.
#[derive(Debug)]
pub struct OptionEntry {
    pub opt: Opt,
    value: OptionValue,
    /// Set when the value came from the command line.
    pub from_cli: bool,
    /// Times the operation was attempted.
    pub total: AtomicU64,
    /// Times the operation succeeded.
    pub success: AtomicU64,
}

impl OptionEntry {
    fn new(opt: Opt) -> Self {
        Self {
            opt,
            value: opt.default_value(),
            from_cli: false,
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
        }
    }
}

/// The set of all tunables, indexed by [`Opt`] tag.
#[derive(Debug)]
pub struct OptionRegistry {
    entries: Vec<OptionEntry>,
}

impl Default for OptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionRegistry {
    /// Creates a registry populated with every option at its default value.
    pub fn new() -> Self {
        Self {
            entries: Opt::ALL.iter().map(|&o| OptionEntry::new(o)).collect(),
        }
    }

    fn entry(&self, opt: Opt) -> &OptionEntry {
        &self.entries[opt as usize]
    }

    fn entry_mut(&mut self, opt: Opt) -> &mut OptionEntry {
        &mut self.entries[opt as usize]
    }

    /// Iterates over all entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &OptionEntry> {
        self.entries.iter()
    }

    // -- Reads ---------------------------------------------------------------

    pub fn get_int(&self, opt: Opt) -> i64 {
        match &self.entry(opt).value {
            OptionValue::Int(v) => *v,
            other => panic!("option {} read as int but holds {other:?}", opt.name()),
        }
    }

    pub fn get_bool(&self, opt: Opt) -> bool {
        match &self.entry(opt).value {
            OptionValue::Bool(v) => *v,
            other => panic!("option {} read as bool but holds {other:?}", opt.name()),
        }
    }

    pub fn get_str(&self, opt: Opt) -> &str {
        match &self.entry(opt).value {
            OptionValue::Str(v) => v.as_str(),
            other => panic!("option {} read as string but holds {other:?}", opt.name()),
        }
    }

    /// Returns `true` if the option was set from the command line.
    pub fn from_cli(&self, opt: Opt) -> bool {
        self.entry(opt).from_cli
    }

    // -- Writes (startup only) ----------------------------------------------

    pub fn set_int(&mut self, opt: Opt, value: i64) {
        self.entry_mut(opt).value = OptionValue::Int(value);
    }

    pub fn set_bool(&mut self, opt: Opt, value: bool) {
        self.entry_mut(opt).value = OptionValue::Bool(value);
    }

    pub fn set_str(&mut self, opt: Opt, value: impl Into<String>) {
        self.entry_mut(opt).value = OptionValue::Str(value.into());
    }

    pub fn mark_cli(&mut self, opt: Opt) {
        self.entry_mut(opt).from_cli = true;
    }

    /// Parses and applies a textual value according to the option's kind.
    pub fn set_parsed(&mut self, opt: Opt, text: &str) -> Result<()> {
        match opt.kind() {
            OptionKind::Bool => {
                let value = match text.to_ascii_uppercase().as_str() {
                    "ON" | "TRUE" | "1" => true,
                    "OFF" | "FALSE" | "0" => false,
                    _ => {
                        return Err(CoreError::InvalidOption {
                            option: opt.name().to_string(),
                            reason: format!("expected a boolean, got '{text}'"),
                        });
                    }
                };
                self.set_bool(opt, value);
            }
            OptionKind::Int => {
                let value = text.parse::<i64>().map_err(|e| CoreError::InvalidOption {
                    option: opt.name().to_string(),
                    reason: e.to_string(),
                })?;
                self.set_int(opt, value);
            }
            OptionKind::Str => self.set_str(opt, text),
        }
        Ok(())
    }

    // -- Counters ------------------------------------------------------------

    pub fn bump_total(&self, opt: Opt) {
        self.entry(opt).total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bump_success(&self, opt: Opt) {
        self.entry(opt).success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn totals(&self, opt: Opt) -> (u64, u64) {
        let e = self.entry(opt);
        (
            e.total.load(Ordering::Relaxed),
            e.success.load(Ordering::Relaxed),
        )
    }

    /// Splits a comma-separated list into trimmed, non-empty entries.
    pub fn split_list(text: &str) -> Vec<String> {
        text.split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_populated() {
        let reg = OptionRegistry::new();
        assert_eq!(reg.get_int(Opt::Tables), 10);
        assert_eq!(reg.get_str(Opt::Engine), "INNODB");
        assert!(!reg.get_bool(Opt::NoDdl));
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = Opt::ALL.iter().map(|o| o.name()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn sql_flags() {
        assert!(Opt::DropIndex.is_sql());
        assert!(Opt::DropIndex.is_ddl());
        assert!(Opt::SelectAllRow.is_sql());
        assert!(!Opt::SelectAllRow.is_ddl());
        assert!(!Opt::Tables.is_sql());
    }

    #[test]
    fn from_name_roundtrip() {
        for &opt in Opt::ALL {
            assert_eq!(Opt::from_name(opt.name()), Some(opt));
        }
        assert_eq!(Opt::from_name("no-such-option"), None);
    }

    #[test]
    fn set_parsed_bool_accepts_usual_spellings() {
        let mut reg = OptionRegistry::new();
        for text in ["ON", "on", "TRUE", "1"] {
            reg.set_parsed(Opt::NoDdl, text).unwrap();
            assert!(reg.get_bool(Opt::NoDdl));
        }
        for text in ["OFF", "false", "0"] {
            reg.set_parsed(Opt::NoDdl, text).unwrap();
            assert!(!reg.get_bool(Opt::NoDdl));
        }
        assert!(reg.set_parsed(Opt::NoDdl, "maybe").is_err());
    }

    #[test]
    fn counters_accumulate() {
        let reg = OptionRegistry::new();
        reg.bump_total(Opt::Truncate);
        reg.bump_total(Opt::Truncate);
        reg.bump_success(Opt::Truncate);
        assert_eq!(reg.totals(Opt::Truncate), (2, 1));
    }
}
