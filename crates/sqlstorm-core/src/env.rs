//! Run environment: the pools of table attributes valid for this run, plus
//! everything probed from the server at startup.
//!
//! Built once by the coordinator after the feature disables have been
//! applied, then shared read-only by every worker.

use crate::options::{Opt, OptionRegistry, OptionValue};
use crate::partition::PartitionStrategy;
use crate::rng::Prng;

/// InnoDB page sizes, in KiB.
pub const INNODB_8K_PAGE_SIZE: i64 = 8;
pub const INNODB_16K_PAGE_SIZE: i64 = 16;
pub const INNODB_32K_PAGE_SIZE: i64 = 32;
pub const INNODB_64K_PAGE_SIZE: i64 = 64;

/// Facts probed from the server before the run starts.
#[derive(Debug, Clone)]
pub struct ServerProbe {
    /// Numeric server version, e.g. 8.0.26 -> 80026.
    pub version: u32,
    /// InnoDB page size in KiB.
    pub innodb_page_size: i64,
    /// A keyring component is installed and active.
    pub keyring_active: bool,
    /// Temporary tablespaces are encrypted.
    pub encrypted_temp_tables: bool,
    /// The system tablespace is encrypted.
    pub encrypted_system_tablespace: bool,
}

impl Default for ServerProbe {
    fn default() -> Self {
        Self {
            version: 80000,
            innodb_page_size: INNODB_16K_PAGE_SIZE,
            keyring_active: false,
            encrypted_temp_tables: false,
            encrypted_system_tablespace: false,
        }
    }
}

/// The attribute pools random tables draw from.
#[derive(Debug, Clone)]
pub struct RunEnv {
    pub tablespaces: Vec<String>,
    pub undo_tablespaces: Vec<String>,
    pub row_formats: Vec<String>,
    pub key_block_sizes: Vec<i64>,
    pub compressions: Vec<String>,
    pub encryption_modes: Vec<String>,
    pub locks: Vec<String>,
    pub algorithms: Vec<String>,
    pub partition_strategies: Vec<PartitionStrategy>,
    pub secondary_engine: Option<String>,
    pub secondary_after_create: bool,
    pub no_encryption: bool,
    /// Upper bound for generated string column and index prefix lengths.
    pub max_column_length: i64,
    pub probe: ServerProbe,
}

impl RunEnv {
    /// Builds the environment from the (already disabled-cascaded) registry
    /// and the server probe.
    pub fn build(opts: &OptionRegistry, probe: ServerProbe) -> Self {
        let no_encryption = opts.get_bool(Opt::NoEncryption);
        let no_table_compression = opts.get_bool(Opt::NoTableCompression);
        let secondary_engine = match opts.get_str(Opt::SecondaryEngine) {
            "" => None,
            name => Some(name.to_string()),
        };

        let mut env = Self {
            tablespaces: Vec::new(),
            undo_tablespaces: Vec::new(),
            row_formats: Vec::new(),
            key_block_sizes: Vec::new(),
            compressions: Vec::new(),
            encryption_modes: Vec::new(),
            locks: Vec::new(),
            algorithms: Vec::new(),
            partition_strategies: Vec::new(),
            secondary_engine,
            secondary_after_create: opts.get_bool(Opt::SecondaryAfterCreate),
            no_encryption,
            max_column_length: 30,
            probe,
        };

        env.fill_tablespaces(opts);
        env.fill_row_formats(opts, no_table_compression);

        if !no_table_compression {
            env.compressions = vec!["none".into(), "zlib".into(), "lz4".into()];
        }

        // Oversized pages and secondary engines exclude the compressed
        // row formats entirely.
        if env.probe.innodb_page_size > INNODB_16K_PAGE_SIZE || env.secondary_engine.is_some() {
            env.row_formats.clear();
            env.key_block_sizes.clear();
            env.compressions.clear();
        }

        env.fill_encryption_modes(opts);
        env.fill_locks_algorithms(opts);
        env.fill_partition_strategies(opts);

        let undo_count = opts.get_int(Opt::UndoTablespaces);
        for i in 1..=undo_count {
            env.undo_tablespaces.push(format!("undo_00{i}"));
        }

        env
    }

    fn fill_tablespaces(&mut self, opts: &OptionRegistry) {
        if opts.get_bool(Opt::NoTablespace) {
            return;
        }
        let page = self.probe.innodb_page_size;
        let mut names: Vec<String> = vec!["tab02k".into(), "tab04k".into(), "innodb_system".into()];
        if page >= INNODB_8K_PAGE_SIZE {
            names.push("tab08k".into());
        }
        if page >= INNODB_16K_PAGE_SIZE {
            names.push("tab16k".into());
        }
        if page >= INNODB_32K_PAGE_SIZE {
            names.push("tab32k".into());
        }
        if page >= INNODB_64K_PAGE_SIZE {
            names.push("tab64k".into());
        }

        let extra = opts.get_int(Opt::GeneralTablespaces);
        if extra > 1 {
            let seed = names.clone();
            for name in seed {
                if name == "innodb_system" {
                    continue;
                }
                for j in 1..=extra {
                    names.push(format!("{name}{j}"));
                }
            }
        }

        // Alternate tablespaces are created encrypted.
        if !opts.get_bool(Opt::NoEncryption) && self.probe.version >= 80000 {
            for (i, name) in names.iter_mut().enumerate() {
                if i % 2 == 0 && name != "innodb_system" {
                    name.push_str("_e");
                }
            }
        }
        self.tablespaces = names;
    }

    fn fill_row_formats(&mut self, opts: &OptionRegistry, no_table_compression: bool) {
        let mut requested = opts.get_str(Opt::RowFormat).to_ascii_lowercase();
        if requested == "all" && no_table_compression {
            requested = "uncompressed".into();
        }
        match requested.as_str() {
            "uncompressed" => {
                self.row_formats = vec!["DYNAMIC".into(), "REDUNDANT".into()];
            }
            "all" => {
                self.row_formats = vec!["DYNAMIC".into(), "REDUNDANT".into(), "COMPRESSED".into()];
                self.key_block_sizes = vec![0, 0, 1, 2, 4];
            }
            "none" => {}
            other => self.row_formats.push(other.to_ascii_uppercase()),
        }
    }

    fn fill_encryption_modes(&mut self, opts: &OptionRegistry) {
        let requested = opts.get_str(Opt::EncryptionType);
        self.encryption_modes = match requested {
            "all" => {
                let mut modes = vec!["Y".to_string(), "N".to_string()];
                if self.probe.keyring_active {
                    modes.push("KEYRING".to_string());
                }
                modes
            }
            "oracle" => vec!["Y".into(), "N".into()],
            other => vec![other.to_string()],
        };
    }

    fn fill_locks_algorithms(&mut self, opts: &OptionRegistry) {
        let lock = opts.get_str(Opt::Lock).to_ascii_uppercase();
        if lock == "ALL" {
            self.locks = ["DEFAULT", "EXCLUSIVE", "SHARED", "NONE"]
                .map(String::from)
                .to_vec();
        } else {
            for candidate in ["EXCLUSIVE", "SHARED", "NONE", "DEFAULT"] {
                if lock.contains(candidate) {
                    self.locks.push(candidate.to_string());
                }
            }
        }
        let algorithm = opts.get_str(Opt::Algorithm).to_ascii_uppercase();
        if algorithm == "ALL" {
            self.algorithms = ["INPLACE", "COPY", "INSTANT", "DEFAULT"]
                .map(String::from)
                .to_vec();
        } else {
            for candidate in ["INPLACE", "COPY", "INSTANT", "DEFAULT"] {
                if algorithm.contains(candidate) {
                    self.algorithms.push(candidate.to_string());
                }
            }
        }
    }

    fn fill_partition_strategies(&mut self, opts: &OptionRegistry) {
        let requested = opts.get_str(Opt::PartitionSupported).to_ascii_uppercase();
        if requested == "ALL" {
            self.partition_strategies = vec![
                PartitionStrategy::Key,
                PartitionStrategy::List,
                PartitionStrategy::Hash,
                PartitionStrategy::Range,
            ];
        } else {
            for (name, strategy) in [
                ("HASH", PartitionStrategy::Hash),
                ("KEY", PartitionStrategy::Key),
                ("LIST", PartitionStrategy::List),
                ("RANGE", PartitionStrategy::Range),
            ] {
                if requested.contains(name) {
                    self.partition_strategies.push(strategy);
                }
            }
            // An unrecognized list leaves partitioned tables unbuildable;
            // fall back to the full set.
            if self.partition_strategies.is_empty() {
                self.partition_strategies = vec![
                    PartitionStrategy::Key,
                    PartitionStrategy::List,
                    PartitionStrategy::Hash,
                    PartitionStrategy::Range,
                ];
            }
        }
    }

    /// Picks an ALGORITHM/LOCK pair from the allowed sets and renders the
    /// ALTER suffix. INSTANT only supports LOCK=DEFAULT; COPY does not
    /// support LOCK=NONE and is rewritten to DEFAULT.
    pub fn algorithm_lock_clause(&self, rng: &mut Prng) -> String {
        let (clause, _algo) = self.algorithm_lock(rng);
        clause
    }

    /// Like [`Self::algorithm_lock_clause`] but also returns the algorithm.
    pub fn algorithm_lock(&self, rng: &mut Prng) -> (String, String) {
        let algo = if self.algorithms.is_empty() {
            "DEFAULT".to_string()
        } else {
            self.algorithms[rng.int(self.algorithms.len() as i64 - 1) as usize].clone()
        };
        let mut lock = if algo == "INSTANT" {
            "DEFAULT".to_string()
        } else if self.locks.is_empty() {
            "DEFAULT".to_string()
        } else {
            self.locks[rng.int(self.locks.len() as i64 - 1) as usize].clone()
        };
        if algo == "COPY" && lock == "NONE" {
            lock = "DEFAULT".to_string();
        }
        (format!(" LOCK={lock}, ALGORITHM={algo}"), algo)
    }
}

/// Applies the option-value constraints that do not need a server probe.
/// Returns an error for out-of-range or contradictory combinations.
pub fn validate_options(opts: &OptionRegistry) -> crate::Result<()> {
    let max_partitions = opts.get_int(Opt::MaxPartitions);
    if !(1..=8192).contains(&max_partitions) {
        return Err(crate::CoreError::InvalidOption {
            option: Opt::MaxPartitions.name().to_string(),
            reason: format!("{max_partitions} is outside 1..=8192"),
        });
    }
    if opts.get_bool(Opt::OnlyPartition) && opts.get_bool(Opt::OnlyTemporary) {
        return Err(crate::CoreError::ConflictingOptions(
            "only-partition and only-temporary".into(),
        ));
    }
    if opts.get_bool(Opt::OnlyPartition) && opts.get_bool(Opt::NoPartition) {
        return Err(crate::CoreError::ConflictingOptions(
            "only-partition and no-partition".into(),
        ));
    }
    if opts.get_bool(Opt::OnlyClDdl) && opts.get_bool(Opt::NoDdl) {
        return Err(crate::CoreError::ConflictingOptions(
            "only-cl-ddl and no-ddl".into(),
        ));
    }
    for entry in opts.iter() {
        if entry.opt.is_sql() {
            if let OptionValue::Int(weight) = entry_value(opts, entry.opt) {
                if weight < 0 {
                    return Err(crate::CoreError::InvalidOption {
                        option: entry.opt.name().to_string(),
                        reason: "weights must be non-negative".into(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn entry_value(opts: &OptionRegistry, opt: Opt) -> OptionValue {
    match opt.kind() {
        crate::OptionKind::Bool => OptionValue::Bool(opts.get_bool(opt)),
        crate::OptionKind::Int => OptionValue::Int(opts.get_int(opt)),
        crate::OptionKind::Str => OptionValue::Str(opts.get_str(opt).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_env_has_all_pools() {
        let opts = OptionRegistry::new();
        let env = RunEnv::build(&opts, ServerProbe::default());
        assert!(env.tablespaces.iter().any(|t| t == "innodb_system"));
        assert!(env.tablespaces.iter().any(|t| t.ends_with("_e")));
        assert_eq!(env.row_formats, vec!["DYNAMIC", "REDUNDANT", "COMPRESSED"]);
        assert_eq!(env.undo_tablespaces, vec!["undo_001", "undo_002"]);
        assert_eq!(env.partition_strategies.len(), 4);
        assert!(env.secondary_engine.is_none());
    }

    #[test]
    fn page_size_gates_tablespaces() {
        let opts = OptionRegistry::new();
        let probe = ServerProbe {
            innodb_page_size: INNODB_8K_PAGE_SIZE,
            ..ServerProbe::default()
        };
        let env = RunEnv::build(&opts, probe);
        assert!(env.tablespaces.iter().any(|t| t.starts_with("tab08k")));
        assert!(!env.tablespaces.iter().any(|t| t.starts_with("tab16k")));
    }

    #[test]
    fn secondary_engine_clears_compression() {
        let mut opts = OptionRegistry::new();
        opts.set_str(Opt::SecondaryEngine, "COLUMNAR");
        let env = RunEnv::build(&opts, ServerProbe::default());
        assert!(env.row_formats.is_empty());
        assert!(env.key_block_sizes.is_empty());
        assert!(env.compressions.is_empty());
        assert_eq!(env.secondary_engine.as_deref(), Some("COLUMNAR"));
    }

    #[test]
    fn instant_forces_default_lock() {
        let mut opts = OptionRegistry::new();
        opts.set_str(Opt::Algorithm, "INSTANT");
        opts.set_str(Opt::Lock, "NONE");
        let env = RunEnv::build(&opts, ServerProbe::default());
        let mut rng = Prng::from_seed(5);
        for _ in 0..20 {
            let clause = env.algorithm_lock_clause(&mut rng);
            assert_eq!(clause, " LOCK=DEFAULT, ALGORITHM=INSTANT");
        }
    }

    #[test]
    fn copy_never_pairs_with_none() {
        let mut opts = OptionRegistry::new();
        opts.set_str(Opt::Algorithm, "COPY");
        opts.set_str(Opt::Lock, "NONE");
        let env = RunEnv::build(&opts, ServerProbe::default());
        let mut rng = Prng::from_seed(6);
        for _ in 0..20 {
            let clause = env.algorithm_lock_clause(&mut rng);
            assert_eq!(clause, " LOCK=DEFAULT, ALGORITHM=COPY");
        }
    }

    #[test]
    fn validate_rejects_partition_range() {
        let mut opts = OptionRegistry::new();
        opts.set_int(Opt::MaxPartitions, 0);
        assert!(validate_options(&opts).is_err());
        opts.set_int(Opt::MaxPartitions, 8193);
        assert!(validate_options(&opts).is_err());
        opts.set_int(Opt::MaxPartitions, 8);
        assert!(validate_options(&opts).is_ok());
    }

    #[test]
    fn validate_rejects_conflicts() {
        let mut opts = OptionRegistry::new();
        opts.set_bool(Opt::OnlyPartition, true);
        opts.set_bool(Opt::OnlyTemporary, true);
        assert!(validate_options(&opts).is_err());
    }
}
