//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::column::{Column, TypeTag};
use crate::env::{RunEnv, ServerProbe};
use crate::index::{Index, IndexColumn};
use crate::options::OptionRegistry;
use crate::rng::StringPool;
use crate::table::{Table, TableKind, TableState, TableVariant};
use crate::value::GenContext;

/// A generation context and environment over default options.
pub(crate) fn test_context(seed: u64) -> (GenContext, RunEnv) {
    let opts = Arc::new(OptionRegistry::new());
    let env = RunEnv::build(&opts, ServerProbe::default());
    let ctx = GenContext::new(seed, Arc::new(StringPool::generate(seed)), opts);
    (ctx, env)
}

/// A small fixed table: `ipkey` (INT, pk, auto-inc), `i2` (INT), `v1`
/// (VARCHAR(20)), one index on (ipkey, i2) and one on (v1) alone. The
/// closure may reshape the state before the table is built.
pub(crate) fn table_with(adjust: impl FnOnce(&mut TableState)) -> Table {
    let mut pkey = Column::plain("ipkey", TypeTag::Int);
    pkey.primary_key = true;
    pkey.auto_increment = true;
    let i2 = Column::plain("i2", TypeTag::Int);
    let mut v1 = Column::plain("v1", TypeTag::Varchar);
    v1.length = 20;

    let mut state = TableState {
        row_format: String::new(),
        tablespace: String::new(),
        encryption: "N".to_string(),
        compression: String::new(),
        key_block_size: 0,
        initial_records: 100,
        auto_inc_index: 0,
        variant: TableVariant::Normal,
        columns: vec![pkey, i2, v1],
        indexes: vec![
            Index {
                name: "tt_1i0".to_string(),
                unique: false,
                columns: vec![
                    IndexColumn { column: "ipkey".to_string(), desc: false, prefix: None },
                    IndexColumn { column: "i2".to_string(), desc: false, prefix: None },
                ],
            },
            Index {
                name: "tt_1i1".to_string(),
                unique: false,
                columns: vec![IndexColumn { column: "v1".to_string(), desc: true, prefix: None }],
            },
        ],
    };
    adjust(&mut state);
    Table::new("tt_1".to_string(), TableKind::Normal, "INNODB".to_string(), state)
}
