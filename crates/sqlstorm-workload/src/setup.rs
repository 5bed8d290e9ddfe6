//! Run setup: server probing, the option disable cascade, database and
//! tablespace creation, and building the catalog for prepare or resume.

use std::path::Path;
use std::sync::Arc;

use sqlstorm_client::Session;
use sqlstorm_core::env::{validate_options, RunEnv, ServerProbe};
use sqlstorm_core::table::{Table, TableKind};
use sqlstorm_core::{checkpoint, Catalog, GenContext, Opt, OptionRegistry, StringPool};

use crate::error::{Result, WorkloadError};
use crate::grammar::{self, GrammarTemplate};
use crate::state::RunState;

/// Probes the server facts the attribute pools depend on.
pub fn probe_server(session: &mut Session, opts: &OptionRegistry) -> Result<ServerProbe> {
    let version = session.server_version_num()?;

    let mut probe = ServerProbe {
        version,
        ..ServerProbe::default()
    };

    if opts.get_str(Opt::Engine).eq_ignore_ascii_case("INNODB") {
        if let Ok(Some(text)) = session.read_single_value("select @@innodb_page_size") {
            if let Ok(bytes) = text.parse::<i64>() {
                probe.innodb_page_size = bytes / 1024;
            }
        }
    }

    probe.keyring_active = session
        .read_single_value(
            "SELECT status_value FROM performance_schema.keyring_component_status \
             WHERE status_key='component_status'",
        )
        .ok()
        .flatten()
        .as_deref()
        == Some("Active");

    probe.encrypted_temp_tables = session
        .read_single_value("select @@innodb_temp_tablespace_encrypt")
        .ok()
        .flatten()
        .as_deref()
        == Some("1");

    probe.encrypted_system_tablespace = session
        .read_single_value("select @@innodb_sys_tablespace_encrypt")
        .ok()
        .flatten()
        .as_deref()
        == Some("1");

    Ok(probe)
}

/// Applies the whole disable cascade to the registry: type-pool pruning,
/// version gates, secondary-engine and engine-specific restrictions, class
/// disables, and the `only-cl-*` filters. Must run once, before any worker
/// reads the registry.
pub fn apply_feature_disables(
    opts: &mut OptionRegistry,
    probe: &ServerProbe,
    have_server_variables: bool,
) -> Result<()> {
    prune_column_types(opts);

    // Features the server version cannot do.
    if probe.version < 80000 {
        opts.set_int(Opt::AlterTablespaceRename, 0);
        opts.set_int(Opt::RenameColumn, 0);
        opts.set_int(Opt::UndoSql, 0);
        opts.set_int(Opt::AlterRedoLogging, 0);
    }
    if (80000..=80030).contains(&probe.version) {
        opts.set_int(Opt::AlterDiscardTablespace, 0);
    }

    if opts.get_str(Opt::SecondaryEngine).is_empty() {
        opts.set_int(Opt::AlterSecondaryEngine, 0);
        opts.set_int(Opt::ModifyColumnSecondaryEngine, 0);
        opts.set_int(Opt::EnforceMerge, 0);
        opts.set_int(Opt::SecondaryGc, 0);
        opts.set_int(Opt::NotSecondary, 0);
        opts.set_bool(Opt::WaitForSync, false);
        opts.set_bool(Opt::SecondaryAfterCreate, false);
    } else {
        // The secondary engine restricts the primary schema surface.
        opts.set_bool(Opt::NoEncryption, true);
        opts.set_bool(Opt::NoPartition, true);
        opts.set_bool(Opt::NoTemporary, true);
        opts.set_bool(Opt::NoTablespace, true);
        opts.set_bool(Opt::NoFk, true);
        if opts.get_int(Opt::PrimaryKeyProb) < 100 {
            opts.set_bool(Opt::NoAutoInc, true);
        }
        opts.set_int(Opt::UndoSql, 0);
        opts.set_int(Opt::AlterRedoLogging, 0);
    }

    if opts.get_bool(Opt::OnlyPartition) {
        opts.set_bool(Opt::NoTemporary, true);
    }

    if opts.get_bool(Opt::OnlySelect) {
        opts.set_bool(Opt::NoUpdate, true);
        opts.set_bool(Opt::NoDelete, true);
        opts.set_bool(Opt::NoInsert, true);
    } else if opts.get_bool(Opt::NoSelect) {
        opts.set_int(Opt::SelectAllRow, 0);
        opts.set_int(Opt::SelectRowUsingPkey, 0);
        opts.set_int(Opt::SelectForUpdate, 0);
        opts.set_int(Opt::SelectForUpdateBulk, 0);
        opts.set_int(Opt::GrammarSql, 0);
    }
    if opts.get_bool(Opt::NoDelete) {
        opts.set_int(Opt::DeleteAllRows, 0);
        opts.set_int(Opt::DeleteRowUsingPkey, 0);
    }
    if opts.get_bool(Opt::NoUpdate) {
        opts.set_int(Opt::UpdateRowUsingPkey, 0);
        opts.set_int(Opt::UpdateAllRows, 0);
    }
    if opts.get_bool(Opt::NoInsert) {
        opts.set_int(Opt::InsertRandomRow, 0);
    }
    if opts.get_bool(Opt::NoUpdate) && opts.get_bool(Opt::NoDelete) && opts.get_bool(Opt::NoInsert)
    {
        opts.set_int(Opt::CallFunction, 0);
    }

    if opts.get_bool(Opt::NoTablespace) {
        opts.set_int(Opt::AlterTablespaceRename, 0);
        opts.set_int(Opt::AlterTablespaceEncryption, 0);
    }

    // Engine-specific restrictions.
    if opts.get_str(Opt::Engine).eq_ignore_ascii_case("ROCKSDB") {
        opts.set_bool(Opt::NoTemporary, true);
        opts.set_bool(Opt::NoColumnCompression, true);
        opts.set_bool(Opt::NoEncryption, true);
        opts.set_bool(Opt::NoDescIndex, true);
        opts.set_bool(Opt::NoTableCompression, true);
    }

    if opts.get_bool(Opt::NoEncryption) {
        opts.set_int(Opt::AlterTableEncryption, 0);
        opts.set_int(Opt::AlterTablespaceEncryption, 0);
        opts.set_int(Opt::AlterMasterKey, 0);
        opts.set_int(Opt::AlterEncryptionKey, 0);
        opts.set_int(Opt::RotateRedoLogKey, 0);
        opts.set_int(Opt::AlterDatabaseEncryption, 0);
        opts.set_int(Opt::AlterInstanceReloadKeyring, 0);
    }

    // Hole punching is unavailable on macOS, so no table compression there.
    if cfg!(target_os = "macos") {
        opts.set_bool(Opt::NoTableCompression, true);
    }
    if opts.get_bool(Opt::NoTableCompression) {
        opts.set_int(Opt::AlterTableCompression, 0);
    }

    if !have_server_variables {
        opts.set_int(Opt::SetGlobalVariable, 0);
    }

    // Tables without indexes cannot host the auto-increment key.
    if opts.get_int(Opt::Indexes) == 0 {
        opts.set_bool(Opt::NoAutoInc, true);
    }

    if opts.get_bool(Opt::OnlyClSql) {
        for &opt in Opt::ALL {
            if opt.is_sql() && !opts.from_cli(opt) {
                opts.set_int(opt, 0);
            }
        }
    }
    if opts.get_bool(Opt::OnlyClDdl) {
        for &opt in Opt::ALL {
            if opt.is_ddl() && !opts.from_cli(opt) {
                opts.set_int(opt, 0);
            }
        }
    }
    if opts.get_bool(Opt::NoDdl) {
        for &opt in Opt::ALL {
            if opt.is_ddl() {
                opts.set_int(opt, 0);
            }
        }
    }

    validate_options(opts)?;
    Ok(())
}

/// Maps the `column-types` list onto the per-type disables.
fn prune_column_types(opts: &mut OptionRegistry) {
    let requested = opts.get_str(Opt::ColumnTypes).to_ascii_uppercase();
    if requested == "ALL" {
        return;
    }
    let kept: Vec<String> = OptionRegistry::split_list(&requested);
    let keep = |name: &str| kept.iter().any(|t| t == name);
    for (name, disable) in [
        ("INT", Opt::NoInt),
        ("INTEGER", Opt::NoInteger),
        ("FLOAT", Opt::NoFloat),
        ("DOUBLE", Opt::NoDouble),
        ("CHAR", Opt::NoChar),
        ("VARCHAR", Opt::NoVarchar),
        ("TEXT", Opt::NoText),
        ("BLOB", Opt::NoBlob),
        ("BOOL", Opt::NoBool),
        ("DATE", Opt::NoDate),
        ("DATETIME", Opt::NoDatetime),
        ("TIMESTAMP", Opt::NoTimestamp),
        ("BIT", Opt::NoBit),
    ] {
        if !keep(name) {
            opts.set_bool(disable, true);
        }
    }
    if !keep("GENERATED") {
        opts.set_bool(Opt::NoVirtualColumns, true);
    }
}

/// Drops and recreates the run database and the general/undo tablespaces.
pub fn create_database_tablespaces(
    session: &mut Session,
    opts: &OptionRegistry,
    env: &RunEnv,
) -> Result<()> {
    let database = opts.get_str(Opt::Database);
    let drop = format!("DROP DATABASE IF EXISTS {database}");
    session.execute(&drop).map_err(|e| WorkloadError::Setup {
        sql: drop.clone(),
        reason: e.to_string(),
    })?;

    let create = format!("CREATE DATABASE IF NOT EXISTS {database}");
    session.execute(&create).map_err(|e| WorkloadError::Setup {
        sql: create.clone(),
        reason: e.to_string(),
    })?;

    for tablespace in &env.tablespaces {
        if tablespace == "innodb_system" {
            continue;
        }
        let mut create = format!(
            "CREATE TABLESPACE {tablespace} ADD DATAFILE '{tablespace}.ibd' "
        );
        if env.probe.innodb_page_size <= sqlstorm_core::env::INNODB_16K_PAGE_SIZE {
            if let Some(block) = tablespace.get(3..6) {
                create.push_str(&format!(" FILE_BLOCK_SIZE {block}"));
            }
        }
        if !env.no_encryption {
            if tablespace.ends_with("_e") {
                create.push_str(" ENCRYPTION='Y'");
            } else if env.probe.version >= 80000 {
                create.push_str(" ENCRYPTION='N'");
            }
        }

        // A previous run may have left the tablespace renamed.
        if env.probe.version >= 80000 {
            let _ = session.execute(&format!(
                "ALTER TABLESPACE {tablespace}_rename rename to {tablespace}"
            ));
        }
        let _ = session.execute(&format!("DROP TABLESPACE {tablespace}"));

        session.execute(&create).map_err(|e| WorkloadError::Setup {
            sql: create.clone(),
            reason: e.to_string(),
        })?;
    }

    if env.probe.version >= 80000 {
        for undo in &env.undo_tablespaces {
            let _ = session.execute(&format!(
                "CREATE UNDO TABLESPACE {undo} ADD DATAFILE '{undo}.ibu'"
            ));
        }
    }
    Ok(())
}

/// Builds the in-memory catalog for this step: random tables for a prepare
/// or first step, the previous step's checkpoint otherwise.
pub fn build_catalog(
    opts: &mut OptionRegistry,
    env: &RunEnv,
    pool: &Arc<StringPool>,
) -> Result<Catalog> {
    let catalog = Catalog::new();
    let step = opts.get_int(Opt::Step);
    if step > 1 && !opts.get_bool(Opt::Prepare) {
        let dir = metadata_dir(opts);
        let tables = checkpoint::load_previous(Path::new(&dir), step)?;
        tracing::info!(count = tables.len(), "catalog loaded from checkpoint");
        opts.set_int(Opt::Tables, tables.len() as i64);
        catalog.replace(tables);
        return Ok(catalog);
    }

    let seed = (opts.get_int(Opt::InitialSeed) + step) as u64;
    let shared = Arc::new(opts_snapshot(opts));
    let mut ctx = GenContext::new(seed, Arc::clone(pool), shared);

    if !opts.get_bool(Opt::OnlyTemporary) {
        for id in 1..=opts.get_int(Opt::Tables) {
            if !opts.get_bool(Opt::OnlyPartition) {
                let parent = Arc::new(Table::random(TableKind::Normal, id, false, &mut ctx, env));
                let parent_has_pk = parent.state().has_primary_key();
                catalog.add(parent);
                if !opts.get_bool(Opt::NoFk)
                    && opts.get_int(Opt::FkProb) > ctx.rng.int(100)
                    && parent_has_pk
                {
                    catalog.add(Arc::new(Table::random(TableKind::Fk, id, false, &mut ctx, env)));
                }
            }
            if !opts.get_bool(Opt::NoPartition)
                && opts.get_int(Opt::PartitionProb) > ctx.rng.int(100)
            {
                catalog.add(Arc::new(Table::random(
                    TableKind::Partition,
                    id,
                    false,
                    &mut ctx,
                    env,
                )));
            }
        }
    }
    tracing::info!(count = catalog.len(), "catalog created randomly");
    Ok(catalog)
}

/// The directory checkpoints live in.
pub fn metadata_dir(opts: &OptionRegistry) -> String {
    let path = opts.get_str(Opt::MetadataPath);
    if path.is_empty() {
        opts.get_str(Opt::Logdir).to_string()
    } else {
        path.to_string()
    }
}

/// Loads the grammar templates when grammar SQL is enabled.
pub fn load_grammar(opts: &OptionRegistry) -> Vec<GrammarTemplate> {
    if opts.get_int(Opt::GrammarSql) <= 0 {
        return Vec::new();
    }
    let path = opts.get_str(Opt::GrammarFile);
    match grammar::load_templates(path) {
        Ok(templates) => templates,
        Err(err) => {
            tracing::error!(path, %err, "unable to load grammar file");
            Vec::new()
        }
    }
}

/// Assembles the shared run state.
pub fn build_run_state(
    opts: OptionRegistry,
    env: RunEnv,
    catalog: Catalog,
    pool: Arc<StringPool>,
    server_variables: Vec<sqlstorm_config::ServerVariable>,
) -> RunState {
    let grammar = load_grammar(&opts);
    RunState::new(
        Arc::new(opts),
        env,
        catalog,
        pool,
        server_variables,
        grammar,
    )
}

/// A value snapshot of the registry (counters reset), used for generation
/// contexts that need an owned `Arc`.
fn opts_snapshot(opts: &OptionRegistry) -> OptionRegistry {
    let mut copy = OptionRegistry::new();
    for entry in opts.iter() {
        match entry.opt.kind() {
            sqlstorm_core::OptionKind::Bool => copy.set_bool(entry.opt, opts.get_bool(entry.opt)),
            sqlstorm_core::OptionKind::Int => copy.set_int(entry.opt, opts.get_int(entry.opt)),
            sqlstorm_core::OptionKind::Str => copy.set_str(entry.opt, opts.get_str(entry.opt)),
        }
    }
    copy
}
