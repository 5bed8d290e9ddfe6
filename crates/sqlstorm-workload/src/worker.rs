//! One worker thread: its connection, logs, PRNG, and the main loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlstorm_client::{ResultGrid, Session};
use sqlstorm_config::EndpointParams;
use sqlstorm_core::options::OPTION_COUNT;
use sqlstorm_core::rng::thread_seed;
use sqlstorm_core::table::{Table, TableKind};
use sqlstorm_core::{GenContext, Opt};

use crate::bulkload;
use crate::ddl;
use crate::error::{Result, WorkloadError};
use crate::logging::{print_and_log, NodeLog, ThreadLogs};
use crate::selector::Selector;
use crate::state::{NodeCounters, RunState};

/// Per-thread execution state.
pub struct Worker {
    pub thread_id: usize,
    pub run: Arc<RunState>,
    pub counters: Arc<NodeCounters>,
    pub node_log: Arc<NodeLog>,
    pub logs: ThreadLogs,
    pub session: Session,
    /// Second connection used for the dual-engine re-execution.
    pub alt_session: Option<Session>,
    pub ctx: GenContext,
    pub params: EndpointParams,
    /// Pre-generated primary-key values of the most recently loaded table,
    /// reused by its foreign-key children.
    pub unique_keys: Vec<i64>,
    pub query_number: u64,
    /// Whether the statement being executed is DDL (routes to the DDL log).
    pub ddl_query: bool,
    /// Set by a successful statement, consumed by the loop's counters.
    pub success: bool,
    /// Result grid of the last successful statement.
    pub last_result: Option<ResultGrid>,
    pub consecutive_failures: u32,
}

impl Worker {
    /// Connects and opens the per-thread log streams.
    pub fn new(
        thread_id: usize,
        run: Arc<RunState>,
        counters: Arc<NodeCounters>,
        node_log: Arc<NodeLog>,
        params: EndpointParams,
    ) -> Result<Self> {
        let session = Session::connect(&params)?;
        let alt_session = if run.opts.get_bool(Opt::CompareResult) {
            Some(Session::connect(&params)?)
        } else {
            None
        };
        let step = run.opts.get_int(Opt::Step);
        let logs = ThreadLogs::create(
            &params.logdir,
            &params.name,
            thread_id,
            step,
            run.opts.get_bool(Opt::LogClientOutput),
        )?;
        let seed = thread_seed(run.opts.get_int(Opt::InitialSeed), step, thread_id);
        let ctx = GenContext::new(seed as u64, Arc::clone(&run.pool), Arc::clone(&run.opts));
        Ok(Self {
            thread_id,
            run,
            counters,
            node_log,
            logs,
            session,
            alt_session,
            ctx,
            params,
            unique_keys: Vec::new(),
            query_number: 0,
            ddl_query: false,
            success: false,
            last_result: None,
            consecutive_failures: 0,
        })
    }

    /// The whole life of one worker thread: session setup, temporary
    /// tables, initial load or preload check, then the random workload.
    pub fn run_worker(&mut self) -> Result<()> {
        let seed_note = format!("thread {} seeded", self.thread_id);
        self.logs.line(&seed_note);

        self.session_setup();
        let _session_tables = self.create_temporary_tables()?;

        let opts = Arc::clone(&self.run.opts);
        let prepare_phase =
            opts.get_bool(Opt::Prepare) || opts.get_int(Opt::Step) == 1;
        if prepare_phase {
            self.initial_load()?;
        } else if opts.get_bool(Opt::CheckTablePreload) {
            self.preload_check();
        }

        if opts.get_bool(Opt::JustLoadDdl) || opts.get_bool(Opt::Prepare) {
            return Ok(());
        }

        if opts.get_bool(Opt::SelectInSecondary) {
            self.execute_sql("SET @@SESSION.USE_SECONDARY_ENGINE=FORCED");
        }

        let selector = Selector::build(&opts).map_err(WorkloadError::Core)?;
        self.workload_loop(&selector);
        Ok(())
    }

    fn session_setup(&mut self) {
        self.execute_sql("SET collation_connection = utf8mb4_0900_bin");
        if self.run.env.secondary_engine.is_some() {
            self.execute_sql("SET SESSION sql_generate_invisible_primary_key = TRUE");
        }
        let database = self.params.database.clone();
        if !database.is_empty() {
            self.execute_sql(&format!("USE {database}"));
        }
    }

    /// Session-scoped temporary tables; they never join the shared catalog.
    fn create_temporary_tables(&mut self) -> Result<Vec<Arc<Table>>> {
        let opts = &self.run.opts;
        let count = if opts.get_bool(Opt::OnlyTemporary) {
            opts.get_int(Opt::Tables)
        } else if opts.get_bool(Opt::NoTemporary) {
            0
        } else {
            opts.get_int(Opt::Tables) / opts.get_int(Opt::TemporaryProb).max(1)
        };
        let mut tables = Vec::with_capacity(count as usize);
        for i in 0..count {
            let table = Arc::new(Table::random(
                TableKind::Temporary,
                i + 1,
                false,
                &mut self.ctx,
                &self.run.env,
            ));
            if !bulkload::load_table(self, &table, true) {
                return Err(WorkloadError::Aborted);
            }
            tables.push(table);
        }
        Ok(tables)
    }

    /// Work-stealing initial load: normal table first, then its FK child,
    /// then its partitioned sibling, so children can reuse the parent's
    /// key vector.
    fn initial_load(&mut self) -> Result<()> {
        let tables_total = self.run.opts.get_int(Opt::Tables) as usize;
        loop {
            let current = self
                .run
                .table_started
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if current >= tables_total {
                break;
            }
            let id = current as i64 + 1;
            for kind in [TableKind::Normal, TableKind::Fk, TableKind::Partition] {
                let Some(table) = self.run.catalog.find_created(kind, id) else {
                    continue;
                };
                if !bulkload::load_table(self, &table, true) {
                    return Err(WorkloadError::Aborted);
                }
                self.run
                    .table_completed
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }

        // Wait for the other loaders before letting the workload begin.
        let expected = self.run.catalog.len();
        while self
            .run
            .table_completed
            .load(std::sync::atomic::Ordering::SeqCst)
            < expected
        {
            if self.run.failed() {
                self.logs
                    .line("another thread failed during the initial load, exiting");
                return Err(WorkloadError::Aborted);
            }
            std::thread::sleep(Duration::from_secs(1));
        }
        self.unique_keys.clear();
        Ok(())
    }

    /// CHECK TABLE sweep over the catalog before the workload.
    fn preload_check(&mut self) {
        let total = self.run.catalog.len();
        loop {
            let current = self
                .run
                .table_started
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if current >= total {
                break;
            }
            if let Some(table) = self.run.catalog.get(current) {
                if !ddl::check_table_preload(self, &table) {
                    self.run
                        .check_failures
                        .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            }
            self.run
                .table_completed
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
        while self
            .run
            .table_completed
            .load(std::sync::atomic::Ordering::SeqCst)
            < total
        {
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    fn workload_loop(&mut self, selector: &Selector) {
        let opts = Arc::clone(&self.run.opts);
        let single_thread_ddl = opts.get_bool(Opt::SingleThreadDdl);
        let thread_per_table = opts.get_bool(Opt::ThreadPerTable);

        let deadline =
            Instant::now() + Duration::from_secs(opts.get_int(Opt::Seconds).max(0) as u64);
        let mut frequencies = vec![(0u64, 0u64); OPTION_COUNT];
        let mut transactions = Transactions::new(&opts);

        while Instant::now() < deadline {
            let opt = selector.pick(&mut self.ctx.rng);
            self.ddl_query = opt.is_ddl();

            // Non-leader threads skip DDL when DDL is single-threaded.
            if self.thread_id != 0 && single_thread_ddl && self.ddl_query {
                continue;
            }

            for sql in transactions.before_operation(self.ddl_query, &mut self.ctx.rng) {
                self.execute_sql(&sql);
            }

            let table = if thread_per_table {
                self.run.catalog.get(self.thread_id)
            } else {
                self.run.catalog.random(&mut self.ctx.rng)
            };
            let Some(table) = table else {
                print_and_log(&mut self.logs, "catalog is empty, nothing to run against");
                self.run.set_failed();
                break;
            };

            ddl::dispatch(self, opt, &table);

            self.run.opts.bump_total(opt);
            frequencies[opt as usize].0 += 1;
            if self.success {
                self.run.opts.bump_success(opt);
                frequencies[opt as usize].1 += 1;
                self.success = false;
            }

            if self.run.failed() {
                self.logs
                    .line("another thread failed, exiting after this operation");
                break;
            }
        }

        for (&opt, &(total, success)) in Opt::ALL.iter().zip(frequencies.iter()) {
            if total > 0 {
                self.logs.line(&format!(
                    "{}, total=>{total}, success=> {success}",
                    opt.help()
                ));
            }
        }
    }
}

/// Transaction and savepoint bookkeeping of one worker.
///
/// Before each operation this decides which control statements to issue: a
/// running transaction is finished with COMMIT or ROLLBACK when its budget
/// runs out or DDL is next; otherwise it may place a savepoint or roll back
/// to an earlier one; and outside a transaction a new one may start.
pub struct Transactions {
    commit_prob: i64,
    savepoint_prob: i64,
    transaction_prob: i64,
    transaction_size: i64,
    /// Statements left in the open transaction; 0 means none is open.
    remaining: i64,
    /// Index of the newest savepoint, `SAVE{n}`.
    save_point: i64,
}

impl Transactions {
    pub fn new(opts: &sqlstorm_core::OptionRegistry) -> Self {
        Self {
            commit_prob: opts.get_int(Opt::CommitProb),
            savepoint_prob: opts.get_int(Opt::SavepointProbK),
            transaction_prob: opts.get_int(Opt::TransactionProbK),
            transaction_size: opts.get_int(Opt::TransactionsSize).max(1),
            remaining: 0,
            save_point: 0,
        }
    }

    /// The control statements to run before the next operation.
    pub fn before_operation(
        &mut self,
        next_is_ddl: bool,
        rng: &mut sqlstorm_core::Prng,
    ) -> Vec<String> {
        let mut statements = Vec::new();
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 || next_is_ddl {
                if rng.int_in(100, 1) > self.commit_prob {
                    statements.push("ROLLBACK".to_string());
                } else {
                    statements.push("COMMIT".to_string());
                }
                self.remaining = 0;
                self.save_point = 0;
            } else {
                if rng.int(1000) < self.savepoint_prob {
                    self.save_point += 1;
                    statements.push(format!("SAVEPOINT SAVE{}", self.save_point));
                }
                if self.save_point > 0 && rng.int(9999) < self.savepoint_prob {
                    let target = rng.int_in(self.save_point, 1);
                    statements.push(format!("ROLLBACK TO SAVEPOINT SAVE{target}"));
                    self.save_point = target - 1;
                }
            }
        }
        if self.remaining == 0 && rng.int(1000) < self.transaction_prob {
            statements.push("START TRANSACTION".to_string());
            self.remaining = rng.int_in(self.transaction_size, 1);
        }
        statements
    }

    /// Returns `true` while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlstorm_core::{OptionRegistry, Prng};

    fn always_transacting() -> Transactions {
        let mut opts = OptionRegistry::new();
        opts.set_int(Opt::TransactionProbK, 1000);
        opts.set_int(Opt::TransactionsSize, 5);
        opts.set_int(Opt::SavepointProbK, 1000);
        Transactions::new(&opts)
    }

    #[test]
    fn rollback_to_savepoint_names_an_earlier_one() {
        let mut transactions = always_transacting();
        let mut rng = Prng::from_seed(21);
        let mut live_savepoints: i64 = 0;
        for _ in 0..5000 {
            for sql in transactions.before_operation(false, &mut rng) {
                if let Some(n) = sql.strip_prefix("SAVEPOINT SAVE") {
                    let n: i64 = n.parse().unwrap();
                    assert_eq!(n, live_savepoints + 1, "savepoints must be sequential");
                    live_savepoints = n;
                } else if let Some(k) = sql.strip_prefix("ROLLBACK TO SAVEPOINT SAVE") {
                    let k: i64 = k.parse().unwrap();
                    assert!(
                        (1..=live_savepoints).contains(&k),
                        "rolled back to unknown savepoint SAVE{k}"
                    );
                    live_savepoints = k - 1;
                } else if sql == "COMMIT" || sql == "ROLLBACK" {
                    live_savepoints = 0;
                }
            }
        }
    }

    #[test]
    fn transaction_ends_before_ddl() {
        let mut transactions = always_transacting();
        let mut rng = Prng::from_seed(23);
        // Open a transaction with one non-DDL round.
        transactions.before_operation(false, &mut rng);
        assert!(transactions.in_transaction());

        let statements = transactions.before_operation(true, &mut rng);
        let terminator = statements
            .iter()
            .position(|s| s == "COMMIT" || s == "ROLLBACK")
            .expect("a DDL operation must terminate the open transaction");
        // Nothing but a fresh START TRANSACTION may follow the terminator.
        for sql in &statements[terminator + 1..] {
            assert_eq!(sql, "START TRANSACTION");
        }
    }

    #[test]
    fn transaction_budget_is_bounded() {
        let mut transactions = always_transacting();
        let mut rng = Prng::from_seed(29);
        let mut since_start = 0;
        for _ in 0..2000 {
            let statements = transactions.before_operation(false, &mut rng);
            since_start += 1;
            if statements.iter().any(|s| s == "START TRANSACTION") {
                since_start = 0;
            }
            assert!(since_start <= 5, "transaction ran past its budget");
        }
    }

    #[test]
    fn no_transactions_when_probability_is_zero() {
        let mut opts = OptionRegistry::new();
        opts.set_int(Opt::TransactionProbK, 0);
        let mut transactions = Transactions::new(&opts);
        let mut rng = Prng::from_seed(31);
        for _ in 0..500 {
            assert!(transactions.before_operation(false, &mut rng).is_empty());
            assert!(!transactions.in_transaction());
        }
    }
}
