//! Shared run state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use sqlstorm_config::ServerVariable;
use sqlstorm_core::{env::RunEnv, Catalog, Opt, OptionRegistry, StringPool};

use crate::grammar::GrammarTemplate;

/// Per-node query counters, shared by the node's workers.
#[derive(Debug, Default)]
pub struct NodeCounters {
    pub performed: AtomicU64,
    pub failed: AtomicU64,
}

impl NodeCounters {
    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.performed.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}

/// Everything the workers share for one run.
#[derive(Debug)]
pub struct RunState {
    pub opts: Arc<OptionRegistry>,
    pub env: RunEnv,
    pub catalog: Catalog,
    pub pool: Arc<StringPool>,
    pub server_variables: Vec<ServerVariable>,
    pub grammar: Vec<GrammarTemplate>,

    /// Cooperative stop: set by any worker that hits a fatal error.
    failed: AtomicBool,
    /// Server error numbers the run tolerates; `ignore_all` tolerates every
    /// one.
    pub ignore_all: bool,
    pub ignored_errors: HashSet<u16>,

    /// Work-stealing cursor of the initial load / preload-check phases.
    pub table_started: AtomicUsize,
    /// Tables whose initial load finished.
    pub table_completed: AtomicUsize,
    /// CHECK TABLE failures found by the preload sweep.
    pub check_failures: AtomicUsize,

    pub start: Instant,
}

impl RunState {
    pub fn new(
        opts: Arc<OptionRegistry>,
        env: RunEnv,
        catalog: Catalog,
        pool: Arc<StringPool>,
        server_variables: Vec<ServerVariable>,
        grammar: Vec<GrammarTemplate>,
    ) -> Self {
        let spec = opts.get_str(Opt::IgnoreErrors);
        let ignore_all = spec.trim() == "all";
        let ignored_errors = OptionRegistry::split_list(spec)
            .iter()
            .filter_map(|n| n.parse().ok())
            .collect();
        Self {
            opts,
            env,
            catalog,
            pool,
            server_variables,
            grammar,
            failed: AtomicBool::new(false),
            ignore_all,
            ignored_errors,
            table_started: AtomicUsize::new(0),
            table_completed: AtomicUsize::new(0),
            check_failures: AtomicUsize::new(0),
            start: Instant::now(),
        }
    }

    /// Returns `true` once any worker has requested a stop.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Stops the run; every worker exits after its current operation.
    pub fn set_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    /// Returns `true` when the server error number is tolerated.
    pub fn ignores(&self, code: u16) -> bool {
        self.ignore_all || self.ignored_errors.contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlstorm_core::env::ServerProbe;

    fn run_state(spec: &str) -> RunState {
        let mut opts = OptionRegistry::new();
        opts.set_str(Opt::IgnoreErrors, spec);
        let opts = Arc::new(opts);
        let env = RunEnv::build(&opts, ServerProbe::default());
        RunState::new(
            Arc::clone(&opts),
            env,
            Catalog::new(),
            Arc::new(StringPool::generate(1)),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn ignore_list_parses() {
        let run = run_state("1062, 1213");
        assert!(run.ignores(1062));
        assert!(run.ignores(1213));
        assert!(!run.ignores(1064));
    }

    #[test]
    fn ignore_all() {
        let run = run_state("all");
        assert!(run.ignores(9999));
    }

    #[test]
    fn failure_flag_roundtrip() {
        let run = run_state("");
        assert!(!run.failed());
        run.set_failed();
        assert!(run.failed());
    }
}
