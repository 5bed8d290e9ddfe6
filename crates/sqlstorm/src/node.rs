//! One node: the set of worker threads attached to one endpoint.

use std::sync::Arc;

use anyhow::{Context, Result};

use sqlstorm_client::Session;
use sqlstorm_config::EndpointParams;
use sqlstorm_core::Opt;
use sqlstorm_workload::logging::NodeLog;
use sqlstorm_workload::{NodeCounters, RunState, Worker};

/// Runs every worker thread of one endpoint and writes the node summary.
pub struct Node {
    pub params: EndpointParams,
    pub run: Arc<RunState>,
}

impl Node {
    pub fn new(params: EndpointParams, run: Arc<RunState>) -> Self {
        Self { params, run }
    }

    /// Connects, spawns the workers, joins them, and writes the final
    /// report. Returns an error only for failures before any worker ran.
    pub fn run_node(&self) -> Result<()> {
        let step = self.run.opts.get_int(Opt::Step);
        let node_log = NodeLog::create(&self.params.logdir, &self.params.name, step)
            .with_context(|| format!("creating the node log for {}", self.params.name))?;
        node_log.line(&format!(
            "- sqlstorm v{} step {step} node {}",
            env!("CARGO_PKG_VERSION"),
            self.params.name
        ));

        println!(
            "- Connecting to {} [{}]...",
            self.params.name, self.params.address
        );
        node_log.line(&format!(
            "- Connecting to {} [{}]...",
            self.params.name, self.params.address
        ));
        let mut session = Session::connect(&self.params)
            .with_context(|| format!("connecting to {}", self.params.name))?;
        let banner = session.server_banner().unwrap_or_default();
        node_log.line(&format!("- Connected server version: {banner}"));
        drop(session);

        if self.run.opts.get_bool(Opt::TestConnection) {
            println!("- Connected to {} ({banner})", self.params.name);
            return Ok(());
        }

        let counters = Arc::new(NodeCounters::default());
        std::thread::scope(|scope| {
            for thread_id in 0..self.params.threads {
                let params = self.params.clone();
                let run = Arc::clone(&self.run);
                let counters = Arc::clone(&counters);
                let node_log = Arc::clone(&node_log);
                scope.spawn(move || {
                    match Worker::new(thread_id, run.clone(), counters, node_log.clone(), params) {
                        Ok(mut worker) => {
                            if let Err(err) = worker.run_worker() {
                                node_log
                                    .line(&format!("thread {thread_id} stopped: {err}"));
                            }
                        }
                        Err(err) => {
                            eprintln!("worker {thread_id} failed to start: {err:#}");
                            node_log.line(&format!("worker {thread_id} failed to start: {err}"));
                            run.set_failed();
                        }
                    }
                });
            }
        });

        let (performed, failed) = counters.snapshot();
        let success_pct = if performed > 0 {
            (performed - failed) as f64 * 100.0 / performed as f64
        } else {
            0.0
        };
        node_log.line(&format!(
            "* NODE SUMMARY: {failed}/{performed} queries failed, ({success_pct:.2}% were successful)"
        ));
        Ok(())
    }
}
