//! `sqlstorm` -- randomized concurrent stress-test engine.
//!
//! This is the coordinator: it builds the option registry, resolves the
//! endpoints, probes the server, prepares or resumes the catalog, spawns one
//! node per endpoint, and writes the step checkpoint at the end.

mod cli;
mod node;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use sqlstorm_client::Session;
use sqlstorm_config::{
    load_endpoints, load_server_options, parse_server_option, ServerVariable,
};
use sqlstorm_core::env::RunEnv;
use sqlstorm_core::{checkpoint, Opt, OptionRegistry, StringPool};
use sqlstorm_workload::{setup, RunState};

use node::Node;

/// Tracks whether a Ctrl+C has already been received.
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = cli::command().get_matches();
    let mut opts = OptionRegistry::new();
    let inline_server_specs = cli::apply_matches(&mut opts, &matches);

    if opts.get_bool(Opt::Verbose) {
        tracing_subscriber::fmt()
            .with_env_filter("sqlstorm=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let prob_file = opts.get_str(Opt::OptionProbFile).to_string();
    if !prob_file.is_empty() {
        sqlstorm_config::apply_prob_file(&mut opts, &prob_file)
            .context("applying the option-probability file")?;
    }

    let mut server_variables: Vec<ServerVariable> = Vec::new();
    for spec in &inline_server_specs {
        match parse_server_option(spec) {
            Some(variable) => server_variables.push(variable),
            None => bail!("malformed --server-option '{spec}'"),
        }
    }
    let server_option_file = opts.get_str(Opt::ServerOptionFile).to_string();
    if !server_option_file.is_empty() {
        server_variables.extend(
            load_server_options(&server_option_file)
                .context("loading the server-option file")?,
        );
    }

    let endpoints = load_endpoints(&opts).context("resolving endpoints")?;
    if endpoints.is_empty() {
        bail!("no endpoint to run against (check the config file's run flags)");
    }

    // Probe through the first endpoint; all nodes share one catalog.
    let mut session = Session::connect(&endpoints[0])
        .with_context(|| format!("connecting to {}", endpoints[0].name))?;
    let probe = setup::probe_server(&mut session, &opts).context("probing the server")?;
    setup::apply_feature_disables(&mut opts, &probe, !server_variables.is_empty())
        .context("resolving option constraints")?;
    let env = RunEnv::build(&opts, probe);

    let step = opts.get_int(Opt::Step);
    let pool = Arc::new(StringPool::generate(
        (opts.get_int(Opt::InitialSeed) + step) as u64,
    ));

    let prepare_phase = opts.get_bool(Opt::Prepare) || step == 1;
    if prepare_phase && !opts.get_bool(Opt::TestConnection) {
        setup::create_database_tablespaces(&mut session, &opts, &env)
            .context("creating the database and tablespaces")?;
    }
    drop(session);

    let catalog = setup::build_catalog(&mut opts, &env, &pool).context("building the catalog")?;
    let metadata_dir = setup::metadata_dir(&opts);
    let run = Arc::new(setup::build_run_state(
        opts,
        env,
        catalog,
        pool,
        server_variables,
    ));

    // First Ctrl+C asks the workers to stop; the second forces an exit.
    let handler_run = Arc::clone(&run);
    let _ = ctrlc::set_handler(move || {
        if CTRLC_RECEIVED.swap(true, Ordering::SeqCst) {
            std::process::exit(1);
        }
        eprintln!("stopping after the current operations...");
        handler_run.set_failed();
    });

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for params in endpoints {
            let node = Node::new(params, Arc::clone(&run));
            handles.push(scope.spawn(move || node.run_node()));
        }
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    eprintln!("Error: {err:#}");
                    run.set_failed();
                }
                Err(_) => {
                    eprintln!("a node thread panicked");
                    run.set_failed();
                }
            }
        }
    });

    if !run.opts.get_bool(Opt::TestConnection) && !run.catalog.is_empty() {
        let path = checkpoint::save(&run.catalog, Path::new(&metadata_dir), step)
            .context("writing the checkpoint")?;
        println!("Saving metadata to file {}", path.display());
    }

    println!("COMPLETED");
    if run.failed() {
        bail!("the run finished with failures, check the logs");
    }
    Ok(())
}
