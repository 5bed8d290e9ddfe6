//! The CLI surface, generated from the option registry: one long option
//! per registry entry, parsed back by tag.

use clap::builder::BoolishValueParser;
use clap::{Arg, ArgAction, ArgMatches, Command};

use sqlstorm_core::{Opt, OptionKind, OptionRegistry};

/// Builds the clap command from the registry's metadata.
pub fn command() -> Command {
    let mut cmd = Command::new("sqlstorm")
        .about("Randomized concurrent stress-test engine for MySQL-family servers")
        .long_about(
            "Synthesizes a random schema, seeds it with bulk data, then runs a \
             configurable mix of concurrent DDL/DML/SELECT operations against one \
             or more server endpoints for a bounded duration.",
        )
        .version(env!("CARGO_PKG_VERSION"))
        .disable_help_subcommand(true);

    for &opt in Opt::ALL {
        let mut arg = Arg::new(opt.name()).long(opt.name()).help(opt.help());
        arg = match opt.kind() {
            OptionKind::Bool => arg
                .num_args(0..=1)
                .default_missing_value("true")
                .value_parser(BoolishValueParser::new())
                .action(ArgAction::Set),
            OptionKind::Int => arg
                .value_parser(clap::value_parser!(i64))
                .action(ArgAction::Set),
            OptionKind::Str => {
                if opt == Opt::ServerOption {
                    arg.action(ArgAction::Append)
                } else {
                    arg.action(ArgAction::Set)
                }
            }
        };
        cmd = cmd.arg(arg);
    }
    cmd
}

/// Applies parsed matches back onto the registry, marking the options that
/// came from the command line. Returns the inline server-variable specs.
pub fn apply_matches(opts: &mut OptionRegistry, matches: &ArgMatches) -> Vec<String> {
    let mut server_specs = Vec::new();
    for &opt in Opt::ALL {
        let from_cli = matches
            .value_source(opt.name())
            .map(|source| source == clap::parser::ValueSource::CommandLine)
            .unwrap_or(false);
        if !from_cli {
            continue;
        }
        opts.mark_cli(opt);
        match opt.kind() {
            OptionKind::Bool => {
                if let Some(&value) = matches.get_one::<bool>(opt.name()) {
                    opts.set_bool(opt, value);
                }
            }
            OptionKind::Int => {
                if let Some(&value) = matches.get_one::<i64>(opt.name()) {
                    opts.set_int(opt, value);
                }
            }
            OptionKind::Str => {
                if opt == Opt::ServerOption {
                    if let Some(values) = matches.get_many::<String>(opt.name()) {
                        server_specs.extend(values.cloned());
                    }
                } else if let Some(value) = matches.get_one::<String>(opt.name()) {
                    opts.set_str(opt, value.clone());
                }
            }
        }
    }
    server_specs
}
