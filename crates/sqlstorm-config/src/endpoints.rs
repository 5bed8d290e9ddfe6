//! Endpoint resolution: one set of workers per server endpoint.
//!
//! Without a config file, one endpoint is built per entry of the
//! comma-separable `--port` value. With one, every INI section carrying
//! `run=true` becomes an endpoint.

use configparser::ini::Ini;

use sqlstorm_core::{Opt, OptionRegistry};

use crate::error::{ConfigError, Result};

/// Connection and sizing parameters of one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointParams {
    /// Display name, used as the log file prefix.
    pub name: String,
    pub address: String,
    pub socket: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
    pub threads: usize,
    pub queries_per_thread: u64,
    pub max_packet_size: Option<usize>,
    pub infile: String,
    pub logdir: String,
}

/// Resolves the endpoints for this run.
pub fn load_endpoints(opts: &OptionRegistry) -> Result<Vec<EndpointParams>> {
    let config_file = opts.get_str(Opt::ConfigFile);
    if config_file.is_empty() {
        return endpoints_from_ports(opts);
    }
    endpoints_from_ini(opts, config_file)
}

fn endpoints_from_ports(opts: &OptionRegistry) -> Result<Vec<EndpointParams>> {
    let mut endpoints = Vec::new();
    for port_text in OptionRegistry::split_list(opts.get_str(Opt::Port)) {
        let port = port_text
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue {
                section: "(command line)".to_string(),
                key: "port".to_string(),
                reason: e.to_string(),
            })?;
        endpoints.push(EndpointParams {
            name: format!("node.{port}"),
            address: opts.get_str(Opt::Address).to_string(),
            socket: opts.get_str(Opt::Socket).to_string(),
            user: opts.get_str(Opt::User).to_string(),
            password: opts.get_str(Opt::Password).to_string(),
            database: opts.get_str(Opt::Database).to_string(),
            port,
            threads: opts.get_int(Opt::Threads).max(1) as usize,
            queries_per_thread: 10_000,
            max_packet_size: None,
            infile: String::new(),
            logdir: opts.get_str(Opt::Logdir).to_string(),
        });
    }
    Ok(endpoints)
}

fn endpoints_from_ini(opts: &OptionRegistry, path: &str) -> Result<Vec<EndpointParams>> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|reason| ConfigError::Parse {
        path: path.to_string(),
        reason,
    })?;

    let get_int = |section: &str, key: &str, default: i64| -> Result<i64> {
        match ini.getint(section, key) {
            Ok(value) => Ok(value.unwrap_or(default)),
            Err(reason) => Err(ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                reason,
            }),
        }
    };

    let mut endpoints = Vec::new();
    for section in ini.sections() {
        let run = ini
            .getbool(&section, "run")
            .map_err(|reason| ConfigError::InvalidValue {
                section: section.clone(),
                key: "run".to_string(),
                reason,
            })?
            .unwrap_or(false);
        if !run {
            tracing::debug!(section, "skipping endpoint, run is not set");
            continue;
        }

        let get = |key: &str, default: &str| -> String {
            ini.get(&section, key).unwrap_or_else(|| default.to_string())
        };

        endpoints.push(EndpointParams {
            name: section.clone(),
            address: get("address", "localhost"),
            socket: get("socket", ""),
            user: get("user", "test"),
            password: get("password", ""),
            database: get("database", opts.get_str(Opt::Database)),
            port: get_int(&section, "port", 3306)? as u16,
            threads: get_int(&section, "threads", 10)?.max(1) as usize,
            queries_per_thread: get_int(&section, "queries-per-thread", 10_000)? as u64,
            max_packet_size: ini
                .getint(&section, "max-packet-size")
                .ok()
                .flatten()
                .map(|v| v as usize),
            infile: get("infile", ""),
            logdir: get("logdir", opts.get_str(Opt::Logdir)),
        });
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn single_port_from_command_line() {
        let opts = OptionRegistry::new();
        let endpoints = load_endpoints(&opts).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].name, "node.3306");
        assert_eq!(endpoints[0].port, 3306);
        assert_eq!(endpoints[0].threads, 10);
    }

    #[test]
    fn multiple_ports_fan_out() {
        let mut opts = OptionRegistry::new();
        opts.set_str(Opt::Port, "3306,3307 , 3308");
        let endpoints = load_endpoints(&opts).unwrap();
        let names: Vec<&str> = endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["node.3306", "node.3307", "node.3308"]);
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut opts = OptionRegistry::new();
        opts.set_str(Opt::Port, "not-a-port");
        assert!(load_endpoints(&opts).is_err());
    }

    #[test]
    fn ini_sections_require_run() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[primary]\nrun = true\naddress = db1.example\nport = 3310\nthreads = 4\n\
             user = stress\npassword = secret\ndatabase = bench\nlogdir = /tmp/logs\n\
             queries-per-thread = 500\n\n[standby]\nrun = false\naddress = db2.example\n"
        )
        .unwrap();

        let mut opts = OptionRegistry::new();
        opts.set_str(Opt::ConfigFile, file.path().display().to_string());
        let endpoints = load_endpoints(&opts).unwrap();
        assert_eq!(endpoints.len(), 1);
        let primary = &endpoints[0];
        assert_eq!(primary.name, "primary");
        assert_eq!(primary.address, "db1.example");
        assert_eq!(primary.port, 3310);
        assert_eq!(primary.threads, 4);
        assert_eq!(primary.user, "stress");
        assert_eq!(primary.queries_per_thread, 500);
        assert_eq!(primary.logdir, "/tmp/logs");
    }

    #[test]
    fn missing_ini_file_is_an_error() {
        let mut opts = OptionRegistry::new();
        opts.set_str(Opt::ConfigFile, "/nonexistent/sqlstorm.ini");
        assert!(load_endpoints(&opts).is_err());
    }
}
