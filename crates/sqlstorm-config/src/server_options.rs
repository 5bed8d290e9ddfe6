//! Server-variable specs for the `set-global-variable` operation:
//! `name=value1,value2` entries from the command line or a file.

use std::fs;

use crate::error::{ConfigError, Result};

/// One server variable and the values the workload may set it to.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerVariable {
    pub name: String,
    pub values: Vec<String>,
}

/// Parses one `name=value1,value2` spec.
pub fn parse_server_option(spec: &str) -> Option<ServerVariable> {
    let (name, values) = spec.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let values: Vec<String> = values
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(ServerVariable {
        name: name.to_string(),
        values,
    })
}

/// Loads server-variable specs from a file, one per line; `#` comments and
/// blank lines are ignored.
pub fn load_server_options(path: &str) -> Result<Vec<ServerVariable>> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    let mut variables = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_server_option(line) {
            Some(variable) => variables.push(variable),
            None => {
                return Err(ConfigError::MalformedLine {
                    path: path.to_string(),
                    line: line.to_string(),
                });
            }
        }
    }
    Ok(variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn parses_inline_spec() {
        let variable = parse_server_option("innodb_flush_log_at_trx_commit=0,1,2").unwrap();
        assert_eq!(variable.name, "innodb_flush_log_at_trx_commit");
        assert_eq!(variable.values, vec!["0", "1", "2"]);
    }

    #[test]
    fn rejects_empty_parts() {
        assert!(parse_server_option("=1").is_none());
        assert!(parse_server_option("name=").is_none());
        assert!(parse_server_option("no-equals").is_none());
    }

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# vars\nsort_buffer_size=32768,65536\n\nmax_heap_table_size=16777216").unwrap();
        let variables = load_server_options(&file.path().display().to_string()).unwrap();
        assert_eq!(variables.len(), 2);
        assert_eq!(variables[0].name, "sort_buffer_size");
    }
}
