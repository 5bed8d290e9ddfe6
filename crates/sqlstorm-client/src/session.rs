//! One connection to one endpoint.

use mysql::prelude::Queryable;
use mysql::{Conn, Opts, OptsBuilder, Row, Value};

use sqlstorm_config::EndpointParams;

use crate::error::{ClientError, Result};

/// A fully fetched result set: textual cells, NULL as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultGrid {
    pub columns: usize,
    pub rows: Vec<Vec<Option<String>>>,
}

/// What one statement produced.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// The result grid, when the statement returned one.
    pub rows: Option<ResultGrid>,
    /// Affected rows for statements without a result set.
    pub affected: u64,
}

/// A connection plus the parameters to re-establish it.
pub struct Session {
    conn: Conn,
    opts: Opts,
}

impl Session {
    /// Connects to the endpoint. A non-empty socket path is preferred over
    /// TCP when the address is local.
    pub fn connect(params: &EndpointParams) -> Result<Self> {
        let mut builder = OptsBuilder::new()
            .ip_or_hostname(Some(params.address.clone()))
            .tcp_port(params.port)
            .user(Some(params.user.clone()))
            .pass(Some(params.password.clone()));
        if !params.database.is_empty() {
            builder = builder.db_name(Some(params.database.clone()));
        }
        if !params.socket.is_empty() {
            builder = builder.socket(Some(params.socket.clone()));
        }
        if let Some(max_packet) = params.max_packet_size {
            builder = builder.max_allowed_packet(Some(max_packet));
        }
        let opts = Opts::from(builder);
        let conn = Conn::new(opts.clone())?;
        tracing::debug!(endpoint = %params.name, "connected");
        Ok(Self { conn, opts })
    }

    /// Re-establishes the connection after a transport loss.
    pub fn reconnect(&mut self) -> Result<()> {
        self.conn = Conn::new(self.opts.clone())?;
        tracing::debug!("reconnected");
        Ok(())
    }

    /// Executes one statement, fetching the whole result set when there is
    /// one.
    pub fn execute(&mut self, sql: &str) -> Result<Outcome> {
        let mut result = self.conn.query_iter(sql)?;
        let affected = result.affected_rows();
        let columns = result.columns();
        let column_count = columns.as_ref().len();

        if column_count == 0 {
            return Ok(Outcome {
                rows: None,
                affected,
            });
        }

        let mut grid = ResultGrid {
            columns: column_count,
            rows: Vec::new(),
        };
        for row in result.by_ref() {
            let row: Row = row?;
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..row.len() {
                cells.push(row.as_ref(i).and_then(value_text));
            }
            grid.rows.push(cells);
        }
        Ok(Outcome {
            rows: Some(grid),
            affected,
        })
    }

    /// Executes a statement and returns the first cell of the first row.
    pub fn read_single_value(&mut self, sql: &str) -> Result<Option<String>> {
        let outcome = self.execute(sql)?;
        Ok(outcome
            .rows
            .and_then(|grid| grid.rows.into_iter().next())
            .and_then(|row| row.into_iter().next())
            .flatten())
    }

    /// The numeric server version: 8.0.26 -> 80026.
    pub fn server_version_num(&mut self) -> Result<u32> {
        let text = self
            .read_single_value("SELECT @@version")?
            .unwrap_or_default();
        Ok(parse_version(&text))
    }

    /// A short host/version line for the node log.
    pub fn server_banner(&mut self) -> Result<String> {
        let version = self
            .read_single_value("SELECT @@version")?
            .unwrap_or_default();
        let comment = self
            .read_single_value("SELECT @@version_comment")?
            .unwrap_or_default();
        Ok(format!("{version} {comment}").trim().to_string())
    }
}

/// Renders a driver value as text; NULL becomes `None`.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(v) => Some(v.to_string()),
        Value::UInt(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Double(v) => Some(v.to_string()),
        date @ Value::Date(..) => Some(date.as_sql(true).trim_matches('\'').to_string()),
        time @ Value::Time(..) => Some(time.as_sql(true).trim_matches('\'').to_string()),
    }
}

/// Parses `8.0.26-debug` into 80026.
fn parse_version(text: &str) -> u32 {
    let numeric: String = text
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let mut parts = numeric.split('.');
    let major: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    major * 10_000 + minor * 100 + patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn version_parsing() {
        assert_eq!(parse_version("8.0.26"), 80026);
        assert_eq!(parse_version("5.7.35-38-log"), 50735);
        assert_eq!(parse_version("8.4.0"), 80400);
        assert_eq!(parse_version(""), 0);
    }

    #[test]
    fn value_text_shapes() {
        assert_eq!(value_text(&Value::NULL), None);
        assert_eq!(value_text(&Value::Int(-3)), Some("-3".to_string()));
        assert_eq!(
            value_text(&Value::Bytes(b"abc".to_vec())),
            Some("abc".to_string())
        );
    }

    // Anything beyond this needs a live server; the workload crate's
    // ignored end-to-end tests cover it.
}
