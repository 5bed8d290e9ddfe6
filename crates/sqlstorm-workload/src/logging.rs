//! The domain log streams: one shared node log per endpoint, plus a
//! per-thread SQL log and an optional per-thread client-output log.

use std::fs::{self, File};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use sqlstorm_client::ResultGrid;

use crate::error::{Result, WorkloadError};

/// Console errors are capped; past this the run aborts rather than flood.
const MAX_CONSOLE_ERRORS: u32 = 300;

static CONSOLE_ERRORS: AtomicU32 = AtomicU32::new(0);

fn open_line_writer(path: &Path) -> Result<LineWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| WorkloadError::LogIo {
            path: path.display().to_string(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| WorkloadError::LogIo {
        path: path.display().to_string(),
        source,
    })?;
    Ok(LineWriter::new(file))
}

/// The shared per-node log: startup banner, every DDL with its server
/// error, and the final summary. One mutex covers writes and keeps
/// multi-line records intact.
#[derive(Debug)]
pub struct NodeLog {
    writer: Mutex<LineWriter<File>>,
    pub path: PathBuf,
}

impl NodeLog {
    /// Creates `<logdir>/<node>_ddl_step_<step>.log`.
    pub fn create(logdir: &str, node: &str, step: i64) -> Result<Arc<Self>> {
        let path = Path::new(logdir).join(format!("{node}_ddl_step_{step}.log"));
        let writer = open_line_writer(&path)?;
        Ok(Arc::new(Self {
            writer: Mutex::new(writer),
            path,
        }))
    }

    /// Appends one line.
    pub fn line(&self, text: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(writer, "{text}");
    }

    /// Records a DDL statement together with the server's error text.
    pub fn ddl(&self, thread_id: usize, sql: &str, error: &str) {
        self.line(&format!("{thread_id} {sql} {error}"));
    }
}

/// Per-thread log streams.
#[derive(Debug)]
pub struct ThreadLogs {
    thread: LineWriter<File>,
    client: Option<LineWriter<File>>,
    pub thread_path: PathBuf,
}

impl ThreadLogs {
    /// Creates `<logdir>/<node>_thread-<id>_step_<step>.log` and, when
    /// client output is wanted, the matching `_client_` stream.
    pub fn create(
        logdir: &str,
        node: &str,
        thread_id: usize,
        step: i64,
        with_client_log: bool,
    ) -> Result<Self> {
        let thread_path =
            Path::new(logdir).join(format!("{node}_thread-{thread_id}_step_{step}.log"));
        let thread = open_line_writer(&thread_path)?;
        let client = if with_client_log {
            let path =
                Path::new(logdir).join(format!("{node}_thread-{thread_id}_client_step_{step}.log"));
            Some(open_line_writer(&path)?)
        } else {
            None
        };
        Ok(Self {
            thread,
            client,
            thread_path,
        })
    }

    /// Appends one line to the thread log.
    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.thread, "{text}");
    }

    /// Appends without a newline, used for the duration prefix.
    pub fn fragment(&mut self, text: &str) {
        let _ = write!(self.thread, "{text}");
    }

    /// Dumps a result grid to the client log: cells separated by `#`,
    /// `EMPTY` for empty strings, `#NO DATA` for NULL. When a query-number
    /// counter is passed it is incremented and appended per row.
    pub fn client_rows(&mut self, grid: &ResultGrid, mut query_number: Option<&mut u64>) {
        let Some(client) = self.client.as_mut() else {
            return;
        };
        for row in &grid.rows {
            let mut line = String::new();
            for cell in row {
                match cell {
                    Some(text) if text.is_empty() => line.push_str("EMPTY#"),
                    Some(text) => {
                        line.push_str(text);
                        line.push('#');
                    }
                    None => line.push_str("#NO DATA#"),
                }
            }
            if let Some(number) = query_number.as_deref_mut() {
                *number += 1;
                line.push_str(&number.to_string());
            }
            let _ = writeln!(client, "{line}");
        }
    }
}

/// Prints to stderr and the thread log; aborts the process when the console
/// error cap is exceeded.
pub fn print_and_log(logs: &mut ThreadLogs, text: &str) {
    let so_far = CONSOLE_ERRORS.fetch_add(1, Ordering::Relaxed) + 1;
    eprintln!("{text}");
    logs.line(text);
    if so_far > MAX_CONSOLE_ERRORS {
        eprintln!("more than {MAX_CONSOLE_ERRORS} errors on the console, exiting");
        std::process::exit(1);
    }
}
