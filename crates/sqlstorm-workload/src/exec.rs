//! Statement execution: logging, counters, error policy, reconnects.

use std::time::{Duration, Instant};

use sqlstorm_core::Opt;

use crate::logging::print_and_log;
use crate::worker::Worker;

impl Worker {
    /// Executes one statement and interprets the outcome per the run's
    /// error policy. Returns `true` on server success.
    ///
    /// Failures are counted and logged; ignored error numbers keep the loop
    /// going (with a sleep-and-reconnect for transport classes); fatal
    /// classes raise the shared stop flag.
    pub fn execute_sql(&mut self, sql: &str) -> bool {
        let opts = &self.run.opts;
        let log_all = opts.get_bool(Opt::LogAllQueries);
        let log_failed = opts.get_bool(Opt::LogFailedQueries);
        let log_success = opts.get_bool(Opt::LogSucceededQueries);
        let log_duration = opts.get_bool(Opt::LogQueryDuration);
        let log_client_output = opts.get_bool(Opt::LogClientOutput);
        let log_query_numbers = opts.get_bool(Opt::LogQueryNumbers);

        let begin = Instant::now();
        let outcome = self.session.execute(sql);
        if log_duration {
            let stamp = chrono::Local::now().format("%Y-%m-%dT%X");
            let since_start = self.run.start.elapsed().as_micros();
            let took = begin.elapsed().as_micros();
            self.logs
                .fragment(&format!("{stamp} {since_start}=>{took}us "));
        }
        self.counters
            .performed
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        match outcome {
            Ok(result) => {
                self.success = true;
                self.consecutive_failures = 0;
                let row_count = result
                    .rows
                    .as_ref()
                    .map(|grid| grid.rows.len() as u64)
                    .unwrap_or(result.affected);
                self.last_result = result.rows;

                if log_client_output {
                    if let Some(grid) = self.last_result.take() {
                        let number = log_query_numbers.then_some(&mut self.query_number);
                        self.logs.client_rows(&grid, number);
                        self.last_result = Some(grid);
                    }
                }
                if log_all || log_success {
                    self.logs.line(&format!(" S {sql} rows:{row_count}"));
                }
                if self.ddl_query {
                    self.node_log.ddl(self.thread_id, sql, "");
                }
                true
            }
            Err(err) => {
                self.counters
                    .failed
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                self.consecutive_failures += 1;
                self.last_result = None;
                if log_all || log_failed {
                    self.logs.line(&format!(" F {sql}"));
                    self.logs.line(&format!("Error {err}"));
                }

                let ignored = match err.code() {
                    Some(code) => self.run.ignores(code),
                    None => self.run.ignore_all,
                };
                if ignored {
                    self.logs.line(&format!("Ignoring error {err}"));
                    if err.is_transport() {
                        std::thread::sleep(Duration::from_secs(5));
                        self.try_reconnect();
                    }
                } else if err.is_fatal() {
                    print_and_log(&mut self.logs, &format!("Fatal: {err} {sql}"));
                    self.run.set_failed();
                }
                if self.ddl_query {
                    self.node_log.ddl(self.thread_id, sql, &err.to_string());
                }
                false
            }
        }
    }

    /// One reconnect attempt after a transport loss; a second failure in a
    /// row stops the run.
    fn try_reconnect(&mut self) {
        match self.session.reconnect() {
            Ok(()) => self.logs.line("reconnected"),
            Err(err) => {
                print_and_log(&mut self.logs, &format!("reconnect failed: {err}"));
                self.run.set_failed();
            }
        }
    }

    /// Reads one scalar through the worker connection, empty on failure.
    pub fn read_single_value(&mut self, sql: &str) -> String {
        if !self.execute_sql(sql) {
            return String::new();
        }
        self.last_result
            .as_ref()
            .and_then(|grid| grid.rows.first())
            .and_then(|row| row.first())
            .and_then(|cell| cell.clone())
            .unwrap_or_default()
    }

    /// Polls the secondary engine's sync view until the table reports
    /// `SYNCING WITH CHANGE-STREAM`, five seconds per probe, 120 probes.
    pub fn wait_till_sync(&mut self, table_name: &str) {
        let Some(secondary) = self.run.env.secondary_engine.clone() else {
            return;
        };
        let select_in_secondary = self.run.opts.get_bool(Opt::SelectInSecondary);
        if select_in_secondary {
            self.execute_sql("SET @@SESSION.USE_SECONDARY_ENGINE=OFF");
        }
        let database = self.params.database.clone();
        let sql = format!(
            "select count(1) from performance_schema.{}_table_sync_status \
             where table_schema=\"{database}\" and table_name =\"{table_name}\" \
             and SYNC_STATUS=\"SYNCING WITH CHANGE-STREAM\"",
            secondary.to_ascii_lowercase()
        );
        let mut synced = false;
        for _ in 0..120 {
            if self.read_single_value(&sql) == "1" {
                synced = true;
                break;
            }
            std::thread::sleep(Duration::from_secs(5));
        }
        if !synced {
            print_and_log(
                &mut self.logs,
                &format!("Table {table_name} not synced to secondary in 600 seconds"),
            );
        }
        if select_in_secondary {
            self.execute_sql("SET @@SESSION.USE_SECONDARY_ENGINE=FORCED");
        }
    }
}
