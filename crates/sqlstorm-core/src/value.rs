//! Random value generation for columns.

use std::collections::HashSet;
use std::sync::Arc;

use crate::column::{Column, TypeTag};
use crate::options::{Opt, OptionRegistry};
use crate::rng::{Prng, StringPool};

/// Per-thread generation context: the thread PRNG plus the shared string
/// pool and option registry.
#[derive(Debug)]
pub struct GenContext {
    pub rng: Prng,
    pub pool: Arc<StringPool>,
    pub opts: Arc<OptionRegistry>,
}

impl GenContext {
    pub fn new(seed: u64, pool: Arc<StringPool>, opts: Arc<OptionRegistry>) -> Self {
        Self {
            rng: Prng::from_seed(seed),
            pool,
            opts,
        }
    }

    /// Negates `v` with probability `1 - positive-int-prob/1000`.
    pub fn try_negative(&mut self, v: i64) -> i64 {
        if self.negate_coin() { -v } else { v }
    }

    fn negate_coin(&mut self) -> bool {
        self.rng.int(999) >= self.opts.get_int(Opt::PositiveIntProb)
    }

    /// A random string with length in `[lower, upper]` from the pool.
    pub fn rand_string(&mut self, upper: i64, lower: i64) -> String {
        self.pool.rand_string(&mut self.rng, upper.max(2), lower.min(upper.max(2)))
    }

    /// A random SQL literal for the column, honoring the NULL probability.
    ///
    /// Non-auto-increment primary keys never yield NULL; BLOB values are
    /// `_binary'..'` literals, BIT values `b'..'`, strings and temporal
    /// values single-quoted, numerics bare (possibly negated).
    pub fn column_value(&mut self, col: &Column) -> String {
        let null_prob = self.opts.get_int(Opt::NullProb);
        if self.rng.int(1000) <= null_prob
            && col.nullable
            && !(col.primary_key && !col.auto_increment)
        {
            return "NULL".to_string();
        }

        let records = self.opts.get_int(Opt::InitialRecords);
        let unique_range = self.opts.get_int(Opt::UniqueRange);
        match col.value_tag() {
            TypeTag::Integer => {
                let v = self.rng.int(records);
                self.try_negative(v).to_string()
            }
            TypeTag::Int => {
                let v = self.rng.int(unique_range * records);
                self.try_negative(v).to_string()
            }
            TypeTag::Float => {
                let negate = self.negate_coin();
                self.rng.float_str(records as f64, negate)
            }
            TypeTag::Double => {
                let negate = self.negate_coin();
                let upper = records as f64 / unique_range.max(1) as f64;
                self.rng.double_str(upper, negate)
            }
            TypeTag::Char | TypeTag::Varchar | TypeTag::Text => {
                format!("'{}'", self.rand_string(col.length.max(2), 2))
            }
            TypeTag::Blob => format!("_binary'{}'", self.rand_string(col.length.max(2), 2)),
            TypeTag::Bit => self.rng.bit_literal(col.length.max(1)),
            TypeTag::Bool => if self.rng.int(1) == 1 { "true" } else { "false" }.to_string(),
            TypeTag::Date => format!("'{}'", self.rng.date()),
            TypeTag::DateTime => format!("'{}'", self.rng.datetime()),
            TypeTag::Timestamp => format!("'{}'", self.rng.timestamp()),
            TypeTag::Generated => unreachable!("value_tag resolves generated columns"),
        }
    }

    /// Pre-generates `n` unique integers for primary/unique key columns.
    ///
    /// The domain is `unique-range * initial-records-in-table`; one run in
    /// ten (and any configuration whose domain cannot fit `n` distinct
    /// values) falls back to the sequential range `1..=n`.
    pub fn unique_keys(&mut self, n: i64) -> Vec<i64> {
        if n <= 0 {
            return Vec::new();
        }
        let domain = self.opts.get_int(Opt::UniqueRange) * self.opts.get_int(Opt::InitialRecords);
        let all_positive = self.opts.get_int(Opt::PositiveIntProb) >= 1000;
        if self.rng.int(100) < 10
            || (self.opts.get_int(Opt::UniqueRange) == 1 && all_positive)
            || domain < n
        {
            return (1..=n).collect();
        }
        let mut seen = HashSet::with_capacity(n as usize);
        let mut keys = Vec::with_capacity(n as usize);
        while keys.len() < n as usize {
            let draw = self.rng.int_in(domain, 1);
            let v = self.try_negative(draw);
            if seen.insert(v) {
                keys.push(v);
            }
        }
        keys
    }
}
