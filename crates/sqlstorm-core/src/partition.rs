//! Partition layout model and the partition add/drop planner.

use serde::{Deserialize, Serialize};

use crate::env::RunEnv;
use crate::value::GenContext;
use crate::options::Opt;

/// Cap on values per LIST partition; with `max-partitions` it bounds the
/// LIST domain.
pub const MAX_RECORDS_PER_LIST_PARTITION: i64 = 100;

/// Partitioning strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartitionStrategy {
    Hash,
    Key,
    List,
    Range,
}

impl PartitionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            PartitionStrategy::Hash => "HASH",
            PartitionStrategy::Key => "KEY",
            PartitionStrategy::List => "LIST",
            PartitionStrategy::Range => "RANGE",
        }
    }
}

/// A RANGE partition: name and exclusive upper bound. The last partition of
/// the emitted definition always ends in MAXVALUE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeBound {
    pub name: String,
    pub upper: i64,
}

/// A LIST partition and its value set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPartition {
    pub name: String,
    pub values: Vec<i64>,
}

/// Partition layout of a partitioned table.
///
/// `ranges` is kept sorted by upper bound with no duplicates; for LIST
/// layouts the union of all partition values and `pool` is the original
/// domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionLayout {
    pub strategy: PartitionStrategy,
    pub count: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<RangeBound>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lists: Vec<ListPartition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pool: Vec<i64>,
}

impl PartitionLayout {
    /// Builds a random layout honoring `max-partitions`.
    pub fn random(ctx: &mut GenContext, env: &RunEnv) -> Self {
        let strategy = env.partition_strategies[ctx
            .rng
            .int(env.partition_strategies.len() as i64 - 1)
            as usize];
        let count = ctx.rng.int_in(ctx.opts.get_int(Opt::MaxPartitions), 2);
        let mut layout = Self {
            strategy,
            count,
            ranges: Vec::new(),
            lists: Vec::new(),
            pool: Vec::new(),
        };
        match strategy {
            PartitionStrategy::Hash | PartitionStrategy::Key => {}
            PartitionStrategy::Range => layout.fill_ranges(ctx),
            PartitionStrategy::List => layout.fill_lists(ctx),
        }
        layout
    }

    fn fill_ranges(&mut self, ctx: &mut GenContext) {
        let records = ctx.opts.get_int(Opt::InitialRecords);
        let domain = ctx.opts.get_int(Opt::UniqueRange) * records;
        let mut uppers: Vec<i64> = (0..self.count).map(|_| ctx.rng.int(domain)).collect();
        uppers.sort_unstable();
        // Nudge duplicates upward so bounds stay strictly increasing.
        for i in 1..uppers.len() {
            if uppers[i] <= uppers[i - 1] {
                uppers[i] = uppers[i - 1] + 1;
            }
        }
        self.ranges = uppers
            .into_iter()
            .enumerate()
            .map(|(i, upper)| RangeBound {
                name: format!("p{i}"),
                upper,
            })
            .collect();
    }

    fn fill_lists(&mut self, ctx: &mut GenContext) {
        let domain = ctx
            .rng
            .int_in(MAX_RECORDS_PER_LIST_PARTITION * self.count, self.count);
        self.pool = (0..domain).collect();
        for i in 0..self.count {
            let mut take = ctx.rng.int(domain) / self.count;
            if take == 0 {
                take = 1;
            }
            let mut part = ListPartition {
                name: format!("p{i}"),
                values: Vec::new(),
            };
            for _ in 0..take {
                if self.pool.is_empty() {
                    break;
                }
                let at = ctx.rng.int(self.pool.len() as i64 - 1) as usize;
                part.values.push(self.pool.remove(at));
            }
            self.lists.push(part);
        }
    }

    /// The PARTITION BY clause of the table definition.
    pub fn definition(&self) -> String {
        let mut def = format!(" PARTITION BY {} (ip_col)", self.strategy.as_str());
        match self.strategy {
            PartitionStrategy::Hash | PartitionStrategy::Key => {
                def.push_str(&format!(" PARTITIONS {}", self.count));
            }
            PartitionStrategy::Range => {
                def.push('(');
                for (i, part) in self.ranges.iter().enumerate() {
                    let bound = if i == self.ranges.len() - 1 {
                        "MAXVALUE".to_string()
                    } else {
                        part.upper.to_string()
                    };
                    def.push_str(&format!(" PARTITION {} VALUES LESS THAN ({bound})", part.name));
                    def.push(if i == self.ranges.len() - 1 { ')' } else { ',' });
                }
            }
            PartitionStrategy::List => {
                def.push('(');
                for (i, part) in self.lists.iter().enumerate() {
                    let values = part
                        .values
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(",");
                    def.push_str(&format!(" PARTITION {} VALUES IN ({values})", part.name));
                    def.push(if i == self.lists.len() - 1 { ')' } else { ',' });
                }
            }
        }
        def
    }

    /// A random existing partition name, for TRUNCATE/OPTIMIZE/... PARTITION.
    pub fn random_partition_name(&self, ctx: &mut GenContext) -> Option<String> {
        match self.strategy {
            PartitionStrategy::Hash | PartitionStrategy::Key => {
                if self.count == 0 {
                    None
                } else {
                    Some(format!("p{}", ctx.rng.int(self.count - 1)))
                }
            }
            PartitionStrategy::Range => {
                if self.ranges.is_empty() {
                    return None;
                }
                self.ranges
                    .get(ctx.rng.int(self.ranges.len() as i64 - 1) as usize)
                    .map(|p| p.name.clone())
            }
            PartitionStrategy::List => {
                if self.lists.is_empty() {
                    return None;
                }
                self.lists
                    .get(ctx.rng.int(self.lists.len() as i64 - 1) as usize)
                    .map(|p| p.name.clone())
            }
        }
    }
}

/// A planned partition mutation: the SQL to run and the model delta to apply
/// on success.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionPlan {
    AddHash { added: i64 },
    Coalesce { removed: i64 },
    DropRange { name: String },
    SplitRange { target: String, first: i64, second: i64 },
    DropList { name: String },
    AddList { name: String, values: Vec<i64> },
}

/// Plans an add/drop mutation for the layout, or `None` when the layout
/// refuses (range gap too small, list pool exhausted, nothing to drop).
pub fn plan_add_drop(
    table: &str,
    layout: &PartitionLayout,
    ctx: &mut GenContext,
    env: &RunEnv,
) -> Option<(String, PartitionPlan)> {
    let max_partitions = ctx.opts.get_int(Opt::MaxPartitions);
    match layout.strategy {
        PartitionStrategy::Hash | PartitionStrategy::Key => {
            // Add or coalesce roughly 10% of the partition cap at a time.
            let n = (ctx.rng.int(max_partitions) / 10).max(1);
            if ctx.rng.int(1) == 0 {
                let sql = format!("ALTER TABLE {table} ADD PARTITION PARTITIONS {n}");
                Some((sql, PartitionPlan::AddHash { added: n }))
            } else {
                if layout.count <= n {
                    return None;
                }
                let sql = format!(
                    "ALTER TABLE {table}{}, COALESCE PARTITION {n}",
                    env.algorithm_lock_clause(&mut ctx.rng)
                );
                Some((sql, PartitionPlan::Coalesce { removed: n }))
            }
        }
        PartitionStrategy::Range => {
            if layout.ranges.is_empty() {
                return None;
            }
            if ctx.rng.int(1) == 1 {
                let part = layout
                    .ranges
                    .get(ctx.rng.int(layout.ranges.len() as i64 - 1) as usize)?;
                let sql = format!(
                    "ALTER TABLE {table}{}, DROP PARTITION {}",
                    env.algorithm_lock_clause(&mut ctx.rng),
                    part.name
                );
                Some((sql, PartitionPlan::DropRange { name: part.name.clone() }))
            } else {
                // Reorganize one partition into two, with a fresh boundary
                // strictly inside the preceding gap.
                if layout.ranges.is_empty() {
                    return None;
                }
                let (target, lower, upper) = if layout.ranges.len() > 1 {
                    let at = ctx.rng.int_in(layout.ranges.len() as i64 - 1, 1) as usize;
                    (
                        layout.ranges[at].clone(),
                        layout.ranges[at - 1].upper,
                        layout.ranges[at].upper,
                    )
                } else {
                    (layout.ranges[0].clone(), 0, layout.ranges[0].upper)
                };
                if upper - lower <= 2 {
                    return None;
                }
                let first = ctx.rng.int_in(upper - 1, lower + 1);
                let sql = format!(
                    "ALTER TABLE {table} REORGANIZE PARTITION {name} INTO \
                     ( PARTITION {name}a VALUES LESS THAN ({first}), \
                     PARTITION {name}b VALUES LESS THAN ({second}))",
                    name = target.name,
                    second = upper,
                );
                Some((
                    sql,
                    PartitionPlan::SplitRange {
                        target: target.name,
                        first,
                        second: upper,
                    },
                ))
            }
        }
        PartitionStrategy::List => {
            if layout.lists.is_empty() {
                return None;
            }
            if ctx.rng.int(1) == 0 {
                let part = layout
                    .lists
                    .get(ctx.rng.int(layout.lists.len() as i64 - 1) as usize)?;
                let sql = format!(
                    "ALTER TABLE {table}{}, DROP PARTITION {}",
                    env.algorithm_lock_clause(&mut ctx.rng),
                    part.name
                );
                Some((sql, PartitionPlan::DropList { name: part.name.clone() }))
            } else {
                let records = ctx.opts.get_int(Opt::InitialRecords);
                let take = (ctx.rng.int(records) / ctx.rng.int_in(max_partitions, 1)).max(1);
                if take > layout.pool.len() as i64 {
                    return None;
                }
                // Sample distinct values out of the pool.
                let mut pool = layout.pool.clone();
                let mut values = Vec::with_capacity(take as usize);
                for _ in 0..take {
                    let at = ctx.rng.int(pool.len() as i64 - 1) as usize;
                    values.push(pool.remove(at));
                }
                let name = format!("p{}", ctx.rng.int_in(1000, 100));
                let listed = values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "ALTER TABLE {table} ADD PARTITION (PARTITION {name} VALUES IN ({listed}))"
                );
                Some((sql, PartitionPlan::AddList { name, values }))
            }
        }
    }
}

/// Applies a successful plan to the layout.
pub fn apply_add_drop(layout: &mut PartitionLayout, plan: &PartitionPlan) {
    match plan {
        PartitionPlan::AddHash { added } => layout.count += added,
        PartitionPlan::Coalesce { removed } => layout.count -= removed,
        PartitionPlan::DropRange { name } => {
            layout.ranges.retain(|p| p.name != *name);
            layout.count -= 1;
        }
        PartitionPlan::SplitRange { target, first, second } => {
            layout.ranges.retain(|p| p.name != *target);
            layout.ranges.push(RangeBound {
                name: format!("{target}a"),
                upper: *first,
            });
            layout.ranges.push(RangeBound {
                name: format!("{target}b"),
                upper: *second,
            });
            layout.ranges.sort_by_key(|p| p.upper);
            layout.count += 1;
        }
        PartitionPlan::DropList { name } => {
            if let Some(at) = layout.lists.iter().position(|p| p.name == *name) {
                let part = layout.lists.remove(at);
                layout.pool.extend(part.values);
                layout.count -= 1;
            }
        }
        PartitionPlan::AddList { name, values } => {
            layout.pool.retain(|v| !values.contains(v));
            layout.lists.push(ListPartition {
                name: name.clone(),
                values: values.clone(),
            });
            layout.count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use pretty_assertions::assert_eq;

    fn range_layout() -> PartitionLayout {
        PartitionLayout {
            strategy: PartitionStrategy::Range,
            count: 3,
            ranges: vec![
                RangeBound { name: "p0".into(), upper: 100 },
                RangeBound { name: "p1".into(), upper: 200 },
                RangeBound { name: "p2".into(), upper: 300 },
            ],
            lists: Vec::new(),
            pool: Vec::new(),
        }
    }

    fn list_layout() -> PartitionLayout {
        PartitionLayout {
            strategy: PartitionStrategy::List,
            count: 2,
            ranges: Vec::new(),
            lists: vec![
                ListPartition { name: "p0".into(), values: vec![0, 2, 4] },
                ListPartition { name: "p1".into(), values: vec![1, 3] },
            ],
            pool: vec![5, 6, 7],
        }
    }

    fn assert_strictly_increasing(layout: &PartitionLayout) {
        for pair in layout.ranges.windows(2) {
            assert!(pair[0].upper < pair[1].upper, "bounds not increasing: {layout:?}");
        }
    }

    #[test]
    fn random_range_bounds_strictly_increase() {
        let (mut ctx, env) = test_context(11);
        for _ in 0..50 {
            let layout = PartitionLayout::random(&mut ctx, &env);
            if layout.strategy == PartitionStrategy::Range {
                assert_strictly_increasing(&layout);
                assert_eq!(layout.ranges.len() as i64, layout.count);
            }
        }
    }

    #[test]
    fn random_list_partitions_the_domain() {
        let (mut ctx, env) = test_context(13);
        for _ in 0..50 {
            let layout = PartitionLayout::random(&mut ctx, &env);
            if layout.strategy == PartitionStrategy::List {
                let assigned: i64 = layout.lists.iter().map(|l| l.values.len() as i64).sum();
                let domain = assigned + layout.pool.len() as i64;
                let mut all: Vec<i64> = layout
                    .lists
                    .iter()
                    .flat_map(|l| l.values.iter().copied())
                    .chain(layout.pool.iter().copied())
                    .collect();
                all.sort_unstable();
                all.dedup();
                assert_eq!(all.len() as i64, domain, "domain values must be disjoint");
            }
        }
    }

    #[test]
    fn split_range_keeps_bounds_increasing() {
        let (mut ctx, env) = test_context(17);
        let mut layout = range_layout();
        for _ in 0..200 {
            if let Some((_sql, plan)) = plan_add_drop("tt_1_p", &layout, &mut ctx, &env) {
                apply_add_drop(&mut layout, &plan);
                assert_strictly_increasing(&layout);
                assert_eq!(layout.ranges.len() as i64, layout.count);
            }
            if layout.ranges.is_empty() {
                break;
            }
        }
    }

    #[test]
    fn split_refuses_small_gap() {
        let (mut ctx, env) = test_context(19);
        let layout = PartitionLayout {
            strategy: PartitionStrategy::Range,
            count: 2,
            ranges: vec![
                RangeBound { name: "p0".into(), upper: 10 },
                RangeBound { name: "p1".into(), upper: 12 },
            ],
            lists: Vec::new(),
            pool: Vec::new(),
        };
        for _ in 0..100 {
            if let Some((_sql, plan)) = plan_add_drop("t", &layout, &mut ctx, &env) {
                assert!(
                    !matches!(plan, PartitionPlan::SplitRange { target, .. } if target == "p1"),
                    "must refuse to split a gap of two"
                );
            }
        }
    }

    #[test]
    fn list_add_drop_conserves_domain() {
        let (mut ctx, env) = test_context(23);
        let mut layout = list_layout();
        let domain = 8;
        for _ in 0..200 {
            if layout.lists.is_empty() {
                break;
            }
            if let Some((_sql, plan)) = plan_add_drop("t", &layout, &mut ctx, &env) {
                apply_add_drop(&mut layout, &plan);
                let assigned: usize = layout.lists.iter().map(|l| l.values.len()).sum();
                assert_eq!(assigned + layout.pool.len(), domain);
            }
        }
    }

    #[test]
    fn definition_range_ends_in_maxvalue() {
        let layout = range_layout();
        let def = layout.definition();
        assert!(def.starts_with(" PARTITION BY RANGE (ip_col)("));
        assert!(def.contains("PARTITION p0 VALUES LESS THAN (100)"));
        assert!(def.ends_with("PARTITION p2 VALUES LESS THAN (MAXVALUE))"));
    }

    #[test]
    fn definition_hash_emits_count() {
        let layout = PartitionLayout {
            strategy: PartitionStrategy::Hash,
            count: 7,
            ranges: Vec::new(),
            lists: Vec::new(),
            pool: Vec::new(),
        };
        assert_eq!(layout.definition(), " PARTITION BY HASH (ip_col) PARTITIONS 7");
    }

    #[test]
    fn definition_list_emits_values() {
        let layout = list_layout();
        let def = layout.definition();
        assert!(def.contains("PARTITION p0 VALUES IN (0,2,4)"));
        assert!(def.ends_with("PARTITION p1 VALUES IN (1,3))"));
    }
}
