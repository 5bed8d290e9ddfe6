//! The operation selector: cumulative weights over every enabled
//! SQL-producing option, built once per thread after the disable cascade
//! has run.

use std::collections::BTreeMap;

use sqlstorm_core::{CoreError, Opt, OptionRegistry, Prng};

/// Maps a random draw to an operation through cumulative weight ranges.
#[derive(Debug, Clone)]
pub struct Selector {
    ranges: BTreeMap<i64, Opt>,
    total: i64,
}

impl Selector {
    /// Builds the cumulative table. Fails when every weight is zero.
    pub fn build(opts: &OptionRegistry) -> Result<Self, CoreError> {
        let mut ranges = BTreeMap::new();
        let mut total = 0;
        for &opt in Opt::ALL {
            if !opt.is_sql() {
                continue;
            }
            let weight = opts.get_int(opt);
            if weight <= 0 {
                continue;
            }
            total += weight;
            ranges.insert(total, opt);
        }
        if total == 0 {
            return Err(CoreError::NothingToDo);
        }
        Ok(Self { ranges, total })
    }

    /// Draws an operation.
    pub fn pick(&self, rng: &mut Prng) -> Opt {
        let draw = rng.int(self.total);
        // The largest key equals `total`, so the range is never empty.
        let (_, &opt) = self
            .ranges
            .range(draw..)
            .next()
            .expect("draw is within the cumulative total");
        opt
    }

    /// Number of enabled operations.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The cumulative total, exposed for diagnostics.
    pub fn total(&self) -> i64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn zero_all_sql(opts: &mut OptionRegistry) {
        for &opt in Opt::ALL {
            if opt.is_sql() {
                opts.set_int(opt, 0);
            }
        }
    }

    #[test]
    fn empty_table_is_an_error() {
        let mut opts = OptionRegistry::new();
        zero_all_sql(&mut opts);
        assert!(matches!(Selector::build(&opts), Err(CoreError::NothingToDo)));
    }

    #[test]
    fn single_operation_always_picked() {
        let mut opts = OptionRegistry::new();
        zero_all_sql(&mut opts);
        opts.set_int(Opt::Truncate, 5);
        let selector = Selector::build(&opts).unwrap();
        assert_eq!(selector.len(), 1);
        let mut rng = Prng::from_seed(3);
        for _ in 0..100 {
            assert_eq!(selector.pick(&mut rng), Opt::Truncate);
        }
    }

    #[test]
    fn weights_shape_the_distribution() {
        let mut opts = OptionRegistry::new();
        zero_all_sql(&mut opts);
        opts.set_int(Opt::SelectAllRow, 900);
        opts.set_int(Opt::DropColumn, 100);
        let selector = Selector::build(&opts).unwrap();
        let mut rng = Prng::from_seed(7);
        let mut selects = 0;
        let total = 5000;
        for _ in 0..total {
            if selector.pick(&mut rng) == Opt::SelectAllRow {
                selects += 1;
            }
        }
        let share = selects as f64 / total as f64;
        assert!((0.85..0.95).contains(&share), "unexpected share {share}");
    }

    #[test]
    fn disabled_operations_never_fire() {
        let mut opts = OptionRegistry::new();
        zero_all_sql(&mut opts);
        opts.set_int(Opt::SelectAllRow, 10);
        opts.set_int(Opt::DropColumn, 0);
        let selector = Selector::build(&opts).unwrap();
        let mut rng = Prng::from_seed(11);
        for _ in 0..1000 {
            assert_ne!(selector.pick(&mut rng), Opt::DropColumn);
        }
    }
}
