//! Cached alias queries.

use std::cell::{Cell, RefCell};

use rustc_hash::FxHashMap;

use ossa_ir::{Analysis, Function, Invalidation, PassOptions};

use super::{may_alias, EscapeConfig, ProjectedValue};

/// Memoizing front end to [`may_alias`].
///
/// Cached in a [`Context`](ossa_ir::Context) like any other analysis, so
/// any instruction or CFG edit drops the memo. Queries are keyed
/// unordered: asking `(y, x)` after `(x, y)` hits the cache. The cached
/// instance walks with the Context's [`PassOptions::escape`].
pub struct AliasAnalysis {
    config: EscapeConfig,
    memo: RefCell<FxHashMap<(ProjectedValue, ProjectedValue), bool>>,
    hits: Cell<usize>,
}

impl AliasAnalysis {
    pub fn new(config: EscapeConfig) -> Self {
        AliasAnalysis {
            config,
            memo: RefCell::new(FxHashMap::default()),
            hits: Cell::new(0),
        }
    }

    pub fn config(&self) -> &EscapeConfig {
        &self.config
    }

    /// May `x` and `y` address the same storage in `func`?
    pub fn may_alias(&self, func: &Function, x: &ProjectedValue, y: &ProjectedValue) -> bool {
        let key = (x.clone(), y.clone());
        let swapped = (y.clone(), x.clone());
        {
            let memo = self.memo.borrow();
            if let Some(&hit) = memo.get(&key).or_else(|| memo.get(&swapped)) {
                self.hits.set(self.hits.get() + 1);
                return hit;
            }
        }
        let result = may_alias(func, x, y, &self.config);
        self.memo.borrow_mut().insert(key, result);
        result
    }

    /// Number of distinct queries answered so far.
    pub fn cached_queries(&self) -> usize {
        self.memo.borrow().len()
    }

    /// Number of queries answered from the memo.
    pub fn cache_hits(&self) -> usize {
        self.hits.get()
    }
}

impl Analysis for AliasAnalysis {
    const INVALIDATED_BY: Invalidation = Invalidation::INSTRUCTIONS.union(Invalidation::BRANCHES);

    fn compute(_func: &Function, options: &PassOptions) -> Self {
        AliasAnalysis::new(options.escape)
    }
}
