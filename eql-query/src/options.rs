/// How the search picks the next variable among domain-backed candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchOrder {
    /// Smallest current domain first; ties keep query order.
    #[default]
    Cardinality,
    /// Variable creation order.
    Declaration,
}

#[derive(Debug, Clone)]
pub struct EvalOptions {
    pub order: SearchOrder,
    /// Upper bound on candidate bindings tried before giving up with
    /// [`crate::Error::SearchLimitExceeded`].
    pub max_steps: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            order: SearchOrder::Cardinality,
            max_steps: 10_000_000,
        }
    }
}

impl EvalOptions {
    pub fn with_order(mut self, order: SearchOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }
}
