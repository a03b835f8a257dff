/// Upper bound on random-order draws before realization gives up.
pub const DEFAULT_MAX_ORDER_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RealizeOptions {
    pub max_order_attempts: Option<usize>,
}

impl RealizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_order_attempts(mut self, attempts: usize) -> Self {
        self.max_order_attempts = Some(attempts);
        self
    }

    pub fn max_order_attempts(&self) -> usize {
        self.max_order_attempts
            .unwrap_or(DEFAULT_MAX_ORDER_ATTEMPTS)
            .max(1)
    }
}
