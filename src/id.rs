use std::sync::atomic::{AtomicU64, Ordering};

/// Source of unique identifiers for receipts and subscription ids.
pub trait IdGenerator: Send + Sync {
    fn generate_id(&self) -> String;
}

/// Default generator: `"{prefix}-{n}"` with a monotonic counter.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("iridium")
    }
}

impl IdGenerator for SequentialIds {
    fn generate_id(&self) -> String {
        format!("{}-{}", self.prefix, self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate_id(&self) -> String {
        self()
    }
}
