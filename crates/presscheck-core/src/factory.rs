//! Test-data factory with an explicit, instance-owned sequence counter.
//!
//! Each run constructs its own factory; there is no process-global counter,
//! so parallel runs (or parallel tests) cannot observe each other's
//! sequence numbers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter owned by one factory instance.
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU64);

impl SequenceCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next value, starting at 1.
    pub fn next_value(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Produces unique, obviously-synthetic form values.
#[derive(Debug, Default)]
pub struct TestDataFactory {
    counter: SequenceCounter,
}

impl TestDataFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expands `{seq}` placeholders in a field template with a fresh
    /// sequence number. Templates without a placeholder pass through with
    /// the same counter advance, so values stay unique per call.
    pub fn render(&self, template: &str) -> String {
        let seq = self.counter.next_value();
        if template.contains("{seq}") {
            template.replace("{seq}", &seq.to_string())
        } else {
            template.to_string()
        }
    }

    /// A unique throwaway email address.
    pub fn email(&self) -> String {
        format!("qa-{}@presscheck.invalid", self.counter.next_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic_per_instance() {
        let factory = TestDataFactory::new();
        let a = factory.render("QA Robot {seq}");
        let b = factory.render("QA Robot {seq}");
        assert_eq!(a, "QA Robot 1");
        assert_eq!(b, "QA Robot 2");

        // a second factory starts fresh
        let other = TestDataFactory::new();
        assert_eq!(other.render("{seq}"), "1");
    }

    #[test]
    fn emails_are_unique() {
        let factory = TestDataFactory::new();
        assert_ne!(factory.email(), factory.email());
    }
}
