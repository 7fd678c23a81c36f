//! Failure classification and bounded retry for browser operations.
//!
//! Every browser-facing call in presscheck funnels through
//! [`retry_operation`]: failures are mapped to a small closed set of
//! [`ErrorClass`] values, the class decides whether a reattempt is worth
//! making, and a kind-specific recovery action runs between attempts.
//!
//! Classification is primarily a property of the error type itself (the
//! browser adapter's error enum implements [`Classified`] variant-by-variant).
//! [`classify_message`] exists as the fallback for opaque errors surfaced by
//! third-party code, where substring matching on the message text is all
//! that is available.

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Coarse classification of an operation failure.
///
/// The set is closed: retry policy is defined exhaustively over these
/// variants and nothing else inspects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Connection-level failure (DNS, refused, reset, `net::` codes).
    Network,
    /// An explicit wait or operation deadline elapsed.
    Timeout,
    /// A selector or locator resolved to nothing.
    ElementNotFound,
    /// The browser process or execution context went away.
    BrowserCrash,
    /// Navigation to a URL failed.
    Navigation,
    /// A test assertion failed; never transient.
    Assertion,
    /// Anything that matched no known pattern.
    Unknown,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Network => "network",
            ErrorClass::Timeout => "timeout",
            ErrorClass::ElementNotFound => "element_not_found",
            ErrorClass::BrowserCrash => "browser_crash",
            ErrorClass::Navigation => "navigation",
            ErrorClass::Assertion => "assertion",
            ErrorClass::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// An error that knows its own [`ErrorClass`].
///
/// Typed errors (the browser adapter's enum) implement this directly so
/// classification never depends on message text. Opaque errors fall back to
/// [`classify_message`].
pub trait Classified {
    /// Returns the failure class of this error.
    fn class(&self) -> ErrorClass;
}

/// Classifies an error by substring-matching its message text.
///
/// Matching is case-insensitive and evaluated in a fixed priority order;
/// the first matching rule wins. Network and timeout patterns are checked
/// before the more generic "browser"/"context" patterns so a network failure
/// whose message mentions the browser is not misreported as a crash.
///
/// # Examples
///
/// ```
/// use presscheck_core::{classify_message, ErrorClass};
///
/// assert_eq!(
///     classify_message("net::ERR_CONNECTION_REFUSED at https://x"),
///     ErrorClass::Network
/// );
/// assert_eq!(
///     classify_message("TimeoutError: waiting for selector to be visible"),
///     ErrorClass::Timeout
/// );
/// ```
#[must_use]
pub fn classify_message(message: &str) -> ErrorClass {
    let text = message.to_lowercase();
    let has = |needle: &str| text.contains(needle);

    if has("net::") || has("network") || has("connection") {
        ErrorClass::Network
    } else if has("timeout") || has("waiting for") {
        ErrorClass::Timeout
    } else if has("element") || has("locator") || has("selector") {
        ErrorClass::ElementNotFound
    } else if has("target closed") || has("browser") || has("context") {
        ErrorClass::BrowserCrash
    } else if has("navigation") || has("goto") || has("page.goto") {
        ErrorClass::Navigation
    } else if has("expect") || has("assertion") {
        ErrorClass::Assertion
    } else {
        ErrorClass::Unknown
    }
}

/// What kind of operation a retry loop is wrapping.
///
/// The kind changes one policy decision: a missing element during an
/// interaction may be transient DOM churn and is retried, while a missing
/// element anywhere else is treated as definitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    #[default]
    Generic,
    Navigation,
    ElementInteraction,
    Network,
    Assertion,
}

/// Retry policy for one logical operation.
///
/// Construct via the preset constructors; the presets are the only
/// configurations the check scenarios use.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.
    pub max_retries: u32,
    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Operation kind, used by the element-not-found policy.
    pub kind: OperationKind,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            kind: OperationKind::Generic,
        }
    }
}

impl RetryConfig {
    /// Preset for network fetches: 3 attempts, 1s base, ×2 backoff.
    #[must_use]
    pub fn network() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            kind: OperationKind::Network,
        }
    }

    /// Preset for element interaction: 2 attempts, 500ms base, ×1.5 backoff.
    #[must_use]
    pub fn element_interaction() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            backoff_multiplier: 1.5,
            kind: OperationKind::ElementInteraction,
        }
    }

    /// Preset for navigation: 2 attempts, 2s base, ×2 backoff.
    #[must_use]
    pub fn navigation() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 2000,
            backoff_multiplier: 2.0,
            kind: OperationKind::Navigation,
        }
    }

    /// Preset for assertion re-checks: single attempt, 1s base, flat.
    #[must_use]
    pub fn assertion() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 1000,
            backoff_multiplier: 1.0,
            kind: OperationKind::Assertion,
        }
    }

    /// Backoff delay applied after the given 1-based failed attempt,
    /// before jitter.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let ms = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exp as i32);
        Duration::from_millis(ms as u64)
    }
}

/// Decides whether a failed attempt should be retried.
///
/// `attempt` is the 1-based number of the attempt that just failed.
/// Assertion failures signal a real test failure and browser crashes need a
/// fresh execution context, so neither is ever retried in-place.
#[must_use]
pub fn is_retryable(class: ErrorClass, attempt: u32, config: &RetryConfig) -> bool {
    if attempt >= config.max_retries {
        return false;
    }
    match class {
        ErrorClass::Assertion | ErrorClass::BrowserCrash | ErrorClass::Unknown => false,
        ErrorClass::Network | ErrorClass::Timeout | ErrorClass::Navigation => true,
        ErrorClass::ElementNotFound => config.kind == OperationKind::ElementInteraction,
    }
}

/// Recovery surface used between retry attempts.
///
/// The retry loop owns the policy (which signal to wait for, and for how
/// long); implementors only supply the mechanisms. All methods are
/// best-effort: failures are logged by the loop and never propagated.
#[async_trait]
pub trait Recovery: Send + Sync {
    /// Waits for a lightweight "content loaded" signal.
    async fn wait_content_loaded(&self, cap: Duration) -> Result<(), String>;

    /// Waits for the network to go idle.
    async fn wait_network_idle(&self, cap: Duration) -> Result<(), String>;

    /// Whether the execution context is still usable.
    fn is_alive(&self) -> bool {
        true
    }
}

/// No-op recovery for operations with no page attached (plain HTTP, file I/O).
pub struct NoRecovery;

#[async_trait]
impl Recovery for NoRecovery {
    async fn wait_content_loaded(&self, _cap: Duration) -> Result<(), String> {
        Ok(())
    }

    async fn wait_network_idle(&self, _cap: Duration) -> Result<(), String> {
        Ok(())
    }
}

/// Terminal failure of a retried operation.
///
/// Carries the last underlying error plus the class of every failure seen
/// along the way, in attempt order.
#[derive(Debug)]
pub struct RetryError<E> {
    /// The error from the final attempt.
    pub last: E,
    /// Classification of each failed attempt, in order.
    pub history: Vec<ErrorClass>,
    /// How many attempts were made.
    pub attempts: u32,
    /// Name of the wrapped operation.
    pub operation: String,
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let history: Vec<String> = self.history.iter().map(ToString::to_string).collect();
        write!(
            f,
            "{} failed after {} attempt(s) [{}]: {}",
            self.operation,
            self.attempts,
            history.join(" -> "),
            self.last
        )
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for RetryError<E> {}

impl<E> RetryError<E> {
    /// Class of the final failure.
    #[must_use]
    pub fn final_class(&self) -> ErrorClass {
        self.history.last().copied().unwrap_or(ErrorClass::Unknown)
    }
}

/// Runs `operation` under the given retry policy.
///
/// On failure the error is classified, [`is_retryable`] is consulted, and a
/// non-retryable failure propagates immediately. Otherwise the loop sleeps
/// for the exponential backoff delay plus up to 10% random jitter, performs
/// the class-specific recovery action, and reattempts. The final failure is
/// returned annotated with the full classification history.
///
/// A success after two or more attempts logs the attempt count and class
/// sequence; this is diagnostic only and does not change the return value.
pub async fn retry_operation<T, E, F, Fut>(
    name: &str,
    config: &RetryConfig,
    recovery: &dyn Recovery,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Classified + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut history: Vec<ErrorClass> = Vec::new();

    for attempt in 1..=config.max_retries.max(1) {
        match operation().await {
            Ok(value) => {
                if attempt >= 2 {
                    let classes: Vec<String> =
                        history.iter().map(ToString::to_string).collect();
                    info!(
                        operation = name,
                        attempts = attempt,
                        "succeeded after retries [{}]",
                        classes.join(" -> ")
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                let class = err.class();
                history.push(class);

                if !is_retryable(class, attempt, config) {
                    debug!(
                        operation = name,
                        attempt,
                        class = %class,
                        "not retryable, propagating"
                    );
                    return Err(RetryError {
                        last: err,
                        history,
                        attempts: attempt,
                        operation: name.to_string(),
                    });
                }

                let base = config.delay_for_attempt(attempt);
                let jitter = base.mul_f64(rand::thread_rng().gen_range(0.0..0.1));
                warn!(
                    operation = name,
                    attempt,
                    class = %class,
                    delay_ms = (base + jitter).as_millis() as u64,
                    "retrying after backoff"
                );
                tokio::time::sleep(base + jitter).await;
                recover(class, recovery).await;
            }
        }
    }

    unreachable!("retry loop always returns on the final attempt")
}

/// Class-specific recovery between attempts. Failures are swallowed.
async fn recover(class: ErrorClass, recovery: &dyn Recovery) {
    const SIGNAL_CAP: Duration = Duration::from_secs(5);
    let outcome = match class {
        ErrorClass::Timeout => recovery.wait_content_loaded(SIGNAL_CAP).await,
        ErrorClass::ElementNotFound => {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        }
        ErrorClass::Navigation => {
            if recovery.is_alive() {
                recovery.wait_content_loaded(SIGNAL_CAP).await
            } else {
                Ok(())
            }
        }
        ErrorClass::Network => recovery.wait_network_idle(SIGNAL_CAP).await,
        _ => {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        }
    };
    if let Err(reason) = outcome {
        debug!(class = %class, reason, "recovery action failed, continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FakeError {
        class: ErrorClass,
        message: String,
    }

    impl FakeError {
        fn new(class: ErrorClass) -> Self {
            Self {
                class,
                message: format!("fake {} failure", class),
            }
        }
    }

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl Classified for FakeError {
        fn class(&self) -> ErrorClass {
            self.class
        }
    }

    #[test]
    fn classify_net_code_is_network() {
        assert_eq!(
            classify_message("net::ERR_CONNECTION_REFUSED at https://x"),
            ErrorClass::Network
        );
    }

    #[test]
    fn classify_waiting_for_selector_is_timeout() {
        // "waiting for" outranks "selector" in the priority order
        assert_eq!(
            classify_message("TimeoutError: waiting for selector to be visible"),
            ErrorClass::Timeout
        );
    }

    #[test]
    fn classify_is_case_insensitive() {
        assert_eq!(classify_message("NETWORK unreachable"), ErrorClass::Network);
        assert_eq!(classify_message("Locator not resolved"), ErrorClass::ElementNotFound);
    }

    #[test]
    fn classify_priority_order() {
        assert_eq!(classify_message("target closed"), ErrorClass::BrowserCrash);
        assert_eq!(classify_message("page.goto interrupted"), ErrorClass::Navigation);
        assert_eq!(classify_message("expect(received).toBe"), ErrorClass::Assertion);
        assert_eq!(classify_message("something odd"), ErrorClass::Unknown);
        // network outranks the generic "browser" pattern
        assert_eq!(
            classify_message("browser lost network connection"),
            ErrorClass::Network
        );
    }

    #[test]
    fn exhausted_attempts_are_never_retryable() {
        let config = RetryConfig::network();
        for class in [
            ErrorClass::Network,
            ErrorClass::Timeout,
            ErrorClass::Navigation,
            ErrorClass::ElementNotFound,
        ] {
            assert!(!is_retryable(class, config.max_retries, &config));
            assert!(!is_retryable(class, config.max_retries + 5, &config));
        }
    }

    #[test]
    fn assertion_and_crash_never_retry() {
        let config = RetryConfig::network();
        assert!(!is_retryable(ErrorClass::Assertion, 1, &config));
        assert!(!is_retryable(ErrorClass::BrowserCrash, 1, &config));
        assert!(!is_retryable(ErrorClass::Unknown, 1, &config));
    }

    #[test]
    fn element_not_found_retries_only_during_interaction() {
        let interact = RetryConfig::element_interaction();
        assert!(is_retryable(ErrorClass::ElementNotFound, 1, &interact));

        let nav = RetryConfig::navigation();
        assert!(!is_retryable(ErrorClass::ElementNotFound, 1, &nav));
    }

    #[tokio::test(start_paused = true)]
    async fn assertion_failure_attempts_exactly_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_operation(
            "always-asserts",
            &RetryConfig::network(),
            &NoRecovery,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::new(ErrorClass::Assertion)) }
            },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts, 1);
        assert_eq!(err.history, vec![ErrorClass::Assertion]);
    }

    #[tokio::test(start_paused = true)]
    async fn network_failure_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_operation(
            "flaky-fetch",
            &RetryConfig::network(),
            &NoRecovery,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(FakeError::new(ErrorClass::Network))
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_carry_history() {
        let result: Result<(), _> = retry_operation(
            "always-times-out",
            &RetryConfig::navigation(),
            &NoRecovery,
            || async { Err(FakeError::new(ErrorClass::Timeout)) },
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.history, vec![ErrorClass::Timeout, ErrorClass::Timeout]);
        assert_eq!(err.final_class(), ErrorClass::Timeout);
        let rendered = err.to_string();
        assert!(rendered.contains("always-times-out"));
        assert!(rendered.contains("timeout -> timeout"));
    }

    #[derive(Default)]
    struct RecordingRecovery {
        content_loaded: AtomicU32,
        network_idle: AtomicU32,
    }

    #[async_trait]
    impl Recovery for RecordingRecovery {
        async fn wait_content_loaded(&self, _cap: Duration) -> Result<(), String> {
            self.content_loaded.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn wait_network_idle(&self, _cap: Duration) -> Result<(), String> {
            self.network_idle.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_recovery_waits_for_content_loaded() {
        let recovery = RecordingRecovery::default();
        let calls = AtomicU32::new(0);
        let result = retry_operation("slow-page", &RetryConfig::network(), &recovery, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(FakeError::new(ErrorClass::Timeout))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        result.unwrap();
        assert_eq!(recovery.content_loaded.load(Ordering::SeqCst), 1);
        assert_eq!(recovery.network_idle.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn network_recovery_waits_for_network_idle() {
        let recovery = RecordingRecovery::default();
        let calls = AtomicU32::new(0);
        let result = retry_operation("flaky-net", &RetryConfig::network(), &recovery, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FakeError::new(ErrorClass::Network))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        result.unwrap();
        assert_eq!(recovery.network_idle.load(Ordering::SeqCst), 2);
        assert_eq!(recovery.content_loaded.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_element_recovery_pauses_without_page_signals() {
        let recovery = RecordingRecovery::default();
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result = retry_operation(
            "churned-dom",
            &RetryConfig::element_interaction(),
            &recovery,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(FakeError::new(ErrorClass::ElementNotFound))
                    } else {
                        Ok(())
                    }
                }
            },
        )
        .await;

        result.unwrap();
        // 500ms base backoff (+ up to 10% jitter) + the 500ms settle pause
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert_eq!(recovery.content_loaded.load(Ordering::SeqCst), 0);
        assert_eq!(recovery.network_idle.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_stays_within_jitter_bounds() {
        // Paused-clock sleeps advance virtual time exactly, so the elapsed
        // virtual time equals backoff + jitter (+ the 5s timeout recovery
        // wait, which NoRecovery resolves immediately).
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            kind: OperationKind::Generic,
        };
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result = retry_operation("timed", &config, &NoRecovery, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(FakeError::new(ErrorClass::Timeout))
                } else {
                    Ok(())
                }
            }
        })
        .await;
        result.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "elapsed {:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(1100), "elapsed {:?}", elapsed);
    }

    #[test]
    fn delay_grows_exponentially() {
        let config = RetryConfig::network();
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4000));
    }
}
