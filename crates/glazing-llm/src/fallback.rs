//! Canned-response generator.
//!
//! Used when the fake-LLM flag is on, and as the recovery path whenever the
//! remote backend cannot produce a response. It never fails.

use std::time::Duration;

use crate::source::FragmentStream;

/// The fixed response set the fallback generator draws from.
pub const FALLBACK_RESPONSES: [&str; 5] = [
    "Hello! I'm a simulated AI assistant for testing purposes.",
    "I can help answer your questions about our products and services.",
    "This is a placeholder response to demonstrate token streaming.",
    "In production, this would be replaced with a real LLM API call.",
    "To test the system properly, I'll simulate thinking and response delays.",
];

/// Default lower bound of the inter-fragment delay.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(100);

/// Default upper bound of the inter-fragment delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(300);

/// Streams one randomly chosen canned response word by word.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackGenerator {
    /// Create a generator with the default 100–300ms delay range.
    pub fn new() -> Self {
        Self::with_delay_range(DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }

    /// Create a generator with a custom delay range.
    ///
    /// Bounds given in the wrong order are swapped.
    pub fn with_delay_range(min: Duration, max: Duration) -> Self {
        let (min_delay, max_delay) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min_delay,
            max_delay,
        }
    }

    /// A generator that never sleeps (tests).
    pub fn instant() -> Self {
        Self::with_delay_range(Duration::ZERO, Duration::ZERO)
    }

    /// Pick one of the canned responses uniformly at random.
    pub fn pick_response(&self) -> &'static str {
        FALLBACK_RESPONSES[rand::random_range(0..FALLBACK_RESPONSES.len())]
    }

    /// Stream a randomly chosen response.
    ///
    /// The prompt is ignored. Each word is emitted with a trailing space, with
    /// a random delay between consecutive fragments.
    pub fn stream(&self) -> FragmentStream {
        self.stream_response(self.pick_response())
    }

    /// Stream a specific response with this generator's pacing.
    pub fn stream_response(&self, response: &str) -> FragmentStream {
        let fragments = split_fragments(response);
        let (min, max) = (self.min_delay, self.max_delay);

        Box::pin(async_stream::stream! {
            for (i, fragment) in fragments.into_iter().enumerate() {
                if i > 0 {
                    let delay = random_delay(min, max);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                yield fragment;
            }
        })
    }
}

/// Split a response into word fragments, each carrying a trailing space.
pub fn split_fragments(response: &str) -> Vec<String> {
    response
        .split_whitespace()
        .map(|word| format!("{} ", word))
        .collect()
}

fn random_delay(min: Duration, max: Duration) -> Duration {
    if min == max {
        return min;
    }
    let ms = rand::random_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(ms)
}
