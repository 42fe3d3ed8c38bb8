//! Application constants for keysweep
//!
//! This module centralizes the constants used throughout the engine,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Per-channel probe endpoints and request shapes
pub mod channels {
    /// Default validation endpoint for OpenAI-compatible groups
    pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";

    /// Default validation endpoint for Gemini groups
    pub const GEMINI_DEFAULT_URL: &str =
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

    /// Model named in the OpenAI probe body; cheapest request that still
    /// exercises authentication
    pub const OPENAI_PROBE_MODEL: &str = "gpt-3.5-turbo";

    /// Prompt text shared by all probe bodies
    pub const PROBE_PROMPT: &str = "Hello";

    /// Gemini API key header
    pub const GEMINI_KEY_HEADER: &str = "x-goog-api-key";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all probe requests
    pub const USER_AGENT: &str = "keysweep/0.1.0 (key validation engine)";

    /// Outer bound on any single request; the per-attempt timeout from the
    /// sweep config is always tighter
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host when multiplexing is enabled
    pub const POOL_MAX_PER_HOST: usize = 32;

    /// HTTP/2 keep-alive interval
    pub const HTTP2_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

    /// HTTP/2 keep-alive timeout
    pub const HTTP2_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Validation ranges and defaults for the sweep configuration
pub mod limits {
    /// Default concurrent probe slots
    pub const DEFAULT_CONCURRENCY: usize = 50;

    /// Maximum concurrent probe slots
    pub const MAX_CONCURRENCY: usize = 200;

    /// Default per-attempt timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

    /// Maximum per-attempt timeout (seconds)
    pub const MAX_TIMEOUT_SECS: u64 = 120;

    /// Default probe attempts per credential
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Maximum probe attempts per credential
    pub const MAX_MAX_RETRIES: u32 = 10;

    /// Default base delay for retry backoff (milliseconds)
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

    /// Default outbound probe rate (per second, also the burst size)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 100;

    /// Maximum outbound probe rate (per second)
    pub const MAX_RATE_LIMIT_RPS: u32 = 500;

    /// Default backoff cap (seconds)
    pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 30;

    /// Jitter factor applied on top of a backoff delay (0.0-1.0)
    pub const BACKOFF_JITTER_FACTOR: f64 = 0.1;
}

/// Worker pool and dispatch constants
pub mod sweep {
    use super::Duration;

    /// Credential count at which the dispatcher switches to chunked
    /// streaming to bound peak memory
    pub const DEFAULT_STREAMING_THRESHOLD: usize = 1_000;

    /// Chunk size multiplier: each streaming chunk holds
    /// `CHUNK_CONCURRENCY_FACTOR * concurrency` credentials
    pub const CHUNK_CONCURRENCY_FACTOR: usize = 2;

    /// Pause between streaming chunks
    pub const CHUNK_SPACING: Duration = Duration::from_millis(10);

    /// Completions between speed/ETA recomputations and progress ticks
    pub const PROGRESS_TICK_EVERY: u64 = 10;
}

/// Job retention and cleanup
pub mod jobs {
    use super::Duration;

    /// Retention window for finished jobs before the TTL sweep removes them
    pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

    /// Interval between background TTL sweeps
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);
}

/// Progress fan-out
pub mod fanout {
    use super::Duration;

    /// Bound on a single sink delivery; slower sinks are dropped
    pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Result export formatting
pub mod export {
    /// CSV header row, matching the operator console's import format
    pub const CSV_HEADER: &str = "密鑰ID,密鑰,分組ID,有效,回應時間(ms),錯誤訊息,檢查時間";

    /// CSV rendering of a valid credential
    pub const CSV_VALID: &str = "是";

    /// CSV rendering of an invalid credential
    pub const CSV_INVALID: &str = "否";

    /// Timestamp format for the CSV check-time column
    pub const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}

// Re-export commonly used constants for convenience
pub use limits::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_RPS};
pub use sweep::DEFAULT_STREAMING_THRESHOLD;
