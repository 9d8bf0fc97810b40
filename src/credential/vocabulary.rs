//! Provider error vocabulary
//!
//! Lower-case phrases matched against probe output. Quota phrases are tried
//! before rate-limit phrases because providers report exhausted quota with
//! the same 429 status as throttling.

/// Account has no remaining quota or credit
pub const QUOTA_PHRASES: &[&str] = &[
    "insufficient_quota",
    "exceeded your current quota",
    "quota exceeded",
    "quota_exceeded",
    "credit balance is too low",
    "insufficient balance",
    "billing",
    "resource has been exhausted",
];

/// Request was throttled
pub const RATE_LIMIT_PHRASES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "error code: 429",
    "status code 429",
    "overloaded",
];

/// Whether any phrase occurs in `haystack` (expected lower-case)
pub fn mentions(haystack: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| haystack.contains(phrase))
}
