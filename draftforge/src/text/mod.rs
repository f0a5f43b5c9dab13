//! Text cleaning and token-aware chunking.
//!
//! Everything in this module is pure and deterministic: regex passes over
//! scraped text, a density heuristic for isolating the article body, and a
//! character-ratio token estimator. The heuristics are best-effort by design;
//! tests assert properties (idempotence, monotonic size reduction, budget
//! compliance) rather than exact strings.

mod clean;
mod tokens;

pub use clean::{clean, extract_main_content, PlatformHint};
pub use tokens::{chunk, estimate_tokens};
