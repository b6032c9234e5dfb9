//! Similarity-backend adapters.
//!
//! - `memory`: in-process brute-force backend, also the test double
//! - `lance`: LanceDB tables, one per vector space plus payload tables
use lexrank_core::traits::SpaceHit;

pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use lance::LanceBackend;
pub use memory::InMemoryBackend;

/// Best-first order: similarity descending, then id ascending. Keeps the
/// top `k`.
pub fn rank_hits(mut hits: Vec<SpaceHit>, k: usize) -> Vec<SpaceHit> {
    hits.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}
