//! Hybrid recommendation engine for senior-living placement
//! consultations: structured requirement extraction from free-form
//! input, a multi-stage candidate funnel (hard filters, deterministic
//! rankers, top-K preselection, AI rankers), and weighted Borda
//! aggregation into five explained recommendations.

pub mod error;
pub mod models;
pub mod routes;
pub mod services;
