//! # Hard Filter
//!
//! Eliminates communities that cannot satisfy the client's absolute
//! constraints. Every emitted recommendation downstream must have passed
//! all five checks; soft preferences are ranking's job, not filtering's.

use tracing::info;

use crate::models::{ClientRequirements, Community};

/// Default budget multiplier. A deployment contract, not a per-call knob.
pub const DEFAULT_BUDGET_TOLERANCE: f64 = 1.0;

/// Keep only communities that satisfy every absolute constraint.
pub fn apply(
    requirements: &ClientRequirements,
    communities: &[Community],
    budget_tolerance: f64,
) -> Vec<Community> {
    let surviving: Vec<Community> = communities
        .iter()
        .filter(|c| passes(requirements, c, budget_tolerance))
        .cloned()
        .collect();

    info!(
        "Hard filter: {} of {} communities remain",
        surviving.len(),
        communities.len()
    );
    surviving
}

/// All five absolute constraints for one community.
pub fn passes(
    requirements: &ClientRequirements,
    community: &Community,
    budget_tolerance: f64,
) -> bool {
    if community.care_level != requirements.care_level {
        return false;
    }

    if requirements.needs_enhanced && !community.enhanced {
        return false;
    }

    if requirements.needs_enriched && !community.enriched {
        return false;
    }

    // Monthly fee only; upfront costs belong to the total-cost ranker.
    if let Some(budget) = requirements.budget_monthly
        && community.monthly_fee > budget * budget_tolerance
    {
        return false;
    }

    if let Some(max_score) = requirements.timeline.max_availability_score()
        && community.availability_score > max_score
    {
        return false;
    }

    true
}
