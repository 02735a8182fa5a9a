//! # Rank Aggregator
//!
//! Weighted Borda count over all eight per-dimension rankings: the
//! combined score is the weighted sum of ranks (neutral rankers
//! contribute weight × (N+1)/2), lower is better. Ties break by
//! holistic rank, then distance rank, then community id.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::models::{Community, KeyMetrics, RankDimension, RankWeights, Recommendation};
use crate::services::ranking::DimensionRanking;

/// Fuse the eight rankings into the final ordered recommendations.
///
/// `shortlist` is the candidate set the AI rankers saw; the emitted list
/// is its best `final_count` members with per-dimension explanations.
pub fn combine(
    shortlist: &[Community],
    rankings: &[&DimensionRanking],
    weights: &RankWeights,
    distances: &HashMap<u32, Option<f64>>,
    final_count: usize,
) -> Vec<Recommendation> {
    let by_dimension = |dimension: RankDimension| -> Option<&&DimensionRanking> {
        rankings.iter().find(|r| r.dimension == dimension)
    };
    let holistic = by_dimension(RankDimension::Holistic);
    let distance = by_dimension(RankDimension::Distance);

    let mut scored: Vec<(&Community, f64)> = shortlist
        .iter()
        .map(|community| {
            let score: f64 = rankings
                .iter()
                .map(|r| weights.get(r.dimension) * r.rank_of(community.community_id).unwrap_or(0.0))
                .sum();
            (community, score)
        })
        .collect();

    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| rank_order(holistic, a.0.community_id, b.0.community_id))
            .then_with(|| rank_order(distance, a.0.community_id, b.0.community_id))
            .then_with(|| a.0.community_id.cmp(&b.0.community_id))
    });

    scored
        .into_iter()
        .take(final_count)
        .enumerate()
        .map(|(index, (community, score))| {
            let id = community.community_id;
            let mut rank_map: BTreeMap<String, Option<f64>> = BTreeMap::new();
            let mut explanation_map: BTreeMap<String, String> = BTreeMap::new();

            for ranking in rankings {
                let name = ranking.dimension.as_str().to_string();
                // Neutral rankers report null: they contributed to the
                // score but carry no per-community signal.
                let rank = if ranking.neutral {
                    None
                } else {
                    ranking.rank_of(id)
                };
                rank_map.insert(name.clone(), rank);
                if let Some(text) = ranking.explanations.get(&id) {
                    explanation_map.insert(name, text.clone());
                }
            }

            Recommendation {
                final_rank: (index + 1) as u32,
                community_id: id,
                community_name: community.name.clone(),
                combined_rank_score: score,
                key_metrics: KeyMetrics {
                    monthly_fee: community.monthly_fee,
                    distance_miles: distances.get(&id).copied().flatten(),
                    est_waitlist: if community.waitlist_status.is_empty() {
                        "Unconfirmed".to_string()
                    } else {
                        community.waitlist_status.clone()
                    },
                },
                rankings: rank_map,
                explanations: explanation_map,
            }
        })
        .collect()
}

fn rank_order(ranking: Option<&&DimensionRanking>, a: u32, b: u32) -> Ordering {
    match ranking {
        Some(r) => r
            .rank_of(a)
            .partial_cmp(&r.rank_of(b))
            .unwrap_or(Ordering::Equal),
        None => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApartmentType, CareLevel, UpfrontCosts};
    use crate::services::ranking;

    fn community(id: u32, monthly_fee: f64) -> Community {
        Community {
            community_id: id,
            name: Some(format!("Community {id}")),
            care_level: CareLevel::AssistedLiving,
            monthly_fee,
            upfront_costs: UpfrontCosts::default(),
            zip_code: Some("14620".to_string()),
            apartment_type: ApartmentType::OneBedroom,
            waitlist_status: "Available".to_string(),
            availability_score: 0,
            works_with_placement: true,
            contract_rate: 0.8,
            willingness_score: 10,
            enhanced: false,
            enriched: false,
            extra: std::collections::BTreeMap::new(),
        }
    }

    fn fixed_ranking(dimension: RankDimension, ranks: &[(u32, f64)]) -> DimensionRanking {
        DimensionRanking {
            dimension,
            ranks: ranks.iter().copied().collect(),
            explanations: ranks
                .iter()
                .map(|(id, rank)| (*id, format!("rank {rank}")))
                .collect(),
            neutral: false,
        }
    }

    #[test]
    fn test_combined_score_is_weighted_rank_sum() {
        let shortlist = vec![community(1, 4000.0), community(2, 4200.0)];
        let business = fixed_ranking(RankDimension::Business, &[(1, 1.0), (2, 2.0)]);
        let cost = fixed_ranking(RankDimension::Cost, &[(1, 2.0), (2, 1.0)]);
        // A neutral dimension still contributes weight × (N+1)/2.
        let couple = DimensionRanking::neutral(RankDimension::Couple, &[1, 2], "Not applicable");

        let mut weights = RankWeights::default();
        weights.cost = 2.0;

        let rankings = [&business, &cost, &couple];
        let recs = combine(&shortlist, &rankings, &weights, &HashMap::new(), 5);

        // id 1: 1 + 2×2 + 1.5 = 6.5; id 2: 2 + 2×1 + 1.5 = 5.5
        assert_eq!(recs[0].community_id, 2);
        assert!((recs[0].combined_rank_score - 5.5).abs() < 1e-9);
        assert!((recs[1].combined_rank_score - 6.5).abs() < 1e-9);
    }

    #[test]
    fn test_neutral_dimension_reports_null() {
        let shortlist = vec![community(1, 4000.0)];
        let couple = DimensionRanking::neutral(RankDimension::Couple, &[1], "Not applicable");
        let business = fixed_ranking(RankDimension::Business, &[(1, 1.0)]);

        let recs = combine(
            &shortlist,
            &[&business, &couple],
            &RankWeights::default(),
            &HashMap::new(),
            5,
        );

        assert_eq!(recs[0].rankings.get("couple"), Some(&None));
        assert_eq!(recs[0].rankings.get("business"), Some(&Some(1.0)));
        assert_eq!(recs[0].explanations["couple"], "Not applicable");
    }

    #[test]
    fn test_tie_breaks_by_holistic_then_distance_then_id() {
        let shortlist = vec![community(1, 4000.0), community(2, 4000.0)];

        // Equal combined scores, holistic prefers 2.
        let business = fixed_ranking(RankDimension::Business, &[(1, 1.0), (2, 2.0)]);
        let cost = fixed_ranking(RankDimension::Cost, &[(1, 2.0), (2, 1.0)]);
        let holistic = fixed_ranking(RankDimension::Holistic, &[(1, 2.0), (2, 1.0)]);
        // Holistic contributes to the score too, so cancel it out.
        let anti = fixed_ranking(RankDimension::Amenity, &[(1, 1.0), (2, 2.0)]);

        let recs = combine(
            &shortlist,
            &[&business, &cost, &holistic, &anti],
            &RankWeights::default(),
            &HashMap::new(),
            5,
        );
        assert_eq!(recs[0].community_id, 2);

        // With no holistic or distance signal, the lower id wins.
        let recs = combine(
            &shortlist,
            &[&business, &cost],
            &RankWeights::default(),
            &HashMap::new(),
            5,
        );
        assert_eq!(recs[0].community_id, 1);
    }

    #[test]
    fn test_emits_at_most_final_count() {
        let shortlist: Vec<Community> = (1..=8).map(|id| community(id, 4000.0)).collect();
        let ranks: Vec<(u32, f64)> = (1..=8).map(|id| (id, f64::from(id))).collect();
        let business = fixed_ranking(RankDimension::Business, &ranks);

        let recs = combine(
            &shortlist,
            &[&business],
            &RankWeights::default(),
            &HashMap::new(),
            5,
        );
        assert_eq!(recs.len(), 5);
        let final_ranks: Vec<u32> = recs.iter().map(|r| r.final_rank).collect();
        assert_eq!(final_ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_key_metrics_and_distance_passthrough() {
        let shortlist = vec![community(7, 3090.0)];
        let dist = ranking::distance(
            &shortlist,
            &[(7u32, Some(0.82))].into_iter().collect(),
            Some("14611"),
        );

        let distances: HashMap<u32, Option<f64>> = [(7u32, Some(0.82))].into_iter().collect();
        let recs = combine(&shortlist, &[&dist], &RankWeights::default(), &distances, 5);

        assert_eq!(recs[0].key_metrics.monthly_fee, 3090.0);
        assert_eq!(recs[0].key_metrics.distance_miles, Some(0.82));
        assert_eq!(recs[0].key_metrics.est_waitlist, "Available");
        assert_eq!(recs[0].explanations["distance"], "0.82 miles from ZIP 14611");
    }
}
