//! # Deterministic Rankers & Shortlist
//!
//! Five pure rankers over the filtered candidate set (business value,
//! total cost, distance, budget efficiency, couple suitability) plus the
//! top-K preselection that decides which candidates are worth the more
//! expensive AI ranking. Lower rank = better, everywhere.
//!
//! All rankers share one average-rank routine: `t` tied items starting
//! at position `k` each receive rank `k + (t-1)/2`, so the rank sum over
//! any ranker is invariant at N(N+1)/2.

use std::collections::HashMap;

use crate::models::{Community, RankDimension, RankWeights};

/// Neutral rank for a ranker with no signal over `n` candidates.
pub fn neutral_rank(n: usize) -> f64 {
    (n as f64 + 1.0) / 2.0
}

/// One ranker's output over one candidate set
#[derive(Debug, Clone)]
pub struct DimensionRanking {
    pub dimension: RankDimension,
    /// community_id -> 1-based rank; average ties produce halves
    pub ranks: HashMap<u32, f64>,
    pub explanations: HashMap<u32, String>,
    /// True when the ranker was not applicable and returned all-neutral
    /// ranks; reported as `null` in the result JSON.
    pub neutral: bool,
}

impl DimensionRanking {
    /// All-neutral ranking: every candidate at (N+1)/2.
    pub fn neutral(dimension: RankDimension, ids: &[u32], explanation: &str) -> Self {
        let rank = neutral_rank(ids.len());
        Self {
            dimension,
            ranks: ids.iter().map(|id| (*id, rank)).collect(),
            explanations: ids
                .iter()
                .map(|id| (*id, explanation.to_string()))
                .collect(),
            neutral: true,
        }
    }

    pub fn rank_of(&self, id: u32) -> Option<f64> {
        self.ranks.get(&id).copied()
    }
}

/// Assign 1-based average ranks to scored candidates.
///
/// `None` scores sort after every known score and are average-tied among
/// themselves. Known ties compare by exact score equality, which is
/// deterministic because every score is a pure function of the inputs.
pub fn average_ranks(scores: &[(u32, Option<f64>)], ascending: bool) -> HashMap<u32, f64> {
    let mut known: Vec<(u32, f64)> = scores
        .iter()
        .filter_map(|(id, score)| score.map(|s| (*id, s)))
        .collect();
    known.sort_by(|a, b| {
        let ord = a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal);
        let ord = if ascending { ord } else { ord.reverse() };
        ord.then_with(|| a.0.cmp(&b.0))
    });

    let mut unknown: Vec<u32> = scores
        .iter()
        .filter(|(_, score)| score.is_none())
        .map(|(id, _)| *id)
        .collect();
    unknown.sort_unstable();

    let mut ranks = HashMap::with_capacity(scores.len());
    let mut position = 1usize;
    let mut i = 0usize;
    while i < known.len() {
        let mut j = i + 1;
        while j < known.len() && known[j].1 == known[i].1 {
            j += 1;
        }
        let tied = j - i;
        let rank = position as f64 + (tied as f64 - 1.0) / 2.0;
        for entry in &known[i..j] {
            ranks.insert(entry.0, rank);
        }
        position += tied;
        i = j;
    }

    if !unknown.is_empty() {
        let tied = unknown.len();
        let rank = position as f64 + (tied as f64 - 1.0) / 2.0;
        for id in unknown {
            ranks.insert(id, rank);
        }
    }

    ranks
}

/// Business value: willingness × contract rate, higher is better.
pub fn business_value(communities: &[Community]) -> DimensionRanking {
    let scores: Vec<(u32, Option<f64>)> = communities
        .iter()
        .map(|c| {
            (
                c.community_id,
                Some(f64::from(c.willingness_score) * c.contract_rate),
            )
        })
        .collect();

    DimensionRanking {
        dimension: RankDimension::Business,
        ranks: average_ranks(&scores, false),
        explanations: communities
            .iter()
            .map(|c| {
                (
                    c.community_id,
                    format!(
                        "Partnership score {} × {:.2} contract rate",
                        c.willingness_score, c.contract_rate
                    ),
                )
            })
            .collect(),
        neutral: false,
    }
}

/// Total cost: monthly fee plus upfront costs amortized over 24 months.
/// Pet fee counts only when the client has a pet.
pub fn total_cost(communities: &[Community], has_pet: bool) -> DimensionRanking {
    let amortized = |c: &Community| -> f64 {
        let up = &c.upfront_costs;
        let pet = if has_pet { up.pet_fee } else { 0.0 };
        (up.deposit + up.move_in_fee + up.community_fee + pet) / 24.0
    };

    let scores: Vec<(u32, Option<f64>)> = communities
        .iter()
        .map(|c| (c.community_id, Some(c.monthly_fee + amortized(c))))
        .collect();

    DimensionRanking {
        dimension: RankDimension::Cost,
        ranks: average_ranks(&scores, true),
        explanations: communities
            .iter()
            .map(|c| {
                (
                    c.community_id,
                    format!(
                        "${}/month + ${} amortized upfront",
                        fmt_usd(c.monthly_fee),
                        fmt_usd(amortized(c))
                    ),
                )
            })
            .collect(),
        neutral: false,
    }
}

/// Distance: geodesic miles from the client's resolved ZIP. Unknown
/// distances rank last, average-tied among themselves. No origin ZIP at
/// all means no signal: all-neutral ranks.
pub fn distance(
    communities: &[Community],
    distances: &HashMap<u32, Option<f64>>,
    origin_zip: Option<&str>,
) -> DimensionRanking {
    let ids: Vec<u32> = communities.iter().map(|c| c.community_id).collect();
    let Some(origin) = origin_zip else {
        return DimensionRanking::neutral(RankDimension::Distance, &ids, "Distance unknown");
    };

    let scores: Vec<(u32, Option<f64>)> = communities
        .iter()
        .map(|c| {
            (
                c.community_id,
                distances.get(&c.community_id).copied().flatten(),
            )
        })
        .collect();

    DimensionRanking {
        dimension: RankDimension::Distance,
        ranks: average_ranks(&scores, true),
        explanations: scores
            .iter()
            .map(|(id, miles)| {
                let text = match miles {
                    Some(miles) => format!("{miles:.2} miles from ZIP {origin}"),
                    None => "Distance unknown".to_string(),
                };
                (*id, text)
            })
            .collect(),
        neutral: false,
    }
}

/// Budget efficiency: monthly fee as a fraction of budget, lower is
/// better. No budget means no signal: all-neutral ranks.
pub fn budget_efficiency(
    communities: &[Community],
    budget_monthly: Option<f64>,
) -> DimensionRanking {
    let ids: Vec<u32> = communities.iter().map(|c| c.community_id).collect();
    let Some(budget) = budget_monthly.filter(|b| *b > 0.0) else {
        return DimensionRanking::neutral(
            RankDimension::BudgetEfficiency,
            &ids,
            "No budget provided",
        );
    };

    let scores: Vec<(u32, Option<f64>)> = communities
        .iter()
        .map(|c| (c.community_id, Some(c.monthly_fee / budget)))
        .collect();

    DimensionRanking {
        dimension: RankDimension::BudgetEfficiency,
        ranks: average_ranks(&scores, true),
        explanations: communities
            .iter()
            .map(|c| {
                (
                    c.community_id,
                    format!(
                        "{:.0}% of ${}/month budget",
                        c.monthly_fee / budget * 100.0,
                        fmt_usd(budget)
                    ),
                )
            })
            .collect(),
        neutral: false,
    }
}

/// Couple suitability: second-person fee, lower is better; a community
/// with no published rate ranks last. Singles get all-neutral ranks.
pub fn couple_suitability(communities: &[Community], is_couple: bool) -> DimensionRanking {
    let ids: Vec<u32> = communities.iter().map(|c| c.community_id).collect();
    if !is_couple {
        return DimensionRanking::neutral(
            RankDimension::Couple,
            &ids,
            "Not applicable (single)",
        );
    }

    let scores: Vec<(u32, Option<f64>)> = communities
        .iter()
        .map(|c| (c.community_id, c.upfront_costs.second_person_fee))
        .collect();

    DimensionRanking {
        dimension: RankDimension::Couple,
        ranks: average_ranks(&scores, true),
        explanations: communities
            .iter()
            .map(|c| {
                let text = match c.upfront_costs.second_person_fee {
                    Some(fee) => format!("${} second-person fee", fmt_usd(fee)),
                    None => "No second-person rate published".to_string(),
                };
                (c.community_id, text)
            })
            .collect(),
        neutral: false,
    }
}

/// Top-K preselection: preliminary weighted sum over the deterministic
/// ranks, ascending, ties broken by community id. The AI rankers only
/// ever see these K candidates.
pub fn select_top_k(
    rankings: &[&DimensionRanking],
    weights: &RankWeights,
    k: usize,
) -> Vec<u32> {
    let Some(first) = rankings.first() else {
        return Vec::new();
    };

    let mut scored: Vec<(u32, f64)> = first
        .ranks
        .keys()
        .map(|id| {
            let score: f64 = rankings
                .iter()
                .map(|r| weights.get(r.dimension) * r.rank_of(*id).unwrap_or(0.0))
                .sum();
            (*id, score)
        })
        .collect();

    scored.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    scored.into_iter().take(k).map(|(id, _)| id).collect()
}

/// Whole-dollar formatting with thousands separators ("3,090").
pub fn fmt_usd(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        out.push(c);
        let remaining = digits.len() - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            out.push(',');
        }
    }
    if whole < 0 { format!("-{out}") } else { out }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApartmentType, CareLevel, UpfrontCosts};
    use std::collections::BTreeMap;

    fn community(id: u32, monthly_fee: f64) -> Community {
        Community {
            community_id: id,
            name: None,
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
            extra: BTreeMap::new(),
        }
    }

    fn rank_sum(ranking: &DimensionRanking) -> f64 {
        ranking.ranks.values().sum()
    }

    #[test]
    fn test_average_ranks_distinct() {
        let ranks = average_ranks(
            &[(1, Some(30.0)), (2, Some(10.0)), (3, Some(20.0))],
            true,
        );
        assert_eq!(ranks[&2], 1.0);
        assert_eq!(ranks[&3], 2.0);
        assert_eq!(ranks[&1], 3.0);
    }

    #[test]
    fn test_average_ranks_ties() {
        // Two tied at positions 2..3 each get 2.5.
        let ranks = average_ranks(
            &[(1, Some(10.0)), (2, Some(20.0)), (3, Some(20.0)), (4, Some(30.0))],
            true,
        );
        assert_eq!(ranks[&1], 1.0);
        assert_eq!(ranks[&2], 2.5);
        assert_eq!(ranks[&3], 2.5);
        assert_eq!(ranks[&4], 4.0);
    }

    #[test]
    fn test_average_ranks_sum_invariant() {
        let scores: Vec<(u32, Option<f64>)> = vec![
            (1, Some(5.0)),
            (2, Some(5.0)),
            (3, Some(5.0)),
            (4, Some(1.0)),
            (5, None),
            (6, None),
        ];
        let ranks = average_ranks(&scores, true);
        let n = scores.len() as f64;
        let total: f64 = ranks.values().sum();
        assert!((total - n * (n + 1.0) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_ranks_unknowns_trail() {
        let ranks = average_ranks(&[(1, Some(3.0)), (2, None), (3, None)], true);
        assert_eq!(ranks[&1], 1.0);
        // Unknowns tie over positions 2..3.
        assert_eq!(ranks[&2], 2.5);
        assert_eq!(ranks[&3], 2.5);
    }

    #[test]
    fn test_average_ranks_descending() {
        let ranks = average_ranks(&[(1, Some(1.0)), (2, Some(9.0))], false);
        assert_eq!(ranks[&2], 1.0);
        assert_eq!(ranks[&1], 2.0);
    }

    #[test]
    fn test_business_value_ordering() {
        let mut strong = community(1, 4000.0);
        strong.contract_rate = 0.9;
        let mut weak = community(2, 4000.0);
        weak.works_with_placement = false;
        weak.willingness_score = 0;
        weak.contract_rate = 0.9;

        let ranking = business_value(&[strong, weak]);
        assert_eq!(ranking.rank_of(1), Some(1.0));
        assert_eq!(ranking.rank_of(2), Some(2.0));
        assert!(ranking.explanations[&1].contains("Partnership score 10"));
    }

    #[test]
    fn test_total_cost_amortizes_upfront() {
        let mut cheap_monthly = community(1, 3000.0);
        cheap_monthly.upfront_costs.deposit = 48_000.0; // +2,000/month amortized
        let flat = community(2, 4500.0);

        let ranking = total_cost(&[cheap_monthly, flat], false);
        // 3,000 + 2,000 = 5,000 vs 4,500: the flat-fee community wins.
        assert_eq!(ranking.rank_of(2), Some(1.0));
        assert_eq!(ranking.explanations[&1], "$3,000/month + $2,000 amortized upfront");
        assert_eq!(ranking.explanations[&2], "$4,500/month + $0 amortized upfront");
    }

    #[test]
    fn test_total_cost_pet_fee_only_with_pet() {
        let mut with_pet_fee = community(1, 4000.0);
        with_pet_fee.upfront_costs.pet_fee = 2400.0;
        let other = community(2, 4050.0);

        let without_pet = total_cost(&[with_pet_fee.clone(), other.clone()], false);
        assert_eq!(without_pet.rank_of(1), Some(1.0));

        // With a pet the 2,400 fee adds 100/month: 4,100 vs 4,050.
        let with_pet = total_cost(&[with_pet_fee, other], true);
        assert_eq!(with_pet.rank_of(2), Some(1.0));
    }

    #[test]
    fn test_distance_unknowns_trail() {
        let mut distances = HashMap::new();
        distances.insert(1, Some(0.82));
        distances.insert(2, None);
        distances.insert(3, Some(4.1));

        let communities = vec![community(1, 1.0), community(2, 1.0), community(3, 1.0)];
        let ranking = distance(&communities, &distances, Some("14611"));
        assert_eq!(ranking.rank_of(1), Some(1.0));
        assert_eq!(ranking.rank_of(3), Some(2.0));
        assert_eq!(ranking.rank_of(2), Some(3.0));
        assert_eq!(ranking.explanations[&1], "0.82 miles from ZIP 14611");
        assert_eq!(ranking.explanations[&2], "Distance unknown");
        assert!(!ranking.neutral);
    }

    #[test]
    fn test_distance_no_origin_is_neutral() {
        let communities = vec![community(1, 1.0), community(2, 1.0)];
        let ranking = distance(&communities, &HashMap::new(), None);
        assert!(ranking.neutral);
        assert_eq!(ranking.rank_of(1), Some(1.5));
        assert_eq!(ranking.rank_of(2), Some(1.5));
    }

    #[test]
    fn test_budget_efficiency_neutral_without_budget() {
        let communities = vec![community(1, 1.0), community(2, 2.0), community(3, 3.0)];
        let ranking = budget_efficiency(&communities, None);
        assert!(ranking.neutral);
        assert_eq!(ranking.rank_of(2), Some(2.0));
        assert_eq!(ranking.explanations[&1], "No budget provided");
    }

    #[test]
    fn test_budget_efficiency_utilization() {
        let communities = vec![community(1, 3100.0), community(2, 4900.0)];
        let ranking = budget_efficiency(&communities, Some(5000.0));
        assert_eq!(ranking.rank_of(1), Some(1.0));
        assert_eq!(ranking.explanations[&1], "62% of $5,000/month budget");
    }

    #[test]
    fn test_couple_suitability() {
        let mut cheap = community(1, 4000.0);
        cheap.upfront_costs.second_person_fee = Some(500.0);
        let mut pricey = community(2, 4000.0);
        pricey.upfront_costs.second_person_fee = Some(1000.0);
        let unpublished = community(3, 4000.0);

        let ranking = couple_suitability(&[cheap, pricey, unpublished], true);
        assert_eq!(ranking.rank_of(1), Some(1.0));
        assert_eq!(ranking.rank_of(2), Some(2.0));
        assert_eq!(ranking.rank_of(3), Some(3.0));
        assert_eq!(ranking.explanations[&1], "$500 second-person fee");
    }

    #[test]
    fn test_couple_suitability_single_is_neutral() {
        let ranking = couple_suitability(&[community(1, 1.0), community(2, 1.0)], false);
        assert!(ranking.neutral);
        assert_eq!(rank_sum(&ranking), 3.0);
    }

    #[test]
    fn test_select_top_k() {
        let communities: Vec<Community> = (1..=4)
            .map(|id| {
                let mut c = community(id, 3000.0 + f64::from(id) * 100.0);
                c.contract_rate = 1.0 - f64::from(id) * 0.1;
                c
            })
            .collect();

        let business = business_value(&communities);
        let cost = total_cost(&communities, false);
        let budget = budget_efficiency(&communities, Some(5000.0));
        let couple = couple_suitability(&communities, false);
        let dist = distance(&communities, &HashMap::new(), None);

        let weights = RankWeights::default();
        let rankings = [&business, &cost, &dist, &budget, &couple];

        let shortlist = select_top_k(&rankings, &weights, 2);
        // Community 1 is best on every live dimension.
        assert_eq!(shortlist, vec![1, 2]);

        let all = select_top_k(&rankings, &weights, 10);
        assert_eq!(all.len(), 4);
        assert_eq!(all[0], 1);
    }

    #[test]
    fn test_fmt_usd() {
        assert_eq!(fmt_usd(0.0), "0");
        assert_eq!(fmt_usd(3090.0), "3,090");
        assert_eq!(fmt_usd(999.4), "999");
        assert_eq!(fmt_usd(1_234_567.0), "1,234,567");
    }
}
