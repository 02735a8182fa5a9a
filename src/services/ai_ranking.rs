//! # AI Rankers
//!
//! Three qualitative rankers over the shortlist: availability match,
//! amenity/lifestyle fit, and holistic fit. Each is one provider call
//! with temperature 0 and a JSON response contract (an array of
//! `{community_id, reason}` objects, best first).
//!
//! A failed or malformed call degrades that dimension to neutral ranks
//! with a placeholder explanation and never touches its peers.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::warn;

use crate::models::{ClientRequirements, Community, LlmCallMetrics, RankDimension};
use crate::services::llm::{GenerateRequest, LlmClient};
use crate::services::ranking::DimensionRanking;

const RANKING_TEMPERATURE: f32 = 0.0;

/// Placeholder explanation for a degraded dimension.
pub const NOT_RANKED: &str = "Not ranked by AI";

/// One AI ranker's result: its ranking (possibly neutral) and the call
/// metrics when a provider call actually completed.
pub struct AiRankOutcome {
    pub ranking: DimensionRanking,
    pub metrics: Option<LlmCallMetrics>,
}

impl AiRankOutcome {
    pub fn degraded(&self) -> bool {
        self.ranking.neutral
    }

    /// Neutral fallback for a dimension whose call never completed.
    pub fn degraded_for(dimension: RankDimension, shortlist: &[Community]) -> Self {
        let ids: Vec<u32> = shortlist.iter().map(|c| c.community_id).collect();
        Self {
            ranking: DimensionRanking::neutral(dimension, &ids, NOT_RANKED),
            metrics: None,
        }
    }
}

pub struct AiRanker {
    llm: Arc<LlmClient>,
}

impl AiRanker {
    pub fn new(llm: Arc<LlmClient>) -> Self {
        Self { llm }
    }

    /// Match nuanced timeline language against actual availability.
    pub async fn rank_availability(
        &self,
        requirements: &ClientRequirements,
        shortlist: &[Community],
    ) -> AiRankOutcome {
        let candidates: Vec<Value> = shortlist
            .iter()
            .map(|c| {
                json!({
                    "community_id": c.community_id,
                    "waitlist": if c.waitlist_status.is_empty() {
                        "unconfirmed"
                    } else {
                        c.waitlist_status.as_str()
                    },
                    "availability_score": c.availability_score,
                })
            })
            .collect();

        let prompt = format!(
            "{}\nDimension: availability match.\n\
             The client's move-in timeline is {} (immediate = within 1 month, \
             near-term = 1-3 months, flexible = 3+ months).\n\
             Communities:\n{}\n\n{}",
            preamble(),
            requirements.timeline.as_str(),
            pretty(&candidates),
            ordering_contract(shortlist.len()),
        );

        self.run(RankDimension::Availability, "rank_availability", prompt, shortlist)
            .await
    }

    /// Fit apartment, pet, couple, and lifestyle notes against what each
    /// community actually offers.
    pub async fn rank_amenities(
        &self,
        requirements: &ClientRequirements,
        shortlist: &[Community],
    ) -> AiRankOutcome {
        let profile = json!({
            "apartment_preference": requirements
                .apartment_preference
                .map(|a| a.as_str()),
            "has_pet": requirements.has_pet,
            "is_couple": requirements.is_couple,
            "special_notes": requirements.special_notes,
        });

        let candidates: Vec<Value> = shortlist
            .iter()
            .map(|c| {
                json!({
                    "community_id": c.community_id,
                    "apartment_type": c.apartment_type.as_str(),
                    "pet_policy": if c.upfront_costs.pet_fee > 0.0 {
                        format!("pets allowed, ${:.0} fee", c.upfront_costs.pet_fee)
                    } else {
                        "no pet fee published".to_string()
                    },
                    "enhanced_services": c.enhanced,
                    "enriched_programming": c.enriched,
                    "amenities": amenity_notes(c),
                })
            })
            .collect();

        let prompt = format!(
            "{}\nDimension: amenity and lifestyle fit.\n\
             Client profile:\n{}\n\
             Communities:\n{}\n\n{}",
            preamble(),
            pretty(&profile),
            pretty(&candidates),
            ordering_contract(shortlist.len()),
        );

        self.run(RankDimension::Amenity, "rank_amenities", prompt, shortlist)
            .await
    }

    /// Overall ordering over the full picture, including the
    /// deterministic ranks already computed for each candidate.
    pub async fn rank_holistic(
        &self,
        requirements: &ClientRequirements,
        shortlist: &[Community],
        deterministic: &[&DimensionRanking],
    ) -> AiRankOutcome {
        let candidates: Vec<Value> = shortlist
            .iter()
            .map(|c| {
                let prior: HashMap<&str, Option<f64>> = deterministic
                    .iter()
                    .map(|r| (r.dimension.as_str(), r.rank_of(c.community_id)))
                    .collect();
                json!({
                    "community_id": c.community_id,
                    "name": c.name,
                    "care_level": c.care_level.as_str(),
                    "monthly_fee": c.monthly_fee,
                    "waitlist": c.waitlist_status,
                    "apartment_type": c.apartment_type.as_str(),
                    "enhanced_services": c.enhanced,
                    "enriched_programming": c.enriched,
                    "works_with_placement": c.works_with_placement,
                    "prior_ranks": prior,
                })
            })
            .collect();

        let prompt = format!(
            "{}\nDimension: holistic fit.\n\
             Weigh the whole picture for this client, including the \
             rule-based ranks each community already earned (lower = better).\n\
             Client profile:\n{}\n\
             Communities:\n{}\n\n{}\n\
             Give each community a one-sentence rationale in its reason field.",
            preamble(),
            pretty(&json!(requirements)),
            pretty(&candidates),
            ordering_contract(shortlist.len()),
        );

        self.run(RankDimension::Holistic, "rank_holistic", prompt, shortlist)
            .await
    }

    async fn run(
        &self,
        dimension: RankDimension,
        label: &str,
        prompt: String,
        shortlist: &[Community],
    ) -> AiRankOutcome {
        let ids: Vec<u32> = shortlist.iter().map(|c| c.community_id).collect();
        let request =
            GenerateRequest::text(prompt, RANKING_TEMPERATURE).with_schema(ranking_schema());

        match self.llm.generate_json(label, request).await {
            Ok((value, metrics)) => match normalize_ranking(dimension, &value, &ids) {
                Some(ranking) => AiRankOutcome {
                    ranking,
                    metrics: Some(metrics),
                },
                None => {
                    warn!("{} returned an unusable ordering; using neutral ranks", label);
                    AiRankOutcome {
                        ranking: DimensionRanking::neutral(dimension, &ids, NOT_RANKED),
                        metrics: Some(metrics),
                    }
                }
            },
            Err(e) => {
                warn!("{} failed: {}; using neutral ranks", label, e);
                AiRankOutcome {
                    ranking: DimensionRanking::neutral(dimension, &ids, NOT_RANKED),
                    metrics: None,
                }
            }
        }
    }
}

/// Turn a best-first response array into ranks 1..K.
///
/// Unknown and duplicate ids are dropped; ids the model omitted are
/// appended in ascending order. A response with no usable id at all is
/// treated as malformed (`None`) so the caller degrades to neutral.
pub fn normalize_ranking(
    dimension: RankDimension,
    value: &Value,
    ids: &[u32],
) -> Option<DimensionRanking> {
    let array = value
        .as_array()
        .or_else(|| value["rankings"].as_array())?;

    let mut ordered: Vec<u32> = Vec::with_capacity(ids.len());
    let mut reasons: HashMap<u32, String> = HashMap::new();

    for item in array {
        let id = item
            .as_u64()
            .or_else(|| item["community_id"].as_u64())
            .and_then(|id| u32::try_from(id).ok());
        let Some(id) = id else { continue };

        if !ids.contains(&id) || ordered.contains(&id) {
            continue;
        }
        ordered.push(id);
        if let Some(reason) = item["reason"].as_str() {
            let reason = reason.trim();
            if !reason.is_empty() {
                reasons.insert(id, reason.to_string());
            }
        }
    }

    if ordered.is_empty() {
        return None;
    }

    let mut omitted: Vec<u32> = ids
        .iter()
        .copied()
        .filter(|id| !ordered.contains(id))
        .collect();
    omitted.sort_unstable();
    ordered.extend(omitted);

    let total = ordered.len();
    let mut ranks = HashMap::with_capacity(total);
    let mut explanations = HashMap::with_capacity(total);
    for (index, id) in ordered.iter().enumerate() {
        ranks.insert(*id, (index + 1) as f64);
        let text = reasons
            .remove(id)
            .unwrap_or_else(|| format!("Ranked {} of {} by AI", index + 1, total));
        explanations.insert(*id, text);
    }

    Some(DimensionRanking {
        dimension,
        ranks,
        explanations,
        neutral: false,
    })
}

fn preamble() -> &'static str {
    "You rank senior-living communities for a placement consultant."
}

fn ordering_contract(count: usize) -> String {
    format!(
        "Order ALL {count} communities from best to worst on this dimension. \
         Respond ONLY with a JSON array of {{\"community_id\", \"reason\"}} \
         objects, best first, covering every community exactly once."
    )
}

/// Free-text amenity notes from optional workbook columns, if present.
fn amenity_notes(community: &Community) -> Option<String> {
    let notes: Vec<&str> = ["Amenities", "Notes"]
        .iter()
        .filter_map(|key| community.extra.get(*key))
        .map(String::as_str)
        .collect();
    if notes.is_empty() {
        None
    } else {
        Some(notes.join("; "))
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn ranking_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "community_id": {"type": "integer"},
                "reason": {"type": "string"},
            },
            "required": ["community_id", "reason"],
        },
    })
}
