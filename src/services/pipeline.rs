//! # Pipeline Orchestrator
//!
//! Runs one consultation end to end: extraction, hard filter, the five
//! deterministic rankers, top-K preselection, the three AI rankers, and
//! the final aggregation. Captures per-phase wall time, per-call token
//! counts, and a pricing-table cost estimate.
//!
//! Exactly one extraction call and three ranking calls are issued per
//! consultation (barring retries inside the LLM client). Extraction
//! failures are fatal; AI ranking failures degrade to neutral ranks.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::{
    Community, ConsultationResult, CostEstimate, LlmCallMetrics, PerformanceMetrics,
    RankDimension, RankWeights, TokenCounts,
};
use crate::services::ai_ranking::{AiRankOutcome, AiRanker};
use crate::services::aggregator;
use crate::services::catalog::CatalogStore;
use crate::services::extractor::{ConsultationInput, ExtractError, Extractor};
use crate::services::filters;
use crate::services::geocode::Geocoder;
use crate::services::llm::{LlmClient, LlmError, model_pricing};
use crate::services::locations::LocationResolver;
use crate::services::ranking::{self, DimensionRanking};

/// Consultation lifecycle states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsultationPhase {
    Created,
    Extracting,
    Filtering,
    RankingDet,
    Shortlisted,
    RankingAi,
    Aggregating,
    Done,
    Failed,
}

impl ConsultationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationPhase::Created => "created",
            ConsultationPhase::Extracting => "extracting",
            ConsultationPhase::Filtering => "filtering",
            ConsultationPhase::RankingDet => "ranking_det",
            ConsultationPhase::Shortlisted => "shortlisted",
            ConsultationPhase::RankingAi => "ranking_ai",
            ConsultationPhase::Aggregating => "aggregating",
            ConsultationPhase::Done => "done",
            ConsultationPhase::Failed => "failed",
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The LLM answered but no usable care level could be extracted.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// The provider was unreachable during extraction, after retries.
    #[error("LLM unavailable during extraction: {0}")]
    LlmUnavailable(String),
}

impl From<ExtractError> for PipelineError {
    fn from(error: ExtractError) -> Self {
        match error {
            ExtractError::Llm(LlmError::Unavailable(msg)) => PipelineError::LlmUnavailable(msg),
            other => PipelineError::ExtractionFailed(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Budget multiplier for the hard filter.
    pub budget_tolerance: f64,
    /// How many candidates the AI rankers may see.
    pub shortlist_size: usize,
    /// How many recommendations to emit.
    pub final_count: usize,
    /// Whole-consultation budget; past it, in-flight AI rankers are
    /// dropped and their dimensions go neutral.
    pub overall_deadline: Duration,
    /// Model id used for the cost estimate.
    pub model_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            budget_tolerance: filters::DEFAULT_BUDGET_TOLERANCE,
            shortlist_size: 10,
            final_count: 5,
            overall_deadline: Duration::from_secs(180),
            model_id: "gemini-2.5-flash".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub weights: RankWeights,
    pub push_to_crm: bool,
}

pub struct Pipeline {
    catalog: Arc<CatalogStore>,
    geocoder: Arc<Geocoder>,
    extractor: Extractor,
    ai: AiRanker,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<CatalogStore>,
        geocoder: Arc<Geocoder>,
        llm: Arc<LlmClient>,
        locations: Arc<LocationResolver>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            catalog,
            geocoder,
            extractor: Extractor::new(llm.clone(), locations),
            ai: AiRanker::new(llm),
            config,
        }
    }

    /// Process one consultation into a ranked, explainable result.
    pub async fn process(
        &self,
        input: ConsultationInput,
        options: ProcessOptions,
    ) -> Result<ConsultationResult, PipelineError> {
        let consultation_id = new_consultation_id();
        let total_start = Instant::now();
        let deadline = total_start + self.config.overall_deadline;
        let mut timings: BTreeMap<String, f64> = BTreeMap::new();
        let mut phase = ConsultationPhase::Created;

        if options.push_to_crm {
            // The spreadsheet CRM writer is an external collaborator; it
            // flips crm_pushed after handling the result object.
            debug!("[{}] CRM push requested", consultation_id);
        }

        // -- extracting ------------------------------------------------
        transition(&consultation_id, &mut phase, ConsultationPhase::Extracting);
        let phase_start = Instant::now();
        let (requirements, extraction_metrics) = match self.extractor.extract(&input).await {
            Ok(extracted) => extracted,
            Err(e) => {
                transition(&consultation_id, &mut phase, ConsultationPhase::Failed);
                return Err(e.into());
            }
        };
        timings.insert("extracting".to_string(), secs(phase_start));

        // The snapshot is immutable for the rest of this consultation;
        // concurrent catalog writes publish a new one for later calls.
        let snapshot = self.catalog.snapshot();

        // -- filtering -------------------------------------------------
        transition(&consultation_id, &mut phase, ConsultationPhase::Filtering);
        let phase_start = Instant::now();
        let filtered = filters::apply(
            &requirements,
            &snapshot.communities,
            self.config.budget_tolerance,
        );
        timings.insert("filtering".to_string(), secs(phase_start));

        if filtered.is_empty() {
            info!("[{}] no communities survive the hard filter", consultation_id);
            timings.insert("total".to_string(), secs(total_start));
            transition(&consultation_id, &mut phase, ConsultationPhase::Done);
            return Ok(ConsultationResult {
                consultation_id,
                client_info: requirements,
                recommendations: Vec::new(),
                performance_metrics: build_metrics(
                    timings,
                    vec![extraction_metrics],
                    Vec::new(),
                    &self.config.model_id,
                ),
                no_matches: true,
                crm_pushed: false,
            });
        }

        // -- deterministic ranking ------------------------------------
        transition(&consultation_id, &mut phase, ConsultationPhase::RankingDet);
        let phase_start = Instant::now();
        let origin_zip = requirements.resolved_zip.clone();
        let (business, cost, (distance, distances), budget_eff, couple) = tokio::join!(
            async { ranking::business_value(&filtered) },
            async { ranking::total_cost(&filtered, requirements.has_pet) },
            self.distance_ranking(origin_zip.as_deref(), &filtered),
            async { ranking::budget_efficiency(&filtered, requirements.budget_monthly) },
            async { ranking::couple_suitability(&filtered, requirements.is_couple) },
        );
        timings.insert("ranking_det".to_string(), secs(phase_start));

        // -- shortlist -------------------------------------------------
        let deterministic = [&business, &cost, &distance, &budget_eff, &couple];
        let shortlist_ids = ranking::select_top_k(
            &deterministic,
            &options.weights,
            self.config.shortlist_size,
        );
        let shortlist: Vec<Community> = shortlist_ids
            .iter()
            .filter_map(|id| filtered.iter().find(|c| c.community_id == *id).cloned())
            .collect();
        transition(&consultation_id, &mut phase, ConsultationPhase::Shortlisted);
        debug!(
            "[{}] shortlist: {:?} of {} candidates",
            consultation_id,
            shortlist_ids,
            filtered.len()
        );

        // -- AI ranking ------------------------------------------------
        transition(&consultation_id, &mut phase, ConsultationPhase::RankingAi);
        let phase_start = Instant::now();
        let remaining = deadline.saturating_duration_since(Instant::now());
        let ai_work = async {
            tokio::join!(
                self.ai.rank_availability(&requirements, &shortlist),
                self.ai.rank_amenities(&requirements, &shortlist),
                self.ai.rank_holistic(&requirements, &shortlist, &deterministic),
            )
        };
        let (availability, amenity, holistic) =
            match tokio::time::timeout(remaining, ai_work).await {
                Ok(outcomes) => outcomes,
                Err(_) => {
                    warn!(
                        "[{}] overall deadline exceeded; AI rankers degrade to neutral",
                        consultation_id
                    );
                    (
                        AiRankOutcome::degraded_for(RankDimension::Availability, &shortlist),
                        AiRankOutcome::degraded_for(RankDimension::Amenity, &shortlist),
                        AiRankOutcome::degraded_for(RankDimension::Holistic, &shortlist),
                    )
                }
            };
        timings.insert("ranking_ai".to_string(), secs(phase_start));

        // -- aggregation -----------------------------------------------
        transition(&consultation_id, &mut phase, ConsultationPhase::Aggregating);
        let phase_start = Instant::now();
        let all_rankings: [&DimensionRanking; 8] = [
            &business,
            &cost,
            &distance,
            &budget_eff,
            &couple,
            &availability.ranking,
            &amenity.ranking,
            &holistic.ranking,
        ];
        let recommendations = aggregator::combine(
            &shortlist,
            &all_rankings,
            &options.weights,
            &distances,
            self.config.final_count,
        );
        timings.insert("aggregating".to_string(), secs(phase_start));
        timings.insert("total".to_string(), secs(total_start));

        let mut calls = vec![extraction_metrics];
        let mut degraded = Vec::new();
        for outcome in [&availability, &amenity, &holistic] {
            if let Some(metrics) = &outcome.metrics {
                calls.push(metrics.clone());
            }
            if outcome.degraded() {
                degraded.push(outcome.ranking.dimension.as_str().to_string());
            }
        }

        transition(&consultation_id, &mut phase, ConsultationPhase::Done);
        info!(
            "[{}] done: {} recommendations in {:.2}s",
            consultation_id,
            recommendations.len(),
            timings.get("total").copied().unwrap_or(0.0)
        );

        Ok(ConsultationResult {
            consultation_id,
            client_info: requirements,
            recommendations,
            performance_metrics: build_metrics(timings, calls, degraded, &self.config.model_id),
            no_matches: false,
            crm_pushed: false,
        })
    }

    /// Geocode the origin and every candidate, then rank by distance.
    /// All lookups flow through the shared memoized geocoder.
    async fn distance_ranking(
        &self,
        origin: Option<&str>,
        filtered: &[Community],
    ) -> (DimensionRanking, HashMap<u32, Option<f64>>) {
        let mut distances: HashMap<u32, Option<f64>> = HashMap::new();
        if let Some(origin) = origin {
            for community in filtered {
                let miles = match &community.zip_code {
                    Some(zip) => self.geocoder.distance_miles(origin, zip).await,
                    None => None,
                };
                distances.insert(community.community_id, miles);
            }
        }
        let ranking = ranking::distance(filtered, &distances, origin);
        (ranking, distances)
    }
}

fn transition(consultation_id: &str, phase: &mut ConsultationPhase, next: ConsultationPhase) {
    debug!("[{}] {} -> {}", consultation_id, phase.as_str(), next.as_str());
    *phase = next;
}

fn secs(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

fn build_metrics(
    timings: BTreeMap<String, f64>,
    calls: Vec<LlmCallMetrics>,
    ai_ranker_degraded: Vec<String>,
    model_id: &str,
) -> PerformanceMetrics {
    let input: u64 = calls.iter().map(|c| c.input_tokens).sum();
    let output: u64 = calls.iter().map(|c| c.output_tokens).sum();

    let (input_rate, output_rate) = model_pricing(model_id);
    let input_usd = round6(input as f64 * input_rate);
    let output_usd = round6(output as f64 * output_rate);

    PerformanceMetrics {
        timings,
        token_counts: TokenCounts {
            input,
            output,
            calls,
        },
        costs: CostEstimate {
            input_usd,
            output_usd,
            total_usd: round6(input_usd + output_usd),
        },
        ai_ranker_degraded,
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Opaque consultation id: millisecond timestamp plus a multiplicative
/// hash suffix, matching the catalog's write-once id discipline.
fn new_consultation_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix: u32 = (timestamp as u32).wrapping_mul(2654435761);
    format!("cons-{timestamp:x}-{suffix:x}")
}
