use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Care acuity tier offered by a community
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum CareLevel {
    #[serde(rename = "Independent Living")]
    IndependentLiving,
    #[serde(rename = "Assisted Living")]
    AssistedLiving,
    #[serde(rename = "Memory Care")]
    MemoryCare,
}

impl CareLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CareLevel::IndependentLiving => "Independent Living",
            CareLevel::AssistedLiving => "Assisted Living",
            CareLevel::MemoryCare => "Memory Care",
        }
    }

    /// Map a raw workbook cell to a care level by keyword.
    ///
    /// Accepts common shorthand ("IL", "AL", "MC") and any casing.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if lower.contains("independent") || lower == "il" {
            Some(CareLevel::IndependentLiving)
        } else if lower.contains("assisted") || lower == "al" {
            Some(CareLevel::AssistedLiving)
        } else if lower.contains("memory") || lower == "mc" {
            Some(CareLevel::MemoryCare)
        } else {
            None
        }
    }
}

/// Client move-in urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Timeline {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "near-term")]
    NearTerm,
    #[serde(rename = "flexible")]
    Flexible,
}

impl Timeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeline::Immediate => "immediate",
            Timeline::NearTerm => "near-term",
            Timeline::Flexible => "flexible",
        }
    }

    /// Highest availability score a community may have and still satisfy
    /// this timeline. `None` means no constraint.
    pub fn max_availability_score(&self) -> Option<u8> {
        match self {
            Timeline::Immediate => Some(20),
            Timeline::NearTerm => Some(60),
            Timeline::Flexible => None,
        }
    }
}

/// Normalized apartment tag shared by the catalog and client preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ApartmentType {
    #[serde(rename = "studio")]
    Studio,
    #[serde(rename = "1BR")]
    OneBedroom,
    #[serde(rename = "2BR")]
    TwoBedroom,
    #[serde(rename = "double-occupancy")]
    DoubleOccupancy,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ApartmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApartmentType::Studio => "studio",
            ApartmentType::OneBedroom => "1BR",
            ApartmentType::TwoBedroom => "2BR",
            ApartmentType::DoubleOccupancy => "double-occupancy",
            ApartmentType::Unknown => "unknown",
        }
    }

    /// Keyword normalization for free-text apartment descriptions.
    pub fn from_raw(raw: &str) -> Self {
        let lower = raw.trim().to_lowercase();
        if lower.contains("studio") || lower.contains("efficiency") {
            ApartmentType::Studio
        } else if lower.contains("2 bed") || lower.contains("2br") || lower.contains("two bed") {
            ApartmentType::TwoBedroom
        } else if lower.contains("1 bed") || lower.contains("1br") || lower.contains("one bed") {
            ApartmentType::OneBedroom
        } else if lower.contains("double") || lower.contains("shared") || lower.contains("companion")
        {
            ApartmentType::DoubleOccupancy
        } else {
            ApartmentType::Unknown
        }
    }
}

/// One-time costs charged at move-in
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UpfrontCosts {
    #[serde(default)]
    pub deposit: f64,
    #[serde(default)]
    pub move_in_fee: f64,
    #[serde(default)]
    pub community_fee: f64,
    #[serde(default)]
    pub pet_fee: f64,
    /// None = community does not publish a second-person rate
    pub second_person_fee: Option<f64>,
}

/// One row of the community catalog with derived fields computed at load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Community {
    pub community_id: u32,
    pub name: Option<String>,
    pub care_level: CareLevel,
    pub monthly_fee: f64,
    pub upfront_costs: UpfrontCosts,
    /// Always `^\d{5}$` when present; unparseable ZIPs are dropped at load
    pub zip_code: Option<String>,
    pub apartment_type: ApartmentType,
    /// Raw waitlist text as it appeared in the workbook
    pub waitlist_status: String,
    /// 0 = available now, 99 = unconfirmed/long; lower = sooner
    pub availability_score: u8,
    pub works_with_placement: bool,
    /// Commission fraction in [0, 1]
    pub contract_rate: f64,
    /// Derived 0..10 partnership willingness
    pub willingness_score: u8,
    pub enhanced: bool,
    pub enriched: bool,
    /// Optional workbook columns, preserved verbatim on write
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Structured requirements extracted from one consultation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClientRequirements {
    pub client_name: Option<String>,
    pub care_level: CareLevel,
    pub budget_monthly: Option<f64>,
    pub timeline: Timeline,
    /// Location as the client phrased it (ZIP or free-text locality)
    pub location_preference: Option<String>,
    /// Canonical ZIP after resolution, used for distance ranking
    pub resolved_zip: Option<String>,
    #[serde(default)]
    pub needs_enhanced: bool,
    #[serde(default)]
    pub needs_enriched: bool,
    #[serde(default)]
    pub is_couple: bool,
    #[serde(default)]
    pub has_pet: bool,
    pub apartment_preference: Option<ApartmentType>,
    pub special_notes: Option<String>,
}

/// The eight ranking dimensions fused by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankDimension {
    Business,
    Cost,
    Distance,
    BudgetEfficiency,
    Couple,
    Availability,
    Amenity,
    Holistic,
}

impl RankDimension {
    pub const DETERMINISTIC: [RankDimension; 5] = [
        RankDimension::Business,
        RankDimension::Cost,
        RankDimension::Distance,
        RankDimension::BudgetEfficiency,
        RankDimension::Couple,
    ];

    pub const AI: [RankDimension; 3] = [
        RankDimension::Availability,
        RankDimension::Amenity,
        RankDimension::Holistic,
    ];

    pub const ALL: [RankDimension; 8] = [
        RankDimension::Business,
        RankDimension::Cost,
        RankDimension::Distance,
        RankDimension::BudgetEfficiency,
        RankDimension::Couple,
        RankDimension::Availability,
        RankDimension::Amenity,
        RankDimension::Holistic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankDimension::Business => "business",
            RankDimension::Cost => "cost",
            RankDimension::Distance => "distance",
            RankDimension::BudgetEfficiency => "budget_efficiency",
            RankDimension::Couple => "couple",
            RankDimension::Availability => "availability",
            RankDimension::Amenity => "amenity",
            RankDimension::Holistic => "holistic",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.as_str() == name)
    }
}

/// Per-dimension weights for the Borda combine. All 1.0 by default;
/// caller overrides replace only the dimensions they name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RankWeights {
    pub business: f64,
    pub cost: f64,
    pub distance: f64,
    pub budget_efficiency: f64,
    pub couple: f64,
    pub availability: f64,
    pub amenity: f64,
    pub holistic: f64,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            business: 1.0,
            cost: 1.0,
            distance: 1.0,
            budget_efficiency: 1.0,
            couple: 1.0,
            availability: 1.0,
            amenity: 1.0,
            holistic: 1.0,
        }
    }
}

impl RankWeights {
    pub fn get(&self, dimension: RankDimension) -> f64 {
        match dimension {
            RankDimension::Business => self.business,
            RankDimension::Cost => self.cost,
            RankDimension::Distance => self.distance,
            RankDimension::BudgetEfficiency => self.budget_efficiency,
            RankDimension::Couple => self.couple,
            RankDimension::Availability => self.availability,
            RankDimension::Amenity => self.amenity,
            RankDimension::Holistic => self.holistic,
        }
    }

    fn set(&mut self, dimension: RankDimension, weight: f64) {
        match dimension {
            RankDimension::Business => self.business = weight,
            RankDimension::Cost => self.cost = weight,
            RankDimension::Distance => self.distance = weight,
            RankDimension::BudgetEfficiency => self.budget_efficiency = weight,
            RankDimension::Couple => self.couple = weight,
            RankDimension::Availability => self.availability = weight,
            RankDimension::Amenity => self.amenity = weight,
            RankDimension::Holistic => self.holistic = weight,
        }
    }

    /// Defaults with named dimensions replaced. Unknown names and
    /// negative weights are rejected.
    pub fn with_overrides(overrides: &BTreeMap<String, f64>) -> Result<Self, String> {
        let mut weights = Self::default();
        for (name, weight) in overrides {
            let dimension = RankDimension::from_name(name)
                .ok_or_else(|| format!("unknown ranking dimension {name:?}"))?;
            if !weight.is_finite() || *weight < 0.0 {
                return Err(format!("invalid weight {weight} for dimension {name:?}"));
            }
            weights.set(dimension, *weight);
        }
        Ok(weights)
    }
}

/// Snapshot of the numbers a consultant quotes first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct KeyMetrics {
    pub monthly_fee: f64,
    pub distance_miles: Option<f64>,
    pub est_waitlist: String,
}

/// One ranked community in the final answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Recommendation {
    pub final_rank: u32,
    pub community_id: u32,
    pub community_name: Option<String>,
    pub combined_rank_score: f64,
    pub key_metrics: KeyMetrics,
    /// Per-dimension rank; `null` where the ranker was not applicable
    pub rankings: BTreeMap<String, Option<f64>>,
    pub explanations: BTreeMap<String, String>,
}

/// Token usage and latency for one provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LlmCallMetrics {
    pub label: String,
    pub latency_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Token totals across all calls of one consultation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
    pub calls: Vec<LlmCallMetrics>,
}

/// USD estimate from the static pricing table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CostEstimate {
    pub input_usd: f64,
    pub output_usd: f64,
    pub total_usd: f64,
}

/// Per-phase timings, token usage, and degradation flags
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PerformanceMetrics {
    /// Phase name -> wall seconds
    pub timings: BTreeMap<String, f64>,
    pub token_counts: TokenCounts,
    pub costs: CostEstimate,
    /// AI dimensions that fell back to neutral ranks this consultation
    pub ai_ranker_degraded: Vec<String>,
}

/// Everything handed back to collaborators for one consultation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConsultationResult {
    pub consultation_id: String,
    pub client_info: ClientRequirements,
    pub recommendations: Vec<Recommendation>,
    pub performance_metrics: PerformanceMetrics,
    pub no_matches: bool,
    pub crm_pushed: bool,
}

/// Catalog aggregates for the stats endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CatalogStats {
    pub total_communities: u32,
    pub by_care_level: BTreeMap<String, u32>,
    pub average_monthly_fee: f64,
    pub min_monthly_fee: f64,
    pub max_monthly_fee: f64,
    pub available_now: u32,
    pub placement_partners: u32,
    /// RFC 3339 timestamp of when the snapshot was summarized
    pub generated_at: String,
}

// ===== HTTP Request/Response Types =====

/// Generic API response wrapper (error bodies)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T>
where
    T: Serialize + Clone,
{
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// POST /api/process-text body
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ProcessTextRequest {
    pub text: String,
    #[serde(default)]
    pub push_to_crm: bool,
    pub language: Option<String>,
    /// Optional per-dimension weight overrides by dimension name
    pub weights: Option<BTreeMap<String, f64>>,
}

/// POST/PUT /api/communities payload, raw workbook-shaped fields.
///
/// The store re-runs load-time normalization (waitlist score, apartment
/// tag, willingness) on every write.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CommunityUpsert {
    pub name: Option<String>,
    pub care_level: String,
    pub monthly_fee: f64,
    pub zip_code: Option<String>,
    pub apartment_type: Option<String>,
    pub est_waitlist: Option<String>,
    #[serde(default)]
    pub works_with_placement: bool,
    #[serde(default)]
    pub contract_rate: f64,
    #[serde(default)]
    pub enhanced: bool,
    #[serde(default)]
    pub enriched: bool,
    #[serde(default)]
    pub deposit: f64,
    #[serde(default)]
    pub move_in_fee: f64,
    #[serde(default)]
    pub community_fee: f64,
    #[serde(default)]
    pub pet_fee: f64,
    pub second_person_fee: Option<f64>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// GET /api/communities body
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CommunitiesResponse {
    pub communities: Vec<Community>,
}

/// POST /api/communities success body
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CommunityCreatedResponse {
    pub community_id: u32,
}

/// PUT/DELETE /api/communities/{id} success body
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MessageResponse {
    pub message: String,
}

/// GET /api/health body
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthResponse {
    pub status: String,
    pub llm_configured: bool,
}
