pub mod types;

pub use types::{
    ApartmentType, ApiResponse, CareLevel, CatalogStats, ClientRequirements, CommunitiesResponse,
    Community, CommunityCreatedResponse, CommunityUpsert, ConsultationResult, CostEstimate,
    HealthResponse, KeyMetrics, LlmCallMetrics, MessageResponse, PerformanceMetrics,
    ProcessTextRequest, RankDimension, RankWeights, Recommendation, Timeline, TokenCounts,
    UpfrontCosts,
};
