//! Shared fixtures for the integration tests: a prompt-routed scripted
//! model, a fixture geocoder, and catalog builders.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use carematch::models::CommunityUpsert;
use carematch::routes::AppState;
use carematch::services::catalog::CatalogStore;
use carematch::services::geocode::{Geocoder, ZipLocator};
use carematch::services::llm::{
    GenerateRequest, GenerateResponse, GenerativeModel, LlmClient, LlmError, PromptPart,
};
use carematch::services::locations::LocationResolver;
use carematch::services::pipeline::{Pipeline, PipelineConfig};

/// Scripted provider: routes each call by prompt content (extraction vs
/// the three ranking dimensions), so concurrent calls stay deterministic.
pub struct RoutingModel {
    pub extraction: Result<String, LlmError>,
    pub availability: Result<String, LlmError>,
    pub amenity: Result<String, LlmError>,
    pub holistic: Result<String, LlmError>,
}

impl RoutingModel {
    /// Happy path: fixed extraction reply, every ranker returns the
    /// given ids best-first.
    pub fn new(extraction: &str, ranking_order: &[u32]) -> Self {
        let reply = ranking_reply(ranking_order);
        Self {
            extraction: Ok(extraction.to_string()),
            availability: Ok(reply.clone()),
            amenity: Ok(reply.clone()),
            holistic: Ok(reply),
        }
    }
}

#[async_trait]
impl GenerativeModel for RoutingModel {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let text: String = request
            .parts
            .iter()
            .filter_map(|part| match part {
                PromptPart::Text(text) => Some(text.as_str()),
                PromptPart::Audio { .. } => None,
            })
            .collect();

        let reply = if text.contains("Dimension: availability match") {
            &self.availability
        } else if text.contains("Dimension: amenity and lifestyle fit") {
            &self.amenity
        } else if text.contains("Dimension: holistic fit") {
            &self.holistic
        } else {
            &self.extraction
        };

        match reply {
            Ok(text) => Ok(GenerateResponse {
                text: text.clone(),
                input_tokens: 1000,
                output_tokens: 100,
            }),
            Err(e) => Err(e.clone()),
        }
    }
}

/// Best-first ranking reply covering the given ids.
pub fn ranking_reply(ids: &[u32]) -> String {
    let items: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "community_id": id,
                "reason": format!("Good fit for this client (community {id})"),
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

/// Fixture geocoder covering the Rochester-area ZIPs the tests use.
pub struct FixtureLocator;

#[async_trait]
impl ZipLocator for FixtureLocator {
    async fn locate(&self, zip: &str) -> anyhow::Result<(f64, f64)> {
        let table: HashMap<&str, (f64, f64)> = [
            ("14450", (43.0998, -77.4419)),
            ("14467", (43.0420, -77.6120)),
            ("14526", (43.1420, -77.4460)),
            ("14534", (43.0900, -77.5150)),
            ("14580", (43.2120, -77.4280)),
            ("14604", (43.1566, -77.6088)),
            ("14606", (43.1700, -77.7000)),
            ("14609", (43.1760, -77.5530)),
            ("14611", (43.1480, -77.6450)),
            ("14612", (43.2590, -77.6770)),
            ("14617", (43.2230, -77.5950)),
            ("14618", (43.1140, -77.5550)),
            ("14620", (43.1284, -77.6054)),
            ("14626", (43.2140, -77.7080)),
        ]
        .into_iter()
        .collect();

        table
            .get(zip)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("unknown ZIP {zip}"))
    }
}

/// Workbook-shaped write payload with sensible defaults.
pub fn upsert(care_level: &str, monthly_fee: f64, zip: &str) -> CommunityUpsert {
    CommunityUpsert {
        name: None,
        care_level: care_level.to_string(),
        monthly_fee,
        zip_code: Some(zip.to_string()),
        apartment_type: Some("1BR".to_string()),
        est_waitlist: Some("Available".to_string()),
        works_with_placement: true,
        contract_rate: 0.8,
        enhanced: false,
        enriched: false,
        deposit: 1000.0,
        move_in_fee: 0.0,
        community_fee: 500.0,
        pet_fee: 250.0,
        second_person_fee: Some(600.0),
        extra: BTreeMap::new(),
    }
}

/// A small assisted-living catalog most tests can share.
pub fn default_catalog() -> Arc<CatalogStore> {
    let catalog = Arc::new(CatalogStore::from_communities(vec![]));
    catalog.create(Some(1), &upsert("Assisted Living", 4100.0, "14620")).unwrap();
    catalog.create(Some(2), &upsert("Assisted Living", 4800.0, "14618")).unwrap();
    catalog.create(Some(3), &upsert("Assisted Living", 5200.0, "14526")).unwrap();
    catalog.create(Some(4), &upsert("Independent Living", 2800.0, "14612")).unwrap();
    catalog
}

pub fn pipeline_with(
    model: Arc<dyn GenerativeModel>,
    catalog: Arc<CatalogStore>,
    config: PipelineConfig,
) -> Pipeline {
    Pipeline::new(
        catalog,
        Arc::new(Geocoder::new(Arc::new(FixtureLocator), 0)),
        Arc::new(LlmClient::new(model)),
        Arc::new(LocationResolver::with_defaults()),
        config,
    )
}

pub fn state_with(model: Arc<dyn GenerativeModel>, catalog: Arc<CatalogStore>) -> AppState {
    let pipeline = Arc::new(pipeline_with(
        model,
        catalog.clone(),
        PipelineConfig::default(),
    ));
    AppState {
        catalog,
        pipeline,
        llm_configured: true,
    }
}
