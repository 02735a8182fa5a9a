//! # Geocoder
//!
//! Resolves 5-digit ZIP codes to WGS-84 coordinates through a pluggable
//! locator and computes great-circle distances in miles. Lookups are
//! memoized in a process-wide bounded LRU (failures included, so a bad
//! ZIP costs one network call per process) and external calls are spaced
//! at most one per second.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lru::LruCache;
use tokio::time::Instant;
use tracing::{debug, warn};

/// WGS-84 mean Earth radius, in miles
const EARTH_RADIUS_MILES: f64 = 3958.7613;

/// Minimum spacing between external geocode calls
const GEOCODE_INTERVAL: Duration = Duration::from_secs(1);

/// Floor for the memoization bound; configuration may only raise it
pub const MIN_CACHE_ENTRIES: usize = 1024;

/// External ZIP-to-coordinates capability
#[async_trait]
pub trait ZipLocator: Send + Sync {
    /// Resolve a 5-digit ZIP to `(latitude, longitude)` in degrees.
    async fn locate(&self, zip: &str) -> Result<(f64, f64)>;
}

/// Zippopotam.us locator (public endpoint, no credential)
pub struct ZippopotamLocator {
    client: reqwest::Client,
    base_url: String,
}

impl ZippopotamLocator {
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://api.zippopotam.us")
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build geocode HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ZipLocator for ZippopotamLocator {
    async fn locate(&self, zip: &str) -> Result<(f64, f64)> {
        let url = format!("{}/us/{}", self.base_url, zip);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Geocode request failed for ZIP {zip}"))?;

        if !response.status().is_success() {
            anyhow::bail!("Geocode service returned {} for ZIP {}", response.status(), zip);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("Geocode response for ZIP {zip} was not JSON"))?;

        let place = &body["places"][0];
        let lat: f64 = place["latitude"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .with_context(|| format!("No latitude in geocode response for ZIP {zip}"))?;
        let lon: f64 = place["longitude"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .with_context(|| format!("No longitude in geocode response for ZIP {zip}"))?;

        Ok((lat, lon))
    }
}

/// Memoizing, rate-limited front over a [`ZipLocator`]
pub struct Geocoder {
    locator: Arc<dyn ZipLocator>,
    cache: Mutex<LruCache<String, Option<(f64, f64)>>>,
    /// Timestamp of the last external call; held across the call so
    /// concurrent consultations queue cooperatively.
    gate: tokio::sync::Mutex<Option<Instant>>,
}

impl Geocoder {
    pub fn new(locator: Arc<dyn ZipLocator>, cache_entries: usize) -> Self {
        let bound = cache_entries.max(MIN_CACHE_ENTRIES);
        Self {
            locator,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(bound).expect("cache bound is nonzero"),
            )),
            gate: tokio::sync::Mutex::new(None),
        }
    }

    /// Coordinates for a ZIP, or `None` when the locator cannot resolve it.
    pub async fn coordinates(&self, zip: &str) -> Option<(f64, f64)> {
        if let Some(hit) = self.cache.lock().expect("geocode cache poisoned").get(zip) {
            return *hit;
        }

        let mut gate = self.gate.lock().await;

        // Another waiter may have resolved this ZIP while we queued.
        if let Some(hit) = self.cache.lock().expect("geocode cache poisoned").get(zip) {
            return *hit;
        }

        if let Some(last) = *gate {
            let elapsed = last.elapsed();
            if elapsed < GEOCODE_INTERVAL {
                tokio::time::sleep(GEOCODE_INTERVAL - elapsed).await;
            }
        }

        let resolved = match self.locator.locate(zip).await {
            Ok(coords) => {
                debug!("Geocoded ZIP {} -> {:?}", zip, coords);
                Some(coords)
            }
            Err(e) => {
                warn!("Geocoding failed for ZIP {}: {}", zip, e);
                None
            }
        };
        *gate = Some(Instant::now());
        drop(gate);

        self.cache
            .lock()
            .expect("geocode cache poisoned")
            .put(zip.to_string(), resolved);
        resolved
    }

    /// Geodesic miles between two ZIPs; `None` when either end is unknown.
    pub async fn distance_miles(&self, from_zip: &str, to_zip: &str) -> Option<f64> {
        let from = self.coordinates(from_zip).await?;
        let to = self.coordinates(to_zip).await?;
        Some(haversine_miles(from, to))
    }
}

/// Great-circle distance between two (lat, lon) pairs in miles.
pub fn haversine_miles(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = a;
    let (lat2, lon2) = b;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_MILES * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixtureLocator {
        coords: HashMap<String, (f64, f64)>,
        calls: AtomicUsize,
    }

    impl FixtureLocator {
        fn new(entries: &[(&str, (f64, f64))]) -> Self {
            Self {
                coords: entries
                    .iter()
                    .map(|(zip, c)| (zip.to_string(), *c))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ZipLocator for FixtureLocator {
        async fn locate(&self, zip: &str) -> Result<(f64, f64)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.coords
                .get(zip)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("unknown ZIP {zip}"))
        }
    }

    #[test]
    fn test_haversine_zero_distance() {
        let rochester = (43.1566, -77.6088);
        assert!(haversine_miles(rochester, rochester) < 1e-9);
    }

    #[test]
    fn test_haversine_known_pair() {
        // Downtown Rochester to the 14620 neighborhood, roughly 2 miles.
        let downtown = (43.1566, -77.6088);
        let south_wedge = (43.1284, -77.6054);
        let miles = haversine_miles(downtown, south_wedge);
        assert!(miles > 1.5 && miles < 2.5, "got {miles}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_is_memoized() {
        let locator = Arc::new(FixtureLocator::new(&[("14620", (43.13, -77.61))]));
        let geocoder = Geocoder::new(locator.clone(), 0);

        assert_eq!(geocoder.coordinates("14620").await, Some((43.13, -77.61)));
        assert_eq!(geocoder.coordinates("14620").await, Some((43.13, -77.61)));
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_memoized() {
        let locator = Arc::new(FixtureLocator::new(&[]));
        let geocoder = Geocoder::new(locator.clone(), 0);

        assert_eq!(geocoder.coordinates("00000").await, None);
        assert_eq!(geocoder.coordinates("00000").await, None);
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_calls_are_spaced() {
        let locator = Arc::new(FixtureLocator::new(&[
            ("14604", (43.1566, -77.6088)),
            ("14620", (43.1284, -77.6054)),
        ]));
        let geocoder = Geocoder::new(locator, 0);

        let start = Instant::now();
        geocoder.coordinates("14604").await;
        geocoder.coordinates("14620").await;
        assert!(start.elapsed() >= GEOCODE_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distance_unknown_endpoint() {
        let locator = Arc::new(FixtureLocator::new(&[("14604", (43.1566, -77.6088))]));
        let geocoder = Geocoder::new(locator, 0);

        assert!(geocoder.distance_miles("14604", "99999").await.is_none());
        let known = geocoder.distance_miles("14604", "14604").await;
        assert_eq!(known, Some(0.0));
    }
}
