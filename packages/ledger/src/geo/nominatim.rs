//! Nominatim (OpenStreetMap) implementation of the Geocoder trait.
//!
//! Searches are bounded to the jurisdiction's viewbox first, then retried
//! unbounded, then resolved against a small table of known centroids for
//! places the public geocoder routinely misses.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};
use crate::traits::geocoder::{GeocodeHit, Geocoder};
use crate::types::incident::Jurisdiction;

/// Bounding boxes (min_lon, min_lat, max_lon, max_lat).
fn bounds(jurisdiction: Jurisdiction) -> (f64, f64, f64, f64) {
    match jurisdiction {
        Jurisdiction::BC => (-139.06, 48.30, -114.05, 60.00),
        Jurisdiction::AB => (-120.00, 48.99, -110.00, 60.00),
        Jurisdiction::WA => (-125.00, 45.50, -116.50, 49.05),
    }
}

/// Known centroids for places the geocoder misses.
const ALIAS_COORDS: &[(&str, f64, f64, &str, &str)] = &[(
    "Peter Lougheed Provincial Park",
    50.72,
    -115.35,
    "CA",
    "Alberta",
)];

/// Normalize common aliases before querying.
fn normalize_query(query: &str) -> String {
    let trimmed = query.trim();
    let lower = trimmed.to_lowercase();
    if lower == "plpp" || (lower.contains("lougheed") && lower.contains("provincial park")) {
        return "Peter Lougheed Provincial Park".to_string();
    }
    trimmed.to_string()
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    province: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

/// Nominatim-backed geocoder.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    user_agent: String,
    base_url: String,
}

impl NominatimGeocoder {
    /// Create a geocoder identifying itself with the given user agent.
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: user_agent.into(),
            base_url: "https://nominatim.openstreetmap.org".to_string(),
        }
    }

    /// Set a custom base URL (self-hosted Nominatim, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn search(
        &self,
        query: &str,
        viewbox: Option<(f64, f64, f64, f64)>,
    ) -> Result<Option<GeocodeHit>> {
        let mut url = format!(
            "{}/search?q={}&format=json&limit=1&addressdetails=1&countrycodes=ca,us",
            self.base_url,
            urlencoding::encode(query)
        );
        if let Some((min_lon, min_lat, max_lon, max_lat)) = viewbox {
            url.push_str(&format!(
                "&viewbox={min_lon},{min_lat},{max_lon},{max_lat}&bounded=1"
            ));
        }

        debug!(query = %query, bounded = viewbox.is_some(), "geocoding");
        let response: Vec<NominatimResponse> = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| LedgerError::Geocode(Box::new(e)))?
            .json()
            .await
            .map_err(|e| LedgerError::Geocode(Box::new(e)))?;

        let Some(first) = response.into_iter().next() else {
            return Ok(None);
        };

        let lat: f64 = first
            .lat
            .parse()
            .map_err(|e| LedgerError::Geocode(format!("invalid latitude: {e}").into()))?;
        let lon: f64 = first
            .lon
            .parse()
            .map_err(|e| LedgerError::Geocode(format!("invalid longitude: {e}").into()))?;

        let (iso_country, admin_area) = match first.address {
            Some(addr) => (
                addr.country_code.map(|c| c.to_uppercase()),
                addr.state.or(addr.region).or(addr.province),
            ),
            None => (None, None),
        };

        Ok(Some(GeocodeHit {
            lat,
            lon,
            display_name: Some(first.display_name),
            iso_country,
            admin_area,
        }))
    }

    fn alias_hit(query: &str) -> Option<GeocodeHit> {
        ALIAS_COORDS
            .iter()
            .find(|(name, ..)| name.eq_ignore_ascii_case(query))
            .map(|(name, lat, lon, iso, admin)| GeocodeHit {
                lat: *lat,
                lon: *lon,
                display_name: Some(name.to_string()),
                iso_country: Some(iso.to_string()),
                admin_area: Some(admin.to_string()),
            })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(
        &self,
        query: &str,
        jurisdiction: Option<Jurisdiction>,
    ) -> Result<Option<GeocodeHit>> {
        if query.trim().is_empty() {
            return Ok(None);
        }

        let normalized = normalize_query(query);
        let full_query = match jurisdiction {
            Some(j) if !normalized.contains(j.admin_area()) => {
                format!("{}, {}", normalized, j.admin_area())
            }
            _ => normalized.clone(),
        };
        let viewbox = jurisdiction.map(bounds);

        // Bounded first
        match self.search(&full_query, viewbox).await {
            Ok(Some(hit)) => return Ok(Some(hit)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "bounded geocode failed"),
        }

        // Alberta helper: many named features only resolve with Kananaskis
        if jurisdiction == Some(Jurisdiction::AB) && !full_query.contains("Kananaskis") {
            let kananaskis = format!("{}, Kananaskis", full_query);
            if let Ok(Some(hit)) = self.search(&kananaskis, viewbox).await {
                return Ok(Some(hit));
            }
        }

        // Retry without bounds
        match self.search(&full_query, None).await {
            Ok(Some(hit)) => return Ok(Some(hit)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "unbounded geocode failed"),
        }

        Ok(Self::alias_hit(&normalized))
    }
}
