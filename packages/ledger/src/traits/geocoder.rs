//! Geocoder trait: place name to coordinates.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::incident::Jurisdiction;

/// A geocoding hit.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub lat: f64,
    pub lon: f64,
    pub display_name: Option<String>,
    pub iso_country: Option<String>,
    pub admin_area: Option<String>,
}

/// Geocoding collaborator. A miss is `Ok(None)`, not an error.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a place query, optionally bounded by a jurisdiction hint.
    async fn geocode(
        &self,
        query: &str,
        jurisdiction: Option<Jurisdiction>,
    ) -> Result<Option<GeocodeHit>>;
}
