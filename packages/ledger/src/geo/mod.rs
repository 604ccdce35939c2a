//! Geocoding implementations.

mod nominatim;

pub use nominatim::NominatimGeocoder;
