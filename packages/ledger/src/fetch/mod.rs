//! Fetching: HTTP retrieval with robots.txt compliance.

pub mod http;
pub mod robots;

pub use http::{canonicalize_url, HttpFetcher};
pub use robots::{fetch_robots_txt, RobotsTxt};
