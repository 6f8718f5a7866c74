//! Nearby-hospital lookup and driving routes over public map services.
//!
//! Hospitals come from an Overpass API query for `amenity=hospital` nodes around a point.
//! Results are ordered nearest first by great-circle distance. Routes come from an OSRM
//! server and are returned as `(lat, lon)` points ready to draw.

use crate::config::CoreConfig;
use crate::constants::EARTH_RADIUS_KM;
use crate::retry::{HttpRequest, HttpTransport, RetryingClient};
use crate::{CareError, CareResult};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

pub const UNNAMED_HOSPITAL: &str = "Unnamed Hospital";

/// A WGS84 coordinate in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// # Errors
    ///
    /// Returns `CareError::InvalidInput` if either value is not finite or out of range.
    pub fn new(lat: f64, lon: f64) -> CareResult<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CareError::InvalidInput(format!(
                "latitude out of range: {lat}"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(CareError::InvalidInput(format!(
                "longitude out of range: {lon}"
            )));
        }
        Ok(Self { lat, lon })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
}

/// A driving route as an ordered list of points.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub points: Vec<GeoPoint>,
}

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Overpass QL for hospital nodes within `radius_m` metres of `center`.
pub fn overpass_query(center: GeoPoint, radius_m: u32) -> String {
    format!(
        "[out:json];node(around:{radius_m},{},{})[amenity=hospital];out;",
        center.lat, center.lon
    )
}

/// # Errors
///
/// Returns `CareError::InvalidConfig` if `base` is not a valid URL.
pub fn overpass_url(base: &str, center: GeoPoint, radius_m: u32) -> CareResult<String> {
    let url = Url::parse_with_params(base, &[("data", overpass_query(center, radius_m))])
        .map_err(|e| CareError::InvalidConfig(format!("overpass url {base:?}: {e}")))?;
    Ok(url.into())
}

/// OSRM driving route request. OSRM takes `lon,lat` pairs.
pub fn osrm_route_url(base: &str, from: GeoPoint, to: GeoPoint) -> String {
    format!(
        "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
        base.trim_end_matches('/'),
        from.lon,
        from.lat,
        to.lon,
        to.lat
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    lat: Option<f64>,
    lon: Option<f64>,
    #[serde(default)]
    tags: OverpassTags,
}

#[derive(Debug, Default, Deserialize)]
struct OverpassTags {
    name: Option<String>,
}

/// Parse an Overpass reply into hospitals sorted nearest first.
///
/// Elements without coordinates are skipped.
///
/// # Errors
///
/// Returns `CareError::Deserialization` if the body is not an Overpass JSON reply.
pub fn parse_overpass(body: &[u8], center: GeoPoint) -> CareResult<Vec<Hospital>> {
    let reply: OverpassResponse =
        serde_json::from_slice(body).map_err(CareError::Deserialization)?;

    let mut hospitals: Vec<Hospital> = reply
        .elements
        .into_iter()
        .filter_map(|el| {
            let (lat, lon) = (el.lat?, el.lon?);
            let name = el
                .tags
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNNAMED_HOSPITAL.to_string());
            Some(Hospital {
                name,
                lat,
                lon,
                distance_km: haversine_km(center, GeoPoint { lat, lon }),
            })
        })
        .collect();

    hospitals.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(hospitals)
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// Parse the first route of an OSRM reply, flipping `[lon, lat]` to `(lat, lon)`.
///
/// A reply without routes gives an empty route.
///
/// # Errors
///
/// Returns `CareError::Deserialization` if the body is not an OSRM JSON reply.
pub fn parse_osrm_route(body: &[u8]) -> CareResult<Route> {
    let reply: OsrmResponse = serde_json::from_slice(body).map_err(CareError::Deserialization)?;
    let points = reply
        .routes
        .into_iter()
        .next()
        .map(|route| {
            route
                .geometry
                .coordinates
                .into_iter()
                .map(|[lon, lat]| GeoPoint { lat, lon })
                .collect()
        })
        .unwrap_or_default();
    Ok(Route { points })
}

/// Queries the map services through a [`RetryingClient`].
#[derive(Clone, Debug)]
pub struct HospitalFinder<T> {
    http: RetryingClient<T>,
    overpass_url: String,
    osrm_url: String,
    radius_m: u32,
}

impl<T: HttpTransport> HospitalFinder<T> {
    pub fn new(http: RetryingClient<T>, cfg: &CoreConfig) -> Self {
        Self {
            http,
            overpass_url: cfg.overpass_url().to_string(),
            osrm_url: cfg.osrm_url().to_string(),
            radius_m: cfg.search_radius_m(),
        }
    }

    pub fn radius_m(&self) -> u32 {
        self.radius_m
    }

    async fn get(&self, url: String, cancel: Option<&CancellationToken>) -> CareResult<Vec<u8>> {
        let request = HttpRequest::get(url);
        let resp = match cancel {
            Some(token) => self.http.fetch_cancellable(&request, token).await?,
            None => self.http.fetch(&request).await?,
        };
        Ok(resp.body)
    }

    /// Hospitals around `center`, nearest first.
    ///
    /// # Arguments
    ///
    /// * `center` - Where to search from.
    /// * `radius_m` - Search radius in metres; the configured radius when `None`.
    /// * `cancel` - Optional token that aborts the lookup.
    ///
    /// # Errors
    ///
    /// Returns the retry helper's error if the Overpass request fails, or
    /// `CareError::Deserialization` if its reply cannot be read.
    pub async fn nearby(
        &self,
        center: GeoPoint,
        radius_m: Option<u32>,
        cancel: Option<&CancellationToken>,
    ) -> CareResult<Vec<Hospital>> {
        let radius_m = radius_m.filter(|r| *r > 0).unwrap_or(self.radius_m);
        let url = overpass_url(&self.overpass_url, center, radius_m)?;
        let body = self.get(url, cancel).await?;
        let hospitals = parse_overpass(&body, center)?;
        tracing::info!(
            "found {} hospitals within {} m of ({}, {})",
            hospitals.len(),
            radius_m,
            center.lat,
            center.lon
        );
        Ok(hospitals)
    }

    /// Driving route from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns the retry helper's error if the OSRM request fails, or
    /// `CareError::Deserialization` if its reply cannot be read.
    pub async fn route(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        cancel: Option<&CancellationToken>,
    ) -> CareResult<Route> {
        let body = self
            .get(osrm_route_url(&self.osrm_url, from, to), cancel)
            .await?;
        let route = parse_osrm_route(&body)?;
        if route.points.is_empty() {
            tracing::warn!("routing service returned no route");
        }
        Ok(route)
    }
}
