use std::collections::HashMap;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::model::RouteInfo;

use super::RouteError;
use super::route_cache::RouteKey;

/// External trip-distance provider. Only consulted on a route cache miss.
#[async_trait]
pub trait Router: Send + Sync {
    async fn compute_route(
        &self,
        origin: &str,
        destination: &str,
        stops: &[String],
    ) -> Result<RouteInfo, RouteError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteTableEntry {
    pub origin: String,
    pub destination: String,
    #[serde(flatten)]
    pub route: RouteInfo,
}

/// Router backed by a fixed table of known legs. Legs are looked up in either
/// direction; trips with stops are the sum of their legs.
#[derive(Debug, Default)]
pub struct StaticRouter {
    legs: HashMap<RouteKey, RouteInfo>,
}

impl StaticRouter {
    pub fn new(entries: Vec<RouteTableEntry>) -> Self {
        let legs = entries
            .into_iter()
            .map(|e| (RouteKey::new(&e.origin, &e.destination), e.route))
            .collect();
        Self { legs }
    }

    /// Load a JSON array of `{origin, destination, distance_km, duration_min, traffic, toll}`.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let entries: Vec<RouteTableEntry> =
            serde_json::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    fn leg(&self, from: &str, to: &str) -> Result<&RouteInfo, RouteError> {
        self.legs
            .get(&RouteKey::new(from, to))
            .or_else(|| self.legs.get(&RouteKey::new(to, from)))
            .ok_or_else(|| RouteError::NoRoute {
                origin: from.to_string(),
                destination: to.to_string(),
            })
    }
}

#[async_trait]
impl Router for StaticRouter {
    async fn compute_route(
        &self,
        origin: &str,
        destination: &str,
        stops: &[String],
    ) -> Result<RouteInfo, RouteError> {
        let waypoints: Vec<&str> = std::iter::once(origin)
            .chain(stops.iter().map(String::as_str))
            .chain(std::iter::once(destination))
            .collect();

        let mut total: Option<RouteInfo> = None;
        for pair in waypoints.windows(2) {
            let leg = self.leg(pair[0], pair[1])?;
            total = Some(match total {
                None => leg.clone(),
                Some(acc) => RouteInfo {
                    distance_km: acc.distance_km + leg.distance_km,
                    duration_min: acc.duration_min.saturating_add(leg.duration_min),
                    traffic: acc.traffic.max(leg.traffic),
                    toll: acc.toll || leg.toll,
                },
            });
        }
        // `waypoints` always holds at least origin and destination.
        total.ok_or_else(|| RouteError::NoRoute {
            origin: origin.to_string(),
            destination: destination.to_string(),
        })
    }
}
