//! Area selection and the provider seams that turn an area into a topology

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{DrivewayError, Result, topology::Topology};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(DrivewayError::Import(format!(
                "Coordinate out of range: {lat} {lon}"
            )));
        }
        Ok(Self { lat, lon })
    }
}

/// Closed area given as a ring of coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<GeoPoint>,
}

impl Polygon {
    pub const MIN_POINTS: usize = 3;

    /// Parse a whitespace separated `lat lon lat lon ...` string
    pub fn parse(input: &str) -> Result<Self> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        if tokens.len() % 2 != 0 {
            return Err(DrivewayError::Import(
                "Polygon needs an even number of coordinates".into(),
            ));
        }

        let mut points = Vec::with_capacity(tokens.len() / 2);
        for pair in tokens.chunks_exact(2) {
            let lat = parse_coordinate(pair[0])?;
            let lon = parse_coordinate(pair[1])?;
            points.push(GeoPoint::new(lat, lon)?);
        }

        if points.len() < Self::MIN_POINTS {
            return Err(DrivewayError::Import(format!(
                "Polygon needs at least {} points, got {}",
                Self::MIN_POINTS,
                points.len()
            )));
        }

        Ok(Self { points })
    }
}

fn parse_coordinate(token: &str) -> Result<f64> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DrivewayError::Import(format!("Not a coordinate: {token}")))
}

impl FromStr for Polygon {
    type Err = DrivewayError;

    fn from_str(s: &str) -> Result<Self> {
        Polygon::parse(s)
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for point in &self.points {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{} {}", point.lat, point.lon)?;
            first = false;
        }
        Ok(())
    }
}

/// Source of track layouts, typically a map data extractor
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    async fn import(&self, polygon: &Polygon) -> Result<Topology>;
}

/// Computes the routes of a topology and returns it with `routes` filled in
#[async_trait]
pub trait RouteProvider: Send + Sync {
    async fn generate_routes(&self, topology: Topology) -> Result<Topology>;
}
