//! Coordinate parsing for geo-enabled deployments.

/// One point of a coordinate list, normalized to decimal-point notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub lat: String,
    pub long: String,
    pub alt: Option<String>,
}

impl Point {
    /// The combined `"<lat>,<long>"` geohash-style value.
    pub fn geohash(&self) -> String {
        format!("{},{}", self.lat, self.long)
    }
}

/// Normalize a single coordinate: decimal comma becomes decimal point.
/// `None` when the result is not a finite number.
pub fn normalize_coordinate(raw: &str) -> Option<String> {
    let value = raw.trim().replace(',', ".");
    value
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|_| value)
}

/// Parse a combined lat/long literal.
///
/// Accepts `"<lat> <long>"`, `"<lat>;<long>"` and `"<lat>,<long>"`. With
/// whitespace or semicolon separators each half may use a decimal comma.
pub fn parse_lat_long(raw: &str) -> Option<Point> {
    let raw = raw.trim();
    let parts: Vec<&str> = raw
        .split(|c: char| c.is_whitespace() || c == ';')
        .filter(|s| !s.is_empty())
        .collect();
    let (lat, long) = match parts.as_slice() {
        [lat, long] => (*lat, *long),
        [single] => single.split_once(',')?,
        _ => return None,
    };
    Some(Point {
        lat: normalize_coordinate(lat)?,
        long: normalize_coordinate(long)?,
        alt: None,
    })
}

/// Parse a whitespace-separated list of `long,lat[,alt]` tuples.
///
/// Malformed tuples are skipped.
pub fn parse_coordinates(raw: &str) -> Vec<Point> {
    raw.split_whitespace()
        .filter_map(|tuple| {
            let mut parts = tuple.split(',');
            let long = normalize_coordinate(parts.next()?)?;
            let lat = normalize_coordinate(parts.next()?)?;
            let alt = match parts.next() {
                Some(a) => Some(normalize_coordinate(a)?),
                None => None,
            };
            if parts.next().is_some() {
                return None;
            }
            Some(Point { lat, long, alt })
        })
        .collect()
}
