//! Nominatim / OpenStreetMap geocoder client.
//!
//! The public instance allows roughly one request per second and answers
//! HTTP 429 when exceeded; that is surfaced as
//! [`GeocodeError::RateLimited`] so the cache layer can back off.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::time::Duration;

use bridge_aid_incident_models::Coordinates;

use crate::{GeocodeError, GeocodedAddress, Geocoder, GeocoderConfig};

/// Free-form Nominatim search client.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    /// Creates a client for the endpoint and user agent in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(
        &self,
        address: &str,
        region_bias: Option<&str>,
        language: &str,
    ) -> Result<Option<GeocodedAddress>, GeocodeError> {
        let mut params = vec![
            ("q", address),
            ("format", "jsonv2"),
            ("limit", "1"),
            ("addressdetails", "0"),
            ("accept-language", language),
        ];
        if let Some(codes) = region_bias {
            params.push(("countrycodes", codes));
        }

        let resp = self.client.get(&self.base_url).query(&params).send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }
        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Parses a Nominatim `jsonv2` search response.
///
/// Coordinates are rounded to six decimal places (~0.1 m).
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let lat = parse_coordinate(first, "lat")?;
    let lon = parse_coordinate(first, "lon")?;

    let coordinates = Coordinates::new(round6(lat), round6(lon)).map_err(|e| {
        GeocodeError::Parse {
            message: e.to_string(),
        }
    })?;

    let display_name = first["display_name"].as_str().map(String::from);

    Ok(Some(GeocodedAddress {
        coordinates,
        display_name,
    }))
}

/// Nominatim returns coordinates as strings; accept bare numbers too.
fn parse_coordinate(entry: &serde_json::Value, key: &str) -> Result<f64, GeocodeError> {
    let value = &entry[key];
    value
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| value.as_f64())
        .ok_or_else(|| GeocodeError::Parse {
            message: format!("Missing {key} in Nominatim response"),
        })
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "43.5182991",
            "lon": "-79.8774042",
            "display_name": "Main Street East, Milton, Halton Region, Ontario, Canada"
        }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.coordinates.latitude() - 43.518_299).abs() < 1e-9);
        assert!((result.coordinates.longitude() - -79.877_404).abs() < 1e-9);
        assert_eq!(
            result.display_name.as_deref(),
            Some("Main Street East, Milton, Halton Region, Ontario, Canada")
        );
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn missing_display_name_is_none() {
        let body = serde_json::json!([{ "lat": 10.5, "lon": 20.25 }]);
        let result = parse_response(&body).unwrap().unwrap();
        assert!(result.display_name.is_none());
    }

    #[test]
    fn rejects_non_array_body() {
        let body = serde_json::json!({ "error": "bad request" });
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let body = serde_json::json!([{ "lat": "91.0", "lon": "0.0" }]);
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[test]
    fn builds_from_default_config() {
        assert!(NominatimGeocoder::new(&GeocoderConfig::default()).is_ok());
    }
}
