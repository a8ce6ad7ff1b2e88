//! HTTP client for the IRCEL - CELINE geo services
//!
//! The Belgian Interregional Environment Agency publishes its interpolated
//! measurements and forecasts through GeoServer endpoints:
//!
//! - RIO: vector layers queried with WFS `GetFeature` (`/wfs`)
//! - RIO-IFDM: raster layers queried with WMS `GetFeatureInfo` (`/rioifdm/wms`)
//! - Forecast: raster layers `<feature>_d0..d3` queried with WMS
//!   `GetFeatureInfo` (`/forecast/wms`)
//!
//! # Example
//!
//! ```no_run
//! use celineapi::{AirQualityApi, IrcelineClient, Position, RioFeature};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = IrcelineClient::new().await?;
//!
//!     let values = client
//!         .get_rio(
//!             &[RioFeature::No2HMean],
//!             chrono::Utc::now(),
//!             Position::new(50.85, 4.35),
//!         )
//!         .await?;
//!
//!     for (feature, value) in values {
//!         println!("{feature}: {:?}", value.value);
//!     }
//!
//!     Ok(())
//! }
//! ```

use crate::api::{forecast_days, AirQualityApi};
use crate::error::{Error, Result};
use crate::models::{
    FeatureCollection, FeatureValue, ForecastFeature, Position, RioFeature, RioIfdmFeature,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use futures::future::try_join_all;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default IRCEL - CELINE GeoServer base URL
pub const DEFAULT_BASE_URL: &str = "https://geo.irceline.be";

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("CelineAir/", env!("CARGO_PKG_VERSION"), " (celineapi)");

/// Half-width in degrees of the box queried around a position
const BBOX_HALF_SIZE: f64 = 0.0001;

/// Width of the time window searched for the latest RIO values
const RIO_LOOKBACK_HOURS: i64 = 24;

const WMS_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// IRCEL - CELINE HTTP client
///
/// The client is stateless and does not cache responses internally.
/// Caching of the last good snapshot is done by the refresh coordinator.
#[derive(Debug, Clone)]
pub struct IrcelineClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl IrcelineClient {
    /// Create a new client with default settings
    pub async fn new() -> Result<Self> {
        Self::builder().build().await
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client with a custom reqwest::Client
    ///
    /// Useful for sharing HTTP connection pools or custom proxy settings
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path
        ))?)
    }

    async fn fetch_features(&self, url: Url) -> Result<FeatureCollection> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(Error::ApiError(format!(
                "API returned status: {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    // ========================================================================
    // RIO (WFS)
    // ========================================================================

    /// Build the WFS `GetFeature` request for RIO features
    pub fn rio_url(
        &self,
        features: &[RioFeature],
        timestamp: DateTime<Utc>,
        position: Position,
    ) -> Result<Url> {
        let start = timestamp - ChronoDuration::hours(RIO_LOOKBACK_HOURS);
        let type_names = features
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let filter = format!(
            "INTERSECTS(the_geom, POINT ({} {})) AND timestamp DURING {}/{}",
            position.lon,
            position.lat,
            start.format(WMS_TIME_FORMAT),
            timestamp.format(WMS_TIME_FORMAT),
        );

        let mut url = self.endpoint("wfs")?;
        url.query_pairs_mut()
            .append_pair("service", "WFS")
            .append_pair("version", "1.1.0")
            .append_pair("request", "GetFeature")
            .append_pair("outputFormat", "application/json")
            .append_pair("typeName", &type_names)
            .append_pair("cql_filter", &filter);
        Ok(url)
    }

    /// Keep, for every requested feature, the record with the latest timestamp
    pub fn latest_rio_values(
        collection: &FeatureCollection,
        features: &[RioFeature],
    ) -> HashMap<RioFeature, FeatureValue> {
        let mut latest: HashMap<RioFeature, (DateTime<Utc>, f64)> = HashMap::new();

        for feature in &collection.features {
            let Some(rio) = feature
                .layer()
                .and_then(|layer| RioFeature::from_id(&format!("rio:{layer}")))
            else {
                continue;
            };
            if !features.contains(&rio) {
                continue;
            }
            let (Some(value), Some(timestamp)) =
                (feature.properties.value, feature.properties.timestamp)
            else {
                continue;
            };

            match latest.get(&rio) {
                Some((known, _)) if *known >= timestamp => {}
                _ => {
                    latest.insert(rio, (timestamp, value));
                }
            }
        }

        latest
            .into_iter()
            .map(|(feature, (timestamp, value))| (feature, FeatureValue::measured(value, timestamp)))
            .collect()
    }

    // ========================================================================
    // Raster layers (WMS GetFeatureInfo)
    // ========================================================================

    /// Build a WMS `GetFeatureInfo` request for one raster layer at a position
    pub fn feature_info_url(
        &self,
        service: &str,
        layer: &str,
        position: Position,
        time: Option<DateTime<Utc>>,
    ) -> Result<Url> {
        let bbox = format!(
            "{},{},{},{}",
            position.lon - BBOX_HALF_SIZE,
            position.lat - BBOX_HALF_SIZE,
            position.lon + BBOX_HALF_SIZE,
            position.lat + BBOX_HALF_SIZE,
        );

        let mut url = self.endpoint(&format!("{service}/wms"))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("service", "WMS")
                .append_pair("version", "1.1.1")
                .append_pair("request", "GetFeatureInfo")
                .append_pair("layers", layer)
                .append_pair("query_layers", layer)
                .append_pair("info_format", "application/json")
                .append_pair("srs", "EPSG:4326")
                .append_pair("bbox", &bbox)
                .append_pair("width", "1")
                .append_pair("height", "1")
                .append_pair("x", "0")
                .append_pair("y", "0");
            if let Some(time) = time {
                query.append_pair("time", &time.format(WMS_TIME_FORMAT).to_string());
            }
        }
        Ok(url)
    }

    /// Value of a raster layer at a position, `None` outside the grid
    async fn raster_value(
        &self,
        service: &str,
        layer: &str,
        position: Position,
        time: Option<DateTime<Utc>>,
    ) -> Result<Option<f64>> {
        let url = self.feature_info_url(service, layer, position, time)?;
        let collection = self.fetch_features(url).await?;
        Ok(collection
            .features
            .first()
            .and_then(|f| f.properties.gray_index))
    }
}

#[async_trait]
impl AirQualityApi for IrcelineClient {
    async fn get_rio(
        &self,
        features: &[RioFeature],
        timestamp: DateTime<Utc>,
        position: Position,
    ) -> Result<HashMap<RioFeature, FeatureValue>> {
        if features.is_empty() {
            return Ok(HashMap::new());
        }
        let url = self.rio_url(features, timestamp, position)?;
        let collection = self.fetch_features(url).await?;
        let values = Self::latest_rio_values(&collection, features);

        debug!(
            "RIO returned {} of {} requested features at {}",
            values.len(),
            features.len(),
            position
        );
        Ok(values)
    }

    async fn get_rio_ifdm(
        &self,
        features: &[RioIfdmFeature],
        timestamp: DateTime<Utc>,
        position: Position,
    ) -> Result<HashMap<RioIfdmFeature, FeatureValue>> {
        let hour = truncate_to_hour(timestamp);

        let requests = features.iter().map(|feature| async move {
            let value = self
                .raster_value("rioifdm", feature.layer(), position, Some(hour))
                .await?;
            Ok::<_, Error>((*feature, value))
        });

        let values = try_join_all(requests)
            .await?
            .into_iter()
            .filter_map(|(feature, value)| {
                value.map(|v| (feature, FeatureValue::measured(v, hour)))
            })
            .collect::<HashMap<_, _>>();

        debug!(
            "RIO-IFDM returned {} of {} requested features at {}",
            values.len(),
            features.len(),
            position
        );
        Ok(values)
    }

    async fn get_forecast_at(
        &self,
        features: &[ForecastFeature],
        timestamp: DateTime<Utc>,
        position: Position,
    ) -> Result<HashMap<(ForecastFeature, NaiveDate), FeatureValue>> {
        let days = forecast_days(timestamp);

        let requests = features.iter().flat_map(|feature| {
            days.iter().enumerate().map(move |(offset, day)| async move {
                let layer = format!("{}_d{}", feature.layer(), offset);
                let value = self.raster_value("forecast", &layer, position, None).await?;
                Ok::<_, Error>(((*feature, *day), value))
            })
        });

        let values = try_join_all(requests)
            .await?
            .into_iter()
            .filter_map(|((feature, day), value)| {
                value.map(|v| ((feature, day), FeatureValue::forecast(Some(v), day)))
            })
            .collect::<HashMap<_, _>>();

        debug!(
            "Forecast returned {} values for {} features at {}",
            values.len(),
            features.len(),
            position
        );
        Ok(values)
    }
}

fn truncate_to_hour(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}

/// Builder for configuring an IrcelineClient
#[derive(Debug)]
pub struct ClientBuilder {
    client: Option<Client>,
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            client: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client
    pub async fn build(self) -> Result<IrcelineClient> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()?,
        };

        Ok(IrcelineClient {
            client,
            base_url: self.base_url,
            timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoFeature;
    use chrono::TimeZone;

    fn rio_feature(id: &str, value: f64, timestamp: DateTime<Utc>) -> GeoFeature {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "properties": {"value": value, "timestamp": timestamp.to_rfc3339()}
        }))
        .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new();
        assert_eq!(builder.base_url, DEFAULT_BASE_URL);
        assert_eq!(
            builder.timeout,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert!(builder.user_agent.starts_with("CelineAir/"));
    }

    #[tokio::test]
    async fn test_rio_url() {
        let client = IrcelineClient::builder()
            .base_url("https://example.test/")
            .build()
            .await
            .unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        let url = client
            .rio_url(
                &[RioFeature::No2HMean, RioFeature::Pm10HMean],
                ts,
                Position::new(50.73, 4.05),
            )
            .unwrap();

        assert_eq!(url.path(), "/wfs");
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["typeName"], "rio:no2_hmean,rio:pm10_hmean");
        assert_eq!(query["request"], "GetFeature");
        assert_eq!(
            query["cql_filter"],
            "INTERSECTS(the_geom, POINT (4.05 50.73)) AND timestamp DURING 2024-06-14T10:00:00Z/2024-06-15T10:00:00Z"
        );
    }

    #[tokio::test]
    async fn test_feature_info_url_has_time_only_when_given() {
        let client = IrcelineClient::new().await.unwrap();
        let position = Position::new(50.73, 4.05);

        let url = client
            .feature_info_url("forecast", "no2_dmean_d1", position, None)
            .unwrap();
        assert_eq!(url.path(), "/forecast/wms");
        assert!(!url.query_pairs().any(|(k, _)| k == "time"));

        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
        let url = client
            .feature_info_url("rioifdm", "no2_hmean", position, Some(ts))
            .unwrap();
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["time"], "2024-06-15T10:00:00Z");
        assert_eq!(query["layers"], "no2_hmean");
    }

    #[test]
    fn test_latest_rio_values_keeps_most_recent() {
        let older = Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
        let collection = FeatureCollection {
            features: vec![
                rio_feature("no2_hmean.1", 10.0, newer),
                rio_feature("no2_hmean.2", 99.0, older),
                rio_feature("pm10_hmean.3", 20.0, older),
                rio_feature("o3_hmean.4", 50.0, newer),
            ],
        };

        let values = IrcelineClient::latest_rio_values(
            &collection,
            &[RioFeature::No2HMean, RioFeature::Pm10HMean],
        );

        assert_eq!(values.len(), 2);
        assert_eq!(
            values[&RioFeature::No2HMean],
            FeatureValue::measured(10.0, newer)
        );
        assert_eq!(
            values[&RioFeature::Pm10HMean],
            FeatureValue::measured(20.0, older)
        );
    }

    #[test]
    fn test_truncate_to_hour() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 10, 42, 17).unwrap();
        assert_eq!(
            truncate_to_hour(ts),
            Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
        );
    }
}
