//! Integration tests for celineapi

use celineapi::{
    AirQualityApi, Error, FeatureValue, ForecastFeature, IrcelineClient, ObservedAt, Position,
    Reading, RioFeature, RioIfdmFeature,
};
use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn position() -> Position {
    Position::new(50.73, 4.05)
}

fn raster_json(value: Option<f64>) -> serde_json::Value {
    match value {
        Some(v) => json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature", "id": "", "properties": {"GRAY_INDEX": v}}]
        }),
        None => json!({"type": "FeatureCollection", "features": []}),
    }
}

async fn client_for(server: &MockServer) -> IrcelineClient {
    IrcelineClient::builder()
        .base_url(server.uri())
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_get_rio_keeps_latest_value_per_feature() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wfs"))
        .and(query_param("request", "GetFeature"))
        .and(query_param("typeName", "rio:no2_hmean,rio:pm10_hmean"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "FeatureCollection",
            "features": [
                {"id": "no2_hmean.1", "properties": {"value": 14.0, "timestamp": "2024-06-15T08:00:00Z"}},
                {"id": "no2_hmean.2", "properties": {"value": 16.0, "timestamp": "2024-06-15T09:00:00Z"}},
                {"id": "pm10_hmean.3", "properties": {"value": 21.0, "timestamp": "2024-06-15T09:00:00Z"}}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let ts = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();

    let values = client
        .get_rio(&[RioFeature::No2HMean, RioFeature::Pm10HMean], ts, position())
        .await
        .unwrap();

    let nine = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(
        values[&RioFeature::No2HMean],
        FeatureValue::measured(16.0, nine)
    );
    assert_eq!(
        values[&RioFeature::Pm10HMean],
        FeatureValue::measured(21.0, nine)
    );
}

#[tokio::test]
async fn test_get_rio_empty_outside_grid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wfs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"type": "FeatureCollection", "features": []})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let values = client
        .get_rio(&[RioFeature::O3HMean], Utc::now(), Position::new(0.0, 0.0))
        .await
        .unwrap();

    assert!(values.is_empty());
}

#[tokio::test]
async fn test_get_rio_ifdm() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rioifdm/wms"))
        .and(query_param("layers", "no2_hmean"))
        .and(query_param("time", "2024-06-15T10:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(raster_json(Some(18.5))))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rioifdm/wms"))
        .and(query_param("layers", "o3_hmean"))
        .respond_with(ResponseTemplate::new(200).set_body_json(raster_json(None)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let ts = Utc.with_ymd_and_hms(2024, 6, 15, 10, 25, 0).unwrap();

    let values = client
        .get_rio_ifdm(
            &[RioIfdmFeature::No2HMean, RioIfdmFeature::O3HMean],
            ts,
            position(),
        )
        .await
        .unwrap();

    let hour = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(
        values[&RioIfdmFeature::No2HMean],
        FeatureValue::measured(18.5, hour)
    );
}

#[tokio::test]
async fn test_get_forecast_four_days() {
    let mock_server = MockServer::start().await;

    for day in 0..4 {
        Mock::given(method("GET"))
            .and(path("/forecast/wms"))
            .and(query_param("layers", format!("o3_maxhmean_d{day}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(raster_json(Some(80.0 + day as f64))),
            )
            .mount(&mock_server)
            .await;
    }

    let client = client_for(&mock_server).await;
    let ts = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();

    let values = client
        .get_forecast_at(&[ForecastFeature::O3MaxHMean], ts, position())
        .await
        .unwrap();

    assert_eq!(values.len(), 4);
    let day3 = NaiveDate::from_ymd_opt(2024, 6, 18).unwrap();
    let value = values[&(ForecastFeature::O3MaxHMean, day3)];
    assert_eq!(value.value, Some(Reading::Concentration(83.0)));
    assert_eq!(value.timestamp, Some(ObservedAt::Day(day3)));
}

#[tokio::test]
async fn test_get_forecast_empty_outside_grid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast/wms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(raster_json(None)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let values = client
        .get_forecast(
            &[ForecastFeature::No2DMean, ForecastFeature::Pm10DMean],
            Position::new(0.0, 0.0),
        )
        .await
        .unwrap();

    assert!(values.is_empty());
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forecast/wms"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let result = client
        .get_forecast(&[ForecastFeature::No2DMean], position())
        .await;

    assert!(matches!(result, Err(Error::ApiError(_))));
}
