use chrono::{TimeZone, Utc};
use orderbook_harvester::credentials::Credential;
use orderbook_harvester::fetcher::coinapi::CoinApiFetcher;
use orderbook_harvester::fetcher::coinapi_config::CoinApiConfig;
use orderbook_harvester::fetcher::{FailureKind, FetcherError, PageFetcher};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HISTORY_PATH: &str = "/v1/orderbooks/BINANCE_SPOT_BTC_USDT/history";

fn fetcher_for(server: &MockServer) -> CoinApiFetcher {
    CoinApiFetcher::with_config(CoinApiConfig::with_base_url(server.uri())).unwrap()
}

fn history_body() -> serde_json::Value {
    json!([
        {
            "symbol_id": "BINANCE_SPOT_BTC_USDT",
            "time_exchange": "2024-01-01T00:00:05.0000000Z",
            "time_coinapi": "2024-01-01T00:00:05.1200000Z",
            "asks": [{"price": "42000.10", "size": "0.250"}],
            "bids": [{"price": 41999.9, "size": 1.5}]
        },
        {
            "symbol_id": "BINANCE_SPOT_BTC_USDT",
            "time_exchange": "2024-01-01T00:00:00.0000000Z",
            "time_coinapi": "2024-01-01T00:00:00.0900000Z",
            "asks": [],
            "bids": null
        }
    ])
}

#[tokio::test]
async fn fetch_sends_key_and_window_and_parses_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HISTORY_PATH))
        .and(header("X-CoinAPI-Key", "key-aaaa-0001"))
        .and(query_param("time_start", "2024-01-01T00:00:00.000Z"))
        .and(query_param("limit", "100000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history_body()))
        .expect(1)
        .mount(&server)
        .await;

    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let page = fetcher_for(&server)
        .fetch(
            "BINANCE_SPOT_BTC_USDT",
            since,
            &Credential::new("key-aaaa-0001"),
            100_000,
        )
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    // Sorted by exchange time
    assert_eq!(page[0].exchange_time, since);
    assert!(page[0].asks.is_empty());
    assert!(page[0].bids.is_empty());

    let top = &page[1];
    assert_eq!(top.asks[0].price.to_string(), "42000.10");
    assert_eq!(top.asks[0].size.to_string(), "0.250");
    assert_eq!(top.bids[0].price.to_string(), "41999.9");
}

#[tokio::test]
async fn empty_array_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HISTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let page = fetcher_for(&server)
        .fetch(
            "BINANCE_SPOT_BTC_USDT",
            Utc::now(),
            &Credential::new("key"),
            10,
        )
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn status_codes_map_to_failure_kinds() {
    let cases = [
        (429, FailureKind::RateLimit),
        (401, FailureKind::AuthFailed(401)),
        (403, FailureKind::AuthFailed(403)),
        (503, FailureKind::ServerError(503)),
        (400, FailureKind::InvalidRequest(400)),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(json!({"error": format!("status {status}")})),
            )
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch(
                "BINANCE_SPOT_BTC_USDT",
                Utc::now(),
                &Credential::new("key"),
                10,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), expected, "status {status}");
        assert!(err.to_string().contains(&format!("status {status}")));
    }
}

#[tokio::test]
async fn malformed_body_is_a_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HISTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"symbol_id": 7}])))
        .mount(&server)
        .await;

    let err = fetcher_for(&server)
        .fetch(
            "BINANCE_SPOT_BTC_USDT",
            Utc::now(),
            &Credential::new("key"),
            10,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FetcherError::ParseError(_)));
}

#[tokio::test]
async fn non_positive_price_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HISTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "symbol_id": "BINANCE_SPOT_BTC_USDT",
            "time_exchange": "2024-01-01T00:00:00.0000000Z",
            "time_coinapi": "2024-01-01T00:00:00.0900000Z",
            "asks": [{"price": "-1", "size": "0.5"}],
            "bids": []
        }])))
        .mount(&server)
        .await;

    let err = fetcher_for(&server)
        .fetch(
            "BINANCE_SPOT_BTC_USDT",
            Utc::now(),
            &Credential::new("key"),
            10,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FetcherError::InvalidResponse(_)));
    assert_eq!(err.kind(), FailureKind::Parse);
}

#[tokio::test]
async fn long_numeric_prices_keep_every_digit() {
    let server = MockServer::start().await;
    let body = r#"[{
        "symbol_id": "BINANCE_SPOT_BTC_USDT",
        "time_exchange": "2024-01-01T00:00:00.0000000Z",
        "time_coinapi": "2024-01-01T00:00:00.0900000Z",
        "asks": [{"price": 12345.678901234567891, "size": 0.10000000000000000001}],
        "bids": []
    }]"#;
    Mock::given(method("GET"))
        .and(path(HISTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let page = fetcher_for(&server)
        .fetch(
            "BINANCE_SPOT_BTC_USDT",
            Utc::now(),
            &Credential::new("key"),
            10,
        )
        .await
        .unwrap();
    assert_eq!(page[0].asks[0].price.to_string(), "12345.678901234567891");
    assert_eq!(page[0].asks[0].size.to_string(), "0.10000000000000000001");
}
