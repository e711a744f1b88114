//! Upstream macroeconomic data sources
//!
//! CPI and GBP/USD come from FRED at their native frequency (monthly CPI,
//! daily FX); RPI comes from the ONS CHAW CSV export. Sources return raw dated
//! values; annual resampling is the provider's job.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Deserialize;

use crate::config::Config;
use crate::types::{DatedValue, HpiError, Result, SeriesKind};

/// FRED series id for UK CPI, all items
const FRED_UK_CPI: &str = "GBRCPIALLMINMEI";

/// FRED series id for USD per GBP
const FRED_USD_PER_GBP: &str = "DEXUSUK";

/// A place economic series can be fetched from
pub trait EconomicSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Dated observations of `kind` between Jan 1 of `start_year` and
    /// Dec 31 of `end_year`
    fn fetch(&self, kind: SeriesKind, start_year: i32, end_year: i32) -> Result<Vec<DatedValue>>;
}

/// FRED series id backing `kind`, if FRED publishes it
pub fn fred_series_id(kind: SeriesKind) -> Option<&'static str> {
    match kind {
        SeriesKind::Cpi => Some(FRED_UK_CPI),
        SeriesKind::Fx => Some(FRED_USD_PER_GBP),
        SeriesKind::Rpi | SeriesKind::RealFx => None,
    }
}

/// FRED + ONS over blocking HTTP with a bounded timeout
pub struct HttpEconomicSource {
    client: reqwest::blocking::Client,
    fred_api_key: Option<String>,
    fred_base_url: String,
    ons_rpi_url: String,
}

impl HttpEconomicSource {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("hpitrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HpiError::Config(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            fred_api_key: config.fred_api_key.clone(),
            fred_base_url: config.fred_base_url.clone(),
            ons_rpi_url: config.ons_rpi_url.clone(),
        })
    }

    fn get_text(&self, request: reqwest::blocking::RequestBuilder, what: &str) -> Result<String> {
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                HpiError::UpstreamUnavailable(format!("{} request timed out", what))
            } else {
                HpiError::UpstreamUnavailable(format!("{} request failed: {}", what, e))
            }
        })?;

        let response = response.error_for_status().map_err(|e| {
            HpiError::UpstreamUnavailable(format!("{} returned an error status: {}", what, e))
        })?;

        response
            .text()
            .map_err(|e| HpiError::UpstreamUnavailable(format!("{} body read failed: {}", what, e)))
    }

    fn fetch_fred(&self, series_id: &str, start_year: i32, end_year: i32) -> Result<Vec<DatedValue>> {
        let api_key = self.fred_api_key.as_deref().ok_or_else(|| {
            HpiError::UpstreamUnavailable("FRED API key not configured (set FRED_API_KEY)".into())
        })?;

        let request = self.fred_request(series_id, api_key, start_year, end_year);
        let body = self.get_text(request, "FRED")?;
        parse_fred_observations(&body)
    }

    /// Observations request without a `frequency` parameter, so FRED does not
    /// aggregate before the provider picks each year's last value
    fn fred_request(
        &self,
        series_id: &str,
        api_key: &str,
        start_year: i32,
        end_year: i32,
    ) -> reqwest::blocking::RequestBuilder {
        let start = format!("{}-01-01", start_year);
        let end = format!("{}-12-31", end_year);
        self.client.get(&self.fred_base_url).query(&[
            ("series_id", series_id),
            ("api_key", api_key),
            ("file_type", "json"),
            ("observation_start", start.as_str()),
            ("observation_end", end.as_str()),
        ])
    }

    fn fetch_ons_rpi(&self, start_year: i32, end_year: i32) -> Result<Vec<DatedValue>> {
        let body = self.get_text(self.client.get(&self.ons_rpi_url), "ONS")?;
        let observations = parse_ons_monthly_csv(&body)?
            .into_iter()
            .filter(|o| (start_year..=end_year).contains(&o.date.year()))
            .collect();
        Ok(observations)
    }
}

impl EconomicSource for HttpEconomicSource {
    fn name(&self) -> &str {
        "fred+ons"
    }

    fn fetch(&self, kind: SeriesKind, start_year: i32, end_year: i32) -> Result<Vec<DatedValue>> {
        tracing::info!(series = %kind, start_year, end_year, "fetching economic series");
        if let Some(series_id) = fred_series_id(kind) {
            return self.fetch_fred(series_id, start_year, end_year);
        }
        match kind {
            SeriesKind::Rpi => self.fetch_ons_rpi(start_year, end_year),
            _ => Err(HpiError::InvalidQuery(format!(
                "{} is derived locally, not fetched",
                kind
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FredResponse {
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

/// Parse a FRED `series/observations` JSON body. Missing values (`"."`) are
/// skipped.
pub fn parse_fred_observations(body: &str) -> Result<Vec<DatedValue>> {
    let response: FredResponse = serde_json::from_str(body)
        .map_err(|e| HpiError::Data(format!("invalid FRED response: {}", e)))?;

    let mut values = Vec::with_capacity(response.observations.len());
    for obs in response.observations {
        let Ok(value) = obs.value.trim().parse::<f64>() else {
            continue;
        };
        let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d")
            .map_err(|e| HpiError::Data(format!("invalid FRED date {:?}: {}", obs.date, e)))?;
        values.push(DatedValue { date, value });
    }
    Ok(values)
}

fn month_number(abbrev: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ];
    MONTHS.iter().position(|m| *m == abbrev).map(|i| i as u32 + 1)
}

/// Parse an ONS time-series CSV export, keeping only monthly rows
/// (labels like `2015 JAN`). Annual and quarterly rows and the metadata
/// preamble are ignored.
pub fn parse_ons_monthly_csv(body: &str) -> Result<Vec<DatedValue>> {
    let monthly = Regex::new(r"^(\d{4}) ([A-Z]{3})$").expect("valid regex");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| HpiError::Data(format!("invalid ONS CSV: {}", e)))?;
        let (Some(label), Some(raw)) = (record.get(0), record.get(1)) else {
            continue;
        };
        let Some(caps) = monthly.captures(label.trim()) else {
            continue;
        };
        let Ok(value) = raw.trim().parse::<f64>() else {
            continue;
        };
        let year: i32 = caps[1]
            .parse()
            .map_err(|_| HpiError::Data(format!("invalid ONS year in {:?}", label)))?;
        let Some(month) = month_number(&caps[2]) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
            values.push(DatedValue { date, value });
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EconomicSeries;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    const FRED_BODY: &str = r#"{
        "realtime_start": "2024-01-01",
        "observation_start": "2015-01-01",
        "observations": [
            {"realtime_start": "2024-01-01", "realtime_end": "2024-01-01", "date": "2015-01-01", "value": "1.5143"},
            {"realtime_start": "2024-01-01", "realtime_end": "2024-01-01", "date": "2015-02-01", "value": "."},
            {"realtime_start": "2024-01-01", "realtime_end": "2024-01-01", "date": "2015-12-01", "value": "1.4957"}
        ]
    }"#;

    const ONS_BODY: &str = "\"Title\",\"RPI All Items Index: Jan 1987=100\"\n\
\"CDID\",\"CHAW\"\n\
\"Source dataset ID\",\"MM23\"\n\
\"PreUnit\",\"\"\n\
\"Unit\",\"Index, base year = 100\"\n\
\"Release date\",\"17-01-2024\"\n\
\"Next release\",\"14 February 2024\"\n\
\"Important notes\",\"\"\n\
\"2015\",\"259.0\"\n\
\"2015 Q4\",\"260.0\"\n\
\"2015 JAN\",\"255.4\"\n\
\"2015 DEC\",\"260.6\"\n\
\"2016 JAN\",\"258.8\"\n";

    #[test]
    fn test_parse_fred_skips_missing_values() {
        let values = parse_fred_observations(FRED_BODY).unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].date, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        assert!((values[1].value - 1.4957).abs() < 1e-12);
    }

    #[test]
    fn test_parse_fred_rejects_malformed_body() {
        let err = parse_fred_observations("<html>rate limited</html>").unwrap_err();
        assert!(matches!(err, HpiError::Data(_)));
    }

    #[test]
    fn test_parse_ons_keeps_only_monthly_rows() {
        let values = parse_ons_monthly_csv(ONS_BODY).unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values[0].date, NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        assert_eq!(values[1].date, NaiveDate::from_ymd_opt(2015, 12, 1).unwrap());
        assert!((values[1].value - 260.6).abs() < 1e-12);
    }

    #[test]
    fn test_fred_series_ids() {
        assert_eq!(fred_series_id(SeriesKind::Cpi), Some("GBRCPIALLMINMEI"));
        assert_eq!(fred_series_id(SeriesKind::Fx), Some("DEXUSUK"));
        assert_eq!(fred_series_id(SeriesKind::Rpi), None);
    }

    #[test]
    fn test_missing_api_key_is_upstream_unavailable() {
        let source = HttpEconomicSource::from_config(&Config::default()).unwrap();

        let err = source.fetch(SeriesKind::Cpi, 2015, 2016).unwrap_err();

        assert!(matches!(err, HpiError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_daily_fx_resamples_to_last_trading_day() {
        let body = r#"{"observations": [
            {"date": "2015-12-29", "value": "1.4893"},
            {"date": "2015-12-30", "value": "1.4826"},
            {"date": "2015-12-31", "value": "1.4746"},
            {"date": "2016-01-04", "value": "1.4696"},
            {"date": "2016-12-29", "value": "1.2270"},
            {"date": "2016-12-30", "value": "."}
        ]}"#;

        let observations = parse_fred_observations(body).unwrap();
        let fx = EconomicSeries::from_observations(SeriesKind::Fx, &observations);

        assert_eq!(fx.get(2015), Some(1.4746));
        // The missing Dec 30 print falls back to the last published day
        assert_eq!(fx.get(2016), Some(1.2270));
    }

    #[test]
    fn test_fred_request_keeps_native_frequency() {
        let source = HttpEconomicSource::from_config(&Config::default()).unwrap();

        let request = source
            .fred_request(FRED_USD_PER_GBP, "key", 2015, 2016)
            .build()
            .unwrap();
        let params: Vec<(String, String)> = request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert!(params.iter().all(|(k, _)| k != "frequency"));
        assert!(params.contains(&("series_id".to_string(), "DEXUSUK".to_string())));
        assert!(params.contains(&("observation_end".to_string(), "2016-12-31".to_string())));
    }

    #[test]
    fn test_unresponsive_upstream_times_out() {
        // Connections complete in the backlog but nothing ever answers
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/fred/series/observations", listener.local_addr().unwrap());
        let config = Config::from_lookup(|key| match key {
            "FRED_BASE_URL" => Some(url.clone()),
            "FRED_API_KEY" => Some("test-key".to_string()),
            "HPI_HTTP_TIMEOUT_SECS" => Some("1".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(1));
        let source = HttpEconomicSource::from_config(&config).unwrap();

        let started = Instant::now();
        let err = source.fetch(SeriesKind::Fx, 2015, 2016).unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        match err {
            HpiError::UpstreamUnavailable(msg) => assert!(msg.contains("timed out"), "{}", msg),
            other => panic!("unexpected error: {other}"),
        }
        drop(listener);
    }

    #[test]
    fn test_real_fx_is_not_fetchable() {
        let source = HttpEconomicSource::from_config(&Config::default()).unwrap();
        assert!(source.fetch(SeriesKind::RealFx, 2015, 2016).is_err());
    }
}
