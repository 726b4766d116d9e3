//! Yahoo Finance price source

use crate::error::{AnalysisError, Result};
use crate::model::{PricePoint, PriceSeries};
use crate::providers::PriceProvider;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

/// Daily closes and volumes from Yahoo Finance
pub struct YahooPriceProvider {
    connector: yahoo::YahooConnector,
}

impl YahooPriceProvider {
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| AnalysisError::YahooFinance(e.to_string()))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl PriceProvider for YahooPriceProvider {
    #[instrument(skip(self))]
    async fn fetch_history(&self, ticker: &str, lookback_days: u32) -> Result<PriceSeries> {
        let end = Utc::now();
        let start = end - Duration::days(i64::from(lookback_days));

        // Convert chrono DateTime to time OffsetDateTime
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| AnalysisError::YahooFinance(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| AnalysisError::YahooFinance(format!("Invalid end timestamp: {e}")))?;

        let response = self
            .connector
            .get_quote_history(ticker, start_odt, end_odt)
            .await
            .map_err(|e| AnalysisError::YahooFinance(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| AnalysisError::YahooFinance(e.to_string()))?;

        let series = series_from_rows(
            quotes
                .iter()
                .map(|q| (q.timestamp as i64, q.close, q.volume)),
        );
        debug!(days = series.len(), "Fetched price history");

        if series.is_empty() {
            return Err(AnalysisError::YahooFinance(format!(
                "No price data returned for {ticker}"
            )));
        }
        Ok(series)
    }
}

/// Build a series from `(unix seconds, close, volume)` rows, skipping rows
/// with an invalid timestamp
fn series_from_rows(rows: impl IntoIterator<Item = (i64, f64, u64)>) -> PriceSeries {
    PriceSeries::from_points(
        rows.into_iter()
            .filter_map(|(timestamp, close, volume)| {
                DateTime::from_timestamp(timestamp, 0).map(|at| PricePoint {
                    date: at.date_naive(),
                    price: close,
                    volume: Some(volume),
                })
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_series_from_rows() {
        // 2024-03-04 and 2024-03-01, 14:30 UTC market open
        let series = series_from_rows([(1_709_562_600, 175.1, 900), (1_709_303_400, 179.6, 1_200)]);

        assert_eq!(
            series.dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            ]
        );
        assert_eq!(series.prices, vec![179.6, 175.1]);
        assert_eq!(series.volumes, vec![1_200, 900]);
    }

    #[test]
    fn test_invalid_timestamp_skipped() {
        let series = series_from_rows([(i64::MAX, 1.0, 1), (1_709_303_400, 2.0, 2)]);
        assert_eq!(series.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_history_live() {
        let provider = YahooPriceProvider::new().unwrap();
        let series = provider.fetch_history("AAPL", 21).await.unwrap();
        assert!(!series.is_empty());
    }
}
