//! HTTP implementation of the Odin API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::OdinConfig;
use crate::metrics;

use super::types::{DayLogResponse, LatestDateResponse, PeriodInfoResponse};
use super::{parse_timestamp, OdinApi, PeriodInfo, Scan, UpstreamError};

/// Odin API client over reqwest.
pub struct HttpOdinApi {
    client: Client,
    api_root: String,
}

impl HttpOdinApi {
    /// Create a new client for the configured API root.
    pub fn new(config: &OdinConfig) -> Result<Self, UpstreamError> {
        let api_root = config.api_root.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| UpstreamError::Http {
                url: api_root.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { client, api_root })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn period_info_url(&self, start: NaiveDate, length_days: u32) -> String {
        format!(
            "{}/v5/period_info/{}/{:02}/{:02}/?length={}",
            self.api_root,
            start.year(),
            start.month(),
            start.day(),
            length_days
        )
    }

    fn latest_ecmf_url(&self) -> String {
        format!("{}/v5/config_data/latest_ecmf_file", self.api_root)
    }

    /// GET a URL and decode a JSON body, mapping every failure to `UpstreamError`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
    ) -> Result<T, UpstreamError> {
        let result = self.fetch_json(url).await;
        metrics::record_upstream(endpoint, result.is_ok());
        result
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, UpstreamError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout {
                    url: url.to_string(),
                }
            } else {
                UpstreamError::Http {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| UpstreamError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl OdinApi for HttpOdinApi {
    async fn period_info(
        &self,
        start: NaiveDate,
        length_days: u32,
    ) -> Result<PeriodInfo, UpstreamError> {
        let url = self.period_info_url(start, length_days);
        debug!(%start, length_days, "Requesting period info");
        let response: PeriodInfoResponse = self.get_json("period_info", &url).await?;
        Ok(response.into())
    }

    async fn day_log(&self, location: &str) -> Result<Vec<Scan>, UpstreamError> {
        debug!(location, "Requesting day log");
        let response: DayLogResponse = self.get_json("day_log", location).await?;

        response
            .data
            .into_iter()
            .map(|scan| {
                parse_timestamp(&scan.date_time)
                    .map(|ts| Scan::new(scan.scan_id, ts))
                    .ok_or_else(|| UpstreamError::Parse {
                        url: location.to_string(),
                        message: format!(
                            "invalid DateTime '{}' for scan {}",
                            scan.date_time, scan.scan_id
                        ),
                    })
            })
            .collect()
    }

    async fn latest_ecmf_date(&self) -> Result<NaiveDate, UpstreamError> {
        let url = self.latest_ecmf_url();
        let response: LatestDateResponse = self.get_json("latest_ecmf", &url).await?;
        debug!(date = %response.date, "Latest ECMWF date");
        Ok(response.date)
    }
}
