use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, TimeZone};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::oauth::OAuth1;

const CONTENT_TO_RETRIEVE: [&str; 2] = ["sdes", "messageStatuses"];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

/// Body of a conversation search request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub start: TimeRange,
    pub status: Vec<String>,
    pub content_to_retrieve: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skill_ids: Vec<i64>,
}

impl SearchQuery {
    pub fn new(
        from: NaiveDate,
        to: NaiveDate,
        skill_ids: Vec<i64>,
        statuses: Vec<String>,
    ) -> Result<Self> {
        Self::in_timezone(&Local, from, to, skill_ids, statuses)
    }

    /// Dates are taken as midnight in `tz`.
    pub fn in_timezone<Tz: TimeZone>(
        tz: &Tz,
        from: NaiveDate,
        to: NaiveDate,
        skill_ids: Vec<i64>,
        statuses: Vec<String>,
    ) -> Result<Self> {
        if from > to {
            anyhow::bail!("Start date {from} is after end date {to}");
        }

        Ok(Self {
            start: TimeRange {
                from: midnight_millis(tz, from)?,
                to: midnight_millis(tz, to)?,
            },
            status: statuses,
            content_to_retrieve: CONTENT_TO_RETRIEVE.to_vec(),
            skill_ids,
        })
    }
}

fn midnight_millis<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<i64> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("Invalid midnight")?;

    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|at| at.timestamp_millis())
        .with_context(|| format!("Midnight of {date} does not exist in the local timezone"))
}

/// A paged source of raw conversation records. An empty page ends the
/// extraction.
pub trait ConversationSource {
    async fn fetch(&self, query: &SearchQuery, offset: usize, limit: usize) -> Vec<Value>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    conversation_history_records: Vec<Value>,
}

pub struct HistoryClient {
    http: reqwest::Client,
    search_url: Url,
    oauth: OAuth1,
}

impl HistoryClient {
    pub fn new(http: reqwest::Client, search_url: &str, oauth: OAuth1) -> Result<Self> {
        let search_url = Url::parse(search_url)
            .with_context(|| format!("Invalid search URL `{search_url}`"))?;

        Ok(Self {
            http,
            search_url,
            oauth,
        })
    }

    fn page_url(&self, offset: usize, limit: usize) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string())
            .append_pair("NC", "true");
        url
    }

    async fn try_fetch(&self, query: &SearchQuery, offset: usize, limit: usize) -> Result<Vec<Value>> {
        let url = self.page_url(offset, limit);
        let authorization = self.oauth.authorization(&Method::POST, &url)?;

        let response: SearchResponse = self
            .http
            .post(url)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "*/*")
            .json(query)
            .send()
            .await
            .context("Failed to send conversation search request")?
            .error_for_status()
            .context("Conversation search API error")?
            .json()
            .await
            .context("Failed to parse conversation search response")?;

        Ok(response.conversation_history_records)
    }
}

impl ConversationSource for HistoryClient {
    async fn fetch(&self, query: &SearchQuery, offset: usize, limit: usize) -> Vec<Value> {
        match self.try_fetch(query, offset, limit).await {
            Ok(records) => records,
            Err(error) => {
                // Indistinguishable from the end of pagination for the caller.
                tracing::error!(offset, limit, "API request failed: {error:#}");
                Vec::new()
            }
        }
    }
}
