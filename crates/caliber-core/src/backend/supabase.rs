//! Supabase (PostgREST) implementation of `Backend`.

use std::fmt;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{Backend, BackendError, BackendResult, OWNER_COLUMN};
use crate::util::{compact_error, non_blank};

#[derive(Clone)]
pub struct SupabaseBackend {
    rest_url: String,
    anon_key: String,
    access_token: String,
    client: Client,
}

impl fmt::Debug for SupabaseBackend {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SupabaseBackend")
            .field("rest_url", &self.rest_url)
            .field("anon_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl SupabaseBackend {
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        access_token: impl Into<String>,
    ) -> BackendResult<Self> {
        let rest_url = normalize_rest_url(url.as_ref())?;
        let anon_key = non_blank(anon_key).ok_or_else(|| {
            BackendError::InvalidConfiguration("Supabase anon key must not be empty".to_string())
        })?;
        let access_token = non_blank(access_token).ok_or_else(|| {
            BackendError::InvalidConfiguration("Access token must not be empty".to_string())
        })?;

        Ok(Self {
            rest_url,
            anon_key,
            access_token,
            client: Client::builder().build()?,
        })
    }

    /// Base PostgREST URL (`{project}/rest/v1`)
    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, urlencoding::encode(table))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.access_token)
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<reqwest::Response> {
        let response = self.authorized(request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(parse_api_error(status, &body)));
        }
        Ok(response)
    }
}

impl Backend for SupabaseBackend {
    async fn insert(&self, table: &str, row: &Value) -> BackendResult<()> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(row);
        self.send(request).await?;
        Ok(())
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        fields: &Value,
        owner_id: &str,
    ) -> BackendResult<()> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&row_filter(id, owner_id))
            .header("Prefer", "return=minimal")
            .json(fields);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str, owner_id: &str) -> BackendResult<()> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&row_filter(id, owner_id))
            .header("Prefer", "return=minimal");
        self.send(request).await?;
        Ok(())
    }

    async fn fetch(&self, table: &str, id: &str, owner_id: &str) -> BackendResult<Option<Value>> {
        let mut query = row_filter(id, owner_id);
        query.push(("select", "*".to_string()));
        query.push(("limit", "1".to_string()));

        let request = self
            .client
            .get(self.table_url(table))
            .query(&query)
            .header("Accept", "application/json");
        let rows = self.send(request).await?.json::<Vec<Value>>().await?;
        Ok(rows.into_iter().next())
    }
}

fn row_filter(id: &str, owner_id: &str) -> Vec<(&'static str, String)> {
    vec![
        ("id", format!("eq.{id}")),
        (OWNER_COLUMN, format!("eq.{owner_id}")),
    ]
}

pub fn normalize_rest_url(url: &str) -> BackendResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(BackendError::InvalidConfiguration(
            "Supabase URL must not be empty".to_string(),
        ));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(BackendError::InvalidConfiguration(
            "Supabase URL must include http:// or https://".to_string(),
        ));
    }

    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    error: Option<String>,
    hint: Option<String>,
    code: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            let mut text = format!("{} ({})", compact_error(&message), status.as_u16());
            if let Some(code) = payload.code {
                text.push_str(&format!(" [{code}]"));
            }
            if let Some(hint) = payload.hint.filter(|hint| !hint.trim().is_empty()) {
                text.push_str(&format!(": {}", compact_error(&hint)));
            }
            return text;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_error(trimmed), status.as_u16())
    }
}
