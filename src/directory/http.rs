use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use super::DirectoryService;
use crate::core::models::{Availability, Person, ProjectChannelMapping};
use crate::errors::BotError;
use crate::utils::ids::string_or_number;
use crate::utils::retry::{RetryPolicy, retry_with_backoff};

/// `GET /people` answers either a bare array or `{"people": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PeopleBody {
    Bare(Vec<Person>),
    Wrapped { people: Vec<Person> },
}

#[derive(Deserialize)]
struct ChannelRow {
    #[serde(deserialize_with = "string_or_number")]
    project_id: String,
    channel_id: String,
}

/// `GET /project-channels` answers either an object map or a list of rows.
#[derive(Deserialize)]
#[serde(untagged)]
enum ChannelsBody {
    Map(HashMap<String, String>),
    Rows(Vec<ChannelRow>),
    Wrapped { mappings: Vec<ChannelRow> },
}

impl ChannelsBody {
    fn into_mapping(self) -> ProjectChannelMapping {
        match self {
            ChannelsBody::Map(map) => map,
            ChannelsBody::Rows(rows) | ChannelsBody::Wrapped { mappings: rows } => rows
                .into_iter()
                .map(|r| (r.project_id, r.channel_id))
                .collect(),
        }
    }
}

/// Directory REST client.
pub struct HttpDirectoryService {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl HttpDirectoryService {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BotError::HttpError(format!("Failed to build directory client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            retry: RetryPolicy::http(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, BotError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{path}", self.base_url);
        let target = url.as_str();
        retry_with_backoff(
            self.retry,
            || async move {
                let response = self.authorize(self.http.get(target)).send().await?;
                let response = response.error_for_status()?;
                Ok(response.json::<T>().await?)
            },
            BotError::is_retryable,
        )
        .await
        .map_err(|e: BotError| {
            error!(url = %url, error = %e, "Directory read failed");
            BotError::DirectoryError(e.to_string())
        })
    }
}

#[async_trait]
impl DirectoryService for HttpDirectoryService {
    async fn list_people(&self) -> Result<Vec<Person>, BotError> {
        let body: PeopleBody = self.get_json("/people").await?;
        let people = match body {
            PeopleBody::Bare(people) | PeopleBody::Wrapped { people } => people,
        };
        debug!(count = people.len(), "Fetched directory people");
        Ok(people)
    }

    async fn list_project_channel_mappings(&self) -> Result<ProjectChannelMapping, BotError> {
        let body: ChannelsBody = self.get_json("/project-channels").await?;
        Ok(body.into_mapping())
    }

    async fn set_person_availability(
        &self,
        person_id: &str,
        status: Availability,
    ) -> Result<bool, BotError> {
        let url = format!(
            "{}/people/{}/availability",
            self.base_url,
            urlencoding::encode(person_id)
        );
        let response = self
            .authorize(self.http.put(&url))
            .json(&json!({ "status": status }))
            .send()
            .await
            .map_err(|e| BotError::DirectoryError(e.to_string()))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(BotError::DirectoryError(format!(
                "availability update returned {s}"
            ))),
        }
    }
}
