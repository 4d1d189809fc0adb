use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use reqwest::{
    StatusCode,
    blocking::{Client, Response},
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::{ProjectMetadataSelector, StorageAccess};
use crate::{error::MetadataError, settings::GrdmSettings};

struct Session {
    token: String,
    project_id: String,
}

/// Blocking GRDM API client.
pub struct GrdmAccess {
    client: Client,
    settings: GrdmSettings,
    session: Option<Session>,
}

impl GrdmAccess {
    pub fn new(settings: &GrdmSettings) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| MetadataError::Api(format!("could not create http client: {}", e)))?;

        Ok(Self {
            client,
            settings: settings.clone(),
            session: None,
        })
    }

    fn session(&self) -> Result<&Session, MetadataError> {
        self.session.as_ref().ok_or(MetadataError::Unauthorized)
    }

    fn send(&self, url: &str, token: &str) -> Result<Response, MetadataError> {
        debug!("GET {}", url);
        self.client
            .get(url)
            .bearer_auth(token)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    MetadataError::Api(format!("request timed out: {}", url))
                } else {
                    MetadataError::Api(format!("request failed: {}: {}", url, e))
                }
            })
    }

    /// GETs `url` and decodes the body, letting `on_error` claim non-success
    /// statuses before they become an API error.
    fn get_json(
        &self,
        url: &str,
        token: &str,
        on_error: impl Fn(StatusCode) -> Option<MetadataError>,
    ) -> Result<Value, MetadataError> {
        let response = self.send(url, token)?;
        let status = response.status();
        if !status.is_success() {
            warn!("GET {} returned {}", url, status);
            return Err(on_error(status).unwrap_or_else(|| unexpected_status(url, status)));
        }

        response
            .json()
            .map_err(|e| MetadataError::Api(format!("invalid response body from {}: {}", url, e)))
    }

    /// Follows `links.next` from `url`, collecting every page's `data`.
    fn get_all_pages(&self, url: &str, token: &str) -> Result<Vec<Value>, MetadataError> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        let mut requests = 0;

        while let Some(url) = next {
            if requests >= self.settings.max_requests {
                return Err(MetadataError::Api(format!(
                    "gave up paging after {} requests: {}",
                    requests, url
                )));
            }
            requests += 1;

            let page = self.get_json(&url, token, |_| None)?;
            if let Some(Value::Array(data)) = page.get("data") {
                items.extend(data.iter().cloned());
            }
            next = next_link(&page).map(str::to_string);
        }

        Ok(items)
    }

    fn node_url(&self, project_id: &str) -> String {
        format!("{}/nodes/{}/", self.settings.api_url.trim_end_matches('/'), project_id)
    }
}

impl StorageAccess for GrdmAccess {
    fn check_authentication(
        &mut self,
        token: &str,
        project_id: &str,
    ) -> Result<bool, MetadataError> {
        let user_url = format!("{}/users/me/", self.settings.api_url.trim_end_matches('/'));
        self.get_json(&user_url, token, |status| match status {
            StatusCode::UNAUTHORIZED => Some(MetadataError::InvalidToken(
                "the token is invalid or has expired".to_string(),
            )),
            StatusCode::FORBIDDEN => Some(MetadataError::InsufficientScope(
                "the token cannot read user information".to_string(),
            )),
            _ => None,
        })?;

        self.get_json(&self.node_url(project_id), token, |status| match status {
            StatusCode::UNAUTHORIZED => Some(MetadataError::InvalidToken(
                "the token is invalid or has expired".to_string(),
            )),
            StatusCode::FORBIDDEN => Some(MetadataError::AccessDenied(format!(
                "the token cannot read project {}",
                project_id
            ))),
            StatusCode::NOT_FOUND | StatusCode::GONE => Some(MetadataError::InvalidProject(
                format!("project {} does not exist", project_id),
            )),
            _ => None,
        })?;

        info!("authenticated against project {}", project_id);
        self.session = Some(Session {
            token: token.to_string(),
            project_id: project_id.to_string(),
        });
        Ok(true)
    }

    fn get_project_info(&self) -> Result<Value, MetadataError> {
        let session = self.session()?;
        self.get_json(&self.node_url(&session.project_id), &session.token, |_| None)
    }

    fn get_member_info(&self) -> Result<Value, MetadataError> {
        let session = self.session()?;
        let url = format!(
            "{}contributors/?embed=users&page[size]={}",
            self.node_url(&session.project_id),
            self.settings.page_size
        );
        let members = self.get_all_pages(&url, &session.token)?;
        Ok(json!({ "data": members }))
    }

    fn get_project_metadata(
        &self,
        selector: &ProjectMetadataSelector,
    ) -> Result<Value, MetadataError> {
        let session = self.session()?;

        if let ProjectMetadataSelector::Id(id) = selector {
            let url = format!(
                "{}/draft_registrations/{}/",
                self.settings.api_url.trim_end_matches('/'),
                id
            );
            let document = self.get_json(&url, &session.token, |status| match status {
                StatusCode::NOT_FOUND | StatusCode::GONE => Some(MetadataError::InvalidId(
                    format!("project metadata {} does not exist", id),
                )),
                StatusCode::FORBIDDEN => Some(MetadataError::AccessDenied(format!(
                    "the token cannot read project metadata {}",
                    id
                ))),
                _ => None,
            })?;

            let data = document.get("data").cloned().unwrap_or(Value::Null);
            if branched_from(&data) != Some(session.project_id.as_str()) {
                return Err(MetadataError::InvalidId(format!(
                    "project metadata {} does not belong to project {}",
                    id, session.project_id
                )));
            }
            return Ok(json!({ "data": data }));
        }

        let url = format!(
            "{}draft_registrations/?page[size]={}",
            self.node_url(&session.project_id),
            self.settings.page_size
        );
        let drafts = self.get_all_pages(&url, &session.token)?;

        let chosen = match selector {
            ProjectMetadataSelector::Title(title) => newest(
                drafts
                    .iter()
                    .filter(|draft| draft_title(draft) == Some(title.as_str())),
            )
            .ok_or_else(|| {
                MetadataError::MetadataNotFound(format!("no project metadata titled '{}'", title))
            })?,
            _ => newest(drafts.iter()).ok_or_else(|| {
                MetadataError::MetadataNotFound(format!(
                    "project {} has no project metadata",
                    session.project_id
                ))
            })?,
        };

        Ok(json!({ "data": chosen }))
    }

    fn get_file_metadata(&self) -> Result<Value, MetadataError> {
        let session = self.session()?;
        let url = format!(
            "{}/project/{}/metadata/project",
            self.settings.web_api_url.trim_end_matches('/'),
            session.project_id
        );

        let response = self.send(&url, &session.token)?;
        match response.status() {
            // metadata add-on not enabled for the project
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => Ok(json!({})),
            status if status.is_success() => response.json().map_err(|e| {
                MetadataError::Api(format!("invalid response body from {}: {}", url, e))
            }),
            status => Err(unexpected_status(&url, status)),
        }
    }
}

fn unexpected_status(url: &str, status: StatusCode) -> MetadataError {
    MetadataError::Api(format!("unexpected status {} from {}", status, url))
}

fn next_link(page: &Value) -> Option<&str> {
    page.get("links")?.get("next")?.as_str()
}

fn branched_from(draft: &Value) -> Option<&str> {
    draft
        .pointer("/relationships/branched_from/data/id")?
        .as_str()
}

fn draft_title(draft: &Value) -> Option<&str> {
    draft.pointer("/attributes/title")?.as_str()
}

fn initiated(draft: &Value) -> Option<NaiveDateTime> {
    let text = draft.pointer("/attributes/datetime_initiated")?.as_str()?;
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
}

/// Latest draft by `datetime_initiated`; drafts without a date sort first.
fn newest<'a>(drafts: impl Iterator<Item = &'a Value>) -> Option<&'a Value> {
    drafts.max_by_key(|draft| initiated(draft))
}
