use reqwest::blocking::{Client, RequestBuilder, Response, multipart};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::endpoints;
use super::{ApiError, FileUpload, NewReport, QuestionToUser, TicketApi};
use crate::config::ClientConfig;
use crate::model::message::{AttachmentRecord, Report};
use crate::model::resolution::{NewResolution, Resolution, ResolutionChoices};
use crate::model::ticket::{Ticket, TicketChoices, TicketId, TicketUpdate};
use crate::model::user::UserProfile;
use crate::timing::timed;

const MAX_DETAIL_CHARS: usize = 300;

/// Blocking HTTP implementation of [`TicketApi`].
///
/// Every request carries `Authorization: Bearer <token>`. Without a token no
/// request is issued.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpApi {
    pub fn new(config: &ClientConfig, token: Option<String>) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.api_url).map_err(|e| ApiError::Transport {
            endpoint: config.api_url.clone(),
            message: format!("invalid base URL: {e}"),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(concat!("helpdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport {
                endpoint: base_url.to_string(),
                message: format!("client build failed: {e}"),
            })?;

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder, ApiError> {
        let token = self.token.as_deref().ok_or(ApiError::MissingToken)?;
        let url = self.base_url.join(endpoint).map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: format!("invalid endpoint: {e}"),
        })?;
        debug!(%method, %url, "request");
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    fn execute(
        &self,
        timing: &'static str,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let response = timed(timing, || builder.send()).map_err(|e| ApiError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        debug!(endpoint, status = status.as_u16(), "response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        Err(ApiError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            detail: error_detail(&body),
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        timing: &'static str,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::GET, endpoint)?;
        let response = self.execute(timing, endpoint, builder)?;
        decode(endpoint, response)
    }
}

impl TicketApi for HttpApi {
    fn fetch_ticket(&self, id: &TicketId) -> Result<Ticket, ApiError> {
        self.get_json("api.fetch_ticket", &endpoints::ticket(id))
    }

    fn update_ticket(&self, id: &TicketId, update: &TicketUpdate) -> Result<Ticket, ApiError> {
        let endpoint = endpoints::ticket(id);
        let builder = self.request(Method::PUT, &endpoint)?.json(update);
        let response = self.execute("api.update_ticket", &endpoint, builder)?;
        decode(&endpoint, response)
    }

    fn fetch_choices(&self) -> Result<TicketChoices, ApiError> {
        self.get_json("api.fetch_choices", endpoints::CHOICES)
    }

    fn fetch_reports(&self, id: &TicketId) -> Result<Vec<Report>, ApiError> {
        match self.get_json("api.fetch_reports", &endpoints::reports_for(id)) {
            Err(ApiError::Status { status: 404, .. }) => Ok(Vec::new()),
            other => other,
        }
    }

    fn post_report(&self, report: &NewReport) -> Result<Report, ApiError> {
        let endpoint = endpoints::REPORTS;
        let builder = self.request(Method::POST, endpoint)?;
        let builder = match &report.attachment {
            None => builder.json(&serde_json::json!({
                "title": report.title,
                "ticket": report.ticket,
            })),
            Some(file) => builder.multipart(
                multipart::Form::new()
                    .part("attachments", file_part(file))
                    .text("ticket", report.ticket.to_string())
                    .text("title", report.title.clone()),
            ),
        };
        let response = self.execute("api.post_report", endpoint, builder)?;
        decode(endpoint, response)
    }

    fn fetch_attachments(&self, id: &TicketId) -> Result<Vec<AttachmentRecord>, ApiError> {
        self.get_json("api.fetch_attachments", &endpoints::attachments_for(id))
    }

    fn post_question(&self, question: &QuestionToUser) -> Result<(), ApiError> {
        let endpoint = endpoints::TICKET_COMMENTS;
        let mut form = multipart::Form::new()
            .text("ticket", question.ticket.to_string())
            .text("username", question.username.clone())
            .text("comment", question.comment.clone());
        for file in &question.attachments {
            form = form.part("attachments", file_part(file));
        }
        let builder = self.request(Method::POST, endpoint)?.multipart(form);
        self.execute("api.post_question", endpoint, builder)?;
        Ok(())
    }

    fn fetch_resolution(&self, id: &TicketId) -> Result<Option<Resolution>, ApiError> {
        let endpoint = endpoints::resolution(id);
        let value: Value = match self.get_json("api.fetch_resolution", &endpoint) {
            Err(ApiError::Status { status: 404, .. }) => return Ok(None),
            other => other?,
        };
        first_or_self(value)
            .map(|v| decode_value(&endpoint, v))
            .transpose()
    }

    fn fetch_resolution_choices(&self) -> Result<ResolutionChoices, ApiError> {
        self.get_json("api.fetch_resolution_choices", endpoints::RESOLUTION_CHOICES)
    }

    fn create_resolution(&self, resolution: &NewResolution) -> Result<Resolution, ApiError> {
        let endpoint = endpoints::RESOLUTIONS;
        let builder = self.request(Method::POST, endpoint)?.json(resolution);
        let response = self.execute("api.create_resolution", endpoint, builder)?;
        decode(endpoint, response)
    }

    fn fetch_profile(&self, user_id: i64) -> Result<UserProfile, ApiError> {
        let endpoint = endpoints::personal_details(user_id);
        let value: Value = self.get_json("api.fetch_profile", &endpoint)?;
        let entry = first_or_self(value).ok_or_else(|| ApiError::Decode {
            endpoint: endpoint.clone(),
            message: "empty profile list".to_string(),
        })?;
        decode_value(&endpoint, entry)
    }
}

fn file_part(file: &FileUpload) -> multipart::Part {
    let part = multipart::Part::bytes(file.bytes.to_vec()).file_name(file.file_name.clone());
    match part.mime_str(&file.mime_type) {
        Ok(part) => part,
        Err(_) => multipart::Part::bytes(file.bytes.to_vec()).file_name(file.file_name.clone()),
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, ApiError> {
    let body = response.text().map_err(|e| ApiError::Transport {
        endpoint: endpoint.to_string(),
        message: format!("failed to read body: {e}"),
    })?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

fn decode_value<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

/// Some endpoints answer with a one-element list, others with the object.
fn first_or_self(value: Value) -> Option<Value> {
    match value {
        Value::Array(items) => items.into_iter().next(),
        Value::Null => None,
        other => Some(other),
    }
}

/// The server's explanation for a non-2xx response.
///
/// Prefers `detail`, `error` or `message`; otherwise the compacted body.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let compact = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => {
            for key in ["detail", "error", "message"] {
                if let Some(Value::String(text)) = map.get(key) {
                    return Some(text.clone());
                }
            }
            Value::Object(map).to_string()
        }
        Ok(Value::String(text)) => text,
        Ok(other) => other.to_string(),
        Err(_) => trimmed.split_whitespace().collect::<Vec<_>>().join(" "),
    };

    Some(truncate_chars(&compact, MAX_DETAIL_CHARS))
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}
