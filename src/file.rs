use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

/// Server classification of whether a file may be downloaded without a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    RateLimited,
    VirusDetected,
    Unknown(String),
}

impl Availability {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "" => Availability::Available,
            "file_rate_limited_captcha_required" => Availability::RateLimited,
            "virus_detected_captcha_required" => Availability::VirusDetected,
            other => Availability::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub date_upload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_href: Option<String>,
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub availability_name: String,
    #[serde(default)]
    pub description: String,
}

impl FileDescriptor {
    pub fn availability(&self) -> Availability {
        Availability::parse(&self.availability)
    }

    /// URL the download frame is pointed at when no challenge is involved.
    pub fn download_url(&self, api_base: &str) -> String {
        match &self.download_href {
            Some(href) if !href.is_empty() => href.clone(),
            _ => format!("{}/file/{}?download", api_base, self.id),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListDescriptor {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
}

impl ListDescriptor {
    pub fn zip_url(&self, api_base: &str) -> String {
        format!("{}/list/{}/zip", api_base, self.id)
    }
}

/// `{ws|wss}://<host>/api/file/{id}/stats` for an http(s) API base.
pub fn stats_url(api_base: &str, file_id: &str) -> Result<url::Url> {
    let ws_base = if let Some(rest) = api_base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(ViewerError::InvalidUrl(format!(
            "cannot derive a websocket url from '{api_base}'"
        )));
    };
    let url = url::Url::parse(&format!(
        "{}/file/{}/stats",
        ws_base.trim_end_matches('/'),
        file_id
    ))?;
    Ok(url)
}
