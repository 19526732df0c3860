//! The viewer page component.

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::file::{FileDescriptor, ListDescriptor};
use crate::format::format_data_volume;
use crate::gate::{AvailabilityGate, ChallengeProvider, DownloadOutcome};
use crate::panels::{copy_link, detail_rows, Panels};
use crate::stats::{StatsChannel, StatsCounters, StatsTransport};
use crate::surface::{set_text, Clipboard, Element, Surface, ViewerEvent};

/// Page-side collaborators the viewer drives.
#[derive(Clone)]
pub struct Collaborators {
    pub surface: Arc<dyn Surface>,
    pub clipboard: Arc<dyn Clipboard>,
    pub challenge: Arc<dyn ChallengeProvider>,
    pub transport: Arc<dyn StatsTransport>,
}

/// One per page. Owns the panel state, the download gate and the stats
/// subscription for whatever file is on screen.
pub struct Viewer {
    config: ViewerConfig,
    surface: Arc<dyn Surface>,
    clipboard: Arc<dyn Clipboard>,
    api: ApiClient,
    panels: Panels,
    gate: AvailabilityGate,
    stats: StatsChannel,
    file: Option<FileDescriptor>,
    list: Option<ListDescriptor>,
    index: usize,
}

impl Viewer {
    pub fn new(config: ViewerConfig, parts: Collaborators, api: ApiClient) -> Self {
        let gate = AvailabilityGate::new(&config, parts.surface.clone(), parts.challenge);
        let stats = StatsChannel::new(
            parts.transport,
            parts.surface.clone(),
            config.api_base(),
            config.stats_retry_delay(),
        );
        let mut panels = Panels::new(parts.surface.clone());
        if config.show_toolbar {
            panels.toggle_toolbar();
        }

        Self {
            config,
            surface: parts.surface,
            clipboard: parts.clipboard,
            api,
            panels,
            gate,
            stats,
            file: None,
            list: None,
            index: 0,
        }
    }

    pub fn current_file(&self) -> Option<&FileDescriptor> {
        self.file.as_ref()
    }

    pub fn current_list(&self) -> Option<&ListDescriptor> {
        self.list.as_ref()
    }

    /// Position of the displayed file within the open list.
    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn panels(&self) -> &Panels {
        &self.panels
    }

    pub fn stats(&self) -> Option<StatsCounters> {
        self.stats.counters()
    }

    pub async fn open_file(&mut self, file: FileDescriptor) -> Result<()> {
        self.list = None;
        self.index = 0;
        self.set_file(file).await
    }

    /// Show a list, starting at its first file.
    pub async fn open_list(&mut self, list: ListDescriptor) -> Result<()> {
        let first = list.files.first().cloned().ok_or(ViewerError::NoSuchEntry(0))?;
        info!(list = %list.id, files = list.files.len(), "opening list");
        self.list = Some(list);
        self.index = 0;
        self.set_file(first).await
    }

    /// Navigate to entry `index` of the open list.
    pub async fn select(&mut self, index: usize) -> Result<()> {
        let file = self
            .list
            .as_ref()
            .and_then(|list| list.files.get(index))
            .cloned()
            .ok_or(ViewerError::NoSuchEntry(index))?;
        self.index = index;
        self.set_file(file).await
    }

    async fn set_file(&mut self, file: FileDescriptor) -> Result<()> {
        set_text(self.surface.as_ref(), Element::Size, format_data_volume(file.size, 3));
        self.stats.subscribe(&file).await?;
        self.file = Some(file);
        if self.panels.details_visible() {
            self.show_details().await?;
        }
        Ok(())
    }

    pub fn toggle_toolbar(&mut self) {
        self.panels.toggle_toolbar();
    }

    pub fn toggle_sharebar(&mut self) {
        self.panels.toggle_sharebar();
    }

    pub async fn toggle_details(&mut self) -> Result<()> {
        self.panels.toggle_details();
        if self.panels.details_visible() && self.file.is_some() {
            self.show_details().await?;
        }
        Ok(())
    }

    /// Fill the details popup. List entries carry incomplete file info, so
    /// the full record is fetched and the list's description added.
    pub async fn show_details(&self) -> Result<()> {
        let file = self.file.as_ref().ok_or(ViewerError::NoFile)?;
        let rows = if self.list.is_some() {
            match self.api.file_info(&file.id).await {
                Ok(info) => detail_rows(&info, Some(&file.description)),
                Err(err) => {
                    warn!(file = %file.id, %err, "file info request failed, using list data");
                    detail_rows(file, Some(&file.description))
                }
            }
        } else {
            detail_rows(file, None)
        };
        self.surface.emit(ViewerEvent::Details { rows });
        Ok(())
    }

    /// Public page address of what is on screen.
    pub fn page_url(&self) -> Result<String> {
        let path = match (&self.list, &self.file) {
            (Some(list), _) => format!("/l/{}", list.id),
            (None, Some(file)) => format!("/u/{}", file.id),
            (None, None) => return Err(ViewerError::NoFile),
        };
        let base = url::Url::parse(self.config.api_base())?;
        Ok(base.join(&path)?.to_string())
    }

    pub fn copy_link(&self) -> Result<bool> {
        let url = self.page_url()?;
        Ok(copy_link(
            self.clipboard.as_ref(),
            &self.surface,
            &url,
            self.config.copy_reset_delay(),
        ))
    }

    pub async fn download(&self) -> Result<DownloadOutcome> {
        let file = self.file.as_ref().ok_or(ViewerError::NoFile)?;
        self.gate.request_download(file).await
    }

    /// Download the whole list as a zip. Does nothing outside a list.
    pub fn download_list(&self) -> Option<String> {
        let list = self.list.as_ref()?;
        let url = list.zip_url(self.config.api_base());
        self.surface.emit(ViewerEvent::Navigate { url: url.clone() });
        Some(url)
    }

    pub async fn close(&self) {
        self.stats.close().await;
    }
}
