//! Toolbar, share bar and details popup.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::file::FileDescriptor;
use crate::format::format_data_volume;
use crate::surface::{set_text, Button, Clipboard, DetailRow, Element, Panel, Surface, ViewerEvent};

const COPY_LABEL: &str = "Copy";
const COPIED_LABEL: &str = "Copied!";
const COPY_FAILED_LABEL: &str = "Error!";
const COPY_UNSUPPORTED: &str = "Copying text to the clipboard is not supported here.";

/// Visibility of the viewer panels. The share bar is only ever open while
/// the toolbar is.
pub struct Panels {
    toolbar: bool,
    sharebar: bool,
    details: bool,
    surface: Arc<dyn Surface>,
}

impl Panels {
    /// All panels start hidden.
    pub fn new(surface: Arc<dyn Surface>) -> Self {
        Self {
            toolbar: false,
            sharebar: false,
            details: false,
            surface,
        }
    }

    pub fn toolbar_visible(&self) -> bool {
        self.toolbar
    }

    pub fn sharebar_visible(&self) -> bool {
        self.sharebar
    }

    pub fn details_visible(&self) -> bool {
        self.details
    }

    pub fn toggle_toolbar(&mut self) {
        if self.toolbar {
            if self.sharebar {
                self.toggle_sharebar();
            }
            self.set(Panel::Toolbar, Button::ToggleToolbar, false);
        } else {
            self.set(Panel::Toolbar, Button::ToggleToolbar, true);
        }
    }

    pub fn toggle_sharebar(&mut self) {
        if self.sharebar {
            self.set(Panel::Sharebar, Button::Share, false);
        } else {
            if !self.toolbar {
                self.toggle_toolbar();
            }
            self.set(Panel::Sharebar, Button::Share, true);
        }
    }

    pub fn toggle_details(&mut self) {
        let visible = !self.details;
        self.set(Panel::Details, Button::Details, visible);
    }

    fn set(&mut self, panel: Panel, button: Button, visible: bool) {
        match panel {
            Panel::Toolbar => self.toolbar = visible,
            Panel::Sharebar => self.sharebar = visible,
            Panel::Details => self.details = visible,
        }
        debug!(?panel, visible, "panel toggled");
        self.surface.emit(ViewerEvent::Panel { panel, visible });
        self.surface.emit(ViewerEvent::Highlight { button, on: visible });
    }
}

/// Copy `url` and flash the result on the copy button until `reset_after`
/// has passed. The reset is scheduled on the current tokio runtime; without
/// one the label keeps its feedback text.
pub fn copy_link(
    clipboard: &dyn Clipboard,
    surface: &Arc<dyn Surface>,
    url: &str,
    reset_after: Duration,
) -> bool {
    let copied = clipboard.copy_text(url);
    if copied {
        debug!("link copied");
        set_text(surface.as_ref(), Element::CopyLabel, COPIED_LABEL);
        surface.emit(ViewerEvent::Highlight {
            button: Button::Copy,
            on: true,
        });
    } else {
        warn!("clipboard copy failed");
        set_text(surface.as_ref(), Element::CopyLabel, COPY_FAILED_LABEL);
        surface.emit(ViewerEvent::Alert {
            message: COPY_UNSUPPORTED.to_string(),
        });
    }

    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("no runtime to reset the copy label on");
        return copied;
    };
    let surface = Arc::clone(surface);
    runtime.spawn(async move {
        tokio::time::sleep(reset_after).await;
        set_text(surface.as_ref(), Element::CopyLabel, COPY_LABEL);
        surface.emit(ViewerEvent::Highlight {
            button: Button::Copy,
            on: false,
        });
    });
    copied
}

/// Rows of the details popup. The description only exists for list entries.
pub fn detail_rows(file: &FileDescriptor, description: Option<&str>) -> Vec<DetailRow> {
    let mut rows = vec![
        DetailRow {
            label: "Name",
            value: file.name.clone(),
        },
        DetailRow {
            label: "Mime Type",
            value: file.mime_type.clone(),
        },
        DetailRow {
            label: "ID",
            value: file.id.clone(),
        },
        DetailRow {
            label: "Size",
            value: format_data_volume(file.size, 3),
        },
        DetailRow {
            label: "Upload Date",
            value: file.date_upload.clone(),
        },
    ];
    if let Some(description) = description {
        rows.push(DetailRow {
            label: "Description",
            value: description.to_string(),
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeClipboard, RecordingSurface};

    fn panels() -> (Panels, Arc<RecordingSurface>) {
        let surface = RecordingSurface::new();
        (Panels::new(surface.clone()), surface)
    }

    #[test]
    fn opening_sharebar_opens_toolbar() {
        let (mut panels, surface) = panels();
        panels.toggle_sharebar();
        assert!(panels.toolbar_visible());
        assert!(panels.sharebar_visible());

        let events = surface.events();
        assert_eq!(
            events[0],
            ViewerEvent::Panel {
                panel: Panel::Toolbar,
                visible: true
            }
        );
        assert!(events.contains(&ViewerEvent::Panel {
            panel: Panel::Sharebar,
            visible: true
        }));
    }

    #[test]
    fn closing_toolbar_closes_sharebar() {
        let (mut panels, surface) = panels();
        panels.toggle_toolbar();
        panels.toggle_sharebar();
        surface.clear();

        panels.toggle_toolbar();
        assert!(!panels.toolbar_visible());
        assert!(!panels.sharebar_visible());
        assert_eq!(
            surface.events(),
            vec![
                ViewerEvent::Panel {
                    panel: Panel::Sharebar,
                    visible: false
                },
                ViewerEvent::Highlight {
                    button: Button::Share,
                    on: false
                },
                ViewerEvent::Panel {
                    panel: Panel::Toolbar,
                    visible: false
                },
                ViewerEvent::Highlight {
                    button: Button::ToggleToolbar,
                    on: false
                },
            ]
        );
    }

    #[test]
    fn sharebar_never_outlives_toolbar() {
        let (mut panels, _) = panels();
        let steps = [0, 1, 1, 0, 1, 2, 0, 0, 1, 1, 2, 0];
        for step in steps {
            match step {
                0 => panels.toggle_toolbar(),
                1 => panels.toggle_sharebar(),
                _ => panels.toggle_details(),
            }
            assert!(!panels.sharebar_visible() || panels.toolbar_visible());
        }
    }

    #[test]
    fn details_toggle_independently() {
        let (mut panels, _) = panels();
        panels.toggle_details();
        assert!(panels.details_visible());
        assert!(!panels.toolbar_visible());
        panels.toggle_details();
        assert!(!panels.details_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn copy_success_flashes_and_resets() {
        let recording = RecordingSurface::new();
        let surface: Arc<dyn Surface> = recording.clone();
        let clipboard = FakeClipboard::new(true);

        assert!(copy_link(
            clipboard.as_ref(),
            &surface,
            "https://host/u/abc",
            Duration::from_secs(60)
        ));
        assert_eq!(*clipboard.copied.lock().unwrap(), vec!["https://host/u/abc"]);
        assert_eq!(recording.text(Element::CopyLabel).as_deref(), Some(COPIED_LABEL));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(recording.text(Element::CopyLabel).as_deref(), Some(COPY_LABEL));
        assert_eq!(
            recording.events().last(),
            Some(&ViewerEvent::Highlight {
                button: Button::Copy,
                on: false
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn copy_failure_alerts() {
        let recording = RecordingSurface::new();
        let surface: Arc<dyn Surface> = recording.clone();
        let clipboard = FakeClipboard::new(false);

        assert!(!copy_link(clipboard.as_ref(), &surface, "x", Duration::from_secs(60)));
        assert_eq!(recording.text(Element::CopyLabel).as_deref(), Some(COPY_FAILED_LABEL));
        assert!(recording
            .events()
            .iter()
            .any(|e| matches!(e, ViewerEvent::Alert { .. })));
    }

    #[test]
    fn details_rows_include_description_for_lists() {
        let file = FileDescriptor {
            id: "abc".into(),
            name: "a.txt".into(),
            size: 1_500_000,
            mime_type: "text/plain".into(),
            date_upload: "2020-01-01".into(),
            ..FileDescriptor::default()
        };
        let rows = detail_rows(&file, None);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[3].value, "1.50 MB");

        let rows = detail_rows(&file, Some("notes"));
        assert_eq!(rows.last().map(|r| r.label), Some("Description"));
    }

    #[test]
    fn copy_without_runtime_keeps_feedback() {
        let recording = RecordingSurface::new();
        let surface: Arc<dyn Surface> = recording.clone();
        let clipboard = FakeClipboard::new(true);

        assert!(copy_link(clipboard.as_ref(), &surface, "x", Duration::from_secs(60)));
        assert_eq!(recording.text(Element::CopyLabel).as_deref(), Some(COPIED_LABEL));
    }
}
