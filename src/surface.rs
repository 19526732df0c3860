//! The page side of the controller: events pushed to the rendering surface
//! and the clipboard it exposes.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Toolbar,
    Sharebar,
    Details,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    ToggleToolbar,
    Share,
    Details,
    Copy,
}

/// Text elements the controller writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    Views,
    Downloads,
    Size,
    CopyLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ViewerEvent {
    Panel { panel: Panel, visible: bool },
    Highlight { button: Button, on: bool },
    Text { element: Element, text: String },
    Details { rows: Vec<DetailRow> },
    ChallengeOpened {
        title: String,
        text: String,
        site_key: String,
        script_url: String,
    },
    ChallengeFailed { message: String },
    ChallengeClosed,
    /// Points the hidden download frame at `url`.
    Navigate { url: String },
    Alert { message: String },
    Log { message: String },
    Progress {
        downloaded: u64,
        total: u64,
        speed_mbps: f64,
    },
    DownloadComplete { url: String, path: String, hash: String },
}

pub trait Surface: Send + Sync {
    fn emit(&self, event: ViewerEvent);

    fn log(&self, message: String) {
        self.emit(ViewerEvent::Log { message });
    }
}

/// Emits a text update through a trait object.
pub fn set_text(surface: &dyn Surface, element: Element, text: impl Into<String>) {
    surface.emit(ViewerEvent::Text {
        element,
        text: text.into(),
    });
}

pub trait Clipboard: Send + Sync {
    /// Returns whether the text ended up on the clipboard.
    fn copy_text(&self, text: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_value(ViewerEvent::Panel {
            panel: Panel::Sharebar,
            visible: true,
        })
        .unwrap();
        assert_eq!(json["event"], "panel");
        assert_eq!(json["payload"]["panel"], "sharebar");
        assert_eq!(json["payload"]["visible"], true);

        let json = serde_json::to_value(ViewerEvent::ChallengeClosed).unwrap();
        assert_eq!(json["event"], "challenge_closed");
    }
}
