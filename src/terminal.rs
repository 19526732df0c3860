//! Terminal front end: plays the page for the viewer controller.

use std::io::{BufRead, Write};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::gate::{ChallengeProvider, ChallengeRequest, ChallengeSession};
use crate::surface::{Clipboard, Element, Surface, ViewerEvent};

#[derive(Default)]
struct Counters {
    views: String,
    downloads: String,
}

/// Prints surface events to the terminal.
#[derive(Default)]
pub struct TerminalSurface {
    counters: Mutex<Counters>,
}

impl Surface for TerminalSurface {
    fn emit(&self, event: ViewerEvent) {
        match event {
            ViewerEvent::Text { element, text } => match element {
                Element::Views => {
                    let mut counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
                    counters.views = text;
                }
                // Views are always written first, so a downloads update completes the pair.
                Element::Downloads => {
                    let mut counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
                    counters.downloads = text;
                    println!("Views: {}  Downloads: {}", counters.views, counters.downloads);
                }
                Element::Size => println!("Size: {text}"),
                Element::CopyLabel => debug!(label = %text, "copy button"),
            },
            ViewerEvent::Panel { panel, visible } => debug!(?panel, visible, "panel"),
            ViewerEvent::Highlight { button, on } => debug!(?button, on, "highlight"),
            ViewerEvent::Details { rows } => {
                let width = rows.iter().map(|r| r.label.len()).max().unwrap_or(0);
                for row in rows {
                    println!("{:<width$}  {}", row.label, row.value, width = width);
                }
            }
            ViewerEvent::ChallengeOpened { title, text, .. } => {
                println!();
                println!("== {title} ==");
                println!("{text}");
            }
            ViewerEvent::ChallengeFailed { message } => eprintln!("[!] {message}"),
            ViewerEvent::ChallengeClosed => debug!("challenge closed"),
            ViewerEvent::Navigate { url } => info!(%url, "download frame navigated"),
            ViewerEvent::Alert { message } => eprintln!("[!] {message}"),
            ViewerEvent::Log { message } => println!("{message}"),
            ViewerEvent::Progress {
                downloaded,
                total,
                speed_mbps,
            } => {
                let mut err = std::io::stderr();
                let _ = write!(err, "\r{downloaded}/{total} bytes  {speed_mbps:.2} MB/s");
                let _ = err.flush();
            }
            ViewerEvent::DownloadComplete { path, .. } => {
                eprintln!();
                println!("Saved {path}");
            }
        }
    }
}

/// Asks for the proof token on stdin. The widget itself has to be solved
/// in a browser; an empty line cancels the download.
pub struct TerminalChallenge;

impl ChallengeProvider for TerminalChallenge {
    fn render(&self, request: ChallengeRequest, session: ChallengeSession) {
        println!(
            "Solve the challenge (site key {}, widget {}) and paste the response token.",
            request.site_key, request.script_url
        );
        print!("token (empty to cancel): ");
        let _ = std::io::stdout().flush();

        std::thread::spawn(move || {
            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line).map(|_| line);
            answer(session, read);
        });
    }
}

/// Settle the challenge with what was typed. An empty line or an unreadable
/// stdin abandons it; neither means the widget failed to load.
fn answer(session: ChallengeSession, read: std::io::Result<String>) {
    match read {
        Ok(line) if !line.trim().is_empty() => session.complete(line.trim().to_string()),
        Ok(_) => drop(session),
        Err(err) => {
            warn!(%err, "could not read challenge token, abandoning download");
            drop(session);
        }
    }
}

/// System clipboard through `arboard`.
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn copy_text(&self, text: &str) -> bool {
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => match clipboard.set_text(text.to_string()) {
                Ok(()) => true,
                Err(err) => {
                    debug!(%err, "clipboard write failed");
                    false
                }
            },
            Err(err) => {
                debug!(%err, "clipboard unavailable");
                false
            }
        }
    }
}
