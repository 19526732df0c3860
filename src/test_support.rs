//! Fakes shared by the unit tests.

use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::{Result, ViewerError};
use crate::gate::{ChallengeProvider, ChallengeRequest, ChallengeSession};
use crate::stats::{StatsConnection, StatsTransport};
use crate::surface::{Clipboard, Element, Surface, ViewerEvent};

#[derive(Default)]
pub struct RecordingSurface {
    events: Mutex<Vec<ViewerEvent>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ViewerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Last text written to `element`.
    pub fn text(&self, element: Element) -> Option<String> {
        self.events().into_iter().rev().find_map(|event| match event {
            ViewerEvent::Text { element: e, text } if e == element => Some(text),
            _ => None,
        })
    }

    pub fn navigations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ViewerEvent::Navigate { url } => Some(url),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn emit(&self, event: ViewerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct FakeClipboard {
    pub works: bool,
    pub copied: Mutex<Vec<String>>,
}

impl FakeClipboard {
    pub fn new(works: bool) -> Arc<Self> {
        Arc::new(Self {
            works,
            copied: Mutex::new(Vec::new()),
        })
    }
}

impl Clipboard for FakeClipboard {
    fn copy_text(&self, text: &str) -> bool {
        if self.works {
            self.copied.lock().unwrap().push(text.to_string());
        }
        self.works
    }
}

/// What the challenge provider does with the session it is handed.
pub enum ChallengeScript {
    Solve(&'static str),
    FailToLoad(&'static str),
    Abandon,
}

pub struct ScriptedChallenge {
    script: Mutex<VecDeque<ChallengeScript>>,
    pub requests: Mutex<Vec<ChallengeRequest>>,
}

impl ScriptedChallenge {
    pub fn new(script: Vec<ChallengeScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn rendered(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ChallengeProvider for ScriptedChallenge {
    fn render(&self, request: ChallengeRequest, session: ChallengeSession) {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().pop_front() {
            Some(ChallengeScript::Solve(token)) => session.complete(token.to_string()),
            Some(ChallengeScript::FailToLoad(reason)) => session.fail(reason.to_string()),
            Some(ChallengeScript::Abandon) | None => drop(session),
        }
    }
}

/// Server side of a scripted connection.
pub struct ScriptedPeer {
    pub tx: mpsc::UnboundedSender<Result<String>>,
}

impl ScriptedPeer {
    pub fn send_stats(&self, views: u64, bandwidth: u64) {
        let _ = self
            .tx
            .send(Ok(format!(r#"{{"views":{views},"bandwidth":{bandwidth}}}"#)));
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.tx.send(Ok(text.to_string()));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.tx.send(Err(ViewerError::Transport(reason.to_string())));
    }
}

/// Transport whose connections are fed from the test. Every connect, close
/// and refusal is appended to `log`.
#[derive(Default)]
pub struct ScriptedTransport {
    pub log: Arc<Mutex<Vec<String>>>,
    peers: Mutex<Vec<ScriptedPeer>>,
    refuse: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.log().iter().filter(|l| l.starts_with("connect ")).count()
    }

    /// Make the next `count` connection attempts fail.
    pub fn refuse_next(&self, count: usize) {
        *self.refuse.lock().unwrap() = count;
    }

    /// Peer of the `index`th accepted connection.
    pub fn peer(&self, index: usize) -> ScriptedPeer {
        let peers = self.peers.lock().unwrap();
        ScriptedPeer {
            tx: peers[index].tx.clone(),
        }
    }
}

struct ScriptedConnection {
    url: String,
    rx: mpsc::UnboundedReceiver<Result<String>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl StatsConnection for ScriptedConnection {
    fn next_message(&mut self) -> BoxFuture<'_, Option<Result<String>>> {
        Box::pin(async move { self.rx.recv().await })
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("close {}", self.url));
        })
    }
}

impl StatsTransport for ScriptedTransport {
    fn connect(&self, url: url::Url) -> BoxFuture<'static, Result<Box<dyn StatsConnection>>> {
        let refused = {
            let mut refuse = self.refuse.lock().unwrap();
            if *refuse > 0 {
                *refuse -= 1;
                true
            } else {
                false
            }
        };
        let log = Arc::clone(&self.log);
        if refused {
            log.lock().unwrap().push(format!("refused {}", url));
            return Box::pin(async { Err(ViewerError::Transport("connection refused".into())) });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.lock().unwrap().push(ScriptedPeer { tx });
        log.lock().unwrap().push(format!("connect {}", url));
        let conn = ScriptedConnection {
            url: url.to_string(),
            rx,
            log,
        };
        Box::pin(async move { Ok(Box::new(conn) as Box<dyn StatsConnection>) })
    }
}
