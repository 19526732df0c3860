//! Download availability gate.
//!
//! Decides whether a file can be fetched straight away or only after the
//! user solves a challenge, and points the download frame at the result.

use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::{CaptchaKey, ViewerConfig};
use crate::error::{Result, ViewerError};
use crate::file::{Availability, FileDescriptor};
use crate::surface::{Surface, ViewerEvent};

const RATE_LIMIT_TITLE: &str = "Rate limiting enabled!";
const RATE_LIMIT_TEXT: &str = "This file is using a suspicious amount of bandwidth relative \
to its popularity. To continue downloading this file you will have to prove that you're a \
human first.";
const MALWARE_TITLE: &str = "Malware warning!";

/// What the challenge modal shows and how the provider widget is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRequest {
    pub title: String,
    pub text: String,
    pub site_key: String,
    pub script_url: String,
}

enum ChallengeResult {
    Solved(String),
    LoadFailed(String),
}

/// Single-shot completion handle for an outstanding challenge.
///
/// Dropping the session without completing it abandons the download.
pub struct ChallengeSession {
    tx: oneshot::Sender<ChallengeResult>,
}

impl ChallengeSession {
    pub fn complete(self, token: String) {
        let _ = self.tx.send(ChallengeResult::Solved(token));
    }

    /// The provider widget could not be loaded.
    pub fn fail(self, reason: String) {
        let _ = self.tx.send(ChallengeResult::LoadFailed(reason));
    }
}

/// Renders the challenge widget inside the open modal.
pub trait ChallengeProvider: Send + Sync {
    fn render(&self, request: ChallengeRequest, session: ChallengeSession);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// No challenge was needed.
    Direct(String),
    /// Issued with a proof token attached.
    Verified(String),
    /// The user closed the challenge.
    Abandoned,
}

pub struct AvailabilityGate {
    captcha: CaptchaKey,
    script_url: String,
    api_base: String,
    surface: Arc<dyn Surface>,
    provider: Arc<dyn ChallengeProvider>,
}

impl AvailabilityGate {
    pub fn new(
        config: &ViewerConfig,
        surface: Arc<dyn Surface>,
        provider: Arc<dyn ChallengeProvider>,
    ) -> Self {
        Self {
            captcha: config.captcha_key(),
            script_url: config.captcha_script_url.clone(),
            api_base: config.api_base().to_string(),
            surface,
            provider,
        }
    }

    pub async fn request_download(&self, file: &FileDescriptor) -> Result<DownloadOutcome> {
        let base_url = file.download_url(&self.api_base);

        let site_key = match &self.captcha {
            CaptchaKey::Disabled => {
                debug!(file = %file.id, "challenges disabled, starting download");
                return Ok(self.issue_direct(base_url));
            }
            CaptchaKey::SiteKey(key) => key.clone(),
        };

        let (title, text) = match file.availability() {
            Availability::Available => {
                debug!(file = %file.id, "file is available, starting download");
                return Ok(self.issue_direct(base_url));
            }
            Availability::RateLimited => (RATE_LIMIT_TITLE.to_string(), RATE_LIMIT_TEXT.to_string()),
            Availability::VirusDetected => {
                (MALWARE_TITLE.to_string(), malware_text(&file.availability_name))
            }
            Availability::Unknown(status) => {
                warn!(file = %file.id, %status, "unrecognised availability status, allowing download");
                return Ok(self.issue_direct(base_url));
            }
        };

        info!(file = %file.id, %title, "file is not readily available, showing challenge");
        let request = ChallengeRequest {
            title,
            text,
            site_key,
            script_url: self.script_url.clone(),
        };
        self.challenge(base_url, request).await
    }

    async fn challenge(&self, base_url: String, request: ChallengeRequest) -> Result<DownloadOutcome> {
        let (tx, rx) = oneshot::channel();
        self.surface.emit(ViewerEvent::ChallengeOpened {
            title: request.title.clone(),
            text: request.text.clone(),
            site_key: request.site_key.clone(),
            script_url: request.script_url.clone(),
        });
        self.provider.render(request, ChallengeSession { tx });

        match rx.await {
            Ok(ChallengeResult::Solved(token)) => {
                let url = format!("{}&recaptcha_response={}", base_url, token);
                self.navigate(url.clone());
                self.surface.emit(ViewerEvent::ChallengeClosed);
                Ok(DownloadOutcome::Verified(url))
            }
            Ok(ChallengeResult::LoadFailed(reason)) => {
                warn!(%reason, "challenge provider failed to load");
                self.surface.emit(ViewerEvent::ChallengeFailed {
                    message: format!("The verification widget could not be loaded: {reason}"),
                });
                self.surface
                    .log(format!("[!] Challenge provider failed to load: {reason}"));
                Err(ViewerError::ChallengeLoad(reason))
            }
            Err(_) => {
                info!("challenge abandoned");
                self.surface.emit(ViewerEvent::ChallengeClosed);
                Ok(DownloadOutcome::Abandoned)
            }
        }
    }

    fn issue_direct(&self, url: String) -> DownloadOutcome {
        self.navigate(url.clone());
        DownloadOutcome::Direct(url)
    }

    fn navigate(&self, url: String) {
        self.surface.emit(ViewerEvent::Navigate { url });
    }
}

fn malware_text(threat: &str) -> String {
    format!(
        "According to our scanning systems this file may contain a virus of type '{threat}'. \
         You can continue downloading this file at your own risk, but you will have to prove \
         that you're a human first."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ChallengeScript, RecordingSurface, ScriptedChallenge};

    fn config(site_key: &str) -> ViewerConfig {
        ViewerConfig {
            api_endpoint: "https://host/api".into(),
            captcha_site_key: site_key.into(),
            ..ViewerConfig::default()
        }
    }

    fn file(availability: &str, name: &str) -> FileDescriptor {
        FileDescriptor {
            id: "abc".into(),
            size: 1000,
            download_href: Some("/api/file/abc?download".into()),
            availability: availability.into(),
            availability_name: name.into(),
            ..FileDescriptor::default()
        }
    }

    fn gate(
        site_key: &str,
        script: Vec<ChallengeScript>,
    ) -> (AvailabilityGate, Arc<RecordingSurface>, Arc<ScriptedChallenge>) {
        let surface = RecordingSurface::new();
        let provider = ScriptedChallenge::new(script);
        let gate = AvailabilityGate::new(&config(site_key), surface.clone(), provider.clone());
        (gate, surface, provider)
    }

    #[tokio::test]
    async fn available_file_downloads_directly() {
        let (gate, surface, provider) = gate("site-key", vec![]);
        let outcome = gate.request_download(&file("", "")).await.unwrap();

        assert_eq!(outcome, DownloadOutcome::Direct("/api/file/abc?download".into()));
        assert_eq!(surface.navigations(), vec!["/api/file/abc?download".to_string()]);
        assert_eq!(provider.rendered(), 0);
    }

    #[tokio::test]
    async fn disabled_captcha_skips_challenge() {
        for key in ["none", ""] {
            let (gate, surface, provider) = gate(key, vec![]);
            let outcome = gate
                .request_download(&file("file_rate_limited_captcha_required", ""))
                .await
                .unwrap();
            assert!(matches!(outcome, DownloadOutcome::Direct(_)));
            assert_eq!(surface.navigations().len(), 1);
            assert_eq!(provider.rendered(), 0);
        }
    }

    #[tokio::test]
    async fn rate_limited_file_appends_token() {
        let (gate, surface, provider) = gate("site-key", vec![ChallengeScript::Solve("T0K3N")]);
        let outcome = gate
            .request_download(&file("file_rate_limited_captcha_required", ""))
            .await
            .unwrap();

        let expected = "/api/file/abc?download&recaptcha_response=T0K3N".to_string();
        assert_eq!(outcome, DownloadOutcome::Verified(expected.clone()));
        assert_eq!(surface.navigations(), vec![expected]);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].title, RATE_LIMIT_TITLE);
        assert!(requests[0].text.contains("suspicious amount of bandwidth"));
        assert_eq!(requests[0].site_key, "site-key");

        // Modal opens before the download and is dismissed after it.
        let events = surface.events();
        assert!(matches!(events[0], ViewerEvent::ChallengeOpened { .. }));
        assert!(matches!(events[1], ViewerEvent::Navigate { .. }));
        assert_eq!(events[2], ViewerEvent::ChallengeClosed);
    }

    #[tokio::test]
    async fn virus_warning_names_the_threat() {
        let (gate, surface, provider) = gate("site-key", vec![ChallengeScript::Solve("t")]);
        gate.request_download(&file("virus_detected_captcha_required", "Trojan.X"))
            .await
            .unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].title, MALWARE_TITLE);
        assert!(requests[0].text.contains("Trojan.X"));
        match &surface.events()[0] {
            ViewerEvent::ChallengeOpened { text, .. } => assert!(text.contains("Trojan.X")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_status_fails_open() {
        let (gate, surface, provider) = gate("site-key", vec![]);
        let outcome = gate.request_download(&file("something_new", "")).await.unwrap();
        assert!(matches!(outcome, DownloadOutcome::Direct(_)));
        assert_eq!(surface.navigations().len(), 1);
        assert_eq!(provider.rendered(), 0);
    }

    #[tokio::test]
    async fn abandoned_challenge_issues_nothing() {
        let (gate, surface, _) = gate("site-key", vec![ChallengeScript::Abandon]);
        let outcome = gate
            .request_download(&file("file_rate_limited_captcha_required", ""))
            .await
            .unwrap();
        assert_eq!(outcome, DownloadOutcome::Abandoned);
        assert!(surface.navigations().is_empty());
        assert_eq!(surface.events().last(), Some(&ViewerEvent::ChallengeClosed));
    }

    #[tokio::test]
    async fn load_failure_is_reported_and_modal_stays() {
        let (gate, surface, _) = gate("site-key", vec![ChallengeScript::FailToLoad("blocked")]);
        let err = gate
            .request_download(&file("virus_detected_captcha_required", "Eicar"))
            .await
            .unwrap_err();
        assert!(matches!(err, ViewerError::ChallengeLoad(ref r) if r == "blocked"));

        let events = surface.events();
        assert!(surface.navigations().is_empty());
        assert!(events
            .iter()
            .any(|e| matches!(e, ViewerEvent::ChallengeFailed { message } if message.contains("blocked"))));
        assert!(!events.contains(&ViewerEvent::ChallengeClosed));
    }
}
