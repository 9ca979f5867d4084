use async_trait::async_trait;
use huddle_client::{LinkEvent, MediaLink, MediaSource, MediaTransport, TransportError};
use huddle_core::SessionId;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};

/// Test-side view of one fake link.
#[derive(Clone)]
pub struct FakeLinkTap {
    calls: Arc<Mutex<Vec<String>>>,
    events: mpsc::UnboundedSender<LinkEvent>,
    closed: Arc<AtomicBool>,
}

impl FakeLinkTap {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pretends the media transport reported something.
    pub fn emit(&self, event: LinkEvent) {
        let _ = self.events.send(event);
    }
}

#[derive(Default)]
struct FakeBehavior {
    /// Report `Connected` the way ICE would: the offerer once it applies the
    /// answer, the answerer once the offerer's first candidate reaches it.
    auto_connect: bool,
    /// `create_offer` blocks until `release_offers`.
    hold_offers: AtomicBool,
    failing_offers: Mutex<HashSet<SessionId>>,
}

/// In-memory [`MediaTransport`] that records every call.
#[derive(Clone, Default)]
pub struct FakeTransport {
    behavior: Arc<FakeBehavior>,
    gate: Arc<Notify>,
    taps: Arc<Mutex<HashMap<SessionId, FakeLinkTap>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links connect on their own after the first offer/answer round. The
    /// answering side lags until a remote candidate arrives.
    pub fn auto_connecting() -> Self {
        Self {
            behavior: Arc::new(FakeBehavior {
                auto_connect: true,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn hold_offers(&self) {
        self.behavior.hold_offers.store(true, Ordering::SeqCst);
    }

    pub fn release_offers(&self) {
        self.behavior.hold_offers.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    pub fn fail_offers_to(&self, remote: SessionId) {
        self.behavior.failing_offers.lock().unwrap().insert(remote);
    }

    pub fn tap(&self, remote: &SessionId) -> Option<FakeLinkTap> {
        self.taps.lock().unwrap().get(remote).cloned()
    }

    pub fn opened(&self) -> usize {
        self.taps.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaTransport for FakeTransport {
    async fn open_link(
        &self,
        remote: SessionId,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Result<Box<dyn MediaLink>, TransportError> {
        let tap = FakeLinkTap {
            calls: Arc::new(Mutex::new(Vec::new())),
            events,
            closed: Arc::new(AtomicBool::new(false)),
        };
        self.taps.lock().unwrap().insert(remote, tap.clone());

        Ok(Box::new(FakeLink {
            remote,
            tap,
            behavior: self.behavior.clone(),
            gate: self.gate.clone(),
            answered: AtomicBool::new(false),
            announced: AtomicBool::new(false),
        }))
    }
}

pub struct FakeLink {
    remote: SessionId,
    tap: FakeLinkTap,
    behavior: Arc<FakeBehavior>,
    gate: Arc<Notify>,
    answered: AtomicBool,
    /// Candidate and `Connected` go out once per link.
    announced: AtomicBool,
}

impl FakeLink {
    fn record(&self, call: impl Into<String>) {
        self.tap.calls.lock().unwrap().push(call.into());
    }

    fn connect_if_auto(&self) {
        if self.behavior.auto_connect && !self.announced.swap(true, Ordering::SeqCst) {
            self.tap
                .emit(LinkEvent::LocalCandidate(json!({"candidate": "fake host"})));
            self.tap.emit(LinkEvent::Connected);
        }
    }
}

#[async_trait]
impl MediaLink for FakeLink {
    async fn create_offer(&self) -> Result<Value, TransportError> {
        self.record("create_offer");

        if self.behavior.failing_offers.lock().unwrap().contains(&self.remote) {
            return Err(TransportError::Other("scripted offer failure".into()));
        }
        while self.behavior.hold_offers.load(Ordering::SeqCst) {
            let released = self.gate.notified();
            if !self.behavior.hold_offers.load(Ordering::SeqCst) {
                break;
            }
            released.await;
        }

        Ok(json!({"type": "offer", "sdp": format!("fake-offer-{}", self.remote)}))
    }

    async fn apply_remote_description(&self, description: Value) -> Result<(), TransportError> {
        let kind = description["type"].as_str().unwrap_or("?").to_owned();
        self.record(format!("remote:{}", kind));
        if kind == "answer" {
            self.connect_if_auto();
        }
        Ok(())
    }

    async fn create_answer(&self) -> Result<Value, TransportError> {
        self.record("create_answer");
        self.answered.store(true, Ordering::SeqCst);
        Ok(json!({"type": "answer", "sdp": format!("fake-answer-{}", self.remote)}))
    }

    async fn add_remote_candidate(&self, candidate: Value) -> Result<(), TransportError> {
        let label = match candidate.get("n") {
            Some(n) => n.to_string(),
            None => candidate["candidate"].as_str().unwrap_or("?").to_owned(),
        };
        self.record(format!("candidate:{}", label));
        if self.answered.load(Ordering::SeqCst) {
            self.connect_if_auto();
        }
        Ok(())
    }

    async fn set_local_media(&self, source: MediaSource) -> Result<(), TransportError> {
        self.record(format!("media:{}", source));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.record("close");
        self.tap.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
