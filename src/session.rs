//! Call session owner
//!
//! Wires the decision engine and the encoder manager to one call: registers
//! the transport, starts monitoring on connect, relays engine actions to the
//! encoder or transport, and tears everything down at call end.

use crate::config::{CopilotConfig, EncoderSettings};
use crate::encoder::HardwareEncoderManager;
use crate::quality::{CallCopilot, NetworkProbe};
use crate::transport::{ConnectionRegistry, Transport};
use crate::types::{CopilotAction, NetworkAssessment};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Handles the relay acts on
struct SessionLinks {
    settings: EncoderSettings,
    encoder: Mutex<Option<Arc<HardwareEncoderManager>>>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    audio_only: AtomicBool,
}

impl SessionLinks {
    async fn apply(&self, action: &CopilotAction) {
        match action {
            CopilotAction::ReduceBitrate { .. } => {
                let Some(encoder) = crate::lock(&self.encoder).clone() else {
                    log::debug!("No encoder attached, bitrate reduction skipped");
                    return;
                };
                let current = encoder.target_bitrate();
                let scaled = current as f64 * self.settings.bitrate_reduction_factor;
                let reduced = (scaled.round() as u32).max(self.settings.min_bitrate_bps);
                if reduced < current {
                    encoder.update_bitrate(reduced);
                } else {
                    log::debug!("Bitrate already at floor ({} bps)", current);
                }
            }
            CopilotAction::SwitchAudioOnly { .. } => {
                if !self.audio_only.swap(true, Ordering::SeqCst) {
                    log::info!("Switching call to audio only");
                }
                let encoder = crate::lock(&self.encoder).clone();
                if let Some(encoder) = encoder {
                    encoder.stop().await;
                }
            }
            CopilotAction::EnableJitterBuffer => {
                let transport = crate::lock(&self.transport).clone();
                if let Some(transport) = transport {
                    if let Err(e) = transport.enable_jitter_buffer().await {
                        log::warn!("Jitter buffer request failed on {}: {}", transport.id(), e);
                    }
                }
            }
            CopilotAction::IceRestart { .. } => {
                let transport = crate::lock(&self.transport).clone();
                if let Some(transport) = transport {
                    if let Err(e) = transport.restart_ice().await {
                        log::warn!("ICE restart failed on {}: {}", transport.id(), e);
                    }
                }
            }
            CopilotAction::ShowHint { .. } | CopilotAction::None => {}
        }
    }
}

/// Forwards broadcast actions to the session links until aborted
struct ActionRelay;

impl ActionRelay {
    fn spawn(
        mut actions: broadcast::Receiver<CopilotAction>,
        links: Arc<SessionLinks>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match actions.recv().await {
                    Ok(action) => links.apply(&action).await,
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Action relay lagged, {} actions skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// One call's worth of copilot wiring
pub struct CallSession {
    id: Uuid,
    config: CopilotConfig,
    copilot: CallCopilot,
    registry: Arc<ConnectionRegistry>,
    links: Arc<SessionLinks>,
    relay: Mutex<Option<JoinHandle<()>>>,
}

impl CallSession {
    pub fn new(config: CopilotConfig, registry: Arc<ConnectionRegistry>) -> Self {
        let copilot = CallCopilot::new(&config.monitor);
        Self::with_copilot(config, registry, copilot)
    }

    /// Use an existing engine, e.g. one driven by a manual clock
    pub fn with_copilot(
        config: CopilotConfig,
        registry: Arc<ConnectionRegistry>,
        copilot: CallCopilot,
    ) -> Self {
        let links = Arc::new(SessionLinks {
            settings: config.encoder.clone(),
            encoder: Mutex::new(None),
            transport: Mutex::new(None),
            audio_only: AtomicBool::new(false),
        });

        Self {
            id: Uuid::new_v4(),
            config,
            copilot,
            registry,
            links,
            relay: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn copilot(&self) -> &CallCopilot {
        &self.copilot
    }

    /// Fresh engine state plus the pre-call route recommendation
    pub async fn prepare(&self, probe: &dyn NetworkProbe) -> NetworkAssessment {
        self.copilot.reset();
        self.links.audio_only.store(false, Ordering::SeqCst);
        let assessment = self
            .copilot
            .analyze_network_quality(probe, self.config.probe.timeout())
            .await;
        log::info!(
            "Session {} prepared: {:?} -> {}",
            self.id,
            assessment.classification,
            assessment.route
        );
        assessment
    }

    /// Hand the outgoing video encoder to the session for action relay
    pub fn attach_encoder(&self, encoder: Arc<HardwareEncoderManager>) {
        *crate::lock(&self.links.encoder) = Some(encoder);
    }

    pub fn encoder(&self) -> Option<Arc<HardwareEncoderManager>> {
        crate::lock(&self.links.encoder).clone()
    }

    /// Register the connected transport and start monitoring it.
    ///
    /// A reconnect under a new id unregisters the transport it replaces.
    pub async fn on_connected(&self, transport: Arc<dyn Transport>) -> bool {
        let previous = crate::lock(&self.links.transport).replace(Arc::clone(&transport));
        if let Some(previous) = previous {
            if previous.id() != transport.id() {
                log::info!(
                    "Session {} replacing transport {} with {}",
                    self.id,
                    previous.id(),
                    transport.id()
                );
                self.registry.unregister(previous.id()).await;
            }
        }
        self.registry.register(Arc::clone(&transport)).await;

        {
            let mut relay = crate::lock(&self.relay);
            if relay.is_none() {
                *relay = Some(ActionRelay::spawn(
                    self.copilot.subscribe_actions(),
                    Arc::clone(&self.links),
                ));
            }
        }

        let started = self.copilot.start_monitoring(transport);
        if started {
            log::info!("Session {} monitoring started", self.id);
        }
        started
    }

    /// Apply one action directly, bypassing the relay
    pub async fn apply_action(&self, action: &CopilotAction) {
        self.links.apply(action).await;
    }

    pub fn is_audio_only(&self) -> bool {
        self.links.audio_only.load(Ordering::SeqCst)
    }

    /// Stop everything the session started. Safe to call repeatedly.
    pub async fn teardown(&self) {
        self.copilot.stop_monitoring();

        let relay = crate::lock(&self.relay).take();
        if let Some(relay) = relay {
            relay.abort();
            let _ = relay.await;
        }

        let encoder = crate::lock(&self.links.encoder).take();
        if let Some(encoder) = encoder {
            encoder.stop().await;
        }

        let transport = crate::lock(&self.links.transport).take();
        if let Some(transport) = transport {
            self.registry.unregister(transport.id()).await;
        }

        self.copilot.reset();
        log::info!("Session {} torn down", self.id);
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        if let Some(relay) = crate::lock(&self.relay).take() {
            relay.abort();
        }
    }
}
