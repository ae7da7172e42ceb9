//! Recognition runtime: model lifecycle and the audio entry point.
//!
//! Owns the one live engine, the session controller, and the asset cache,
//! and exposes the operations a UI layer drives: switch model, start/stop
//! recording, feed captured blocks, read the transcript, inspect or clear
//! the cache.
//!
//! Everything mutating takes `&mut self`, so audio blocks, recording
//! toggles, and model switches cannot interleave; the exclusive borrow is
//! held across the switch's await points, which is what makes two engine
//! constructions impossible to race.

use crate::audio::resample;
use crate::cache::fetch::{AssetFetcher, FetchProgress, HttpFetcher};
use crate::cache::{AssetCache, CacheStats};
use crate::engine::{AssetBundle, EngineHost, RecognizerBackend};
use crate::error::{Error, Result};
use crate::models::{self, ModelDescriptor};
use crate::session::{SessionController, TranscriptSnapshot};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base URL model files are fetched under.
    pub asset_base_url: String,
    /// SQLite file backing the asset cache.
    pub cache_db_path: PathBuf,
}

/// Notifications for a UI layer: status line text, download progress,
/// readiness, finalized utterances.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum RuntimeEvent {
    /// Human-readable status; empty clears the status display.
    Status { message: String },
    FetchProgress {
        filename: String,
        received: u64,
        total: Option<u64>,
        /// Clamped to 100 for display; the raw received/total pair can
        /// overshoot when the declared total is a transfer size.
        percentage: f64,
    },
    ModelReady { model_id: String },
    Finalized { text: String },
}

type EventSink = Box<dyn FnMut(RuntimeEvent) + Send>;

pub struct RecognitionRuntime {
    backend: Box<dyn RecognizerBackend>,
    fetcher: Box<dyn AssetFetcher>,
    cache: AssetCache,
    engine: EngineHost,
    controller: Option<SessionController>,
    active_model: Option<&'static ModelDescriptor>,
    recording: bool,
    events: Option<EventSink>,
}

impl RecognitionRuntime {
    pub fn new(config: RuntimeConfig, backend: Box<dyn RecognizerBackend>) -> Self {
        let fetcher = Box::new(HttpFetcher::new(config.asset_base_url.clone()));
        Self::with_fetcher(config, backend, fetcher)
    }

    /// Construct with a custom fetch transport.
    pub fn with_fetcher(
        config: RuntimeConfig,
        backend: Box<dyn RecognizerBackend>,
        fetcher: Box<dyn AssetFetcher>,
    ) -> Self {
        Self {
            backend,
            fetcher,
            cache: AssetCache::new(config.cache_db_path),
            engine: EngineHost::new(),
            controller: None,
            active_model: None,
            recording: false,
            events: None,
        }
    }

    pub fn set_event_sink(&mut self, sink: impl FnMut(RuntimeEvent) + Send + 'static) {
        self.events = Some(Box::new(sink));
    }

    fn emit(&mut self, event: RuntimeEvent) {
        if let Some(sink) = self.events.as_mut() {
            sink(event);
        }
    }

    /// Switch the active model.
    ///
    /// Every required file is resolved (cache first, network second)
    /// before the previous engine is touched, so a failed fetch leaves
    /// the previous model fully usable. A failed construction leaves no
    /// engine at all; recording then refuses to start until a later
    /// switch succeeds.
    pub async fn switch_model(&mut self, model_id: &str) -> Result<()> {
        let descriptor = match models::describe(model_id) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                self.emit(RuntimeEvent::Status {
                    message: format!("Unknown model: {}", model_id),
                });
                return Err(e);
            }
        };

        info!("Switching to model {} ({})", descriptor.id, descriptor.name);
        self.emit(RuntimeEvent::Status {
            message: format!("Loading {}...", descriptor.name),
        });

        let mut assets = AssetBundle::new();
        {
            let events = &mut self.events;
            let cache = &self.cache;
            let fetcher = self.fetcher.as_ref();
            for filename in descriptor.files {
                let remote_path = format!("{}{}", descriptor.remote_dir, filename);
                let mut on_progress = |p: FetchProgress| {
                    if let Some(sink) = events.as_mut() {
                        let percentage = p.display_percentage();
                        sink(RuntimeEvent::FetchProgress {
                            filename: p.filename,
                            received: p.received,
                            total: p.total,
                            percentage,
                        });
                    }
                };
                match cache
                    .get_or_fetch(descriptor.id, filename, &remote_path, fetcher, &mut on_progress)
                    .await
                {
                    Ok(bytes) => {
                        assets.insert((*filename).to_string(), bytes);
                    }
                    Err(e) => {
                        let message = format!("Failed to load model: {}", e);
                        error!("{}", message);
                        if let Some(sink) = events.as_mut() {
                            sink(RuntimeEvent::Status { message });
                        }
                        return Err(e);
                    }
                }
            }
        }

        // All bytes are in hand; only now does the previous engine go away.
        if let Some(controller) = self.controller.as_mut() {
            controller.dispose_session();
        }
        self.engine.dispose();
        self.active_model = None;

        if let Err(e) = self.engine.construct(self.backend.as_ref(), descriptor, &assets) {
            let message = format!("Failed to initialize {}: {}", descriptor.name, e);
            error!("{}", message);
            self.emit(RuntimeEvent::Status { message });
            return Err(e);
        }

        match self.controller.as_mut() {
            Some(controller) => controller.rebind(descriptor),
            None => self.controller = Some(SessionController::new(descriptor)),
        }
        self.active_model = Some(descriptor);

        info!("Model {} ready at {} Hz", descriptor.id, descriptor.sample_rate);
        self.emit(RuntimeEvent::ModelReady {
            model_id: descriptor.id.to_string(),
        });
        self.emit(RuntimeEvent::Status {
            message: String::new(),
        });
        Ok(())
    }

    /// Begin accepting audio blocks. Any stream left over from before a
    /// model switch is discarded first, so a new take always starts with
    /// a fresh stream and fresh leading padding.
    pub fn start_recording(&mut self) -> Result<()> {
        if self.active_model.is_none() || !self.engine.is_constructed() {
            return Err(Error::EngineRuntime("no model loaded".to_string()));
        }
        if let Some(controller) = self.controller.as_mut() {
            controller.dispose_session();
        }
        self.recording = true;
        info!("Recording started");
        Ok(())
    }

    pub fn stop_recording(&mut self) {
        if !self.recording {
            return;
        }
        self.recording = false;
        if let Some(controller) = self.controller.as_mut() {
            controller.dispose_session();
        }
        info!("Recording stopped");
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn active_model(&self) -> Option<&'static ModelDescriptor> {
        self.active_model
    }

    /// Feed one captured block at the device's native rate. Ignored while
    /// not recording.
    ///
    /// Engine failures tear the session down and are reported for
    /// diagnostics, but recording stays on; the next block opens a fresh
    /// stream.
    pub fn process_block(&mut self, samples: &[f32], source_rate: u32) -> Result<()> {
        if !self.recording {
            return Ok(());
        }
        let descriptor = match self.active_model {
            Some(descriptor) => descriptor,
            None => return Ok(()),
        };
        let controller = match self.controller.as_mut() {
            Some(controller) => controller,
            None => return Ok(()),
        };

        let resampled = resample(samples, source_rate, descriptor.sample_rate);
        match controller.process_block(&mut self.engine, &resampled) {
            Ok(Some(text)) => {
                self.emit(RuntimeEvent::Finalized { text });
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                warn!("Dropped audio block: {}", e);
                Err(e)
            }
        }
    }

    pub fn transcript(&self) -> TranscriptSnapshot {
        self.controller
            .as_ref()
            .map(|c| c.snapshot())
            .unwrap_or_default()
    }

    /// Drop the finalized history, as the clear-results control does.
    pub fn clear_transcript(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.clear_finalized();
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) -> Result<usize> {
        self.cache.clear_all()
    }
}
