//! Adapter around the opaque streaming recognizer.
//!
//! The inference engine itself is an external, handle-based capability; it
//! is consumed through the `Recognizer*` traits and never reimplemented
//! here. The adapter's job is lifecycle safety: exactly one live engine,
//! idempotent release, and mapping backend failures onto the crate's error
//! taxonomy.

use crate::error::{Error, Result};
use crate::models::ModelDescriptor;
use log::debug;
use std::collections::HashMap;

/// Resolved asset bytes, keyed by filename.
pub type AssetBundle = HashMap<String, Vec<u8>>;

/// One open decode stream of a constructed recognizer.
///
/// The engine's decode contract is cooperative: after every feed the caller
/// must step the decoder while `is_ready` reports buffered frames. Each
/// `decode_step` consumes exactly one frame's worth of features.
pub trait RecognizerStream: Send {
    fn accept_waveform(&mut self, sample_rate: u32, samples: &[f32]) -> anyhow::Result<()>;
    fn is_ready(&self) -> bool;
    fn decode_step(&mut self) -> anyhow::Result<()>;
    /// True once the engine's endpoint detector has fired since the last
    /// reset.
    fn is_endpoint(&self) -> bool;
    /// Best current transcription of the audio since the last reset.
    fn partial_text(&self) -> String;
    /// Clear decode state but keep the stream handle reusable.
    fn reset(&mut self) -> anyhow::Result<()>;
}

pub trait RecognizerEngine: Send {
    fn new_stream(&mut self) -> anyhow::Result<Box<dyn RecognizerStream>>;
}

/// Constructs engines from a descriptor and its resolved asset bytes.
pub trait RecognizerBackend: Send {
    fn construct(
        &self,
        descriptor: &ModelDescriptor,
        assets: &AssetBundle,
    ) -> anyhow::Result<Box<dyn RecognizerEngine>>;
}

/// Owns the single live engine instance.
#[derive(Default)]
pub struct EngineHost {
    engine: Option<Box<dyn RecognizerEngine>>,
}

impl EngineHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_constructed(&self) -> bool {
        self.engine.is_some()
    }

    /// Bind a new engine to the given files. Any previous engine is
    /// released first; on failure the host is left with no engine.
    pub fn construct(
        &mut self,
        backend: &dyn RecognizerBackend,
        descriptor: &ModelDescriptor,
        assets: &AssetBundle,
    ) -> Result<()> {
        self.dispose();
        let engine = backend
            .construct(descriptor, assets)
            .map_err(|e| Error::EngineConstruction(format!("{}: {}", descriptor.id, e)))?;
        self.engine = Some(engine);
        debug!("Recognizer constructed for model {}", descriptor.id);
        Ok(())
    }

    pub fn create_session(&mut self) -> Result<RecognitionSession> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| Error::EngineRuntime("no recognizer constructed".to_string()))?;
        let stream = engine
            .new_stream()
            .map_err(|e| Error::EngineRuntime(format!("failed to open stream: {}", e)))?;
        debug!("Recognizer stream created");
        Ok(RecognitionSession {
            stream: Some(stream),
        })
    }

    /// Release the engine. Safe to call repeatedly or before any engine was
    /// constructed; teardown races with interrupted loads are expected.
    pub fn dispose(&mut self) {
        if self.engine.take().is_some() {
            debug!("Recognizer released");
        }
    }
}

/// Streaming decode state for one continuous utterance-tracking pass.
pub struct RecognitionSession {
    stream: Option<Box<dyn RecognizerStream>>,
}

impl std::fmt::Debug for RecognitionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionSession")
            .field("stream", &self.stream.is_some())
            .finish()
    }
}

impl RecognitionSession {
    fn stream_mut(&mut self) -> Result<&mut (dyn RecognizerStream + 'static)> {
        self.stream
            .as_deref_mut()
            .ok_or_else(|| Error::EngineRuntime("stream already released".to_string()))
    }

    pub fn accept_waveform(&mut self, sample_rate: u32, samples: &[f32]) -> Result<()> {
        self.stream_mut()?
            .accept_waveform(sample_rate, samples)
            .map_err(|e| Error::EngineRuntime(format!("accept_waveform: {}", e)))
    }

    /// Step the decoder until no buffered frames remain. Returns the number
    /// of steps taken.
    pub fn drain_decode(&mut self) -> Result<usize> {
        let stream = self.stream_mut()?;
        let mut steps = 0;
        while stream.is_ready() {
            stream
                .decode_step()
                .map_err(|e| Error::EngineRuntime(format!("decode_step: {}", e)))?;
            steps += 1;
        }
        Ok(steps)
    }

    pub fn is_endpoint(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_endpoint())
    }

    pub fn partial_text(&self) -> String {
        self.stream
            .as_ref()
            .map(|s| s.partial_text())
            .unwrap_or_default()
    }

    pub fn reset(&mut self) -> Result<()> {
        self.stream_mut()?
            .reset()
            .map_err(|e| Error::EngineRuntime(format!("reset: {}", e)))
    }

    /// Release the stream. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.stream.take().is_some() {
            debug!("Recognizer stream released");
        }
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! Scripted engine used by the unit tests in this crate.

    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct ScriptState {
        /// Length of every accepted waveform, in order.
        pub accepted: Vec<usize>,
        /// Frames buffered by feeds and not yet consumed by decode steps.
        pub pending_frames: usize,
        pub decode_steps: usize,
        /// Number of endpoint queries so far.
        pub endpoint_polls: usize,
        /// 1-based endpoint query index that reports an endpoint.
        pub endpoint_on_poll: Option<usize>,
        /// Text reported by `partial_text` until the next reset.
        pub partial: String,
        pub resets: usize,
        pub streams_created: usize,
        /// When set, the next `accept_waveform` fails.
        pub fail_next_accept: bool,
    }

    pub struct ScriptedStream {
        state: Arc<Mutex<ScriptState>>,
    }

    impl RecognizerStream for ScriptedStream {
        fn accept_waveform(&mut self, _sample_rate: u32, samples: &[f32]) -> anyhow::Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.fail_next_accept {
                state.fail_next_accept = false;
                anyhow::bail!("scripted accept failure");
            }
            state.accepted.push(samples.len());
            state.pending_frames += 1;
            Ok(())
        }

        fn is_ready(&self) -> bool {
            self.state.lock().unwrap().pending_frames > 0
        }

        fn decode_step(&mut self) -> anyhow::Result<()> {
            let mut state = self.state.lock().unwrap();
            state.pending_frames = state.pending_frames.saturating_sub(1);
            state.decode_steps += 1;
            Ok(())
        }

        fn is_endpoint(&self) -> bool {
            let mut state = self.state.lock().unwrap();
            state.endpoint_polls += 1;
            state.endpoint_on_poll == Some(state.endpoint_polls)
        }

        fn partial_text(&self) -> String {
            self.state.lock().unwrap().partial.clone()
        }

        fn reset(&mut self) -> anyhow::Result<()> {
            let mut state = self.state.lock().unwrap();
            state.resets += 1;
            state.partial.clear();
            state.pending_frames = 0;
            Ok(())
        }
    }

    pub struct ScriptedEngine {
        state: Arc<Mutex<ScriptState>>,
    }

    impl RecognizerEngine for ScriptedEngine {
        fn new_stream(&mut self) -> anyhow::Result<Box<dyn RecognizerStream>> {
            self.state.lock().unwrap().streams_created += 1;
            Ok(Box::new(ScriptedStream {
                state: Arc::clone(&self.state),
            }))
        }
    }

    pub struct ScriptedBackend {
        pub state: Arc<Mutex<ScriptState>>,
        pub constructed: Arc<Mutex<usize>>,
        pub fail_construct: bool,
    }

    impl ScriptedBackend {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(ScriptState::default())),
                constructed: Arc::new(Mutex::new(0)),
                fail_construct: false,
            }
        }
    }

    impl RecognizerBackend for ScriptedBackend {
        fn construct(
            &self,
            _descriptor: &ModelDescriptor,
            _assets: &AssetBundle,
        ) -> anyhow::Result<Box<dyn RecognizerEngine>> {
            if self.fail_construct {
                anyhow::bail!("scripted construction failure");
            }
            *self.constructed.lock().unwrap() += 1;
            Ok(Box::new(ScriptedEngine {
                state: Arc::clone(&self.state),
            }))
        }
    }
}
