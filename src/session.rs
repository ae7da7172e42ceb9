//! Per-block drive of the recognizer stream.
//!
//! The controller owns the live stream, the framing buffer, and the
//! transcript. Every captured block runs the same loop: feed through the
//! framing policy, drain the decoder, read the endpoint flag and partial
//! text, then finalize the in-flight utterance if an endpoint fired.

use crate::engine::{EngineHost, RecognitionSession};
use crate::error::Result;
use crate::framing::FramingBuffer;
use crate::models::ModelDescriptor;
use log::{debug, info, warn};
use serde::Serialize;

/// Finalized utterances plus the current revisable one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptSnapshot {
    pub finalized: Vec<String>,
    pub in_flight: String,
}

impl TranscriptSnapshot {
    /// Render the transcript one numbered line per utterance, the
    /// in-flight text last. Empty utterances are skipped.
    pub fn render_numbered(&self) -> String {
        let mut out = String::new();
        let mut index = 0;
        for line in &self.finalized {
            if line.is_empty() {
                continue;
            }
            out.push_str(&format!("{}: {}\n", index, line));
            index += 1;
        }
        if !self.in_flight.is_empty() {
            out.push_str(&format!("{}: {}\n", index, self.in_flight));
        }
        out
    }
}

#[derive(Default)]
struct TranscriptState {
    finalized: Vec<String>,
    in_flight: String,
}

impl TranscriptState {
    /// Replace (never append to) the in-flight text with the latest
    /// non-empty partial, when it changed.
    fn update_partial(&mut self, text: &str) {
        if !text.is_empty() && self.in_flight != text {
            debug!("Partial result: {}", text);
            self.in_flight = text.to_string();
        }
    }

    /// Move a non-empty in-flight utterance into the finalized list.
    fn finalize(&mut self) -> Option<String> {
        if self.in_flight.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.in_flight);
        info!("Finalized: {}", text);
        self.finalized.push(text.clone());
        Some(text)
    }

    fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            finalized: self.finalized.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

pub struct SessionController {
    session: Option<RecognitionSession>,
    framing: FramingBuffer,
    transcript: TranscriptState,
    sample_rate: u32,
    tail_padded_flush: bool,
}

impl SessionController {
    pub fn new(descriptor: &ModelDescriptor) -> Self {
        Self {
            session: None,
            framing: FramingBuffer::for_model(descriptor),
            transcript: TranscriptState::default(),
            sample_rate: descriptor.sample_rate,
            tail_padded_flush: descriptor.tail_padded_flush,
        }
    }

    /// Run one resampled block through the pipeline. Returns the utterance
    /// finalized by this block, if any.
    ///
    /// A failing feed/decode/reset call tears the session down; the next
    /// block recreates it lazily, so one bad block never ends a recording.
    pub fn process_block(
        &mut self,
        engine: &mut EngineHost,
        samples: &[f32],
    ) -> Result<Option<String>> {
        let outcome = self.drive_block(engine, samples);
        if outcome.is_err() {
            warn!("Recognition step failed, discarding session");
            self.dispose_session();
        }
        outcome
    }

    fn drive_block(
        &mut self,
        engine: &mut EngineHost,
        samples: &[f32],
    ) -> Result<Option<String>> {
        let rate = self.sample_rate;

        if self.session.is_none() {
            let mut session = engine.create_session()?;
            self.framing
                .prime(|chunk| session.accept_waveform(rate, chunk))?;
            self.session = Some(session);
        }
        let session = self.session.as_mut().expect("session created above");

        self.framing
            .push(samples, |chunk| session.accept_waveform(rate, chunk))?;
        session.drain_decode()?;

        let hit_endpoint = session.is_endpoint();
        let mut text = session.partial_text();

        if self.tail_padded_flush {
            // The encoder stage holds back trailing context; a second of
            // silence forces it out before the partial is trusted.
            let tail = vec![0.0f32; rate as usize];
            session.accept_waveform(rate, &tail)?;
            session.drain_decode()?;
            text = session.partial_text();
        }

        self.transcript.update_partial(&text);

        let mut finalized = None;
        if hit_endpoint {
            finalized = self.transcript.finalize();
            session.reset()?;
            self.framing
                .prime(|chunk| session.accept_waveform(rate, chunk))?;
        }
        Ok(finalized)
    }

    /// Release the stream, if any. The next block recreates it.
    pub fn dispose_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.dispose();
        }
    }

    /// Switch the controller to a new model: the stream and any buffered
    /// or in-flight audio state belong to the old engine and are dropped;
    /// finalized history is kept.
    pub fn rebind(&mut self, descriptor: &ModelDescriptor) {
        self.dispose_session();
        self.framing = FramingBuffer::for_model(descriptor);
        self.sample_rate = descriptor.sample_rate;
        self.tail_padded_flush = descriptor.tail_padded_flush;
        self.transcript.in_flight.clear();
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.transcript.snapshot()
    }

    /// Drop the finalized history. The in-flight text stays; it is still
    /// owned by the live utterance.
    pub fn clear_finalized(&mut self) {
        self.transcript.finalized.clear();
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }
}
