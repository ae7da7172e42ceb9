//! Per-model audio framing.
//!
//! Different model families impose different minimum-granularity contracts
//! on their streaming input. Centralizing the chunking policy here keeps
//! the session controller model-agnostic: it hands every resampled block
//! to the buffer and the buffer decides what the recognizer actually sees.

use crate::error::Result;
use crate::models::{FramingPolicy, ModelDescriptor};

/// Seconds of audio per fixed window, for models that require exact
/// fixed-size chunks.
const FIXED_WINDOW_SECS: f64 = 0.3;

pub struct FramingBuffer {
    sample_rate: u32,
    /// `None` for passthrough models; otherwise the exact window size in
    /// samples.
    chunk_size: Option<usize>,
    backlog: Vec<f32>,
}

impl FramingBuffer {
    pub fn for_model(descriptor: &ModelDescriptor) -> Self {
        let chunk_size = match descriptor.framing {
            FramingPolicy::StreamingPassthrough => None,
            FramingPolicy::FixedWindowCtc => {
                Some((descriptor.sample_rate as f64 * FIXED_WINDOW_SECS).round() as usize)
            }
        };
        Self {
            sample_rate: descriptor.sample_rate,
            chunk_size,
            backlog: Vec::new(),
        }
    }

    pub fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Prepare for a fresh stream: drop any buffered samples and, for
    /// fixed-window models, feed one full window of silence as leading
    /// padding. Must be called when a session is created and again after
    /// every stream reset.
    pub fn prime(&mut self, mut feed: impl FnMut(&[f32]) -> Result<()>) -> Result<()> {
        self.backlog.clear();
        if let Some(chunk) = self.chunk_size {
            let silence = vec![0.0f32; chunk];
            feed(&silence)?;
        }
        Ok(())
    }

    /// Route one resampled block to the recognizer via `feed`.
    ///
    /// Passthrough models get the block unchanged in a single call.
    /// Fixed-window models accumulate a backlog and emit exact
    /// `chunk_size` slices from the front while enough samples remain.
    pub fn push(&mut self, samples: &[f32], mut feed: impl FnMut(&[f32]) -> Result<()>) -> Result<()> {
        match self.chunk_size {
            None => feed(samples),
            Some(chunk) => {
                self.backlog.extend_from_slice(samples);
                while self.backlog.len() >= chunk {
                    let window: Vec<f32> = self.backlog.drain(..chunk).collect();
                    feed(&window)?;
                }
                Ok(())
            }
        }
    }
}
