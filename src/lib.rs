//! Streaming speech recognition with a persistent model asset cache.
//!
//! Captured audio blocks are resampled to the active model's rate, framed
//! to the granularity its engine requires, and driven through a cooperative
//! feed/decode loop; endpoint signals move partial text into finalized
//! history. Model files are fetched over HTTP with progress reporting and
//! cached in a local SQLite store, so a model only downloads once.
//!
//! The inference engine itself is an external capability consumed through
//! the handle-based traits in [`engine`]; this crate supplies everything
//! around it.
//!
//! # Example
//!
//! ```no_run
//! use streamscribe::{RecognitionRuntime, RuntimeConfig};
//! # use streamscribe::engine::{AssetBundle, RecognizerBackend, RecognizerEngine};
//! # use streamscribe::ModelDescriptor;
//! # struct MyBackend;
//! # impl RecognizerBackend for MyBackend {
//! #     fn construct(
//! #         &self,
//! #         _descriptor: &ModelDescriptor,
//! #         _assets: &AssetBundle,
//! #     ) -> anyhow::Result<Box<dyn RecognizerEngine>> {
//! #         unimplemented!()
//! #     }
//! # }
//!
//! # async fn run() -> streamscribe::Result<()> {
//! let config = RuntimeConfig {
//!     asset_base_url: "https://models.example.com".to_string(),
//!     cache_db_path: "assets.sqlite".into(),
//! };
//! let mut runtime = RecognitionRuntime::new(config, Box::new(MyBackend));
//!
//! runtime.switch_model("vosk").await?;
//! runtime.start_recording()?;
//! // per capture callback:
//! runtime.process_block(&[0.0f32; 4096], 48000)?;
//! let snapshot = runtime.transcript();
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod cache;
pub mod engine;
pub mod error;
pub mod framing;
pub mod models;
pub mod runtime;
pub mod session;

pub use audio::resample;
pub use cache::CacheStats;
pub use error::{Error, Result};
pub use models::{describe, EngineLayout, FramingPolicy, ModelDescriptor, SUPPORTED_MODELS};
pub use runtime::{RecognitionRuntime, RuntimeConfig, RuntimeEvent};
pub use session::TranscriptSnapshot;
