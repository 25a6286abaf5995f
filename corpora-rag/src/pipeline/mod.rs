//! Ingestion and retrieval pipelines.
//!
//! `intake` handles the synchronous half of ingestion (validate, store,
//! enqueue); `processor` is the worker-side half (extract, chunk, embed,
//! persist); `worker` is the claim/ack loop around the processor; `query`
//! is the retrieval-and-answer pipeline; `builder` is the composition
//! root that wires them from ports and config.

pub mod builder;
pub mod intake;
pub mod processor;
pub mod query;
pub mod worker;

pub use builder::PipelineBuilder;
pub use intake::{DocumentIntake, IntakeRequest};
pub use processor::{IngestProcessor, ProcessOutcome};
pub use query::{Answer, AnswerEvent, AnswerTimings, CancelHandle, QueryOptions, QueryPipeline};
pub use worker::IngestWorker;

pub(crate) use corpora_security::access_control::authorize_workspace as load_workspace_authorized;

/// Queue job name for document ingestion.
pub const INGEST_JOB: &str = "ingest_document";
