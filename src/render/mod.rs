//! Reference rendering pipeline that drives the cache orchestrator.
//!
//! The pipeline owns generation and wrapper presentation; every cache decision
//! is delegated to [`crate::cache::Orchestrator`].

mod generator;
mod pipeline;
mod types;

pub use generator::MarkupGenerator;
pub use pipeline::Renderer;
pub use types::{
    CacheSpec, ComponentSpec, GenerationError, Generator, RenderError, RenderReport, RenderTree,
};
