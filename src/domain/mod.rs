//! Domain layer types: components and their render output.

pub mod component;
pub mod output;

pub use component::Component;
pub use output::{Fragment, Node, RenderOutput};
