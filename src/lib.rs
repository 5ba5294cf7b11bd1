pub mod alias;
pub mod config;
pub mod errors;
pub mod graph;
pub mod linker;
pub mod resolution;
pub mod types;

pub use linker::{convert_types, AnnotationLinker, ConvertedModel, LinkReport};
