//! Render Mermaid-style flowcharts to self-contained SVG.
//!
//! [`mermaid::render_diagram`] is the engine entry point; it never fails and
//! degrades to placeholder documents. [`host`] finds diagram blocks in HTML
//! and Markdown documents and inlines the rendered SVG in their place.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod host;
pub mod mermaid;
pub mod xml;

pub use error::FlowsvgError;
