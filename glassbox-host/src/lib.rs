//! Sandbox host for live previews of generated UI component source.
//!
//! Takes the raw text a generation service returns, runs it through the
//! `glassbox-source` pipeline, executes the resulting document inside a
//! restricted Luau VM, and reports exactly one terminal [`Outcome`] per
//! settled episode. The executed code can neither observe nor harm the
//! host process.

pub mod config;
pub mod context;
pub mod host;
pub mod outcome;
pub mod wire;

pub use config::PreviewConfig;
pub use host::PreviewHost;
pub use outcome::{MountSnapshot, Outcome};
pub use wire::{GenerateResponse, TextGenerateRequest};
