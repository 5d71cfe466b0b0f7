//! Cross-unit call resolution and structural interface implementation.

pub mod implements;
pub mod resolver;

pub use implements::{ImplementsIndex, build as build_implements_index};
pub use resolver::{ResolveInput, ResolveOutput, resolve};
