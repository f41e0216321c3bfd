pub mod engine;
pub mod registry;
pub mod windows;

pub use engine::*;
pub use registry::*;
pub use windows::*;
