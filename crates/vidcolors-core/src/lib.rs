pub mod aggregate;
pub mod color;
pub mod error;
pub mod pipeline;
pub mod sampler;
pub mod video;

pub use error::{Error, Result};
