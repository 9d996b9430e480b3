pub mod entities;
pub mod ports;
pub mod value_objects;

pub use cascade_core::{CascadeError, CascadeResult, ExtractionError};
pub use entities::*;
pub use ports::*;
pub use value_objects::*;
