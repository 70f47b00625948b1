pub mod error;
pub mod shape;
pub mod wrapper;

pub use error::*;
pub use shape::*;
pub use wrapper::*;
