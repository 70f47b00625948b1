pub mod artifact;
pub mod backend;
pub mod nested;
pub mod spec;
pub mod tensor;

pub use artifact::*;
pub use backend::*;
pub use nested::*;
pub use spec::*;
pub use tensor::*;
