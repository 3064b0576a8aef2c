pub mod builders;
pub mod providers;
pub mod strategies;

pub use builders::*;
pub use providers::*;
