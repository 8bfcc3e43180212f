pub mod boost;
pub mod payment;
pub mod story;
pub mod vote;

pub use boost::*;
pub use payment::*;
pub use story::*;
pub use vote::*;
