pub mod anomaly;
pub mod rule;

pub use anomaly::*;
pub use rule::*;
