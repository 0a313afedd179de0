pub mod activation;
pub mod limits;
pub mod notified;
pub mod usage;

pub use activation::ActivationState;
pub use limits::Limits;
pub use notified::NotifiedToday;
pub use usage::UsageToday;
