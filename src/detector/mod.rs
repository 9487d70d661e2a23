pub mod features;
pub mod patterns;
pub mod summary;

pub use features::extract_features;
pub use patterns::detect;
pub use summary::summarize;
