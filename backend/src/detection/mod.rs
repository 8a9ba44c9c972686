pub mod classifier;
pub mod resolver;
pub mod retry;
pub mod service;
pub mod verdict;

pub use service::DetectionService;
