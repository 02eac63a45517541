pub mod cache;

pub use cache::ConsultationCache;
