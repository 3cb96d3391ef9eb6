pub mod catalog;
pub mod pipeline;
pub mod queue;

pub use catalog::{CatalogSource, DiscoverQuery, TmdbCatalog};
pub use queue::{QueueSettings, QueueStatus, RecommendationQueue};
