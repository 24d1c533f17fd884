//! Pipeline services
//!
//! Leaf-first: work queue and TTL cache, upstream clients, token manager,
//! playlist resolver, the two artifact stages, and the orchestrator.

pub mod artifact_store;
pub mod code_image;
pub mod model_generator;
pub mod pipeline;
pub mod playlist_resolver;
pub mod token_manager;
pub mod ttl_cache;
pub mod upstream;
pub mod work_queue;

pub use artifact_store::ArtifactStore;
pub use code_image::CodeImageStage;
pub use model_generator::{ModelConverter, ModelStage, OpenScadConverter};
pub use pipeline::{Pipeline, QueueDepths};
pub use playlist_resolver::PlaylistResolver;
pub use token_manager::TokenManager;
pub use upstream::{CodeImageSource, PlaylistSource, TokenSource};
