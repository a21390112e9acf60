pub mod docs;
pub mod store;

pub use docs::VENUE_MAP_LINK;
pub use store::{KnowledgeDocument, KnowledgeStore};
