pub use super::anime::Entity as Anime;
pub use super::streaming_links::Entity as StreamingLinks;
