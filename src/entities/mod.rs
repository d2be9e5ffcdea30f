pub mod prelude;

pub mod anime;
pub mod streaming_links;
