mod cache;
mod entry;

pub use cache::{Cache, OutOfMemory};
