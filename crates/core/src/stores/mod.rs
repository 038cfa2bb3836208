pub mod json_dir;
pub mod memory;

pub use json_dir::JsonDirStore;
pub use memory::InMemoryStore;
