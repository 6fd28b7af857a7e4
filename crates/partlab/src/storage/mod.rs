pub mod filesystem;

pub use filesystem::ModelStore;
