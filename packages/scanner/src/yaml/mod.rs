//! YAML output generation for scanned register maps.

mod writer;

pub use writer::{generate_yaml, output_path, save_yaml};
