pub mod document;
pub mod rebuild;
pub mod remap;
pub mod runs;
