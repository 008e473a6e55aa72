pub mod engine;
pub mod review;
