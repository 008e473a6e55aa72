pub mod cli;
pub mod config;
pub mod log;
pub mod response;
pub mod review;
pub mod text;

#[cfg(test)]
pub mod testing;
