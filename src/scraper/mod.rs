pub mod exa;
pub mod job;
