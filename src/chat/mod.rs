pub mod agent;
pub mod caller;
pub mod fallback;
