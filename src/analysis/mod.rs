pub mod keywords;
pub mod requirements;
