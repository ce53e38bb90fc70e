pub mod paths;
pub mod pattern;
pub mod store;
