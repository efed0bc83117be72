pub mod chrome;
pub mod toolbar;
