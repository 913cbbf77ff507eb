pub mod build;
pub mod images;
