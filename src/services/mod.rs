pub mod excel;
pub mod summary;
