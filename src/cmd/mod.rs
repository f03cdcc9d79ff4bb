pub mod average;
pub mod table;
pub mod version;
