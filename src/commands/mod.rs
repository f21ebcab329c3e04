pub mod batch;
pub mod process;
pub mod tools;
