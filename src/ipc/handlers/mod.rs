pub mod cgpa;
pub mod core;
pub mod grading;
pub mod marks;
pub mod records;
pub mod reports;
