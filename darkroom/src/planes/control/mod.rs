pub mod admin_operations;
pub mod operation;

pub use operation::PreviewAdmin;
