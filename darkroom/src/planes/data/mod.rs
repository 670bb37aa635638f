pub mod operation;
pub mod preview_operations;

pub use operation::PreviewOperations;
pub use preview_operations::PreviewService;
