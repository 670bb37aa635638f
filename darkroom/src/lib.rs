pub mod admission;
pub mod domain;
pub mod events;
pub mod planes;
pub mod ports;
pub mod render;

pub use admission::{AdmissionLimiter, AdmissionTicket, DEFAULT_PREVIEW_CONCURRENCY};
pub use domain::{ImageId, Preview, PreviewFormat, StoredObject};
pub use planes::control::PreviewAdmin;
pub use planes::data::{PreviewOperations, PreviewService};
