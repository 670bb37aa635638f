pub mod events;
pub mod health;
pub mod previews;

pub use events::stream_events;
pub use health::health_check;
pub use previews::{
    clear_previews, delete_image, get_preview, invalidate_preview, preview_stats, put_image,
};
