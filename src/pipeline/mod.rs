//! Admission, pacing and overload detection between the transport and the
//! widgets

pub mod cards;
pub mod comments;
pub mod density;
pub mod processed;

pub use cards::{CardQueueConfig, TransientCardQueue};
pub use comments::{CommentQueueConfig, CommentQueueManager};
pub use density::{DensityConfig, DensityMonitor, DensityProfile};
pub use processed::{RotatingIdSet, PROCESSED_ID_CAPACITY};
