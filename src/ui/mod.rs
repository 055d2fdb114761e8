//! Terminal output

mod progress;

pub use progress::{format_device_banner, format_summary, Reporter};
