mod headers;
pub mod progress;
mod size;
mod time;

pub use self::headers::parse_headers;
pub use self::size::format_bytes;
pub use self::time::format_eta;
