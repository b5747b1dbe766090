pub mod types;

pub use types::{FictionFlag, Record, normalize_media};
