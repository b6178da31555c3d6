mod string;

pub use string::{base_name, is_native_library_entry};
