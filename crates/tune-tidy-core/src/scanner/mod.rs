mod walk;

pub use walk::{audio_format, compile_patterns, discover_audio_files, SUPPORTED_EXTENSIONS};
