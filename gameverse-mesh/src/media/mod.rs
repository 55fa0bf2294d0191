mod local_media;
mod media_capture;

pub use local_media::*;
pub use media_capture::*;
