pub use gameverse_core::model::{ParticipantId, RoomId};

pub mod model {
    pub use gameverse_core::model::*;
}

#[cfg(feature = "mesh")]
pub mod mesh {
    pub use gameverse_mesh::*;
}
