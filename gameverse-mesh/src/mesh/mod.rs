mod mesh_command;
mod mesh_coordinator;
mod mesh_event;
mod mesh_handle;
mod roster;

pub use mesh_command::{MESH_COMMAND_CAPACITY, MeshCommand};
pub use mesh_coordinator::MeshCoordinator;
pub use mesh_event::{MeshEvent, MeshStatus};
pub use mesh_handle::MeshHandle;
pub use roster::Roster;
