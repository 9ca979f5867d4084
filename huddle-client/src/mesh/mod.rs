mod mesh_coordinator;
mod mesh_event;
mod mesh_handle;

pub use mesh_coordinator::MeshCoordinator;
pub use mesh_event::MeshEvent;
pub use mesh_handle::MeshHandle;
