//! Game simulation modules

pub mod combat;
pub mod input;
pub mod manager;
pub mod physics;
pub mod registry;
pub mod room;
pub mod snapshot;
pub mod step;
pub mod store;

pub use manager::RoomManager;
pub use room::{Connection, Room, RoomHandle};

use uuid::Uuid;

/// Room errors
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("Room {0} is closed")]
    Closed(Uuid),

    #[error("No room could accept the connection")]
    Unavailable,
}
