//! Actor tree for the jam controller.
//!
//! ```text
//! RegistryActor (one per process)
//!   ├── RoomActor (one per live session)
//!   ├── RoomActor
//!   └── ...
//! ```
//!
//! The registry owns the room table and the global broadcast set; each room
//! owns one session's roster, cached song, and subscriber set. Observers
//! (live gateway connections) are represented everywhere by
//! [`observer::ObserverHandle`].

pub mod messages;
pub mod observer;
pub mod registry;
pub mod room;

pub use messages::{RegistryStatus, RosterView};
pub use observer::{FanoutSet, ObserverHandle, ObserverId};
pub use registry::RegistryHandle;
pub use room::RoomHandle;
