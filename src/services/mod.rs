pub mod linking;
pub mod sync;
pub mod transform;

pub use linking::{LinkingError, LinkingService};
pub use sync::{SyncError, SyncService};
