// Event routing
//
// Every inbound event for every room goes through a single dispatcher task
// running the EventRouter, so room state is only ever mutated from one place.

// Public API - what other modules can use
pub use handle::{RouterCommand, RouterHandle};
pub use router::{EventRouter, RoomPolicy};

// Internal modules
mod handle;
mod router;
