//! Trait abstractions for the wizard's external collaborators
//!
//! Planners depend on these interfaces rather than on a terminal, the
//! kernel or the network, so every decision path can be exercised with the
//! mock implementations that live next to the production ones.

pub mod host;
pub mod inventory;
pub mod prompt;
pub mod remote;

pub use host::*;
pub use inventory::*;
pub use prompt::*;
pub use remote::*;
