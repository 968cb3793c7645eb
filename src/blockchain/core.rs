// core.rs splits chain responsibilities into submodules: block structure,
// ledger state, chain orchestration per consensus, validation and snapshots.
pub mod block;
pub mod chain;
pub mod snapshot;
pub mod stake;
pub mod state;
pub mod validation;

pub use block::*;
pub use chain::*;
pub use snapshot::*;
pub use state::*;
pub use validation::*;
