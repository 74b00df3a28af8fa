/// Position state and trailing-stop management
///
/// **Key Design Principles:**
/// 1. The evaluator proposes; the executor commits transitions after the venue
///    accepts an order
/// 2. **Ratchet invariant**: the trailing stop may rise, never fall
///
/// **Module Structure:**
/// - `state`: `PositionState` record and its Flat/Long transitions
/// - `ratchet`: monotone stop level
pub mod ratchet;
pub mod state;

pub use ratchet::RatchetStop;
pub use state::{LastSignal, PositionState};
