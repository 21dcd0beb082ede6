/// Fjall-based persistence for print requests and the batch lease
///
/// The ledger is the single source of truth for print request status. The
/// batch pipeline only ever moves a request forward through
/// `PENDING -> BATCHED -> DISPATCHED` (or into `FAILED`), and every move is a
/// compare-and-set against the stored value.
///
/// ## Leases
///
/// The `leases` partition backs the distributed lock taken by each
/// scheduled tick. A lease carries an owner and an expiry so a crashed
/// holder cannot block the job forever.
///
/// ## Usage
///
/// ```rust,ignore
/// use elector_print::ledger::{FjallStore, PrintRequestStore};
///
/// let store = FjallStore::open("data/ledger")?;
/// let pending = store.find_pending(50).await?;
/// ```

pub mod error;
pub mod partitions;
pub mod store;
pub mod traits;

pub use error::{LedgerError, Result};
pub use store::{FjallStore, Lease};
pub use traits::{LeaseStore, PrintRequestStore};
