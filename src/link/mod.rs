//! The `link` module supervises the physical network link, the lower of the two
//! connectivity tiers. The broker session only attempts to connect while the
//! link is up.

pub mod adapter;
pub mod supervisor;

pub use adapter::{HostLink, LinkAdapter, ManualLink};
pub use supervisor::{LinkState, LinkSupervisor};
