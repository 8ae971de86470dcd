pub mod core;
pub mod misc;
pub mod store;
pub mod util;
pub mod views;

pub use crate::core::bdd_manager::{BddManager, Configure, Settings, Statistics};
pub use crate::core::bdd_node::{Edge, NodeID, FALSE, TRUE};
pub use crate::core::error::{BddError, Result};
pub use crate::util::sat::{Assignment, PickIter};
pub use crate::views::bdd_view::{Assign, Bdd, BddFunc};
