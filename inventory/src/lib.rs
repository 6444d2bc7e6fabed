pub mod base;
pub mod hyperspace;
pub mod space;

pub use crate::base::config::InventoryConfig;
pub use crate::hyperspace::err::InvErr;
pub use crate::hyperspace::registry::Inventory;
