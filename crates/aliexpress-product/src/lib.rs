//! AliExpress product extraction — data model and the mapping from the
//! storefront's in-page `runParams` object to a flat product record.

pub mod extract;
pub mod types;

pub use extract::{extract_page, extract_product};
pub use types::*;
