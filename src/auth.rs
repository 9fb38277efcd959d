//! Auth-domain secret wrappers and the stored machine-client record.

pub mod record;
pub mod secret;

pub use record::*;
pub use secret::*;
