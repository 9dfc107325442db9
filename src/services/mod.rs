pub mod detect;
mod error;
pub mod import;
pub mod media;
pub mod ordering;
pub mod positions;
pub mod realtime;
pub mod reconcile;
#[cfg(feature = "remote-upload")]
pub mod remote;
pub mod search;
pub mod storage;
pub mod text;

pub use error::{clean_name, ServiceError};
