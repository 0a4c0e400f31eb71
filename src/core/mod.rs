pub mod error;
pub mod types;
pub mod value;

pub use error::{
    BackendError, BackendResult, CancellationReason, ErrorKind, Result, TrellisError,
};
pub use types::{Attributes, ItemKey, int_attr, string_attr};
pub use value::KeyScalar;
