//! Change-stream side of the store: the event shape delivered by the backing
//! store and the coordinator that turns entity tombstones into cascades.

pub mod cascade;
pub mod event;

pub use cascade::{CascadeCoordinator, CascadeOutcome, CascadeSummary};
pub use event::{ChangeEvent, ChangeEventType, image_number, image_string, image_string_list};
