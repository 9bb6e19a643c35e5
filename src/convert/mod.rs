//! Record / token conversion contracts
//!
//! A store never interprets record contents. It relies on a caller-supplied
//! `RecordConverter` to turn one record into its token and back, and on a
//! `CollectionConverter` to join tokens into a single text with a separator.

mod collection;
mod errors;
mod record;

pub use collection::CollectionConverter;
pub use errors::{ConvertError, ConvertResult};
pub use record::{DisplayConverter, FnConverter, JsonConverter, RecordConverter};
