//! Stripe based sample storage
//!
//! A [`Track`] keeps its samples in a list of [`Stripe`]s. Edits only touch
//! the stripes around the edit position; everything after it moves by
//! virtue of its offset being derived from the lengths before it.
//!
//! Readers work on a copy-on-write snapshot of the stripes they cover,
//! writers buffer data and hand it to the track in blocks.

mod reader;
mod stripe;
mod track;
mod writer;

pub use reader::{ReaderMode, SampleReader};
pub use stripe::Stripe;
pub use track::{StripeLimits, Track, STRIPE_LENGTH_MAXIMUM, STRIPE_LENGTH_MINIMUM};
pub use writer::{FlushCallback, InsertMode, SampleWriter, WRITER_BUFFER_SIZE};
