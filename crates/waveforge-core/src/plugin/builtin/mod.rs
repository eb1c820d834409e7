//! Built-in plugins
//!
//! - **amplify**: constant gain
//! - **noise**: white noise mixed in at a level
//! - **zero**: silence the selection, or insert silence at the cursor
//! - **reverse**: reverse the selection on a thread pool

mod amplify;
mod noise;
mod reverse;
mod zero;

pub use amplify::{AmplifyFilter, AmplifyPlugin, MAX_GAIN};
pub use noise::{NoiseFilter, NoisePlugin};
pub use reverse::ReversePlugin;
pub use zero::ZeroPlugin;
