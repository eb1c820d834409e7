//! Plugin execution
//!
//! Every sample transform of the editor is a [`Plugin`]. A run goes
//! through the same phases regardless of what the plugin does:
//!
//! ```text
//!  setup_plugin()        execute()                      worker thread
//!  ──────────────        ─────────                      ─────────────
//!  previous params ──►   load_params (validation) ──►   run(ctx, params)
//!  or defaults           retain instance                  MultiTrackReader
//!                        spawn WorkerTask                   → filter
//!                                                           → MultiTrackWriter
//!                                                         release instance
//! ```
//!
//! Parameters are a flat list of strings; every plugin parses its own
//! positional encoding and rejects malformed input with
//! [`PluginError::InvalidParams`] before any work starts.
//!
//! The worker polls [`PluginContext::should_stop`]. A cancel request
//! first pauses the worker, asks the user for confirmation, and only then
//! sets the cancel flag.

pub mod builtin;
mod context;
mod error;
mod filter;
mod instance;
mod manager;
mod registry;

pub use context::{PluginContext, PluginSelection};
pub use error::{PluginError, PluginResult};
pub use filter::{FilterPlugin, FilterPluginAdapter};
pub use instance::PluginInstance;
pub use manager::{PluginManager, PreListenHandle};
pub use registry::PluginRegistry;

use crossbeam::channel::Receiver;

use crate::playback::PlaybackSink;

/// Positional plugin parameters
pub type PluginParams = Vec<String>;

/// A sample transform or generator
///
/// Implementations are shared between the control thread and their
/// workers, so per-run state belongs into `run`, not into `self`.
pub trait Plugin: Send + Sync {
    /// Unique name used for lookup
    fn name(&self) -> &str;

    /// Human readable description, also used for the undo entry
    fn description(&self) -> &str;

    fn default_params(&self) -> PluginParams;

    /// Produce the parameters for the next run
    ///
    /// Without a user interface this replays the previous parameters if
    /// they are still valid and falls back to the defaults otherwise.
    /// `None` means the setup was canceled.
    fn setup(&self, previous: Option<&[String]>) -> Option<PluginParams> {
        match previous {
            Some(params) if self.load_params(params).is_ok() => Some(params.to_vec()),
            _ => Some(self.default_params()),
        }
    }

    /// Validate a parameter list
    fn load_params(&self, params: &[String]) -> PluginResult<()>;

    /// Do the work; called on the worker thread
    fn run(&self, ctx: &PluginContext, params: &[String]) -> PluginResult<()>;

    fn supports_pre_listen(&self) -> bool {
        false
    }

    /// Play the result without touching the signal
    ///
    /// Runs until the context is stopped. New parameter lists arrive over
    /// `updates` and are applied without restarting.
    fn pre_listen(
        &self,
        _ctx: &PluginContext,
        _params: &[String],
        _updates: Receiver<PluginParams>,
        _sink: PlaybackSink,
    ) -> PluginResult<()> {
        Err(PluginError::NotSupported {
            plugin: self.name().to_string(),
            feature: "pre-listen".to_string(),
        })
    }
}

/// Parse one positional parameter
pub(crate) fn parse_param<T: std::str::FromStr>(
    plugin: &str,
    params: &[String],
    index: usize,
    what: &str,
) -> PluginResult<T> {
    let text = params
        .get(index)
        .ok_or_else(|| PluginError::invalid_params(plugin, format!("missing {what}")))?;
    text.trim()
        .parse()
        .map_err(|_| PluginError::invalid_params(plugin, format!("{what} '{text}' is malformed")))
}
