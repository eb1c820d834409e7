//! Zero - silence the selection or insert silence

use crate::events::ProgressUpdate;
use crate::pipeline::PIPELINE_BLOCK_SIZE;
use crate::plugin::{parse_param, Plugin, PluginContext, PluginError, PluginParams, PluginResult};
use crate::signal::SignalError;
use crate::storage::InsertMode;
use crate::types::SampleIndex;
use crate::undo::UndoTransactionGuard;

const MODE_ZERO: &str = "zero";
const MODE_INSERT: &str = "insert";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZeroMode {
    /// Overwrite the selection with silence
    Zero,
    /// Insert this many silent samples at the cursor
    Insert(SampleIndex),
}

/// Generates silence
///
/// Parameters:
/// - `0`: `zero` (default) or `insert`
/// - `1`: number of samples, `insert` mode only
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroPlugin;

impl ZeroPlugin {
    pub fn new() -> Self {
        Self
    }

    fn parse(params: &[String]) -> PluginResult<ZeroMode> {
        match params.first().map(|s| s.trim()) {
            None | Some(MODE_ZERO) => Ok(ZeroMode::Zero),
            Some(MODE_INSERT) => {
                let length: SampleIndex = parse_param("zero", params, 1, "length")?;
                Ok(ZeroMode::Insert(length))
            }
            Some(other) => Err(PluginError::invalid_params("zero", format!("unknown mode '{other}'"))),
        }
    }

    fn zero_selection(&self, ctx: &PluginContext) -> PluginResult<()> {
        let selection = ctx.selection(false);
        if selection.is_empty() {
            return Ok(());
        }
        let (first, last) = (selection.range.first(), selection.range.last());
        let total = selection.range.length();

        let mut guard = UndoTransactionGuard::new(ctx.manager().clone(), "Silence");
        let opened = ctx
            .lock()
            .open_multi_track_writer(InsertMode::Overwrite, &selection.tracks, first, last);
        let mut sink = match opened {
            Ok(sink) => sink,
            Err(e) => {
                guard.abort();
                return Err(match e {
                    SignalError::UndoDeclined => PluginError::UndoDeclined,
                    other => other.into(),
                });
            }
        };

        let silence = vec![0; PIPELINE_BLOCK_SIZE];
        let mut done: SampleIndex = 0;
        while done < total {
            if ctx.should_stop() {
                drop(sink);
                guard.abort();
                return Err(PluginError::Canceled);
            }
            let count = (total - done).min(PIPELINE_BLOCK_SIZE as SampleIndex) as usize;
            for writer in sink.writers_mut() {
                writer.write(&silence[..count]);
            }
            done += count as SampleIndex;
            ctx.report(ProgressUpdate::Percent(done as f64 * 100.0 / total as f64));
        }
        sink.flush();
        drop(sink);
        Ok(())
    }

    fn insert_silence(&self, ctx: &PluginContext, length: SampleIndex) -> PluginResult<()> {
        let selection = ctx.selection(false);
        if length == 0 || selection.tracks.is_empty() {
            return Ok(());
        }
        let mut guard = UndoTransactionGuard::new(ctx.manager().clone(), "Insert Silence");
        let mut manager = ctx.lock();
        let offset = selection.range.offset();
        if !manager.insert_space(offset, length, &selection.tracks) {
            drop(manager);
            guard.abort();
            return Err(PluginError::UndoDeclined);
        }
        manager.select_range(offset, length);
        Ok(())
    }
}

impl Plugin for ZeroPlugin {
    fn name(&self) -> &str {
        "zero"
    }

    fn description(&self) -> &str {
        "Silence"
    }

    fn default_params(&self) -> PluginParams {
        vec![MODE_ZERO.to_string()]
    }

    fn load_params(&self, params: &[String]) -> PluginResult<()> {
        Self::parse(params).map(|_| ())
    }

    fn run(&self, ctx: &PluginContext, params: &[String]) -> PluginResult<()> {
        match Self::parse(params)? {
            ZeroMode::Zero => self.zero_selection(ctx),
            ZeroMode::Insert(length) => self.insert_silence(ctx, length),
        }
    }
}
