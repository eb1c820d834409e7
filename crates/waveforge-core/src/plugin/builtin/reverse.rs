//! Reverse - plays the selection backwards
//!
//! Works from both ends of the selection towards the middle. In every step
//! one block at the left and one at the right end of each track are
//! reversed and swapped. The tracks of a step are independent, so they run
//! on a thread pool and the step only ends when all of them are done:
//!
//! ```text
//!   step 1:  [A ········ B]  →  [B' ········ A']
//!   step 2:     [C ··· D]    →     [D' ··· C']
//!   last:         [ M ]      →       [ M' ]      (remaining middle)
//! ```

use rayon::prelude::*;

use crate::events::{ProgressUpdate, SignalEvent};
use crate::pipeline::PIPELINE_BLOCK_SIZE;
use crate::plugin::{Plugin, PluginContext, PluginError, PluginParams, PluginResult};
use crate::storage::Track;
use crate::types::SampleIndex;
use crate::undo::{ModifyAction, UndoTransactionGuard};

/// Reverses the selected range of the selected tracks
///
/// Takes no parameters.
#[derive(Debug, Clone)]
pub struct ReversePlugin {
    block_size: SampleIndex,
    threads: usize,
}

impl Default for ReversePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl ReversePlugin {
    pub fn new() -> Self {
        Self {
            block_size: PIPELINE_BLOCK_SIZE as SampleIndex,
            threads: 0,
        }
    }

    /// Use a different block size (mostly for tests)
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1) as SampleIndex;
        self
    }

    /// Limit the pool size, 0 means one thread per track
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    fn build_pool(&self, tracks: usize) -> PluginResult<rayon::ThreadPool> {
        let threads = if self.threads == 0 { tracks } else { self.threads };
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("reverse-{}", i))
            .build()
            .map_err(|e| PluginError::Spawn(e.to_string()))
    }
}

/// Reverse `[left, left + n)` and `[right, right + n)` and swap them
fn swap_blocks(track: &Track, left: SampleIndex, right: SampleIndex, n: SampleIndex) {
    let mut a = track.read_range(left, n);
    let mut b = track.read_range(right, n);
    a.reverse();
    b.reverse();
    track.write_samples(left, &b);
    track.write_samples(right, &a);
}

fn reverse_range(track: &Track, offset: SampleIndex, n: SampleIndex) {
    let mut data = track.read_range(offset, n);
    data.reverse();
    track.write_samples(offset, &data);
}

impl Plugin for ReversePlugin {
    fn name(&self) -> &str {
        "reverse"
    }

    fn description(&self) -> &str {
        "Reverse"
    }

    fn default_params(&self) -> PluginParams {
        Vec::new()
    }

    fn load_params(&self, params: &[String]) -> PluginResult<()> {
        if params.iter().any(|p| !p.trim().is_empty()) {
            return Err(PluginError::invalid_params("reverse", "takes no parameters"));
        }
        Ok(())
    }

    fn run(&self, ctx: &PluginContext, params: &[String]) -> PluginResult<()> {
        self.load_params(params)?;
        let selection = ctx.selection(true);
        if selection.is_empty() {
            return Ok(());
        }
        let first = selection.range.first();
        let length = selection.range.length();

        let mut guard = UndoTransactionGuard::new(ctx.manager().clone(), self.description());
        let tracks: Vec<(usize, Track)> = {
            let mut manager = ctx.lock();
            let mut tracks = Vec::with_capacity(selection.tracks.len());
            for &index in &selection.tracks {
                let Some(track) = manager.track(index).cloned() else {
                    continue;
                };
                let action = ModifyAction::new(self.description(), track.id(), first, length);
                if !manager.register_undo_action(Box::new(action)) {
                    drop(manager);
                    guard.abort();
                    return Err(PluginError::UndoDeclined);
                }
                tracks.push((index, track));
            }
            manager.set_modified(true);
            tracks
        };
        let pool = match self.build_pool(tracks.len()) {
            Ok(pool) => pool,
            Err(e) => {
                guard.abort();
                return Err(e);
            }
        };

        let block = self.block_size;
        let mut left = first;
        let mut right = first + length;
        while left < right {
            if ctx.should_stop() {
                log::info!("Reverse canceled, rolling back");
                guard.abort();
                return Err(PluginError::Canceled);
            }
            let remaining = right - left;
            if remaining <= 2 * block {
                pool.install(|| {
                    tracks
                        .par_iter()
                        .for_each(|(_, track)| reverse_range(track, left, remaining))
                });
                break;
            }
            let (l, r) = (left, right - block);
            pool.install(|| tracks.par_iter().for_each(|(_, track)| swap_blocks(track, l, r, block)));
            left += block;
            right -= block;
            ctx.report(ProgressUpdate::Percent(
                (left - first) as f64 * 200.0 / length as f64,
            ));
        }
        ctx.report(ProgressUpdate::Percent(100.0));

        let manager = ctx.lock();
        for &(index, _) in &tracks {
            manager.state().publish(SignalEvent::SamplesModified {
                track: index,
                offset: first,
                length,
            });
        }
        Ok(())
    }
}
