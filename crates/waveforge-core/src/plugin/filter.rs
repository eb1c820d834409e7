//! Filter plugins
//!
//! Most transforms only need a [`SampleFilter`] between a reader and a
//! writer on the selection. A [`FilterPlugin`] describes such a filter and
//! [`FilterPluginAdapter`] turns it into a full [`Plugin`]:
//!
//! ```text
//! run:         MultiTrackReader ──► filter ──► MultiTrackWriter (overwrite)
//!              (single pass)                   inside one undo transaction
//!
//! pre-listen:  MultiTrackReader ──► filter ──► PlaybackSink
//!              (snapshot, rewound       ▲
//!               at its end)             └── update_filter(.., force = false)
//! ```

use crossbeam::channel::Receiver;

use super::{Plugin, PluginContext, PluginError, PluginParams, PluginResult};
use crate::pipeline::{Pipeline, PipelineOutcome, SampleFilter, SampleSource};
use crate::playback::PlaybackSink;
use crate::signal::SignalError;
use crate::storage::{InsertMode, ReaderMode};
use crate::undo::UndoTransactionGuard;

/// A plugin that is nothing but a sample filter over the selection
pub trait FilterPlugin: Send + Sync {
    type Filter: SampleFilter + Send;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn default_params(&self) -> PluginParams;

    fn load_params(&self, params: &[String]) -> PluginResult<()>;

    /// Fresh filter for `tracks` tracks
    fn create_filter(&self, tracks: usize) -> Self::Filter;

    /// Apply a parameter list to the filter
    ///
    /// `force` is set for the initial setup; hot updates during pre-listen
    /// pass `false` and may skip work if nothing relevant changed.
    fn update_filter(&self, filter: &mut Self::Filter, params: &[String], force: bool) -> PluginResult<()>;

    /// Undo entry of a run
    fn action_name(&self) -> String {
        self.description().to_string()
    }
}

/// Runs a [`FilterPlugin`] as a [`Plugin`]
#[derive(Debug, Default)]
pub struct FilterPluginAdapter<P> {
    inner: P,
}

impl<P: FilterPlugin> FilterPluginAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    fn prepared_filter(&self, tracks: usize, params: &[String]) -> PluginResult<P::Filter> {
        let mut filter = self.inner.create_filter(tracks);
        self.inner.update_filter(&mut filter, params, true)?;
        Ok(filter)
    }
}

impl<P: FilterPlugin> Plugin for FilterPluginAdapter<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn default_params(&self) -> PluginParams {
        self.inner.default_params()
    }

    fn load_params(&self, params: &[String]) -> PluginResult<()> {
        self.inner.load_params(params)
    }

    fn run(&self, ctx: &PluginContext, params: &[String]) -> PluginResult<()> {
        self.inner.load_params(params)?;
        let selection = ctx.selection(true);
        if selection.is_empty() {
            log::debug!("Plugin '{}': nothing to do", self.name());
            return Ok(());
        }
        let (first, last) = (selection.range.first(), selection.range.last());
        let filter = self.prepared_filter(selection.tracks.len(), params)?;

        let mut guard = UndoTransactionGuard::new(ctx.manager().clone(), &self.inner.action_name());
        let (mut source, sink) = {
            let mut manager = ctx.lock();
            let source =
                manager.open_multi_track_reader(ReaderMode::SinglePassForward, &selection.tracks, first, last);
            match manager.open_multi_track_writer(InsertMode::Overwrite, &selection.tracks, first, last) {
                Ok(sink) => (source, sink),
                Err(e) => {
                    drop(manager);
                    guard.abort();
                    return Err(match e {
                        SignalError::UndoDeclined => PluginError::UndoDeclined,
                        other => other.into(),
                    });
                }
            }
        };
        if let Some(tx) = ctx.progress_sender() {
            source.set_progress_sender(tx.clone());
        }

        let mut pipeline = Pipeline::new(source, filter, sink);
        let outcome = pipeline.run(|| ctx.should_stop());
        // Flush the writers before the transaction closes
        drop(pipeline);

        match outcome {
            Ok(PipelineOutcome::Completed) => Ok(()),
            Ok(PipelineOutcome::Canceled) => {
                log::info!("Plugin '{}' canceled, rolling back", self.name());
                guard.abort();
                Err(PluginError::Canceled)
            }
            Err(e) => {
                guard.abort();
                Err(e.into())
            }
        }
    }

    fn supports_pre_listen(&self) -> bool {
        true
    }

    fn pre_listen(
        &self,
        ctx: &PluginContext,
        params: &[String],
        updates: Receiver<PluginParams>,
        sink: PlaybackSink,
    ) -> PluginResult<()> {
        self.inner.load_params(params)?;
        let selection = ctx.selection(true);
        if selection.is_empty() {
            return Ok(());
        }
        let filter = self.prepared_filter(selection.tracks.len(), params)?;
        let source = ctx.lock().open_multi_track_reader(
            ReaderMode::FullSnapshot,
            &selection.tracks,
            selection.range.first(),
            selection.range.last(),
        );
        log::info!("Pre-listen of '{}' started", self.name());

        let mut pipeline = Pipeline::new(source, filter, sink);
        while !ctx.should_stop() {
            for update in updates.try_iter() {
                match self.inner.load_params(&update) {
                    Ok(()) => self.inner.update_filter(pipeline.filter_mut(), &update, false)?,
                    Err(e) => log::warn!("Ignoring pre-listen update: {}", e),
                }
            }
            if !pipeline.go_on()? && !pipeline.source_mut().rewind() {
                break;
            }
        }

        let (_, _, mut sink) = pipeline.into_parts();
        sink.close()?;
        log::info!("Pre-listen of '{}' stopped", self.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex, PoisonError};
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::playback::{
        MemoryCapture, MemoryDeviceFactory, PlaybackDeviceRegistry, PlaybackMethod, PlaybackParams,
    };
    use crate::plugin::parse_param;
    use crate::signal::{lock_manager, NonInteractive, SharedSignalManager, SignalManager};
    use crate::task::TaskContext;
    use crate::types::Sample;

    struct Scale {
        updates: Arc<Mutex<Vec<bool>>>,
    }

    struct ScaleFilter {
        factor: Sample,
    }

    impl SampleFilter for ScaleFilter {
        fn process(&mut self, blocks: &mut [Vec<Sample>]) {
            for block in blocks.iter_mut() {
                for s in block.iter_mut() {
                    *s *= self.factor;
                }
            }
        }
    }

    impl FilterPlugin for Scale {
        type Filter = ScaleFilter;

        fn name(&self) -> &str {
            "scale"
        }

        fn description(&self) -> &str {
            "Scale"
        }

        fn default_params(&self) -> PluginParams {
            vec!["-1".to_string()]
        }

        fn load_params(&self, params: &[String]) -> PluginResult<()> {
            parse_param::<Sample>("scale", params, 0, "factor").map(|_| ())
        }

        fn create_filter(&self, _tracks: usize) -> ScaleFilter {
            ScaleFilter { factor: 1 }
        }

        fn update_filter(&self, filter: &mut ScaleFilter, params: &[String], force: bool) -> PluginResult<()> {
            filter.factor = parse_param("scale", params, 0, "factor")?;
            self.updates.lock().unwrap_or_else(PoisonError::into_inner).push(force);
            Ok(())
        }
    }

    fn adapter() -> (FilterPluginAdapter<Scale>, Arc<Mutex<Vec<bool>>>) {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let plugin = FilterPluginAdapter::new(Scale {
            updates: updates.clone(),
        });
        (plugin, updates)
    }

    fn ramp_signal(len: usize) -> SharedSignalManager {
        let mut manager = SignalManager::new(Arc::new(NonInteractive::default()));
        manager.new_signal(len as u64, 44100, 16, 1);
        let ramp: Vec<Sample> = (1..=len as Sample).collect();
        manager.track(0).unwrap().write_samples(0, &ramp);
        manager.into_shared()
    }

    fn samples(manager: &SharedSignalManager) -> Vec<Sample> {
        let m = lock_manager(manager);
        m.track(0).unwrap().read_range(0, m.length())
    }

    fn params(p: &[&str]) -> PluginParams {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_run_is_one_undo_step() {
        let shared = ramp_signal(100);
        lock_manager(&shared).select_range(10, 5);
        let (plugin, updates) = adapter();
        let ctx = PluginContext::inline(shared.clone());

        plugin.run(&ctx, &params(&["-1"])).unwrap();
        let data = samples(&shared);
        assert_eq!(&data[9..16], &[10, -11, -12, -13, -14, -15, 16]);
        assert_eq!(*updates.lock().unwrap(), vec![true]);

        let mut m = lock_manager(&shared);
        assert_eq!(m.undo_description().as_deref(), Some("Scale"));
        assert!(m.is_modified());
        assert!(m.undo());
        drop(m);
        assert_eq!(samples(&shared), (1..=100).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_params_do_not_start() {
        let shared = ramp_signal(10);
        let (plugin, updates) = adapter();
        let ctx = PluginContext::inline(shared.clone());
        let err = plugin.run(&ctx, &params(&["loud"])).unwrap_err();
        assert_eq!(err.errno(), -22);
        assert!(updates.lock().unwrap().is_empty());
        assert!(!lock_manager(&shared).can_undo());
    }

    #[test]
    fn test_canceled_run_rolls_back() {
        let shared = ramp_signal(100);
        let (plugin, _) = adapter();
        let task = TaskContext::detached();
        task.cancel();
        let interaction = lock_manager(&shared).interaction();
        let ctx = PluginContext::new(shared.clone(), task, None, interaction);

        assert!(plugin.run(&ctx, &params(&["-1"])).unwrap_err().is_canceled());
        assert_eq!(samples(&shared), (1..=100).collect::<Vec<_>>());
        let m = lock_manager(&shared);
        assert!(!m.can_undo());
        assert!(!m.is_modified());
    }

    #[test]
    fn test_pre_listen_loops_and_updates() {
        let shared = ramp_signal(100);
        let (plugin, updates) = adapter();
        let plugin = Arc::new(plugin);

        let capture = MemoryCapture::new();
        capture.limit(200);
        let mut registry = PlaybackDeviceRegistry::new();
        registry.register(Arc::new(MemoryDeviceFactory::new(capture.clone())));
        let sink =
            PlaybackSink::open(&registry, PlaybackMethod::Memory, &PlaybackParams::default().with_channels(1), 1)
                .unwrap();

        let task = TaskContext::detached();
        let interaction = lock_manager(&shared).interaction();
        let ctx = PluginContext::new(shared.clone(), task.clone(), None, interaction);
        let (tx, rx) = crossbeam::channel::unbounded();
        let worker = {
            let plugin = plugin.clone();
            thread::spawn(move || plugin.pre_listen(&ctx, &params(&["-1"]), rx, sink))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while capture.written() < 200 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        tx.send(params(&["2"])).unwrap();
        while updates.lock().unwrap().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        task.cancel();
        worker.join().unwrap().unwrap();

        assert_eq!(*updates.lock().unwrap(), vec![true, false]);
        let played = capture.channel(0);
        let expected: Vec<Sample> = (1..=100).map(|s: Sample| -s).collect();
        assert_eq!(&played[..100], &expected[..]);
        assert_eq!(&played[100..200], &expected[..]);
        assert!(!capture.is_open());
        // Pre-listen never touches the signal
        assert_eq!(samples(&shared), (1..=100).collect::<Vec<_>>());
        assert!(!lock_manager(&shared).can_undo());
    }
}
