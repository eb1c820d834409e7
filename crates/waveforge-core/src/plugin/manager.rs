//! Plugin manager - loads plugins and runs them on worker threads

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use super::context::PluginContext;
use super::error::{PluginError, PluginResult};
use super::instance::PluginInstance;
use super::registry::PluginRegistry;
use super::{Plugin, PluginParams};
use crate::events::ProgressUpdate;
use crate::playback::{PlaybackDeviceRegistry, PlaybackMethod, PlaybackParams, PlaybackSink};
use crate::signal::{lock_manager, SharedSignalManager, UserInteraction};
use crate::task::{StopOutcome, TaskContext, WorkerTask, DEFAULT_PAUSE_SLEEP, DEFAULT_STOP_TIMEOUT};

/// Poll interval of [`PluginManager::sync`]
const SYNC_POLL: Duration = Duration::from_millis(100);

/// One plugin run in flight
struct RunningPlugin {
    name: String,
    task: WorkerTask,
    result_rx: Receiver<PluginResult<()>>,
}

impl RunningPlugin {
    /// Join the finished worker and take its result
    fn into_result(mut self) -> (String, PluginResult<()>) {
        self.task.wait(Duration::ZERO);
        let result = self
            .result_rx
            .try_recv()
            .unwrap_or_else(|_| Err(PluginError::Aborted(format!("worker '{}' ended without result", self.task.name()))));
        (self.name, result)
    }
}

/// A pre-listen session started by [`PluginManager::start_pre_listen`]
///
/// Dropping the handle stops the session.
pub struct PreListenHandle {
    name: String,
    plugin: Arc<dyn Plugin>,
    task: WorkerTask,
    updates: Sender<PluginParams>,
    result_rx: Receiver<PluginResult<()>>,
    stop_timeout: Duration,
}

impl std::fmt::Debug for PreListenHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreListenHandle")
            .field("name", &self.name)
            .field("task", &self.task)
            .finish()
    }
}

impl PreListenHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Hand new parameters to the running session
    ///
    /// Invalid lists are rejected here and never reach the filter.
    pub fn update_params(&self, params: PluginParams) -> PluginResult<()> {
        self.plugin.load_params(&params)?;
        self.updates
            .send(params)
            .map_err(|_| PluginError::Aborted(format!("pre-listen of '{}' is not running", self.name)))
    }

    /// Stop the session and return how it ended
    pub fn stop(mut self) -> PluginResult<()> {
        let outcome = self.task.stop(self.stop_timeout);
        log::debug!("Pre-listen of '{}' stopped: {:?}", self.name, outcome);
        match self.result_rx.try_recv() {
            Ok(Err(PluginError::Canceled)) => Ok(()),
            Ok(result) => result,
            Err(_) => Err(PluginError::Aborted(format!("pre-listen of '{}': {:?}", self.name, outcome))),
        }
    }
}

/// Runs plugins against one signal
///
/// ```text
/// execute("amplify", ["2.0"])
///   ├─ registry lookup, instance created on first use
///   ├─ load_params        (InvalidParams, nothing started)
///   ├─ instance.retain()
///   └─ WorkerTask "plugin-amplify"
///        run(ctx, params) → show_error on failure → instance.release()
///
/// collect_finished()  joins finished workers, returns their results
/// ```
pub struct PluginManager {
    registry: Arc<PluginRegistry>,
    signal: SharedSignalManager,
    playback: Arc<PlaybackDeviceRegistry>,
    playback_method: PlaybackMethod,
    playback_params: PlaybackParams,
    interaction: Arc<dyn UserInteraction>,
    instances: BTreeMap<String, Arc<PluginInstance>>,
    running: Vec<RunningPlugin>,
    progress_tx: Option<Sender<ProgressUpdate>>,
    stop_timeout: Duration,
    pause_sleep: Duration,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("registry", &self.registry)
            .field("loaded", &self.instances.keys().collect::<Vec<_>>())
            .field("running", &self.running.iter().map(|r| &r.name).collect::<Vec<_>>())
            .finish()
    }
}

impl PluginManager {
    pub fn new(
        registry: Arc<PluginRegistry>,
        signal: SharedSignalManager,
        playback: Arc<PlaybackDeviceRegistry>,
    ) -> Self {
        let interaction = lock_manager(&signal).interaction();
        Self {
            registry,
            signal,
            playback,
            playback_method: PlaybackMethod::default(),
            playback_params: PlaybackParams::default(),
            interaction,
            instances: BTreeMap::new(),
            running: Vec::new(),
            progress_tx: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            pause_sleep: DEFAULT_PAUSE_SLEEP,
        }
    }

    /// Shutdown bound per escalation tier and pause sleep of the workers
    pub fn with_timeouts(mut self, stop_timeout: Duration, pause_sleep: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self.pause_sleep = pause_sleep;
        self
    }

    /// Device used for pre-listen
    pub fn set_playback(&mut self, method: PlaybackMethod, params: PlaybackParams) {
        self.playback_method = method;
        self.playback_params = params;
    }

    /// Progress of all following runs goes to `tx`
    pub fn set_progress_sender(&mut self, tx: Sender<ProgressUpdate>) {
        self.progress_tx = Some(tx);
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Loaded instance of a plugin, loading it on first use
    pub fn instance(&mut self, name: &str) -> PluginResult<Arc<PluginInstance>> {
        if let Some(instance) = self.instances.get(name) {
            return Ok(instance.clone());
        }
        let plugin = self.registry.get(name).ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        log::debug!("Loading plugin '{}'", name);
        let instance = Arc::new(PluginInstance::new(plugin));
        self.instances.insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    /// Drop instances nothing uses any more, returns how many
    pub fn unload_unused(&mut self) -> usize {
        let before = self.instances.len();
        self.instances.retain(|name, instance| {
            let keep = !instance.is_closable();
            if !keep {
                log::debug!("Unloading plugin '{}'", name);
            }
            keep
        });
        before - self.instances.len()
    }

    /// Parameter setup phase
    ///
    /// Starts from `previous`, or from the parameters of the last setup of
    /// this plugin. Returns `None` if the setup was canceled.
    pub fn setup_plugin(&mut self, name: &str, previous: Option<&[String]>) -> PluginResult<Option<PluginParams>> {
        let instance = self.instance(name)?;
        let last = instance.last_params();
        let start = previous.or(last.as_deref());
        let Some(params) = instance.plugin().setup(start) else {
            log::debug!("Setup of '{}' canceled", name);
            return Ok(None);
        };
        instance.plugin().load_params(&params)?;
        instance.set_last_params(params.clone());
        Ok(Some(params))
    }

    /// Validate the parameters and start a run on a worker thread
    pub fn execute(&mut self, name: &str, params: PluginParams) -> PluginResult<()> {
        let instance = self.instance(name)?;
        instance.plugin().load_params(&params)?;

        let (result_tx, result_rx) = channel::bounded(1);
        let signal = self.signal.clone();
        let progress_tx = self.progress_tx.clone();
        let interaction = self.interaction.clone();
        let worker_instance = instance.clone();
        let plugin_name = name.to_string();

        instance.retain();
        let spawned = WorkerTask::spawn_with_pause_sleep(&format!("plugin-{name}"), self.pause_sleep, move |task| {
            let ctx = PluginContext::new(signal, task, progress_tx, interaction.clone());
            log::info!("Plugin '{}' started", plugin_name);
            let result = worker_instance.plugin().run(&ctx, &params);
            report_result(&plugin_name, &result, interaction.as_ref());
            worker_instance.release();
            let _ = result_tx.send(result);
        });
        let task = match spawned {
            Ok(task) => task,
            Err(e) => {
                instance.release();
                return Err(PluginError::Spawn(e.to_string()));
            }
        };

        self.running.push(RunningPlugin {
            name: name.to_string(),
            task,
            result_rx,
        });
        Ok(())
    }

    /// Run a plugin on the calling thread
    pub fn run_inline(&mut self, name: &str, params: &[String]) -> PluginResult<()> {
        let instance = self.instance(name)?;
        instance.plugin().load_params(params)?;
        instance.retain();
        let ctx = PluginContext::new(
            self.signal.clone(),
            TaskContext::detached(),
            self.progress_tx.clone(),
            self.interaction.clone(),
        );
        let result = instance.plugin().run(&ctx, params);
        report_result(name, &result, self.interaction.as_ref());
        instance.release();
        result
    }

    pub fn running_count(&self) -> usize {
        self.running.iter().filter(|r| r.task.is_running()).count()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.iter().any(|r| r.name == name && r.task.is_running())
    }

    /// Cancel the runs of a plugin after asking the user
    ///
    /// The workers are paused while the question is pending. Returns true
    /// if the cancel was confirmed.
    pub fn request_cancel(&self, name: &str) -> bool {
        let targets: Vec<&RunningPlugin> = self
            .running
            .iter()
            .filter(|r| r.name == name && r.task.is_running())
            .collect();
        if targets.is_empty() {
            return false;
        }

        for run in &targets {
            run.task.context().set_paused(true);
        }
        let confirmed = self.interaction.confirm_cancel();
        for run in &targets {
            run.task.context().set_paused(false);
            if confirmed {
                log::info!("Canceling plugin '{}'", run.name);
                run.task.request_cancel();
            }
        }
        confirmed
    }

    /// Results of all runs that have ended since the last call
    pub fn collect_finished(&mut self) -> Vec<(String, PluginResult<()>)> {
        let (finished, running): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.running).into_iter().partition(|r| !r.task.is_running());
        self.running = running;
        finished.into_iter().map(RunningPlugin::into_result).collect()
    }

    /// Wait until every run has ended
    pub fn sync(&mut self) -> Vec<(String, PluginResult<()>)> {
        for run in &mut self.running {
            while !run.task.wait(SYNC_POLL) {
                log::debug!("Waiting for plugin '{}'", run.name);
            }
        }
        self.collect_finished()
    }

    /// Stop every run without asking
    pub fn stop_all(&mut self) -> Vec<(String, PluginResult<()>)> {
        let mut results = Vec::new();
        for mut run in std::mem::take(&mut self.running) {
            match run.task.stop(self.stop_timeout) {
                StopOutcome::Detached => {
                    log::error!("Plugin '{}' left running", run.name);
                    results.push((run.name, Err(PluginError::Aborted("worker detached".to_string()))));
                }
                outcome => {
                    log::debug!("Plugin '{}' stopped: {:?}", run.name, outcome);
                    results.push(run.into_result());
                }
            }
        }
        results
    }

    /// Play a filter plugin's output instead of writing it
    pub fn start_pre_listen(&mut self, name: &str, params: PluginParams) -> PluginResult<PreListenHandle> {
        let instance = self.instance(name)?;
        let plugin = instance.plugin().clone();
        if !plugin.supports_pre_listen() {
            return Err(PluginError::NotSupported {
                plugin: name.to_string(),
                feature: "pre-listen".to_string(),
            });
        }
        plugin.load_params(&params)?;

        let (inputs, rate) = {
            let manager = lock_manager(&self.signal);
            (manager.selected_tracks().len(), manager.rate())
        };
        let mut device_params = self.playback_params.clone();
        if rate > 0 {
            device_params = device_params.with_rate(rate);
        }
        let sink = PlaybackSink::open(&self.playback, self.playback_method, &device_params, inputs)?;

        let (updates_tx, updates_rx) = channel::unbounded();
        let (result_tx, result_rx) = channel::bounded(1);
        let signal = self.signal.clone();
        let interaction = self.interaction.clone();
        let worker_instance = instance.clone();
        let plugin_name = name.to_string();

        instance.retain();
        let spawned = WorkerTask::spawn_with_pause_sleep(&format!("prelisten-{name}"), self.pause_sleep, move |task| {
            let ctx = PluginContext::new(signal, task, None, interaction.clone());
            let result = worker_instance.plugin().pre_listen(&ctx, &params, updates_rx, sink);
            report_result(&plugin_name, &result, interaction.as_ref());
            worker_instance.release();
            let _ = result_tx.send(result);
        });
        let task = match spawned {
            Ok(task) => task,
            Err(e) => {
                instance.release();
                return Err(PluginError::Spawn(e.to_string()));
            }
        };

        Ok(PreListenHandle {
            name: name.to_string(),
            plugin,
            task,
            updates: updates_tx,
            result_rx,
            stop_timeout: self.stop_timeout,
        })
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        if !self.running.is_empty() {
            self.stop_all();
        }
    }
}

fn report_result(name: &str, result: &PluginResult<()>, interaction: &dyn UserInteraction) {
    match result {
        Ok(()) => log::info!("Plugin '{}' finished", name),
        Err(e) if e.is_canceled() => log::info!("Plugin '{}' canceled", name),
        Err(e) => {
            log::error!("Plugin '{}' failed: {}", name, e);
            interaction.show_error(&e.to_string());
        }
    }
}
