//! The launch state machine.
//!
//! ```text
//! ResolvingExecutable → OpeningArchive → DecidingExtraction
//!     ├─ ExtractingThenRespawning ───────────────────────────┐
//!     └─ RunningInPlace → BootstrappingRuntime → RunningPayload ─┴→ Finalizing → Done
//! ```
//!
//! Any step may fail; the run then finalizes the runtime if it was started,
//! removes an extraction directory this process created, and returns the
//! error.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use bootpack_archive::Archive;
use bootpack_core::config::{Handshake, UnpackConfig};
use bootpack_core::paths::contained_join;
use bootpack_runtime::{
    install_code_bundles, run_embedded_modules, run_payload_scripts, BindingError, DynamicRuntime,
    HostedRuntime, InitSettings, RuntimeOptions, StartOutcome, UNHANDLED_ERROR_EXIT,
};
use tracing::{debug, error, info};

use crate::dependency::DependencyResolver;
use crate::error::Result;
use crate::extract::{
    create_extraction_dir, extract_all, extraction_parent, ExtractionObserver, LoggingObserver,
};
use crate::locate::open_archive;
use crate::notify::{ConsoleNotifier, ErrorNotifier};
use crate::process::{ChildExit, NativeProcess, ProcessControl};
use crate::session::LaunchSession;

/// How a launch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    Exit(i32),
    /// The child was killed by this signal; the caller re-raises it.
    Signal(i32),
}

impl From<ChildExit> for LaunchOutcome {
    fn from(exit: ChildExit) -> Self {
        match exit {
            ChildExit::Code(code) => LaunchOutcome::Exit(code),
            ChildExit::Signal(signo) => LaunchOutcome::Signal(signo),
        }
    }
}

/// Produces the hosted runtime for an opened archive.
pub trait RuntimeFactory {
    fn create(&mut self, archive: &Archive, home: &Path) -> Result<Box<dyn HostedRuntime>>;
}

/// Loads the runtime library named in the archive cookie from `home`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicRuntimeFactory;

impl RuntimeFactory for DynamicRuntimeFactory {
    fn create(&mut self, archive: &Archive, home: &Path) -> Result<Box<dyn HostedRuntime>> {
        let runtime = DynamicRuntime::load(
            &[home],
            archive.runtime_library(),
            archive.runtime_version(),
        )?;
        Ok(Box::new(runtime))
    }
}

#[derive(Debug)]
enum LaunchState {
    ResolvingExecutable,
    OpeningArchive,
    DecidingExtraction(Archive),
    ExtractingThenRespawning(Archive),
    RunningInPlace(Archive),
    BootstrappingRuntime(Archive),
    RunningPayload(Archive),
    Finalizing(LaunchOutcome),
    Done(LaunchOutcome),
}

impl LaunchState {
    fn name(&self) -> &'static str {
        match self {
            Self::ResolvingExecutable => "resolving-executable",
            Self::OpeningArchive => "opening-archive",
            Self::DecidingExtraction(_) => "deciding-extraction",
            Self::ExtractingThenRespawning(_) => "extracting-then-respawning",
            Self::RunningInPlace(_) => "running-in-place",
            Self::BootstrappingRuntime(_) => "bootstrapping-runtime",
            Self::RunningPayload(_) => "running-payload",
            Self::Finalizing(_) => "finalizing",
            Self::Done(_) => "done",
        }
    }
}

/// Per-run state that outlives individual steps.
struct Run {
    session: LaunchSession,
    options: RuntimeOptions,
    runtime: Option<Box<dyn HostedRuntime>>,
}

/// Drives one launch from executable lookup to exit status.
pub struct Launcher {
    process: Box<dyn ProcessControl>,
    runtimes: Box<dyn RuntimeFactory>,
    observer: Box<dyn ExtractionObserver>,
    notifier: Box<dyn ErrorNotifier>,
    handshake: Handshake,
    unpack: UnpackConfig,
}

impl Launcher {
    pub fn new(
        process: impl ProcessControl + 'static,
        runtimes: impl RuntimeFactory + 'static,
        handshake: Handshake,
    ) -> Self {
        Self {
            process: Box::new(process),
            runtimes: Box::new(runtimes),
            observer: Box::new(LoggingObserver),
            notifier: Box::new(ConsoleNotifier),
            handshake,
            unpack: UnpackConfig::default(),
        }
    }

    /// The real process, the real runtime, configuration from the environment.
    pub fn from_env() -> Self {
        Self::new(NativeProcess, DynamicRuntimeFactory, Handshake::from_env())
            .with_unpack(UnpackConfig::from_env())
    }

    pub fn with_observer(mut self, observer: impl ExtractionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn with_notifier(mut self, notifier: impl ErrorNotifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_unpack(mut self, unpack: UnpackConfig) -> Self {
        self.unpack = unpack;
        self
    }

    /// Launch with the given command line (program name first).
    pub fn run(&mut self, argv: Vec<OsString>) -> Result<LaunchOutcome> {
        let mut run = Run {
            session: LaunchSession::new(argv),
            options: RuntimeOptions::default(),
            runtime: None,
        };

        let mut state = LaunchState::ResolvingExecutable;
        let result = loop {
            debug!(state = state.name(), "launch state");
            match self.step(state, &mut run) {
                Ok(LaunchState::Done(outcome)) => break Ok(outcome),
                Ok(next) => state = next,
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = &result {
            error!(error = %e, "launch aborted");
            if let Some(mut runtime) = run.runtime.take() {
                runtime.finalize();
            }
            run.session.cleanup();
        }
        result
    }

    fn step(&mut self, state: LaunchState, run: &mut Run) -> Result<LaunchState> {
        let next = match state {
            LaunchState::ResolvingExecutable => {
                let argv0 = run.session.argv.first().map(OsString::as_os_str);
                run.session.executable = self.process.current_executable(argv0)?;
                LaunchState::OpeningArchive
            }

            LaunchState::OpeningArchive => {
                let archive = open_archive(&run.session.executable)?;
                run.options = RuntimeOptions::parse(archive.runtime_options());
                info!(
                    archive = %archive.path().display(),
                    runtime_version = archive.runtime_version(),
                    "archive opened"
                );
                LaunchState::DecidingExtraction(archive)
            }

            LaunchState::DecidingExtraction(archive) => {
                if let Some(dir) = self.handshake.extract_dir.clone() {
                    info!(dir = %dir.display(), "running from parent's extraction directory");
                    run.session.is_child = true;
                    run.session.home = dir;
                    self.process.clear_handshake();
                    LaunchState::RunningInPlace(archive)
                } else if archive.needs_extraction() {
                    LaunchState::ExtractingThenRespawning(archive)
                } else {
                    run.session.home = in_place_home(&run.session, &run.options);
                    LaunchState::RunningInPlace(archive)
                }
            }

            LaunchState::ExtractingThenRespawning(archive) => {
                let parent = extraction_parent(run.options.launcher.runtime_tmpdir.as_deref());
                let dir = create_extraction_dir(&parent)?;
                run.session.adopt_extraction_dir(dir.clone());

                let mut resolver =
                    DependencyResolver::new(run.session.executable_dir(), self.unpack);
                extract_all(
                    &archive,
                    &dir,
                    self.unpack,
                    &mut resolver,
                    &mut *self.observer,
                )?;
                // Release every open archive before the child starts.
                drop(resolver);
                drop(archive);

                run.session.home = dir.clone();
                self.process.expose_home(&dir)?;
                let exit = self.process.respawn(
                    &run.session,
                    &Handshake::for_child(&dir),
                    run.options.launcher.ignore_signals,
                )?;
                info!(?exit, "child finished");
                LaunchState::Finalizing(exit.into())
            }

            LaunchState::RunningInPlace(archive) => {
                let changed = self.process.expose_home(&run.session.home)?;
                if self.handshake.restarted {
                    self.process.clear_handshake();
                } else if changed && run.options.launcher.restart_libpath && !run.session.is_child
                {
                    info!("restarting so the loader sees the library search path");
                    drop(archive);
                    let exit = self.process.restart(&run.session)?;
                    return Ok(LaunchState::Finalizing(exit.into()));
                }
                LaunchState::BootstrappingRuntime(archive)
            }

            LaunchState::BootstrappingRuntime(archive) => {
                let settings = InitSettings::new(
                    run.session.executable.clone(),
                    run.session.home.clone(),
                    run.session.argv.clone(),
                    run.options.clone(),
                );
                let runtime = run
                    .runtime
                    .insert(self.runtimes.create(&archive, &run.session.home)?);
                if let StartOutcome::Exit(code) = runtime.start(&settings)? {
                    info!(code, "runtime requested exit during start-up");
                    return Ok(LaunchState::Finalizing(LaunchOutcome::Exit(code)));
                }
                let report = run_embedded_modules(&mut **runtime, &archive)?;
                let bundles = install_code_bundles(&mut **runtime, &archive)?;
                info!(
                    modules = report.executed.len(),
                    failed = report.failed.len(),
                    bundles,
                    "runtime bootstrapped"
                );
                LaunchState::RunningPayload(archive)
            }

            LaunchState::RunningPayload(archive) => {
                let runtime = run.runtime.as_mut().ok_or(BindingError::NotStarted)?;
                match run_payload_scripts(&mut **runtime, &archive) {
                    Ok(count) => {
                        debug!(count, "payload finished");
                        LaunchState::Finalizing(LaunchOutcome::Exit(0))
                    }
                    Err(BindingError::Script(script)) => {
                        self.notifier.unhandled_error(&script);
                        LaunchState::Finalizing(LaunchOutcome::Exit(UNHANDLED_ERROR_EXIT))
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            LaunchState::Finalizing(outcome) => {
                if let Some(mut runtime) = run.runtime.take() {
                    runtime.finalize();
                }
                run.session.cleanup();
                LaunchState::Done(outcome)
            }

            done @ LaunchState::Done(_) => done,
        };
        Ok(next)
    }
}

/// Home of an in-place run: the executable's directory, or the configured
/// contents directory beneath it.
fn in_place_home(session: &LaunchSession, options: &RuntimeOptions) -> PathBuf {
    let exe_dir = session.executable_dir();
    options
        .launcher
        .contents_directory
        .as_deref()
        .and_then(|dir| contained_join(exe_dir, dir))
        .unwrap_or_else(|| exe_dir.to_path_buf())
}
