//! Launch orchestration.
//!
//! [`Launcher`] finds the archive for the running executable, decides
//! between extracting into a temp directory and re-running itself as a
//! child, or running in place, then bootstraps the hosted runtime and runs
//! the payload. Dependencies on sibling packages are resolved by
//! [`DependencyResolver`].

pub mod dependency;
mod error;
pub mod executable;
pub mod extract;
pub mod libpath;
pub mod locate;
pub mod notify;
mod orchestrator;
pub mod process;
pub mod session;

pub use dependency::{split_reference, ArchivePool, DependencyResolver};
pub use error::{LaunchError, Result};
pub use extract::{ExtractionObserver, LoggingObserver};
pub use notify::{ConsoleNotifier, ErrorNotifier};
pub use orchestrator::{DynamicRuntimeFactory, LaunchOutcome, Launcher, RuntimeFactory};
pub use process::{ChildExit, NativeProcess, ProcessControl};
pub use session::LaunchSession;
