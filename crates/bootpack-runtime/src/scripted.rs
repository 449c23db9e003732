//! In-process stand-in for the hosted runtime. Compiled only for tests.
//!
//! Module and script bodies are line-oriented:
//!
//! ```text
//! name = value       # bind a global
//! expect name value  # fail unless the global holds `value`
//! raise Anything     # fail
//! ```
//!
//! Globals are shared by modules and scripts, so ordering is observable.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{BindingError, Result};
use crate::hosted::{HostedRuntime, StartOutcome};
use crate::init::InitSettings;

/// Everything the scripted runtime observed.
#[derive(Debug, Default, Clone)]
pub struct Journal {
    /// `start`, `module:<name>`, `bundle:<loc>`, `script:<name>`, `finalize`.
    pub events: Vec<String>,
    pub globals: BTreeMap<String, String>,
    pub sys_path: Vec<String>,
    pub settings: Option<InitSettings>,
}

/// Clones share one journal, so a test keeps a handle while the launcher
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRuntime {
    journal: Arc<Mutex<Journal>>,
    exit_on_start: Option<i32>,
    started: bool,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime whose start-up requests an exit with `code`.
    pub fn exiting_on_start(code: i32) -> Self {
        Self {
            exit_on_start: Some(code),
            ..Self::default()
        }
    }

    /// Snapshot of the shared journal.
    pub fn journal(&self) -> Journal {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn execute(&self, body: &[u8]) -> std::result::Result<(), String> {
        let text = String::from_utf8_lossy(body);
        let mut journal = self.lock();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "raise" || line.starts_with("raise ") {
                return Err(line.to_string());
            }
            if let Some(rest) = line.strip_prefix("expect ") {
                let (name, want) = rest.split_once(' ').unwrap_or((rest, ""));
                let have = journal.globals.get(name.trim()).cloned();
                if have.as_deref() != Some(want.trim()) {
                    return Err(format!("expected {} == {:?}, found {:?}", name, want, have));
                }
                continue;
            }
            match line.split_once('=') {
                Some((name, value)) => {
                    journal
                        .globals
                        .insert(name.trim().to_string(), value.trim().to_string());
                }
                None => return Err(format!("syntax error: {}", line)),
            }
        }
        Ok(())
    }

    fn record(&self, event: String) {
        self.lock().events.push(event);
    }
}

impl HostedRuntime for ScriptedRuntime {
    fn start(&mut self, settings: &InitSettings) -> Result<StartOutcome> {
        self.record("start".to_string());
        self.lock().settings = Some(settings.clone());
        if let Some(code) = self.exit_on_start {
            return Ok(StartOutcome::Exit(code));
        }
        self.started = true;
        Ok(StartOutcome::Running)
    }

    fn run_module(&mut self, name: &str, code: &[u8]) -> Result<()> {
        if !self.started {
            return Err(BindingError::NotStarted);
        }
        self.record(format!("module:{}", name));
        self.execute(code)
            .map_err(|_| BindingError::Module(name.to_string()))
    }

    fn add_code_bundle(&mut self, location: &str) -> Result<()> {
        if !self.started {
            return Err(BindingError::NotStarted);
        }
        self.record(format!("bundle:{}", location));
        self.lock().sys_path.push(location.to_string());
        Ok(())
    }

    fn run_script(&mut self, name: &str, source: &[u8]) -> Result<()> {
        if !self.started {
            return Err(BindingError::NotStarted);
        }
        self.record(format!("script:{}", name));
        self.execute(source)
            .map_err(|_| BindingError::Script(name.to_string()))
    }

    fn finalize(&mut self) {
        if self.started {
            self.started = false;
            self.record("finalize".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RuntimeOptions;

    #[test]
    fn test_clones_share_journal() {
        let mut runtime = ScriptedRuntime::new();
        let observer = runtime.clone();
        let settings = InitSettings::new("/bin/app", "/home", vec![], RuntimeOptions::default());
        runtime.start(&settings).unwrap();
        runtime.run_script("main", b"x = 1\nexpect x 1").unwrap();
        runtime.finalize();
        runtime.finalize();

        let journal = observer.journal();
        assert_eq!(journal.events, vec!["start", "script:main", "finalize"]);
        assert_eq!(journal.settings.unwrap().home, std::path::PathBuf::from("/home"));
    }

    #[test]
    fn test_not_started_rejects_work() {
        let mut runtime = ScriptedRuntime::new();
        assert!(matches!(
            runtime.run_script("main", b""),
            Err(BindingError::NotStarted)
        ));
    }

    #[test]
    fn test_exit_on_start() {
        let mut runtime = ScriptedRuntime::exiting_on_start(3);
        let settings = InitSettings::new("/bin/app", "/home", vec![], RuntimeOptions::default());
        assert_eq!(runtime.start(&settings).unwrap(), StartOutcome::Exit(3));
    }
}
