//! Feeding archive entries to a started runtime, in TOC order.

use bootpack_archive::{Archive, EntryKind};
use tracing::{debug, warn};

use crate::error::Result;
use crate::hosted::HostedRuntime;

/// Outcome of the bootstrap-module pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub executed: Vec<String>,
    pub failed: Vec<String>,
}

/// Execute every compiled module/package entry in stored order.
///
/// A module that raises is logged and skipped; later modules still run.
/// Archive errors abort the pass.
pub fn run_embedded_modules<R>(runtime: &mut R, archive: &Archive) -> Result<BootstrapReport>
where
    R: HostedRuntime + ?Sized,
{
    let mut report = BootstrapReport::default();
    for entry in archive.entries() {
        let entry = entry?;
        if !entry.kind.is_bootstrap() {
            continue;
        }
        let code = archive.extract_to_memory(&entry)?;
        match runtime.run_module(entry.name, &code) {
            Ok(()) => report.executed.push(entry.name.to_string()),
            Err(e) => {
                warn!(module = entry.name, error = %e, "bootstrap module failed, continuing");
                report.failed.push(entry.name.to_string());
            }
        }
    }
    debug!(
        executed = report.executed.len(),
        failed = report.failed.len(),
        "bootstrap modules done"
    );
    Ok(report)
}

/// Location string of a code bundle: `<archive path>?<absolute offset>`.
pub fn code_bundle_location(archive: &Archive, offset: u32) -> String {
    format!(
        "{}?{}",
        archive.path().display(),
        archive.base_offset() + u64::from(offset)
    )
}

/// Put every code-bundle entry on the module search path.
pub fn install_code_bundles<R>(runtime: &mut R, archive: &Archive) -> Result<usize>
where
    R: HostedRuntime + ?Sized,
{
    let mut installed = 0;
    for entry in archive.entries() {
        let entry = entry?;
        if entry.kind != EntryKind::CodeBundle {
            continue;
        }
        runtime.add_code_bundle(&code_bundle_location(archive, entry.offset))?;
        installed += 1;
    }
    Ok(installed)
}

/// Run payload scripts in stored order, stopping at the first that raises.
pub fn run_payload_scripts<R>(runtime: &mut R, archive: &Archive) -> Result<usize>
where
    R: HostedRuntime + ?Sized,
{
    let mut ran = 0;
    for entry in archive.entries() {
        let entry = entry?;
        if entry.kind != EntryKind::Script {
            continue;
        }
        let source = archive.extract_to_memory(&entry)?;
        debug!(script = entry.name, "running payload script");
        runtime.run_script(entry.name, &source)?;
        ran += 1;
    }
    Ok(ran)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindingError;
    use crate::init::InitSettings;
    use crate::options::RuntimeOptions;
    use crate::scripted::ScriptedRuntime;
    use bootpack_archive::ArchiveBuilder;
    use tempfile::TempDir;

    fn open(dir: &TempDir, builder: ArchiveBuilder) -> Archive {
        let path = dir.path().join("app");
        builder.write_to(&path).unwrap();
        Archive::open(&path).unwrap()
    }

    fn started(runtime: &mut ScriptedRuntime) {
        let settings = InitSettings::new("/app", "/app", vec![], RuntimeOptions::default());
        runtime.start(&settings).unwrap();
    }

    #[test]
    fn test_module_runs_before_script() {
        let dir = TempDir::new().unwrap();
        let archive = open(
            &dir,
            ArchiveBuilder::new()
                .entry(EntryKind::Script, "main", b"expect greeting hello", true)
                .entry(EntryKind::Module, "greeter", b"greeting = hello", true),
        );
        let mut runtime = ScriptedRuntime::new();
        started(&mut runtime);

        let report = run_embedded_modules(&mut runtime, &archive).unwrap();
        assert_eq!(report.executed, vec!["greeter"]);
        assert_eq!(run_payload_scripts(&mut runtime, &archive).unwrap(), 1);
    }

    #[test]
    fn test_failing_module_does_not_stop_bootstrap() {
        let dir = TempDir::new().unwrap();
        let archive = open(
            &dir,
            ArchiveBuilder::new()
                .entry(EntryKind::Module, "broken", b"raise ImportError", false)
                .entry(EntryKind::Package, "pkg", b"pkg_loaded = yes", false),
        );
        let mut runtime = ScriptedRuntime::new();
        started(&mut runtime);

        let report = run_embedded_modules(&mut runtime, &archive).unwrap();
        assert_eq!(report.failed, vec!["broken"]);
        assert_eq!(report.executed, vec!["pkg"]);
        assert_eq!(
            runtime.journal().globals.get("pkg_loaded").map(String::as_str),
            Some("yes")
        );
    }

    #[test]
    fn test_script_error_stops_remaining_scripts() {
        let dir = TempDir::new().unwrap();
        let archive = open(
            &dir,
            ArchiveBuilder::new()
                .entry(EntryKind::Script, "first", b"raise RuntimeError", false)
                .entry(EntryKind::Script, "second", b"second_ran = yes", false),
        );
        let mut runtime = ScriptedRuntime::new();
        started(&mut runtime);

        let err = run_payload_scripts(&mut runtime, &archive).unwrap_err();
        assert!(matches!(err, BindingError::Script(ref name) if name == "first"));
        assert!(!runtime.journal().globals.contains_key("second_ran"));
    }

    #[test]
    fn test_code_bundles_use_absolute_offsets() {
        let dir = TempDir::new().unwrap();
        let archive = open(
            &dir,
            ArchiveBuilder::new()
                .prefix(vec![0u8; 512])
                .entry(EntryKind::Data, "pad", b"0123456789", false)
                .entry(EntryKind::CodeBundle, "bundle.pyz", b"PYZ", false),
        );
        let mut runtime = ScriptedRuntime::new();
        started(&mut runtime);

        assert_eq!(install_code_bundles(&mut runtime, &archive).unwrap(), 1);
        let expected = format!("{}?{}", archive.path().display(), 512 + 10);
        assert_eq!(runtime.journal().sys_path, vec![expected]);
    }
}
