//! Discovery of recordings that are actively being written
//!
//! A [`DiscoverySource`] reports the full set of candidate paths on every
//! scan; [`ScanDiff::between`] turns consecutive scans into add/remove events.
//! [`ProcScanner`] finds running `ttyrec` processes through `/proc`.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::{BroadcastError, Result};

/// Name of the recorder binary whose output files are broadcast
pub const TTYREC_PROGRAM: &str = "ttyrec";

/// File ttyrec writes when no path is given on its command line
pub const TTYREC_DEFAULT_FILE: &str = "ttyrecord";

/// Trait for periodic discovery of recording files
#[async_trait::async_trait]
pub trait DiscoverySource: Send + 'static {
    /// Current set of paths believed to be actively recording
    async fn scan(&mut self) -> Result<HashSet<PathBuf>>;
}

/// Difference between the monitored set and the latest scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanDiff {
    pub added: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
}

impl ScanDiff {
    /// Compute which paths appeared and which disappeared
    pub fn between<'a, I>(known: I, current: &HashSet<PathBuf>) -> Self
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let known: HashSet<&PathBuf> = known.into_iter().collect();
        let added = current.iter().filter(|p| !known.contains(p)).cloned().collect();
        let removed = known.into_iter().filter(|p| !current.contains(*p)).cloned().collect();
        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Discovery through the Linux process table
#[derive(Debug, Clone)]
pub struct ProcScanner {
    proc_root: PathBuf,
}

impl Default for ProcScanner {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcScanner {
    /// Scan a procfs mounted at `proc_root`
    pub fn new<P: AsRef<Path>>(proc_root: P) -> Self {
        Self { proc_root: proc_root.as_ref().to_path_buf() }
    }

    /// Synchronous scan of every `<pid>/cmdline`
    pub fn scan_now(&self) -> Result<HashSet<PathBuf>> {
        let entries = std::fs::read_dir(&self.proc_root).map_err(|e| {
            BroadcastError::discovery_failed(
                format!("cannot list {}", self.proc_root.display()),
                Some(e),
            )
        })?;

        let mut found = HashSet::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().filter(|n| n.bytes().all(|b| b.is_ascii_digit())) else {
                continue;
            };

            // Processes exit between listing and reading: treat as never seen
            let Ok(raw) = std::fs::read(entry.path().join("cmdline")) else {
                continue;
            };
            let argv = split_cmdline(&raw);
            let Some(target) = recording_path(&argv) else {
                continue;
            };

            let path = if target.is_absolute() {
                target
            } else {
                match std::fs::read_link(entry.path().join("cwd")) {
                    Ok(cwd) => cwd.join(target),
                    Err(e) => {
                        trace!(pid, "Skipping ttyrec with unreadable cwd: {}", e);
                        continue;
                    }
                }
            };

            trace!(pid, path = %path.display(), "Found active ttyrec");
            found.insert(path);
        }

        debug!(count = found.len(), "Process scan complete");
        Ok(found)
    }
}

#[async_trait::async_trait]
impl DiscoverySource for ProcScanner {
    async fn scan(&mut self) -> Result<HashSet<PathBuf>> {
        self.scan_now()
    }
}

/// Split a NUL-separated `/proc/<pid>/cmdline`
pub fn split_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|b| *b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

/// Output file of a ttyrec invocation, if `argv` is one
///
/// Understands `ttyrec [-a] [-u] [-e command] [file]`.
pub fn recording_path(argv: &[String]) -> Option<PathBuf> {
    let program = argv.first()?;
    let name = Path::new(program).file_name()?.to_str()?;
    if name != TTYREC_PROGRAM {
        return None;
    }

    let mut args = argv[1..].iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-e" => {
                args.next();
            }
            "--" => return args.next().map(PathBuf::from),
            flag if flag.starts_with('-') && flag.len() > 1 => {}
            path => return Some(PathBuf::from(path)),
        }
    }
    Some(PathBuf::from(TTYREC_DEFAULT_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn recognises_ttyrec_invocations() {
        assert_eq!(recording_path(&argv(&["ttyrec", "/tmp/a.tty"])), Some(PathBuf::from("/tmp/a.tty")));
        assert_eq!(
            recording_path(&argv(&["/usr/bin/ttyrec", "-a", "-e", "bash -l", "out.tty"])),
            Some(PathBuf::from("out.tty"))
        );
        assert_eq!(recording_path(&argv(&["ttyrec"])), Some(PathBuf::from(TTYREC_DEFAULT_FILE)));
        assert_eq!(recording_path(&argv(&["ttyrec", "--", "-odd"])), Some(PathBuf::from("-odd")));
        assert_eq!(recording_path(&argv(&["ttyplay", "/tmp/a.tty"])), None);
        assert_eq!(recording_path(&argv(&[])), None);
    }

    #[test]
    fn splits_nul_separated_cmdline() {
        assert_eq!(split_cmdline(b"ttyrec\0/tmp/x\0"), argv(&["ttyrec", "/tmp/x"]));
        assert!(split_cmdline(b"").is_empty());
    }

    #[test]
    fn diff_reports_additions_and_removals() {
        let known: HashSet<PathBuf> = ["/a", "/b"].iter().map(PathBuf::from).collect();
        let current: HashSet<PathBuf> = ["/b", "/c"].iter().map(PathBuf::from).collect();
        let diff = ScanDiff::between(&known, &current);
        assert_eq!(diff.added.into_iter().collect::<Vec<_>>(), vec![PathBuf::from("/c")]);
        assert_eq!(diff.removed.into_iter().collect::<Vec<_>>(), vec![PathBuf::from("/a")]);
        assert!(ScanDiff::between(&current, &current).is_empty());
    }

    #[test]
    fn scans_fake_proc_tree() {
        let root = tempfile::tempdir().expect("tempdir");
        let make = |pid: &str, cmdline: &[u8]| {
            let dir = root.path().join(pid);
            std::fs::create_dir(&dir).expect("pid dir");
            std::fs::write(dir.join("cmdline"), cmdline).expect("cmdline");
            dir
        };

        make("101", b"ttyrec\0/var/tty/alice.tty\0");
        make("102", b"bash\0-l\0");
        let relative = make("103", b"ttyrec\0bob.tty\0");
        #[cfg(unix)]
        std::os::unix::fs::symlink("/home/bob", relative.join("cwd")).expect("cwd link");
        std::fs::create_dir(root.path().join("self-not-a-pid")).expect("non pid");

        let found = ProcScanner::new(root.path()).scan_now().expect("scan");
        assert!(found.contains(Path::new("/var/tty/alice.tty")));
        #[cfg(unix)]
        assert!(found.contains(Path::new("/home/bob/bob.tty")));
        assert!(found.len() <= 2);
    }

    #[test]
    fn missing_proc_root_is_retryable() {
        let err = ProcScanner::new("/nonexistent/proc").scan_now().expect_err("no procfs");
        assert!(err.is_retryable());
    }
}
