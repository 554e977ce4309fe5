//! Git publishing for the data repository.
//!
//! Every operation shells out to `git -C <repo>`; a non-zero exit becomes
//! [`SyncError::Git`] carrying the command and its stderr.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use fs2::FileExt;
use outagewatch_core::CommitAuthor;

use crate::error::{io_err, SyncError};

const LOCK_FILE: &str = "outagewatch.lock";

/// A working tree of the data repository.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
    author: Option<CommitAuthor>,
}

impl GitRepo {
    /// Open an existing work tree.
    pub fn open(root: impl Into<PathBuf>, author: Option<CommitAuthor>) -> Result<Self, SyncError> {
        let repo = Self {
            root: root.into(),
            author,
        };
        repo.run_git(&["rev-parse", "--is-inside-work-tree"])?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.root);
        if let Some(author) = &self.author {
            cmd.arg("-c").arg(format!("user.name={}", author.name));
            cmd.arg("-c").arg(format!("user.email={}", author.email));
        }
        cmd.args(args);
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output, SyncError> {
        tracing::debug!("git {}", args.join(" "));
        self.command(args)
            .output()
            .map_err(|e| io_err(&self.root, e))
    }

    fn run_git(&self, args: &[&str]) -> Result<String, SyncError> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(git_err(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Absolute path of the `.git` directory.
    pub fn git_dir(&self) -> Result<PathBuf, SyncError> {
        let dir = PathBuf::from(self.run_git(&["rev-parse", "--git-dir"])?);
        Ok(if dir.is_absolute() {
            dir
        } else {
            self.root.join(dir)
        })
    }

    pub fn head(&self) -> Result<String, SyncError> {
        self.run_git(&["rev-parse", "HEAD"])
    }

    /// Stage paths relative to the work tree.
    pub fn stage(&self, paths: &[&Path]) -> Result<(), SyncError> {
        let owned: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        let mut args = vec!["add", "--"];
        args.extend(owned.iter().map(String::as_str));
        self.run_git(&args).map(|_| ())
    }

    /// Whether the index differs from `HEAD` (or holds anything, before the
    /// first commit).
    pub fn has_staged_changes(&self) -> Result<bool, SyncError> {
        let args = ["diff", "--cached", "--quiet"];
        let output = self.output(&args)?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(git_err(&args, &output)),
        }
    }

    /// Commit the index and return the new commit hash.
    pub fn commit(&self, message: &str) -> Result<String, SyncError> {
        self.run_git(&["commit", "--quiet", "-m", message])?;
        self.head()
    }

    /// Whether `HEAD` points at a commit (false on an unborn branch).
    pub fn has_head(&self) -> Result<bool, SyncError> {
        let args = ["rev-parse", "--verify", "--quiet", "HEAD"];
        let output = self.output(&args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(git_err(&args, &output)),
        }
    }

    /// Commit `branch` points at on `remote`, `None` if it does not exist yet.
    pub fn remote_head(&self, remote: &str, branch: &str) -> Result<Option<String>, SyncError> {
        let refname = format!("refs/heads/{branch}");
        let args = ["ls-remote", "--exit-code", remote, &refname];
        let output = self.output(&args)?;
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout)
                .split_whitespace()
                .next()
                .map(str::to_string)),
            Some(2) => Ok(None),
            _ => Err(git_err(&args, &output)),
        }
    }

    /// Whether `branch` exists on `remote` (false for a freshly created remote).
    pub fn remote_has_branch(&self, remote: &str, branch: &str) -> Result<bool, SyncError> {
        Ok(self.remote_head(remote, branch)?.is_some())
    }

    /// Bring the work tree up to date with `remote/branch` before anything is
    /// written.
    ///
    /// Uncommitted changes to tracked files are discarded. Local commits are
    /// rebased onto the remote; if they conflict they are dropped, since the
    /// next commit is rebuilt from a fresh fetch anyway.
    pub fn sync_with_remote(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        if !self.remote_has_branch(remote, branch)? {
            return Ok(());
        }
        self.run_git(&["fetch", "--quiet", remote, branch])?;

        if !self.has_head()? {
            self.run_git(&["reset", "--hard", "--quiet", "FETCH_HEAD"])?;
            return Ok(());
        }
        self.run_git(&["reset", "--hard", "--quiet", "HEAD"])?;

        if let Err(err) = self.run_git(&["rebase", "--quiet", "FETCH_HEAD"]) {
            if let Err(abort) = self.run_git(&["rebase", "--abort"]) {
                tracing::debug!("rebase --abort: {abort}");
            }
            tracing::warn!("dropping local commits that conflict with {remote}/{branch}: {err}");
            self.run_git(&["reset", "--hard", "--quiet", "FETCH_HEAD"])?;
        }
        Ok(())
    }

    /// `git pull --rebase`; a failed rebase is aborted before returning.
    pub fn pull_rebase(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        match self.run_git(&["pull", "--rebase", "--quiet", remote, branch]) {
            Ok(_) => Ok(()),
            Err(err) => {
                if let Err(abort) = self.run_git(&["rebase", "--abort"]) {
                    tracing::debug!("rebase --abort: {abort}");
                }
                Err(err)
            }
        }
    }

    /// Number of local commits `remote/branch` does not have yet.
    ///
    /// Assumes the remote head has been fetched (after [`Self::pull_rebase`]
    /// or [`Self::sync_with_remote`]).
    pub fn unpushed_commits(&self, remote: &str, branch: &str) -> Result<usize, SyncError> {
        if !self.has_head()? {
            return Ok(0);
        }
        let range = match self.remote_head(remote, branch)? {
            Some(commit) => format!("{commit}..HEAD"),
            None => "HEAD".to_string(),
        };
        let count = self.run_git(&["rev-list", "--count", &range])?;
        count.parse().map_err(|_| SyncError::Git {
            command: format!("rev-list --count {range}"),
            stderr: format!("unexpected output: {count}"),
        })
    }

    pub fn push(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        let refspec = format!("HEAD:{branch}");
        self.run_git(&["push", "--quiet", remote, &refspec])
            .map(|_| ())
    }

    /// Take the repository lock for the lifetime of the returned guard.
    pub fn lock(&self) -> Result<RepoLock, SyncError> {
        RepoLock::acquire(self.git_dir()?.join(LOCK_FILE))
    }
}

fn git_err(args: &[&str], output: &Output) -> SyncError {
    SyncError::Git {
        command: args.join(" "),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

/// Exclusive per-repository run lock.
///
/// An advisory lock on the file, held for the lifetime of the guard and
/// released by the OS if the process dies. The file itself stays behind and
/// only records the pid of the last holder.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    _file: File,
}

impl RepoLock {
    pub fn acquire(path: PathBuf) -> Result<Self, SyncError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(SyncError::Locked { path });
            }
            return Err(io_err(&path, err));
        }

        file.set_len(0).map_err(|e| io_err(&path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| io_err(&path, e))?;
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
