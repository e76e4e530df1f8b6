//! Named network namespaces, compatible with `ip netns`.
//!
//! A namespace is kept alive by bind mounting its `nsfs` file onto `<run_dir>/<prefix><name>`,
//! so no process has to stay inside it. Namespaces created here show up in `ip netns list` and
//! vice versa.

use std::{
    fs::{self, File, OpenOptions},
    os::{
        fd::{AsFd, BorrowedFd},
        unix::fs::OpenOptionsExt,
    },
    path::{Path, PathBuf},
};

use mirage_netlink::{Session, SessionOptions};
use nix::{
    errno::Errno,
    mount::{mount, umount2, MntFlags, MsFlags},
    sched::{setns, unshare, CloneFlags},
    sys::stat::Mode,
    unistd::mkdir,
};

use crate::{link::VethEnd, Error, Result};

/// Directory `ip netns` keeps named namespaces in.
pub const NETNS_RUN_DIR: &str = "/var/run/netns";

/// Namespace of the calling thread. `/proc/self` would name the main thread's.
const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// Namespace of the init process, i.e. the host's default namespace.
const INIT_NETNS: &str = "/proc/1/ns/net";

#[derive(Debug, Clone)]
pub struct NamespaceOptions {
    /// Directory the namespace files are mounted in.
    pub run_dir: PathBuf,
    /// Prepended to every namespace name, to keep emulated hosts apart from other namespaces.
    pub prefix: String,
    /// Options of the session opened inside each namespace.
    pub session: SessionOptions,
}

impl Default for NamespaceOptions {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from(NETNS_RUN_DIR),
            prefix: String::new(),
            session: SessionOptions::default(),
        }
    }
}

impl NamespaceOptions {
    pub fn with_run_dir(mut self, run_dir: impl Into<PathBuf>) -> Self {
        self.run_dir = run_dir.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_session_options(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    /// Path of the file backing the namespace `name`.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        let file_name = format!("{}{name}", self.prefix);
        if name.is_empty() ||
            file_name.contains(['/', '\0']) ||
            file_name == "." ||
            file_name == ".."
        {
            return Err(Error::InvalidNamespaceName(file_name));
        }

        Ok(self.run_dir.join(file_name))
    }
}

/// Creates the run directory and turns it into a shared mount, the way `ip netns add` does.
///
/// If the directory is not a mount point yet, it is bind mounted onto itself first. Needs
/// `CAP_SYS_ADMIN`.
pub fn setup_environment(options: &NamespaceOptions) -> Result<()> {
    let run_dir = options.run_dir.as_path();

    match mkdir(run_dir, Mode::from_bits_truncate(0o755)) {
        Ok(()) | Err(Errno::EEXIST) => {}
        Err(errno) => {
            tracing::error!(%errno, ?run_dir, "could not create the network namespace directory");
            return Err(errno.into());
        }
    }

    let mut bound = false;
    loop {
        match mount(Some(""), run_dir, Some("none"), MsFlags::MS_SHARED | MsFlags::MS_REC, None::<&str>) {
            Ok(()) => break,
            // Not a mount point yet.
            Err(Errno::EINVAL) if !bound => {
                tracing::debug!(?run_dir, "bind mounting network namespace directory");
                mount(Some(run_dir), run_dir, Some("none"), MsFlags::MS_BIND, None::<&str>)
                    .map_err(|errno| {
                        tracing::error!(%errno, ?run_dir, "could not bind mount the network namespace directory");
                        errno
                    })?;
                bound = true;
            }
            Err(errno) => {
                tracing::error!(%errno, ?run_dir, "could not mount the network namespace directory");
                return Err(errno.into());
            }
        }
    }

    tracing::debug!(?run_dir, "network namespace directory ready");
    Ok(())
}

/// A named network namespace together with a netlink session bound inside it.
#[derive(Debug)]
pub struct NetworkNamespace {
    name: String,
    path: PathBuf,
    file: File,
    session: Session,
}

impl NetworkNamespace {
    /// Opens the namespace `name`, creating it if it does not exist. With `exclusive`, fails if it
    /// already exists.
    ///
    /// The calling thread is left inside the namespace. If the namespace was created by this call
    /// and a later step fails, it is deleted again.
    pub fn open(name: &str, exclusive: bool, options: &NamespaceOptions) -> Result<Self> {
        let path = options.path(name)?;

        let existing = if exclusive { None } else { File::open(&path).ok() };
        let created = existing.is_none();

        let file = match existing {
            Some(file) => {
                setns(file.as_fd(), CloneFlags::CLONE_NEWNET).map_err(|errno| {
                    tracing::error!(%errno, ?path, "failed to enter existing network namespace");
                    errno
                })?;
                file
            }
            None => {
                create(&path, exclusive)?;
                // A descriptor opened before the bind mount does not refer to the namespace.
                File::open(&path).map_err(|e| {
                    rollback(&path);
                    e
                })?
            }
        };

        let session = match Session::open_with(options.session.clone()) {
            Ok(session) => session,
            Err(e) => {
                if created {
                    rollback(&path);
                }
                return Err(e.into());
            }
        };

        tracing::debug!(name, ?path, created, "opened network namespace");
        Ok(Self { name: name.to_owned(), path, file, session })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the bind mounted namespace file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The netlink session bound inside this namespace.
    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    /// A veth end named `name` to be placed in this namespace.
    pub fn veth_end<'a>(&'a self, name: &'a str) -> VethEnd<'a> {
        VethEnd::new(name, self.file.as_fd())
    }

    /// Moves the calling thread into this namespace.
    pub fn enter(&self) -> Result<()> {
        tracing::debug!(name = self.name, "switching to network namespace");
        setns(self.file.as_fd(), CloneFlags::CLONE_NEWNET)?;
        Ok(())
    }

    /// Closes the session and the namespace descriptor. The namespace itself stays alive until it
    /// is deleted with [`delete_namespace`].
    pub fn close(self) -> Result<()> {
        self.session.close()?;
        Ok(())
    }
}

impl AsFd for NetworkNamespace {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

/// Creates the namespace file, a fresh namespace for the calling thread, and binds the two.
fn create(path: &Path, exclusive: bool) -> Result<()> {
    let mut open = OpenOptions::new();
    open.write(true).mode(0o444);
    if exclusive {
        open.create_new(true);
    } else {
        open.create(true);
    }
    open.open(path).map_err(|e| {
        tracing::error!(?e, ?path, "failed to create network namespace file");
        e
    })?;

    if let Err(errno) = unshare(CloneFlags::CLONE_NEWNET) {
        tracing::error!(%errno, "failed to instantiate a new network namespace");
        let _ = fs::remove_file(path);
        return Err(errno.into());
    }

    // The mount keeps the namespace alive until it is explicitly unmounted.
    if let Err(errno) = mount(Some(THREAD_NETNS), path, Some("none"), MsFlags::MS_BIND, None::<&str>) {
        tracing::error!(%errno, ?path, "failed to bind new network namespace file");
        let _ = fs::remove_file(path);
        return Err(errno.into());
    }

    Ok(())
}

fn rollback(path: &Path) {
    if let Err(e) = remove(path) {
        tracing::warn!(?e, ?path, "failed to remove network namespace after failed open");
    }
}

fn remove(path: &Path) -> Result<()> {
    // A lazy unmount keeps the namespace alive for processes still using it.
    umount2(path, MntFlags::MNT_DETACH)?;
    fs::remove_file(path)?;
    Ok(())
}

/// Deletes the namespace `name`, compatible with `ip netns delete`.
pub fn delete_namespace(name: &str, options: &NamespaceOptions) -> Result<()> {
    let path = options.path(name)?;
    tracing::debug!(name, ?path, "deleting network namespace");

    remove(&path).map_err(|e| {
        tracing::error!(?e, ?path, "failed to delete network namespace");
        e
    })
}

/// Moves the calling thread back into the host's default namespace.
pub fn enter_default() -> Result<()> {
    tracing::debug!("switching to default network namespace");

    let file = File::open(INIT_NETNS)?;
    setns(file.as_fd(), CloneFlags::CLONE_NEWNET)?;
    Ok(())
}
