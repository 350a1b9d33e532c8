//! Remote mirrors holding a second copy of the sessions

mod file;
mod sheets;

use std::fmt;

pub use file::FileRemote;
pub use sheets::SheetsRemote;

use crate::config::RemoteConfig;
use crate::error::Result;
use crate::models::Session;

/// Stable address of a row inside a remote mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHandle(pub usize);

impl fmt::Display for RowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A session as read from a remote, with the address to overwrite it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRow {
    pub session: Session,
    pub handle: RowHandle,
}

/// Read/append/overwrite access to a remote copy of the sessions
pub trait RemoteMirror {
    fn read_all(&mut self) -> Result<Vec<RemoteRow>>;

    fn append(&mut self, session: &Session) -> Result<()>;

    fn overwrite(&mut self, handle: RowHandle, session: &Session) -> Result<()>;
}

/// Remote kinds known to the configuration
#[derive(Debug)]
pub enum Remote {
    File(FileRemote),
    Spreadsheet(SheetsRemote),
}

impl Remote {
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        match config {
            RemoteConfig::File(file) => Ok(Self::File(FileRemote::new(&file.path))),
            RemoteConfig::Spreadsheet(sheet) => Ok(Self::Spreadsheet(SheetsRemote::new(sheet)?)),
        }
    }

    fn inner(&mut self) -> &mut dyn RemoteMirror {
        match self {
            Self::File(remote) => remote,
            Self::Spreadsheet(remote) => remote,
        }
    }
}

impl RemoteMirror for Remote {
    fn read_all(&mut self) -> Result<Vec<RemoteRow>> {
        self.inner().read_all()
    }

    fn append(&mut self, session: &Session) -> Result<()> {
        tracing::debug!("Appending {}", session);
        self.inner().append(session)
    }

    fn overwrite(&mut self, handle: RowHandle, session: &Session) -> Result<()> {
        tracing::debug!("Overwriting row {} with {}", handle, session);
        self.inner().overwrite(handle, session)
    }
}
