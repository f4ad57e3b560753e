//! Byte stream access to instruments.
//!
//! A [`Connector`] knows how to list candidate devices and how to open one
//! of them as a [`Transport`]. Framing and the command protocol live in
//! [`crate::session`].

use async_trait::async_trait;
use std::{
    fmt, io,
    path::{Path, PathBuf},
};
use tokio::io::{AsyncRead, AsyncWrite};

/// Duplex byte stream bound to one physical device.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedTransport = Box<dyn Transport>;

#[async_trait]
pub trait Connector: Send + Sync {
    type Id: fmt::Display + Send + Sync;

    /// Candidate devices to try. Every call enumerates again.
    fn candidates(&self) -> io::Result<Vec<Self::Id>>;

    async fn open(&self, id: &Self::Id) -> io::Result<BoxedTransport>;
}

/// Linux `usbtmc` kernel driver character devices (`/dev/usbtmc0`, ...).
#[derive(Debug, Clone)]
pub struct UsbtmcConnector {
    dir: PathBuf,
}

impl UsbtmcConnector {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for UsbtmcConnector {
    fn default() -> Self {
        Self::new(crate::DEFAULT_DEVICE_DIR)
    }
}

#[async_trait]
impl Connector for UsbtmcConnector {
    type Id = DevicePath;

    fn candidates(&self) -> io::Result<Vec<Self::Id>> {
        let mut nodes = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with("usbtmc") {
                nodes.push(DevicePath(entry.path()));
            }
        }
        nodes.sort();
        Ok(nodes)
    }

    async fn open(&self, id: &Self::Id) -> io::Result<BoxedTransport> {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&id.0)
            .await?;
        Ok(Box::new(file))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DevicePath(pub PathBuf);

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rigolctrl-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn lists_usbtmc_nodes_sorted() {
        let dir = scratch_dir("list");
        for name in ["usbtmc1", "ttyUSB0", "usbtmc0"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        let connector = UsbtmcConnector::new(&dir);
        let found: Vec<String> = connector
            .candidates()
            .unwrap()
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(
            found,
            vec![
                dir.join("usbtmc0").display().to_string(),
                dir.join("usbtmc1").display().to_string()
            ]
        );
        // restartable
        assert_eq!(connector.candidates().unwrap().len(), 2);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_dir_is_io_error() {
        let connector = UsbtmcConnector::new("/nonexistent/rigolctrl");
        assert!(connector.candidates().is_err());
    }

    #[tokio::test]
    async fn open_missing_node_fails() {
        let dir = scratch_dir("open");
        let connector = UsbtmcConnector::new(&dir);
        let err = connector
            .open(&DevicePath(dir.join("usbtmc9")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
