//! SSH/SFTP remote access
//!
//! Implements [`RemoteAccess`] over an ssh2 session. The session can be
//! opened and closed at any time; operations attempted while disconnected
//! fail with [`TransferError::ConnectionUnavailable`].

use crate::config::RemoteConfig;
use crate::error::{IoResultExt, Result, TransferError};
use crate::remote::{stream_chunks, ChunkHook, DirEntry, FileStat, RemoteAccess};
use ssh2::{ErrorCode, Session, Sftp};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

// libssh2 SFTP status codes
const FX_NO_SUCH_FILE: i32 = 2;
const FX_PERMISSION_DENIED: i32 = 3;
const FX_NO_SUCH_PATH: i32 = 10;
const FX_FILE_ALREADY_EXISTS: i32 = 11;

/// Open SSH session with its SFTP channel
struct SftpConnection {
    /// Kept alive for the lifetime of the SFTP channel
    session: Session,
    sftp: Sftp,
}

/// SFTP-backed remote store
pub struct SftpRemote {
    /// Remote configuration
    config: RemoteConfig,
    /// Bytes per streamed chunk
    chunk_size: usize,
    connection: Mutex<Option<SftpConnection>>,
    connected: AtomicBool,
}

impl SftpRemote {
    /// Create a disconnected remote for `config`
    pub fn new(config: RemoteConfig, chunk_size: usize) -> Self {
        Self {
            config,
            chunk_size: chunk_size.max(1),
            connection: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Connect and authenticate, replacing any existing session
    pub fn connect(&self) -> Result<()> {
        self.disconnect();

        let config = &self.config;
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| TransferError::connection(&config.host, e.to_string()))?
            .next()
            .ok_or_else(|| TransferError::connection(&config.host, "Host not found"))?;

        let tcp = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| TransferError::connection(&config.host, e.to_string()))?;

        let mut session = Session::new()
            .map_err(|e| TransferError::connection(&config.host, e.to_string()))?;
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| TransferError::connection(&config.host, e.to_string()))?;

        Self::authenticate(&mut session, config)?;

        // Per-call timeouts apply to the handshake only; transfers may block
        session.set_timeout(0);

        let sftp = session
            .sftp()
            .map_err(|e| TransferError::connection(&config.host, e.to_string()))?;

        *self.lock() = Some(SftpConnection { session, sftp });
        self.connected.store(true, Ordering::SeqCst);
        info!(remote = %config.display_name(), "Connected");
        Ok(())
    }

    /// Close the session if one is open
    pub fn disconnect(&self) {
        let previous = self.lock().take();
        self.connected.store(false, Ordering::SeqCst);

        if let Some(conn) = previous {
            drop(conn.sftp);
            if let Err(e) = conn.session.disconnect(None, "closing", None) {
                debug!(error = %e, "Disconnect failed");
            }
            info!(remote = %self.config.display_name(), "Disconnected");
        }
    }

    /// Probe the session with a listing of `/`; drops it when dead
    pub fn test_connection(&self) -> bool {
        let alive = self
            .with_sftp(|sftp| sftp.readdir(Path::new("/")).map_err(|e| map_sftp_error(Path::new("/"), e)))
            .is_ok();
        if !alive && self.is_connected() {
            warn!(remote = %self.config.display_name(), "Connection lost");
            self.disconnect();
        }
        alive
    }

    /// Default remote directory for the configured user
    pub fn home_path(&self) -> PathBuf {
        PathBuf::from(format!("/home/{}", self.config.user))
    }

    /// Remote configuration
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Authenticate with the remote host
    fn authenticate(session: &mut Session, config: &RemoteConfig) -> Result<()> {
        if let Some(key_path) = &config.key_path {
            session
                .userauth_pubkey_file(&config.user, None, key_path, None)
                .map_err(|e| TransferError::auth(&config.user, &config.host, e.to_string()))?;
        } else if let Some(password) = &config.password {
            session
                .userauth_password(&config.user, password)
                .map_err(|e| TransferError::auth(&config.user, &config.host, e.to_string()))?;
        } else {
            let mut agent = session
                .agent()
                .map_err(|e| TransferError::auth(&config.user, &config.host, e.to_string()))?;
            agent
                .connect()
                .map_err(|e| TransferError::auth(&config.user, &config.host, e.to_string()))?;
            agent
                .list_identities()
                .map_err(|e| TransferError::auth(&config.user, &config.host, e.to_string()))?;

            let identities = agent.identities().unwrap_or_default();
            let authenticated = identities
                .iter()
                .any(|identity| agent.userauth(&config.user, identity).is_ok());

            if !authenticated {
                return Err(TransferError::auth(
                    &config.user,
                    &config.host,
                    "No valid SSH key found in agent",
                ));
            }
        }

        if !session.authenticated() {
            return Err(TransferError::auth(
                &config.user,
                &config.host,
                "Authentication failed",
            ));
        }

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<SftpConnection>> {
        self.connection.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_sftp<T>(&self, f: impl FnOnce(&Sftp) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        match guard.as_ref() {
            Some(conn) => f(&conn.sftp),
            None => Err(TransferError::ConnectionUnavailable),
        }
    }
}

impl Drop for SftpRemote {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl RemoteAccess for SftpRemote {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn stat(&self, path: &Path) -> Result<FileStat> {
        self.with_sftp(|sftp| {
            let stat = sftp.stat(path).map_err(|e| map_sftp_error(path, e))?;
            Ok(FileStat {
                size: stat.size.unwrap_or(0),
                is_dir: stat.is_dir(),
                mtime: stat.mtime.unwrap_or(0),
            })
        })
    }

    fn list(&self, path: &Path) -> Result<Vec<DirEntry>> {
        self.with_sftp(|sftp| {
            let entries = sftp.readdir(path).map_err(|e| map_sftp_error(path, e))?;
            Ok(entries
                .into_iter()
                .filter_map(|(entry_path, stat)| {
                    let name = entry_path.file_name()?.to_string_lossy().into_owned();
                    Some(DirEntry {
                        name,
                        size: stat.size.unwrap_or(0),
                        is_dir: stat.is_dir(),
                        mtime: stat.mtime.unwrap_or(0),
                    })
                })
                .collect())
        })
    }

    fn put(
        &self,
        local: &Path,
        remote: &Path,
        on_chunk: Option<&mut ChunkHook<'_>>,
    ) -> Result<u64> {
        self.with_sftp(|sftp| {
            let mut local_file = std::fs::File::open(local).with_path(local)?;
            let mut remote_file = sftp.create(remote).map_err(|e| map_sftp_error(remote, e))?;
            let bytes = stream_chunks(
                &mut local_file,
                &mut remote_file,
                self.chunk_size,
                local,
                remote,
                on_chunk,
            )?;
            debug!(local = %local.display(), remote = %remote.display(), bytes, "Uploaded");
            Ok(bytes)
        })
    }

    fn get(
        &self,
        remote: &Path,
        local: &Path,
        on_chunk: Option<&mut ChunkHook<'_>>,
    ) -> Result<u64> {
        self.with_sftp(|sftp| {
            let mut remote_file = sftp.open(remote).map_err(|e| map_sftp_error(remote, e))?;
            let local_file = std::fs::File::create(local).with_path(local)?;
            let mut writer = std::io::BufWriter::with_capacity(self.chunk_size, local_file);
            let bytes = stream_chunks(
                &mut remote_file,
                &mut writer,
                self.chunk_size,
                remote,
                local,
                on_chunk,
            )?;
            debug!(remote = %remote.display(), local = %local.display(), bytes, "Downloaded");
            Ok(bytes)
        })
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        self.with_sftp(|sftp| match sftp.mkdir(path, 0o755) {
            Ok(()) => Ok(()),
            Err(e) => {
                // Many servers answer a generic failure for existing directories
                match sftp.stat(path) {
                    Ok(stat) if stat.is_dir() => Err(TransferError::AlreadyExists(path.to_path_buf())),
                    _ => Err(map_sftp_error(path, e)),
                }
            }
        })
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.with_sftp(|sftp| sftp.unlink(path).map_err(|e| map_sftp_error(path, e)))
    }

    fn rmdir(&self, path: &Path) -> Result<()> {
        self.with_sftp(|sftp| sftp.rmdir(path).map_err(|e| map_sftp_error(path, e)))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.with_sftp(|sftp| sftp.rename(from, to, None).map_err(|e| map_sftp_error(from, e)))
    }
}

/// Map an ssh2 error onto the transfer error taxonomy
fn map_sftp_error(path: &Path, err: ssh2::Error) -> TransferError {
    match err.code() {
        ErrorCode::SFTP(FX_NO_SUCH_FILE) | ErrorCode::SFTP(FX_NO_SUCH_PATH) => {
            TransferError::NotFound(path.to_path_buf())
        }
        ErrorCode::SFTP(FX_PERMISSION_DENIED) => TransferError::PermissionDenied(path.to_path_buf()),
        ErrorCode::SFTP(FX_FILE_ALREADY_EXISTS) => TransferError::AlreadyExists(path.to_path_buf()),
        _ => TransferError::remote(path, err.message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RemoteConfig {
        RemoteConfig {
            host: "localhost".to_string(),
            user: "pi".to_string(),
            port: 22,
            key_path: None,
            password: None,
            timeout_secs: 1,
        }
    }

    #[test]
    fn test_disconnected_operations_fail() {
        let remote = SftpRemote::new(config(), 1024);
        assert!(!remote.is_connected());
        assert!(matches!(
            remote.stat(Path::new("/tmp")),
            Err(TransferError::ConnectionUnavailable)
        ));
        assert!(matches!(
            remote.mkdir(Path::new("/tmp/x")),
            Err(TransferError::ConnectionUnavailable)
        ));
        assert!(!remote.test_connection());
    }

    #[test]
    fn test_home_path() {
        let remote = SftpRemote::new(config(), 1024);
        assert_eq!(remote.home_path(), PathBuf::from("/home/pi"));
    }

    #[test]
    fn test_error_mapping() {
        let err = ssh2::Error::new(ErrorCode::SFTP(FX_NO_SUCH_FILE), "no such file");
        assert!(matches!(map_sftp_error(Path::new("/a"), err), TransferError::NotFound(_)));

        let err = ssh2::Error::new(ErrorCode::SFTP(FX_PERMISSION_DENIED), "denied");
        assert!(matches!(
            map_sftp_error(Path::new("/a"), err),
            TransferError::PermissionDenied(_)
        ));

        let err = ssh2::Error::new(ErrorCode::SFTP(4), "failure");
        assert!(matches!(map_sftp_error(Path::new("/a"), err), TransferError::Remote { .. }));
    }

    // Requires an SSH server on localhost with agent auth
    #[test]
    #[ignore]
    fn test_sftp_connection() {
        let remote = SftpRemote::new(config(), 1024);
        assert!(remote.connect().is_ok());
        assert!(remote.test_connection());
    }
}
