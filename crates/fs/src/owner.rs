use std::{fs::Metadata, io, path::Path};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OwnerError {
    #[error("no account is mapped to uid {0}")]
    NoMapping(u32),
    #[error("owner lookup failed: {0}")]
    Lookup(#[source] io::Error),
    #[error("owner lookup is not supported on this platform")]
    Unsupported,
}

/// Resolves the principal that owns a file.
pub trait OwnerResolver: Send + Sync {
    fn resolve_owner(&self, path: &Path, metadata: &Metadata) -> Result<String, OwnerError>;
}

/// Never resolves; every probe reports the unknown owner.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOwnerResolver;

impl OwnerResolver for NoopOwnerResolver {
    fn resolve_owner(&self, _path: &Path, _metadata: &Metadata) -> Result<String, OwnerError> {
        Err(OwnerError::Unsupported)
    }
}

/// Looks the owner up in the platform account database.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOwnerResolver;

impl OwnerResolver for SystemOwnerResolver {
    #[cfg(unix)]
    fn resolve_owner(&self, _path: &Path, metadata: &Metadata) -> Result<String, OwnerError> {
        use std::os::unix::fs::MetadataExt;

        user_name(metadata.uid())
    }

    #[cfg(not(unix))]
    fn resolve_owner(&self, _path: &Path, _metadata: &Metadata) -> Result<String, OwnerError> {
        Err(OwnerError::Unsupported)
    }
}

#[cfg(unix)]
const MAX_PASSWD_BUF: usize = 1 << 16;

/// Account name for `uid` via `getpwuid_r`.
#[cfg(unix)]
pub fn user_name(uid: u32) -> Result<String, OwnerError> {
    use std::ffi::CStr;

    let mut buf: Vec<libc::c_char> = vec![0; 1024];

    loop {
        // SAFETY: passwd is plain old data; getpwuid_r fills it in and points
        // its string fields into `buf`, which outlives every read below.
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        let rc = unsafe {
            libc::getpwuid_r(
                uid as libc::uid_t,
                &mut pwd,
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };

        if rc == libc::ERANGE && buf.len() < MAX_PASSWD_BUF {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            return Err(OwnerError::Lookup(io::Error::from_raw_os_error(rc)));
        }
        if result.is_null() || pwd.pw_name.is_null() {
            return Err(OwnerError::NoMapping(uid));
        }

        let name = unsafe { CStr::from_ptr(pwd.pw_name) };
        return Ok(name.to_string_lossy().into_owned());
    }
}
