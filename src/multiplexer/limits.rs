use crate::error::{Result, SocketError, check};

/// Soft limit on open descriptors for this process (`RLIMIT_NOFILE`).
///
/// `RLIM_INFINITY` comes back as `usize::MAX`.
pub fn open_file_limit() -> Result<usize> {
	let mut limit = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
	check(unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) })
		.map_err(|errno| SocketError::ResourceLimit { errno })?;

	if limit.rlim_cur == libc::RLIM_INFINITY {
		return Ok(usize::MAX);
	}
	Ok(usize::try_from(limit.rlim_cur).unwrap_or(usize::MAX))
}
