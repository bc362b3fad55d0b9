use std::fmt;
use std::os::fd::RawFd;

use super::Events;

/// Poll set paired with the values that own each descriptor.
///
/// Removing an entry only marks it dead (descriptor `-1`, which poll skips),
/// so indices stay stable while a sweep walks the table. Dead entries are
/// dropped in one pass by `compact`.
pub(crate) struct ConnectionTable<T> {
	fds: Vec<libc::pollfd>,
	items: Vec<Option<T>>,
}

impl<T> ConnectionTable<T> {
	pub(crate) fn new() -> Self {
		Self { fds: Vec::new(), items: Vec::new() }
	}

	/// Appends a live entry and returns its index.
	pub(crate) fn push(&mut self, fd: RawFd, events: Events, item: T) -> usize {
		self.fds.push(libc::pollfd { fd, events: events.bits(), revents: 0 });
		self.items.push(Some(item));
		self.fds.len() - 1
	}

	/// Entries, dead ones included.
	pub(crate) fn len(&self) -> usize {
		self.fds.len()
	}

	pub(crate) fn live(&self) -> usize {
		self.fds.iter().filter(|p| p.fd >= 0).count()
	}

	pub(crate) fn dead(&self) -> usize {
		self.len() - self.live()
	}

	pub(crate) fn is_live(&self, index: usize) -> bool {
		self.fds.get(index).is_some_and(|p| p.fd >= 0)
	}

	pub(crate) fn pollfds_mut(&mut self) -> &mut [libc::pollfd] {
		&mut self.fds
	}

	/// Events observed by the last poll; empty for dead entries.
	pub(crate) fn revents(&self, index: usize) -> Events {
		match self.fds.get(index) {
			Some(p) if p.fd >= 0 => Events::from_bits_truncate(p.revents),
			_ => Events::empty(),
		}
	}

	pub(crate) fn get(&self, index: usize) -> Option<&T> {
		self.items.get(index).and_then(Option::as_ref)
	}

	/// Marks an entry dead and hands back its value.
	pub(crate) fn kill(&mut self, index: usize) -> Option<T> {
		let pollfd = self.fds.get_mut(index)?;
		pollfd.fd = -1;
		pollfd.revents = 0;
		self.items[index].take()
	}

	/// Marks every entry dead, dropping their values in table order.
	pub(crate) fn clear(&mut self) {
		for index in 0..self.len() {
			drop(self.kill(index));
		}
	}

	/// Removes dead entries, keeping live ones in order.
	pub(crate) fn compact(&mut self) -> usize {
		let before = self.len();
		let mut live = self.fds.iter().map(|p| p.fd >= 0).collect::<Vec<_>>().into_iter();
		self.items.retain(|_| live.next().unwrap_or(false));
		self.fds.retain(|p| p.fd >= 0);
		before - self.len()
	}
}

impl<T> fmt::Debug for ConnectionTable<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConnectionTable")
			.field("len", &self.len())
			.field("live", &self.live())
			.finish()
	}
}
