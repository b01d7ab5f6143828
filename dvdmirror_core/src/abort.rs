/*!
# DVD Mirror: Kill Switch
*/

use std::sync::{
	Arc,
	atomic::{
		AtomicBool,
		Ordering::Acquire,
	},
};



#[derive(Debug)]
/// # Kill Switch.
///
/// A short-circuit for the long-running copy loops. Copying is
/// single-threaded, but the progress bar and the CTRL-C handler aren't.
///
/// The binary's CTRL-C intercept sets the value; the copy loops poll it
/// between chunks and bail early, leaving the partial output on disk for
/// a later `--refresh` run to pick up.
pub struct KillSwitch(Arc<AtomicBool>);

impl Default for KillSwitch {
	fn default() -> Self { Self(Arc::from(AtomicBool::new(false))) }
}

impl KillSwitch {
	#[must_use]
	/// # Dead?
	pub fn killed(&self) -> bool { self.0.load(Acquire) }

	#[must_use]
	/// # Inner Clone.
	pub fn inner(&self) -> Arc<AtomicBool> { Arc::clone(&self.0) }
}
