/*!
# DVD Mirror: Options
*/

use crate::ASPECT_169;



/// # FLAG: Compare Instead of Copy.
const FLAG_COMPARE: u8 =  0b0000_0001;

/// # FLAG: Gap-Map Accumulation.
const FLAG_GAP_MAP: u8 =  0b0000_0010;

/// # FLAG: Progress Bar.
const FLAG_PROGRESS: u8 = 0b0000_0100;

/// # FLAG: Refresh (Fill Gaps).
const FLAG_REFRESH: u8 =  0b0000_1000;

/// # FLAG: Verbose.
const FLAG_VERBOSE: u8 =  0b0001_0000;



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Read-Error Strategy.
///
/// What the block copier does when the disc returns fewer blocks than
/// requested.
pub enum ReadErrorStrategy {
	/// # Fail the Operation.
	Abort,

	/// # Pad One Zero Block and Move On.
	SkipBlock,

	/// # Pad the Whole Shortfall and Move On.
	SkipMultiBlock,
}

impl ReadErrorStrategy {
	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Abort => "abort",
			Self::SkipBlock => "skip block",
			Self::SkipMultiBlock => "skip multiple blocks",
		}
	}
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Refresh Traversal Order.
///
/// The order in which a refresh run revisits the missing ranges. A drive
/// struggling with a scratch sometimes does better approaching it from
/// the other side, or not hammering the same region back-to-back.
pub enum RefreshOrder {
	/// # Plan Order, Front to Back.
	Forward,

	/// # Each Range Back to Front.
	Reverse,

	/// # Alternate Head and Tail of Each Range.
	OutsideIn,

	/// # Shuffled Segments.
	Random,
}

impl RefreshOrder {
	#[must_use]
	/// # As Str.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Forward => "forward",
			Self::Reverse => "reverse",
			Self::OutsideIn => "outside-in",
			Self::Random => "random",
		}
	}
}



#[derive(Debug, Clone, Copy)]
/// # Mirror Options.
///
/// The immutable configuration record threaded through every copy,
/// refresh, and compare call.
///
/// Options are set using builder-style methods, like:
///
/// ```
/// use dvdmirror_core::{MirrorOptions, ReadErrorStrategy};
///
/// let opts = MirrorOptions::default()
///     .with_strategy(ReadErrorStrategy::Abort)
///     .with_refresh(true);
///
/// assert_eq!(opts.strategy(), ReadErrorStrategy::Abort);
/// assert!(opts.refresh());
/// ```
pub struct MirrorOptions {
	/// # Read-Error Strategy.
	strategy: ReadErrorStrategy,

	/// # Refresh Order.
	order: RefreshOrder,

	/// # Random-Order Seed.
	seed: Option<u64>,

	/// # Preferred Aspect Code.
	aspect: u8,

	/// # Boolean Flags.
	flags: u8,
}

impl Default for MirrorOptions {
	fn default() -> Self {
		Self {
			strategy: ReadErrorStrategy::SkipBlock,
			order: RefreshOrder::Forward,
			seed: None,
			aspect: ASPECT_169,
			flags: 0,
		}
	}
}

/// # Setters.
impl MirrorOptions {
	#[must_use]
	/// # With Read-Error Strategy.
	pub const fn with_strategy(self, strategy: ReadErrorStrategy) -> Self {
		Self { strategy, ..self }
	}

	#[must_use]
	/// # With Refresh Order.
	pub const fn with_order(self, order: RefreshOrder) -> Self {
		Self { order, ..self }
	}

	#[must_use]
	/// # With Random Seed.
	///
	/// Only meaningful when the order is [`RefreshOrder::Random`]; an
	/// unset seed is treated as zero.
	pub const fn with_seed(self, seed: Option<u64>) -> Self {
		Self { seed, ..self }
	}

	#[must_use]
	/// # With Preferred Aspect Code.
	///
	/// The tiebreaker for dual-format discs carrying the same feature in
	/// both 4:3 and 16:9.
	pub const fn with_aspect(self, aspect: u8) -> Self {
		Self { aspect, ..self }
	}

	#[must_use]
	/// # With Compare Mode.
	///
	/// When `true`, mirror operations verify the existing tree against
	/// the disc instead of writing anything.
	pub const fn with_compare(self, compare: bool) -> Self {
		let flags =
			if compare { self.flags | FLAG_COMPARE }
			else { self.flags & ! FLAG_COMPARE };
		Self { flags, ..self }
	}

	#[must_use]
	/// # With Gap Map.
	///
	/// When `true` (and comparing), blank/missing sectors are accumulated
	/// into a disc-surface map rendered at the end of the run.
	pub const fn with_gap_map(self, gap_map: bool) -> Self {
		let flags =
			if gap_map { self.flags | FLAG_GAP_MAP }
			else { self.flags & ! FLAG_GAP_MAP };
		Self { flags, ..self }
	}

	#[must_use]
	/// # With Progress.
	pub const fn with_progress(self, progress: bool) -> Self {
		let flags =
			if progress { self.flags | FLAG_PROGRESS }
			else { self.flags & ! FLAG_PROGRESS };
		Self { flags, ..self }
	}

	#[must_use]
	/// # With Refresh.
	///
	/// When `true`, existing output files are scanned for blank and
	/// missing sectors and only those are re-read from the disc; the rest
	/// is sample-verified and left alone.
	pub const fn with_refresh(self, refresh: bool) -> Self {
		let flags =
			if refresh { self.flags | FLAG_REFRESH }
			else { self.flags & ! FLAG_REFRESH };
		Self { flags, ..self }
	}

	#[must_use]
	/// # With Verbose.
	pub const fn with_verbose(self, verbose: bool) -> Self {
		let flags =
			if verbose { self.flags | FLAG_VERBOSE }
			else { self.flags & ! FLAG_VERBOSE };
		Self { flags, ..self }
	}
}

/// # Getters.
impl MirrorOptions {
	#[must_use]
	/// # Read-Error Strategy.
	pub const fn strategy(&self) -> ReadErrorStrategy { self.strategy }

	#[must_use]
	/// # Refresh Order.
	pub const fn order(&self) -> RefreshOrder { self.order }

	#[must_use]
	/// # Random Seed (Zero if Unset).
	pub const fn seed(&self) -> u64 {
		if let Some(s) = self.seed { s } else { 0 }
	}

	#[must_use]
	/// # Preferred Aspect Code.
	pub const fn aspect(&self) -> u8 { self.aspect }

	#[must_use]
	/// # Compare Mode?
	pub const fn compare(&self) -> bool { FLAG_COMPARE == self.flags & FLAG_COMPARE }

	#[must_use]
	/// # Gap Map?
	pub const fn gap_map(&self) -> bool { FLAG_GAP_MAP == self.flags & FLAG_GAP_MAP }

	#[must_use]
	/// # Progress Bar?
	pub const fn progress(&self) -> bool { FLAG_PROGRESS == self.flags & FLAG_PROGRESS }

	#[must_use]
	/// # Refresh Mode?
	pub const fn refresh(&self) -> bool { FLAG_REFRESH == self.flags & FLAG_REFRESH }

	#[must_use]
	/// # Verbose?
	pub const fn verbose(&self) -> bool { FLAG_VERBOSE == self.flags & FLAG_VERBOSE }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_mirror_flags() {
		// Make sure our flags are unique.
		let mut all = vec![
			FLAG_COMPARE,
			FLAG_GAP_MAP,
			FLAG_PROGRESS,
			FLAG_REFRESH,
			FLAG_VERBOSE,
		];
		all.sort_unstable();
		all.dedup();
		assert_eq!(all.len(), 5);
	}

	#[test]
	fn t_mirror_options_bools() {
		for v in [false, true] {
			let opts = MirrorOptions::default()
				.with_compare(v)
				.with_gap_map(v)
				.with_progress(v)
				.with_refresh(v)
				.with_verbose(v);
			assert_eq!(opts.compare(), v);
			assert_eq!(opts.gap_map(), v);
			assert_eq!(opts.progress(), v);
			assert_eq!(opts.refresh(), v);
			assert_eq!(opts.verbose(), v);
		}
	}

	#[test]
	fn t_mirror_options_seed() {
		let opts = MirrorOptions::default();
		assert_eq!(opts.seed(), 0, "An unset seed should read as zero.");

		let opts = opts.with_seed(Some(12_345));
		assert_eq!(opts.seed(), 12_345);
	}

	#[test]
	fn t_mirror_options_strategy() {
		for v in [
			ReadErrorStrategy::Abort,
			ReadErrorStrategy::SkipBlock,
			ReadErrorStrategy::SkipMultiBlock,
		] {
			let opts = MirrorOptions::default().with_strategy(v);
			assert_eq!(opts.strategy(), v);
		}
	}

	#[test]
	fn t_mirror_options_order() {
		for v in [
			RefreshOrder::Forward,
			RefreshOrder::Reverse,
			RefreshOrder::OutsideIn,
			RefreshOrder::Random,
		] {
			let opts = MirrorOptions::default().with_order(v);
			assert_eq!(opts.order(), v);
		}
	}
}
