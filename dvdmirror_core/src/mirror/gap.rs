/*!
# DVD Mirror: Gap Planning and Refresh

A mirror interrupted by a dying disc leaves two kinds of damage behind:
blocks that were padded with zeroes, and blocks that were never written at
all. This module finds both, proves the rest of the file actually came
from the disc in the drive, and re-reads only what is missing.
*/

use crate::{
	BLOCK_LEN,
	BlockRead,
	BUFFER_BLOCKS,
	DvdMirrorError,
	GAP_SAMPLE_TARGET,
	KillSwitch,
	MirrorOptions,
	ReadErrorStrategy,
	RefreshOrder,
};
use fyi_msg::{
	Msg,
	Progless,
};
use rand::{
	Rng,
	rngs::SmallRng,
	SeedableRng,
};
use std::{
	fs::File,
	os::unix::fs::FileExt,
};



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # A Missing/Blank Block Range.
pub(crate) struct GapRange {
	/// # First Block.
	pub(crate) start: u64,

	/// # Number of Blocks.
	pub(crate) count: u64,
}

#[derive(Debug, Clone, Default)]
/// # Gap Plan.
///
/// An ordered, disjoint, non-adjacent list of block ranges awaiting
/// refill, scoped to a single output file. Insertion keeps the invariant
/// by coalescing any range that starts within or immediately after the
/// previous one.
pub(crate) struct GapPlan {
	/// # The Ranges.
	ranges: Vec<GapRange>,
}

impl GapPlan {
	/// # Append a Range.
	///
	/// Ranges must be pushed in ascending start order; overlapping or
	/// adjacent ranges are merged into the last entry.
	pub(crate) fn push(&mut self, start: u64, count: u64) {
		if count == 0 { return; }

		if let Some(last) = self.ranges.last_mut() {
			let last_end = last.start + last.count;
			if start <= last_end {
				let new_end = start + count;
				if last_end < new_end { last.count = new_end - last.start; }
				return;
			}
		}

		self.ranges.push(GapRange { start, count });
	}

	#[must_use]
	/// # Does Any Range Cover `block`?
	pub(crate) fn contains(&self, block: u64) -> bool {
		let idx = self.ranges.partition_point(|r| r.start <= block);
		idx.checked_sub(1).is_some_and(|i| {
			let r = self.ranges[i];
			block < r.start + r.count
		})
	}

	#[must_use]
	/// # Is the Plan Empty?
	pub(crate) fn is_empty(&self) -> bool { self.ranges.is_empty() }

	#[must_use]
	/// # The Ranges.
	pub(crate) fn ranges(&self) -> &[GapRange] { &self.ranges }

	#[must_use]
	/// # Total Planned Blocks.
	pub(crate) fn total_blocks(&self) -> u64 {
		self.ranges.iter().map(|r| r.count).sum()
	}
}



#[derive(Debug, Clone, Copy, Default)]
/// # File-Scan Statistics.
pub(crate) struct ScanStats {
	/// # Blank Blocks Found.
	pub(crate) blank_blocks: u64,

	/// # Whole Blocks Present in the File.
	pub(crate) full_blocks: u64,
}

/// # Scan an Existing File for Gaps.
///
/// Walk the file in 512-block chunks, treating a block as blank iff every
/// one of its 2048 bytes is zero. Runs of blank blocks become plan
/// entries; bytes beyond the last whole block are ignored.
///
/// ## Errors
///
/// Returns an error if the file cannot be statted or read.
pub(crate) fn scan_existing(file: &File, expected_blocks: u64, path: &str)
-> Result<(GapPlan, ScanStats), DvdMirrorError> {
	let existing_bytes = file.metadata()
		.map_err(|e| DvdMirrorError::FileIo(path.to_owned(), "stat", e.to_string()))?
		.len();

	let full_blocks = existing_bytes / BLOCK_LEN as u64;
	let scan_blocks = full_blocks.min(expected_blocks);

	let mut plan = GapPlan::default();
	let mut stats = ScanStats { blank_blocks: 0, full_blocks };

	let mut buf: Vec<u8> = vec![0; BUFFER_BLOCKS as usize * BLOCK_LEN];
	let mut processed: u64 = 0;
	let mut pending: Option<u64> = None;

	while processed < scan_blocks {
		let chunk = (scan_blocks - processed).min(BUFFER_BLOCKS);
		let bytes = file.read_at(
			&mut buf[..chunk as usize * BLOCK_LEN],
			processed * BLOCK_LEN as u64,
		)
			.map_err(|e| DvdMirrorError::FileIo(path.to_owned(), "read", e.to_string()))?;

		let have = bytes as u64 / BLOCK_LEN as u64;
		if have == 0 { break; }

		for i in 0..have {
			let block = processed + i;
			let raw = &buf[i as usize * BLOCK_LEN..(i as usize + 1) * BLOCK_LEN];
			if raw.iter().all(|&b| b == 0) {
				if pending.is_none() { pending = Some(block); }
			}
			else if let Some(start) = pending.take() {
				let run = block - start;
				plan.push(start, run);
				stats.blank_blocks += run;
			}
		}

		processed += have;
	}

	// Close any still-open run.
	if let Some(start) = pending {
		let run = scan_blocks - start;
		plan.push(start, run);
		stats.blank_blocks += run;
	}

	Ok((plan, stats))
}



/// # Collect Verification Samples.
///
/// Pick up to 32 block indices uniformly spaced across the expected
/// range, nudging each forward (then backward) out of any planned gap,
/// and dropping immediate duplicates. These get spot-checked against the
/// disc before a refresh writes anything, so a mirror of disc A never
/// quietly absorbs sectors from disc B.
pub(crate) fn collect_samples(plan: &GapPlan, expected_blocks: u64) -> Vec<u64> {
	if expected_blocks == 0 { return Vec::new(); }

	let target = GAP_SAMPLE_TARGET.min(expected_blocks);
	let mut out: Vec<u64> = Vec::with_capacity(target as usize);

	for i in 0..target {
		let mut candidate = (i + 1) * expected_blocks / (target + 1);
		if expected_blocks <= candidate { candidate = expected_blocks - 1; }

		let mut forward = candidate;
		while forward < expected_blocks && plan.contains(forward) { forward += 1; }
		if expected_blocks <= forward {
			let mut backward = candidate;
			while 0 < backward && plan.contains(backward) { backward -= 1; }
			if plan.contains(backward) { continue; }
			forward = backward;
		}

		if out.last() == Some(&forward) { continue; }
		out.push(forward);
	}

	out
}

/// # Spot-Check Existing Blocks Against the Disc.
///
/// ## Errors
///
/// Returns an error if the disc or file cannot be read, or — the entire
/// point — if any sampled block differs between the two.
fn verify_samples<S: BlockRead>(
	src: &S,
	file: &File,
	disc_offset: u64,
	samples: &[u64],
	path: &str,
	label: &str,
) -> Result<(), DvdMirrorError> {
	let mut disc_block = [0_u8; BLOCK_LEN];
	let mut file_block = [0_u8; BLOCK_LEN];

	for &block in samples {
		let lb = u32::try_from(disc_offset + block).map_err(|_| DvdMirrorError::Overflow)?;
		let got = src.read_blocks(lb, 1, &mut disc_block)?;
		if got != 1 {
			return Err(DvdMirrorError::DiscReadAt(label.to_owned(), block));
		}

		file.read_exact_at(&mut file_block, block * BLOCK_LEN as u64)
			.map_err(|e| DvdMirrorError::FileIo(path.to_owned(), "read", e.to_string()))?;

		if disc_block != file_block {
			return Err(DvdMirrorError::Verification(path.to_owned(), block));
		}
	}

	Ok(())
}



/// # Flatten the Plan Into Write Segments.
///
/// Every segment is at most 512 blocks; the ordering policy decides how
/// they are sequenced:
///
/// * Forward: plan order, each range front to back.
/// * Reverse: plan order, each range back to front.
/// * Outside-in: alternating head and tail segments until they meet.
/// * Random: a Fisher-Yates shuffle of the forward list, seeded so runs
///   are reproducible.
pub(crate) fn plan_segments(plan: &GapPlan, order: RefreshOrder, seed: u64) -> Vec<GapRange> {
	let mut out: Vec<GapRange> = Vec::new();

	match order {
		RefreshOrder::Forward | RefreshOrder::Random => {
			for r in plan.ranges() {
				let mut produced = 0;
				while produced < r.count {
					let chunk = (r.count - produced).min(BUFFER_BLOCKS);
					out.push(GapRange { start: r.start + produced, count: chunk });
					produced += chunk;
				}
			}

			if matches!(order, RefreshOrder::Random) {
				let mut rng = SmallRng::seed_from_u64(seed);
				for k in (1..out.len()).rev() {
					let j = rng.gen_range(0..=k);
					out.swap(k, j);
				}
			}
		},
		RefreshOrder::Reverse => {
			for r in plan.ranges() {
				let mut processed = 0;
				while processed < r.count {
					let chunk = (r.count - processed).min(BUFFER_BLOCKS);
					out.push(GapRange {
						start: r.start + r.count - processed - chunk,
						count: chunk,
					});
					processed += chunk;
				}
			}
		},
		RefreshOrder::OutsideIn => {
			for r in plan.ranges() {
				let mut front = 0;
				let mut back = r.count;
				let mut use_front = true;
				while front < back {
					let chunk = (back - front).min(BUFFER_BLOCKS);
					if use_front {
						out.push(GapRange { start: r.start + front, count: chunk });
						front += chunk;
					}
					else {
						out.push(GapRange { start: r.start + back - chunk, count: chunk });
						back -= chunk;
					}
					use_front = ! use_front;
				}
			}
		},
	}

	out
}

/// # Refill One Segment.
///
/// Reads land at their exact in-file offsets, so the traversal order
/// never matters for correctness. A short read advances the cursor past
/// the unreadable area without padding; those blocks simply remain
/// absent for a future attempt.
///
/// ## Errors
///
/// Returns an error on output I/O failure, on user abort, or — with the
/// abort strategy — on the first short read.
fn process_segment<S: BlockRead>(
	src: &S,
	file: &File,
	disc_offset: u64,
	seg: GapRange,
	path: &str,
	label: &str,
	strategy: ReadErrorStrategy,
	buf: &mut [u8],
	filled: &mut u64,
	progress: Option<&Progless>,
	killed: &KillSwitch,
) -> Result<(), DvdMirrorError> {
	let mut cursor = 0;

	while cursor < seg.count {
		if killed.killed() { return Err(DvdMirrorError::Killed); }

		let chunk = (seg.count - cursor).min(BUFFER_BLOCKS);
		let read_block = seg.start + cursor;
		let lb = u32::try_from(disc_offset + read_block).map_err(|_| DvdMirrorError::Overflow)?;
		let chunk32 = u32::try_from(chunk).map_err(|_| DvdMirrorError::Overflow)?;

		let got = match src.read_blocks(lb, chunk32, buf) {
			Ok(n) => n as u64,
			Err(DvdMirrorError::DiscRead) => 0,
			Err(e) => return Err(e),
		};

		if 0 < got {
			file.write_all_at(
				&buf[..got as usize * BLOCK_LEN],
				read_block * BLOCK_LEN as u64,
			)
				.map_err(|e| DvdMirrorError::FileIo(path.to_owned(), "write", e.to_string()))?;
			*filled += got;
		}

		let mut advance = got;
		if got < chunk {
			let remaining = seg.count - (cursor + got);
			if remaining == 0 {
				if let Some(p) = progress { p.increment_n(u32::try_from(got).unwrap_or(u32::MAX)); }
				break;
			}

			let skip = match strategy {
				ReadErrorStrategy::Abort =>
					return Err(DvdMirrorError::DiscReadAt(label.to_owned(), read_block + got)),
				ReadErrorStrategy::SkipBlock => 1,
				ReadErrorStrategy::SkipMultiBlock => (chunk - got).max(1),
			}
				.min(remaining);
			Msg::warning(format!("Refresh skipping {skip} block(s) for {label}.")).eprint();
			advance += skip;
		}

		if let Some(p) = progress { p.increment_n(u32::try_from(advance).unwrap_or(u32::MAX)); }

		// The strategy always skips at least one block on a short read,
		// so the cursor strictly advances.
		cursor += advance;
	}

	Ok(())
}



#[derive(Debug, Clone, Copy, Default)]
/// # Refresh Report.
///
/// Before/after statistics for one refreshed file.
pub(crate) struct RefreshReport {
	/// # Expected Blocks.
	pub(crate) expected_blocks: u64,

	/// # Blank Blocks Before.
	pub(crate) blank_before: u64,

	/// # Missing Trailing Blocks Before.
	pub(crate) truncated_before: u64,

	/// # Blank Blocks After.
	pub(crate) blank_after: u64,

	/// # Missing Trailing Blocks After.
	pub(crate) truncated_after: u64,

	/// # Newly Filled Blocks.
	pub(crate) filled: u64,
}

/// # Refresh an Existing File.
///
/// The full fill-gaps pipeline: scan for blank runs, synthesize a
/// trailing range if the file is short, sample-verify what is already
/// there, refill the plan in the configured order, then re-scan to
/// report honestly on what remains.
///
/// ## Errors
///
/// Returns an error on I/O failure, verification mismatch, user abort,
/// or (abort strategy) unreadable disc blocks.
pub(crate) fn refresh<S: BlockRead>(
	src: &S,
	file: &File,
	disc_offset: u64,
	expected_blocks: u64,
	path: &str,
	label: &str,
	opts: &MirrorOptions,
	progress: Option<&Progless>,
	killed: &KillSwitch,
) -> Result<RefreshReport, DvdMirrorError> {
	// Take stock.
	let (mut plan, stats) = scan_existing(file, expected_blocks, path)?;
	let existing_blocks = stats.full_blocks.min(expected_blocks);

	let mut report = RefreshReport {
		expected_blocks,
		blank_before: stats.blank_blocks,
		..RefreshReport::default()
	};

	// Anything past the end of the file is a gap too.
	if existing_blocks < expected_blocks {
		let missing = expected_blocks - existing_blocks;
		plan.push(existing_blocks, missing);
		report.truncated_before = missing;
	}

	// Make sure the file came from *this* disc before writing anything.
	let samples = collect_samples(&plan, expected_blocks);
	if ! samples.is_empty() {
		verify_samples(src, file, disc_offset, &samples, path, label)?;
	}

	// Refill!
	if ! plan.is_empty() {
		if let Some(p) = progress {
			let _res = p.reset(u32::try_from(plan.total_blocks()).unwrap_or(u32::MAX));
		}

		let mut buf: Vec<u8> = vec![0; BUFFER_BLOCKS as usize * BLOCK_LEN];
		for seg in plan_segments(&plan, opts.order(), opts.seed()) {
			process_segment(
				src, file, disc_offset, seg, path, label,
				opts.strategy(), &mut buf, &mut report.filled, progress, killed,
			)?;
		}
	}

	// Recount so the report reflects reality, not hope.
	let (_, after) = scan_existing(file, expected_blocks, path)?;
	report.blank_after = after.blank_blocks;
	report.truncated_after = expected_blocks.saturating_sub(after.full_blocks.min(expected_blocks));

	Ok(report)
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::dvdread::testing::MemoryDisc;
	use std::io::Write;

	/// # Temporary File Preloaded With `data`.
	fn tmp_with(data: &[u8]) -> File {
		let mut f = tempfile::tempfile().expect("Failed to create a temporary file.");
		f.write_all(data).expect("Failed to prime the temporary file.");
		f
	}

	/// # Read It All Back.
	fn slurp(f: &File) -> Vec<u8> {
		let len = f.metadata().expect("Stat failed.").len() as usize;
		let mut out = vec![0; len];
		f.read_exact_at(&mut out, 0).expect("Read failed.");
		out
	}

	#[test]
	fn t_plan_coalesce() {
		let mut plan = GapPlan::default();
		plan.push(10, 5);
		plan.push(15, 5);  // adjacent; merges
		plan.push(18, 2);  // inside; no-op
		plan.push(30, 0);  // empty; no-op
		plan.push(40, 1);

		assert_eq!(
			plan.ranges(),
			&[GapRange { start: 10, count: 10 }, GapRange { start: 40, count: 1 }],
		);

		// Strictly ordered, strictly separated.
		for w in plan.ranges().windows(2) {
			assert!(
				w[0].start + w[0].count < w[1].start,
				"Plan ranges must be disjoint and non-adjacent."
			);
		}
	}

	#[test]
	fn t_plan_contains() {
		let mut plan = GapPlan::default();
		plan.push(10, 10);
		plan.push(100, 1);

		assert!(! plan.contains(9));
		assert!(plan.contains(10));
		assert!(plan.contains(19));
		assert!(! plan.contains(20));
		assert!(plan.contains(100));
		assert!(! plan.contains(101));
	}

	#[test]
	fn t_scan_existing() {
		let disc = MemoryDisc::new(64);
		let mut data = disc.data.clone();
		for b in &mut data[7 * BLOCK_LEN..11 * BLOCK_LEN] { *b = 0; }
		let file = tmp_with(&data);

		let (plan, stats) = scan_existing(&file, 64, "t.vob").expect("Scan failed.");
		assert_eq!(plan.ranges(), &[GapRange { start: 7, count: 4 }]);
		assert_eq!(stats.blank_blocks, 4);
		assert_eq!(stats.full_blocks, 64);
	}

	#[test]
	fn t_scan_trailing_run() {
		// A blank tail should still be flushed into the plan.
		let disc = MemoryDisc::new(16);
		let mut data = disc.data.clone();
		for b in &mut data[12 * BLOCK_LEN..] { *b = 0; }
		let file = tmp_with(&data);

		let (plan, stats) = scan_existing(&file, 16, "t.vob").expect("Scan failed.");
		assert_eq!(plan.ranges(), &[GapRange { start: 12, count: 4 }]);
		assert_eq!(stats.blank_blocks, 4);
	}

	#[test]
	fn t_collect_samples() {
		let mut plan = GapPlan::default();
		plan.push(10, 10);

		let samples = collect_samples(&plan, 100);
		assert!(! samples.is_empty());
		assert!(samples.len() <= GAP_SAMPLE_TARGET as usize);
		for s in &samples {
			assert!(*s < 100, "Samples must stay in range.");
			assert!(! plan.contains(*s), "Samples must dodge the plan.");
		}
		for w in samples.windows(2) {
			assert_ne!(w[0], w[1], "Adjacent duplicates should be dropped.");
		}
	}

	#[test]
	fn t_collect_samples_all_gap() {
		// Nothing to sample if the whole file is one big hole.
		let mut plan = GapPlan::default();
		plan.push(0, 100);
		assert!(collect_samples(&plan, 100).is_empty());
	}

	#[test]
	fn t_segment_orders() {
		let mut plan = GapPlan::default();
		plan.push(0, 1200);
		plan.push(5000, 100);
		let total = plan.total_blocks();

		for order in [
			RefreshOrder::Forward,
			RefreshOrder::Reverse,
			RefreshOrder::OutsideIn,
			RefreshOrder::Random,
		] {
			let segs = plan_segments(&plan, order, 42);
			assert_eq!(
				segs.iter().map(|s| s.count).sum::<u64>(),
				total,
				"Segments must cover the plan exactly."
			);
			assert!(
				segs.iter().all(|s| 0 < s.count && s.count <= BUFFER_BLOCKS),
				"Segments must be 1..=512 blocks."
			);

			// Coverage without overlap.
			let mut blocks: Vec<u64> = segs.iter()
				.flat_map(|s| s.start..s.start + s.count)
				.collect();
			blocks.sort_unstable();
			blocks.dedup();
			assert_eq!(blocks.len() as u64, total, "No overlaps, no omissions.");
		}

		// Same seed, same order; the shuffle must be reproducible.
		assert_eq!(
			plan_segments(&plan, RefreshOrder::Random, 7),
			plan_segments(&plan, RefreshOrder::Random, 7),
		);
	}

	#[test]
	fn t_refresh_fills_hole() {
		let disc = MemoryDisc::new(1000);
		let mut data = disc.data.clone();
		for b in &mut data[100 * BLOCK_LEN..200 * BLOCK_LEN] { *b = 0; }
		let file = tmp_with(&data);

		let opts = MirrorOptions::default().with_refresh(true);
		let report = refresh(&disc, &file, 0, 1000, "t.vob", "TEST VOB", &opts, None, &KillSwitch::default())
			.expect("Refresh failed.");

		assert_eq!(report.blank_before, 100);
		assert_eq!(report.filled, 100);
		assert_eq!(report.blank_after, 0);
		assert_eq!(report.truncated_after, 0);
		assert_eq!(slurp(&file), disc.data, "The refreshed file should match the disc.");
	}

	#[test]
	fn t_refresh_extends_short_file() {
		let disc = MemoryDisc::new(600);
		let file = tmp_with(&disc.data[..250 * BLOCK_LEN]);

		let opts = MirrorOptions::default().with_refresh(true);
		let report = refresh(&disc, &file, 0, 600, "t.vob", "TEST VOB", &opts, None, &KillSwitch::default())
			.expect("Refresh failed.");

		assert_eq!(report.truncated_before, 350);
		assert_eq!(report.truncated_after, 0);
		assert_eq!(slurp(&file), disc.data, "The extended file should match the disc.");
	}

	#[test]
	fn t_refresh_rejects_wrong_source() {
		let disc = MemoryDisc::new(100);
		let other = MemoryDisc::new(100);
		let mut data = other.data;
		// Flip the data so every block differs, and poke a hole so there
		// is something to (not) fill.
		for b in &mut data { *b ^= 0xA5; }
		for b in &mut data[40 * BLOCK_LEN..50 * BLOCK_LEN] { *b = 0; }
		let file = tmp_with(&data);

		let opts = MirrorOptions::default().with_refresh(true);
		let res = refresh(&disc, &file, 0, 100, "t.vob", "TEST VOB", &opts, None, &KillSwitch::default());
		assert!(
			matches!(res, Err(DvdMirrorError::Verification(_, _))),
			"A mismatched source must fail verification."
		);
		assert_eq!(slurp(&file), data, "A failed verification must leave the file unchanged.");
	}

	#[test]
	fn t_refresh_complete_noop() {
		let disc = MemoryDisc::new(128);
		let file = tmp_with(&disc.data);

		let opts = MirrorOptions::default().with_refresh(true);
		let report = refresh(&disc, &file, 0, 128, "t.vob", "TEST VOB", &opts, None, &KillSwitch::default())
			.expect("Refresh failed.");

		assert_eq!(report.filled, 0, "A complete file needs no refilling.");
		assert_eq!(report.blank_before, 0);
		assert_eq!(slurp(&file), disc.data);
	}
}
