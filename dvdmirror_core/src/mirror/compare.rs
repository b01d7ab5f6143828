/*!
# DVD Mirror: Compare Mode
*/

use crate::{
	BLOCK_LEN,
	BlockRead,
	BUFFER_BLOCKS,
	DvdMirrorError,
	GAP_MAP_COLS,
	GAP_MAP_ROWS,
	GAP_MAP_TURN_INNER,
	GAP_MAP_TURN_OUTER,
	KillSwitch,
};
use fyi_msg::Progless;
use std::{
	fmt,
	fs::File,
	os::unix::fs::FileExt,
};
use super::gap::GapPlan;



/// # Byte-Exact Comparison.
///
/// Walk the disc and the mirrored file in lockstep, 512 blocks at a
/// time, and `memcmp` each chunk. The first differing sector fails the
/// comparison; so does any data in the file past the expected end.
///
/// Unlike copying, comparison tolerates no short reads: if the disc
/// cannot produce a chunk in full, the comparison is meaningless.
///
/// ## Errors
///
/// Returns an error on read failure, mismatch, or trailing data.
pub(super) fn compare_blocks<S: BlockRead>(
	src: &S,
	file: &File,
	disc_offset: u64,
	blocks: u64,
	path: &str,
	label: &str,
	progress: Option<&Progless>,
	killed: &KillSwitch,
) -> Result<(), DvdMirrorError> {
	let mut disc_buf: Vec<u8> = vec![0; BUFFER_BLOCKS as usize * BLOCK_LEN];
	let mut file_buf: Vec<u8> = vec![0; BUFFER_BLOCKS as usize * BLOCK_LEN];

	let mut compared: u64 = 0;
	while compared < blocks {
		if killed.killed() { return Err(DvdMirrorError::Killed); }

		let chunk = (blocks - compared).min(BUFFER_BLOCKS);
		let lb = u32::try_from(disc_offset + compared).map_err(|_| DvdMirrorError::Overflow)?;
		let got = src.read_blocks(
			lb,
			u32::try_from(chunk).map_err(|_| DvdMirrorError::Overflow)?,
			&mut disc_buf,
		)
			.unwrap_or(0) as u64;
		if got != chunk {
			return Err(DvdMirrorError::DiscReadAt(label.to_owned(), disc_offset + compared + got));
		}

		let chunk_bytes = chunk as usize * BLOCK_LEN;
		file.read_exact_at(&mut file_buf[..chunk_bytes], compared * BLOCK_LEN as u64)
			.map_err(|e| DvdMirrorError::FileIo(path.to_owned(), "read", e.to_string()))?;

		if disc_buf[..chunk_bytes] != file_buf[..chunk_bytes] {
			// Find the exact sector for the diagnostic.
			for i in 0..chunk as usize {
				if disc_buf[i * BLOCK_LEN..(i + 1) * BLOCK_LEN] != file_buf[i * BLOCK_LEN..(i + 1) * BLOCK_LEN] {
					return Err(DvdMirrorError::Verification(
						path.to_owned(),
						disc_offset + compared + i as u64,
					));
				}
			}
		}

		compared += chunk;
		if let Some(p) = progress { p.increment_n(u32::try_from(chunk).unwrap_or(u32::MAX)); }
	}

	// The file must end where the disc data does.
	let mut extra = [0_u8; 1];
	let trailing = file.read_at(&mut extra, blocks * BLOCK_LEN as u64)
		.map_err(|e| DvdMirrorError::FileIo(path.to_owned(), "read", e.to_string()))?;
	if 0 < trailing {
		return Err(DvdMirrorError::TrailingData(path.to_owned()));
	}

	Ok(())
}



#[derive(Debug, Default)]
/// # Gap Map.
///
/// An append-only log of the blank/missing ranges seen across a whole
/// compare-mode walk, positioned in a disc-global block space. The
/// accumulator is owned by the compare entry point; rendering and
/// accumulation never interleave.
pub(crate) struct GapMap {
	/// # Logged Ranges (Absolute Start, Count).
	entries: Vec<(u64, u64)>,

	/// # Total Blocks Examined.
	total_blocks: u64,
}

impl GapMap {
	/// # Log One Range.
	pub(crate) fn add(&mut self, start: u64, count: u64) {
		if 0 < count { self.entries.push((start, count)); }
	}

	/// # Log a Scanned File's Plan.
	///
	/// Plan ranges are rebased into the global block space; a file
	/// shorter than expected contributes a trailing missing range too.
	pub(crate) fn collect_plan(
		&mut self,
		base: u64,
		expected_blocks: u64,
		plan: &GapPlan,
		existing_blocks: u64,
	) {
		for r in plan.ranges() {
			self.add(base + r.start, r.count);
		}
		if existing_blocks < expected_blocks {
			self.add(base + existing_blocks, expected_blocks - existing_blocks);
		}
	}

	/// # Log an Entirely Missing File.
	pub(crate) fn collect_missing(&mut self, base: u64, expected_blocks: u64) {
		self.add(base, expected_blocks);
	}

	#[must_use]
	/// # Total Blocks Examined.
	pub(crate) const fn total_blocks(&self) -> u64 { self.total_blocks }

	/// # Note Examined Blocks.
	///
	/// Advance the global base by one file's expected size, whether or
	/// not it contributed gaps.
	pub(crate) fn bump(&mut self, blocks: u64) { self.total_blocks += blocks; }

	/// # Reset.
	pub(crate) fn reset(&mut self) {
		self.entries.clear();
		self.total_blocks = 0;
	}
}

impl fmt::Display for GapMap {
	/// # Render the Map.
	///
	/// A bordered 20×60 character grid: rows run inner to outer radius,
	/// columns approximate the angle using a linearly interpolated turn
	/// length. Strictly a visualization aid.
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.total_blocks == 0 {
			return f.write_str("Gap map: no sectors examined.\n");
		}

		let rows = GAP_MAP_ROWS as usize;
		let cols = GAP_MAP_COLS as usize;
		let mut map = vec![vec![b'.'; cols]; rows];

		for &(start, count) in &self.entries {
			let step = (count / (GAP_MAP_COLS / 2 + 1)).max(1);
			let mut block = start;
			while block < start + count {
				let relative = block.min(self.total_blocks - 1);
				let row = ((relative * GAP_MAP_ROWS) / self.total_blocks)
					.min(GAP_MAP_ROWS - 1);
				let turn = (GAP_MAP_TURN_INNER
					+ (GAP_MAP_TURN_OUTER - GAP_MAP_TURN_INNER) * row / (GAP_MAP_ROWS - 1))
					.max(1);
				let col = ((relative % turn) * GAP_MAP_COLS / turn).min(GAP_MAP_COLS - 1);
				map[row as usize][col as usize] = b'#';
				block += step;
			}
		}

		f.write_str("Gap map (rows = inner to outer radius, columns = approximate angle):\n")?;
		for row in map {
			writeln!(f, "|{}|", String::from_utf8_lossy(&row))?;
		}
		f.write_str("# marks sectors that appear blank or missing. Angle is estimated using an average turn length.\n")
	}
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

	#[test]
	fn t_compare_clean() {
		let disc = MemoryDisc::new(600);
		let file = tmp_with(&disc.data);
		compare_blocks(&disc, &file, 0, 600, "t.vob", "TEST VOB", None, &KillSwitch::default())
			.expect("Identical data should compare clean.");
	}

	#[test]
	fn t_compare_offset() {
		let disc = MemoryDisc::new(64);
		let file = tmp_with(&disc.data[16 * BLOCK_LEN..32 * BLOCK_LEN]);
		compare_blocks(&disc, &file, 16, 16, "t.vob", "TEST VOB", None, &KillSwitch::default())
			.expect("The file side always starts at byte zero.");
	}

	#[test]
	fn t_compare_mismatch() {
		let disc = MemoryDisc::new(64);
		let mut data = disc.data.clone();
		data[5 * BLOCK_LEN + 17] ^= 0xFF;
		let file = tmp_with(&data);

		let res = compare_blocks(&disc, &file, 0, 64, "t.vob", "TEST VOB", None, &KillSwitch::default());
		assert!(
			matches!(res, Err(DvdMirrorError::Verification(_, 5))),
			"The first differing sector should be reported."
		);
	}

	#[test]
	fn t_compare_trailing() {
		let disc = MemoryDisc::new(16);
		let mut data = disc.data.clone();
		data.push(0xEE);
		let file = tmp_with(&data);

		let res = compare_blocks(&disc, &file, 0, 16, "t.vob", "TEST VOB", None, &KillSwitch::default());
		assert!(
			matches!(res, Err(DvdMirrorError::TrailingData(_))),
			"Excess data should fail the comparison."
		);
	}

	#[test]
	fn t_compare_short_file() {
		let disc = MemoryDisc::new(16);
		let file = tmp_with(&disc.data[..8 * BLOCK_LEN]);

		assert!(
			compare_blocks(&disc, &file, 0, 16, "t.vob", "TEST VOB", None, &KillSwitch::default()).is_err(),
			"A premature end should fail the comparison."
		);
	}

	#[test]
	fn t_gap_map_render() {
		let mut map = GapMap::default();
		assert_eq!(
			map.to_string(),
			"Gap map: no sectors examined.\n",
			"An empty map has nothing to draw."
		);

		map.collect_missing(0, 10_000);
		map.bump(10_000);

		let art = map.to_string();
		let grid: Vec<&str> = art.lines()
			.filter(|l| l.starts_with('|'))
			.collect();
		assert_eq!(grid.len(), 20, "The map should have twenty rows.");
		assert!(
			grid.iter().all(|l| l.len() == 62),
			"Each row should be sixty columns plus borders."
		);
		assert!(
			grid.iter().all(|l| l.contains('#')),
			"A fully-missing walk should mark every row."
		);

		map.reset();
		assert_eq!(map.total_blocks(), 0);
		assert_eq!(map.to_string(), "Gap map: no sectors examined.\n");
	}

	#[test]
	fn t_gap_map_collect() {
		let mut plan = GapPlan::default();
		plan.push(5, 5);

		let mut map = GapMap::default();
		// First file: 100 expected, 10 blank, none missing.
		map.collect_plan(0, 100, &plan, 100);
		map.bump(100);
		// Second file: missing entirely.
		map.collect_missing(map.total_blocks(), 50);
		map.bump(50);

		assert_eq!(map.entries, vec![(5, 5), (100, 50)]);
		assert_eq!(map.total_blocks(), 150);
	}
}
