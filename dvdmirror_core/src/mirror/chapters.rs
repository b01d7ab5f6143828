/*!
# DVD Mirror: Chapter Extraction
*/

use crate::{
	BLOCK_LEN,
	BlockRead,
	BUFFER_BLOCKS,
	DvdMirrorError,
	dvdread::VtsChapterTable,
	KillSwitch,
	MirrorOptions,
	ReadErrorStrategy,
};
use fyi_msg::{
	Msg,
	Progless,
};
use std::{
	os::unix::fs::FileExt,
	path::Path,
};
use super::output::{
	unlink_parts,
	VobSplitter,
};



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Cell Range.
///
/// A contiguous `(first_sector, last_sector)` span in the title-VOB
/// address space, inclusive on both ends.
pub(super) struct CellSpan {
	/// # First Sector.
	pub(super) first: u32,

	/// # Last Sector (Inclusive).
	pub(super) last: u32,
}

impl CellSpan {
	#[must_use]
	/// # Blocks Covered.
	const fn blocks(self) -> u64 {
		(self.last as u64).saturating_sub(self.first as u64) + 1
	}
}



/// # Resolve Chapters to Cell Spans.
///
/// Translate a `(title, start_chapter, end_chapter)` triple into the
/// ordered, disjoint cell ranges to copy. Chapter numbers are clamped to
/// the title's chapter count; the program chain is taken from the start
/// chapter and must cover the whole range.
///
/// ## Errors
///
/// Returns an error if the title is missing from the VTS tables, the
/// chapters span more than one program chain, or the tables are
/// internally inconsistent.
pub(super) fn resolve_spans(
	table: &VtsChapterTable,
	title: u16,
	vts_title: u8,
	chapters: u16,
	start_chapter: u16,
	end_chapter: u16,
) -> Result<Vec<CellSpan>, DvdMirrorError> {
	if chapters == 0 { return Err(DvdMirrorError::NoChapters(title)); }

	// Clamp the requested range to what actually exists.
	let start = start_chapter.max(1).min(chapters);
	let mut end = end_chapter.max(1).min(chapters);
	if end < start { end = start; }
	if end != end_chapter {
		Msg::warning(format!("Truncated the end chapter; only {chapters} chapters in title #{title}.")).eprint();
	}

	let ptts = usize::from(vts_title)
		.checked_sub(1)
		.and_then(|i| table.titles.get(i))
		.ok_or(DvdMirrorError::NoTitle(title))?;

	let first_ptt = ptts.get(usize::from(start - 1))
		.ok_or(DvdMirrorError::Bug("Chapter table is shorter than the chapter count."))?;
	let pgcn = first_ptt.pgcn;

	// One PGC is assumed for the whole range; bail loudly if the end
	// chapter disagrees rather than copying the wrong cells.
	if end < chapters {
		let next_ptt = ptts.get(usize::from(end))
			.ok_or(DvdMirrorError::Bug("Chapter table is shorter than the chapter count."))?;
		if next_ptt.pgcn != pgcn {
			return Err(DvdMirrorError::ChapterPgc(title));
		}
	}

	let pgc = usize::from(pgcn)
		.checked_sub(1)
		.and_then(|i| table.pgcs.get(i))
		.ok_or(DvdMirrorError::Bug("Part-of-title entry names a missing program chain."))?;

	let start_cell = usize::from(first_ptt.pgn)
		.checked_sub(1)
		.and_then(|i| pgc.program_map.get(i))
		.copied()
		.map(usize::from)
		.ok_or(DvdMirrorError::Bug("Program map is shorter than the program count."))?;

	let end_cell =
		if end < chapters {
			let epg = ptts[usize::from(end)].pgn;
			usize::from(epg)
				.checked_sub(1)
				.and_then(|i| pgc.program_map.get(i))
				.copied()
				.map(usize::from)
				.ok_or(DvdMirrorError::Bug("Program map is shorter than the program count."))?
				.saturating_sub(1)
		}
		else { pgc.cells.len() };

	if end_cell < start_cell || pgc.cells.len() < end_cell || start_cell == 0 {
		return Err(DvdMirrorError::Bug("Chapter range resolved to no playable cells."));
	}

	let mut spans: Vec<CellSpan> = pgc.cells[start_cell - 1..end_cell]
		.iter()
		.map(|&(first, last)| CellSpan { first, last })
		.collect();

	spans.sort_unstable_by_key(|s| s.first);
	align_end_sectors(&mut spans);

	Ok(spans)
}

/// # Align End Sectors.
///
/// Cells sometimes overlap (multi-angle interleaving, mostly). After
/// sorting by start sector, any end sector reaching into its successor
/// is clamped to one before the successor's start, so no sector is
/// emitted twice.
pub(super) fn align_end_sectors(spans: &mut [CellSpan]) {
	for i in 1..spans.len() {
		let next_first = spans[i].first;
		let prev = &mut spans[i - 1];
		if next_first <= prev.last {
			prev.last = next_first.saturating_sub(1);
		}
	}
}



/// # Stream Cell Spans Into Title-VOB Parts.
///
/// The fresh path appends straight through the 1 GiB splitter, applying
/// the read-error strategy like any other copy. The refresh path verifies
/// existing non-blank blocks against the disc and writes only the blank
/// or missing runs, at their exact offsets.
///
/// ## Errors
///
/// Returns an error on I/O failure, verification mismatch, user abort,
/// or (abort strategy) unreadable disc blocks.
pub(super) fn write_cells<S: BlockRead>(
	src: &S,
	spans: &[CellSpan],
	dir: &Path,
	title_set: u8,
	opts: &MirrorOptions,
	progress: Option<&Progless>,
	killed: &KillSwitch,
) -> Result<(), DvdMirrorError> {
	if title_set == 0 { return Err(DvdMirrorError::VmgChapters); }

	// Stale parts from an earlier, larger run must not survive a fresh
	// extraction.
	if ! opts.refresh() { unlink_parts(dir, title_set); }

	let total: u64 = spans.iter().map(|s| s.blocks()).sum();
	if let Some(p) = progress {
		let _res = p.reset(u32::try_from(total).unwrap_or(u32::MAX));
	}

	let mut split = VobSplitter::new(dir.to_path_buf(), title_set, opts.refresh())?;
	let mut buf: Vec<u8> = vec![0; BUFFER_BLOCKS as usize * BLOCK_LEN];
	let mut existing: Vec<u8> =
		if opts.refresh() { vec![0; BUFFER_BLOCKS as usize * BLOCK_LEN] }
		else { Vec::new() };
	let zeroes: Vec<u8> = vec![0; BUFFER_BLOCKS as usize * BLOCK_LEN];

	for (s, span) in spans.iter().enumerate() {
		let mut left = span.blocks();
		let mut soffset = u64::from(span.first);

		while 0 < left {
			if killed.killed() { return Err(DvdMirrorError::Killed); }

			let chunk = left.min(BUFFER_BLOCKS).min(split.capacity());
			let got = match src.read_blocks(
				u32::try_from(soffset).map_err(|_| DvdMirrorError::Overflow)?,
				u32::try_from(chunk).map_err(|_| DvdMirrorError::Overflow)?,
				&mut buf,
			) {
				Ok(n) => n as u64,
				Err(DvdMirrorError::DiscRead) => 0,
				Err(e) => return Err(e),
			};

			// Commit whatever arrived.
			if 0 < got {
				if opts.refresh() {
					merge_chunk(&split, &buf, &mut existing, got)?;
				}
				else {
					split.append(&buf[..got as usize * BLOCK_LEN])?;
				}
				split.record(got);
			}

			// Short reads get the strategy treatment.
			let mut advance = got;
			if got < chunk {
				let label = split.path_str();
				let pad = match opts.strategy() {
					ReadErrorStrategy::Abort =>
						return Err(DvdMirrorError::DiscReadAt(label, soffset + got)),
					ReadErrorStrategy::SkipBlock => 1,
					ReadErrorStrategy::SkipMultiBlock => (chunk - got).max(1),
				}
					.min(left - got);

				if 0 < pad {
					Msg::warning(format!("Error reading {label} at block {}; padding {pad} block(s).", soffset + got)).eprint();
					if ! opts.refresh() {
						split.append(&zeroes[..pad as usize * BLOCK_LEN])?;
					}
					split.record(pad);
					advance += pad;
				}
			}

			soffset += advance;
			left -= advance;
			if let Some(p) = progress { p.increment_n(u32::try_from(advance).unwrap_or(u32::MAX)); }

			let more = 0 < left || s + 1 < spans.len();
			split.maybe_roll(more)?;
		}
	}

	split.finish()
}

/// # Merge a Chunk (Refresh Mode).
///
/// Compare the chunk against whatever the part file already holds at the
/// same position: existing non-blank data must match the disc byte for
/// byte (a trailing partial block over its partial length), and only the
/// blank or missing runs are written.
fn merge_chunk(
	split: &VobSplitter,
	fresh: &[u8],
	existing: &mut [u8],
	blocks: u64,
) -> Result<(), DvdMirrorError> {
	let path = split.path_str();
	let file = split.file();
	let chunk_bytes = blocks as usize * BLOCK_LEN;
	let chunk_offset = split.written() * BLOCK_LEN as u64;

	// Pull the current contents, zero-filling past EOF.
	let mut have_bytes = 0;
	while have_bytes < chunk_bytes {
		let got = file.read_at(&mut existing[have_bytes..chunk_bytes], chunk_offset + have_bytes as u64)
			.map_err(|e| DvdMirrorError::FileIo(path.clone(), "read", e.to_string()))?;
		if got == 0 { break; }
		have_bytes += got;
	}
	for b in &mut existing[have_bytes..chunk_bytes] { *b = 0; }

	let have_blocks = have_bytes / BLOCK_LEN;
	let partial_bytes = have_bytes % BLOCK_LEN;

	let mut pending: Option<usize> = None;
	for i in 0..blocks as usize {
		let old = &existing[i * BLOCK_LEN..(i + 1) * BLOCK_LEN];
		let new = &fresh[i * BLOCK_LEN..(i + 1) * BLOCK_LEN];

		// Full blocks and trailing partials verify over what they have;
		// everything past the end is simply missing.
		let cmp_len =
			if i < have_blocks { BLOCK_LEN }
			else if i == have_blocks && 0 < partial_bytes { partial_bytes }
			else { 0 };

		let blank = old[..cmp_len].iter().all(|&b| b == 0);
		if ! blank && old[..cmp_len] != new[..cmp_len] {
			return Err(DvdMirrorError::Verification(
				path,
				(chunk_offset / BLOCK_LEN as u64) + i as u64,
			));
		}

		// A verified whole block is settled; blank, missing, and torn
		// trailing blocks all get (re)written.
		if cmp_len == BLOCK_LEN && ! blank {
			if let Some(from) = pending.take() {
				file.write_all_at(
					&fresh[from * BLOCK_LEN..i * BLOCK_LEN],
					chunk_offset + (from * BLOCK_LEN) as u64,
				)
					.map_err(|e| DvdMirrorError::FileIo(path.clone(), "write", e.to_string()))?;
			}
		}
		else if pending.is_none() { pending = Some(i); }
	}

	if let Some(from) = pending {
		file.write_all_at(
			&fresh[from * BLOCK_LEN..chunk_bytes],
			chunk_offset + (from * BLOCK_LEN) as u64,
		)
			.map_err(|e| DvdMirrorError::FileIo(path, "write", e.to_string()))?;
	}

	Ok(())
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::dvdread::{
		PartOfTitle,
		ProgramChain,
		testing::MemoryDisc,
	};
	use crate::MirrorOptions;

	/// # One-Title Fixture.
	///
	/// Ten chapters, one PGC, one cell per chapter, 100 sectors each,
	/// with an extra overlapping cell tacked onto the end.
	fn table() -> VtsChapterTable {
		let ptts: Vec<PartOfTitle> = (1..=10)
			.map(|pgn| PartOfTitle { pgcn: 1, pgn })
			.collect();
		let cells: Vec<(u32, u32)> = (0..10)
			.map(|c| (c * 100 + 100, c * 100 + 199))
			.collect();
		VtsChapterTable {
			titles: vec![ptts],
			pgcs: vec![ProgramChain {
				program_map: (1..=10).collect(),
				cells,
			}],
		}
	}

	#[test]
	fn t_align_end_sectors() {
		// The scenario straight out of the book: an overlapping cell
		// gets sorted into place and the collisions clamped.
		let mut spans = vec![
			CellSpan { first: 100, last: 199 },
			CellSpan { first: 200, last: 299 },
			CellSpan { first: 300, last: 349 },
			CellSpan { first: 350, last: 499 },
			CellSpan { first: 500, last: 599 },
			CellSpan { first: 499, last: 550 },
		];
		spans.sort_unstable_by_key(|s| s.first);
		align_end_sectors(&mut spans);

		let ends: Vec<u32> = spans.iter().map(|s| s.last).collect();
		assert_eq!(ends, vec![199, 299, 349, 498, 499, 599]);

		// Disjoint post-alignment: end[i] < start[i+1].
		for w in spans.windows(2) {
			assert!(w[0].last < w[1].first, "Aligned spans must be disjoint.");
		}
	}

	#[test]
	fn t_resolve_interior() {
		let spans = resolve_spans(&table(), 1, 1, 10, 3, 5).expect("Resolution failed.");
		assert_eq!(
			spans,
			vec![
				CellSpan { first: 300, last: 399 },
				CellSpan { first: 400, last: 499 },
				CellSpan { first: 500, last: 599 },
			],
		);
	}

	#[test]
	fn t_resolve_through_end() {
		// An end chapter at (or past) the chapter count runs through the
		// PGC's final cell.
		let spans = resolve_spans(&table(), 1, 1, 10, 9, 99).expect("Resolution failed.");
		assert_eq!(
			spans,
			vec![
				CellSpan { first: 900, last: 999 },
				CellSpan { first: 1000, last: 1099 },
			],
		);
	}

	#[test]
	fn t_resolve_multi_pgc() {
		let mut table = table();
		table.titles[0][7].pgcn = 2;

		assert!(
			matches!(resolve_spans(&table, 1, 1, 10, 3, 7), Err(DvdMirrorError::ChapterPgc(1))),
			"A PGC change inside the range must fail loudly."
		);
	}

	#[test]
	fn t_write_cells_fresh() {
		let disc = MemoryDisc::new(64);
		let dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
		let spans = vec![
			CellSpan { first: 10, last: 19 },
			CellSpan { first: 30, last: 39 },
		];

		let opts = MirrorOptions::default();
		write_cells(&disc, &spans, dir.path(), 1, &opts, None, &KillSwitch::default())
			.expect("Cell write failed.");

		let out = std::fs::read(dir.path().join("VTS_01_1.VOB")).expect("Missing output.");
		let mut expected = disc.data[10 * BLOCK_LEN..20 * BLOCK_LEN].to_vec();
		expected.extend_from_slice(&disc.data[30 * BLOCK_LEN..40 * BLOCK_LEN]);
		assert_eq!(out, expected, "The output should concatenate exactly the selected ranges.");
	}

	#[test]
	fn t_write_cells_refresh_merge() {
		let disc = MemoryDisc::new(64);
		let dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
		let spans = vec![CellSpan { first: 10, last: 29 }];

		// Seed the output with the first half correct and the second
		// half blank.
		let mut seed = disc.data[10 * BLOCK_LEN..30 * BLOCK_LEN].to_vec();
		for b in &mut seed[10 * BLOCK_LEN..] { *b = 0; }
		std::fs::write(dir.path().join("VTS_01_1.VOB"), &seed).expect("Seed write failed.");

		let opts = MirrorOptions::default().with_refresh(true);
		write_cells(&disc, &spans, dir.path(), 1, &opts, None, &KillSwitch::default())
			.expect("Merge failed.");

		let out = std::fs::read(dir.path().join("VTS_01_1.VOB")).expect("Missing output.");
		assert_eq!(
			out,
			&disc.data[10 * BLOCK_LEN..30 * BLOCK_LEN],
			"The merge should complete the blank half."
		);
	}

	#[test]
	fn t_write_cells_refresh_mismatch() {
		let disc = MemoryDisc::new(64);
		let dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
		let spans = vec![CellSpan { first: 10, last: 29 }];

		// Seed with data from "another disc".
		let mut seed = disc.data[10 * BLOCK_LEN..30 * BLOCK_LEN].to_vec();
		for b in &mut seed { *b ^= 0xA5; }
		std::fs::write(dir.path().join("VTS_01_1.VOB"), &seed).expect("Seed write failed.");

		let opts = MirrorOptions::default().with_refresh(true);
		let res = write_cells(&disc, &spans, dir.path(), 1, &opts, None, &KillSwitch::default());
		assert!(
			matches!(res, Err(DvdMirrorError::Verification(_, _))),
			"Mismatched existing data must fail the merge."
		);
	}

	#[test]
	fn t_write_cells_vmg() {
		let disc = MemoryDisc::new(8);
		let dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
		let res = write_cells(
			&disc,
			&[CellSpan { first: 0, last: 1 }],
			dir.path(),
			0,
			&MirrorOptions::default(),
			None,
			&KillSwitch::default(),
		);
		assert!(
			matches!(res, Err(DvdMirrorError::VmgChapters)),
			"The VMG has no chapters to extract."
		);
	}
}
