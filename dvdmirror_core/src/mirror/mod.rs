/*!
# DVD Mirror: Mirroring
*/

mod chapters;
mod compare;
mod copy;
mod gap;
pub(super) mod opts;
mod output;

use crate::{
	BLOCK_LEN,
	Disc,
	DvdMirrorError,
	FileDomain,
	KillSwitch,
	MirrorOptions,
};
use dactyl::NiceU64;
use fyi_msg::{
	Msg,
	Progless,
};
use self::{
	compare::GapMap,
	gap::RefreshReport,
	output::OutputFile,
};
use std::path::{
	Path,
	PathBuf,
};



/// # Mirror Manager.
///
/// This holds the disc, destination, options, etc., and walks the
/// requested title sets file by file, dispatching each to the fresh-copy,
/// refresh, or compare pipeline as configured.
pub(crate) struct Mirror<'a> {
	/// # Disc Details.
	disc: &'a Disc,

	/// # Destination `VIDEO_TS` Directory.
	dir: PathBuf,

	/// # Options.
	opts: MirrorOptions,

	/// # Progress Instance.
	progress: &'a Progless,

	/// # Killswitch.
	killed: &'a KillSwitch,

	/// # Gap Accumulator (Compare Mode).
	gap_map: GapMap,
}

impl<'a> Mirror<'a> {
	#[must_use]
	/// # New Instance.
	pub(crate) fn new(
		disc: &'a Disc,
		target: &Path,
		title_name: &str,
		opts: MirrorOptions,
		progress: &'a Progless,
		killed: &'a KillSwitch,
	) -> Self {
		Self {
			disc,
			dir: output::video_ts_dir(target, title_name),
			opts,
			progress,
			killed,
			gap_map: GapMap::default(),
		}
	}

	/// # Mirror the Whole Disc.
	///
	/// Title sets are processed sequentially, VMG first; any per-set
	/// failure ends the run. Partial output stays on disk.
	///
	/// ## Errors
	///
	/// Bubbles up any error from the per-set work.
	pub(crate) fn whole_disc(&mut self) -> Result<(), DvdMirrorError> {
		for k in 0..=self.disc.inventory().title_sets() {
			self.title_set(k).map_err(|e| {
				Msg::error(format!("Mirror of Title set {k} failed.")).eprint();
				e
			})?;
		}
		Ok(())
	}

	/// # Mirror One Title Set.
	///
	/// The IFO/BUP pair, the menu VOB if present, then each title-VOB
	/// part in order.
	///
	/// ## Errors
	///
	/// Returns an error if the set is out of range or any file fails.
	pub(crate) fn title_set(&mut self, title_set: u8) -> Result<(), DvdMirrorError> {
		let max = self.disc.inventory().title_sets();
		if max < title_set {
			return Err(DvdMirrorError::NoTitleSet(title_set, max));
		}

		if self.opts.verbose() {
			Msg::info(format!(
				"Title set {title_set}: IFO {}, menu {}, {} title part(s).",
				NiceU64::from(self.disc.inventory().ifo_bytes(title_set)),
				NiceU64::from(self.disc.inventory().menu_bytes(title_set)),
				self.disc.inventory().vob_parts(title_set).len(),
			)).eprint();
		}

		self.info_bup(title_set)?;
		self.menu(title_set)?;

		let parts = u8::try_from(self.disc.inventory().vob_parts(title_set).len())
			.map_err(|_| DvdMirrorError::Overflow)?;
		for part in 1..=parts {
			self.title_vob(title_set, part)?;
		}

		Ok(())
	}

	/// # Mirror the Main Feature.
	///
	/// ## Errors
	///
	/// Bubbles up any error from the per-set work.
	pub(crate) fn main_feature(&mut self) -> Result<(), DvdMirrorError> {
		let main = crate::feature::guess_main_title_set(
			self.disc.titles(),
			self.disc.inventory(),
			self.opts.aspect(),
		);
		if self.opts.verbose() {
			Msg::info(format!("The main feature appears to be title set {main}.")).eprint();
		}
		self.title_set(main)
	}

	/// # Mirror a Chapter Range of a Title.
	///
	/// With no title given, the longest title of the main feature set is
	/// used. Chapters are clamped to what exists; the selected cells are
	/// streamed through the 1 GiB splitter.
	///
	/// ## Errors
	///
	/// Returns an error if the title cannot be resolved or the copy
	/// fails.
	pub(crate) fn chapters(
		&mut self,
		title: Option<u16>,
		start_chapter: u16,
		end_chapter: u16,
	) -> Result<(), DvdMirrorError> {
		// Figure out which title we're working on.
		let title = match title {
			Some(t) => t,
			None => {
				let main = crate::feature::guess_main_title_set(
					self.disc.titles(),
					self.disc.inventory(),
					self.opts.aspect(),
				);
				let t = self.disc.titles().titles().iter()
					.filter(|t| t.title_set() == main)
					.max_by_key(|t| t.chapters())
					.map(crate::TitleDescriptor::title)
					.ok_or(DvdMirrorError::NoTitle(0))?;
				Msg::info(format!("No title specified; using title #{t} from the main feature.")).eprint();
				t
			},
		};

		let desc = *self.disc.titles().title(title)
			.ok_or(DvdMirrorError::NoTitle(title))?;
		if desc.title_set == 0 { return Err(DvdMirrorError::VmgChapters); }

		let table = self.disc.dvd().vts_chapters(desc.title_set)?;
		let spans = chapters::resolve_spans(
			&table,
			title,
			desc.vts_title,
			desc.chapters,
			start_chapter,
			end_chapter,
		)?;

		let handle = self.disc.dvd().open_file(desc.title_set, FileDomain::TitleVobs)?;
		let progress = self.progress_handle();
		if self.opts.progress() {
			self.progress.set_title(Some(Msg::custom("Copying", 199, "chapter cells")));
		}
		let res = chapters::write_cells(
			&handle,
			&spans,
			&self.dir,
			desc.title_set,
			&self.opts,
			progress,
			self.killed,
		);
		if self.opts.progress() { self.progress.finish(); }
		res
	}

	/// # Finish.
	///
	/// Render the gap map, if one was accumulated.
	pub(crate) fn finish(self) {
		if self.opts.compare() && self.opts.gap_map() {
			print!("{}", self.gap_map);
		}
	}
}

/// # Per-File Work.
impl Mirror<'_> {
	/// # Progress Handle.
	///
	/// `Some` when the progress bar is enabled, `None` otherwise.
	const fn progress_handle(&self) -> Option<&Progless> {
		if self.opts.progress() { Some(self.progress) } else { None }
	}

	/// # Start a File.
	///
	/// Reset the bar for `blocks` and set the title.
	fn start_file(&self, verb: &str, label: &str, blocks: u64) {
		if self.opts.progress() {
			let _res = self.progress.reset(u32::try_from(blocks).unwrap_or(u32::MAX));
			self.progress.set_title(Some(Msg::custom(verb, 199, label)));
		}
	}

	/// # Duplicate the Information File.
	///
	/// The IFO is small, so it is slurped whole and written twice —
	/// byte-identical `.IFO` and `.BUP` — via a temp file in the same
	/// directory, so a torn write can never leave a half-IFO behind.
	/// Refresh mode rewrites them too; there is no per-sector state worth
	/// preserving.
	///
	/// ## Errors
	///
	/// Returns an error on size violations, read failure, or write
	/// failure.
	fn info_bup(&mut self, title_set: u8) -> Result<(), DvdMirrorError> {
		let bytes = self.disc.inventory().ifo_bytes(title_set);
		if bytes == 0 { return Ok(()); }
		if bytes % BLOCK_LEN as u64 != 0 {
			return Err(DvdMirrorError::IfoSize(title_set));
		}
		let blocks = bytes / BLOCK_LEN as u64;

		let ifo_path = self.dir.join(output::info_name(title_set, false));
		let bup_path = self.dir.join(output::info_name(title_set, true));

		if self.opts.compare() {
			let label = output::info_name(title_set, false);
			for path in [ifo_path, bup_path] {
				let handle = self.disc.dvd().open_file(title_set, FileDomain::Info)
					.map_err(|_| DvdMirrorError::IfoOpen(title_set))?;
				self.compare_file(&handle, 0, blocks, path, &label)?;
			}
			return Ok(());
		}

		let raw = self.disc.dvd().read_info(title_set)?;
		for path in [ifo_path, bup_path] {
			write_small(&self.dir, &path, &raw, self.opts.refresh())?;
		}
		Ok(())
	}

	/// # Mirror the Menu VOB.
	///
	/// Absent menus are skipped quietly; a misaligned size is only a
	/// warning, with the copy proceeding on whole blocks.
	///
	/// ## Errors
	///
	/// Returns an error if the copy/compare fails.
	fn menu(&mut self, title_set: u8) -> Result<(), DvdMirrorError> {
		let bytes = self.disc.inventory().menu_bytes(title_set);
		if bytes == 0 { return Ok(()); }

		let label = output::vob_name(title_set, 0);
		if bytes % BLOCK_LEN as u64 != 0 {
			Msg::warning(format!(
				"The Menu VOB of title set {title_set} ({label}) does not have a valid DVD size.",
			)).eprint();
		}
		let blocks = bytes / BLOCK_LEN as u64;
		if blocks == 0 { return Ok(()); }

		let handle = self.disc.dvd().open_file(title_set, FileDomain::MenuVobs)?;
		let path = self.dir.join(&label);

		if self.opts.compare() {
			return self.compare_file(&handle, 0, blocks, path, &label);
		}

		self.copy_file(&handle, 0, blocks, path, &label)
	}

	/// # Mirror One Title-VOB Part.
	///
	/// ## Errors
	///
	/// Returns an error on size violations or copy/compare failure.
	fn title_vob(&mut self, title_set: u8, part: u8) -> Result<(), DvdMirrorError> {
		let parts = self.disc.inventory().vob_parts(title_set);
		if parts.first().copied().unwrap_or(0) == 0 {
			Msg::warning(format!("Title set {title_set} has no title VOB data; skipping.")).eprint();
			return Ok(());
		}
		if parts.get(usize::from(part - 1)).copied().unwrap_or(0) == 0 {
			Msg::warning(format!("Title VOB part {part} of title set {title_set} is empty; skipping.")).eprint();
			return Ok(());
		}

		let blocks = self.disc.inventory().part_blocks(title_set, part)?;
		let offset = self.disc.inventory().part_offset_blocks(title_set, part)?;

		let label = output::vob_name(title_set, part);
		let path = self.dir.join(&label);
		let handle = self.disc.dvd().open_file(title_set, FileDomain::TitleVobs)?;

		if self.opts.compare() {
			return self.compare_file(&handle, offset, blocks, path, &label);
		}

		self.copy_file(&handle, offset, blocks, path, &label)
	}

	/// # Copy or Refresh One File.
	///
	/// ## Errors
	///
	/// Returns an error if the copy or refresh fails.
	fn copy_file(
		&mut self,
		handle: &crate::DvdFileHandle<'_>,
		disc_offset: u64,
		blocks: u64,
		path: PathBuf,
		label: &str,
	) -> Result<(), DvdMirrorError> {
		let out = OutputFile::open(path, self.opts.refresh())?;
		let path_str = out.path_str();

		if self.opts.refresh() {
			self.start_file("Refreshing", label, blocks);
			let report = gap::refresh(
				handle,
				out.file(),
				disc_offset,
				blocks,
				&path_str,
				label,
				&self.opts,
				self.progress_handle(),
				self.killed,
			)?;
			if self.opts.progress() { self.progress.finish(); }
			print_gap_report(&path_str, &report);
			out.finalize(blocks)
		}
		else {
			self.start_file("Copying", label, blocks);
			let mut out = out;
			let res = copy::copy_blocks(
				handle,
				out.file_mut(),
				disc_offset,
				blocks,
				&path_str,
				label,
				&self.opts,
				self.progress_handle(),
				self.killed,
			);
			if self.opts.progress() { self.progress.finish(); }
			res?;
			out.finalize(blocks)
		}
	}

	/// # Compare One File.
	///
	/// The file side always reads from byte zero; only the disc side
	/// carries the part offset. With the gap map enabled, the file is
	/// first scanned so its blank/missing ranges land in the global
	/// accumulator — including the whole expected range when the file is
	/// missing or the wrong size.
	///
	/// ## Errors
	///
	/// Returns an error on mismatch, trailing data, or I/O failure.
	fn compare_file(
		&mut self,
		handle: &crate::DvdFileHandle<'_>,
		disc_offset: u64,
		blocks: u64,
		path: PathBuf,
		label: &str,
	) -> Result<(), DvdMirrorError> {
		let path_str = path.to_string_lossy().into_owned();

		// The file must exist, be regular, and hold exactly the expected
		// bytes.
		let usable = std::fs::symlink_metadata(&path)
			.map(|m| m.is_file() && m.len() == blocks * BLOCK_LEN as u64)
			.unwrap_or(false);
		if ! usable {
			if self.opts.gap_map() {
				let base = self.gap_map.total_blocks();
				self.gap_map.collect_missing(base, blocks);
				self.gap_map.bump(blocks);
			}
			return Err(DvdMirrorError::SizeMismatch(path_str));
		}

		let file = std::fs::File::open(&path)
			.map_err(|e| DvdMirrorError::FileIo(path_str.clone(), "open", e.to_string()))?;

		if self.opts.gap_map() {
			let base = self.gap_map.total_blocks();
			match gap::scan_existing(&file, blocks, &path_str) {
				Ok((plan, stats)) => {
					let existing = stats.full_blocks.min(blocks);
					self.gap_map.collect_plan(base, blocks, &plan, existing);
				},
				Err(_) => self.gap_map.collect_missing(base, blocks),
			}
			self.gap_map.bump(blocks);
		}

		self.start_file("Comparing", label, blocks);
		let res = compare::compare_blocks(
			handle,
			&file,
			disc_offset,
			blocks,
			&path_str,
			label,
			self.progress_handle(),
			self.killed,
		);
		if self.opts.progress() { self.progress.finish(); }
		res
	}
}



/// # Write a Small File Atomically.
///
/// Stage the bytes in a temp file beside the destination, then persist.
/// Existing paths must be regular files; in a refresh run the rewrite is
/// announced rather than a truncation.
///
/// ## Errors
///
/// Returns an error if the path is unusable or any write fails.
fn write_small(dir: &Path, path: &Path, raw: &[u8], refresh: bool)
-> Result<(), DvdMirrorError> {
	use std::io::Write;

	let lossy = path.to_string_lossy();
	if let Ok(meta) = std::fs::symlink_metadata(path) {
		if ! meta.is_file() {
			return Err(DvdMirrorError::NotAFile(lossy.into_owned()));
		}
		Msg::info(format!(
			"The file {lossy} exists; {}.",
			if refresh { "refreshing it" } else { "truncating before copy" },
		)).eprint();
	}

	let mut tmp = tempfile::NamedTempFile::new_in(dir)
		.map_err(|e| DvdMirrorError::FileIo(path.to_string_lossy().into_owned(), "open", e.to_string()))?;
	tmp.write_all(raw)
		.map_err(|e| DvdMirrorError::FileIo(path.to_string_lossy().into_owned(), "write", e.to_string()))?;
	tmp.persist(path)
		.map_err(|e| DvdMirrorError::FileIo(path.to_string_lossy().into_owned(), "rename", e.to_string()))?;

	Ok(())
}

/// # Print a Refresh Report.
///
/// One line per refreshed file: how many sectors were filled, and the
/// zeroed/missing tallies before and after, with percentages of the
/// expected total.
fn print_gap_report(path: &str, report: &RefreshReport) {
	let pct = |n: u64|
		if report.expected_blocks == 0 { 0.0 }
		else { n as f64 * 100.0 / report.expected_blocks as f64 };

	Msg::info(format!(
		"Gaps report for {path}: filled {} sectors; before {} zeroed ({:.2}%), {} missing ({:.2}%); after {} zeroed ({:.2}%), {} missing ({:.2}%).",
		NiceU64::from(report.filled),
		NiceU64::from(report.blank_before),
		pct(report.blank_before),
		NiceU64::from(report.truncated_before),
		pct(report.truncated_before),
		NiceU64::from(report.blank_after),
		pct(report.blank_after),
		NiceU64::from(report.truncated_after),
		pct(report.truncated_after),
	)).eprint();
}
