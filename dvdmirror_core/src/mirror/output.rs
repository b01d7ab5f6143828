/*!
# DVD Mirror: Output Files
*/

use crate::{
	BLOCK_LEN,
	DvdMirrorError,
	MAX_VOB_BLOCKS,
	MAX_VOB_PARTS,
};
use fyi_msg::Msg;
use std::{
	fs::File,
	path::{
		Path,
		PathBuf,
	},
};



/// # The Mirror Directory.
///
/// Everything lands in `<target_root>/<title_name>/VIDEO_TS/`.
pub(super) fn video_ts_dir(target: &Path, title_name: &str) -> PathBuf {
	target.join(title_name).join("VIDEO_TS")
}

#[must_use]
/// # Video Object Name.
///
/// `VIDEO_TS.VOB` for the VMG menu; `VTS_{k:02}_{p}.VOB` otherwise, with
/// part zero being the title set's menu.
pub(super) fn vob_name(title_set: u8, part: u8) -> String {
	if title_set == 0 { "VIDEO_TS.VOB".to_owned() }
	else { format!("VTS_{title_set:02}_{part}.VOB") }
}

#[must_use]
/// # Information File Name.
pub(super) fn info_name(title_set: u8, backup: bool) -> String {
	let ext = if backup { "BUP" } else { "IFO" };
	if title_set == 0 { format!("VIDEO_TS.{ext}") }
	else { format!("VTS_{title_set:02}_0.{ext}") }
}

/// # Remove Stale Title-VOB Parts.
///
/// A fresh chapter extraction starts from nothing; parts left behind by
/// an earlier, larger run would otherwise survive alongside the new
/// output. Missing files are not an error.
pub(super) fn unlink_parts(dir: &Path, title_set: u8) {
	for part in 1..=MAX_VOB_PARTS {
		let _res = std::fs::remove_file(dir.join(vob_name(title_set, part)));
	}
}



#[derive(Debug)]
/// # An Open Output File.
///
/// Fresh copies truncate on open and append; refresh opens read-write
/// without truncation so the existing bytes can be scanned and patched.
/// Either way the path must be a regular file (or absent).
pub(super) struct OutputFile {
	/// # The Handle.
	file: File,

	/// # Its Path.
	path: PathBuf,

	/// # Refresh Mode?
	refresh: bool,
}

impl OutputFile {
	/// # Open.
	///
	/// ## Errors
	///
	/// Returns an error if the path exists but is not a regular file, or
	/// if the open itself fails.
	pub(super) fn open(path: PathBuf, refresh: bool) -> Result<Self, DvdMirrorError> {
		let lossy = path.to_string_lossy();
		if let Ok(meta) = std::fs::symlink_metadata(&path) {
			if ! meta.is_file() {
				return Err(DvdMirrorError::NotAFile(lossy.into_owned()));
			}
			Msg::info(format!(
				"The file {lossy} exists; {}.",
				if refresh { "checking for gaps" } else { "truncating before copy" },
			)).eprint();
		}

		let file = std::fs::OpenOptions::new()
			.read(refresh)
			.write(true)
			.create(true)
			.truncate(! refresh)
			.open(&path)
			.map_err(|e| DvdMirrorError::FileIo(
				path.to_string_lossy().into_owned(),
				"open",
				e.to_string(),
			))?;

		Ok(Self { file, path, refresh })
	}

	#[must_use]
	/// # The Handle.
	pub(super) const fn file(&self) -> &File { &self.file }

	#[must_use]
	/// # Mutable Handle.
	pub(super) fn file_mut(&mut self) -> &mut File { &mut self.file }

	#[must_use]
	/// # The Path (Lossy).
	pub(super) fn path_str(&self) -> String { self.path.to_string_lossy().into_owned() }

	/// # Finalize.
	///
	/// Fresh copies are truncated to exactly the expected size, guarding
	/// against a pre-existing longer file; refreshed files are left at
	/// whatever length the refill produced.
	///
	/// ## Errors
	///
	/// Returns an error if the truncate fails.
	pub(super) fn finalize(self, size_blocks: u64) -> Result<(), DvdMirrorError> {
		if ! self.refresh {
			self.file.set_len(size_blocks * BLOCK_LEN as u64)
				.map_err(|e| DvdMirrorError::FileIo(
					self.path.to_string_lossy().into_owned(),
					"truncate",
					e.to_string(),
				))?;
		}
		Ok(())
	}
}



#[derive(Debug)]
/// # Title-VOB Part Splitter.
///
/// Chapter extraction streams an arbitrary run of cells into the normal
/// `VTS_{k:02}_{p}.VOB` sequence, rolling to the next part whenever the
/// current one reaches 1 GiB with more data still to come. Part indices
/// are 1-based and monotonic.
pub(super) struct VobSplitter {
	/// # The Mirror Directory.
	dir: PathBuf,

	/// # Title Set.
	title_set: u8,

	/// # Refresh Mode?
	refresh: bool,

	/// # Current Part (1-Based).
	part: u8,

	/// # Blocks Written to the Current Part.
	written: u64,

	/// # The Open Part.
	out: OutputFile,
}

impl VobSplitter {
	/// # New.
	///
	/// Opens part one.
	///
	/// ## Errors
	///
	/// Returns an error if the first part cannot be opened.
	pub(super) fn new(dir: PathBuf, title_set: u8, refresh: bool)
	-> Result<Self, DvdMirrorError> {
		let out = OutputFile::open(dir.join(vob_name(title_set, 1)), refresh)?;
		Ok(Self {
			dir,
			title_set,
			refresh,
			part: 1,
			written: 0,
			out,
		})
	}

	#[must_use]
	/// # Blocks Until the 1 GiB Boundary.
	pub(super) const fn capacity(&self) -> u64 { MAX_VOB_BLOCKS - self.written }

	#[must_use]
	/// # Blocks Written to the Current Part.
	pub(super) const fn written(&self) -> u64 { self.written }

	#[must_use]
	/// # Current Part File.
	pub(super) const fn file(&self) -> &File { self.out.file() }

	#[must_use]
	/// # Current Part Path (Lossy).
	pub(super) fn path_str(&self) -> String { self.out.path_str() }

	/// # Append Blocks (Fresh Mode).
	///
	/// ## Errors
	///
	/// Returns an error if the write fails.
	pub(super) fn append(&mut self, data: &[u8]) -> Result<(), DvdMirrorError> {
		use std::io::Write;
		let path = self.out.path_str();
		self.out.file_mut().write_all(data)
			.map_err(|e| DvdMirrorError::FileIo(path, "write", e.to_string()))
	}

	/// # Record Progress.
	///
	/// Bump the written-block counter after the caller has committed a
	/// chunk (by whatever means).
	pub(super) fn record(&mut self, blocks: u64) { self.written += blocks; }

	/// # Roll to the Next Part if Full.
	///
	/// Finalizes the current part and opens the next whenever the 1 GiB
	/// boundary has been reached and more data is on the way.
	///
	/// ## Errors
	///
	/// Returns an error if the part count would exceed nine, or if
	/// closing/opening files fails.
	pub(super) fn maybe_roll(&mut self, more_data: bool) -> Result<(), DvdMirrorError> {
		if self.written < MAX_VOB_BLOCKS || ! more_data { return Ok(()); }

		if MAX_VOB_PARTS <= self.part {
			return Err(DvdMirrorError::Bug("A title set cannot hold more than nine VOB parts."));
		}

		self.part += 1;
		let next = OutputFile::open(
			self.dir.join(vob_name(self.title_set, self.part)),
			self.refresh,
		)?;
		let done = std::mem::replace(&mut self.out, next);
		done.finalize(self.written)?;
		self.written = 0;

		Ok(())
	}

	/// # Finish.
	///
	/// ## Errors
	///
	/// Returns an error if the final truncate fails.
	pub(super) fn finish(self) -> Result<(), DvdMirrorError> {
		let written = self.written;
		self.out.finalize(written)
	}
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_names() {
		assert_eq!(vob_name(0, 0), "VIDEO_TS.VOB");
		assert_eq!(vob_name(1, 0), "VTS_01_0.VOB");
		assert_eq!(vob_name(1, 1), "VTS_01_1.VOB");
		assert_eq!(vob_name(12, 9), "VTS_12_9.VOB");
		assert_eq!(info_name(0, false), "VIDEO_TS.IFO");
		assert_eq!(info_name(0, true), "VIDEO_TS.BUP");
		assert_eq!(info_name(3, false), "VTS_03_0.IFO");
		assert_eq!(info_name(3, true), "VTS_03_0.BUP");
	}

	#[test]
	fn t_output_truncates() {
		let dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
		let path = dir.path().join("VTS_01_1.VOB");
		std::fs::write(&path, vec![1_u8; 4096]).expect("Seed write failed.");

		// A fresh open wipes the old contents; finalize pins the length.
		let out = OutputFile::open(path.clone(), false).expect("Open failed.");
		out.finalize(1).expect("Finalize failed.");
		assert_eq!(
			std::fs::metadata(&path).expect("Stat failed.").len(),
			2048,
			"Finalize should truncate to the expected size."
		);

		// A refresh open keeps them.
		std::fs::write(&path, vec![1_u8; 4096]).expect("Seed write failed.");
		let out = OutputFile::open(path.clone(), true).expect("Open failed.");
		out.finalize(1).expect("Finalize failed.");
		assert_eq!(
			std::fs::metadata(&path).expect("Stat failed.").len(),
			4096,
			"Refresh mode should never truncate."
		);
	}

	#[test]
	fn t_output_rejects_directories() {
		let dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
		let path = dir.path().join("VTS_01_1.VOB");
		std::fs::create_dir(&path).expect("Failed to create the decoy directory.");

		assert!(
			matches!(OutputFile::open(path, false), Err(DvdMirrorError::NotAFile(_))),
			"A directory in the way should be refused."
		);
	}

	#[test]
	fn t_splitter_rolls() {
		let dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
		let mut split = VobSplitter::new(dir.path().to_path_buf(), 1, false)
			.expect("Splitter open failed.");

		assert_eq!(split.capacity(), MAX_VOB_BLOCKS);

		// Under the line: no roll, even with more data coming.
		split.record(MAX_VOB_BLOCKS - 1);
		split.maybe_roll(true).expect("Roll failed.");
		assert_eq!(split.part, 1);

		// At the line with nothing left: still no roll.
		split.record(1);
		split.maybe_roll(false).expect("Roll failed.");
		assert_eq!(split.part, 1);

		// At the line with more to come: roll.
		split.maybe_roll(true).expect("Roll failed.");
		assert_eq!(split.part, 2);
		assert_eq!(split.written(), 0);
		assert!(
			dir.path().join("VTS_01_2.VOB").is_file(),
			"The second part should exist after the roll."
		);

		split.finish().expect("Finish failed.");
	}

	#[test]
	fn t_unlink_parts() {
		let dir = tempfile::tempdir().expect("Failed to create a temporary directory.");
		for p in [1_u8, 3, 9] {
			std::fs::write(dir.path().join(vob_name(2, p)), b"x").expect("Seed write failed.");
		}

		unlink_parts(dir.path(), 2);
		for p in 1..=MAX_VOB_PARTS {
			assert!(
				! dir.path().join(vob_name(2, p)).exists(),
				"Stale parts should be gone."
			);
		}
	}
}
