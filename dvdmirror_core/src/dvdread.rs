/*!
# DVD Mirror: `libdvdread` Wrappers

Somewhat useful documentation:
<https://dvd.sourceforge.net/dvdinfo/ifo.html>
*/

use crate::{
	BLOCK_LEN,
	DvdMirrorError,
};
use dvdread_rs::{
	dvd_read_domain_t,
	dvd_read_domain_t_DVD_READ_INFO_FILE,
	dvd_read_domain_t_DVD_READ_MENU_VOBS,
	dvd_read_domain_t_DVD_READ_TITLE_VOBS,
	dvd_stat_t,
};
use std::{
	ffi::CString,
	marker::PhantomData,
	os::{
		raw::c_char,
		unix::ffi::OsStrExt,
	},
	path::Path,
};
use trimothy::TrimSlice;



/// # Read Interface for Block Sources.
///
/// The copy, refresh, and compare loops only ever need one operation from
/// the disc: "give me up to N logical blocks starting at X". Putting that
/// behind a trait lets the test suite substitute a synthetic disc.
///
/// `Ok(n)` may be smaller than the request (a short read); `Err` means the
/// read failed before producing anything.
pub(crate) trait BlockRead {
	/// # Read Logical Blocks.
	fn read_blocks(&self, offset: u32, blocks: u32, buf: &mut [u8])
	-> Result<usize, DvdMirrorError>;
}



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # DVD File Domain.
///
/// The three per-title-set file families libdvdread can open.
pub(crate) enum FileDomain {
	/// # Information File.
	Info,

	/// # Menu Video Objects.
	MenuVobs,

	/// # Title Video Objects.
	TitleVobs,
}

impl FileDomain {
	/// # Raw Constant.
	const fn raw(self) -> dvd_read_domain_t {
		match self {
			Self::Info => dvd_read_domain_t_DVD_READ_INFO_FILE,
			Self::MenuVobs => dvd_read_domain_t_DVD_READ_MENU_VOBS,
			Self::TitleVobs => dvd_read_domain_t_DVD_READ_TITLE_VOBS,
		}
	}
}



#[derive(Debug)]
/// # Libdvdread Instance.
///
/// All disc communications run through a single `dvd_reader_t`. Every
/// interface is unsafe and awkward, so this struct exists to abstract away
/// the noise, hand out owned Rust data, and handle cleanup.
pub(crate) struct LibdvdreadInstance {
	/// # Device Path.
	dev: Option<CString>,

	/// # Raw Handle.
	ptr: *mut dvdread_rs::dvd_reader_t,
}

impl Drop for LibdvdreadInstance {
	#[allow(unsafe_code)]
	fn drop(&mut self) {
		// Release the C memory!
		if ! self.ptr.is_null() {
			unsafe { dvdread_rs::DVDClose(self.ptr); }
			self.dev.take();
		}
	}
}

impl LibdvdreadInstance {
	#[allow(unsafe_code)]
	/// # New!
	///
	/// Open a device, image file, or mounted directory. (libdvdread
	/// accepts all three and performs CSS authentication itself when it
	/// can.)
	///
	/// ## Errors
	///
	/// This will return an error if the path is obviously wrong or the
	/// open fails.
	pub(crate) fn new<P>(dev: P) -> Result<Self, DvdMirrorError>
	where P: AsRef<Path> {
		let dev = dev.as_ref();
		let original: String = dev.to_string_lossy().into_owned();
		if ! dev.exists() {
			return Err(DvdMirrorError::Device(original));
		}
		let dev = CString::new(dev.as_os_str().as_bytes())
			.map_err(|_| DvdMirrorError::Device(original))?;

		let ptr = unsafe { dvdread_rs::DVDOpen(dev.as_ptr()) };
		if ptr.is_null() {
			Err(DvdMirrorError::DeviceOpen(Some(dev.to_string_lossy().into_owned())))
		}
		else {
			Ok(Self { dev: Some(dev), ptr })
		}
	}
}

impl LibdvdreadInstance {
	#[allow(unsafe_code)]
	/// # Open a File Domain.
	///
	/// Yield a readable handle onto one file family of a title set.
	///
	/// ## Errors
	///
	/// Returns an error if the file is missing or cannot be opened.
	pub(crate) fn open_file(&self, title_set: u8, domain: FileDomain)
	-> Result<DvdFileHandle<'_>, DvdMirrorError> {
		let ptr = unsafe {
			dvdread_rs::DVDOpenFile(self.ptr, i32::from(title_set), domain.raw())
		};
		if ptr.is_null() {
			Err(DvdMirrorError::Bug("Failed opening a DVD file domain."))
		}
		else {
			Ok(DvdFileHandle { ptr, _dvd: PhantomData })
		}
	}

	#[allow(unsafe_code)]
	/// # Stat a File Domain.
	///
	/// Return the size in bytes of the given domain — and for title VOBs,
	/// the per-part byte sizes — or `None` if the domain is absent.
	pub(crate) fn stat(&self, title_set: u8, domain: FileDomain) -> Option<DvdStat> {
		let mut raw = dvd_stat_t {
			size: 0,
			nr_parts: 0,
			parts_size: [0; 9],
		};
		let res = unsafe {
			dvdread_rs::DVDFileStat(
				self.ptr,
				i32::from(title_set),
				domain.raw(),
				&mut raw,
			)
		};
		if res == -1 { None }
		else {
			let nr = usize::try_from(raw.nr_parts).ok()?.min(9);
			let parts: Vec<u64> = raw.parts_size[..nr].iter()
				.map(|&p| u64::try_from(p).unwrap_or(0))
				.collect();
			Some(DvdStat {
				size: u64::try_from(raw.size).unwrap_or(0),
				parts,
			})
		}
	}

	#[allow(unsafe_code)]
	/// # Read an Entire IFO.
	///
	/// Information files are small, so this slurps the whole thing into
	/// memory in one go; the caller writes it back out twice, once as
	/// `.IFO` and once as `.BUP`.
	///
	/// ## Errors
	///
	/// Returns an error if the file cannot be opened or read in full.
	pub(crate) fn read_info(&self, title_set: u8) -> Result<Vec<u8>, DvdMirrorError> {
		let file = self.open_file(title_set, FileDomain::Info)
			.map_err(|_| DvdMirrorError::IfoOpen(title_set))?;

		let blocks = unsafe { dvdread_rs::DVDFileSize(file.ptr) };
		let len = usize::try_from(blocks).ok()
			.and_then(|b| b.checked_mul(BLOCK_LEN))
			.ok_or(DvdMirrorError::IfoRead(title_set))?;

		let mut out: Vec<u8> = vec![0; len];
		let got = unsafe {
			dvdread_rs::DVDFileSeek(file.ptr, 0);
			dvdread_rs::DVDReadBytes(file.ptr, out.as_mut_ptr().cast(), len)
		};
		if got == isize::try_from(len).map_err(|_| DvdMirrorError::Overflow)? { Ok(out) }
		else { Err(DvdMirrorError::IfoRead(title_set)) }
	}

	#[allow(unsafe_code)]
	/// # Volume Identifier.
	///
	/// Pull the raw UDF volume identifier, if any. The caller prettifies
	/// it into a title name.
	pub(crate) fn volume_identifier(&self) -> Option<String> {
		let mut buf = [0_u8; 33];
		let res = unsafe {
			dvdread_rs::UDFGetVolumeIdentifier(
				self.ptr,
				buf.as_mut_ptr().cast::<c_char>(),
				32,
			)
		};
		if res <= 0 { return None; }

		let end = buf.iter().position(|&b| b == 0).unwrap_or(32);
		let trimmed = buf[..end].trim();
		if trimmed.is_empty() { None }
		else { Some(String::from_utf8_lossy(trimmed).into_owned()) }
	}
}

impl LibdvdreadInstance {
	#[allow(unsafe_code)]
	/// # Video Manager Metadata.
	///
	/// Parse the VMG IFO into the owned per-title and per-title-set data
	/// the inventory and feature guesser need, then close it again.
	///
	/// ## Errors
	///
	/// Returns an error if the VMG cannot be opened or its mandatory
	/// tables are missing.
	pub(crate) fn vmg(&self) -> Result<VmgInfo, DvdMirrorError> {
		let ifo = unsafe { dvdread_rs::ifoOpen(self.ptr, 0) };
		if ifo.is_null() { return Err(DvdMirrorError::IfoOpen(0)); }

		// Collect everything in one pass so the handle can be closed on
		// every exit path.
		let out = unsafe {
			let vmgi = (*ifo).vmgi_mat;
			let tt = (*ifo).tt_srpt;
			let atrt = (*ifo).vts_atrt;
			if vmgi.is_null() || tt.is_null() || atrt.is_null() { None }
			else {
				let title_sets = u8::try_from((*vmgi).vmg_nr_of_title_sets).ok();
				let nr_titles = usize::from((*tt).nr_of_srpts);
				let titles: Vec<RawTitle> = std::slice::from_raw_parts((*tt).title, nr_titles)
					.iter()
					.map(|t| RawTitle {
						title_set: t.title_set_nr,
						vts_title: t.vts_ttn,
						chapters: t.nr_of_ptts,
						angles: t.nr_of_angles,
					})
					.collect();

				let nr_attrs = usize::from((*atrt).nr_of_vtss);
				let attrs: Vec<RawSetAttrs> = std::slice::from_raw_parts((*atrt).vts, nr_attrs)
					.iter()
					.map(|v| {
						let audio_streams = v.nr_of_vtstt_audio_streams;
						let mut max_channels = 0;
						for a in v.vtstt_audio_attr.iter().take(usize::from(audio_streams).min(8)) {
							let c = a.channels() + 1;
							if max_channels < c { max_channels = c; }
						}
						RawSetAttrs {
							subpictures: v.nr_of_vtstt_subp_streams,
							audio_streams,
							max_channels,
							aspect: v.vtstt_vobs_video_attr.display_aspect_ratio(),
						}
					})
					.collect();

				title_sets.map(|title_sets| VmgInfo { title_sets, titles, attrs })
			}
		};

		// Release the C memory either way.
		unsafe { dvdread_rs::ifoClose(ifo); }

		out.ok_or(DvdMirrorError::IfoOpen(0))
	}

	#[allow(unsafe_code)]
	/// # Title-Set Chapter Table.
	///
	/// Parse a VTS IFO's part-of-title search table and program chains
	/// into owned data for the chapter extractor, then close it again.
	///
	/// ## Errors
	///
	/// Returns an error if the IFO cannot be opened or its chapter tables
	/// are missing.
	pub(crate) fn vts_chapters(&self, title_set: u8) -> Result<VtsChapterTable, DvdMirrorError> {
		let ifo = unsafe { dvdread_rs::ifoOpen(self.ptr, i32::from(title_set)) };
		if ifo.is_null() { return Err(DvdMirrorError::IfoOpen(title_set)); }

		let out = unsafe {
			let ptt = (*ifo).vts_ptt_srpt;
			let pgcit = (*ifo).vts_pgcit;
			if ptt.is_null() || pgcit.is_null() { None }
			else {
				let nr_titles = usize::from((*ptt).nr_of_srpts);
				let titles: Vec<Vec<PartOfTitle>> =
					std::slice::from_raw_parts((*ptt).title, nr_titles)
					.iter()
					.map(|t| std::slice::from_raw_parts(t.ptt, usize::from(t.nr_of_ptts))
						.iter()
						.map(|p| PartOfTitle { pgcn: p.pgcn, pgn: p.pgn })
						.collect()
					)
					.collect();

				let nr_pgcs = usize::from((*pgcit).nr_of_pgci_srp);
				let pgcs: Vec<ProgramChain> =
					std::slice::from_raw_parts((*pgcit).pgci_srp, nr_pgcs)
					.iter()
					.filter_map(|srp| {
						let pgc = srp.pgc;
						if pgc.is_null() { return None; }
						let programs = usize::from((*pgc).nr_of_programs);
						let cells = usize::from((*pgc).nr_of_cells);
						let program_map: Vec<u8> =
							if (*pgc).program_map.is_null() { Vec::new() }
							else {
								std::slice::from_raw_parts((*pgc).program_map, programs).to_vec()
							};
						let cell_spans: Vec<(u32, u32)> =
							if (*pgc).cell_playback.is_null() { Vec::new() }
							else {
								std::slice::from_raw_parts((*pgc).cell_playback, cells)
									.iter()
									.map(|c| (c.first_sector, c.last_sector))
									.collect()
							};
						Some(ProgramChain { program_map, cells: cell_spans })
					})
					.collect();

				Some(VtsChapterTable { titles, pgcs })
			}
		};

		unsafe { dvdread_rs::ifoClose(ifo); }

		out.ok_or(DvdMirrorError::IfoOpen(title_set))
	}
}



#[derive(Debug)]
/// # Open DVD File.
///
/// A readable handle onto one file domain, closed on drop. Reads go
/// through [`BlockRead`] so the loops downstream never see the FFI.
pub(crate) struct DvdFileHandle<'a> {
	/// # Raw Handle.
	ptr: *mut dvdread_rs::dvd_file_t,

	/// # Parent Lifetime.
	_dvd: PhantomData<&'a LibdvdreadInstance>,
}

impl Drop for DvdFileHandle<'_> {
	#[allow(unsafe_code)]
	fn drop(&mut self) {
		if ! self.ptr.is_null() {
			unsafe { dvdread_rs::DVDCloseFile(self.ptr); }
		}
	}
}

impl BlockRead for DvdFileHandle<'_> {
	#[allow(unsafe_code)]
	fn read_blocks(&self, offset: u32, blocks: u32, buf: &mut [u8])
	-> Result<usize, DvdMirrorError> {
		let want = usize::try_from(blocks).map_err(|_| DvdMirrorError::Overflow)?;
		if buf.len() < want * BLOCK_LEN {
			return Err(DvdMirrorError::Bug("Read buffer is too small."));
		}

		let got = unsafe {
			dvdread_rs::DVDReadBlocks(
				self.ptr,
				i32::try_from(offset).map_err(|_| DvdMirrorError::Overflow)?,
				want,
				buf.as_mut_ptr(),
			)
		};
		if got < 0 { Err(DvdMirrorError::DiscRead) }
		else { Ok(usize::try_from(got).map_err(|_| DvdMirrorError::Overflow)?.min(want)) }
	}
}



#[derive(Debug, Clone)]
/// # Domain Stat.
pub(crate) struct DvdStat {
	/// # Total Size in Bytes.
	pub(crate) size: u64,

	/// # Per-Part Sizes in Bytes (Title VOBs Only).
	pub(crate) parts: Vec<u64>,
}

#[derive(Debug, Clone, Copy)]
/// # Raw Per-Title Record.
pub(crate) struct RawTitle {
	/// # Owning Title Set.
	pub(crate) title_set: u8,

	/// # Ordinal Within the Title Set.
	pub(crate) vts_title: u8,

	/// # Chapter Count.
	pub(crate) chapters: u16,

	/// # Angle Count.
	pub(crate) angles: u8,
}

#[derive(Debug, Clone, Copy)]
/// # Raw Per-Title-Set Attributes.
pub(crate) struct RawSetAttrs {
	/// # Subpicture Stream Count.
	pub(crate) subpictures: u8,

	/// # Audio Stream Count.
	pub(crate) audio_streams: u8,

	/// # Maximum Audio Channels.
	pub(crate) max_channels: u8,

	/// # Aspect-Ratio Code.
	pub(crate) aspect: u8,
}

#[derive(Debug, Clone)]
/// # Parsed VMG Metadata.
pub(crate) struct VmgInfo {
	/// # Number of Title Sets.
	pub(crate) title_sets: u8,

	/// # Per-Title Records.
	pub(crate) titles: Vec<RawTitle>,

	/// # Per-Title-Set Attributes.
	pub(crate) attrs: Vec<RawSetAttrs>,
}

#[derive(Debug, Clone, Copy)]
/// # Part-of-Title Entry.
pub(crate) struct PartOfTitle {
	/// # Program Chain Number (1-Based).
	pub(crate) pgcn: u16,

	/// # Program Number (1-Based).
	pub(crate) pgn: u16,
}

#[derive(Debug, Clone)]
/// # Program Chain.
pub(crate) struct ProgramChain {
	/// # Program → First Cell Map (1-Based Cell Numbers).
	pub(crate) program_map: Vec<u8>,

	/// # Cell Playback Spans (First/Last Sector, Inclusive).
	pub(crate) cells: Vec<(u32, u32)>,
}

#[derive(Debug, Clone)]
/// # Parsed VTS Chapter Table.
pub(crate) struct VtsChapterTable {
	/// # Per-VTS-Title Part-of-Title Entries.
	pub(crate) titles: Vec<Vec<PartOfTitle>>,

	/// # Program Chains.
	pub(crate) pgcs: Vec<ProgramChain>,
}



#[cfg(test)]
pub(crate) mod testing {
	/*!
	# Synthetic Disc.
	*/

	use super::{
		BLOCK_LEN,
		BlockRead,
		DvdMirrorError,
	};

	/// # In-Memory Disc.
	///
	/// A fake block source for the copy/refresh/compare tests. Reads come
	/// straight out of the backing vector; an optional trouble spot makes
	/// any request touching it short-read (or fail outright).
	pub(crate) struct MemoryDisc {
		/// # Backing Data.
		pub(crate) data: Vec<u8>,

		/// # Block Index That "Fails".
		pub(crate) bad_block: Option<u32>,
	}

	impl MemoryDisc {
		/// # New Instance.
		///
		/// Build a disc of `blocks` blocks, each filled with a value
		/// derived from its index so mismatches are easy to spot.
		pub(crate) fn new(blocks: u32) -> Self {
			let mut data = Vec::with_capacity(blocks as usize * BLOCK_LEN);
			for b in 0..blocks {
				#[expect(clippy::cast_possible_truncation, reason = "Wrapping is the point.")]
				data.extend(std::iter::repeat((b % 251 + 1) as u8).take(BLOCK_LEN));
			}
			Self { data, bad_block: None }
		}

		/// # Total Blocks.
		pub(crate) fn blocks(&self) -> u32 {
			u32::try_from(self.data.len() / BLOCK_LEN).unwrap_or(0)
		}
	}

	impl BlockRead for MemoryDisc {
		fn read_blocks(&self, offset: u32, blocks: u32, buf: &mut [u8])
		-> Result<usize, DvdMirrorError> {
			let total = self.blocks();
			if total <= offset { return Err(DvdMirrorError::DiscRead); }

			// Stop short at the trouble spot, if any.
			let mut end = total.min(offset + blocks);
			if let Some(bad) = self.bad_block {
				if bad == offset { return Err(DvdMirrorError::DiscRead); }
				if (offset..end).contains(&bad) { end = bad; }
			}

			let got = (end - offset) as usize;
			let from = offset as usize * BLOCK_LEN;
			buf[..got * BLOCK_LEN].copy_from_slice(&self.data[from..from + got * BLOCK_LEN]);
			Ok(got)
		}
	}
}
