/*!
# DVD Mirror: Inventory
*/

use crate::{
	BLOCK_LEN,
	DvdMirrorError,
	dvdread::VmgInfo,
	FileDomain,
	LibdvdreadInstance,
	MAX_VOB_PARTS,
};



#[derive(Debug, Clone, Default)]
/// # Per-Title-Set File Sizes.
struct TitleSetFiles {
	/// # IFO Size in Bytes.
	ifo: u64,

	/// # Menu VOB Size in Bytes (Zero if Absent).
	menu: u64,

	/// # Title-VOB Part Sizes in Bytes.
	parts: Vec<u64>,
}

#[derive(Debug, Clone)]
/// # Title-Set Inventory.
///
/// The byte sizes of every file on the disc, indexed by title set. Index
/// zero is the Video Manager, which by invariant carries no title VOBs.
///
/// All sizes are either zero or a multiple of the logical block length;
/// violations are surfaced when a copy actually needs the figure, fatally
/// for title VOBs and as a warning for menus.
pub struct TitleSetInventory {
	/// # Per-Set Sizes (Index 0 = VMG).
	sets: Vec<TitleSetFiles>,
}

impl TitleSetInventory {
	/// # Build From Disc.
	///
	/// Stat every file domain of every title set, VMG included.
	///
	/// ## Errors
	///
	/// Returns an error if any information file cannot be statted; those
	/// are mandatory.
	pub(crate) fn from_disc(dvd: &LibdvdreadInstance, title_sets: u8)
	-> Result<Self, DvdMirrorError> {
		let mut sets = Vec::with_capacity(usize::from(title_sets) + 1);

		for k in 0..=title_sets {
			let ifo = dvd.stat(k, FileDomain::Info)
				.ok_or(DvdMirrorError::IfoOpen(k))?
				.size;
			let menu = dvd.stat(k, FileDomain::MenuVobs).map_or(0, |s| s.size);

			// The VMG has no title VOBs.
			let parts =
				if k == 0 { Vec::new() }
				else {
					dvd.stat(k, FileDomain::TitleVobs)
						.map_or_else(Vec::new, |s| {
							let mut parts = s.parts;
							parts.truncate(usize::from(MAX_VOB_PARTS));
							parts
						})
				};

			sets.push(TitleSetFiles { ifo, menu, parts });
		}

		Ok(Self { sets })
	}
}

impl TitleSetInventory {
	#[must_use]
	/// # Number of Title Sets (Excluding the VMG).
	pub fn title_sets(&self) -> u8 {
		u8::try_from(self.sets.len().saturating_sub(1)).unwrap_or(u8::MAX)
	}

	#[must_use]
	/// # IFO Size in Bytes.
	pub fn ifo_bytes(&self, title_set: u8) -> u64 {
		self.sets.get(usize::from(title_set)).map_or(0, |s| s.ifo)
	}

	#[must_use]
	/// # Menu VOB Size in Bytes.
	pub fn menu_bytes(&self, title_set: u8) -> u64 {
		self.sets.get(usize::from(title_set)).map_or(0, |s| s.menu)
	}

	#[must_use]
	/// # Title-VOB Part Sizes in Bytes.
	pub fn vob_parts(&self, title_set: u8) -> &[u64] {
		self.sets.get(usize::from(title_set)).map_or(&[], |s| s.parts.as_slice())
	}

	#[must_use]
	/// # Total Title-VOB Size in Bytes.
	pub fn vob_bytes(&self, title_set: u8) -> u64 {
		self.vob_parts(title_set).iter().sum()
	}

	/// # Title-VOB Part Size in Blocks.
	///
	/// `part` is 1-based.
	///
	/// ## Errors
	///
	/// Returns an error if the size is not a multiple of the block length.
	pub(crate) fn part_blocks(&self, title_set: u8, part: u8)
	-> Result<u64, DvdMirrorError> {
		let bytes = self.vob_parts(title_set)
			.get(usize::from(part.saturating_sub(1)))
			.copied()
			.unwrap_or(0);
		if bytes % BLOCK_LEN as u64 == 0 { Ok(bytes / BLOCK_LEN as u64) }
		else { Err(DvdMirrorError::VobSize(title_set, part)) }
	}

	/// # Disc Offset of a Title-VOB Part, in Blocks.
	///
	/// The title-VOB domain is one continuous address space; part `p`
	/// starts after the sum of all earlier parts.
	///
	/// ## Errors
	///
	/// Returns an error if any earlier part is not block-aligned.
	pub(crate) fn part_offset_blocks(&self, title_set: u8, part: u8)
	-> Result<u64, DvdMirrorError> {
		let mut offset = 0;
		for p in 1..part {
			offset += self.part_blocks(title_set, p)?;
		}
		Ok(offset)
	}
}



#[derive(Debug, Clone, Copy)]
/// # Title Descriptor.
///
/// One playable title, flattened from the VMG's search tables together
/// with its title set's stream attributes.
pub struct TitleDescriptor {
	/// # Title Number (1-Based, Disc-Wide).
	pub(crate) title: u16,

	/// # Owning Title Set.
	pub(crate) title_set: u8,

	/// # Ordinal Within the Title Set.
	pub(crate) vts_title: u8,

	/// # Chapter Count.
	pub(crate) chapters: u16,

	/// # Angle Count.
	pub(crate) angles: u8,

	/// # Aspect-Ratio Code.
	pub(crate) aspect: u8,

	/// # Audio Track Count.
	pub(crate) audio_tracks: u8,

	/// # Maximum Audio Channels.
	pub(crate) audio_channels: u8,

	/// # Subpicture Stream Count.
	pub(crate) subpictures: u8,
}

impl TitleDescriptor {
	#[must_use]
	/// # Title Number.
	pub const fn title(&self) -> u16 { self.title }

	#[must_use]
	/// # Owning Title Set.
	pub const fn title_set(&self) -> u8 { self.title_set }

	#[must_use]
	/// # Chapter Count.
	pub const fn chapters(&self) -> u16 { self.chapters }

	#[must_use]
	/// # Angle Count.
	pub const fn angles(&self) -> u8 { self.angles }
}

#[derive(Debug, Clone, Copy, Default)]
/// # Per-Title-Set Stream Attributes.
pub(crate) struct SetAttrs {
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
/// # Titles Info.
///
/// Everything the feature guesser and chapter extractor need to know
/// about the disc's titles, decoupled from the raw IFO structures.
pub struct TitlesInfo {
	/// # Per-Title Records.
	titles: Vec<TitleDescriptor>,

	/// # Per-Title-Set Attributes (Index 0 = Title Set 1).
	attrs: Vec<SetAttrs>,
}

impl TitlesInfo {
	#[must_use]
	/// # From Parsed VMG Data.
	pub(crate) fn from_vmg(vmg: &VmgInfo) -> Self {
		let attrs: Vec<SetAttrs> = vmg.attrs.iter()
			.map(|a| SetAttrs {
				subpictures: a.subpictures,
				audio_streams: a.audio_streams,
				max_channels: a.max_channels,
				aspect: a.aspect,
			})
			.collect();

		let titles: Vec<TitleDescriptor> = vmg.titles.iter()
			.enumerate()
			.map(|(i, t)| {
				let a = usize::from(t.title_set)
					.checked_sub(1)
					.and_then(|k| attrs.get(k))
					.copied()
					.unwrap_or_default();
				TitleDescriptor {
					title: u16::try_from(i + 1).unwrap_or(u16::MAX),
					title_set: t.title_set,
					vts_title: t.vts_title,
					chapters: t.chapters,
					angles: t.angles,
					aspect: a.aspect,
					audio_tracks: a.audio_streams,
					audio_channels: a.max_channels,
					subpictures: a.subpictures,
				}
			})
			.collect();

		Self { titles, attrs }
	}

	#[must_use]
	/// # All Titles.
	pub fn titles(&self) -> &[TitleDescriptor] { &self.titles }

	#[must_use]
	/// # One Title (1-Based).
	pub fn title(&self, title: u16) -> Option<&TitleDescriptor> {
		self.titles.get(usize::from(title.checked_sub(1)?))
	}

	#[must_use]
	/// # Per-Title-Set Attributes.
	pub(crate) fn attrs(&self) -> &[SetAttrs] { &self.attrs }
}



/// # Human-Readable File Size.
///
/// e.g. `25648` becomes `25.05 KiB`.
pub(crate) fn nice_size(bytes: u64) -> String {
	const PREFIXES: [&str; 7] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

	let mut size = bytes as f64;
	let mut prefix = 0;
	while 1024.0 < size && prefix < 6 {
		size /= 1024.0;
		prefix += 1;
	}

	format!("{size:7.2} {}B", PREFIXES[prefix])
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_nice_size() {
		assert_eq!(nice_size(512).trim(), "512.00 B");
		assert_eq!(nice_size(25_648).trim(), "25.05 KiB");
		assert_eq!(nice_size(1_073_741_824).trim(), "1.00 GiB");
	}

	#[test]
	fn t_part_offsets() {
		let inv = TitleSetInventory {
			sets: vec![
				TitleSetFiles { ifo: 4096, menu: 0, parts: Vec::new() },
				TitleSetFiles {
					ifo: 2048,
					menu: 4096,
					parts: vec![1_073_741_824, 155_320_320],
				},
			],
		};

		assert_eq!(inv.title_sets(), 1);
		assert_eq!(inv.vob_bytes(1), 1_073_741_824 + 155_320_320);
		assert_eq!(inv.part_blocks(1, 1).unwrap(), 524_288);
		assert_eq!(inv.part_blocks(1, 2).unwrap(), 75_840);
		assert_eq!(inv.part_offset_blocks(1, 1).unwrap(), 0);
		assert_eq!(inv.part_offset_blocks(1, 2).unwrap(), 524_288);
	}

	#[test]
	fn t_bad_part_size() {
		let inv = TitleSetInventory {
			sets: vec![
				TitleSetFiles::default(),
				TitleSetFiles { ifo: 2048, menu: 0, parts: vec![2047] },
			],
		};
		assert!(
			matches!(inv.part_blocks(1, 1), Err(DvdMirrorError::VobSize(1, 1))),
			"A misaligned part size should be fatal."
		);
	}
}
