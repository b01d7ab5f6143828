/*!
# DVD Mirror: Disc
*/

use crate::{
	ASPECT_43,
	ASPECT_169,
	DvdMirrorError,
	inventory::nice_size,
	KillSwitch,
	LibdvdreadInstance,
	Mirror,
	MirrorOptions,
	TitleSetInventory,
	TitlesInfo,
};
use fyi_msg::Progless;
use std::{
	fmt,
	path::Path,
};



#[derive(Debug)]
/// # Disc.
///
/// A loaded and parsed DVD-Video volume: the libdvdread handle, the
/// per-title-set file inventory, and the flattened title metadata. All
/// of it is gathered once at open and reused across operations.
pub struct Disc {
	/// # Libdvdread Instance.
	dvd: LibdvdreadInstance,

	/// # File Inventory.
	inventory: TitleSetInventory,

	/// # Title Metadata.
	titles: TitlesInfo,

	/// # Volume Title, Prettified.
	volume: Option<String>,
}

impl Disc {
	/// # New.
	///
	/// Open the device/image/directory and parse the basic structures.
	///
	/// ## Errors
	///
	/// This will return an error if the device cannot be opened or the
	/// Video Manager is missing/mangled.
	pub fn new<P>(dev: P) -> Result<Self, DvdMirrorError>
	where P: AsRef<Path> {
		let dvd = LibdvdreadInstance::new(dev)?;
		let vmg = dvd.vmg()?;
		let inventory = TitleSetInventory::from_disc(&dvd, vmg.title_sets)?;
		let titles = TitlesInfo::from_vmg(&vmg);
		let volume = dvd.volume_identifier().map(|raw| pretty_title(&raw));

		Ok(Self { dvd, inventory, titles, volume })
	}
}

impl Disc {
	#[must_use]
	/// # Volume Title.
	///
	/// The UDF volume identifier, titlecased with underscores turned to
	/// spaces; the default directory name for the mirror.
	pub fn volume_title(&self) -> Option<&str> { self.volume.as_deref() }

	#[must_use]
	/// # File Inventory.
	pub const fn inventory(&self) -> &TitleSetInventory { &self.inventory }

	#[must_use]
	/// # Title Metadata.
	pub const fn titles(&self) -> &TitlesInfo { &self.titles }

	#[must_use]
	/// # Internal Libdvdread.
	pub(crate) const fn dvd(&self) -> &LibdvdreadInstance { &self.dvd }

	#[must_use]
	/// # Structured Info Report.
	///
	/// The full file-structure/main-feature/title-set report, renderable
	/// with `{}`. The aspect preference feeds the main-feature guess.
	pub const fn info(&self, preferred_aspect: u8) -> DiscInfo<'_> {
		DiscInfo { disc: self, preferred_aspect }
	}
}

/// # Mirror Operations.
impl Disc {
	/// # Mirror the Whole Disc.
	///
	/// ## Errors
	///
	/// Bubbles up any I/O, verification, or structural error; partial
	/// output is left in place for a refresh run.
	pub fn mirror(
		&self,
		target: &Path,
		title_name: &str,
		opts: &MirrorOptions,
		progress: &Progless,
		killed: &KillSwitch,
	) -> Result<(), DvdMirrorError> {
		let mut m = Mirror::new(self, target, title_name, *opts, progress, killed);
		m.whole_disc()?;
		m.finish();
		Ok(())
	}

	/// # Mirror One Title Set.
	///
	/// ## Errors
	///
	/// Returns an error if the set is out of range or any file fails.
	pub fn mirror_title_set(
		&self,
		title_set: u8,
		target: &Path,
		title_name: &str,
		opts: &MirrorOptions,
		progress: &Progless,
		killed: &KillSwitch,
	) -> Result<(), DvdMirrorError> {
		let mut m = Mirror::new(self, target, title_name, *opts, progress, killed);
		m.title_set(title_set)?;
		m.finish();
		Ok(())
	}

	/// # Mirror the Main Feature.
	///
	/// ## Errors
	///
	/// Bubbles up any error from the per-set work.
	pub fn mirror_main_feature(
		&self,
		target: &Path,
		title_name: &str,
		opts: &MirrorOptions,
		progress: &Progless,
		killed: &KillSwitch,
	) -> Result<(), DvdMirrorError> {
		let mut m = Mirror::new(self, target, title_name, *opts, progress, killed);
		m.main_feature()?;
		m.finish();
		Ok(())
	}

	/// # Mirror a Whole Title.
	///
	/// Equivalent to extracting chapters one through the end.
	///
	/// ## Errors
	///
	/// Returns an error if the title cannot be resolved or the copy
	/// fails.
	pub fn mirror_title(
		&self,
		title: u16,
		target: &Path,
		title_name: &str,
		opts: &MirrorOptions,
		progress: &Progless,
		killed: &KillSwitch,
	) -> Result<(), DvdMirrorError> {
		self.mirror_chapters(Some(title), 1, u16::MAX, target, title_name, opts, progress, killed)
	}

	#[expect(clippy::too_many_arguments, reason = "The chapter mode is just like this.")]
	/// # Mirror a Chapter Range.
	///
	/// With no title, the longest title of the guessed main feature is
	/// used; chapters are clamped to what exists.
	///
	/// ## Errors
	///
	/// Returns an error if the title cannot be resolved or the copy
	/// fails.
	pub fn mirror_chapters(
		&self,
		title: Option<u16>,
		start_chapter: u16,
		end_chapter: u16,
		target: &Path,
		title_name: &str,
		opts: &MirrorOptions,
		progress: &Progless,
		killed: &KillSwitch,
	) -> Result<(), DvdMirrorError> {
		let mut m = Mirror::new(self, target, title_name, *opts, progress, killed);
		m.chapters(title, start_chapter, end_chapter)?;
		m.finish();
		Ok(())
	}
}

impl fmt::Display for Disc {
	#[inline]
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.info(ASPECT_169), f)
	}
}



#[derive(Debug, Clone, Copy)]
/// # Disc Info Report.
///
/// A borrowed view over a [`Disc`] that renders the structured report:
/// file layout with sizes, the guessed main feature, and a per-title-set
/// breakdown.
pub struct DiscInfo<'a> {
	/// # The Disc.
	disc: &'a Disc,

	/// # Aspect Preference for the Guess.
	preferred_aspect: u8,
}

impl fmt::Display for DiscInfo<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let disc = self.disc;
		let inv = disc.inventory();

		writeln!(
			f,
			"DVD-Video information of the DVD with title \"{}\"\n",
			disc.volume_title().unwrap_or("unknown"),
		)?;

		// The file structure, VMG first.
		f.write_str("File Structure DVD\nVIDEO_TS/\n")?;
		let vmg_ifo = inv.ifo_bytes(0);
		writeln!(f, "\tVIDEO_TS.IFO\t{vmg_ifo:10}\t{}", nice_size(vmg_ifo))?;
		writeln!(f, "\tVIDEO_TS.BUP\t{vmg_ifo:10}\t{}", nice_size(vmg_ifo))?;
		let vmg_menu = inv.menu_bytes(0);
		if vmg_menu != 0 {
			writeln!(f, "\tVIDEO_TS.VOB\t{vmg_menu:10}\t{}", nice_size(vmg_menu))?;
		}

		for k in 1..=inv.title_sets() {
			let ifo = inv.ifo_bytes(k);
			writeln!(f, "\tVTS_{k:02}_0.IFO\t{ifo:10}\t{}", nice_size(ifo))?;
			let menu = inv.menu_bytes(k);
			if menu != 0 {
				writeln!(f, "\tVTS_{k:02}_0.VOB\t{menu:10}\t{}", nice_size(menu))?;
			}
			for (i, &part) in inv.vob_parts(k).iter().enumerate() {
				writeln!(f, "\tVTS_{k:02}_{}.VOB\t{part:10}\t{}", i + 1, nice_size(part))?;
			}
		}

		// The main feature.
		let main = crate::feature::guess_main_title_set(
			disc.titles(),
			inv,
			self.preferred_aspect,
		);
		f.write_str("\n\nMain feature:\n")?;
		writeln!(f, "\tTitle set containing the main feature is {main}")?;
		if let Some(t) = disc.titles().titles().iter().find(|t| t.title_set == main) {
			writeln!(f, "\tThe aspect ratio of the main feature is {}", nice_aspect(t.aspect))?;
			writeln!(f, "\tThe main feature has {} angle(s)", t.angles)?;
			writeln!(f, "\tThe main feature has {} audio track(s)", t.audio_tracks)?;
			writeln!(f, "\tThe main feature has {} subpicture channel(s)", t.subpictures)?;

			let chapters = disc.titles().titles().iter()
				.filter(|t| t.title_set == main)
				.map(|t| t.chapters)
				.max()
				.unwrap_or(0);
			let channels = disc.titles().titles().iter()
				.filter(|t| t.title_set == main)
				.map(|t| t.audio_channels)
				.max()
				.unwrap_or(0);
			writeln!(f, "\tThe main feature has a maximum of {chapters} chapter(s) in one of its titles")?;
			writeln!(f, "\tThe main feature has a maximum of {channels} audio channel(s) in one of its titles")?;
		}

		// Every title set.
		f.write_str("\n\nTitle Sets:")?;
		for k in 1..=inv.title_sets() {
			writeln!(f, "\n\n\tTitle set {k}")?;
			if let Some(t) = disc.titles().titles().iter().find(|t| t.title_set == k) {
				writeln!(f, "\t\tThe aspect ratio of title set {k} is {}", nice_aspect(t.aspect))?;
				writeln!(f, "\t\tTitle set {k} has {} angle(s)", t.angles)?;
				writeln!(f, "\t\tTitle set {k} has {} audio track(s)", t.audio_tracks)?;
				writeln!(f, "\t\tTitle set {k} has {} subpicture channel(s)", t.subpictures)?;
			}

			writeln!(f, "\n\t\tTitles included in title set {k} are")?;
			for t in disc.titles().titles().iter().filter(|t| t.title_set == k) {
				writeln!(f, "\t\t\tTitle {}:", t.title)?;
				writeln!(f, "\t\t\t\tTitle {} has {} chapter(s)", t.title, t.chapters)?;
				writeln!(f, "\t\t\t\tTitle {} has {} audio channel(s)", t.title, t.audio_channels)?;
			}
		}

		Ok(())
	}
}



/// # Aspect Code, For Humans.
const fn nice_aspect(code: u8) -> &'static str {
	match code {
		ASPECT_43 => "4:3",
		ASPECT_169 => "16:9",
		_ => "unknown",
	}
}

/// # Prettify a Volume Identifier.
///
/// Volume labels come back as `SHOUTY_SNAKE_CASE`; turn the underscores
/// to spaces and the shouting to title case for the mirror directory
/// name.
fn pretty_title(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	let mut word_start = true;

	for c in raw.chars() {
		let c = if c == '_' { ' ' } else { c };
		if c == ' ' {
			word_start = true;
			out.push(' ');
		}
		else if word_start {
			out.extend(c.to_uppercase());
			word_start = false;
		}
		else {
			out.extend(c.to_lowercase());
		}
	}

	out.trim().to_owned()
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_pretty_title() {
		assert_eq!(pretty_title("THE_BIG_MOVIE"), "The Big Movie");
		assert_eq!(pretty_title("ALREADY SPACED"), "Already Spaced");
		assert_eq!(pretty_title("lower_case"), "Lower Case");
		assert_eq!(pretty_title("TRAILING_"), "Trailing");
		assert_eq!(pretty_title(""), "");
	}

	#[test]
	fn t_nice_aspect() {
		assert_eq!(nice_aspect(ASPECT_43), "4:3");
		assert_eq!(nice_aspect(ASPECT_169), "16:9");
		assert_eq!(nice_aspect(1), "unknown");
	}
}
