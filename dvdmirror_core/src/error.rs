/*!
# DVD Mirror: Errors
*/

#[cfg(feature = "bin")] use argyle::ArgyleError;
use fyi_msg::Msg;
use std::{
	error::Error,
	fmt,
};



#[cfg(feature = "bin")]
/// # Help Text.
const HELP: &str = concat!(r#"
      ______
     /      \
    | () ___ |    "#, "\x1b[38;5;199mDVD Mirror\x1b[0;38;5;69m v", env!("CARGO_PKG_VERSION"), "\x1b[0m", r#"
    |   (__) |    Faithful VIDEO_TS mirroring
     \______/     with incremental gap recovery.

USAGE:
    dvdmirror [OPTIONS]

MODES:
    -I, --info        Print a structured report about the disc — file
                      structure, the guessed main feature, and a per-title-
                      set breakdown — then exit.
    -M, --mirror      Mirror the whole disc.
    -F, --feature     Mirror the main feature title set (heuristically
                      guessed; see -a/--aspect).
    -T, --title-set <NUM>
                      Mirror a single title set.
    -t, --title <NUM> Mirror a single title (all of its chapters).
    -s, --start-chapter <NUM>
    -e, --end-chapter <NUM>
                      Restrict -t/--title to an inclusive chapter range.
        --compare     Instead of copying, compare the disc against an
                      existing mirror byte-for-byte (combine with any of
                      the mirror-shaped modes above).

INPUT/OUTPUT:
    -i, --input <PATH>
                      The DVD device, image file, or mounted directory to
                      read from. [default: /dev/dvd]
    -o, --output <DIR>
                      The target root; the mirror lands in
                      <DIR>/<NAME>/VIDEO_TS/. Required for copy modes.
    -n, --name <NAME> Override the title name; by default it is derived
                      from the disc's volume identifier.

ERROR RECOVERY:
    -r, --error <a|b|m>
                      What to do when the disc short-reads: (a)bort,
                      pad a single (b)lock, or pad (m)ultiple blocks and
                      move on. [default: b]
        --refresh     Do not restart a partial mirror from scratch; scan
                      the existing files for blank/missing sectors, verify
                      a sample of the rest against the disc, and re-read
                      only what is absent.
        --order <forward|reverse|outside-in|random>
                      Traversal order for refresh re-reads; non-sequential
                      orders can be gentler on dying media.
                      [default: forward]
        --seed <NUM>  Seed for the random refresh order. [default: 0]
        --gap-map     With --compare: render a rough 20x60 map of where on
                      the disc surface the blank/missing sectors live.

MISCELLANEOUS:
    -a, --aspect <4:3|16:9>
                      Preferred aspect ratio when a disc carries the same
                      feature twice. [default: 16:9]
    -p, --progress    Show a progress bar while copying/comparing.
    -v, --verbose     Print detailed per-file information to STDERR.
    -h, --help        Print help information to STDOUT and exit.
    -V, --version     Print version information to STDOUT and exit.

Partial output is never deleted, even on failure; re-run with --refresh
to pick up where a bad disc left off.
"#);



#[derive(Debug, Clone, Eq, PartialEq)]
/// # Errors.
pub enum DvdMirrorError {
	/// # Bug!
	Bug(&'static str),

	/// # Chapters span more than one program chain.
	ChapterPgc(u16),

	/// # Invalid device.
	Device(String),

	/// # Unable to open device.
	DeviceOpen(Option<String>),

	/// # Disc read error (no context).
	DiscRead,

	/// # Disc read error at a specific block.
	DiscReadAt(String, u64),

	/// # Output file I/O: path, operation, OS error.
	FileIo(String, &'static str, String),

	/// # Unable to open IFO metadata.
	IfoOpen(u8),

	/// # Unable to read IFO bytes.
	IfoRead(u8),

	/// # IFO size is not block-aligned.
	IfoSize(u8),

	/// # User Abort.
	Killed,

	/// # No Such Chapter.
	NoChapters(u16),

	/// # No Such Title.
	NoTitle(u16),

	/// # No Such Title Set.
	NoTitleSet(u8, u8),

	/// # Destination exists but is not a regular file.
	NotAFile(String),

	/// # Numbers can't be converted to the necessary types.
	Overflow,

	/// # Mirrored file is the wrong size for comparison.
	SizeMismatch(String),

	/// # Mirrored file holds data past the expected end.
	TrailingData(String),

	/// # Disc/file contents differ.
	Verification(String, u64),

	/// # Chapter extraction from the VMG domain.
	VmgChapters,

	/// # Title VOB size is not block-aligned.
	VobSize(u8, u8),

	/// # Unable to read the volume identifier.
	VolumeLabel,

	#[cfg(feature = "bin")]
	/// # Argyle Passthrough.
	Argue(ArgyleError),

	#[cfg(feature = "bin")]
	/// # Invalid CLI arg.
	CliArg(String),

	#[cfg(feature = "bin")]
	/// # CLI Parsing failure.
	CliParse(&'static str),
}

impl Error for DvdMirrorError {}

#[cfg(feature = "bin")]
impl From<ArgyleError> for DvdMirrorError {
	#[inline]
	fn from(err: ArgyleError) -> Self { Self::Argue(err) }
}

impl From<DvdMirrorError> for Msg {
	#[inline]
	fn from(src: DvdMirrorError) -> Self { Self::error(src.to_string()) }
}

impl fmt::Display for DvdMirrorError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bug(s) => write!(f, "Bug: {s}."),
			Self::ChapterPgc(t) => write!(f, "Title #{t} spans multiple program chains; chapter extraction would be wrong, aborting."),
			Self::Device(s) => write!(f, "Invalid device path {s}."),
			Self::DeviceOpen(s) =>
				if let Some(s) = s { write!(f, "Unable to open {s}.") }
				else { f.write_str("Unable to open the default DVD device.") },
			Self::DiscRead => f.write_str("Read error."),
			Self::DiscReadAt(label, block) => write!(f, "Error reading {label} at block {block}."),
			Self::FileIo(path, op, err) => write!(f, "{path}: {op} failed ({err})."),
			Self::IfoOpen(n) =>
				if *n == 0 { f.write_str("Cannot open Video Manager (VMG) info.") }
				else { write!(f, "Failed opening IFO for title set {n}.") },
			Self::IfoRead(n) => write!(f, "Error reading IFO for title set {n}."),
			Self::IfoSize(n) => write!(f, "The IFO of title set {n} does not have a valid DVD size."),
			Self::Killed => f.write_str("User abort."),
			Self::NoChapters(t) => write!(f, "Title #{t} has no chapters."),
			Self::NoTitle(t) => write!(f, "There is no title #{t} on this disc."),
			Self::NoTitleSet(n, max) => write!(f, "Cannot copy title set {n}; there are only {max} title sets on this DVD."),
			Self::NotAFile(s) => write!(f, "The path {s} is not valid; it may be a directory."),
			Self::Overflow => f.write_str("The numbers are too big for this system architecture."),
			Self::SizeMismatch(s) => write!(f, "Cannot compare {s}; it is missing or the wrong size."),
			Self::TrailingData(s) => write!(f, "{s} contains extra data beyond the expected size."),
			Self::Verification(s, block) => write!(f, "Data mismatch for {s} at sector {block}."),
			Self::VmgChapters => f.write_str("Do not try to copy chapters from the VMG domain; there are none."),
			Self::VobSize(n, part) => write!(f, "The Title VOB number {part} of title set {n} does not have a valid DVD size."),
			Self::VolumeLabel => f.write_str("Cannot read the volume identifier from this disc."),

			#[cfg(feature = "bin")]
			Self::Argue(e) => write!(f, "{e}"),

			#[cfg(feature = "bin")]
			Self::CliArg(s) => write!(f, "Invalid CLI option: {s}"),

			#[cfg(feature = "bin")]
			Self::CliParse(s) => write!(f, "Unable to parse {s}."),
		}
	}
}

#[cfg(feature = "bin")]
impl DvdMirrorError {
	#[must_use]
	/// # Help Text.
	///
	/// The full usage screen, printed by the binary for `-h/--help`.
	pub const fn help() -> &'static str { HELP }
}
