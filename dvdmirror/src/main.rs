/*!
# DVD Mirror!
*/

#![forbid(unsafe_code)]

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
)]

#![warn(
	clippy::complexity,
	clippy::nursery,
	clippy::pedantic,
	clippy::perf,
	clippy::style,

	clippy::allow_attributes,
	clippy::clone_on_ref_ptr,
	clippy::create_dir,
	clippy::filetype_is_file,
	clippy::format_push_string,
	clippy::get_unwrap,
	clippy::impl_trait_in_params,
	clippy::lossy_float_literal,
	clippy::missing_assert_message,
	clippy::missing_docs_in_private_items,
	clippy::needless_raw_strings,
	clippy::panic_in_result_fn,
	clippy::pub_without_shorthand,
	clippy::rest_pat_in_fully_bound_structs,
	clippy::semicolon_inside_block,
	clippy::str_to_string,
	clippy::string_to_string,
	clippy::todo,
	clippy::undocumented_unsafe_blocks,
	clippy::unneeded_field_pattern,
	clippy::unseparated_literal_suffix,
	clippy::unwrap_in_result,

	macro_use_extern_crate,
	missing_copy_implementations,
	missing_docs,
	non_ascii_idents,
	trivial_casts,
	trivial_numeric_casts,
	unused_crate_dependencies,
	unused_extern_crates,
	unused_import_braces,
)]



use argyle::{
	Argue,
	ArgyleError,
	FLAG_HELP,
	FLAG_VERSION,
};
use dactyl::traits::BytesToUnsigned;
use dvdmirror_core::{
	ASPECT_43,
	ASPECT_169,
	Disc,
	DvdMirrorError,
	KillSwitch,
	MirrorOptions,
	ReadErrorStrategy,
	RefreshOrder,
};
use fyi_msg::{
	Msg,
	Progless,
};
use oxford_join::OxfordJoin;
use std::{
	borrow::Cow,
	path::PathBuf,
	sync::{
		atomic::{
			AtomicBool,
			Ordering::{
				Relaxed,
				SeqCst,
			},
		},
		Arc,
	},
};
use trimothy::TrimSlice;
use utc2k::FmtUtc2k;



/// # Default Device.
const DEFAULT_DEVICE: &str = "/dev/dvd";



#[derive(Debug, Clone, Copy, Eq, PartialEq)]
/// # Operating Mode.
enum Mode {
	/// # Structured Info Report.
	Info,

	/// # Whole Disc.
	Mirror,

	/// # One Title Set.
	TitleSet(u8),

	/// # The Main Feature.
	Feature,

	/// # One Title.
	Title(u16),

	/// # A Chapter Range.
	Chapters(Option<u16>, u16, u16),
}



/// # Main.
///
/// This lets us bubble up startup errors so they can be pretty-printed.
fn main() {
	match _main() {
		Ok(()) => {},
		Err(DvdMirrorError::Argue(ArgyleError::WantsVersion)) => {
			println!(concat!("DVD Mirror v", env!("CARGO_PKG_VERSION")));
		},
		Err(DvdMirrorError::Argue(ArgyleError::WantsHelp)) => {
			println!("{}", DvdMirrorError::help());
		},
		Err(e) => {
			Msg::from(e).eprint();
			std::process::exit(1);
		},
	}
}

#[inline]
/// # Actual Main.
///
/// This does all the stuff.
fn _main() -> Result<(), DvdMirrorError> {
	// Load CLI arguments, if any.
	let args = Argue::new(FLAG_HELP | FLAG_VERSION)?;

	// Check for unknown args.
	if let Some(boo) = args.check_keys(
		&[
			b"--compare",
			b"--feature",
			b"--gap-map",
			b"--info",
			b"--mirror",
			b"--progress",
			b"--refresh",
			b"--verbose",
			b"-F",
			b"-I",
			b"-M",
			b"-p",
			b"-v",
		],
		&[
			b"--aspect",
			b"--end-chapter",
			b"--error",
			b"--input",
			b"--name",
			b"--order",
			b"--output",
			b"--seed",
			b"--start-chapter",
			b"--title",
			b"--title-set",
			b"-a",
			b"-e",
			b"-i",
			b"-n",
			b"-o",
			b"-r",
			b"-s",
			b"-t",
			b"-T",
		],
	) {
		return Err(DvdMirrorError::CliArg(String::from_utf8_lossy(boo).into_owned()));
	}

	// Options first; the mode dispatch needs them.
	let opts = parse_options(&args)?;
	let mode = parse_mode(&args, &opts)?;

	// Open the disc.
	let dev = args.option2_os(b"-i", b"--input")
		.map_or_else(|| PathBuf::from(DEFAULT_DEVICE), PathBuf::from);
	let disc = Disc::new(&dev)?;

	// Info mode is all bark, no bite.
	if matches!(mode, Mode::Info) {
		println!("{}", disc.info(opts.aspect()));
		return Ok(());
	}

	// Figure out where everything goes.
	let target = args.option2_os(b"-o", b"--output")
		.map(PathBuf::from)
		.ok_or(DvdMirrorError::CliParse("-o/--output"))?;
	let name: String = args.option2(b"-n", b"--name")
		.map(|v| String::from_utf8_lossy(v.trim()).into_owned())
		.filter(|v| ! v.is_empty())
		.map_or_else(
			|| disc.volume_title()
				.map(ToOwned::to_owned)
				.ok_or(DvdMirrorError::VolumeLabel),
			Ok,
		)?;

	// The core treats directory creation as somebody else's problem.
	// We're the somebody.
	let dir = target.join(&name).join("VIDEO_TS");
	std::fs::create_dir_all(&dir)
		.map_err(|e| DvdMirrorError::FileIo(
			dir.to_string_lossy().into_owned(),
			"mkdir",
			e.to_string(),
		))?;

	// Set up progress and killswitch in case they're needed.
	let progress = Progless::default();
	let killed = KillSwitch::default();
	sigint(killed.inner(), Some(progress.clone()));

	summary(&dev, &target, &name, mode, &opts);
	if opts.verbose() { log_header(&dev); }

	// Mirror and mirror and mirror!
	match mode {
		Mode::Info => {},
		Mode::Mirror => disc.mirror(&target, &name, &opts, &progress, &killed)?,
		Mode::TitleSet(k) => disc.mirror_title_set(k, &target, &name, &opts, &progress, &killed)?,
		Mode::Feature => disc.mirror_main_feature(&target, &name, &opts, &progress, &killed)?,
		Mode::Title(t) => disc.mirror_title(t, &target, &name, &opts, &progress, &killed)?,
		Mode::Chapters(t, a, b) =>
			disc.mirror_chapters(t, a, b, &target, &name, &opts, &progress, &killed)?,
	}

	if killed.killed() { Err(DvdMirrorError::Killed) }
	else {
		Msg::success(format!(
			"{} {}/{name}/VIDEO_TS.",
			if opts.compare() { "Compared against" } else { "Mirrored to" },
			target.to_string_lossy(),
		)).eprint();
		Ok(())
	}
}

/// # Parse the Operating Mode.
fn parse_mode(args: &Argue, opts: &MirrorOptions) -> Result<Mode, DvdMirrorError> {
	let start = args.option2(b"-s", b"--start-chapter")
		.map(|v| u16::btou(v.trim()).ok_or(DvdMirrorError::CliParse("-s/--start-chapter")))
		.transpose()?;
	let end = args.option2(b"-e", b"--end-chapter")
		.map(|v| u16::btou(v.trim()).ok_or(DvdMirrorError::CliParse("-e/--end-chapter")))
		.transpose()?;
	let title = args.option2(b"-t", b"--title")
		.map(|v| u16::btou(v.trim()).ok_or(DvdMirrorError::CliParse("-t/--title")))
		.transpose()?;

	let mode =
		if args.switch2(b"-I", b"--info") { Mode::Info }
		else if args.switch2(b"-M", b"--mirror") { Mode::Mirror }
		else if args.switch2(b"-F", b"--feature") { Mode::Feature }
		else if let Some(v) = args.option2(b"-T", b"--title-set") {
			let k = u8::btou(v.trim()).ok_or(DvdMirrorError::CliParse("-T/--title-set"))?;
			Mode::TitleSet(k)
		}
		else if start.is_some() || end.is_some() {
			Mode::Chapters(title, start.unwrap_or(1), end.unwrap_or(u16::MAX))
		}
		else if let Some(t) = title { Mode::Title(t) }
		else {
			return Err(DvdMirrorError::CliParse("a mode (-I, -M, -F, -T, or -t)"));
		};

	// Comparison only makes sense for whole-file modes; chapter output
	// has no disc-side twin to diff against.
	if opts.compare() && matches!(mode, Mode::Title(_) | Mode::Chapters(_, _, _)) {
		return Err(DvdMirrorError::CliParse("--compare (not available for -t/-s/-e)"));
	}

	Ok(mode)
}

/// # Parse Mirror Options.
fn parse_options(args: &Argue) -> Result<MirrorOptions, DvdMirrorError> {
	let mut opts = MirrorOptions::default()
		.with_compare(args.switch(b"--compare"))
		.with_gap_map(args.switch(b"--gap-map"))
		.with_progress(args.switch2(b"-p", b"--progress"))
		.with_refresh(args.switch(b"--refresh"))
		.with_verbose(args.switch2(b"-v", b"--verbose"));

	if let Some(v) = args.option2(b"-r", b"--error") {
		let v = v.trim();
		opts = opts.with_strategy(
			if v == b"a" || v == b"abort" { ReadErrorStrategy::Abort }
			else if v == b"b" || v == b"block" { ReadErrorStrategy::SkipBlock }
			else if v == b"m" || v == b"multi" { ReadErrorStrategy::SkipMultiBlock }
			else { return Err(DvdMirrorError::CliParse("-r/--error")); }
		);
	}

	if let Some(v) = args.option(b"--order") {
		let v = v.trim();
		opts = opts.with_order(
			if v == b"forward" { RefreshOrder::Forward }
			else if v == b"reverse" { RefreshOrder::Reverse }
			else if v == b"outside-in" { RefreshOrder::OutsideIn }
			else if v == b"random" { RefreshOrder::Random }
			else { return Err(DvdMirrorError::CliParse("--order")); }
		);
	}

	if let Some(v) = args.option(b"--seed") {
		let seed = u64::btou(v.trim()).ok_or(DvdMirrorError::CliParse("--seed"))?;
		opts = opts.with_seed(Some(seed));
	}

	if let Some(v) = args.option2(b"-a", b"--aspect") {
		let v = v.trim();
		opts = opts.with_aspect(
			if v == b"4:3" || v == b"0" { ASPECT_43 }
			else if v == b"16:9" || v == b"3" { ASPECT_169 }
			else { return Err(DvdMirrorError::CliParse("-a/--aspect")); }
		);
	}

	Ok(opts)
}

/// # Settings Summary.
///
/// A quick sanity print of what is about to happen, before the drive
/// starts grinding.
fn summary(
	dev: &std::path::Path,
	target: &std::path::Path,
	name: &str,
	mode: Mode,
	opts: &MirrorOptions,
) {
	let nice_mode: Cow<str> = match mode {
		Mode::Info => Cow::Borrowed("Info"),
		Mode::Mirror => Cow::Borrowed("Whole disc"),
		Mode::TitleSet(k) => Cow::Owned(format!("Title set {k}")),
		Mode::Feature => Cow::Borrowed("Main feature"),
		Mode::Title(t) => Cow::Owned(format!("Title {t}")),
		Mode::Chapters(t, a, b) => Cow::Owned(format!(
			"{}, chapter(s) {}",
			t.map_or(Cow::Borrowed("main title"), |t| Cow::Owned(format!("title {t}"))),
			nice_chapters(a, b),
		)),
	};
	let nice_action: Cow<str> =
		if opts.compare() {
			if opts.gap_map() { Cow::Borrowed("Compare (with gap map)") }
			else { Cow::Borrowed("Compare") }
		}
		else if opts.refresh() {
			Cow::Owned(format!("Refresh ({}, seed {})", opts.order().as_str(), opts.seed()))
		}
		else { Cow::Borrowed("Copy") };

	let set = [
		("Source:", Cow::Owned(dev.to_string_lossy().into_owned())),
		("Scope:", nice_mode),
		("Action:", nice_action),
		("On Bad Reads:", Cow::Borrowed(opts.strategy().as_str())),
		("Destination:", Cow::Owned(format!("{}/{name}/VIDEO_TS/", target.to_string_lossy()))),
	];
	let max_label = set.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

	eprintln!("\x1b[1;38;5;199mDVD Mirror…\x1b[0m");
	for (k, v) in set {
		eprintln!("  {k:max_label$} \x1b[1m{v}\x1b[0m");
	}
	eprintln!();
}

/// # Chapter Range, For Humans.
///
/// Short ranges get the full Oxford treatment; long or open-ended ones
/// collapse to arithmetic.
fn nice_chapters(start: u16, end: u16) -> String {
	if end == u16::MAX { format!("{start} through the end") }
	else if end <= start { start.to_string() }
	else if usize::from(end - start) < 8 {
		let all: Vec<String> = (start..=end).map(|c| c.to_string()).collect();
		all.oxford_and().into_owned()
	}
	else { format!("{start} through {end}") }
}

/// # Log Header.
///
/// Print a few basic setup details for the log. Only applies when
/// -v/--verbose is set and we're actually copying something.
fn log_header(dev: &std::path::Path) {
	use std::io::Write;

	let writer = std::io::stdout();
	let mut handle = writer.lock();

	let _res = writeln!(
		&mut handle,
		concat!("#####
## DVD Mirror v", env!("CARGO_PKG_VERSION"), "
## Device: {}
## Date:   {}
#####"),
		dev.to_string_lossy(),
		FmtUtc2k::now(),
	);

	let _res = handle.flush();
}

/// # Hook Up CTRL+C.
fn sigint(killed: Arc<AtomicBool>, progress: Option<Progless>) {
	let _res = ctrlc::set_handler(move ||
		if killed.compare_exchange(false, true, SeqCst, Relaxed).is_ok() {
			if let Some(p) = &progress { p.sigint(); }
		}
	);
}
