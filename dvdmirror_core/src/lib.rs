/*!
# DVD Mirror: Library
*/

#![deny(
	clippy::allow_attributes_without_reason,
	clippy::correctness,
	unreachable_pub,
	unsafe_code,
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

#![expect(clippy::redundant_pub_crate, reason = "Unresolvable.")]

mod abort;
mod disc;
mod dvdread;
mod error;
mod feature;
mod inventory;
mod mirror;

pub use abort::KillSwitch;
pub use disc::{
	Disc,
	DiscInfo,
};
pub(crate) use dvdread::{
	BlockRead,
	DvdFileHandle,
	FileDomain,
	LibdvdreadInstance,
};
pub use error::DvdMirrorError;
pub use inventory::{
	TitleDescriptor,
	TitleSetInventory,
	TitlesInfo,
};
pub use mirror::opts::{
	MirrorOptions,
	ReadErrorStrategy,
	RefreshOrder,
};
pub(crate) use mirror::Mirror;



// Blocks
// ---------------

/// # Size of a DVD logical block.
///
/// Every disc offset and size in the library is expressed in these; byte
/// positions are always derived by multiplication.
pub const BLOCK_LEN: usize = 2048;

/// # Copy Buffer Size (Blocks).
///
/// Reads and writes move through a 1 MiB working buffer.
pub(crate) const BUFFER_BLOCKS: u64 = 512;

/// # Maximum VOB Size (Blocks).
///
/// Title VOBs are split at 1 GiB, i.e. `524,288` logical blocks.
pub(crate) const MAX_VOB_BLOCKS: u64 = 524_288;

/// # Maximum Title-VOB Parts Per Title Set.
pub(crate) const MAX_VOB_PARTS: u8 = 9;



// Refresh
// ---------------

/// # Verification Sample Target.
///
/// Refresh runs spot-check up to this many existing blocks against the
/// disc before writing anything.
pub(crate) const GAP_SAMPLE_TARGET: u64 = 32;



// Gap Map
// ---------------

/// # Gap Map Rows.
pub(crate) const GAP_MAP_ROWS: u64 = 20;

/// # Gap Map Columns.
pub(crate) const GAP_MAP_COLS: u64 = 60;

/// # Innermost Turn Length (Blocks).
///
/// The angular estimate models one disc revolution as holding between
/// `GAP_MAP_TURN_INNER` and `GAP_MAP_TURN_OUTER` blocks, interpolated
/// linearly across the rows. A visualization aid, not calibrated
/// geometry.
pub(crate) const GAP_MAP_TURN_INNER: u64 = 192;

/// # Outermost Turn Length (Blocks).
pub(crate) const GAP_MAP_TURN_OUTER: u64 = 432;



// Aspect Codes
// ---------------

/// # Aspect-Ratio Code: 4:3.
pub const ASPECT_43: u8 = 0;

/// # Aspect-Ratio Code: 16:9.
pub const ASPECT_169: u8 = 3;
