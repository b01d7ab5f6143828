/*!
# DVD Mirror: Block Copier
*/

use crate::{
	BLOCK_LEN,
	BlockRead,
	BUFFER_BLOCKS,
	DvdMirrorError,
	KillSwitch,
	MirrorOptions,
	ReadErrorStrategy,
};
use fyi_msg::{
	Msg,
	Progless,
};



/// # Copy a Contiguous Block Range.
///
/// Stream `blocks` logical blocks from the disc, starting at
/// `disc_offset`, appending them to `out`. Reads move through a 1 MiB
/// working buffer; writes are committed before the next read is issued.
///
/// A short read is handled per the configured [`ReadErrorStrategy`]:
/// abort, pad a single zero block, or pad the whole shortfall. Padding
/// "pretends" the missing blocks were read so the output stays
/// block-accurate; a later refresh run can recognize and refill the
/// zeroes.
///
/// ## Errors
///
/// Returns an error on any output I/O failure, on user abort, or — with
/// the abort strategy — on the first short read.
pub(super) fn copy_blocks<S: BlockRead>(
	src: &S,
	out: &mut std::fs::File,
	disc_offset: u64,
	blocks: u64,
	path: &str,
	label: &str,
	opts: &MirrorOptions,
	progress: Option<&Progless>,
	killed: &KillSwitch,
) -> Result<(), DvdMirrorError> {
	use std::io::Write;

	let mut buf: Vec<u8> = vec![0; BUFFER_BLOCKS as usize * BLOCK_LEN];
	let zeroes: Vec<u8> = vec![0; BUFFER_BLOCKS as usize * BLOCK_LEN];

	let mut offset = disc_offset;
	let mut remaining = blocks;

	while 0 < remaining {
		if killed.killed() { return Err(DvdMirrorError::Killed); }

		let chunk = remaining.min(BUFFER_BLOCKS);
		let got = read_chunk(src, offset, chunk, &mut buf)?;

		if 0 < got {
			out.write_all(&buf[..got as usize * BLOCK_LEN])
				.map_err(|e| DvdMirrorError::FileIo(path.to_owned(), "write", e.to_string()))?;
			offset += got;
			remaining -= got;
		}

		// Short reads get the strategy treatment.
		let mut padded = 0;
		if got < chunk {
			let pad = match opts.strategy() {
				ReadErrorStrategy::Abort => {
					Msg::error(format!("Error reading {label} at block {offset}.")).eprint();
					return Err(DvdMirrorError::DiscReadAt(label.to_owned(), offset));
				},
				ReadErrorStrategy::SkipBlock => {
					Msg::warning(format!("Error reading {label} at block {offset}; padding single block.")).eprint();
					1
				},
				ReadErrorStrategy::SkipMultiBlock => {
					let pad = chunk - got;
					Msg::warning(format!("Error reading {label} at block {offset}; padding {pad} blocks.")).eprint();
					pad
				},
			}
				.min(remaining);

			out.write_all(&zeroes[..pad as usize * BLOCK_LEN])
				.map_err(|e| DvdMirrorError::FileIo(path.to_owned(), "write", e.to_string()))?;

			// Pretend we read what we padded.
			offset += pad;
			remaining -= pad;
			padded = pad;
		}

		if let Some(p) = progress {
			p.increment_n(u32::try_from(got + padded).unwrap_or(u32::MAX));
		}
	}

	Ok(())
}

/// # Read Up to `chunk` Blocks.
///
/// A hard read failure — the disc produced nothing at all — is folded
/// into a zero-length short read so the caller's strategy handling covers
/// both cases; only overflow bubbles up directly.
fn read_chunk<S: BlockRead>(src: &S, offset: u64, chunk: u64, buf: &mut [u8])
-> Result<u64, DvdMirrorError> {
	let offset32 = u32::try_from(offset).map_err(|_| DvdMirrorError::Overflow)?;
	let chunk32 = u32::try_from(chunk).map_err(|_| DvdMirrorError::Overflow)?;
	match src.read_blocks(offset32, chunk32, buf) {
		Ok(n) => Ok(n as u64),
		Err(DvdMirrorError::DiscRead) => Ok(0),
		Err(e) => Err(e),
	}
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::dvdread::testing::MemoryDisc;
	use std::io::{
		Read,
		Seek,
	};

	/// # Fresh Temporary File.
	fn tmp() -> std::fs::File {
		tempfile::tempfile().expect("Failed to create a temporary file.")
	}

	/// # Read It All Back.
	fn slurp(f: &mut std::fs::File) -> Vec<u8> {
		let mut out = Vec::new();
		f.seek(std::io::SeekFrom::Start(0)).expect("Seek failed.");
		f.read_to_end(&mut out).expect("Read failed.");
		out
	}

	#[test]
	fn t_copy_clean() {
		let disc = MemoryDisc::new(600);
		let mut out = tmp();
		let opts = MirrorOptions::default();
		copy_blocks(&disc, &mut out, 0, 600, "t.vob", "TEST VOB", &opts, None, &KillSwitch::default())
			.expect("Clean copy failed.");

		assert_eq!(slurp(&mut out), disc.data, "Copied bytes should match the source.");
	}

	#[test]
	fn t_copy_offset() {
		let disc = MemoryDisc::new(64);
		let mut out = tmp();
		let opts = MirrorOptions::default();
		copy_blocks(&disc, &mut out, 10, 20, "t.vob", "TEST VOB", &opts, None, &KillSwitch::default())
			.expect("Offset copy failed.");

		assert_eq!(
			slurp(&mut out),
			&disc.data[10 * BLOCK_LEN..30 * BLOCK_LEN],
			"The copy should begin at the disc offset."
		);
	}

	#[test]
	fn t_copy_skip_multiblock() {
		// A short read 17 blocks into a 512-block request should yield
		// 17 real blocks followed by 495 zeroes.
		let mut disc = MemoryDisc::new(512);
		disc.bad_block = Some(17);

		let mut out = tmp();
		let opts = MirrorOptions::default().with_strategy(ReadErrorStrategy::SkipMultiBlock);
		copy_blocks(&disc, &mut out, 0, 512, "t.vob", "TEST VOB", &opts, None, &KillSwitch::default())
			.expect("Skip-multiblock copy failed.");

		let copy = slurp(&mut out);
		assert_eq!(copy.len(), 512 * BLOCK_LEN);
		assert_eq!(&copy[..17 * BLOCK_LEN], &disc.data[..17 * BLOCK_LEN]);
		assert!(
			copy[17 * BLOCK_LEN..].iter().all(|&b| b == 0),
			"The padded tail should be all zeroes."
		);
	}

	#[test]
	fn t_copy_skip_block() {
		let mut disc = MemoryDisc::new(512);
		disc.bad_block = Some(17);

		let mut out = tmp();
		let opts = MirrorOptions::default().with_strategy(ReadErrorStrategy::SkipBlock);
		copy_blocks(&disc, &mut out, 0, 512, "t.vob", "TEST VOB", &opts, None, &KillSwitch::default())
			.expect("Skip-block copy failed.");

		let copy = slurp(&mut out);
		assert_eq!(copy.len(), 512 * BLOCK_LEN);
		assert!(
			copy[17 * BLOCK_LEN..18 * BLOCK_LEN].iter().all(|&b| b == 0),
			"Only the unreadable block should be zeroed."
		);
		assert_eq!(
			&copy[18 * BLOCK_LEN..],
			&disc.data[18 * BLOCK_LEN..],
			"Data after the bad block should line back up."
		);
	}

	#[test]
	fn t_copy_abort() {
		let mut disc = MemoryDisc::new(512);
		disc.bad_block = Some(17);

		let mut out = tmp();
		let opts = MirrorOptions::default().with_strategy(ReadErrorStrategy::Abort);
		let res = copy_blocks(&disc, &mut out, 0, 512, "t.vob", "TEST VOB", &opts, None, &KillSwitch::default());
		assert!(
			matches!(res, Err(DvdMirrorError::DiscReadAt(_, 17))),
			"Abort should surface the failing block."
		);
	}
}
