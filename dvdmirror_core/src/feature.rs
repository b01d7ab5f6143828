/*!
# DVD Mirror: Main-Feature Guessing

DVD-Video carries no "this is the movie" flag, so the main feature has to
be elected from circumstantial evidence: the feature film is usually the
biggest title set, with the most chapters, the most audio and subpicture
streams, and the beefiest audio channel layout. Menus and extras rarely
manage more than one of those at once.
*/

use crate::{
	inventory::SetAttrs,
	TitleDescriptor,
	TitleSetInventory,
	TitlesInfo,
};
use fyi_msg::Msg;



/// # A Ranked Signal.
///
/// `(value, title_set)` pairs sorted by value descending, then set
/// ascending, so equal inventories always rank — and therefore elect —
/// identically.
type Ranking = Vec<(u64, u8)>;

/// # Guess the Main Title Set.
///
/// Never fails: when the evidence is contradictory the largest-by-bytes
/// title set is returned as a best effort.
pub(crate) fn guess_main_title_set(
	titles: &TitlesInfo,
	inv: &TitleSetInventory,
	preferred_aspect: u8,
) -> u8 {
	let sizes: Vec<u64> = (1..=inv.title_sets())
		.map(|k| inv.vob_bytes(k))
		.collect();
	guess_from_parts(titles.titles(), titles.attrs(), &sizes, preferred_aspect)
}

/// # Guess From Raw Parts.
///
/// The actual election, decoupled from the disc-facing containers.
fn guess_from_parts(
	titles: &[TitleDescriptor],
	attrs: &[SetAttrs],
	sizes: &[u64],
	preferred_aspect: u8,
) -> u8 {
	let title_sets = sizes.len();
	if title_sets == 0 { return 1; }

	// The six signals, ranked. (Angles are collected for reference but
	// carry no weight in the election.)
	let chapter_rankings = rank(titles.iter().map(|t| (u64::from(t.chapters), t.title_set)));
	let _angle_rankings = angle_ranking(titles);
	let subp_rankings = rank_sets(attrs, |a| u64::from(a.subpictures));
	let audio_rankings = rank_sets(attrs, |a| u64::from(a.audio_streams));
	let channel_rankings = rank_sets(attrs, |a| u64::from(a.max_channels));
	let size_rankings = rank(sizes.iter().enumerate().map(|(i, &s)|
		(s, u8::try_from(i + 1).unwrap_or(u8::MAX))
	));

	let biggest = size_rankings[0].1;
	let mut candidate = biggest;
	let mut dual = false;
	let mut multi = false;

	// Is the runner-up close enough in size to be the same feature in a
	// different cut?
	if 1 < title_sets && sizes_comparable(&size_rankings, 1) {
		let second = size_rankings[1].1;
		let aspect_1 = set_aspect(attrs, biggest);
		let aspect_2 = set_aspect(attrs, second);

		if aspect_1 == aspect_2 {
			// Same size range, same aspect: most likely several episodes
			// of the same programme.
			multi = true;
		}
		else if max_chapters(titles, biggest) == max_chapters(titles, second) {
			// Same chapter count, different aspect: the same film twice.
			// Honor the configured preference.
			if aspect_2 == preferred_aspect { candidate = second; }
			else if aspect_1 != preferred_aspect {
				Msg::warning("You have encountered a very special DVD; please send a bug report along with all IFO files from this title.").eprint();
			}
			dual = true;
		}
	}

	let found = confirmations(&audio_rankings, &subp_rankings, &channel_rankings, candidate);
	let found_chapter = chapter_rank(&chapter_rankings, candidate, 6);

	if (found == 3 && found_chapter == 1 && ! dual && ! multi)
		|| (found == 3 && found_chapter < 3 && dual) {
		return candidate;
	}

	// Multi-episode: among the sets tied for largest, prefer the one
	// holding the longest chapter list, if the streams back it up.
	if multi {
		let mut tied: Vec<u8> = vec![biggest];
		for i in 1..title_sets {
			if sizes_comparable(&size_rankings, i) { tied.push(size_rankings[i].1); }
			else { break; }
		}

		if let Some(&(_, set)) = chapter_rankings.iter().find(|(_, s)| tied.contains(s)) {
			candidate = set;
		}
		if confirmations(&audio_rankings, &subp_rankings, &channel_rankings, candidate) == 3 {
			return candidate;
		}
	}

	// More or less given up; retest the biggest with looser thresholds
	// and return it regardless.
	candidate = biggest;
	let found = confirmations(&audio_rankings, &subp_rankings, &channel_rankings, candidate);
	let found_chapter = chapter_rank(&chapter_rankings, candidate, 5);

	if found == 3 { return candidate; }
	if 1 < found && found_chapter <= 4 { return candidate; }
	candidate
}



/// # Build a Ranking.
fn rank<I>(values: I) -> Ranking
where I: Iterator<Item = (u64, u8)> {
	let mut out: Ranking = values.collect();
	out.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
	out
}

/// # Rank a Per-Set Attribute.
fn rank_sets<F>(attrs: &[SetAttrs], value: F) -> Ranking
where F: Fn(&SetAttrs) -> u64 {
	rank(attrs.iter().enumerate().map(|(i, a)|
		(value(a), u8::try_from(i + 1).unwrap_or(u8::MAX))
	))
}

/// # Angle Ranking.
///
/// Kept as a low-value reference point; nothing decides on it.
fn angle_ranking(titles: &[TitleDescriptor]) -> Ranking {
	rank(titles.iter().map(|t| (u64::from(t.angles), t.title_set)))
}

/// # Are Two Size Entries Comparable?
///
/// The runner-up at `target` counts as "the same feature" when the ratio
/// sits in a roughly 1–1.5× window: the integer division is one, doubling
/// the leader and subtracting the target still divides to one, and the
/// remainder tripled stays under the leader.
fn sizes_comparable(size_rankings: &Ranking, target: usize) -> bool {
	let Some(&(s0, _)) = size_rankings.first() else { return false; };
	let Some(&(st, _)) = size_rankings.get(target) else { return false; };
	st != 0
		&& s0 / st == 1
		&& (s0 * 2 - st) / st == 1
		&& (s0 % st) * 3 < s0
}

/// # Stream Confirmations.
///
/// How many of the audio/subpicture/channel rankings place the candidate
/// among the sets tied for the maximum. Zero through three.
fn confirmations(
	audio: &Ranking,
	subp: &Ranking,
	channels: &Ranking,
	candidate: u8,
) -> u8 {
	let mut found = 0;
	for ranking in [audio, subp, channels] {
		let Some(&(top, _)) = ranking.first() else { continue; };
		for &(value, set) in ranking {
			if value < top { break; }
			if set == candidate {
				found += 1;
				break;
			}
		}
	}
	found
}

/// # Chapter Rank.
///
/// The candidate's 1-based position within the top four of the chapter
/// ranking, or `fallback` when it places lower.
fn chapter_rank(chapters: &Ranking, candidate: u8, fallback: u8) -> u8 {
	for (i, &(_, set)) in chapters.iter().take(4).enumerate() {
		if set == candidate {
			return u8::try_from(i + 1).unwrap_or(fallback);
		}
	}
	fallback
}

/// # Max Chapters Within a Set.
fn max_chapters(titles: &[TitleDescriptor], title_set: u8) -> u16 {
	titles.iter()
		.filter(|t| t.title_set == title_set)
		.map(|t| t.chapters)
		.max()
		.unwrap_or(0)
}

/// # A Set's Aspect Code.
fn set_aspect(attrs: &[SetAttrs], title_set: u8) -> u8 {
	usize::from(title_set)
		.checked_sub(1)
		.and_then(|i| attrs.get(i))
		.map_or(0, |a| a.aspect)
}



#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		ASPECT_43,
		ASPECT_169,
	};

	/// # Quick Title.
	const fn title(title_set: u8, chapters: u16, angles: u8) -> TitleDescriptor {
		TitleDescriptor {
			title: 1,
			title_set,
			vts_title: 1,
			chapters,
			angles,
			aspect: ASPECT_169,
			audio_tracks: 0,
			audio_channels: 0,
			subpictures: 0,
		}
	}

	/// # Quick Attributes.
	const fn attrs(subpictures: u8, audio_streams: u8, max_channels: u8, aspect: u8) -> SetAttrs {
		SetAttrs { subpictures, audio_streams, max_channels, aspect }
	}

	#[test]
	fn t_guess_obvious() {
		// Set two is bigger, longer, and louder than everything else.
		let titles = [
			title(1, 2, 1),
			title(2, 24, 1),
			title(3, 1, 1),
		];
		let att = [
			attrs(0, 1, 2, ASPECT_169),
			attrs(4, 5, 6, ASPECT_169),
			attrs(0, 1, 2, ASPECT_169),
		];
		let sizes = [50_000_000, 4_000_000_000, 20_000_000];

		assert_eq!(guess_from_parts(&titles, &att, &sizes, ASPECT_169), 2);
	}

	#[test]
	fn t_guess_deterministic() {
		let titles = [
			title(1, 12, 1),
			title(2, 12, 1),
		];
		let att = [
			attrs(2, 2, 2, ASPECT_169),
			attrs(2, 2, 2, ASPECT_169),
		];
		let sizes = [3_000_000_000, 3_000_000_000];

		let a = guess_from_parts(&titles, &att, &sizes, ASPECT_169);
		let b = guess_from_parts(&titles, &att, &sizes, ASPECT_169);
		assert_eq!(a, b, "Equal inventories must produce equal selections.");
	}

	#[test]
	fn t_guess_dual_aspect() {
		// The same film twice: nearly equal sizes, equal chapters,
		// different aspect codes. The preference decides.
		let titles = [
			title(1, 18, 1),
			title(2, 18, 1),
		];
		let att = [
			attrs(3, 3, 6, ASPECT_169),
			attrs(3, 3, 6, ASPECT_43),
		];
		let sizes = [4_000_000_000, 3_600_000_000];

		assert_eq!(
			guess_from_parts(&titles, &att, &sizes, ASPECT_169), 1,
			"Widescreen preferred, widescreen chosen."
		);
		assert_eq!(
			guess_from_parts(&titles, &att, &sizes, ASPECT_43), 2,
			"Fullscreen preferred, fullscreen chosen."
		);
	}

	#[test]
	fn t_guess_multi_episode() {
		// Two near-equal sets with the same aspect: episodes. The one
		// with the longest chapter list (and the streams to match) wins,
		// even though it is the smaller of the two.
		let titles = [
			title(1, 6, 1),
			title(2, 12, 1),
		];
		let att = [
			attrs(2, 2, 2, ASPECT_169),
			attrs(3, 3, 6, ASPECT_169),
		];
		let sizes = [4_000_000_000, 3_700_000_000];

		assert_eq!(guess_from_parts(&titles, &att, &sizes, ASPECT_169), 2);
	}

	#[test]
	fn t_guess_best_effort() {
		// Contradictory evidence still elects the biggest set.
		let titles = [
			title(1, 2, 1),
			title(2, 30, 1),
		];
		let att = [
			attrs(0, 0, 0, ASPECT_169),
			attrs(5, 5, 6, ASPECT_43),
		];
		let sizes = [4_000_000_000, 1_000_000_000];

		assert_eq!(
			guess_from_parts(&titles, &att, &sizes, ASPECT_169), 1,
			"The fall-through branch returns the largest set."
		);
	}

	#[test]
	fn t_rankings() {
		let titles = [
			title(1, 4, 1),
			title(2, 9, 3),
			title(3, 9, 2),
		];
		let chapters = rank(titles.iter().map(|t| (u64::from(t.chapters), t.title_set)));
		assert_eq!(chapters, vec![(9, 2), (9, 3), (4, 1)], "Ties break by set number.");

		let angles = angle_ranking(&titles);
		assert_eq!(angles, vec![(3, 2), (2, 3), (1, 1)]);
	}

	#[test]
	fn t_sizes_comparable() {
		let close = rank([(4_000_000_000_u64, 1), (3_600_000_000, 2)].into_iter());
		assert!(sizes_comparable(&close, 1), "A ~1.1x ratio is comparable.");

		let far = rank([(4_000_000_000_u64, 1), (1_000_000_000, 2)].into_iter());
		assert!(! sizes_comparable(&far, 1), "A 4x ratio is not.");

		let zero = rank([(4_000_000_000_u64, 1), (0, 2)].into_iter());
		assert!(! zero.is_empty() && ! sizes_comparable(&zero, 1), "Zero sizes never compare.");
	}
}
