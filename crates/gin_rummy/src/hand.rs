//! Hands, melds and deadwood
//!
//! [`Hand::best_grouping`] finds the meld arrangement with the least deadwood
//! by exhaustive search. Hands are at most eleven cards, so the search runs
//! over card subsets with memoization: the lowest unassigned card is either
//! deadwood or belongs to one of the candidate melds that contain it.

use crate::cards::{Card, Rank, Suit};
use std::cmp::Reverse;
use std::collections::HashMap;

/// Kind of meld
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeldKind {
    /// Three or four cards of one rank
    Set,
    /// Three or more consecutive cards of one suit, ace low
    Run,
}

/// A scoring combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meld {
    kind: MeldKind,
    cards: Vec<Card>,
}

impl Meld {
    /// Build a meld, `None` when the cards do not form one
    pub fn new(mut cards: Vec<Card>) -> Option<Self> {
        cards.sort_by_key(|card| (card.rank, card.suit));
        if is_set(&cards) {
            Some(Self { kind: MeldKind::Set, cards })
        } else if is_run(&cards) {
            Some(Self { kind: MeldKind::Run, cards })
        } else {
            None
        }
    }

    /// Set or run
    pub fn kind(&self) -> MeldKind {
        self.kind
    }

    /// Cards in rank order
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Whether `card` can be laid off onto this meld
    pub fn accepts(&self, card: Card) -> bool {
        match self.kind {
            MeldKind::Set => self.cards.len() < 4 && self.cards[0].rank == card.rank,
            MeldKind::Run => {
                let (Some(low), Some(high)) = (self.cards.first(), self.cards.last()) else {
                    return false;
                };
                card.suit == low.suit && (low.rank.pred() == Some(card.rank) || high.rank.succ() == Some(card.rank))
            }
        }
    }

    /// Lay off `card` onto the meld; returns whether it fit
    pub fn extend(&mut self, card: Card) -> bool {
        if !self.accepts(card) {
            return false;
        }
        self.cards.push(card);
        self.cards.sort_by_key(|card| (card.rank, card.suit));
        true
    }
}

fn is_set(cards: &[Card]) -> bool {
    let Some(first) = cards.first() else {
        return false;
    };
    (3..=4).contains(&cards.len())
        && cards.iter().all(|card| card.rank == first.rank)
        && cards.windows(2).all(|pair| pair[0].suit != pair[1].suit)
}

// Expects cards sorted by rank
fn is_run(cards: &[Card]) -> bool {
    let Some(first) = cards.first() else {
        return false;
    };
    cards.len() >= 3
        && cards.iter().all(|card| card.suit == first.suit)
        && cards.windows(2).all(|pair| pair[0].rank.succ() == Some(pair[1].rank))
}

/// Every set and run that can be formed from `cards`, overlapping allowed
pub fn candidate_melds(cards: &[Card]) -> Vec<Meld> {
    let mut melds = Vec::new();

    for rank in Rank::all() {
        let same: Vec<Card> = cards.iter().copied().filter(|card| card.rank == rank).collect();
        if same.len() < 3 {
            continue;
        }
        if same.len() == 4 {
            for skip in 0..4 {
                let subset = same.iter().enumerate().filter(|(i, _)| *i != skip).map(|(_, card)| *card).collect();
                melds.extend(Meld::new(subset));
            }
        }
        melds.extend(Meld::new(same));
    }

    for suit in Suit::ALL {
        let mut suited: Vec<Card> = cards.iter().copied().filter(|card| card.suit == suit).collect();
        suited.sort();
        suited.dedup();

        // Split into maximal consecutive stretches, then take every window of 3+
        let mut start = 0;
        for end in 1..=suited.len() {
            let broken = end == suited.len() || suited[end - 1].rank.succ() != Some(suited[end].rank);
            if !broken {
                continue;
            }
            let stretch = &suited[start..end];
            for low in 0..stretch.len() {
                for high in low + 3..=stretch.len() {
                    melds.extend(Meld::new(stretch[low..high].to_vec()));
                }
            }
            start = end;
        }
    }

    melds
}

/// Melds chosen for a hand and the cards left over
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Grouping {
    /// Melds in the arrangement
    pub melds: Vec<Meld>,
    /// Unmatched cards
    pub deadwood: Vec<Card>,
}

impl Grouping {
    /// Sum of the deadwood card points
    pub fn deadwood_points(&self) -> u32 {
        self.deadwood.iter().map(|card| card.points()).sum()
    }
}

fn full_mask(len: usize) -> u32 {
    u32::try_from((1u64 << len.min(32)) - 1).unwrap_or(u32::MAX)
}

struct Solver<'a> {
    cards: &'a [Card],
    melds: Vec<(u32, Meld)>,
    memo: HashMap<u32, (u32, Option<usize>)>,
}

impl<'a> Solver<'a> {
    fn new(cards: &'a [Card]) -> Self {
        let melds = candidate_melds(cards)
            .into_iter()
            .map(|meld| {
                let mask = meld
                    .cards()
                    .iter()
                    .filter_map(|card| cards.iter().position(|c| c == card))
                    .fold(0u32, |mask, index| mask | (1 << index));
                (mask, meld)
            })
            .collect();
        Self {
            cards,
            melds,
            memo: HashMap::new(),
        }
    }

    fn solve(&mut self, remaining: u32) -> u32 {
        if remaining == 0 {
            return 0;
        }
        if let Some(&(deadwood, _)) = self.memo.get(&remaining) {
            return deadwood;
        }

        let lowest = remaining.trailing_zeros() as usize;
        let bit = 1u32 << lowest;
        let mut best = self.cards[lowest].points() + self.solve(remaining & !bit);
        let mut choice = None;

        for index in 0..self.melds.len() {
            let mask = self.melds[index].0;
            if mask & bit == 0 || mask & remaining != mask {
                continue;
            }
            let deadwood = self.solve(remaining & !mask);
            if deadwood < best {
                best = deadwood;
                choice = Some(index);
            }
        }

        self.memo.insert(remaining, (best, choice));
        best
    }

    fn grouping(mut self) -> Grouping {
        let all = full_mask(self.cards.len());
        self.solve(all);

        let mut grouping = Grouping::default();
        let mut remaining = all;
        while remaining != 0 {
            let lowest = remaining.trailing_zeros() as usize;
            match self.memo.get(&remaining).and_then(|&(_, choice)| choice) {
                Some(index) => {
                    let (mask, meld) = &self.melds[index];
                    grouping.melds.push(meld.clone());
                    remaining &= !mask;
                }
                None => {
                    grouping.deadwood.push(self.cards[lowest]);
                    remaining &= !(1 << lowest);
                }
            }
        }
        grouping
    }
}

/// Cards held by one player
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    /// Empty hand
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand holding the given cards
    pub fn from_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        Self {
            cards: cards.into_iter().collect(),
        }
    }

    /// Take a card into the hand
    pub fn add(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Remove a card; returns whether it was held
    pub fn remove(&mut self, card: Card) -> bool {
        match self.cards.iter().position(|held| *held == card) {
            Some(index) => {
                self.cards.remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether the hand holds `card`
    pub fn contains(&self, card: Card) -> bool {
        self.cards.contains(&card)
    }

    /// Cards in the order they were taken
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Cards sorted by suit then rank, as they are laid out on the table
    pub fn sorted(&self) -> Vec<Card> {
        let mut cards = self.cards.clone();
        cards.sort();
        cards
    }

    /// Number of cards
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the hand is empty
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Meld arrangement with the least deadwood
    pub fn best_grouping(&self) -> Grouping {
        Solver::new(&self.cards).grouping()
    }

    /// Deadwood points under the best grouping
    pub fn deadwood(&self) -> u32 {
        let mut solver = Solver::new(&self.cards);
        solver.solve(full_mask(self.cards.len()))
    }

    /// Discard that leaves the least deadwood, with that deadwood
    ///
    /// `forbidden` is a card that may not be discarded this turn (the one
    /// just taken from the discard pile). Ties go to the higher-point card.
    pub fn best_discard(&self, forbidden: Option<Card>) -> Option<(Card, u32)> {
        self.cards
            .iter()
            .copied()
            .filter(|card| Some(*card) != forbidden)
            .map(|card| {
                let mut rest = self.clone();
                rest.remove(card);
                (card, rest.deadwood())
            })
            .min_by_key(|&(card, deadwood)| (deadwood, Reverse(card.points()), Reverse(card.rank), card.suit))
    }
}

/// Lay off `deadwood` onto `melds` wherever it fits
///
/// Repeats until nothing more fits, since laying off one card can open a run
/// end for the next. Returns the cards that were laid off.
pub fn lay_off(deadwood: &mut Vec<Card>, melds: &mut [Meld]) -> Vec<Card> {
    let mut laid_off = Vec::new();
    loop {
        let mut progressed = false;
        deadwood.retain(|&card| {
            let placed = melds.iter_mut().any(|meld| meld.extend(card));
            if placed {
                laid_off.push(card);
                progressed = true;
            }
            !placed
        });
        if !progressed {
            return laid_off;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(text: &str) -> Vec<Card> {
        text.split_whitespace().map(|card| card.parse().unwrap()).collect()
    }

    fn hand(text: &str) -> Hand {
        Hand::from_cards(cards(text))
    }

    #[test]
    fn test_meld_validation() {
        assert_eq!(Meld::new(cards("4H 4D 4C")).map(|m| m.kind()), Some(MeldKind::Set));
        assert_eq!(Meld::new(cards("3S AS 2S")).map(|m| m.kind()), Some(MeldKind::Run));
        assert!(Meld::new(cards("QS KS AS")).is_none());
        assert!(Meld::new(cards("4H 4H 4C")).is_none());
        assert!(Meld::new(cards("5H 6H")).is_none());
    }

    #[test]
    fn test_classic_hand() {
        let grouping = hand("AS 2S 3S 4H 4D 4C 7H 8H 9H KD").best_grouping();
        assert_eq!(grouping.melds.len(), 3);
        assert_eq!(grouping.deadwood, cards("KD"));
        assert_eq!(grouping.deadwood_points(), 10);
    }

    #[test]
    fn test_overlap_prefers_lower_deadwood() {
        // Run 4-5-6H leaves 6S 6D 9C (21); the set of sixes leaves 4H 5H 9C (18)
        let grouping = hand("4H 5H 6H 6S 6D 9C").best_grouping();
        assert_eq!(grouping.deadwood_points(), 18);
        assert_eq!(grouping.melds[0].kind(), MeldKind::Set);
    }

    #[test]
    fn test_four_of_a_kind_shares_a_card_with_a_run() {
        // 7H goes to the run; 7S 7D 7C still make a set
        let h = hand("7S 7D 7C 7H 8H 9H KC");
        assert_eq!(h.deadwood(), 10);
    }

    #[test]
    fn test_gin_hand() {
        let h = hand("AS 2S 3S 4S 9D 9C 9H JC QC KC");
        assert_eq!(h.deadwood(), 0);
        assert!(h.best_grouping().deadwood.is_empty());
    }

    #[test]
    fn test_best_discard() {
        let h = hand("AS 2S 3S 4H 4D 4C 7H 8H 9H KD 2C");
        assert_eq!(h.best_discard(None), Some(("KD".parse().unwrap(), 2)));
        assert_eq!(h.best_discard(Some("KD".parse().unwrap())), Some(("2C".parse().unwrap(), 10)));
    }

    #[test]
    fn test_lay_off_chains_run_extensions() {
        let mut melds = vec![Meld::new(cards("5H 6H 7H")).unwrap(), Meld::new(cards("KS KD KC")).unwrap()];
        let mut deadwood = cards("9H 8H KH 2C");

        let laid = lay_off(&mut deadwood, &mut melds);

        assert_eq!(laid.len(), 3);
        assert_eq!(deadwood, cards("2C"));
        assert_eq!(melds[0].cards().len(), 5);
        assert_eq!(melds[1].cards().len(), 4);
    }

    #[test]
    fn test_empty_hand() {
        assert_eq!(Hand::new().deadwood(), 0);
        assert_eq!(Hand::new().best_discard(None), None);
    }
}
