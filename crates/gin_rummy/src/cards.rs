//! Playing cards and the deck

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fmt;

/// Card suit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Suit {
    /// Clubs
    Clubs,
    /// Diamonds
    Diamonds,
    /// Hearts
    Hearts,
    /// Spades
    Spades,
}

impl Suit {
    /// Every suit in atlas order
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    /// Row of the suit in the card atlas
    pub fn index(self) -> usize {
        self as usize
    }

    fn symbol(self) -> char {
        match self {
            Suit::Clubs => 'C',
            Suit::Diamonds => 'D',
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
        }
    }
}

/// Card rank, ace low
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rank(u8);

impl Rank {
    /// Ace
    pub const ACE: Rank = Rank(1);
    /// Jack
    pub const JACK: Rank = Rank(11);
    /// Queen
    pub const QUEEN: Rank = Rank(12);
    /// King
    pub const KING: Rank = Rank(13);

    /// Rank from its value, 1 (ace) through 13 (king)
    pub fn new(value: u8) -> Option<Self> {
        (1..=13).contains(&value).then_some(Self(value))
    }

    /// Every rank from ace to king
    pub fn all() -> impl Iterator<Item = Rank> {
        (1..=13).map(Rank)
    }

    /// Numeric value, 1 through 13
    pub fn value(self) -> u8 {
        self.0
    }

    /// Deadwood points: ace 1, number cards face value, faces 10
    pub fn points(self) -> u32 {
        u32::from(self.0.min(10))
    }

    /// Next rank up, `None` after the king
    pub fn succ(self) -> Option<Rank> {
        Rank::new(self.0 + 1)
    }

    /// Next rank down, `None` before the ace
    pub fn pred(self) -> Option<Rank> {
        self.0.checked_sub(1).and_then(Rank::new)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1 => f.write_str("A"),
            10 => f.write_str("T"),
            11 => f.write_str("J"),
            12 => f.write_str("Q"),
            13 => f.write_str("K"),
            n => write!(f, "{n}"),
        }
    }
}

/// A playing card
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Card {
    /// Suit, compared first so sorted hands group by suit
    pub suit: Suit,
    /// Rank
    pub rank: Rank,
}

impl Card {
    /// Create a card
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { suit, rank }
    }

    /// Deadwood points of the card
    pub fn points(self) -> u32 {
        self.rank.points()
    }

    /// Cell of the card in a 13x5 atlas (four suits, then the back row)
    pub fn atlas_index(self) -> usize {
        self.suit.index() * 13 + usize::from(self.rank.value() - 1)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit.symbol())
    }
}

/// Parse shorthand like `"7H"` or `"QS"`; tests and logs use it heavily
impl std::str::FromStr for Card {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut chars = text.chars();
        let (Some(rank), Some(suit), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(format!("bad card '{text}'"));
        };
        let rank = match rank {
            'A' => Rank::ACE,
            'T' => Rank(10),
            'J' => Rank::JACK,
            'Q' => Rank::QUEEN,
            'K' => Rank::KING,
            digit => digit
                .to_digit(10)
                .and_then(|d| u8::try_from(d).ok())
                .filter(|d| (2..=9).contains(d))
                .map(Rank)
                .ok_or_else(|| format!("bad rank in '{text}'"))?,
        };
        let suit = match suit {
            'C' => Suit::Clubs,
            'D' => Suit::Diamonds,
            'H' => Suit::Hearts,
            'S' => Suit::Spades,
            _ => return Err(format!("bad suit in '{text}'")),
        };
        Ok(Card::new(rank, suit))
    }
}

/// The stock of undealt cards
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Ordered 52-card deck
    pub fn new() -> Self {
        let cards = Suit::ALL
            .iter()
            .flat_map(|&suit| Rank::all().map(move |rank| Card::new(rank, suit)))
            .collect();
        Self { cards }
    }

    /// Deck shuffled with the given generator
    pub fn shuffled(rng: &mut ChaCha8Rng) -> Self {
        let mut deck = Self::new();
        deck.cards.shuffle(rng);
        deck
    }

    /// Deck shuffled deterministically from a seed
    pub fn with_seed(seed: u64) -> Self {
        Self::shuffled(&mut ChaCha8Rng::seed_from_u64(seed))
    }

    /// Take the top card
    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Cards left
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the stock is exhausted
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Cards from bottom to top
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_deck_has_every_card_once() {
        let deck = Deck::with_seed(7);
        let unique: HashSet<Card> = deck.cards().iter().copied().collect();
        assert_eq!(deck.len(), 52);
        assert_eq!(unique.len(), 52);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        assert_eq!(Deck::with_seed(42).cards(), Deck::with_seed(42).cards());
        assert_ne!(Deck::with_seed(42).cards(), Deck::with_seed(43).cards());
    }

    #[test]
    fn test_points() {
        let points: Vec<u32> = ["AS", "7H", "TD", "JC", "KS"]
            .iter()
            .map(|text| text.parse::<Card>().unwrap().points())
            .collect();
        assert_eq!(points, vec![1, 7, 10, 10, 10]);
    }

    #[test]
    fn test_parse_and_display() {
        let card: Card = "QH".parse().unwrap();
        assert_eq!(card, Card::new(Rank::QUEEN, Suit::Hearts));
        assert_eq!(card.to_string(), "QH");
        assert!("1H".parse::<Card>().is_err());
        assert!("QX".parse::<Card>().is_err());
    }

    #[test]
    fn test_rank_neighbours() {
        assert_eq!(Rank::ACE.pred(), None);
        assert_eq!(Rank::KING.succ(), None);
        assert_eq!(Rank::ACE.succ(), Rank::new(2));
    }
}
