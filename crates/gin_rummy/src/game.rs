//! Gin rummy rules
//!
//! [`GinRummy`] is a plain state machine with no engine dependencies:
//!
//! ```text
//! Deal -> Draw -> Discard -> Draw -> ...
//!                    |
//!                    +-- knock / gin --> Layoff --> Scored --> (next hand) Deal
//!                                                      |
//!                                                      +--> GameOver
//! ```
//!
//! A hand is void when the stock runs down to two cards without a knock.

use crate::cards::{Card, Deck};
use crate::hand::{lay_off, Grouping, Hand, Meld};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Cards dealt to each player
pub const HAND_SIZE: usize = 10;

/// Bonus for going gin
pub const GIN_BONUS: u32 = 25;

/// Bonus for undercutting the knocker
pub const UNDERCUT_BONUS: u32 = 25;

/// Stock size at which the hand is void
const DEAD_STOCK: usize = 2;

/// Seat at the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    /// The local player, bottom of the table
    South,
    /// The computer opponent, top of the table
    North,
}

impl Seat {
    /// Both seats
    pub const BOTH: [Seat; 2] = [Seat::South, Seat::North];

    /// The other seat
    pub fn other(self) -> Seat {
        match self {
            Seat::South => Seat::North,
            Seat::North => Seat::South,
        }
    }

    fn index(self) -> usize {
        match self {
            Seat::South => 0,
            Seat::North => 1,
        }
    }
}

/// State of the current hand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Cards not dealt yet
    Deal,
    /// Player to move takes a card from the stock or the discard pile
    Draw,
    /// Player to move discards, knocks or goes gin
    Discard,
    /// A player knocked; the defender lays off
    Layoff,
    /// The hand is over and scored
    Scored,
    /// A player reached the target score
    GameOver,
}

/// Where a card is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSource {
    /// Top of the face-down stock
    Stock,
    /// Top of the face-up discard pile
    Discard,
}

/// How a hand ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Knocker had less deadwood
    Knock,
    /// Knocker had no deadwood
    Gin,
    /// Defender had as little deadwood as the knocker, or less
    Undercut,
    /// Stock ran out
    Void,
}

/// Result of a finished hand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandResult {
    /// How the hand ended
    pub outcome: Outcome,
    /// Seat that scored, `None` for a void hand
    pub winner: Option<Seat>,
    /// Points scored
    pub points: u32,
    /// Knocker's deadwood points
    pub knocker_deadwood: u32,
    /// Defender's deadwood points after laying off
    pub defender_deadwood: u32,
    /// Cards the defender laid off onto the knocker's melds
    pub laid_off: Vec<Card>,
    /// The knocker's melds after laying off
    pub knocker_melds: Vec<Meld>,
}

/// Rule parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    /// Highest deadwood a player may knock with
    pub knock_limit: u32,
    /// Score that ends the game
    pub target_score: u32,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            knock_limit: 10,
            target_score: 100,
        }
    }
}

/// Illegal moves
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// The other seat is to move
    #[error("it is not {0:?}'s turn")]
    NotYourTurn(Seat),

    /// The move is not allowed in the current phase
    #[error("cannot {action} during {phase:?}")]
    WrongPhase {
        /// Attempted move
        action: &'static str,
        /// Current phase
        phase: GamePhase,
    },

    /// The card is not in the player's hand
    #[error("{0} is not in hand")]
    CardNotInHand(Card),

    /// The card was just taken from the discard pile
    #[error("{0} was just taken from the discard pile")]
    CannotDiscardDrawnCard(Card),

    /// Too much deadwood to knock
    #[error("cannot knock with {deadwood} deadwood (limit {limit})")]
    DeadwoodTooHigh {
        /// Deadwood after the discard
        deadwood: u32,
        /// Knock limit
        limit: u32,
    },

    /// Nothing to draw from
    #[error("the {0:?} pile is empty")]
    EmptyPile(DrawSource),
}

/// A game of gin rummy between two seats
#[derive(Debug, Clone)]
pub struct GinRummy {
    rules: Rules,
    rng: ChaCha8Rng,
    stock: Deck,
    discard_pile: Vec<Card>,
    hands: [Hand; 2],
    scores: [u32; 2],
    dealer: Seat,
    turn: Seat,
    phase: GamePhase,
    taken_from_discard: Option<Card>,
    knocker: Option<Seat>,
    hands_played: u32,
    last_result: Option<HandResult>,
}

impl GinRummy {
    /// New game; the first hand is not dealt yet
    pub fn new(rules: Rules, seed: u64) -> Self {
        Self {
            rules,
            rng: ChaCha8Rng::seed_from_u64(seed),
            stock: Deck::new(),
            discard_pile: Vec::new(),
            hands: [Hand::new(), Hand::new()],
            scores: [0, 0],
            dealer: Seat::North,
            turn: Seat::South,
            phase: GamePhase::Deal,
            taken_from_discard: None,
            knocker: None,
            hands_played: 0,
            last_result: None,
        }
    }

    /// Shuffle and deal a hand, turning up the first discard
    pub fn deal(&mut self) -> Result<(), GameError> {
        if !matches!(self.phase, GamePhase::Deal | GamePhase::Scored) {
            return Err(GameError::WrongPhase {
                action: "deal",
                phase: self.phase,
            });
        }
        if self.phase == GamePhase::Scored {
            self.dealer = self.dealer.other();
        }

        self.stock = Deck::shuffled(&mut self.rng);
        self.discard_pile.clear();
        self.hands = [Hand::new(), Hand::new()];
        for _ in 0..HAND_SIZE {
            for seat in [self.dealer.other(), self.dealer] {
                let card = self.stock.draw().ok_or(GameError::EmptyPile(DrawSource::Stock))?;
                self.hands[seat.index()].add(card);
            }
        }
        let upcard = self.stock.draw().ok_or(GameError::EmptyPile(DrawSource::Stock))?;
        self.discard_pile.push(upcard);

        self.turn = self.dealer.other();
        self.phase = GamePhase::Draw;
        self.taken_from_discard = None;
        self.knocker = None;
        log::info!("hand {} dealt by {:?}, upcard {upcard}", self.hands_played + 1, self.dealer);
        Ok(())
    }

    fn expect(&self, seat: Seat, phase: GamePhase, action: &'static str) -> Result<(), GameError> {
        if self.phase != phase {
            return Err(GameError::WrongPhase {
                action,
                phase: self.phase,
            });
        }
        if self.turn != seat {
            return Err(GameError::NotYourTurn(seat));
        }
        Ok(())
    }

    /// Take the top card of the stock or the discard pile
    pub fn draw(&mut self, seat: Seat, source: DrawSource) -> Result<Card, GameError> {
        self.expect(seat, GamePhase::Draw, "draw")?;
        let card = match source {
            DrawSource::Stock => self.stock.draw(),
            DrawSource::Discard => self.discard_pile.pop(),
        }
        .ok_or(GameError::EmptyPile(source))?;

        self.taken_from_discard = (source == DrawSource::Discard).then_some(card);
        self.hands[seat.index()].add(card);
        self.phase = GamePhase::Discard;
        log::debug!("{seat:?} draws {card} from {source:?}");
        Ok(card)
    }

    fn remove_for_discard(&mut self, seat: Seat, card: Card) -> Result<(), GameError> {
        if self.taken_from_discard == Some(card) {
            return Err(GameError::CannotDiscardDrawnCard(card));
        }
        if !self.hands[seat.index()].remove(card) {
            return Err(GameError::CardNotInHand(card));
        }
        self.discard_pile.push(card);
        self.taken_from_discard = None;
        Ok(())
    }

    /// Discard a card and pass the turn
    ///
    /// Returns the void result when the stock is down to its last two cards.
    pub fn discard(&mut self, seat: Seat, card: Card) -> Result<Option<HandResult>, GameError> {
        self.expect(seat, GamePhase::Discard, "discard")?;
        self.remove_for_discard(seat, card)?;
        log::debug!("{seat:?} discards {card}");

        if self.stock.len() <= DEAD_STOCK {
            let result = HandResult {
                outcome: Outcome::Void,
                winner: None,
                points: 0,
                knocker_deadwood: 0,
                defender_deadwood: 0,
                laid_off: Vec::new(),
                knocker_melds: Vec::new(),
            };
            log::info!("hand {} is void, stock exhausted", self.hands_played + 1);
            return Ok(Some(self.finish(result)));
        }

        self.turn = seat.other();
        self.phase = GamePhase::Draw;
        Ok(None)
    }

    /// Discard `card` and knock; gin when no deadwood is left
    pub fn knock(&mut self, seat: Seat, card: Card) -> Result<Outcome, GameError> {
        self.expect(seat, GamePhase::Discard, "knock")?;
        if !self.hands[seat.index()].contains(card) {
            return Err(GameError::CardNotInHand(card));
        }

        let mut rest = self.hands[seat.index()].clone();
        rest.remove(card);
        let deadwood = rest.deadwood();
        if deadwood > self.rules.knock_limit {
            return Err(GameError::DeadwoodTooHigh {
                deadwood,
                limit: self.rules.knock_limit,
            });
        }

        self.remove_for_discard(seat, card)?;
        self.knocker = Some(seat);
        self.phase = GamePhase::Layoff;
        let outcome = if deadwood == 0 { Outcome::Gin } else { Outcome::Knock };
        log::info!("{seat:?} {} with {deadwood} deadwood, discarding {card}", if deadwood == 0 { "goes gin" } else { "knocks" });
        Ok(outcome)
    }

    /// Let the defender lay off and score the hand
    pub fn finish_layoff(&mut self) -> Result<HandResult, GameError> {
        let Some(knocker) = self.knocker.filter(|_| self.phase == GamePhase::Layoff) else {
            return Err(GameError::WrongPhase {
                action: "lay off",
                phase: self.phase,
            });
        };
        let defender = knocker.other();

        let Grouping { mut melds, deadwood } = self.hands[knocker.index()].best_grouping();
        let knocker_deadwood: u32 = deadwood.iter().map(|card| card.points()).sum();
        let mut defender_cards = self.hands[defender.index()].best_grouping().deadwood;

        // No laying off against gin
        let laid_off = if knocker_deadwood == 0 {
            Vec::new()
        } else {
            lay_off(&mut defender_cards, &mut melds)
        };
        let defender_deadwood: u32 = defender_cards.iter().map(|card| card.points()).sum();

        let (outcome, winner, points) = if knocker_deadwood == 0 {
            (Outcome::Gin, knocker, GIN_BONUS + defender_deadwood)
        } else if defender_deadwood <= knocker_deadwood {
            (Outcome::Undercut, defender, UNDERCUT_BONUS + knocker_deadwood - defender_deadwood)
        } else {
            (Outcome::Knock, knocker, defender_deadwood - knocker_deadwood)
        };

        let result = HandResult {
            outcome,
            winner: Some(winner),
            points,
            knocker_deadwood,
            defender_deadwood,
            laid_off,
            knocker_melds: melds,
        };
        Ok(self.finish(result))
    }

    fn finish(&mut self, result: HandResult) -> HandResult {
        if let Some(winner) = result.winner {
            self.scores[winner.index()] += result.points;
            log::info!(
                "{winner:?} wins hand {} by {:?} for {} points (score {}-{})",
                self.hands_played + 1,
                result.outcome,
                result.points,
                self.scores[0],
                self.scores[1]
            );
        }
        self.hands_played += 1;
        self.knocker = None;
        self.phase = if self.winner().is_some() { GamePhase::GameOver } else { GamePhase::Scored };
        self.last_result = Some(result.clone());
        result
    }

    /// Seat that reached the target score
    pub fn winner(&self) -> Option<Seat> {
        Seat::BOTH
            .into_iter()
            .filter(|seat| self.scores[seat.index()] >= self.rules.target_score)
            .max_by_key(|seat| self.scores[seat.index()])
    }

    /// Current phase
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Seat to move
    pub fn turn(&self) -> Seat {
        self.turn
    }

    /// Dealer of the current hand
    pub fn dealer(&self) -> Seat {
        self.dealer
    }

    /// Cards held by a seat
    pub fn hand(&self, seat: Seat) -> &Hand {
        &self.hands[seat.index()]
    }

    /// Score of a seat
    pub fn score(&self, seat: Seat) -> u32 {
        self.scores[seat.index()]
    }

    /// Face-up discard pile, bottom to top
    pub fn discard_pile(&self) -> &[Card] {
        &self.discard_pile
    }

    /// Top of the discard pile
    pub fn top_discard(&self) -> Option<Card> {
        self.discard_pile.last().copied()
    }

    /// Face-down stock
    pub fn stock(&self) -> &Deck {
        &self.stock
    }

    /// Card taken from the discard pile this turn
    pub fn taken_from_discard(&self) -> Option<Card> {
        self.taken_from_discard
    }

    /// Seat that knocked, while the layoff is pending
    pub fn knocker(&self) -> Option<Seat> {
        self.knocker
    }

    /// Result of the most recent hand
    pub fn last_result(&self) -> Option<&HandResult> {
        self.last_result.as_ref()
    }

    /// Hands completed
    pub fn hands_played(&self) -> u32 {
        self.hands_played
    }

    /// Rule parameters
    pub fn rules(&self) -> Rules {
        self.rules
    }

    #[cfg(test)]
    pub(crate) fn rig(&mut self, seat: Seat, hand: Hand, opponent: Hand, discard: Card) {
        self.hands[seat.index()] = hand;
        self.hands[seat.other().index()] = opponent;
        self.discard_pile = vec![discard];
        self.turn = seat;
        self.phase = GamePhase::Draw;
        self.taken_from_discard = None;
    }
}
