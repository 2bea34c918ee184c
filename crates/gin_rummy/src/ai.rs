//! Computer opponent
//!
//! Greedy play: take the face-up card only when it lowers deadwood, discard
//! whatever leaves the least deadwood, and knock as soon as the rules allow.

use crate::cards::Card;
use crate::game::{DrawSource, GameError, GinRummy, HandResult, Rules, Seat};
use crate::hand::Hand;

/// What the player does after drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiAction {
    /// Discard and pass the turn
    Discard(Card),
    /// Discard and knock (gin when no deadwood is left)
    Knock(Card),
}

impl AiAction {
    /// The card going onto the discard pile
    pub fn card(self) -> Card {
        match self {
            AiAction::Discard(card) | AiAction::Knock(card) => card,
        }
    }
}

/// Everything that happened during one computer turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiTurn {
    /// Pile the card came from
    pub source: DrawSource,
    /// Card drawn
    pub drawn: Card,
    /// Discard or knock
    pub action: AiAction,
    /// Set when the discard ended the hand (void stock)
    pub result: Option<HandResult>,
}

/// Greedy gin rummy player
#[derive(Debug, Clone, Copy, Default)]
pub struct AiPlayer;

impl AiPlayer {
    /// Create the player
    pub fn new() -> Self {
        Self
    }

    /// Pick the pile to draw from for a ten-card hand
    pub fn choose_draw(&self, hand: &Hand, top_discard: Option<Card>) -> DrawSource {
        let Some(top) = top_discard else {
            return DrawSource::Stock;
        };

        let current = hand.deadwood();
        let mut with_top = hand.clone();
        with_top.add(top);
        match with_top.best_discard(Some(top)) {
            Some((_, deadwood)) if deadwood < current => DrawSource::Discard,
            _ => DrawSource::Stock,
        }
    }

    /// Pick the discard for an eleven-card hand, knocking when allowed
    pub fn choose_action(&self, hand: &Hand, forbidden: Option<Card>, rules: Rules) -> Option<AiAction> {
        let (card, deadwood) = hand.best_discard(forbidden)?;
        Some(if deadwood <= rules.knock_limit {
            AiAction::Knock(card)
        } else {
            AiAction::Discard(card)
        })
    }

    /// Play a whole turn for `seat`
    ///
    /// After a knock the game is left in the layoff phase for the caller to
    /// resolve.
    pub fn take_turn(&self, game: &mut GinRummy, seat: Seat) -> Result<AiTurn, GameError> {
        let source = self.choose_draw(game.hand(seat), game.top_discard());
        let drawn = game.draw(seat, source)?;

        let action = self
            .choose_action(game.hand(seat), game.taken_from_discard(), game.rules())
            .ok_or(GameError::CardNotInHand(drawn))?;
        let result = match action {
            AiAction::Knock(card) => {
                game.knock(seat, card)?;
                None
            }
            AiAction::Discard(card) => game.discard(seat, card)?,
        };

        log::debug!("{seat:?} turn: {source:?} {drawn}, {action:?}");
        Ok(AiTurn {
            source,
            drawn,
            action,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GamePhase;

    fn hand(text: &str) -> Hand {
        Hand::from_cards(text.split_whitespace().map(|card| card.parse::<Card>().unwrap()))
    }

    fn card(text: &str) -> Card {
        text.parse().unwrap()
    }

    #[test]
    fn test_takes_useful_discard() {
        let ai = AiPlayer::new();
        let h = hand("AS 2S 4H 4D 7H 8H 9C TC JD KD");
        assert_eq!(ai.choose_draw(&h, Some(card("3S"))), DrawSource::Discard);
        assert_eq!(ai.choose_draw(&h, Some(card("QC"))), DrawSource::Stock);
        assert_eq!(ai.choose_draw(&h, None), DrawSource::Stock);
    }

    #[test]
    fn test_knocks_when_allowed() {
        let ai = AiPlayer::new();
        let rules = Rules::default();

        let ready = hand("AS 2S 3S 4H 4D 4C 7H 8H 9H KD 2C");
        assert_eq!(ai.choose_action(&ready, None, rules), Some(AiAction::Knock(card("KD"))));

        let not_ready = hand("AS 2S 3S 4H 4D 7C 7H 9H KD QC 2C");
        assert!(matches!(ai.choose_action(&not_ready, None, rules), Some(AiAction::Discard(_))));
    }

    #[test]
    fn test_full_turns_follow_the_rules() {
        let mut game = GinRummy::new(Rules::default(), 5);
        game.deal().unwrap();
        let ai = AiPlayer::new();

        for _ in 0..200 {
            match game.phase() {
                GamePhase::Draw => {
                    let seat = game.turn();
                    let turn = ai.take_turn(&mut game, seat).unwrap();
                    assert_eq!(game.top_discard(), Some(turn.action.card()));
                    assert_eq!(game.hand(seat).len(), 10);
                }
                GamePhase::Layoff => {
                    game.finish_layoff().unwrap();
                }
                GamePhase::Scored => game.deal().unwrap(),
                GamePhase::GameOver => break,
                phase => panic!("unexpected phase {phase:?}"),
            }
        }

        assert!(game.hands_played() > 0);
    }
}
