//! Card table state
//!
//! [`CardTable`] owns the game, the computer player and the animation queue,
//! and mirrors all 52 cards into the persistent sprite registry. New moves
//! are only accepted while the queue is idle, so the table never runs ahead
//! of what the player has seen. Sprites are rewritten only when their
//! placement changes.

use crate::ai::AiPlayer;
use crate::animation::{AnimationQueue, AnimationStep};
use crate::cards::Card;
use crate::config::GameConfig;
use crate::game::{DrawSource, GameError, GamePhase, GinRummy, HandResult, Seat, HAND_SIZE};
use hearth_engine::config::WindowConfig;
use hearth_engine::ecs::Component;
use hearth_engine::foundation::math::Vec2;
use hearth_engine::input::{Action, InputSnapshot, KeyCode};
use hearth_engine::render::{SceneAssembly, SceneError, Sprite, SpriteSceneId, TextureHandle};
use std::collections::HashMap;

const ATLAS_COLUMNS: usize = 13;
const ATLAS_ROWS: usize = 5;
const CARD_BACK: usize = 52;

const MOVING_DEPTH: f32 = 0.05;
const HAND_DEPTH: f32 = 0.5;
const PILE_DEPTH: f32 = 0.9;
const DEPTH_STEP: f32 = 0.001;
const STACK_STEP: f32 = 0.25;

/// Seconds a finished hand stays on the table
const RESULT_PAUSE: f32 = 2.0;

/// Texture rectangle of a cell in the card atlas
pub fn atlas_uv(index: usize) -> [f32; 4] {
    let column = (index % ATLAS_COLUMNS) as f32;
    let row = (index / ATLAS_COLUMNS) as f32;
    let (w, h) = (1.0 / ATLAS_COLUMNS as f32, 1.0 / ATLAS_ROWS as f32);
    [column * w, row * h, (column + 1.0) * w, (row + 1.0) * h]
}

/// Where and how a card is drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardPlacement {
    /// Center in pixels
    pub position: Vec2,
    /// Sprite depth, larger is farther
    pub depth: f32,
    /// Face or back showing
    pub face_up: bool,
    /// Horizontal squash while flipping
    pub width_scale: f32,
}

impl CardPlacement {
    fn new(position: Vec2, depth: f32, face_up: bool) -> Self {
        Self {
            position,
            depth,
            face_up,
            width_scale: 1.0,
        }
    }
}

/// Pixel positions of the piles and hand slots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableLayout {
    /// Surface width
    pub width: f32,
    /// Surface height
    pub height: f32,
    /// Size of one card
    pub card_size: Vec2,
}

impl TableLayout {
    /// Layout for a `width` x `height` surface
    pub fn new(width: f32, height: f32) -> Self {
        let card_height = height * 0.2;
        Self {
            width,
            height,
            card_size: Vec2::new(card_height * 0.7, card_height),
        }
    }

    /// Layout matching the window
    pub fn from_window(window: &WindowConfig) -> Self {
        Self::new(window.width as f32, window.height as f32)
    }

    /// Center of the stock
    pub fn stock_position(&self) -> Vec2 {
        Vec2::new(self.width * 0.42, self.height * 0.5)
    }

    /// Center of the discard pile
    pub fn discard_position(&self) -> Vec2 {
        Vec2::new(self.width * 0.58, self.height * 0.5)
    }

    /// Center of the pile a card is drawn from
    pub fn pile_position(&self, source: DrawSource) -> Vec2 {
        match source {
            DrawSource::Stock => self.stock_position(),
            DrawSource::Discard => self.discard_position(),
        }
    }

    /// Slot `index` of a hand holding `count` cards, centered horizontally
    pub fn hand_slot(&self, seat: Seat, index: usize, count: usize) -> Vec2 {
        let y = match seat {
            Seat::South => self.height * 0.82,
            Seat::North => self.height * 0.18,
        };
        let spacing = (self.card_size.x * 0.8).min(self.width * 0.9 / count.max(1) as f32);
        let offset = index as f32 - count.saturating_sub(1) as f32 / 2.0;
        Vec2::new(self.width / 2.0 + offset * spacing, y)
    }

    /// Current slot of `card` in the sorted hand of `seat`
    pub fn slot_of(&self, game: &GinRummy, seat: Seat, card: Card) -> Option<Vec2> {
        let hand = game.hand(seat).sorted();
        hand.iter()
            .position(|held| *held == card)
            .map(|index| self.hand_slot(seat, index, hand.len()))
    }
}

/// The gin rummy table resource
pub struct CardTable {
    game: GinRummy,
    ai: AiPlayer,
    animations: AnimationQueue,
    layout: TableLayout,
    texture: TextureHandle,
    sprites: HashMap<Card, (SpriteSceneId, Sprite)>,
    selected: usize,
    autoplay: bool,
    ai_delay: f32,
    card_move: f32,
    seed: u64,
}

impl Component for CardTable {}

impl CardTable {
    /// Table for `game`, drawing cards from the `texture` atlas
    pub fn new(game: GinRummy, layout: TableLayout, texture: TextureHandle, config: &GameConfig) -> Self {
        Self {
            game,
            ai: AiPlayer::new(),
            animations: AnimationQueue::new(),
            layout,
            texture,
            sprites: HashMap::new(),
            selected: 0,
            autoplay: config.autoplay,
            ai_delay: config.ai_delay_seconds,
            card_move: config.card_move_seconds,
            seed: config.seed,
        }
    }

    /// The game being played
    pub fn game(&self) -> &GinRummy {
        &self.game
    }

    /// Pending animations
    pub fn animations(&self) -> &AnimationQueue {
        &self.animations
    }

    /// Table layout
    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    /// Index of the selected card in the sorted south hand
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Whether the computer plays both seats
    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    /// Number of cards mirrored into the sprite registry
    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    /// Last sprite written for `card`
    pub fn card_sprite(&self, card: Card) -> Option<Sprite> {
        self.sprites.get(&card).map(|(_, sprite)| *sprite)
    }

    /// Advance animations and play; returns whether the table must be redrawn
    ///
    /// Human moves the rules reject are logged and ignored. Errors are only
    /// returned for moves the table itself makes.
    pub fn update(&mut self, dt: f32, input: &InputSnapshot) -> Result<bool, GameError> {
        let update = self.animations.update(dt);
        let mut redraw = update.needs_redraw;

        if let Some(AnimationStep::AiDelay { .. }) = update.completed {
            self.play_ai_turn()?;
            redraw = true;
        }
        if self.animations.is_idle() {
            redraw |= self.advance(input)?;
        }
        Ok(redraw)
    }

    fn computer_turn(&self) -> bool {
        self.autoplay || self.game.turn() == Seat::North
    }

    fn advance(&mut self, input: &InputSnapshot) -> Result<bool, GameError> {
        match self.game.phase() {
            GamePhase::Deal => {
                self.game.deal()?;
                self.selected = 0;
                Ok(true)
            }
            GamePhase::Draw if self.computer_turn() => {
                self.animations.push(AnimationStep::AiDelay {
                    remaining: self.ai_delay,
                });
                Ok(true)
            }
            GamePhase::Draw => Ok(self.human_draw(input)),
            GamePhase::Discard => Ok(self.human_discard(input)),
            GamePhase::Layoff => {
                let result = self.game.finish_layoff()?;
                self.show_result(&result);
                Ok(true)
            }
            GamePhase::Scored => {
                if self.autoplay || input.pressed_once(Action::Select) {
                    self.game.deal()?;
                    self.selected = 0;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            GamePhase::GameOver => {
                if !self.autoplay && input.pressed_once(Action::Select) {
                    self.seed = self.seed.wrapping_add(1);
                    self.game = GinRummy::new(self.game.rules(), self.seed);
                    log::info!("new game");
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn show_result(&mut self, result: &HandResult) {
        log::info!(
            "{:?} for {:?}, south {} north {}",
            result.outcome,
            result.winner,
            self.game.score(Seat::South),
            self.game.score(Seat::North)
        );
        self.animations.push(AnimationStep::Pause {
            remaining: RESULT_PAUSE,
        });
    }

    fn play_ai_turn(&mut self) -> Result<(), GameError> {
        if self.game.phase() != GamePhase::Draw {
            return Ok(());
        }
        let seat = self.game.turn();
        let before = self.game.hand(seat).sorted();
        let turn = self.ai.take_turn(&mut self.game, seat)?;

        let pile = self.layout.pile_position(turn.source);
        let discarded = turn.action.card();
        if discarded != turn.drawn {
            self.slide_into_hand(seat, turn.drawn, pile);
        }

        let from = before
            .iter()
            .position(|held| *held == discarded)
            .map_or(pile, |index| self.layout.hand_slot(seat, index, before.len()));
        self.animations.push(AnimationStep::move_card(
            discarded,
            from,
            self.layout.discard_position(),
            self.card_move,
        ));
        if seat == Seat::North {
            self.animations.push(AnimationStep::flip_card(discarded, true, self.card_move));
        }

        if let Some(result) = turn.result {
            self.show_result(&result);
        }
        Ok(())
    }

    fn slide_into_hand(&mut self, seat: Seat, card: Card, from: Vec2) {
        if let Some(to) = self.layout.slot_of(&self.game, seat, card) {
            self.animations.push(AnimationStep::move_card(card, from, to, self.card_move));
        }
    }

    fn move_selection(&mut self, input: &InputSnapshot) -> bool {
        let count = self.game.hand(Seat::South).len();
        if count == 0 {
            return false;
        }
        let before = self.selected;
        if input.pressed_once(Action::MoveLeft) {
            self.selected = self.selected.saturating_sub(1);
        }
        if input.pressed_once(Action::MoveRight) {
            self.selected = (self.selected + 1).min(count - 1);
        }
        self.selected != before
    }

    // Enter draws from the stock, space takes the discard
    fn human_draw(&mut self, input: &InputSnapshot) -> bool {
        let moved = self.move_selection(input);
        let source = if input.pressed_once(Action::Select) {
            DrawSource::Stock
        } else if input.pressed_once(Action::Jump) {
            DrawSource::Discard
        } else {
            return moved;
        };

        match self.game.draw(Seat::South, source) {
            Ok(card) => {
                self.slide_into_hand(Seat::South, card, self.layout.pile_position(source));
                true
            }
            Err(error) => {
                log::warn!("{error}");
                moved
            }
        }
    }

    // Enter discards the selected card, K knocks with it
    fn human_discard(&mut self, input: &InputSnapshot) -> bool {
        let moved = self.move_selection(input);
        let knock = input.key_pressed_once(KeyCode::K);
        if !knock && !input.pressed_once(Action::Select) {
            return moved;
        }

        let hand = self.game.hand(Seat::South).sorted();
        let Some(&card) = hand.get(self.selected) else {
            return moved;
        };
        let from = self.layout.hand_slot(Seat::South, self.selected, hand.len());

        let played = if knock {
            self.game.knock(Seat::South, card).map(|_| None)
        } else {
            self.game.discard(Seat::South, card)
        };
        match played {
            Ok(result) => {
                self.animations.push(AnimationStep::move_card(
                    card,
                    from,
                    self.layout.discard_position(),
                    self.card_move,
                ));
                if let Some(result) = result {
                    self.show_result(&result);
                }
                self.selected = self.selected.min(HAND_SIZE - 1);
                true
            }
            Err(error) => {
                log::warn!("{error}");
                moved
            }
        }
    }

    /// Placement of every card from the game state and the queued animations
    pub fn placements(&self) -> HashMap<Card, CardPlacement> {
        let mut placements = HashMap::with_capacity(CARD_BACK);

        for (index, card) in self.game.stock().cards().iter().enumerate() {
            let position = self.layout.stock_position() - Vec2::new(0.0, index as f32 * STACK_STEP);
            placements.insert(*card, CardPlacement::new(position, PILE_DEPTH - index as f32 * DEPTH_STEP, false));
        }
        for (index, card) in self.game.discard_pile().iter().enumerate() {
            let position = self.layout.discard_position() - Vec2::new(0.0, index as f32 * STACK_STEP);
            placements.insert(*card, CardPlacement::new(position, PILE_DEPTH - index as f32 * DEPTH_STEP, true));
        }

        let revealed = matches!(self.game.phase(), GamePhase::Scored | GamePhase::GameOver);
        for seat in Seat::BOTH {
            let hand = self.game.hand(seat).sorted();
            let face_up = seat == Seat::South || revealed;
            for (index, card) in hand.iter().enumerate() {
                let mut position = self.layout.hand_slot(seat, index, hand.len());
                if seat == Seat::South && !self.autoplay && index == self.selected {
                    position.y -= self.layout.card_size.y * 0.12;
                }
                placements.insert(*card, CardPlacement::new(position, HAND_DEPTH - index as f32 * DEPTH_STEP, face_up));
            }
        }

        // Waiting steps hold their card at the starting pose
        for (index, step) in self.animations.iter().enumerate() {
            let playing = index == 0;
            match step {
                AnimationStep::MoveCard { card, from, .. } => {
                    if let Some(placement) = placements.get_mut(card) {
                        placement.position = if playing { step.position().unwrap_or(*from) } else { *from };
                        placement.depth = MOVING_DEPTH;
                    }
                }
                AnimationStep::FlipCard { card, face_up, .. } => {
                    if let Some(placement) = placements.get_mut(card) {
                        if playing {
                            placement.face_up = step.showing_face().unwrap_or(*face_up);
                            placement.width_scale = step.flip_scale().unwrap_or(1.0).max(0.02);
                        } else {
                            placement.face_up = !*face_up;
                        }
                    }
                }
                AnimationStep::AiDelay { .. } | AnimationStep::Pause { .. } => {}
            }
        }
        placements
    }

    fn sprite(&self, card: Card, placement: &CardPlacement) -> Sprite {
        let cell = if placement.face_up { card.atlas_index() } else { CARD_BACK };
        let size = Vec2::new(self.layout.card_size.x * placement.width_scale, self.layout.card_size.y);
        Sprite::new(self.texture, placement.position, size)
            .with_depth(placement.depth)
            .with_uv_rect(atlas_uv(cell))
    }

    /// Write changed card sprites to the registry; returns how many changed
    ///
    /// Cards without a sprite yet are added, so the first call populates the
    /// registry.
    pub fn sync_sprites(&mut self, scene: &SceneAssembly) -> Result<usize, SceneError> {
        let mut changed = 0;
        for (card, placement) in self.placements() {
            let sprite = self.sprite(card, &placement);
            match self.sprites.get_mut(&card) {
                Some((_, current)) if *current == sprite => {}
                Some((id, current)) => {
                    scene.update_sprite_in_scene(*id, sprite)?;
                    *current = sprite;
                    changed += 1;
                }
                None => {
                    let id = scene.add_sprite_to_scene(sprite)?;
                    self.sprites.insert(card, (id, sprite));
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}
