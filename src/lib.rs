pub mod ai;
pub mod config;
pub mod data;
pub mod game;
pub mod logging;
pub mod skills;

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use log::LevelFilter;
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{AiAction, AiActionKind, AiAgent, AiConfig, AiDecision, AiDifficulty, AiStep, AiTurn};
pub use config::{ConfigError, GameConfig};
pub use data::{GeneralDefinition, GeneralTable, PlayerSetup, SkillDefinition, SkillTiming, SkillType};
pub use game::{
    Card, CardCategory, CardId, CardName, Controller, DeckCensus, EventKind, Faction, GameContext,
    GameEvent, GameState, IntegrityError, PlayDecision, PlayerId, PlayerState, RuleError,
    StepOutcome, Suit, TurnPhase,
};
pub use skills::{SkillError, SkillInput};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    // A host page that installs its own logger keeps it.
    let _ = logging::init(LevelFilter::Info);
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

#[derive(Serialize)]
struct Resolution<'a> {
    events: Vec<GameEvent>,
    state: &'a GameState,
}

fn resolution_json(ctx: &GameContext, events: Vec<GameEvent>) -> Result<String, JsValue> {
    let resolution = Resolution {
        events,
        state: &ctx.state,
    };
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

#[wasm_bindgen]
pub struct GameSession {
    ctx: Rc<RefCell<GameContext>>,
}

#[wasm_bindgen]
impl GameSession {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GameSession, JsValue> {
        let config = match config_json {
            Some(json) => GameConfig::from_json(&json).map_err(serde_to_js_error)?,
            None => GameConfig::default(),
        };
        Ok(GameSession {
            ctx: Rc::new(RefCell::new(GameContext::new(config))),
        })
    }

    /// Replaces the built-in roster. Only allowed before the game starts.
    pub fn load_generals_json(&mut self, json: &str) -> Result<(), JsValue> {
        let table = GeneralTable::from_json(json).map_err(serde_to_js_error)?;
        let mut ctx = self.ctx.borrow_mut();
        if ctx.state.started {
            return Err(to_js_error(RuleError::GameAlreadyStarted));
        }
        let errors = skills::validate_skill_table(table.skills());
        if let Some(first) = errors.first() {
            return Err(serde_to_js_error(first));
        }
        ctx.generals = table;
        Ok(())
    }

    pub fn start_game_json(&mut self, setups_json: &str) -> Result<String, JsValue> {
        let setups: Vec<PlayerSetup> =
            serde_json::from_str(setups_json).map_err(serde_to_js_error)?;
        let mut ctx = self.ctx.borrow_mut();
        let events = ctx.start_game(&setups).map_err(to_js_error)?;
        resolution_json(&ctx, events)
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.ctx.borrow().state).map_err(serde_to_js_error)
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_value(&self.ctx.borrow().state).map_err(JsValue::from)
    }

    pub fn current_player(&self) -> Option<u8> {
        self.ctx.borrow().current_player()
    }

    pub fn step(&mut self) -> Result<String, JsValue> {
        let outcome = self.ctx.borrow_mut().step().map_err(to_js_error)?;
        serde_json::to_string(&outcome).map_err(serde_to_js_error)
    }

    pub fn run_until_input(&mut self) -> Result<String, JsValue> {
        let outcome = self.ctx.borrow_mut().run_until_input().map_err(to_js_error)?;
        serde_json::to_string(&outcome).map_err(serde_to_js_error)
    }

    pub fn play_json(&mut self, player_id: u8, decision_json: &str) -> Result<String, JsValue> {
        let decision: PlayDecision =
            serde_json::from_str(decision_json).map_err(serde_to_js_error)?;
        let mut ctx = self.ctx.borrow_mut();
        let events = ctx.play(player_id, decision).map_err(to_js_error)?;
        resolution_json(&ctx, events)
    }

    pub fn trigger_skill_json(
        &mut self,
        player_id: u8,
        skill_id: &str,
        input_json: Option<String>,
    ) -> Result<String, JsValue> {
        let input = match input_json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error)?,
            None => SkillInput::None,
        };
        let mut ctx = self.ctx.borrow_mut();
        let events = ctx
            .trigger_skill(player_id, skill_id, input)
            .map_err(to_js_error)?;
        resolution_json(&ctx, events)
    }

    pub fn end_play_phase(&mut self, player_id: u8) -> Result<(), JsValue> {
        self.ctx
            .borrow_mut()
            .end_play_phase(player_id)
            .map_err(to_js_error)
    }

    pub fn validate(&self) -> Result<(), JsValue> {
        self.ctx
            .borrow()
            .check_integrity()
            .map_err(|error| to_js_error(RuleError::from(error)))
    }

    /// Advances the game until a human must act, pacing AI Play phases with
    /// browser timers. Resolves to the final `StepOutcome` JSON.
    pub fn run_ai_turns(&self) -> Promise {
        let ctx = Rc::clone(&self.ctx);
        future_to_promise(async move {
            loop {
                let outcome = ctx.borrow_mut().step_deferring_ai().map_err(to_js_error)?;
                match outcome {
                    StepOutcome::AwaitingAi { player } => {
                        let mut turn = AiTurn::new(player);
                        loop {
                            let step = turn.step(&mut ctx.borrow_mut());
                            if step.is_finished() {
                                break;
                            }
                            let pause = step.pause().as_millis() as u32;
                            if pause > 0 {
                                TimeoutFuture::new(pause).await;
                            }
                        }
                    }
                    StepOutcome::Advanced { .. } => {}
                    StepOutcome::AwaitingInput { .. } | StepOutcome::GameOver { .. } => {
                        let json = serde_json::to_string(&outcome).map_err(serde_to_js_error)?;
                        return Ok(JsValue::from_str(&json));
                    }
                }
            }
        })
    }
}

/// 校验一份武将表 JSON 中的技能是否都能构造，返回错误列表。
#[wasm_bindgen(js_name = "validateGenerals")]
pub fn validate_generals(json: &str) -> Result<JsValue, JsValue> {
    let table = GeneralTable::from_json(json).map_err(serde_to_js_error)?;
    let errors: Vec<String> = skills::validate_skill_table(table.skills())
        .iter()
        .map(ToString::to_string)
        .collect();
    to_value(&errors).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "defaultConfig")]
pub fn default_config() -> Result<String, JsValue> {
    serde_json::to_string(&GameConfig::default()).map_err(serde_to_js_error)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
