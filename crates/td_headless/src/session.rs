//! Interactive play session over JSON lines.
//!
//! A session owns one game, a save store and an advisor. It reads one
//! [`Command`] per line, answers each with [`Response`]s, and writes a
//! save whenever the game asks for a checkpoint.

use std::io::{self, BufRead, Write};

use td_core::error::{CommandError, GameError};
use td_core::events::TickEvents;
use td_core::map::GridPos;
use td_core::persistence::SaveStore;
use td_core::production::CancelSlot;
use td_core::rules::GameRules;
use td_core::side::Side;
use td_core::simulation::SimulationContext;
use td_core::strategy::StrategyProvider;
use tracing::{debug, info, warn};

use crate::clock::FrameClock;
use crate::protocol::{Command, Response, StateReport};

/// One game driven by a controller.
#[derive(Debug)]
pub struct Session<S: SaveStore, P: StrategyProvider> {
    ctx: SimulationContext,
    store: S,
    advisor: P,
    clock: FrameClock,
    finished: bool,
}

impl<S: SaveStore, P: StrategyProvider> Session<S, P> {
    /// Open a session, resuming the stored save if there is one.
    ///
    /// An unreadable save is logged and ignored.
    pub fn open(rules: GameRules, seed: u64, store: S, advisor: P) -> Self {
        let mut ctx = SimulationContext::new(rules, seed);
        match ctx.load_from(&store) {
            Ok(true) => info!(round = ctx.round().round, "Resumed saved game"),
            Ok(false) => info!(seed, "Started new game"),
            Err(e) => warn!(error = %e, "Failed to load save, starting new game"),
        }
        Self::with_context(ctx, store, advisor)
    }

    /// Drive an existing game. The store is not read.
    pub fn with_context(ctx: SimulationContext, store: S, advisor: P) -> Self {
        Self {
            ctx,
            store,
            advisor,
            clock: FrameClock::new(),
            finished: false,
        }
    }

    /// The game being played.
    #[must_use]
    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    /// The save store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether the controller has quit.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Greeting sent before the first command.
    #[must_use]
    pub fn ready(&self) -> Response {
        Response::ready(self.ctx.tick_count(), self.ctx.round().round)
    }

    /// Process one command.
    pub fn handle(&mut self, command: Command) -> Response {
        let name = command.name();
        debug!(cmd = name, "Handling command");
        match command {
            Command::Place { kind, gx, gy, side } => {
                let result = self.ctx.place_structure(side, kind, GridPos::new(gx, gy));
                self.events_or_rejection(name, result)
            }
            Command::Sell { gx, gy, side } => {
                let result = self.ctx.sell_structure(side, GridPos::new(gx, gy));
                self.events_or_rejection(name, result)
            }
            Command::Enqueue { gx, gy, unit } => {
                match self.ctx.enqueue_unit(Side::Player, GridPos::new(gx, gy), unit) {
                    Ok(()) => Response::ok(name),
                    Err(e) => Response::rejected(name, e.to_string()),
                }
            }
            Command::Cancel { gx, gy, slot } => {
                let slot = slot.map_or(CancelSlot::Current, CancelSlot::Queued);
                match self.ctx.cancel_production(Side::Player, GridPos::new(gx, gy), slot) {
                    Ok(_) => Response::ok(name),
                    Err(e) => Response::rejected(name, e.to_string()),
                }
            }
            Command::StartRound => self.start_round(),
            Command::Tick { count, dt_ms } => self.run_ticks(count, dt_ms),
            Command::State => Response::State(Box::new(StateReport::capture(&self.ctx))),
            Command::Save if self.ctx.winner().is_some() => {
                Response::rejected(name, CommandError::GameOver.to_string())
            }
            Command::Save => match self.ctx.persist(&mut self.store) {
                Ok(()) => Response::ok(name),
                Err(e) => Response::error(format!("Save failed: {e}"), Some(name)),
            },
            Command::Reset => {
                let cleared = self.ctx.reset_with(&mut self.store);
                self.clock = FrameClock::new();
                match cleared {
                    Ok(()) => Response::ok(name),
                    Err(e) => Response::error(format!("Failed to clear save: {e}"), Some(name)),
                }
            }
            Command::Quit => {
                self.finished = true;
                Response::Bye
            }
        }
    }

    /// Run the session until `quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        output.write_all(self.ready().to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response = match Command::from_json(line) {
                Ok(command) => self.handle(command),
                Err(e) => {
                    warn!(error = %e, "Unparseable command");
                    Response::error(format!("Invalid command: {e}"), None)
                }
            };
            output.write_all(response.to_json_line().as_bytes())?;
            output.flush()?;
            if self.finished {
                break;
            }
        }
        info!(tick = self.ctx.tick_count(), "Session ended");
        Ok(())
    }

    fn start_round(&mut self) -> Response {
        // The advisory call can take a while; save first so a crash
        // during it loses nothing.
        if self.ctx.winner().is_none() {
            if let Err(e) = self.ctx.persist(&mut self.store) {
                warn!(error = %e, "Failed to save before round start");
            }
        }
        let result = self.ctx.start_round_with(&mut self.advisor);
        self.clock = FrameClock::new();
        self.events_or_rejection("start_round", result)
    }

    fn run_ticks(&mut self, count: u32, dt_ms: Option<u32>) -> Response {
        let mut all = TickEvents::default();
        for _ in 0..count {
            let dt = dt_ms.unwrap_or_else(|| self.clock.delta_ms());
            let events = self.ctx.tick(dt);
            if events.wants_checkpoint() {
                self.checkpoint();
            }
            let over = events.winner().is_some();
            all.events.extend(events.events);
            if over {
                break;
            }
        }
        Response::Events {
            tick: self.ctx.tick_count(),
            events: all.events,
        }
    }

    fn checkpoint(&mut self) {
        match self.ctx.persist(&mut self.store) {
            Ok(()) => debug!(round = self.ctx.round().round, "Checkpoint saved"),
            Err(e) => warn!(error = %e, "Checkpoint failed"),
        }
    }

    fn events_or_rejection(&self, cmd: &str, result: Result<TickEvents, GameError>) -> Response {
        match result {
            Ok(events) => Response::Events {
                tick: self.ctx.tick_count(),
                events: events.events,
            },
            Err(GameError::InvalidState(message)) => Response::error(message, Some(cmd)),
            Err(e) => Response::rejected(cmd, e.to_string()),
        }
    }
}
