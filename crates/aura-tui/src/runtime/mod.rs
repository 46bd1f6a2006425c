//! TUI runtime: owns the terminal, runs the event loop, executes effects.
//!
//! The reducer stays pure and produces effects; every side effect happens
//! here. Async work is spawned on tokio and reports back through the inbox,
//! which the loop drains once per frame.

mod handlers;

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use aura_core::client::AuraClient;
use aura_core::interrupt;
use aura_core::reveal::Renderer;
use aura_core::session::{ChatState, RevealRequest};
use crossterm::event;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::AppState;
use crate::terminal::{self, Tui};
use crate::{render, update};

/// Frame cadence while something is animating (~60fps).
pub const FRAME_DURATION: Duration = Duration::from_millis(16);

/// Poll duration when idle.
pub const IDLE_POLL_DURATION: Duration = Duration::from_millis(100);

/// Full-screen chat runtime.
///
/// The terminal is restored on drop, on panic and on a forced Ctrl+C exit.
pub struct TuiRuntime {
    terminal: Tui,
    pub state: AppState,
    client: AuraClient,
    inbox_tx: mpsc::UnboundedSender<UiEvent>,
    inbox_rx: mpsc::UnboundedReceiver<UiEvent>,
    last_tick: Instant,
    last_terminal_event: Instant,
}

impl TuiRuntime {
    /// Enters the alternate screen and builds the runtime.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be set up.
    pub fn new(client: AuraClient, renderer: Renderer) -> Result<Self> {
        // Panic hook first, so a failure below cannot leave the terminal raw.
        terminal::install_panic_hook();
        interrupt::set_restore_hook(|| {
            let _ = terminal::restore_terminal();
        });
        interrupt::reset();

        let terminal = terminal::setup_terminal().context("Failed to setup terminal")?;
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let now = Instant::now();
        Ok(Self {
            terminal,
            state: AppState::new(ChatState::new(renderer)),
            client,
            inbox_tx,
            inbox_rx,
            last_tick: now,
            last_terminal_event: now,
        })
    }

    /// Selects `path` and starts uploading it.
    pub fn upload_on_start(&mut self, path: PathBuf) {
        self.state.chat.select_file(path);
        if let Some(request) = self.state.chat.begin_upload() {
            self.execute_effect(UiEffect::Backend(request));
        }
    }

    /// Runs the event loop until the user quits.
    ///
    /// # Errors
    /// Returns an error if terminal I/O fails.
    pub fn run(&mut self) -> Result<()> {
        terminal::enable_input_features()?;
        let result = self.event_loop();
        let _ = terminal::disable_input_features();
        result
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut dirty = true;

        while !self.state.should_quit {
            // Raw mode delivers Ctrl+C as a key, but a signal can still
            // arrive from outside.
            if interrupt::is_interrupted() {
                info!("interrupted, quitting");
                break;
            }

            let mut events = self.collect_events()?;

            let size = self.terminal.size()?;
            events.insert(
                0,
                UiEvent::Frame {
                    width: size.width,
                    height: size.height,
                },
            );

            for event in events {
                if matches!(&event, UiEvent::Terminal(_)) {
                    self.last_terminal_event = Instant::now();
                }
                // Only ticks render, which caps the frame rate.
                if matches!(&event, UiEvent::Tick) {
                    dirty = true;
                }
                let effects = update::update(&mut self.state, event);
                self.execute_effects(effects);
            }

            if dirty {
                self.terminal.draw(|frame| render::render(&self.state, frame))?;
                dirty = false;
            }
        }

        Ok(())
    }

    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();

        let recent_input = self.last_terminal_event.elapsed() < IDLE_POLL_DURATION;
        let tick_interval = if self.state.is_busy() || recent_input {
            FRAME_DURATION
        } else {
            IDLE_POLL_DURATION
        };

        while let Ok(event) = self.inbox_rx.try_recv() {
            events.push(event);
        }

        let poll_duration = if events.is_empty() {
            tick_interval.saturating_sub(self.last_tick.elapsed())
        } else {
            Duration::ZERO
        };
        if event::poll(poll_duration)? {
            events.push(UiEvent::Terminal(event::read()?));
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }

        if self.last_tick.elapsed() >= tick_interval {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn dispatch_event(&mut self, event: UiEvent) {
        let effects = update::update(&mut self.state, event);
        self.execute_effects(effects);
    }

    /// Spawns `future` and delivers its event through the inbox.
    fn spawn_effect<Fut>(&self, future: Fut)
    where
        Fut: Future<Output = UiEvent> + Send + 'static,
    {
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(future.await);
        });
    }

    fn execute_effect(&mut self, effect: UiEffect) {
        match effect {
            UiEffect::Quit => {
                self.state.should_quit = true;
            }
            UiEffect::Backend(request) => {
                debug!(?request, "backend request");
                self.spawn_effect(handlers::run_request(
                    self.client.clone(),
                    request,
                    self.inbox_tx.clone(),
                ));
            }
            UiEffect::Reveal(request) => self.start_reveal(request),
            UiEffect::SkipReveal(skip) => skip.cancel(),
        }
    }

    fn start_reveal(&mut self, request: RevealRequest) {
        let RevealRequest {
            message,
            target,
            text,
        } = request;
        let handle = self.state.chat.renderer().reveal(&target, &text);
        self.dispatch_event(UiEvent::RevealStarted {
            message,
            skip: handle.skip_token(),
        });
        self.spawn_effect(async move {
            UiEvent::RevealFinished {
                message,
                outcome: handle.finished().await,
            }
        });
    }
}

impl Drop for TuiRuntime {
    fn drop(&mut self) {
        let _ = terminal::restore_terminal();
    }
}
