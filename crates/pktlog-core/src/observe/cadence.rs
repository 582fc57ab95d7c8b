//! Hidden packet report cadence
//!
//! A [`CadenceController`] owns the reporting interval of one direction and
//! publishes changes through a `watch` channel. Each [`Reporter`] waits on
//! whichever comes first: its timer, a cadence change or shutdown.

use crate::observe::DirectionContext;
use crate::packet::Direction;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Interval at which hidden packet counts are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cadence {
    /// No periodic reports
    Disabled,
    /// Report every interval
    Every(Duration),
}

impl Cadence {
    /// Build from signed milliseconds; zero or negative disables reporting
    pub fn from_millis(millis: i64) -> Self {
        if millis <= 0 {
            Cadence::Disabled
        } else {
            Cadence::Every(Duration::from_millis(millis.unsigned_abs()))
        }
    }

    /// Milliseconds, with `0` meaning disabled
    pub fn as_millis(self) -> i64 {
        match self {
            Cadence::Disabled => 0,
            Cadence::Every(period) => i64::try_from(period.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Interval if reporting is enabled
    pub fn interval(self) -> Option<Duration> {
        match self {
            Cadence::Disabled => None,
            Cadence::Every(period) => Some(period),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Disabled => f.write_str("disabled"),
            Cadence::Every(period) => write!(f, "{}ms", period.as_millis()),
        }
    }
}

/// Reporting interval of one direction
#[derive(Debug)]
pub struct CadenceController {
    direction: Direction,
    tx: watch::Sender<Cadence>,
}

impl CadenceController {
    /// Create a controller starting at `initial`
    pub fn new(direction: Direction, initial: Cadence) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { direction, tx }
    }

    /// Direction this controller governs
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Current cadence
    pub fn current(&self) -> Cadence {
        *self.tx.borrow()
    }

    /// Set a new cadence
    ///
    /// Waiting reporters are woken immediately. Setting the current value
    /// again is a no-op so an unchanged reload does not reset timers.
    pub fn set(&self, cadence: Cadence) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == cadence {
                false
            } else {
                *current = cadence;
                true
            }
        });

        if changed {
            info!(direction = self.direction.as_str(), %cadence, "Report cadence changed");
        }
    }

    /// Subscribe a reporter to cadence changes
    pub fn subscribe(&self) -> watch::Receiver<Cadence> {
        self.tx.subscribe()
    }
}

/// The pair of per-direction cadence controllers
#[derive(Debug)]
pub struct CadenceControllers {
    send: CadenceController,
    receive: CadenceController,
}

impl CadenceControllers {
    /// Create both controllers
    pub fn new(send: Cadence, receive: Cadence) -> Self {
        Self {
            send: CadenceController::new(Direction::Send, send),
            receive: CadenceController::new(Direction::Receive, receive),
        }
    }

    /// Controller of one direction
    pub fn get(&self, direction: Direction) -> &CadenceController {
        match direction {
            Direction::Send => &self.send,
            Direction::Receive => &self.receive,
        }
    }
}

/// Why a steady wait ended
enum Wake {
    CadenceChanged,
    Stopped,
}

/// Periodic hidden packet reporter for one direction of one session
pub struct Reporter {
    context: Arc<DirectionContext>,
    cadence: watch::Receiver<Cadence>,
    shutdown: oneshot::Receiver<()>,
}

impl Reporter {
    /// Create a reporter following the context's cadence subscription
    ///
    /// It stops when `shutdown` fires (or its sender is dropped) or when the
    /// cadence controller goes away, draining the counter one last time.
    pub fn new(context: Arc<DirectionContext>, shutdown: oneshot::Receiver<()>) -> Self {
        let cadence = context.subscribe_cadence();
        Self {
            context,
            cadence,
            shutdown,
        }
    }

    /// Run the reporter on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Reporting loop
    pub async fn run(mut self) {
        let direction = self.context.direction().as_str();
        debug!(direction, "Hidden packet reporter started");

        loop {
            let cadence = *self.cadence.borrow_and_update();
            let wake = match cadence.interval() {
                None => self.wait_idle().await,
                Some(period) => self.wait_steady(period).await,
            };
            if let Wake::Stopped = wake {
                break;
            }
        }

        self.context.report();
        debug!(direction, "Hidden packet reporter stopped");
    }

    /// Idle: nothing to arm, wait for a cadence or shutdown
    async fn wait_idle(&mut self) -> Wake {
        tokio::select! {
            changed = self.cadence.changed() => match changed {
                Ok(()) => Wake::CadenceChanged,
                Err(_) => Wake::Stopped,
            },
            _ = &mut self.shutdown => Wake::Stopped,
        }
    }

    /// Waiting(period): report on every tick until interrupted
    ///
    /// A cadence change flushes what was counted under the old cadence, then
    /// the caller re-arms with the new one.
    async fn wait_steady(&mut self, period: Duration) -> Wake {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.context.report();
                }
                changed = self.cadence.changed() => {
                    self.context.report();
                    return match changed {
                        Ok(()) => Wake::CadenceChanged,
                        Err(_) => Wake::Stopped,
                    };
                }
                _ = &mut self.shutdown => return Wake::Stopped,
            }
        }
    }
}
