//! Simulated inter-node links between a [`crate::manager::RobotManager`] and
//! a registered [`crate::robot::Robot`].
//!
//! Grounded on the simulator's own `pub_sub` channel: a pair of plain
//! `mpsc` queues, one per direction, with no shared ownership between the two
//! ends. Unlike the simulator's generic keyed broker, the fleet only ever
//! needs one inbox and one outbox per robot, so there is no broker/key
//! indirection here, just a delay-sampling sender wrapping `mpsc::Sender`.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use log::trace;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use statrs::distribution::Normal;

use crate::errors::{FleetError, FleetErrorTypes, FleetResult};
use crate::logger::{is_enabled, InternalLog};
use crate::messages::Message;

pub type SharedMutex<T> = std::sync::Arc<Mutex<T>>;

/// Clamped-normal delay model: `d ~ clamp(Normal(mean, std), min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NetworkDelayConfig {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for NetworkDelayConfig {
    fn default() -> Self {
        Self {
            mean: 0.0,
            std: 0.0,
            min: 0.0,
            max: 0.0,
        }
    }
}

impl NetworkDelayConfig {
    pub fn new(mean: f64, std: f64, min: f64, max: f64) -> FleetResult<Self> {
        if !(min <= mean && mean <= max) || std < 0.0 {
            return Err(FleetError::new(
                FleetErrorTypes::ConfigError,
                format!(
                    "invalid network delay bounds: min={min} mean={mean} max={max} std={std}"
                ),
            ));
        }
        Ok(Self { mean, std, min, max })
    }
}

/// Samples delays from a [`NetworkDelayConfig`] using a seeded, deterministic
/// RNG, the same way the simulator derives its `DeterministNormalRandomVariable`
/// from a per-entity seed instead of a shared global RNG.
pub struct NetworkDelay {
    config: NetworkDelayConfig,
    normal: Normal,
    rng: Mutex<ChaCha8Rng>,
}

impl NetworkDelay {
    pub fn new(config: NetworkDelayConfig, seed: u64) -> FleetResult<Self> {
        let std = if config.std <= 0.0 { 1e-9 } else { config.std };
        let normal = Normal::new(config.mean, std).map_err(|e| {
            FleetError::new(FleetErrorTypes::MathError, format!("invalid normal distribution: {e}"))
        })?;
        Ok(Self {
            config,
            normal,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        })
    }

    /// Draws one delay sample in seconds, clamped to `[min, max]`.
    pub fn sample(&self) -> f32 {
        let mut rng = self.rng.lock().unwrap();
        let raw: f64 = self.normal.sample(&mut *rng);
        raw.clamp(self.config.min, self.config.max) as f32
    }
}

/// The sending half of one direction of a channel: samples a delay, suspends
/// for it, then enqueues, rather than buffering on the receive side by
/// timestamp.
pub struct DelayedSender<T> {
    inner: SyncSender<T>,
    delay: std::sync::Arc<NetworkDelay>,
}

impl<T> Clone for DelayedSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            delay: self.delay.clone(),
        }
    }
}

impl<T> DelayedSender<T> {
    pub fn send(&self, value: T) -> FleetResult<()> {
        let d = self.delay.sample().max(0.0);
        if is_enabled(InternalLog::Channel) {
            trace!("channel send delayed by {d:.4}s");
        }
        if d > 0.0 {
            thread::sleep(Duration::from_secs_f32(d));
        }
        self.inner.send(value).map_err(|_| {
            FleetError::new(
                FleetErrorTypes::ProtocolViolation,
                "channel closed on send".to_string(),
            )
        })
    }
}

/// One end of a bidirectional link. `outbound` carries messages away from
/// this endpoint (delay-sampled at send time); `inbound` carries messages
/// toward this endpoint. Mirrors `Communication` in the Python prototype,
/// where one node's `network_delay` is sampled both by its own `send` (before
/// enqueueing) and by its own `receive` (after dequeueing, before returning
/// to the caller) — so `delay` here is the same `NetworkDelay` instance
/// `outbound` samples from, not a second independent one.
pub struct Endpoint<T> {
    pub outbound: DelayedSender<T>,
    pub inbound: Receiver<T>,
    delay: std::sync::Arc<NetworkDelay>,
}

impl<T> Endpoint<T> {
    /// Blocks for up to `timeout` waiting for a message, then — mirroring
    /// `Communication.receive`'s `await self.inbox.get()` followed by its own
    /// sampled `asyncio.sleep(delay)` — suspends for a freshly sampled delay
    /// before handing the message back. A timeout/empty result never
    /// suspends: nothing was received to delay.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        let message = self.inbound.recv_timeout(timeout)?;
        self.suspend_for_receive();
        Ok(message)
    }

    pub fn try_recv(&self) -> Option<T> {
        let message = self.inbound.try_recv().ok()?;
        self.suspend_for_receive();
        Some(message)
    }

    fn suspend_for_receive(&self) {
        let d = self.delay.sample().max(0.0);
        if is_enabled(InternalLog::Channel) {
            trace!("channel receive delayed by {d:.4}s");
        }
        if d > 0.0 {
            thread::sleep(Duration::from_secs_f32(d));
        }
    }
}

/// Bound on each direction's queue depth (spec §3/§5: "bounded FIFO queues
/// (default 64 messages); overflow on send blocks the sender").
const QUEUE_CAPACITY: usize = 64;

/// Builds the two endpoints of a Manager<->Robot link, one bounded `mpsc`
/// pair per direction, each with its own independently seeded
/// [`NetworkDelay`].
pub fn channel_pair(
    to_robot_delay: NetworkDelayConfig,
    to_manager_delay: NetworkDelayConfig,
    seed: u64,
) -> FleetResult<(Endpoint<Message>, Endpoint<Message>)> {
    let (manager_to_robot_tx, manager_to_robot_rx) = mpsc::sync_channel::<Message>(QUEUE_CAPACITY);
    let (robot_to_manager_tx, robot_to_manager_rx) = mpsc::sync_channel::<Message>(QUEUE_CAPACITY);

    let manager_delay = std::sync::Arc::new(NetworkDelay::new(to_robot_delay, seed)?);
    let robot_delay = std::sync::Arc::new(NetworkDelay::new(to_manager_delay, seed.wrapping_add(1))?);

    let manager_side = Endpoint {
        outbound: DelayedSender {
            inner: manager_to_robot_tx,
            delay: manager_delay.clone(),
        },
        inbound: robot_to_manager_rx,
        delay: manager_delay,
    };
    let robot_side = Endpoint {
        outbound: DelayedSender {
            inner: robot_to_manager_tx,
            delay: robot_delay.clone(),
        },
        inbound: manager_to_robot_rx,
        delay: robot_delay,
    };
    Ok((manager_side, robot_side))
}
