//! Simulated robot
//!
//! A small in-process plant that implements every collaborator trait, so that
//! scripts can be dry-run from the CLI and the scheduler can be tested without
//! a robot. Time is simulated: the host advances the [`ManualClock`] and the
//! plant together via [`SimRobot::advance`].
//!
//! The model is deliberately crude: wheel power maps linearly onto speed, and
//! the feedback controllers are proportional only.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::HardwareFault;
use crate::hardware::{
    Clock, DiagnosticSink, Drivetrain, FeedbackController, Hardware, MatchClock, Mechanism,
    Sensor,
};
use crate::types::MechanismPosition;

/// Physical parameters of the simulated plant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Distance units per second at full power
    pub max_speed: f64,
    /// Degrees per second at full differential power
    pub max_turn_rate: f64,
    /// Proportional gain of the distance controller
    pub distance_gain: f64,
    /// Proportional gain of the heading controller
    pub heading_gain: f64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            max_speed: 100.0,
            max_turn_rate: 180.0,
            distance_gain: 0.05,
            heading_gain: 0.02,
        }
    }
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}

#[derive(Debug, Default)]
struct DriveState {
    left: f64,
    right: f64,
    writes: usize,
}

/// Drivetrain that remembers its last output and counts writes.
#[derive(Debug, Default)]
pub struct SimDrivetrain {
    state: Mutex<DriveState>,
}

impl SimDrivetrain {
    /// Current (left, right) output
    pub fn output(&self) -> (f64, f64) {
        self.state
            .lock()
            .map(|s| (s.left, s.right))
            .unwrap_or((0.0, 0.0))
    }

    /// Number of drive writes since construction
    pub fn write_count(&self) -> usize {
        self.state.lock().map(|s| s.writes).unwrap_or(0)
    }
}

impl Drivetrain for SimDrivetrain {
    fn tank_drive(&self, left: f64, right: f64) {
        if let Ok(mut state) = self.state.lock() {
            state.left = clamp_unit(left);
            state.right = clamp_unit(right);
            state.writes += 1;
        }
    }

    fn arcade_drive(&self, speed: f64, turn: f64) {
        self.tank_drive(speed + turn, speed - turn);
    }
}

/// Sensor with a settable value and an injectable fault.
#[derive(Debug, Default)]
pub struct SimSensor {
    value: Mutex<f64>,
    fault: Mutex<Option<String>>,
    name: &'static str,
}

impl SimSensor {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn set(&self, value: f64) {
        if let Ok(mut v) = self.value.lock() {
            *v = value;
        }
    }

    /// Make every subsequent read fail with `reason`
    pub fn inject_fault(&self, reason: impl Into<String>) {
        if let Ok(mut f) = self.fault.lock() {
            *f = Some(reason.into());
        }
    }

    pub fn clear_fault(&self) {
        if let Ok(mut f) = self.fault.lock() {
            *f = None;
        }
    }

    fn value(&self) -> f64 {
        self.value.lock().map(|v| *v).unwrap_or(0.0)
    }
}

impl Sensor for SimSensor {
    fn read(&self) -> Result<f64, HardwareFault> {
        let fault = self.fault.lock().ok().and_then(|f| f.clone());
        match fault {
            Some(reason) => Err(HardwareFault::new(self.name, reason)),
            None => Ok(self.value()),
        }
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    setpoint: f64,
    enabled: bool,
}

/// Proportional controller reading its process variable from a sensor.
pub struct SimController {
    source: Arc<SimSensor>,
    gain: f64,
    state: Mutex<ControllerState>,
}

impl SimController {
    pub fn new(source: Arc<SimSensor>, gain: f64) -> Self {
        Self {
            source,
            gain,
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub fn setpoint(&self) -> f64 {
        self.state.lock().map(|s| s.setpoint).unwrap_or(0.0)
    }
}

impl FeedbackController for SimController {
    fn set_setpoint(&self, setpoint: f64) {
        if let Ok(mut state) = self.state.lock() {
            state.setpoint = setpoint;
        }
    }

    fn output(&self) -> f64 {
        if !self.is_enabled() {
            return 0.0;
        }
        clamp_unit(self.error() * self.gain)
    }

    fn enable(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.enabled = true;
        }
    }

    fn disable(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.enabled = false;
        }
    }

    fn error(&self) -> f64 {
        self.setpoint() - self.source.value()
    }

    fn is_enabled(&self) -> bool {
        self.state.lock().map(|s| s.enabled).unwrap_or(false)
    }
}

/// Mechanism that records its commanded position.
#[derive(Debug, Default)]
pub struct SimMechanism {
    position: Mutex<Option<MechanismPosition>>,
    writes: Mutex<usize>,
}

impl SimMechanism {
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }
}

impl Mechanism for SimMechanism {
    fn set(&self, position: MechanismPosition) {
        if let Ok(mut p) = self.position.lock() {
            *p = Some(position);
        }
        if let Ok(mut w) = self.writes.lock() {
            *w += 1;
        }
    }

    fn position(&self) -> Option<MechanismPosition> {
        self.position.lock().ok().and_then(|p| *p)
    }
}

/// Clock that only moves when told to.
///
/// Its origin is the start of the autonomous phase, so it doubles as the match
/// clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.lock().map(|n| *n).unwrap_or_default()
    }
}

impl MatchClock for ManualClock {
    fn match_time(&self) -> Duration {
        self.now()
    }
}

/// Sink that keeps every message for inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&self, message: &str) {
        tracing::info!(target: "autoscript::print", "{}", message);
        if let Ok(mut m) = self.messages.lock() {
            m.push(message.to_string());
        }
    }
}

/// A complete simulated robot.
///
/// Handles are public so tests can inspect actuator state and inject faults.
pub struct SimRobot {
    pub params: SimParams,
    pub drivetrain: Arc<SimDrivetrain>,
    pub encoder: Arc<SimSensor>,
    pub gyro: Arc<SimSensor>,
    pub distance_controller: Arc<SimController>,
    pub heading_controller: Arc<SimController>,
    pub bucket: Arc<SimMechanism>,
    pub gear_guard: Arc<SimMechanism>,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingSink>,
}

impl Default for SimRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRobot {
    pub fn new() -> Self {
        Self::with_params(SimParams::default())
    }

    pub fn with_params(params: SimParams) -> Self {
        let encoder = Arc::new(SimSensor::named("encoder"));
        let gyro = Arc::new(SimSensor::named("gyro"));
        Self {
            params,
            drivetrain: Arc::new(SimDrivetrain::default()),
            distance_controller: Arc::new(SimController::new(
                Arc::clone(&encoder),
                params.distance_gain,
            )),
            heading_controller: Arc::new(SimController::new(
                Arc::clone(&gyro),
                params.heading_gain,
            )),
            encoder,
            gyro,
            bucket: Arc::new(SimMechanism::default()),
            gear_guard: Arc::new(SimMechanism::default()),
            clock: Arc::new(ManualClock::default()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    /// Collect the handles into the routine's hardware context
    pub fn hardware(&self) -> Hardware {
        Hardware {
            drivetrain: self.drivetrain.clone(),
            distance_controller: self.distance_controller.clone(),
            heading_controller: self.heading_controller.clone(),
            encoder: self.encoder.clone(),
            gyro: self.gyro.clone(),
            bucket: self.bucket.clone(),
            gear_guard: self.gear_guard.clone(),
            clock: self.clock.clone(),
            match_clock: self.clock.clone(),
            sink: self.sink.clone(),
        }
    }

    /// Integrate the plant over `dt` and move simulated time forward.
    pub fn advance(&self, dt: Duration) {
        let (left, right) = self.drivetrain.output();
        let secs = dt.as_secs_f64();

        let distance = self.encoder.value() + (left + right) / 2.0 * self.params.max_speed * secs;
        let heading = self.gyro.value() + (left - right) / 2.0 * self.params.max_turn_rate * secs;
        self.encoder.set(distance);
        self.gyro.set(heading);

        self.clock.advance(dt);
    }

    /// Total actuator writes of any kind, for side-effect assertions
    pub fn actuator_writes(&self) -> usize {
        self.drivetrain.write_count() + self.bucket.write_count() + self.gear_guard.write_count()
    }
}
