//! Hardware collaborator surface
//!
//! The routine never talks to motor controllers, solenoids or sensors directly.
//! It consumes the small trait surface below, and every handle is collected into
//! one [`Hardware`] value that is built once at startup and handed to commands
//! by reference.
//!
//! # Design
//!
//! - **No Global State**: handles live in `Hardware`, not in statics
//! - **Cheap Clone**: every handle is an `Arc`, so threaded tasks can hold their own copy
//! - **Fallible Reads Only**: sensor reads can fault; actuator writes are fire-and-forget

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::HardwareFault;
use crate::types::{MechanismId, MechanismPosition};

/// Differential drive base.
pub trait Drivetrain: Send + Sync {
    /// Set left and right side power, each in `[-1, 1]`.
    fn tank_drive(&self, left: f64, right: f64);

    /// Drive with a forward speed and a rotation rate, each in `[-1, 1]`.
    fn arcade_drive(&self, speed: f64, turn: f64);

    /// Zero all drive output.
    fn stop(&self) {
        self.tank_drive(0.0, 0.0);
    }
}

/// The consumed surface of a continuous feedback controller.
///
/// Only setpoint, output, enable/disable and error are used; the control law is
/// the controller's own business.
pub trait FeedbackController: Send + Sync {
    fn set_setpoint(&self, setpoint: f64);
    fn output(&self) -> f64;
    fn enable(&self);
    fn disable(&self);
    fn error(&self) -> f64;
    fn is_enabled(&self) -> bool;
}

/// A scalar measurement source (encoder distance, gyro heading).
pub trait Sensor: Send + Sync {
    fn read(&self) -> Result<f64, HardwareFault>;
}

/// A double-acting mechanism with two terminal positions.
pub trait Mechanism: Send + Sync {
    fn set(&self, position: MechanismPosition);

    /// Last commanded position, `None` if never set.
    fn position(&self) -> Option<MechanismPosition>;
}

/// Monotonic time source used by timed commands.
pub trait Clock: Send + Sync {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Time elapsed in the current autonomous phase, as reported by the host.
pub trait MatchClock: Send + Sync {
    fn match_time(&self) -> Duration;
}

/// Destination for `print` output.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, message: &str);
}

/// Sink that forwards diagnostics to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, message: &str) {
        tracing::info!(target: "autoscript::print", "{}", message);
    }
}

/// Every collaborator handle the routine uses.
///
/// Concurrent commands in one step must target disjoint handles here; the
/// scheduler does not arbitrate between two writers of the same actuator.
#[derive(Clone)]
pub struct Hardware {
    pub drivetrain: Arc<dyn Drivetrain>,
    /// Controller whose process variable is `encoder`
    pub distance_controller: Arc<dyn FeedbackController>,
    /// Controller whose process variable is `gyro`
    pub heading_controller: Arc<dyn FeedbackController>,
    pub encoder: Arc<dyn Sensor>,
    pub gyro: Arc<dyn Sensor>,
    pub bucket: Arc<dyn Mechanism>,
    pub gear_guard: Arc<dyn Mechanism>,
    pub clock: Arc<dyn Clock>,
    pub match_clock: Arc<dyn MatchClock>,
    pub sink: Arc<dyn DiagnosticSink>,
}

impl Hardware {
    /// Look up a mechanism handle by id
    pub fn mechanism(&self, id: MechanismId) -> &Arc<dyn Mechanism> {
        match id {
            MechanismId::Bucket => &self.bucket,
            MechanismId::GearGuard => &self.gear_guard,
        }
    }

    /// Put every actuator the routine drives into its safe state.
    ///
    /// Mechanisms keep their position; drive output is zeroed and controllers
    /// are disabled.
    pub fn make_safe(&self) {
        self.distance_controller.disable();
        self.heading_controller.disable();
        self.drivetrain.stop();
    }
}

impl fmt::Debug for Hardware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hardware")
            .field("distance_controller_enabled", &self.distance_controller.is_enabled())
            .field("heading_controller_enabled", &self.heading_controller.is_enabled())
            .field("bucket", &self.bucket.position())
            .field("gear_guard", &self.gear_guard.position())
            .field("now", &self.clock.now())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRobot;

    #[test]
    fn test_mechanism_lookup_targets_right_handle() {
        let sim = SimRobot::new();
        let hw = sim.hardware();

        hw.mechanism(MechanismId::Bucket).set(MechanismPosition::Extended);
        assert_eq!(sim.bucket.position(), Some(MechanismPosition::Extended));
        assert_eq!(sim.gear_guard.position(), None);
    }

    #[test]
    fn test_make_safe_zeroes_drive_and_disables_controllers() {
        let sim = SimRobot::new();
        let hw = sim.hardware();

        hw.distance_controller.enable();
        hw.heading_controller.enable();
        hw.drivetrain.tank_drive(0.5, 0.5);

        hw.make_safe();

        assert_eq!(sim.drivetrain.output(), (0.0, 0.0));
        assert!(!hw.distance_controller.is_enabled());
        assert!(!hw.heading_controller.is_enabled());
    }
}
