#![warn(missing_docs)]

//! # Feedback PID Controller Library
//!
//! This library provides an embeddable discrete-time PID (Proportional-Integral-Derivative)
//! controller in Rust, meant to sit inside a larger control loop: motor control, thermal
//! regulation, robotics actuation.
//!
//! It includes both functional and stateful implementations of the same control law.
//!
//! ## Features
//!
//! - Works with irregular update intervals: the elapsed time is measured with an injected time
//!   source, or passed in explicitly on every update.
//! - Anti reset-windup: the output and the integral term are both clamped to optional output
//!   limits, and the integral is re-clamped the moment the limits change.
//! - Optional proportional-on-measurement and derivative-on-measurement (the default) to mitigate
//!   overshoot and derivative kick.
//! - Configurable sample time: _an update arriving before one sample time has elapsed returns the
//!   previous output unchanged_.
//! - Auto/manual mode with bumpless transfer back into automatic mode.
//! - An optional error map, e.g. [`pid::wrap_angle`] for heading control.
//! - Fully validated configuration, `no_std`, generic over `f32`/`f64`.
//!
//! ## Usage
//!
//! ### Stateful PID Controller
//!
//! The stateful PID controller owns its running state and a time source returning seconds. Any
//! `FnMut() -> F` closure is a time source.
//!
//! ```rust
//! use feedback_pid::pid::{PidConfigBuilder, PidController};
//! use feedback_pid::time::ManualClock;
//!
//! let config = PidConfigBuilder::default()
//!     .kp(2.0)
//!     .setpoint(100.0)
//!     .build()
//!     .expect("Invalid PID config");
//!
//! let clock = ManualClock::new(0.0);
//! let mut pid = PidController::new(config, &clock);
//!
//! assert_eq!(pid.update(0.0, None), Some(200.0));
//!
//! clock.advance(1.0);
//! assert_eq!(pid.update(75.0, None), Some(50.0));
//!
//! // Reconfigure on the fly; the integral is re-clamped when the guard goes out of scope
//! assert!(pid.config_mut().set_output_limits(Some(-10.0), Some(10.0)).is_ok());
//! ```
//!
//! ### Functional PID Controller
//!
//! The functional PID controller lets you explicitly manage the state of the controller.
//!
//! In exchange, the controller holds no mutable state and the `compute` method is **functionally
//! pure**, making it exceptionally easy to test and validate, or to make thread-safe.
//!
//! ```rust
//! use feedback_pid::pid::{FuncPidController, PidConfigBuilder, PidContext};
//!
//! let config = PidConfigBuilder::default()
//!     .gains(0.0, 2.0, 0.0)
//!     .setpoint(100.0)
//!     .build()
//!     .expect("Invalid PID config");
//! let pid = FuncPidController::new(config);
//! let ctx = PidContext::<f64>::new();
//!
//! let (_, ctx) = pid.compute(ctx, 50.0, 0.0, None);
//! let (output, ctx) = pid.compute(ctx, 50.0, 1.0, None);
//! assert!((output.unwrap() - 100.0).abs() < 1e-9);
//! assert_eq!(ctx.last_time(), Some(1.0));
//! ```
//!
//! ### Manual mode and bumpless transfer
//!
//! ```rust
//! use feedback_pid::pid::{PidConfigBuilder, PidController};
//!
//! let config = PidConfigBuilder::default()
//!     .gains(0.5, 1.0, 0.0)
//!     .output_limits(0.0, 100.0)
//!     .setpoint(20.0)
//!     .build()
//!     .expect("Invalid PID config");
//!
//! let mut now = 0.0;
//! let mut pid = PidController::new(config, move || {
//!     now += 0.1;
//!     now
//! });
//!
//! let held = pid.update(18.0, None);
//! pid.set_auto_mode(false, None);
//! assert_eq!(pid.update(5.0, None), held);
//!
//! // Resume from the actuator's current position
//! pid.set_auto_mode(true, Some(42.0));
//! assert_eq!(pid.components().1, 42.0);
//! ```
//!
//! ## License
//!
//! MIT
#![no_std]

#[cfg(feature = "std")]
extern crate std;

/// The main module for the PID controller library.
pub mod pid;

/// The module containing the time source abstraction used to measure elapsed time
pub mod time;

#[doc(hidden)]
#[cfg(feature = "simulation")]
pub mod sim;

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
