// Implements the discrete PID control law, its configuration and its running state
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use core::fmt;
use core::ops::{Deref, DerefMut};

use log::{debug, trace, warn};
use num_traits::float::FloatCore;
use num_traits::FloatConst;

use crate::time::TimeSource;

/// Elapsed time assumed on the very first update when no explicit time step is given. Small
/// enough that the integral contribution is negligible, large enough to keep the derivative finite.
const FIRST_UPDATE_DT: f64 = 1e-16;

/// Default minimum interval between effective updates, in seconds
const DEFAULT_SAMPLE_TIME: f64 = 0.01;

/// Errors raised when assigning an invalid value to a [`PidConfig`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum PidConfigError {
    /// The proportional gain was negative, NaN or infinite
    #[cfg_attr(
        feature = "std",
        error("proportional gain must be finite and non-negative")
    )]
    InvalidProportionalGain,

    /// The integral gain was negative, NaN or infinite
    #[cfg_attr(feature = "std", error("integral gain must be finite and non-negative"))]
    InvalidIntegralGain,

    /// The derivative gain was negative, NaN or infinite
    #[cfg_attr(
        feature = "std",
        error("derivative gain must be finite and non-negative")
    )]
    InvalidDerivativeGain,

    /// The sample time was negative, NaN or infinite
    #[cfg_attr(feature = "std", error("sample time must be finite and non-negative"))]
    InvalidSampleTime,

    /// An output limit was NaN, or the lower limit was not below the upper limit
    #[cfg_attr(
        feature = "std",
        error("output limits must not be NaN and the lower limit must be below the upper limit")
    )]
    InvalidOutputLimits,
}

#[cfg(not(feature = "std"))]
impl fmt::Display for PidConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PidConfigError::InvalidProportionalGain => {
                "proportional gain must be finite and non-negative"
            }
            PidConfigError::InvalidIntegralGain => "integral gain must be finite and non-negative",
            PidConfigError::InvalidDerivativeGain => {
                "derivative gain must be finite and non-negative"
            }
            PidConfigError::InvalidSampleTime => "sample time must be finite and non-negative",
            PidConfigError::InvalidOutputLimits => {
                "output limits must not be NaN and the lower limit must be below the upper limit"
            }
        };
        f.write_str(msg)
    }
}

/// Configuration of a PID controller.
///
/// Every field is validated on assignment: a setter that rejects its argument returns an error
/// and leaves the previous value in place, so a `PidConfig` is valid by construction.
#[derive(Copy, Clone)]
pub struct PidConfig<F> {
    /// Proportional gain coefficient.
    /// Defaults to 1.0.
    kp: F,

    /// Integral gain coefficient, applied to the error integrated over elapsed seconds.
    /// Defaults to 0.0.
    ki: F,

    /// Derivative gain coefficient, applied to the rate of change per second.
    /// Defaults to 0.0.
    kd: F,

    /// Target value for the measured process variable.
    /// Defaults to 0.0.
    setpoint: F,

    /// Minimum elapsed time, in seconds, between effective updates. `None` disables throttling.
    /// Defaults to 10ms.
    sample_time: Option<F>,

    /// Lower bound on the output and on the integral term. `None` means unbounded.
    output_min: Option<F>,

    /// Upper bound on the output and on the integral term. `None` means unbounded.
    output_max: Option<F>,

    /// Whether the proportional term accumulates the NEGATIVE change in measurement instead of
    /// being recomputed from the error.
    /// Defaults to false.
    proportional_on_measurement: bool,

    /// Whether the derivative term uses the NEGATIVE rate of change of the measurement instead of
    /// the rate of change of the error.
    /// Defaults to true.
    differential_on_measurement: bool,

    /// Transformation applied to the raw error before any term is computed
    error_map: Option<fn(F) -> F>,
}

impl<F: FloatCore> Default for PidConfig<F> {
    fn default() -> Self {
        PidConfig {
            kp: F::one(),
            ki: F::zero(),
            kd: F::zero(),
            setpoint: F::zero(),
            sample_time: num_traits::cast(DEFAULT_SAMPLE_TIME),
            output_min: None,
            output_max: None,
            proportional_on_measurement: false,
            differential_on_measurement: true,
            error_map: None,
        }
    }
}

impl<F: FloatCore> fmt::Debug for PidConfig<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Gains are printed through f64 since FloatCore does not imply Debug
        let show = |value: F| value.to_f64();
        f.debug_struct("PidConfig")
            .field("kp", &show(self.kp))
            .field("ki", &show(self.ki))
            .field("kd", &show(self.kd))
            .field("setpoint", &show(self.setpoint))
            .field("sample_time", &self.sample_time.and_then(show))
            .field("output_min", &self.output_min.and_then(show))
            .field("output_max", &self.output_max.and_then(show))
            .field(
                "proportional_on_measurement",
                &self.proportional_on_measurement,
            )
            .field(
                "differential_on_measurement",
                &self.differential_on_measurement,
            )
            .field("error_map", &self.error_map.is_some())
            .finish()
    }
}

fn is_finite_non_negative<F: FloatCore>(gain: F) -> bool {
    gain >= F::zero() && gain.is_finite()
}

fn are_valid_limits<F: FloatCore>(output_min: Option<F>, output_max: Option<F>) -> bool {
    if output_min.map_or(false, F::is_nan) || output_max.map_or(false, F::is_nan) {
        return false;
    }
    match (output_min, output_max) {
        (Some(lower), Some(upper)) => lower < upper,
        _ => true,
    }
}

/// Clamps `value` into `[lower, upper]`, treating an absent bound as unbounded on that side
fn clamp<F: FloatCore>(value: F, lower: Option<F>, upper: Option<F>) -> F {
    let value = match upper {
        Some(upper) if value > upper => upper,
        _ => value,
    };
    match lower {
        Some(lower) if value < lower => lower,
        _ => value,
    }
}

impl<F: FloatCore> PidConfig<F> {
    /// Returns the proportional gain.
    pub fn kp(&self) -> F {
        self.kp
    }

    /// Returns the integral gain.
    pub fn ki(&self) -> F {
        self.ki
    }

    /// Returns the derivative gain.
    pub fn kd(&self) -> F {
        self.kd
    }

    /// Convenience method that returns the proportional, integral, and derivative gains together as a tuple.
    pub fn gains(&self) -> (F, F, F) {
        (self.kp, self.ki, self.kd)
    }

    /// Returns the setpoint.
    pub fn setpoint(&self) -> F {
        self.setpoint
    }

    /// Returns the sample time in seconds, or `None` if throttling is disabled.
    pub fn sample_time(&self) -> Option<F> {
        self.sample_time
    }

    /// Returns the lower output limit, if any.
    pub fn output_min(&self) -> Option<F> {
        self.output_min
    }

    /// Returns the upper output limit, if any.
    pub fn output_max(&self) -> Option<F> {
        self.output_max
    }

    /// Returns both output limits as a `(lower, upper)` tuple.
    pub fn output_limits(&self) -> (Option<F>, Option<F>) {
        (self.output_min, self.output_max)
    }

    /// Returns the flag indicating whether the proportional term is computed on the measurement.
    pub fn proportional_on_measurement(&self) -> bool {
        self.proportional_on_measurement
    }

    /// Returns the flag indicating whether the derivative term is computed on the measurement.
    pub fn differential_on_measurement(&self) -> bool {
        self.differential_on_measurement
    }

    /// Returns the error map, if any.
    pub fn error_map(&self) -> Option<fn(F) -> F> {
        self.error_map
    }

    /// Sets the proportional gain.
    ///
    /// # Arguments
    /// - `kp`: The new proportional gain.
    ///
    /// # Returns
    /// - `Ok(())` if the gain was set successfully.
    /// - `Err(PidConfigError::InvalidProportionalGain)` if the gain is negative or not finite.
    pub fn set_kp(&mut self, kp: F) -> Result<(), PidConfigError> {
        if !is_finite_non_negative(kp) {
            warn!("Rejected proportional gain: must be finite and non-negative");
            return Err(PidConfigError::InvalidProportionalGain);
        }
        self.kp = kp;
        Ok(())
    }

    /// Sets the integral gain.
    ///
    /// The integral term is updated as `I += ki * error * dt`, so `ki` is expressed per second.
    /// Changing `ki` does not rescale the integral already accumulated.
    ///
    /// # Returns
    /// - `Ok(())` if the gain was set successfully.
    /// - `Err(PidConfigError::InvalidIntegralGain)` if the gain is negative or not finite.
    pub fn set_ki(&mut self, ki: F) -> Result<(), PidConfigError> {
        if !is_finite_non_negative(ki) {
            warn!("Rejected integral gain: must be finite and non-negative");
            return Err(PidConfigError::InvalidIntegralGain);
        }
        self.ki = ki;
        Ok(())
    }

    /// Sets the derivative gain.
    ///
    /// # Returns
    /// - `Ok(())` if the gain was set successfully.
    /// - `Err(PidConfigError::InvalidDerivativeGain)` if the gain is negative or not finite.
    pub fn set_kd(&mut self, kd: F) -> Result<(), PidConfigError> {
        if !is_finite_non_negative(kd) {
            warn!("Rejected derivative gain: must be finite and non-negative");
            return Err(PidConfigError::InvalidDerivativeGain);
        }
        self.kd = kd;
        Ok(())
    }

    /// Convenience method to set the proportional, integral, and derivative gains together.
    ///
    /// All three gains are validated before any is assigned, so a rejected call changes nothing.
    pub fn set_gains(&mut self, kp: F, ki: F, kd: F) -> Result<(), PidConfigError> {
        let mut staged = *self;
        staged.set_kp(kp)?;
        staged.set_ki(ki)?;
        staged.set_kd(kd)?;
        *self = staged;
        Ok(())
    }

    /// Sets the setpoint. Any value is accepted.
    pub fn set_setpoint(&mut self, setpoint: F) {
        self.setpoint = setpoint;
    }

    /// Sets the minimum elapsed time between effective updates.
    ///
    /// Updates arriving sooner than `sample_time` after the last effective update return the
    /// previous output unchanged. Pass `None` to disable throttling altogether; a sample time of
    /// zero is accepted and has the same effect.
    ///
    /// # Returns
    /// - `Ok(())` if the sample time was set successfully.
    /// - `Err(PidConfigError::InvalidSampleTime)` if the sample time is negative or not finite.
    pub fn set_sample_time(&mut self, sample_time: Option<F>) -> Result<(), PidConfigError> {
        if sample_time.map_or(false, |ts| !is_finite_non_negative(ts)) {
            warn!("Rejected sample time: must be finite and non-negative");
            return Err(PidConfigError::InvalidSampleTime);
        }
        self.sample_time = sample_time;
        Ok(())
    }

    /// Sets the lower and upper output limits.
    ///
    /// Either limit may be `None` (or infinite) to leave that side unbounded. The same limits bound
    /// the integral term to prevent reset windup.
    ///
    /// Note that a bare `PidConfig` does not know about the integral accumulated in a
    /// [`PidContext`]. Change limits through [`PidController::config_mut`] or
    /// [`PidController::set_output_limits`], or call [`FuncPidController::clamp_integral`]
    /// afterwards, to bring the integral within the new limits immediately.
    ///
    /// # Returns
    /// - `Ok(())` if the limits were set successfully.
    /// - `Err(PidConfigError::InvalidOutputLimits)` if either limit is NaN, or the lower limit
    ///   is greater than or equal to the upper limit.
    pub fn set_output_limits(
        &mut self,
        output_min: Option<F>,
        output_max: Option<F>,
    ) -> Result<(), PidConfigError> {
        if !are_valid_limits(output_min, output_max) {
            warn!("Rejected output limits: must not be NaN and lower must be below upper");
            return Err(PidConfigError::InvalidOutputLimits);
        }
        self.output_min = output_min;
        self.output_max = output_max;
        Ok(())
    }

    /// Sets whether to compute the proportional term on the measurement.
    pub fn set_proportional_on_measurement(&mut self, proportional_on_measurement: bool) {
        self.proportional_on_measurement = proportional_on_measurement;
    }

    /// Sets whether to compute the derivative term on the measurement.
    pub fn set_differential_on_measurement(&mut self, differential_on_measurement: bool) {
        self.differential_on_measurement = differential_on_measurement;
    }

    /// Sets or clears the error map. The map should be a pure function.
    pub fn set_error_map(&mut self, error_map: Option<fn(F) -> F>) {
        self.error_map = error_map;
    }

    fn clamp_to_limits(&self, value: F) -> F {
        clamp(value, self.output_min, self.output_max)
    }
}

/// A builder for [`PidConfig`]. Values are validated all at once when `build` is called.
#[derive(Copy, Clone)]
pub struct PidConfigBuilder<F> {
    config: PidConfig<F>,
}

impl<F: FloatCore> Default for PidConfigBuilder<F> {
    fn default() -> Self {
        Self {
            config: PidConfig::default(),
        }
    }
}

impl<F: FloatCore> PidConfigBuilder<F> {
    /// Sets the proportional gain.
    pub fn kp(mut self, kp: F) -> Self {
        self.config.kp = kp;
        self
    }

    /// Sets the integral gain.
    pub fn ki(mut self, ki: F) -> Self {
        self.config.ki = ki;
        self
    }

    /// Sets the derivative gain.
    pub fn kd(mut self, kd: F) -> Self {
        self.config.kd = kd;
        self
    }

    /// Sets all three gains.
    pub fn gains(self, kp: F, ki: F, kd: F) -> Self {
        self.kp(kp).ki(ki).kd(kd)
    }

    /// Sets the setpoint.
    pub fn setpoint(mut self, setpoint: F) -> Self {
        self.config.setpoint = setpoint;
        self
    }

    /// Sets the sample time in seconds.
    pub fn sample_time(mut self, sample_time: F) -> Self {
        self.config.sample_time = Some(sample_time);
        self
    }

    /// Disables sample time throttling.
    pub fn without_sample_time(mut self) -> Self {
        self.config.sample_time = None;
        self
    }

    /// Sets both output limits.
    pub fn output_limits(mut self, output_min: F, output_max: F) -> Self {
        self.config.output_min = Some(output_min);
        self.config.output_max = Some(output_max);
        self
    }

    /// Sets only the lower output limit.
    pub fn output_min(mut self, output_min: F) -> Self {
        self.config.output_min = Some(output_min);
        self
    }

    /// Sets only the upper output limit.
    pub fn output_max(mut self, output_max: F) -> Self {
        self.config.output_max = Some(output_max);
        self
    }

    /// Sets whether to compute the proportional term on the measurement.
    pub fn proportional_on_measurement(mut self, enabled: bool) -> Self {
        self.config.proportional_on_measurement = enabled;
        self
    }

    /// Sets whether to compute the derivative term on the measurement.
    pub fn differential_on_measurement(mut self, enabled: bool) -> Self {
        self.config.differential_on_measurement = enabled;
        self
    }

    /// Sets the error map.
    pub fn error_map(mut self, error_map: fn(F) -> F) -> Self {
        self.config.error_map = Some(error_map);
        self
    }

    /// Validates the accumulated values and returns the configuration, or the error for the first
    /// invalid value in the order kp, ki, kd, sample time, output limits.
    pub fn build(self) -> Result<PidConfig<F>, PidConfigError> {
        let raw = self.config;
        let mut config = raw;
        config.set_kp(raw.kp)?;
        config.set_ki(raw.ki)?;
        config.set_kd(raw.kd)?;
        config.set_sample_time(raw.sample_time)?;
        config.set_output_limits(raw.output_min, raw.output_max)?;
        Ok(config)
    }
}

/// Wraps an angular error, in radians, into `[-π, π)`.
///
/// Intended as an error map for heading or joint-angle control, so that the controller always
/// turns the short way round:
///
/// ```rust
/// use feedback_pid::pid::{wrap_angle, PidConfigBuilder};
///
/// let config = PidConfigBuilder::default()
///     .kp(0.8)
///     .error_map(wrap_angle::<f64>)
///     .build()
///     .expect("Invalid PID config");
/// assert!(config.error_map().is_some());
/// ```
pub fn wrap_angle<F: FloatCore + FloatConst>(angle: F) -> F {
    let two_pi = F::PI() + F::PI();
    let shifted = (angle + F::PI()) % two_pi;
    if shifted < F::zero() {
        shifted + two_pi - F::PI()
    } else {
        shifted - F::PI()
    }
}

/// Whether the controller computes fresh outputs or holds the last one.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ControlMode {
    /// Updates return the last output unchanged and leave all state untouched
    Manual,
    /// Updates run the control law
    #[default]
    Auto,
}

/// The running state of a PID controller.
///
/// A freshly constructed context has never been updated: all `last_*` values are absent and all
/// terms are zero.
#[derive(Copy, Clone, PartialEq)]
pub struct PidContext<F> {
    proportional: F,
    integral: F,
    derivative: F,
    last_time: Option<F>,
    last_output: Option<F>,
    last_error: Option<F>,
    last_input: Option<F>,
    mode: ControlMode,
}

impl<F: FloatCore> Default for PidContext<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FloatCore> fmt::Debug for PidContext<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: F| value.to_f64();
        f.debug_struct("PidContext")
            .field("proportional", &show(self.proportional))
            .field("integral", &show(self.integral))
            .field("derivative", &show(self.derivative))
            .field("last_time", &self.last_time.and_then(show))
            .field("last_output", &self.last_output.and_then(show))
            .field("last_error", &self.last_error.and_then(show))
            .field("last_input", &self.last_input.and_then(show))
            .field("mode", &self.mode)
            .finish()
    }
}

impl<F: FloatCore> PidContext<F> {
    /// Creates a context in automatic mode that has never been updated
    pub fn new() -> Self {
        Self::with_mode(ControlMode::Auto)
    }

    /// Creates a context in the given mode that has never been updated
    pub fn with_mode(mode: ControlMode) -> Self {
        Self {
            proportional: F::zero(),
            integral: F::zero(),
            derivative: F::zero(),
            last_time: None,
            last_output: None,
            last_error: None,
            last_input: None,
            mode,
        }
    }

    /// Returns the last output, or `None` if no output has been computed since construction or
    /// the last reset
    pub fn output(&self) -> Option<F> {
        self.last_output
    }

    /// Returns the timestamp of the last effective update
    pub fn last_time(&self) -> Option<F> {
        self.last_time
    }

    /// Returns the (mapped) error seen by the last effective update
    pub fn last_error(&self) -> Option<F> {
        self.last_error
    }

    /// Returns the measurement seen by the last effective update
    pub fn last_input(&self) -> Option<F> {
        self.last_input
    }

    /// Returns the proportional term of the last effective update
    pub fn proportional(&self) -> F {
        self.proportional
    }

    /// Returns the accumulated integral term
    pub fn integral(&self) -> F {
        self.integral
    }

    /// Returns the derivative term of the last effective update
    pub fn derivative(&self) -> F {
        self.derivative
    }

    /// Returns the proportional, integral and derivative terms of the last effective update, for
    /// tuning and diagnostics
    pub fn components(&self) -> (F, F, F) {
        (self.proportional, self.integral, self.derivative)
    }

    /// Returns the current mode
    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Returns true in automatic mode
    pub fn is_auto(&self) -> bool {
        self.mode == ControlMode::Auto
    }

    /// Returns true once the controller has completed at least one effective update since
    /// construction or the last reset
    pub fn is_initialized(&self) -> bool {
        self.last_time.is_some()
    }

    /// Clears all running state back to "never updated". The mode is kept.
    pub fn reset(&mut self) {
        *self = Self::with_mode(self.mode);
    }
}

/// A functional implementation of a PID (Proportional-Integral-Derivative) controller.
///
/// This struct holds only the configuration. The running state lives in a [`PidContext`] that is
/// passed into and returned from every call to `compute`, which makes `compute` a pure function
/// of its arguments.
pub struct FuncPidController<F> {
    config: PidConfig<F>,
}

impl<F: FloatCore> FuncPidController<F> {
    /// Creates a functional controller with the given configuration
    pub fn new(config: PidConfig<F>) -> Self {
        FuncPidController { config }
    }

    /// Returns the configuration
    pub fn config(&self) -> &PidConfig<F> {
        &self.config
    }

    /// Returns the configuration for in-place changes. Changing the output limits this way does
    /// not touch any context; see [`FuncPidController::clamp_integral`].
    pub fn config_mut(&mut self) -> &mut PidConfig<F> {
        &mut self.config
    }

    /// Runs one step of the control law.
    ///
    /// # Arguments
    /// - `ctx`: The running state.
    /// - `measurement`: The current measured value of the process variable.
    /// - `now`: The current time in seconds, recorded as the timestamp of this update.
    /// - `dt`: An explicit elapsed time in seconds. If `None`, the elapsed time is `now` minus the
    ///   timestamp of the last effective update, or a negligible epsilon on the first update.
    ///
    /// # Returns
    /// The output and the updated context. The context is returned unchanged, together with the
    /// previous output, when
    /// - the controller is in manual mode,
    /// - the elapsed time is zero, negative or NaN,
    /// - the elapsed time is shorter than the sample time and a previous output exists.
    pub fn compute(
        &self,
        mut ctx: PidContext<F>,
        measurement: F,
        now: F,
        dt: Option<F>,
    ) -> (Option<F>, PidContext<F>) {
        if !ctx.is_auto() {
            return (ctx.last_output, ctx);
        }

        let dt = match (dt, ctx.last_time) {
            (Some(dt), _) => dt,
            (None, Some(last_time)) => now - last_time,
            (None, None) => num_traits::cast(FIRST_UPDATE_DT).unwrap_or_else(F::epsilon),
        };

        // Also rejects NaN
        if !(dt > F::zero()) {
            trace!("Skipping PID update: elapsed time is not positive");
            return (ctx.last_output, ctx);
        }

        if let (Some(sample_time), Some(_)) = (self.config.sample_time, ctx.last_output) {
            if dt < sample_time {
                trace!("Skipping PID update: sample time has not elapsed");
                return (ctx.last_output, ctx);
            }
        }

        let raw_error = self.config.setpoint - measurement;
        let error = match self.config.error_map {
            Some(map) => map(raw_error),
            None => raw_error,
        };

        let d_input = ctx
            .last_input
            .map_or(F::zero(), |last_input| measurement - last_input);
        let d_error = ctx
            .last_error
            .map_or(F::zero(), |last_error| error - last_error);

        ctx.proportional = if self.config.proportional_on_measurement {
            ctx.proportional - self.config.kp * d_input
        } else {
            self.config.kp * error
        };

        // Clamp i-term to prevent windup
        ctx.integral = self
            .config
            .clamp_to_limits(ctx.integral + self.config.ki * error * dt);

        // Optional derivative on measurement to mitigate derivative kick
        ctx.derivative = if dt <= F::zero() {
            F::zero()
        } else if self.config.differential_on_measurement {
            -self.config.kd * d_input / dt
        } else {
            self.config.kd * d_error / dt
        };

        let output = self
            .config
            .clamp_to_limits(ctx.proportional + ctx.integral + ctx.derivative);

        ctx.last_output = Some(output);
        ctx.last_input = Some(measurement);
        ctx.last_error = Some(error);
        ctx.last_time = Some(now);
        (Some(output), ctx)
    }

    /// Switches between automatic and manual mode.
    ///
    /// Switching from manual to automatic resets the context and seeds the integral term with
    /// `last_output` (zero if `None`), clamped to the output limits, so that the first automatic
    /// update continues from the actuator's current position. Switching from automatic to manual
    /// only changes the mode. Requesting the current mode does nothing.
    pub fn set_auto_mode(
        &self,
        mut ctx: PidContext<F>,
        enabled: bool,
        last_output: Option<F>,
    ) -> PidContext<F> {
        match (ctx.mode, enabled) {
            (ControlMode::Manual, true) => {
                ctx.reset();
                ctx.integral = self
                    .config
                    .clamp_to_limits(last_output.unwrap_or_else(F::zero));
                ctx.mode = ControlMode::Auto;
                debug!("PID switched to automatic mode");
            }
            (ControlMode::Auto, false) => {
                ctx.mode = ControlMode::Manual;
                debug!("PID switched to manual mode");
            }
            _ => {}
        }
        ctx
    }

    /// Brings the integral term of `ctx` within the current output limits. Call this after
    /// changing the limits through [`FuncPidController::config_mut`].
    pub fn clamp_integral(&self, mut ctx: PidContext<F>) -> PidContext<F> {
        ctx.integral = self.config.clamp_to_limits(ctx.integral);
        ctx
    }
}

/// A stateful implementation of a PID (Proportional-Integral-Derivative) controller.
///
/// This struct owns its [`PidContext`] and an injected [`TimeSource`], and forwards every update
/// to a [`FuncPidController`]. It is a plain value with no internal locking: drive it from a
/// single control loop, or wrap it in a mutex to share it across threads.
pub struct PidController<F, T> {
    ctx: PidContext<F>,
    controller: FuncPidController<F>,
    time_source: T,
}

/// Mutable access to the configuration of a [`PidController`].
///
/// When the guard is dropped, the integral term is clamped into the (possibly changed) output
/// limits, so the anti-windup invariant holds as soon as the reconfiguration ends.
pub struct ConfigMut<'a, F: FloatCore> {
    config: &'a mut PidConfig<F>,
    ctx: &'a mut PidContext<F>,
}

impl<F: FloatCore> Deref for ConfigMut<'_, F> {
    type Target = PidConfig<F>;

    fn deref(&self) -> &Self::Target {
        self.config
    }
}

impl<F: FloatCore> DerefMut for ConfigMut<'_, F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.config
    }
}

impl<F: FloatCore> Drop for ConfigMut<'_, F> {
    fn drop(&mut self) {
        self.ctx.integral = self.config.clamp_to_limits(self.ctx.integral);
    }
}

impl<F: FloatCore, T: TimeSource<F>> PidController<F, T> {
    /// Creates a controller in automatic mode.
    ///
    /// # Arguments
    /// - `config`: The PID configuration.
    /// - `time_source`: Consulted once per automatic update for the current time in seconds.
    pub fn new(config: PidConfig<F>, time_source: T) -> Self {
        Self::with_mode(config, time_source, ControlMode::Auto)
    }

    /// Creates a controller starting in the given mode.
    pub fn with_mode(config: PidConfig<F>, time_source: T, mode: ControlMode) -> Self {
        Self {
            ctx: PidContext::with_mode(mode),
            controller: FuncPidController::new(config),
            time_source,
        }
    }

    /// Returns the configuration
    pub fn config(&self) -> &PidConfig<F> {
        &self.controller.config
    }

    /// Returns a guard for changing the configuration in place. The integral term is re-clamped to
    /// the output limits when the guard is dropped.
    pub fn config_mut(&mut self) -> ConfigMut<'_, F> {
        ConfigMut {
            config: &mut self.controller.config,
            ctx: &mut self.ctx,
        }
    }

    /// Sets the setpoint.
    pub fn set_setpoint(&mut self, setpoint: F) {
        self.controller.config.set_setpoint(setpoint);
    }

    /// Sets the output limits and immediately clamps the integral term into them. The last output
    /// is left as it was.
    pub fn set_output_limits(
        &mut self,
        output_min: Option<F>,
        output_max: Option<F>,
    ) -> Result<(), PidConfigError> {
        self.config_mut().set_output_limits(output_min, output_max)
    }

    /// Feeds a new measurement to the controller.
    ///
    /// See [`FuncPidController::compute`] for the handling of `dt` and the cases in which the
    /// previous output is returned unchanged. The time source is not consulted in manual mode.
    pub fn update(&mut self, measurement: F, dt: Option<F>) -> Option<F> {
        if !self.ctx.is_auto() {
            return self.ctx.last_output;
        }
        let now = self.time_source.now();
        let (output, ctx) = self.controller.compute(self.ctx, measurement, now, dt);
        self.ctx = ctx;
        output
    }

    /// Clears all running state back to "never updated". The configuration and mode are kept.
    pub fn reset(&mut self) {
        self.ctx.reset();
        debug!("PID state reset");
    }

    /// Switches between automatic and manual mode. See [`FuncPidController::set_auto_mode`].
    pub fn set_auto_mode(&mut self, enabled: bool, last_output: Option<F>) {
        self.ctx = self
            .controller
            .set_auto_mode(self.ctx, enabled, last_output);
    }

    /// Switches mode without seeding the integral term.
    pub fn set_mode(&mut self, mode: ControlMode) {
        self.set_auto_mode(mode == ControlMode::Auto, None);
    }

    /// Returns the current mode
    pub fn mode(&self) -> ControlMode {
        self.ctx.mode()
    }

    /// Returns true in automatic mode
    pub fn is_auto(&self) -> bool {
        self.ctx.is_auto()
    }

    /// Returns true once an effective update has happened since construction or the last reset
    pub fn is_initialized(&self) -> bool {
        self.ctx.is_initialized()
    }

    /// Returns the last output, if any
    pub fn output(&self) -> Option<F> {
        self.ctx.output()
    }

    /// Returns the timestamp of the last effective update
    pub fn last_time(&self) -> Option<F> {
        self.ctx.last_time()
    }

    /// Returns the (mapped) error seen by the last effective update
    pub fn last_error(&self) -> Option<F> {
        self.ctx.last_error()
    }

    /// Returns the measurement seen by the last effective update
    pub fn last_input(&self) -> Option<F> {
        self.ctx.last_input()
    }

    /// Returns the proportional, integral and derivative terms of the last effective update.
    pub fn components(&self) -> (F, F, F) {
        self.ctx.components()
    }

    /// Returns a copy of the running state, e.g. to hand over to a [`FuncPidController`].
    pub fn context(&self) -> PidContext<F> {
        self.ctx
    }

    /// Returns the time source
    pub fn time_source(&self) -> &T {
        &self.time_source
    }

    /// Consumes the controller, returning its configuration, running state and time source.
    pub fn into_parts(self) -> (PidConfig<F>, PidContext<F>, T) {
        (self.controller.config, self.ctx, self.time_source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_treats_absent_bounds_as_unbounded() {
        assert_eq!(clamp(5.0, None, None), 5.0);
        assert_eq!(clamp(5.0, Some(6.0), None), 6.0);
        assert_eq!(clamp(5.0, None, Some(4.0)), 4.0);
        assert_eq!(clamp(-5.0, Some(-1.0), Some(1.0)), -1.0);
        assert_eq!(clamp(0.5, Some(-1.0), Some(1.0)), 0.5);
    }

    #[test]
    fn test_limit_validation() {
        assert!(are_valid_limits::<f64>(None, None));
        assert!(are_valid_limits(Some(-1.0), None));
        assert!(are_valid_limits(None, Some(-1.0)));
        assert!(are_valid_limits(Some(f64::NEG_INFINITY), Some(f64::INFINITY)));
        assert!(!are_valid_limits(Some(1.0), Some(1.0)));
        assert!(!are_valid_limits(Some(f64::NAN), None));
        assert!(!are_valid_limits(None, Some(f64::NAN)));
    }

    #[test]
    fn test_default_config_matches_documentation() {
        let config = PidConfig::<f64>::default();
        assert_eq!(config.gains(), (1.0, 0.0, 0.0));
        assert_eq!(config.setpoint(), 0.0);
        assert_eq!(config.sample_time(), Some(0.01));
        assert_eq!(config.output_limits(), (None, None));
        assert!(!config.proportional_on_measurement());
        assert!(config.differential_on_measurement());
        assert!(config.error_map().is_none());
    }

    #[test]
    fn test_context_reset_keeps_mode() {
        let pid = FuncPidController::new(PidConfig::<f64>::default());
        let ctx = PidContext::with_mode(ControlMode::Auto);
        let (_, ctx) = pid.compute(ctx, 1.0, 0.0, None);
        let mut ctx = pid.set_auto_mode(ctx, false, None);
        assert!(ctx.is_initialized());

        ctx.reset();
        assert!(!ctx.is_initialized());
        assert_eq!(ctx.mode(), ControlMode::Manual);
        assert_eq!(ctx, PidContext::with_mode(ControlMode::Manual));
    }
}
