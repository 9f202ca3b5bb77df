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

#[cfg(feature = "simulation")]
mod fixtures;

#[cfg(feature = "simulation")]
mod test_pid_closed_loop_performance {
    use super::fixtures::test_pid::*;

    use feedback_pid::pid::*;
    use feedback_pid::sim;
    use feedback_pid::time::ManualClock;

    use approx::assert_abs_diff_eq;
    use nalgebra as na;

    const FIXED_STEP_SIZE_S: f64 = 0.01;

    /// A PID closing the loop around a lightly damped mass-spring-damper
    ///
    /// x'' + 2ζωₙx' + ωₙ²x = ωₙ²u,     ωₙ = 2π, ζ = 0.2
    ///
    /// must settle on a unit step with zero steady-state error thanks to the integral term.
    #[test]
    fn test_mass_spring_damper_step_response_settles() {
        let cfg = PidConfigBuilder::default()
            .gains(2.0, 4.0, 0.1)
            .setpoint(1.0)
            .build()
            .unwrap();
        let clock = ManualClock::new(0.0);
        let mut pid = make_configured_controller(cfg, &clock);

        let mdl = sim::MassSpringDamper {
            natural_frequency: 2.0 * std::f64::consts::PI,
            damping_ratio: 0.2,
        };

        let mut state = na::Vector2::<f64>::zeros();
        let mut output = 0.0;
        let mut peak = f64::NEG_INFINITY;

        for _ in 0..1000usize {
            clock.advance(FIXED_STEP_SIZE_S);
            let control = pid.update(output, None).unwrap();
            state = sim::rk4_step(|x| mdl.f(x, control), state, FIXED_STEP_SIZE_S);
            output = mdl.h(state);
            peak = peak.max(output);
        }

        assert_abs_diff_eq!(output, 1.0, epsilon = 1e-3);
        // Derivative on measurement keeps the overshoot moderate
        assert!(peak < 1.25, "Overshoot too large: {peak}");
    }

    /// A saturating heater warming a body from ambient temperature. The output limits bound both
    /// the heater command and the integral term, so the loop recovers from saturation and settles.
    #[test]
    fn test_thermal_regulation_recovers_from_saturation() {
        const AMBIENT: f64 = 20.0;
        const TARGET: f64 = 60.0;

        let cfg = PidConfigBuilder::default()
            .gains(5.0, 1.0, 0.0)
            .setpoint(TARGET)
            .output_limits(0.0, 100.0)
            .build()
            .unwrap();
        let clock = ManualClock::new(0.0);
        let mut pid = make_configured_controller(cfg, &clock);

        let mdl = sim::FirstOrderLag {
            time_constant: 5.0,
            gain: 1.0,
            ambient: AMBIENT,
        };

        let mut state = na::Vector1::new(AMBIENT);
        let mut saturated_steps = 0usize;

        for _ in 0..3000usize {
            clock.advance(FIXED_STEP_SIZE_S);
            let heater = pid.update(mdl.h(state), None).unwrap();
            assert!((0.0..=100.0).contains(&heater));

            let integral = pid.components().1;
            assert!((0.0..=100.0).contains(&integral));

            if heater == 100.0 {
                saturated_steps += 1;
            }
            state = sim::rk4_step(|x| mdl.f(x, heater), state, FIXED_STEP_SIZE_S);
        }

        assert!(saturated_steps > 0, "The heater should saturate at first");
        assert_abs_diff_eq!(mdl.h(state), TARGET, epsilon = 0.1);
        // Holding 60°C against 20°C ambient takes a steady 40 units of heat
        assert_abs_diff_eq!(pid.output().unwrap(), TARGET - AMBIENT, epsilon = 0.1);
    }

    /// Heading control of a rate-commanded vehicle. Without wrapping, a target of 3 rad seen from
    /// -3 rad would be chased the long way round; the error map makes the controller turn through
    /// ±π instead.
    #[test]
    fn test_heading_hold_takes_the_short_way_round() {
        let cfg = PidConfigBuilder::default()
            .kp(2.0)
            .setpoint(3.0)
            .error_map(wrap_angle::<f64>)
            .build()
            .unwrap();
        let clock = ManualClock::new(0.0);
        let mut pid = make_configured_controller(cfg, &clock);

        let mut heading = -3.0;
        let mut first_command = None;

        for _ in 0..500usize {
            clock.advance(FIXED_STEP_SIZE_S);
            let rate = pid.update(heading, None).unwrap();
            first_command.get_or_insert(rate);
            heading += rate * FIXED_STEP_SIZE_S;
        }

        assert!(first_command.unwrap() < 0.0);
        assert!(heading < -std::f64::consts::PI);
        assert_abs_diff_eq!(wrap_angle(heading - 3.0), 0.0, epsilon = 1e-3);
    }

    /// The stateful PID controller behaves the same as the functional PID controller numerically in
    /// closed loop
    #[test]
    fn test_forwarding_to_stateful_pid_closed_loop_numerical_equivalence() {
        let (mut func_pid, mut ctx) = make_controller();
        assert!(func_pid.config_mut().set_gains(10.0, 20.0, 0.05).is_ok());
        assert!(func_pid
            .config_mut()
            .set_output_limits(Some(-50.0), Some(50.0))
            .is_ok());

        let clock = ManualClock::new(0.0);
        let mut stateful_pid = make_configured_controller(*func_pid.config(), &clock);

        let mdl = sim::MassSpringDamper {
            natural_frequency: 2.0 * std::f64::consts::PI,
            damping_ratio: 0.2,
        };
        let sine = sim::SignalGenerator::new(sim::WaveForm::Sine, 0.0, 1.0, 0.0);

        let mut state = na::vector![0.0, 0.0];
        let mut expected: Option<f64>;
        let mut output: f64 = 0.0;
        let mut now = 0.0;

        for _ in 0..1000usize {
            let setpoint = sine.generate(now);
            now += FIXED_STEP_SIZE_S;
            clock.set(now);

            func_pid.config_mut().set_setpoint(setpoint);
            stateful_pid.set_setpoint(setpoint);

            (expected, ctx) = func_pid.compute(ctx, output, now, None);
            let result = stateful_pid.update(output, None);
            assert_eq!(result, expected);

            let control = expected.unwrap();
            state += mdl.f(state, control) * FIXED_STEP_SIZE_S;
            output = mdl.h(state);
        }
    }

    #[test]
    fn test_signal_generator_waveforms() {
        let sine = sim::SignalGenerator::new(sim::WaveForm::Sine, 1.0, 2.0, 0.5);
        assert_abs_diff_eq!(sine.generate(1.0), 0.5);
        assert_abs_diff_eq!(
            sine.generate(1.0 + std::f64::consts::FRAC_PI_2),
            2.5,
            epsilon = 1e-12
        );

        let square = sim::SignalGenerator::new(sim::WaveForm::Square, 0.0, 0.5, 0.5);
        assert_eq!(square.generate(1.0), 1.0);
        assert_eq!(square.generate(4.0), 0.0);
    }
}
