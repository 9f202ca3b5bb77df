//! Step response of a mass-spring-damper system under PID control, printed as CSV
//! This example requires the `--features simulation` flag to be enabled.
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

use nalgebra as na;

use feedback_pid::{
    pid::{PidConfigBuilder, PidController},
    sim::{self, SignalGenerator},
    time::ManualClock,
};

const FIXED_STEP_SIZE_S: f64 = 0.01;

pub fn main() {
    let cfg = PidConfigBuilder::default()
        .kp(10.0)
        .ki(25.0)
        .kd(1.0)
        .output_limits(-5.0, 5.0)
        .build()
        .expect("Invalid PID config");

    let clock = ManualClock::new(0.0);
    let mut pid = PidController::new(cfg, &clock);

    let mdl = sim::MassSpringDamper {
        natural_frequency: 0.5 * std::f64::consts::PI,
        damping_ratio: 0.2,
    };

    let mut state = na::Vector2::<f64>::zeros();
    let mut output: f64 = 0.0;

    let square = SignalGenerator::new(sim::WaveForm::Square, 0.0, 0.5, 0.5);

    println!("time,setpoint,output,control,p,i,d");
    for _ in 0..1000usize {
        clock.advance(FIXED_STEP_SIZE_S);
        let now = clock.get();

        let setpoint = square.generate(now);
        pid.set_setpoint(setpoint);
        let control = pid.update(output, None).unwrap_or(0.0);
        let (p, i, d) = pid.components();

        state = sim::rk4_step(|x| mdl.f(x, control), state, FIXED_STEP_SIZE_S);
        output = mdl.h(state);

        println!("{now:.2},{setpoint},{output:.6},{control:.6},{p:.6},{i:.6},{d:.6}");
    }
}
