//! Heading hold through the angle-wrapping error map, with a manual-mode override midway
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

use feedback_pid::pid::{wrap_angle, PidConfigBuilder, PidController};
use feedback_pid::time::ManualClock;

const FIXED_STEP_SIZE_S: f64 = 0.02;
const MAX_TURN_RATE: f64 = 1.0; // rad/s

fn main() {
    let cfg = PidConfigBuilder::default()
        .gains(1.5, 0.2, 0.05)
        .setpoint(3.0)
        .output_limits(-MAX_TURN_RATE, MAX_TURN_RATE)
        .error_map(wrap_angle::<f64>)
        .build()
        .expect("Invalid PID config");

    let clock = ManualClock::new(0.0);
    let mut pid = PidController::new(cfg, &clock);

    let mut heading: f64 = -3.0;

    println!("time,heading,turn_rate,auto");
    for step in 0..600usize {
        clock.advance(FIXED_STEP_SIZE_S);

        // An operator takes the helm for two seconds, then hands back at the current turn rate
        if step == 200 {
            pid.set_auto_mode(false, None);
        }
        let manual_rate = 0.3;
        if step == 300 {
            pid.set_auto_mode(true, Some(manual_rate));
        }

        let turn_rate = if pid.is_auto() {
            pid.update(heading, None).unwrap_or(0.0)
        } else {
            manual_rate
        };

        heading = wrap_angle(heading + turn_rate * FIXED_STEP_SIZE_S);
        println!(
            "{:.2},{heading:.5},{turn_rate:.5},{}",
            clock.get(),
            pid.is_auto()
        );
    }
}
