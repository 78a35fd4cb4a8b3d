use super::chip8::Chip8;
use super::types::{Chip8Error, FrameBuffer};

/// Canonical step cadence. Timers tick once per step, so 60 Hz keeps them at
/// the rate CHIP-8 software was written against.
pub const DEFAULT_STEP_HZ: f32 = 60.0;

/// Paces a [`Chip8`] against wall-clock time for a windowed host.
///
/// The core itself takes no notion of time; this wrapper turns frame delta
/// times into the right number of `step` calls.
pub struct Runner {
    chip8: Chip8,
    step_period: f32,
    dt_accumulator: f32,
}

impl Runner {
    pub fn new(chip8: Chip8, step_hz: f32) -> Self {
        Self {
            chip8,
            step_period: 1.0 / step_hz,
            dt_accumulator: 0.0,
        }
    }

    /// Advances the machine by `dt` seconds, running as many steps as that
    /// much time covers. The first core error aborts the remainder.
    pub fn update(&mut self, dt: f32) -> Result<(), Chip8Error> {
        self.dt_accumulator += dt;

        while self.dt_accumulator >= self.step_period {
            self.dt_accumulator -= self.step_period;
            self.chip8.step()?;
        }

        Ok(())
    }

    pub fn handle_key_event(&mut self, key: u8, is_up: bool) {
        self.chip8.handle_key_event(key, is_up);
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        self.chip8.framebuffer()
    }

    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn update_runs_steps_covered_by_elapsed_time() {
        let mut chip8 = Chip8::with_rng(SmallRng::seed_from_u64(0));
        chip8.load_rom(&[0x12, 0x00]).unwrap(); // jump-to-self
        chip8.delay_timer = 10;

        let mut runner = Runner::new(chip8, 60.0);
        runner.update(3.5 / 60.0).unwrap();

        // 3 whole step periods elapsed; the fraction stays accumulated.
        assert_eq!(runner.chip8.delay_timer, 7);

        runner.update(0.6 / 60.0).unwrap();
        assert_eq!(runner.chip8.delay_timer, 6);
    }
}
