use rand::SeedableRng;
use rand::rngs::SmallRng;

use super::bits;
use super::font::{FONT, FONT_START_ADDRESS};
use super::opcode::Op;
use super::types::{Chip8Error, DISPLAY_X, DISPLAY_Y, FrameBuffer};

// Fixed by the CHIP-8 machine model.
pub(crate) const MEMORY_SIZE: usize = 4096;
pub(crate) const ROM_START_ADDRESS: usize = 0x200;
pub(crate) const STACK_DEPTH: usize = 16;

/// CHIP-8 machine state.
///
/// All interpreter state lives here and is mutated only by the instruction
/// routines and [`Chip8::step`]. The struct is single-threaded by design; a
/// multi-threaded host has to serialize access externally.
pub struct Chip8 {
    /// 4KB address space, font at 0x000, ROM from 0x200.
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Framebuffer, one byte per pixel, linear `y * 64 + x` layout.
    pub(crate) vram: FrameBuffer,

    /// Program counter.
    pub(crate) pc: u16,
    /// Index register.
    pub(crate) i: u16,
    /// General registers V0-VF. VF doubles as the carry/borrow/collision
    /// flag but stays addressable like any other register.
    pub(crate) v: [u8; 16],
    /// Return addresses, push on call / pop on return, at most 16 deep.
    pub(crate) stack: Vec<u16>,

    /// Decrements once per step until it reaches 0.
    pub(crate) delay_timer: u8,
    /// Decrements once per step; the host beeps while it is nonzero.
    pub(crate) sound_timer: u8,

    /// Keypad state, true = pressed.
    pub(crate) keypad: [bool; 16],
    /// Set by FX0A when no key is down; cleared by the next key-down.
    pub(crate) halted: bool,
    /// The most recently fetched instruction word.
    pub(crate) opcode: u16,

    /// Source for the CXNN random draw, injectable for deterministic tests.
    pub(crate) rng: SmallRng,
}

impl Chip8 {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_os_rng())
    }

    /// Creates a machine with a caller-provided random source.
    pub fn with_rng(rng: SmallRng) -> Self {
        let mut memory = [0; MEMORY_SIZE];
        memory[FONT_START_ADDRESS..FONT_START_ADDRESS + FONT.len()].copy_from_slice(&FONT);

        Chip8 {
            memory,
            vram: [0; DISPLAY_X * DISPLAY_Y],
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: Vec::new(),
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; 16],
            halted: false,
            opcode: 0,
            rng,
        }
    }

    /// Copies a ROM image into memory at 0x200 and rewinds the program
    /// counter to it.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), Chip8Error> {
        let rom_end = ROM_START_ADDRESS + rom.len();
        self.memory
            .get_mut(ROM_START_ADDRESS..rom_end)
            .ok_or(Chip8Error::RomTooLarge {
                size: rom.len(),
                max_size: MEMORY_SIZE - ROM_START_ADDRESS,
            })?
            .copy_from_slice(rom);

        self.pc = ROM_START_ADDRESS as u16;

        Ok(())
    }

    /// Executes one cycle: fetch, decode, execute, then tick both timers.
    ///
    /// While the machine is halted on FX0A this does nothing at all, timers
    /// included; `handle_key_event` lifts the halt. Timers tick once per
    /// call, so the host's step cadence is also the timer cadence (60 Hz
    /// being the canonical rate).
    pub fn step(&mut self) -> Result<(), Chip8Error> {
        if self.halted {
            return Ok(());
        }

        let high = *self.mem_get(self.pc)?;
        let low = *self.mem_get(self.pc.wrapping_add(1))?;
        self.opcode = bits::combine_bytes(low, high);

        self.execute(Op::decode(self.opcode))?;

        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);

        Ok(())
    }

    /// Applies a key transition from the input collaborator.
    ///
    /// `key` is the logical keypad code 0x0-0xF; anything above that range is
    /// a host-level signal (quit and friends) and is ignored here. A key-down
    /// also wakes a machine blocked on FX0A.
    pub fn handle_key_event(&mut self, key: u8, is_up: bool) {
        let Some(slot) = self.keypad.get_mut(key as usize) else {
            return;
        };

        *slot = !is_up;
        if !is_up {
            self.halted = false;
        }
    }

    /// Read-only view of the framebuffer for the presentation collaborator.
    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.vram
    }

    /// True while the sound timer runs; the host gates its tone on this.
    pub fn should_beep(&self) -> bool {
        self.sound_timer > 0
    }

    pub(crate) fn mem_get(&mut self, addr: u16) -> Result<&mut u8, Chip8Error> {
        self.memory
            .get_mut(addr as usize)
            .ok_or(Chip8Error::MemoryOutOfBounds { address: addr })
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chip8_with_rom(rom: &[u8]) -> Chip8 {
        let mut chip8 = Chip8::with_rng(SmallRng::seed_from_u64(0x5EED));
        chip8.load_rom(rom).unwrap();
        chip8
    }

    #[test]
    fn loads_font_below_rom_area() {
        let chip8 = chip8_with_rom(&[]);
        // Glyph g lives at 5 * g; spot-check "0" and "F".
        assert_eq!(chip8.memory[0..5], [0xF0, 0x90, 0x90, 0x90, 0xF0]);
        assert_eq!(chip8.memory[0xF * 5..0xF * 5 + 5], [0xF0, 0x80, 0xF0, 0x80, 0x80]);
        assert_eq!(chip8.pc, 0x200);
    }

    #[test]
    fn rejects_oversized_rom() {
        let mut chip8 = Chip8::with_rng(SmallRng::seed_from_u64(0));
        let rom = vec![0; MEMORY_SIZE - ROM_START_ADDRESS + 1];
        assert!(matches!(
            chip8.load_rom(&rom),
            Err(Chip8Error::RomTooLarge { .. })
        ));
    }

    #[test]
    fn fetches_big_endian_words() {
        // 6A42: the byte at pc is the high byte of the instruction word.
        let mut chip8 = chip8_with_rom(&[0x6A, 0x42]);
        chip8.step().unwrap();
        assert_eq!(chip8.opcode, 0x6A42);
        assert_eq!(chip8.v[0xA], 0x42);
    }

    #[test]
    fn executes_add_program() {
        // V0 = 5, V1 = 3, V0 += V1
        let mut chip8 = chip8_with_rom(&[0x60, 0x05, 0x61, 0x03, 0x80, 0x14]);
        for _ in 0..3 {
            chip8.step().unwrap();
        }
        assert_eq!(chip8.v[0], 8);
        assert_eq!(chip8.v[0xF], 0);
        assert_eq!(chip8.pc, 0x206);
    }

    #[test]
    fn executes_overflowing_add_program() {
        // V0 = 255, V1 = 1, V0 += V1
        let mut chip8 = chip8_with_rom(&[0x60, 0xFF, 0x61, 0x01, 0x80, 0x14]);
        for _ in 0..3 {
            chip8.step().unwrap();
        }
        assert_eq!(chip8.v[0], 0);
        assert_eq!(chip8.v[0xF], 1);
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let mut chip8 = chip8_with_rom(&[0xFF, 0xFF]);
        assert!(matches!(
            chip8.step(),
            Err(Chip8Error::UnknownOpcode { opcode: 0xFFFF })
        ));
    }

    #[test]
    fn timers_tick_once_per_step_and_floor_at_zero() {
        let mut chip8 = chip8_with_rom(&[0x12, 0x00]); // jump-to-self
        chip8.delay_timer = 2;
        chip8.sound_timer = 1;

        chip8.step().unwrap();
        assert_eq!(chip8.delay_timer, 1);
        assert_eq!(chip8.sound_timer, 0);
        assert!(!chip8.should_beep());

        chip8.step().unwrap();
        chip8.step().unwrap();
        assert_eq!(chip8.delay_timer, 0);
        assert_eq!(chip8.sound_timer, 0);
    }

    #[test]
    fn beeps_while_sound_timer_runs() {
        let mut chip8 = chip8_with_rom(&[0x60, 0x05, 0xF0, 0x18]); // V0 = 5, sound = V0
        chip8.step().unwrap();
        chip8.step().unwrap();
        assert!(chip8.should_beep());
    }

    #[test]
    fn wait_key_halts_until_key_down() {
        let mut chip8 = chip8_with_rom(&[0xF3, 0x0A]);
        chip8.delay_timer = 5;

        chip8.step().unwrap();
        assert!(chip8.halted);
        assert_eq!(chip8.pc, 0x200);
        // The halting step itself still ticked the timers once.
        assert_eq!(chip8.delay_timer, 4);

        // Halted steps are complete no-ops.
        chip8.step().unwrap();
        chip8.step().unwrap();
        assert_eq!(chip8.pc, 0x200);
        assert_eq!(chip8.delay_timer, 4);

        // A key-up neither wakes the machine nor registers a key.
        chip8.handle_key_event(0x7, true);
        chip8.step().unwrap();
        assert!(chip8.halted);

        // Key-down wakes it; the re-executed FX0A sees the key.
        chip8.handle_key_event(0x7, false);
        assert!(!chip8.halted);
        chip8.step().unwrap();
        assert_eq!(chip8.v[3], 0x7);
        assert_eq!(chip8.pc, 0x202);
    }

    #[test]
    fn key_gate_tracks_keypad_state() {
        let mut chip8 = chip8_with_rom(&[]);

        chip8.handle_key_event(0x0, false);
        chip8.handle_key_event(0xF, false);
        assert!(chip8.keypad[0x0] && chip8.keypad[0xF]);

        chip8.handle_key_event(0xF, true);
        assert!(!chip8.keypad[0xF]);
    }

    #[test]
    fn key_gate_ignores_host_level_keys() {
        let mut chip8 = chip8_with_rom(&[0xF0, 0x0A]);
        chip8.step().unwrap();
        assert!(chip8.halted);

        // Out-of-range codes (quit etc.) must not touch the keypad or the halt.
        chip8.handle_key_event(0x10, false);
        chip8.handle_key_event(0xFF, false);
        assert!(chip8.halted);
        assert!(chip8.keypad.iter().all(|&k| !k));
    }

    #[test]
    fn framebuffer_view_matches_draw_output() {
        // I = 0 points at glyph "0" (0xF0 top row); draw one row at (0, 0).
        let mut chip8 = chip8_with_rom(&[0xA0, 0x00, 0xD0, 0x01]);
        chip8.step().unwrap();
        chip8.step().unwrap();

        let fb = chip8.framebuffer();
        assert!(fb[0] != 0 && fb[1] != 0 && fb[2] != 0 && fb[3] != 0);
        assert_eq!(fb[4], 0);
        assert_eq!(fb[DISPLAY_X], 0); // nothing on the second row
    }
}
