//! Datatrak LF navigation-signal generator.
//!
//! Synthesises one full navigation cycle at a time, one millisecond per
//! sample, across a preamble (anti-aliasing windows, Gold-code trigger,
//! clock dibit burst), eight phase-rotating navigation slots on F1, eight
//! more on F2, and guard intervals.

/// Phase measurement zero level.
pub const PHASE_ZERO: i32 = 499;
/// Peak phase swing around [`PHASE_ZERO`].
pub const PHASE_AMPL: i32 = 499;
/// RSSI minimum (transmitter off).
pub const RSSI_MIN: u8 = 1;
/// RSSI maximum (full power).
pub const RSSI_MAX: u8 = 255;

/// Buffer length reserved for the largest supported cycle variant
/// (the 24-slot interlaced mode, not itself implemented).
pub const BUF_LEN: usize = 1680;

/// Datatrak Gold code, sent once per cycle during the trigger window. The
/// word order looks backwards (mk2 expects the null byte in the middle, not
/// at the end of transmission) — that may be a firmware bug, but it is kept
/// exactly as the firmware transmits it.
const GOLDCODE: [u32; 2] = [0xFA9B8700, 0xAE32BD97];

const DT_TRIG50_TEMPLATE: [i32; 40] = [
    54, 124, 181, 218, 232, 221, 185, 129, 59, -21, -99, -169, -223, -257, -265, -250, -210, -150,
    -76, 6, 87, 159, 215, 249, 260, 245, 206, 147, 74, -8, -89, -160, -216, -251, -261, -245,
    -207, -148, -74, 8,
];

const DT_TRIG375_TEMPLATE: [i32; 40] = [
    -43, -98, -144, -181, -203, -212, -204, -183, -149, -106, -53, 4, 62, 118, 168, 210, 240, 258,
    263, 253, 229, 193, 147, 93, 33, -28, -88, -143, -189, -225, -248, -258, -254, -236, -204,
    -162, -110, -53, 9, 69,
];

/// Rescale firmware reference amplitude `v` by 1.73 and offset by
/// `PHASE_ZERO`, truncating toward zero exactly as the original `trunc()`
/// call does, so the result is deterministic without depending on platform
/// floating-point rounding.
fn rescale(v: i32) -> u16 {
    let scaled = (v * 173) / 100; // trunc(v * 1.73)
    (scaled + PHASE_ZERO) as u16
}

/// Generator operating mode. Only [`DatatrakMode::EightSlot`] is
/// implemented; [`DatatrakMode::Interlaced`] is accepted as a recognised
/// variant but rejected at construction, mirroring the firmware's
/// `assert(1==0)` on unsupported modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatatrakMode {
    EightSlot,
    Interlaced,
}

/// One synthesised navigation cycle.
#[derive(Debug, Clone)]
pub struct Frame {
    pub f1_phase: Vec<u16>,
    pub f2_phase: Vec<u16>,
    pub f1_amplitude: Vec<u8>,
    pub f2_amplitude: Vec<u8>,
}

impl Frame {
    /// Builds a frame holding `len` samples (the active cycle length), but
    /// reserves at least [`BUF_LEN`] of backing capacity up front so a
    /// future interlaced 24-slot cycle would not need to reallocate.
    fn new(len: usize) -> Self {
        let capacity = len.max(BUF_LEN);
        let mut f1_phase = Vec::with_capacity(capacity);
        f1_phase.resize(len, PHASE_ZERO as u16);
        let mut f2_phase = Vec::with_capacity(capacity);
        f2_phase.resize(len, PHASE_ZERO as u16);
        let mut f1_amplitude = Vec::with_capacity(capacity);
        f1_amplitude.resize(len, RSSI_MIN);
        let mut f2_amplitude = Vec::with_capacity(capacity);
        f2_amplitude.resize(len, RSSI_MIN);
        Self {
            f1_phase,
            f2_phase,
            f1_amplitude,
            f2_amplitude,
        }
    }
}

/// Per-slot configuration reserved for a future navigation-fix feature; the
/// eight-slot generator only consults `slot_phase_offset` today.
#[derive(Debug, Clone)]
pub struct SlotConfig {
    pub slot_phase_offset: [u16; 24],
    pub slot_power: [u8; 24],
    pub trig1_power: u8,
    pub trig2_power: u8,
    pub rf_noise_level: u8,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            slot_phase_offset: [PHASE_ZERO as u16; 24],
            slot_power: [RSSI_MAX; 24],
            trig1_power: RSSI_MAX,
            trig2_power: RSSI_MAX,
            rf_noise_level: 0,
        }
    }
}

/// Datatrak LF signal generator, producing one [`Frame`] per navigation
/// cycle.
pub struct DatatrakGenerator {
    num_navslots_per_cycle: usize,
    ms_per_cycle: usize,
    goldcode_n: u32,
    clock_n: u32,
    trig50_template: [u16; 40],
    trig375_template: [u16; 40],
    pub slots: SlotConfig,
}

impl DatatrakGenerator {
    /// Create a new generator. Only [`DatatrakMode::EightSlot`] is
    /// supported; any other mode is an error.
    pub fn new(mode: DatatrakMode) -> Result<Self, crate::error::MachineError> {
        if mode != DatatrakMode::EightSlot {
            return Err(crate::error::MachineError::UnsupportedMode(mode));
        }

        let num_navslots_per_cycle = 8;
        let ms_per_cycle = 340 + num_navslots_per_cycle * 80 + 40 + num_navslots_per_cycle * 80 + 20;

        let mut trig50_template = [0u16; 40];
        let mut trig375_template = [0u16; 40];
        for i in 0..40 {
            trig50_template[i] = rescale(DT_TRIG50_TEMPLATE[i]);
            trig375_template[i] = rescale(DT_TRIG375_TEMPLATE[i]);
        }

        Ok(Self {
            num_navslots_per_cycle,
            ms_per_cycle,
            goldcode_n: 0,
            clock_n: 12345,
            trig50_template,
            trig375_template,
            slots: SlotConfig::default(),
        })
    }

    /// Milliseconds in one navigation cycle.
    pub fn ms_per_cycle(&self) -> usize {
        self.ms_per_cycle
    }

    pub fn goldcode_n(&self) -> u32 {
        self.goldcode_n
    }

    pub fn clock_n(&self) -> u32 {
        self.clock_n
    }

    /// Synthesise one full navigation cycle and advance the Gold-code/clock
    /// state for the next call.
    pub fn generate(&mut self) -> Frame {
        let mut frame = Frame::new(self.ms_per_cycle);

        let goldcode_word = (self.goldcode_n / 32) as usize;
        let goldcode_bit = self.goldcode_n % 32;

        let f1_navslots_end = 340 + self.num_navslots_per_cycle * 80;
        let f2_navslots_start = f1_navslots_end + 40;
        let f2_navslots_end = f2_navslots_start + self.num_navslots_per_cycle * 80;

        for i in 0..self.ms_per_cycle {
            if i < 40
                || (40..45).contains(&i)
                || (85..95).contains(&i)
                || (115..120).contains(&i)
                || (300..340).contains(&i)
            {
                frame.f1_phase[i] = PHASE_ZERO as u16;
                frame.f1_amplitude[i] = RSSI_MAX;
            } else if (45..85).contains(&i) {
                let bit_set = (GOLDCODE[goldcode_word] & (1 << goldcode_bit)) != 0;
                frame.f1_phase[i] = if bit_set {
                    self.trig375_template[i - 45]
                } else {
                    self.trig50_template[i - 45]
                };
                frame.f1_amplitude[i] = RSSI_MAX;
            } else if (95..115).contains(&i) {
                let bit_n = (self.goldcode_n % 8) * 2;
                let mut bits = (self.clock_n >> bit_n) & 3;
                if self.goldcode_n >= 32 {
                    bits ^= 3;
                }
                let pha: usize = match bits {
                    0 => 0,
                    1 => 5,
                    2 => 15,
                    3 => 10,
                    _ => unreachable!(),
                };
                frame.f1_phase[i] = self.trig50_template[((i - 95) + pha) % 20];
                frame.f1_amplitude[i] = 255;
            } else if (340..f1_navslots_end).contains(&i) {
                let time_in_slot = (i - 340) % 80;
                Self::navslot_sample(
                    time_in_slot,
                    &mut frame.f1_phase[i],
                    &mut frame.f1_amplitude[i],
                );
            } else if (f2_navslots_start..f2_navslots_end).contains(&i) {
                let time_in_slot = (i - f2_navslots_start) % 80;
                Self::navslot_sample(
                    time_in_slot,
                    &mut frame.f2_phase[i],
                    &mut frame.f2_amplitude[i],
                );
            }
            // else: guard interval, defaults (PHASE_ZERO / RSSI_MIN) stand.
        }

        self.goldcode_n += 1;
        if self.goldcode_n == 64 {
            self.goldcode_n = 0;
            self.clock_n = self.clock_n.wrapping_add(1);
        }

        frame
    }

    fn navslot_sample(time_in_slot: usize, phase: &mut u16, amplitude: &mut u8) {
        if time_in_slot < 40 {
            *phase = ((PHASE_ZERO as usize + time_in_slot * 40) % 1000) as u16;
        } else {
            let mut x = PHASE_ZERO - ((time_in_slot as i32 - 40) * 40);
            while x < 0 {
                x += 1000;
            }
            *phase = x as u16;
        }
        *amplitude = RSSI_MAX;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_interlaced_mode() {
        assert!(DatatrakGenerator::new(DatatrakMode::Interlaced).is_err());
    }

    #[test]
    fn eight_slot_cycle_length_is_1040ms() {
        let gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        assert_eq!(gen.ms_per_cycle(), 1040);
    }

    #[test]
    fn frame_reserves_headroom_for_interlaced_buffer_length() {
        let mut gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        let frame = gen.generate();
        assert_eq!(frame.f1_phase.len(), 1040);
        assert!(frame.f1_phase.capacity() >= BUF_LEN);
        assert!(frame.f2_amplitude.capacity() >= BUF_LEN);
    }

    #[test]
    fn initial_state_matches_firmware_seed() {
        let gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        assert_eq!(gen.goldcode_n(), 0);
        assert_eq!(gen.clock_n(), 12345);
    }

    #[test]
    fn samples_stay_in_range() {
        let mut gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        for _ in 0..3 {
            let frame = gen.generate();
            for &p in frame.f1_phase.iter().chain(frame.f2_phase.iter()) {
                assert!(p <= 999);
            }
            for &a in frame.f1_amplitude.iter().chain(frame.f2_amplitude.iter()) {
                assert!(a >= 1);
            }
        }
    }

    #[test]
    fn goldcode_wraps_and_advances_clock() {
        let mut gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        for _ in 0..64 {
            gen.generate();
        }
        assert_eq!(gen.goldcode_n(), 0);
        assert_eq!(gen.clock_n(), 12346);
    }

    #[test]
    fn anti_aliasing_window_is_phase_zero_full_power() {
        let mut gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        let frame = gen.generate();
        assert_eq!(frame.f1_phase[0], PHASE_ZERO as u16);
        assert_eq!(frame.f1_amplitude[0], RSSI_MAX);
        assert_eq!(frame.f1_phase[320], PHASE_ZERO as u16);
        assert_eq!(frame.f1_amplitude[320], RSSI_MAX);
    }

    #[test]
    fn trigger_bit_zero_of_goldcode_is_50hz_template() {
        // Bit 0 of 0xFA9B8700 is 0, so the first cycle's trigger uses trig50.
        let mut gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        let frame = gen.generate();
        let expected = rescale(DT_TRIG50_TEMPLATE[0]);
        assert_eq!(frame.f1_phase[45], expected);
    }

    #[test]
    fn navslot_rotation_advances_then_retards() {
        let mut gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        let frame = gen.generate();
        // First navslot sample (i = 340, time_in_slot = 0): phase advance start.
        assert_eq!(frame.f1_phase[340], PHASE_ZERO as u16);
        // 10ms into the slot: phase advanced by 10*40=400.
        assert_eq!(frame.f1_phase[350], ((PHASE_ZERO + 400) % 1000) as u16);
        // 10ms into the retard half (time_in_slot=50, i=390): phase -= (50-40)*40=400.
        let mut expected = PHASE_ZERO - 400;
        while expected < 0 {
            expected += 1000;
        }
        assert_eq!(frame.f1_phase[390], expected as u16);
        assert_eq!(frame.f1_amplitude[390], RSSI_MAX);
    }

    #[test]
    fn guard_intervals_are_tx_off() {
        let mut gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        let frame = gen.generate();
        // G2 is the last 20ms of the cycle.
        let last = frame.f1_phase.len() - 1;
        assert_eq!(frame.f1_phase[last], PHASE_ZERO as u16);
        assert_eq!(frame.f1_amplitude[last], RSSI_MIN);
    }

    proptest::proptest! {
        #[test]
        fn every_sample_stays_in_range_over_n_cycles(n_cycles in 1usize..8) {
            let mut gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
            for _ in 0..n_cycles {
                let frame = gen.generate();
                for &p in frame.f1_phase.iter().chain(frame.f2_phase.iter()) {
                    proptest::prop_assert!(p <= 999);
                }
                for &a in frame.f1_amplitude.iter().chain(frame.f2_amplitude.iter()) {
                    proptest::prop_assert!(a >= RSSI_MIN);
                }
            }
        }

        #[test]
        fn goldcode_n_matches_generate_count_modulo_64(n_cycles in 1usize..200) {
            let mut gen = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
            for _ in 0..n_cycles {
                gen.generate();
            }
            proptest::prop_assert_eq!(gen.goldcode_n(), (n_cycles % 64) as u32);
            proptest::prop_assert_eq!(gen.clock_n(), 12345u32.wrapping_add((n_cycles / 64) as u32));
        }
    }
}
