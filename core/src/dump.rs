//! Debug dumps of the signal generator's output, for off-line inspection.
//!
//! Both writers are append-only: one cycle's worth of data per call, so a
//! long-running session can be dumped incrementally without buffering a
//! whole recording in memory.

use std::f64::consts::PI;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::peripherals::datatrak::{Frame, PHASE_AMPL, PHASE_ZERO};

const SAMPLE_RATE: f64 = 44_100.0;
const MODULATION_FREQUENCY: f64 = 1_000.0;
const SAMPLES_PER_MS: usize = (SAMPLE_RATE / 1000.0) as usize;

/// Appends a 16-bit little-endian signed sample pair (F1, F2) per
/// millisecond, phase scaled by 32 around [`PHASE_ZERO`].
pub struct RawPhaseDumpWriter {
    out: BufWriter<File>,
}

impl RawPhaseDumpWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        for i in 0..frame.f1_phase.len() {
            let f1 = (frame.f1_phase[i] as i32 - PHASE_ZERO) * 32;
            let f2 = (frame.f2_phase[i] as i32 - PHASE_ZERO) * 32;
            self.out.write_all(&(f1 as i16).to_le_bytes())?;
            self.out.write_all(&(f2 as i16).to_le_bytes())?;
        }
        self.out.flush()
    }
}

/// Appends a 44.1 kHz stereo PCM rendering of the phase-modulated carrier,
/// one cycle's worth per call. Phase accumulators persist across calls so
/// consecutive cycles stay continuous.
pub struct ModulatedAudioDumpWriter {
    out: BufWriter<File>,
    phi_f1: f64,
    phi_f2: f64,
}

impl ModulatedAudioDumpWriter {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
            phi_f1: 0.0,
            phi_f2: 0.0,
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let theta = 2.0 * PI * MODULATION_FREQUENCY / SAMPLE_RATE;
        let mut last_f1 = PHASE_ZERO;
        let mut last_f2 = PHASE_ZERO;

        for i in 0..frame.f1_phase.len() {
            let phase_f1 = frame.f1_phase[i] as i32;
            let phase_f2 = frame.f2_phase[i] as i32;
            let shift_f1 = ((phase_f1 - last_f1) as f64 / PHASE_AMPL as f64) * 2.0 * PI;
            let shift_f2 = ((phase_f2 - last_f2) as f64 / PHASE_AMPL as f64) * 2.0 * PI;
            last_f1 = phase_f1;
            last_f2 = phase_f2;

            let amp_f1 = frame.f1_amplitude[i] as f64 / 255.0;
            let amp_f2 = frame.f2_amplitude[i] as f64 / 255.0;

            for _ in 0..SAMPLES_PER_MS {
                self.phi_f1 += theta + shift_f1;
                self.phi_f2 += theta + shift_f2;

                let sample_f1 = (16383.0 * amp_f1 * self.phi_f1.sin()).round() as i16;
                let sample_f2 = (16383.0 * amp_f2 * self.phi_f2.sin()).round() as i16;
                self.out.write_all(&sample_f1.to_le_bytes())?;
                self.out.write_all(&sample_f2.to_le_bytes())?;
            }
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripherals::datatrak::{DatatrakGenerator, DatatrakMode};
    use std::env::temp_dir;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        let mut p = temp_dir();
        p.push(format!("datatrak-dump-test-{name}-{:p}", &name));
        p
    }

    #[test]
    fn raw_phase_dump_writes_expected_byte_count() {
        let mut generator = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        let frame = generator.generate();
        let path = scratch_path("raw");
        {
            let mut writer = RawPhaseDumpWriter::create(&path).unwrap();
            writer.write_frame(&frame).unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), frame.f1_phase.len() * 4);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn modulated_audio_dump_writes_expected_byte_count() {
        let mut generator = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        let frame = generator.generate();
        let path = scratch_path("modulated");
        {
            let mut writer = ModulatedAudioDumpWriter::create(&path).unwrap();
            writer.write_frame(&frame).unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), frame.f1_phase.len() * SAMPLES_PER_MS * 4);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn dump_is_append_only_across_calls() {
        let mut generator = DatatrakGenerator::new(DatatrakMode::EightSlot).unwrap();
        let frame = generator.generate();
        let path = scratch_path("append");
        {
            let mut writer = RawPhaseDumpWriter::create(&path).unwrap();
            writer.write_frame(&frame).unwrap();
        }
        {
            let mut writer = RawPhaseDumpWriter::create(&path).unwrap();
            writer.write_frame(&frame).unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), frame.f1_phase.len() * 4 * 2);
        let _ = std::fs::remove_file(&path);
    }
}
