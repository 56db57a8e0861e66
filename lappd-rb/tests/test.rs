#[cfg(test)]
pub mod tests {

  extern crate rand;
  use rand::Rng;

  use lappd_dataclasses::calibration::IterationPolicy;
  use lappd_dataclasses::constants::{NWORDS, N_DELAY_TAPS};
  use lappd_dataclasses::errors::{CalibrationError, ParameterError};
  use lappd_dataclasses::io::write_event_dump;
  use lappd_dataclasses::pedestal::PedestalMode;
  use lappd_dataclasses::{AdcChip, Channel, DelayTap, Sample};

  use lappd_rb::acquisition::{acquire, acquire_decoded, acquire_rotated, record_events};
  use lappd_rb::api::{bring_up, measure_pedestals, read_waveform};
  use lappd_rb::calibration::{correct_lane, scan_all, scan_channel, scan_frame};
  use lappd_rb::pedestals::{estimate, estimate_roi};
  use lappd_rb::sim::{SimCapture, SimulatedBoard};
  use lappd_rb::{LappdBoard, LappdError, LappdSettings};

  fn board() -> LappdBoard<SimulatedBoard> {
    let mut settings = LappdSettings::for_simulation();
    settings.calibration.pattern_samples = 10;
    let sim = SimulatedBoard::new(settings.register_map.clone());
    LappdBoard::new(sim, settings).unwrap()
  }

  /// raw capture word for a valid sample
  fn word(value : i16) -> u32 {
    ((value as u16 & 0x0FFF) as u32) << 4
  }

  fn constant_capture(value : i16, n_words : usize, stop_pointer : u16) -> SimCapture {
    SimCapture {
      stop_pointer,
      words : vec![word(value);n_words],
    }
  }

  #[test]
  fn delay_window_midpoint() {
    let mut b  = board();
    let ch = Channel::new(12).unwrap();
    b.port_mut().set_lane_window(ch, 5, 9);
    let res = scan_channel(&mut b, ch).unwrap();
    assert_eq!(res.result.tap().unwrap().value(), 7);
    let addr = b.map().data_delay(ch);
    assert_eq!(b.port().peek(addr), 7);
  }

  #[test]
  fn delay_scan_is_idempotent() {
    let mut b  = board();
    let ch = Channel::new(40).unwrap();
    b.port_mut().set_lane_window(ch, 11, 26);
    let first  = scan_channel(&mut b, ch).unwrap();
    let second = scan_channel(&mut b, ch).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.result.tap().unwrap().value(), 18);
  }

  #[test]
  fn delay_window_tolerates_gaps() {
    let mut b  = board();
    let ch = Channel::new(0).unwrap();
    let mut good = vec![false;N_DELAY_TAPS];
    for k in [4, 5, 9, 10] {
      good[k] = true;
    }
    b.port_mut().set_lane_taps(ch, good);
    let res = scan_channel(&mut b, ch).unwrap();
    assert_eq!(res.result.tap().unwrap().value(), 7);
  }

  #[test]
  fn random_delay_windows() {
    let mut rng = rand::thread_rng();
    let mut b  = board();
    let ch = Channel::new(22).unwrap();
    for _ in 0..5 {
      let first : usize = rng.gen_range(0..N_DELAY_TAPS);
      let last  : usize = rng.gen_range(first..N_DELAY_TAPS);
      b.port_mut().set_lane_window(ch, first, last);
      let res = scan_channel(&mut b, ch).unwrap();
      assert_eq!(res.result.tap().unwrap().value() as usize, (first + last)/2);
    }
  }

  #[test]
  fn frame_longest_run() {
    let mut b = board();
    let mut good = vec![false;N_DELAY_TAPS];
    // run of 3
    for k in 2..5 {
      good[k] = true;
    }
    // run of 6
    for k in 20..26 {
      good[k] = true;
    }
    b.port_mut().set_frame_taps(AdcChip::Adc2, good);
    let res = scan_frame(&mut b, AdcChip::Adc2).unwrap();
    assert_eq!(res.n_runs, 2);
    assert_eq!(res.check().unwrap().value(), 22);
    let addr = b.map().frame_delay(AdcChip::Adc2);
    assert_eq!(b.port().peek(addr), 22);
  }

  #[test]
  fn frame_single_gap_splits() {
    let mut b = board();
    let mut good = vec![false;N_DELAY_TAPS];
    for k in [3, 4, 5, 6, 8, 9, 10, 11, 12] {
      good[k] = true;
    }
    b.port_mut().set_frame_taps(AdcChip::Adc1, good);
    let res = scan_frame(&mut b, AdcChip::Adc1).unwrap();
    assert_eq!(res.check().unwrap().value(), 10);
  }

  #[test]
  fn bit_alignment_converges() {
    let mut b = board();
    for sub in 0..16 {
      let ch = Channel::from_sub_channel(AdcChip::Adc2, sub).unwrap();
      b.port_mut().set_lane_window(ch, 0, 31);
    }
    b.port_mut().set_misalignment(AdcChip::Adc2, 1, 3);
    b.port_mut().set_misalignment(AdcChip::Adc2, 5, 1);
    let report = correct_lane(&mut b, AdcChip::Adc2, IterationPolicy::default()).unwrap();
    assert!(report.converged);
    assert_eq!(report.corrections, 3);
    assert_eq!(report.checks, 4);
    assert_eq!(report.last_mask, 0);
    let addr = b.map().bitslip(AdcChip::Adc2);
    let masks = b.port().writes_to(addr);
    assert_eq!(masks, vec![(1 << 1) | (1 << 5), 1 << 1, 1 << 1]);
    // passing sub-channels never slipped
    for sub in 0..16 {
      assert!(b.port().is_aligned(AdcChip::Adc2, sub));
    }
    assert!(b.port().writes_to(b.map().bitslip(AdcChip::Adc1)).is_empty());
  }

  #[test]
  fn scan_all_collects_failures() {
    let mut b = board();
    let dead = [Channel::new(2).unwrap(), Channel::new(34).unwrap()];
    for ch in dead {
      b.port_mut().set_lane_taps(ch, vec![false;N_DELAY_TAPS]);
    }
    let report = scan_all(&mut b).unwrap();
    assert_eq!(report.lanes.len(), 32);
    assert_eq!(report.failed_channels(), dead.to_vec());
    assert_eq!(report.tap(Channel::new(4).unwrap()).unwrap().value(), 14);
    assert_eq!(report.check(),
               Err(CalibrationError::LaneScanFailed { channels : dead.to_vec() }));
  }

  #[test]
  fn acquisition_rotation() {
    let mut b  = board();
    let ch = Channel::new(15).unwrap();
    let input : Vec<u32> = (0..NWORDS as u32).map(|k| k << 4).collect();
    b.port_mut().set_captures(ch, vec![SimCapture { stop_pointer : 100, words : input.clone() }]);
    let capture = acquire_rotated(&mut b, ch).unwrap();
    assert_eq!(capture.stop_pointer, 100);
    assert_eq!(capture.words[0], input[100]);
    assert_eq!(capture.words[923], input[1023]);
    assert_eq!(capture.words[924], input[0]);
    assert_eq!(capture.decoded()[0], Sample::Valid(100));
  }

  #[test]
  fn acquisition_sequence() {
    let mut b  = board();
    let ch = Channel::new(3).unwrap();
    b.port_mut().set_captures(ch, vec![constant_capture(-5, 16, 0)]);
    b.adc_buffer_start().unwrap();
    b.port_mut().clear_log();
    let words = acquire(&mut b, ch, 16).unwrap();
    assert_eq!(words, vec![word(-5);16]);
    let map = b.map().clone();
    let writes = b.port().writes();
    // buffer stop, debug channel, read request
    assert_eq!(writes[0], (map.mode, 0));
    assert_eq!(writes[1], (map.adc_debug_chan, 3));
    assert_eq!(writes[2], (map.cmd, 1 << 6));
    assert_eq!(writes.len(), 3);
  }

  #[test]
  fn acquisition_decoded() {
    let mut b  = board();
    let ch = Channel::new(9).unwrap();
    let capture = SimCapture {
      stop_pointer : 0,
      words        : vec![word(7), word(-3), 0x1, 0xFFFF_0002, word(-2048)],
    };
    b.port_mut().set_captures(ch, vec![capture]);
    let samples = acquire_decoded(&mut b, ch, 5).unwrap();
    assert_eq!(samples, vec![Sample::Valid(7), Sample::Valid(-3), Sample::Underflow,
                             Sample::Overflow, Sample::Valid(-2048)]);
    assert!(acquire_decoded(&mut b, ch, 0).is_err());
  }

  #[test]
  fn pedestal_aggregation() {
    let mut b  = board();
    let ch = Channel::new(15).unwrap();
    let captures = [10, 12, 10, 12].iter()
      .enumerate()
      .map(|(k, v)| constant_capture(*v, NWORDS, (k * 300) as u16))
      .collect();
    b.port_mut().set_captures(ch, captures);
    let table = estimate_roi(&mut b, ch, 4).unwrap();
    assert_eq!(table.n_events, 4);
    assert_eq!(table.mode, PedestalMode::Roi);
    for slot in &table.slots {
      assert_eq!(slot.mean, 11.0);
      assert_eq!(slot.rms, 1.0);
      assert_eq!(slot.n_valid, 4);
    }
    // DENABLE and transparent mode
    assert_eq!(b.read_mode().unwrap() & 0b110, 0b110);
  }

  #[test]
  fn pedestals_skip_invalid_samples() {
    let mut b  = board();
    let ch = Channel::new(7).unwrap();
    let mut bad = constant_capture(0, NWORDS + 1, 0);
    // flag 1, underflow in slot 10
    bad.words[11] = 0x1;
    let captures = vec![constant_capture(4, NWORDS + 1, 0), bad];
    b.port_mut().set_captures(ch, captures);
    let table = estimate(&mut b, ch, 2, PedestalMode::Full).unwrap();
    assert_eq!(table.slots[10].n_valid, 1);
    assert_eq!(table.slots[10].n_rejected, 1);
    assert_eq!(table.slots[10].mean, 4.0);
    assert_eq!(table.slots[11].mean, 2.0);
  }

  #[test]
  fn waveform_is_pedestal_subtracted() {
    let mut b  = board();
    let ch = Channel::new(15).unwrap();
    let mut signal = constant_capture(110, NWORDS + 1, 0);
    signal.words[1] = 0x2;
    let captures = vec![
      constant_capture(100, NWORDS + 1, 0),
      constant_capture(100, NWORDS + 1, 0),
      signal,
    ];
    b.port_mut().set_captures(ch, captures);
    let peds = estimate(&mut b, ch, 2, PedestalMode::Full).unwrap();
    let wf   = read_waveform(&mut b, ch, &peds).unwrap();
    assert_eq!(wf.len(), NWORDS);
    // overflow stays invalid
    assert_eq!(wf[0], None);
    assert_eq!(wf[1], Some(10.0));
  }

  #[test]
  fn pedestal_pair_dump() {
    let mut b  = board();
    let ch = Channel::new(15).unwrap();
    let captures = vec![
      constant_capture(7, NWORDS + 1, 12),
      constant_capture(7, NWORDS + 1, 13),
    ];
    b.port_mut().set_captures(ch, captures);
    let peds = measure_pedestals(&mut b, ch, 2).unwrap();
    let mut buf = Vec::<u8>::new();
    peds.write_dump(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines : Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), NWORDS);
    assert_eq!(lines[5], "5 7.0 0.0 7.0 0.0");
  }

  #[test]
  fn event_recording() {
    let mut b  = board();
    let ch = Channel::new(15).unwrap();
    b.port_mut().set_captures(ch, vec![
      constant_capture(1, NWORDS, 17),
      constant_capture(2, NWORDS, 900),
    ]);
    let events = record_events(&mut b, ch, 2).unwrap();
    assert_eq!(events[0].stop_pointer, 17);
    assert_eq!(events[1].stop_pointer, 900);
    assert_eq!(events[1].samples[0], Sample::Valid(2));
    let mut buf = Vec::<u8>::new();
    write_event_dump(&mut buf, ch, &events).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text.lines().count(), 3);
  }

  #[test]
  fn invalid_parameters_touch_nothing() {
    let mut b  = board();
    let ch = Channel::new(1).unwrap();
    assert_eq!(acquire(&mut b, ch, 0),
               Err(LappdError::InvalidParameter(ParameterError::WordCountOutOfRange(0))));
    assert!(acquire(&mut b, ch, 100000).is_err());
    assert_eq!(estimate(&mut b, ch, 0, PedestalMode::Roi).unwrap_err(),
               LappdError::InvalidParameter(ParameterError::EventCountOutOfRange(0)));
    assert!(record_events(&mut b, ch, 0).is_err());
    assert!(measure_pedestals(&mut b, ch, 0).is_err());
    assert!(b.set_adc_reg(AdcChip::Adc1, 0x100, 1).is_err());
    assert!(b.set_bit(0x370, 40, true).is_err());
    assert!(correct_lane(&mut b, AdcChip::Adc1, IterationPolicy { max_iterations : 0 }).is_err());
    assert!(b.port().writes().is_empty());
    assert_eq!(b.port().n_reads(), 0);
    assert!(Channel::new(64).is_err());
    assert!(AdcChip::try_from(2u8).is_err());
  }

  #[test]
  fn invalid_settings_rejected() {
    let mut settings = LappdSettings::for_simulation();
    settings.pedestal_events = 0;
    let sim = SimulatedBoard::new(settings.register_map.clone());
    assert!(LappdBoard::new(sim, settings).is_err());
  }

  #[test]
  fn bring_up_succeeds() {
    let mut b = board();
    let report = bring_up(&mut b).unwrap();
    assert_eq!(report.frames.len(), 2);
    for frame in &report.frames {
      assert_eq!(frame.check().unwrap().value(), 15);
    }
    assert_eq!(report.lanes.lanes.len(), 32);
    assert!(report.lanes.check().is_ok());
    assert!(report.bit_align.iter().all(|ba| ba.converged && ba.corrections == 0));
    assert_eq!(report.pll_status, 0xFF);
    assert!(!report.is_degraded());
    let map = b.map().clone();
    assert_eq!(b.port().peek(map.adc_buf_num_words), 1025);
    assert_eq!(b.port().peek(map.n_sample_packet), 512);
    assert_eq!(b.port().peek(map.drs_valid_delay), 44);
    assert_eq!(b.port().peek(map.adc_debug_chan), 15);
    assert_eq!(b.port().peek(map.chan_mask(AdcChip::Adc1)), 1 << 15);
    assert_eq!(b.port().peek(map.chan_mask(AdcChip::Adc2)), 1 << 23);
    assert_eq!(b.port().peek(map.drs_config), 0xFF);
  }

  #[test]
  fn bring_up_aggregates_lane_failures() {
    let mut b = board();
    let dead = [Channel::new(2).unwrap(), Channel::new(34).unwrap()];
    b.set_data_delay(dead[0], DelayTap::new(9).unwrap()).unwrap();
    for ch in dead {
      b.port_mut().set_lane_taps(ch, vec![false;N_DELAY_TAPS]);
    }
    let res = bring_up(&mut b);
    assert_eq!(res, Err(LappdError::Calibration(
      CalibrationError::LaneScanFailed { channels : dead.to_vec() })));
    // both chips were calibrated, the DRS was not touched
    let map = b.map().clone();
    assert_eq!(b.port().peek(map.frame_delay(AdcChip::Adc2)), 15);
    assert!(b.port().writes_to(map.drs_config).is_empty());
    // dead lanes are not slipped and keep their old delay
    for chip in AdcChip::ALL {
      assert!(b.port().writes_to(map.bitslip(chip)).is_empty());
    }
    assert_eq!(b.port().peek(map.data_delay(dead[0])), 9);
    assert_eq!(b.port().peek(map.data_delay(dead[1])), 0);
  }

  #[test]
  fn bring_up_reports_every_failure() {
    let mut settings = LappdSettings::for_simulation();
    settings.calibration.pattern_samples          = 5;
    settings.calibration.bit_align_max_iterations = 2;
    let sim = SimulatedBoard::new(settings.register_map.clone());
    let mut b = LappdBoard::new(sim, settings).unwrap();
    let dead    = Channel::new(2).unwrap();
    let shifted = Channel::from_sub_channel(AdcChip::Adc2, 3).unwrap();
    b.port_mut().set_lane_taps(dead, vec![false;N_DELAY_TAPS]);
    b.port_mut().set_misalignment(AdcChip::Adc2, 3, 5);
    let res = bring_up(&mut b);
    assert_eq!(res, Err(LappdError::Calibration(CalibrationError::Multiple(vec![
      CalibrationError::LaneScanFailed { channels : vec![dead, shifted] },
      CalibrationError::BitAlignmentDiverged { line : AdcChip::Adc2, mask : 1 << 3, iterations : 3 },
    ]))));
    let map = b.map().clone();
    assert_eq!(b.port().writes_to(map.bitslip(AdcChip::Adc2)), vec![1 << 3;2]);
    assert!(b.port().writes_to(map.drs_config).is_empty());
  }

  #[test]
  fn bring_up_stops_on_frame_failure() {
    let mut b = board();
    b.port_mut().set_frame_taps(AdcChip::Adc1, vec![false;N_DELAY_TAPS]);
    let res = bring_up(&mut b);
    assert_eq!(res, Err(LappdError::Calibration(
      CalibrationError::NoPassingFrameRun { line : AdcChip::Adc1 })));
    let map = b.map().clone();
    assert!(b.port().writes_to(map.frame_delay(AdcChip::Adc2)).is_empty());
    assert!(b.port().writes_to(map.data_delay(Channel::new(0).unwrap())).is_empty());
  }

  #[test]
  fn bring_up_reports_unlocked_pll() {
    let mut b = board();
    b.port_mut().set_pll_status(0);
    let report = bring_up(&mut b).unwrap();
    assert_eq!(report.pll_status, 0);
    assert_eq!(report.warnings, vec![LappdError::HardwareNotReady { pll_status : 0 }]);
    assert!(report.is_degraded());
    // carried on after the PLL check
    let map = b.map().clone();
    assert_eq!(b.port().peek(map.adc_buf_num_words), 1025);
  }

  #[test]
  fn bring_up_with_misaligned_lane() {
    let mut b = board();
    b.port_mut().set_misalignment(AdcChip::Adc1, 7, 2);
    let report = bring_up(&mut b).unwrap();
    assert!(report.lanes.check().is_ok());
    assert_eq!(report.lane_alignment.len(), 2);
    assert!(report.lane_alignment[0].converged);
    assert_eq!(report.lane_alignment[0].corrections, 2);
    assert_eq!(report.lane_alignment[1].corrections, 0);
    assert_eq!(report.bit_align.len(), 2);
    assert!(report.bit_align.iter().all(|ba| ba.converged && ba.corrections == 0));
    assert!(b.port().is_aligned(AdcChip::Adc1, 7));
    let ch = Channel::from_sub_channel(AdcChip::Adc1, 7).unwrap();
    assert_eq!(ch, Channel::new(14).unwrap());
    assert_eq!(report.lanes.tap(ch).unwrap().value(), 14);
    let map = b.map().clone();
    assert_eq!(b.port().writes_to(map.bitslip(AdcChip::Adc1)), vec![1 << 7;2]);
    assert_eq!(b.port().peek(map.drs_config), 0xFF);
  }

  #[test]
  fn settings_round_trip() {
    let mut settings = LappdSettings::new();
    settings.calibration.tap_settle_us = 42;
    settings.drs.adc_channel_masks = [0x1, 0x2];
    let fname = std::env::temp_dir()
      .join(format!("lappd-rb-test-{}.toml", std::process::id()))
      .to_string_lossy()
      .to_string();
    settings.to_toml(fname.clone()).unwrap();
    let read = LappdSettings::from_toml(fname.clone()).unwrap();
    assert_eq!(read, settings);
    println!("{}", read);
    let _ = std::fs::remove_file(fname);
  }
}
