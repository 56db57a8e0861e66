use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lappd_dataclasses::constants::NWORDS;
use lappd_dataclasses::pedestal::{
  PedestalAccumulator,
  PedestalMode,
};
use lappd_dataclasses::waveform::{
  decode_all,
  rotate_to_stop_pointer,
};

fn capture(seed : u32) -> Vec<u32> {
  // 12bit values around a baseline, flag nibble 0
  (0..NWORDS as u32).map(|k| ((((k * 7 + seed) % 64) + 200) << 4) & 0xFFF0).collect()
}

fn bench_decode(c: &mut Criterion) {
  let words = capture(3);
  c.bench_function("decode 1024 words", |b| b.iter(|| decode_all(black_box(&words))));
}

fn bench_rotate_and_decode(c: &mut Criterion) {
  let words = capture(5);
  c.bench_function("rotate + decode 1024 words", |b| b.iter(|| {
    let rotated = rotate_to_stop_pointer(black_box(&words), 417).unwrap_or_default();
    decode_all(&rotated)
  }));
}

fn bench_pedestal_100_events(c: &mut Criterion) {
  let events : Vec<_> = (0..100).map(|k| decode_all(&capture(k))).collect();
  c.bench_function("pedestals from 100 events", |b| b.iter(|| {
    let mut acc = PedestalAccumulator::new(PedestalMode::Full);
    for ev in &events {
      let _ = acc.add_event(black_box(ev));
    }
    acc.finish(None)
  }));
}

criterion_group!(benches, bench_decode, bench_rotate_and_decode, bench_pedestal_100_events);
criterion_main!(benches);
