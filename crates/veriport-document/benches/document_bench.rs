// SPDX-License-Identifier: Apache-2.0
//
// Benchmarks for the hot per-frame paths: replay detection and MRZ decode.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use veriport_core::types::RawFrame;
use veriport_document::antispoof::{detect_screen_replay, SpoofThresholds};
use veriport_document::mrz::decode::decode_td3;

fn textured_frame(width: u32, height: u32) -> RawFrame {
    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = ((x * 97 + y * 31) % 251) as u8;
            rgba.extend_from_slice(&[v, (y % 200) as u8, v.wrapping_add(64), 255]);
        }
    }
    RawFrame::new(width, height, rgba).unwrap()
}

fn bench_antispoof(c: &mut Criterion) {
    let frame = textured_frame(1280, 720);
    let thresholds = SpoofThresholds::default();
    c.bench_function("antispoof_720p", |b| {
        b.iter(|| detect_screen_replay(black_box(&frame), black_box(&thresholds)))
    });
}

fn bench_mrz_decode(c: &mut Criterion) {
    let lines = vec![
        "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<".to_string(),
        "L898902C36UTO7408122F1204159ZE184226B<<<<<10".to_string(),
    ];
    c.bench_function("mrz_decode_td3", |b| {
        b.iter(|| decode_td3(black_box(&lines)))
    });
}

criterion_group!(benches, bench_antispoof, bench_mrz_decode);
criterion_main!(benches);
