// Full recordings: encode with the high-speed encoder (or synthesize low-speed
// pulses), run them through the reader, and check what comes back.
//
// Long recordings run the whole decoder per sample; use --release for speed:
//   cargo test -p tapewave-core --test integration_test --release

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tapewave_core::{
    CassetteReader, Encoding, HighSpeedEncoder, Program, Results, SAMPLE_RATE,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn read(samples: &[i16]) -> Results {
    init_logging();
    CassetteReader::new().read(samples)
}

fn single_program(results: &Results) -> &Program {
    assert_eq!(
        results.programs().len(),
        1,
        "expected one program, got {:?}",
        results
            .programs()
            .iter()
            .map(|p| p.binary().len())
            .collect::<Vec<_>>()
    );
    &results.programs()[0]
}

fn round_trip(data: &[u8]) -> Vec<u8> {
    let samples = HighSpeedEncoder::new().encode(data);
    let results = read(&samples);
    let program = single_program(&results);
    assert_eq!(program.encoding(), Encoding::HighSpeed);
    assert_eq!((program.track(), program.copy()), (1, 1));
    program.binary().to_vec()
}

#[test]
fn test_round_trip_one_byte() {
    assert_eq!(round_trip(&[0xA5]), vec![0xA5]);
}

#[test]
fn test_round_trip_text() {
    let data = b"Hello, TRS-80!";
    assert_eq!(round_trip(data), data);
}

#[test]
fn test_round_trip_header_lookalike() {
    // Data that looks like more header
    let data = vec![0x55; 300];
    assert_eq!(round_trip(&data), data);

    let data = [0x55, 0x7F, 0x55, 0x7F, 0x00, 0xFF];
    assert_eq!(round_trip(&data), data);
}

#[test]
fn test_round_trip_every_byte_value() {
    let data: Vec<u8> = (0..=255).collect();
    assert_eq!(round_trip(&data), data);
}

#[test]
fn test_round_trip_long_random() {
    let mut rng = StdRng::seed_from_u64(0x7A9E);
    let data: Vec<u8> = (0..16 * 1024).map(|_| rng.gen()).collect();
    assert_eq!(round_trip(&data), data);
}

#[test]
fn test_round_trip_empty() {
    // Header and final half cycle only; silence ends it
    assert!(round_trip(&[]).is_empty());
}

#[test]
fn test_round_trip_with_noise() {
    let data = b"10 PRINT \"NOISY\"";
    let mut samples = HighSpeedEncoder::new().encode(data);

    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, 150.0).unwrap();
    for sample in samples.iter_mut() {
        let noisy = *sample as f64 + noise.sample(&mut rng);
        *sample = noisy.clamp(i16::MIN as f64, i16::MAX as f64) as i16;
    }

    let results = read(&samples);
    assert_eq!(single_program(&results).binary(), data);
}

#[test]
fn test_round_trip_with_dc_offset() {
    let data = b"offset";
    let samples: Vec<i16> = HighSpeedEncoder::new()
        .encode(data)
        .into_iter()
        .map(|s| s.saturating_add(4000))
        .collect();

    let results = read(&samples);
    assert_eq!(single_program(&results).binary(), data);
}

#[test]
fn test_basic_program_listing() {
    let tokenized = [
        0xD3, 0xD3, 0xD3, b'H', // magic and name
        0xF3, 0x42, 0x0A, 0x00, 0xB2, b' ', b'"', b'H', b'I', b'"', 0x00, // 10 PRINT "HI"
        0xFB, 0x42, 0x14, 0x00, 0x8D, b' ', b'1', b'0', 0x00, // 20 GOTO 10
        0x00, 0x00,
    ];

    let results = read(&HighSpeedEncoder::new().encode(&tokenized));
    let program = single_program(&results);
    assert!(program.is_basic());
    assert_eq!(program.listing().unwrap(), "10 PRINT \"HI\"\n20 GOTO 10\n");
}

#[test]
fn test_copies_then_new_track() {
    let encoder = HighSpeedEncoder::new();
    let mut samples = Vec::new();
    for copy in 0..3u8 {
        samples.extend(encoder.encode(&[b'A', copy]));
    }
    // Eleven seconds of silence between tracks
    samples.extend(vec![0i16; 11 * SAMPLE_RATE]);
    samples.extend(encoder.encode(b"B"));

    let results = read(&samples);
    let found: Vec<(usize, usize)> = results
        .programs()
        .iter()
        .map(|p| (p.track(), p.copy()))
        .collect();
    assert_eq!(found, vec![(1, 1), (1, 2), (1, 3), (2, 1)]);
    assert_eq!(results.programs()[3].binary(), b"B");

    let starts: Vec<usize> = results.programs().iter().map(|p| p.start_frame()).collect();
    assert!(starts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(results.new_track_frames(), &[starts[0], starts[3]]);
}

#[test]
fn test_re_encoded_program_matches() {
    let data = [0xD3, 0xD3, 0xD3, b'A', 0x00, 0x00];
    let results = read(&HighSpeedEncoder::new().encode(&data));
    let program = single_program(&results);

    // Re-encoding adds the third trailing zero of a high-speed program
    let again = read(&program.to_high_speed_audio());
    assert_eq!(
        single_program(&again).binary(),
        &[0xD3, 0xD3, 0xD3, b'A', 0x00, 0x00, 0x00]
    );
}
