//! Transposer facade integration tests.
//!
//! Uses the real phase vocoder engine on the worker thread and a scripted
//! transcoding service in place of ffmpeg.

mod helpers;

use helpers::tolerances::INT16_EPSILON;
use helpers::*;
use transposer::prelude::*;
use transposer::{ExportError, FfmpegFactory};

fn small_pipeline() -> PipelineConfig {
    PipelineConfig::default().fft_size(FftSize::Small)
}

fn st(value: i32) -> Semitones {
    Semitones::new(value).unwrap()
}

#[test]
fn test_render_requires_source() {
    let mut transposer = test_transposer(small_pipeline(), ScriptedServiceFactory::new(0));
    assert!(!transposer.can_render(st(3)));
    assert!(matches!(
        transposer.render(st(3), |_| {}),
        Err(Error::NotReady(_))
    ));
    assert!(matches!(
        transposer.export_opus(None),
        Err(Error::NotReady(_))
    ));
    assert!(transposer.output_file_name("wav").is_err());
}

#[test]
fn test_render_preserves_length_and_reports_status() {
    let mut transposer = test_transposer(small_pipeline(), ScriptedServiceFactory::new(0));
    transposer.load_named("take.wav", sine_buffer(440.0, TEST_SAMPLE_RATE, 30_000));

    let mut statuses = Vec::new();
    let out = transposer
        .render(st(5), |status| statuses.push(status.to_string()))
        .unwrap();
    assert_eq!(out.frame_count(), 30_000);
    assert_eq!(out.sample_rate(), TEST_SAMPLE_RATE);
    assert!(statuses.iter().any(|s| s.starts_with("Studying...")));
    assert!(statuses.iter().any(|s| s == "Processing... 100%"));
    assert_eq!(
        transposer.output_file_name("wav").unwrap(),
        "take-pitch-plus5.wav"
    );
}

#[test]
fn test_identical_render_is_cached() {
    let mut transposer = test_transposer(small_pipeline(), ScriptedServiceFactory::new(0));
    transposer.load(sine_buffer(440.0, TEST_SAMPLE_RATE, 10_000));

    assert!(transposer.can_render(st(2)));
    let first = transposer.render(st(2), |_| {}).unwrap().clone();
    assert!(!transposer.can_render(st(2)));
    assert!(transposer.can_render(st(3)));

    let mut calls = 0;
    let second = transposer.render(st(2), |_| calls += 1).unwrap();
    assert_eq!(calls, 0, "cached render must not reach the worker");
    assert_eq!(&first, second);
}

#[test]
fn test_zero_shift_copies_source() {
    let mut transposer = test_transposer(small_pipeline(), ScriptedServiceFactory::new(0));
    let source = sine_buffer(440.0, TEST_SAMPLE_RATE, 4_000);
    transposer.load_named("clip.flac", source.clone());

    assert!(!transposer.can_render(st(0)));
    let out = transposer.render(st(0), |_| {}).unwrap();
    assert_eq!(out, &source);
    assert_eq!(
        transposer.output_file_name("wav").unwrap(),
        "clip-pitch-minus0.wav"
    );
}

#[test]
fn test_load_invalidates_render() {
    let mut transposer = test_transposer(small_pipeline(), ScriptedServiceFactory::new(0));
    let first = transposer.load(sine_buffer(440.0, TEST_SAMPLE_RATE, 5_000));
    transposer.render(st(1), |_| {}).unwrap();
    assert!(transposer.rendered().is_some());

    let second = transposer.load(sine_buffer(220.0, TEST_SAMPLE_RATE, 6_000));
    assert_ne!(first, second);
    assert!(transposer.rendered().is_none());
    assert!(transposer.can_render(st(1)));
    assert_eq!(transposer.render(st(1), |_| {}).unwrap().frame_count(), 6_000);
}

#[test]
fn test_render_wav_size() {
    let mut transposer = test_transposer(small_pipeline(), ScriptedServiceFactory::new(0));
    let frames = 7_000;
    let stereo = AudioBuffer::new(
        22050,
        vec![
            generate_sine(300.0, 22050, frames),
            generate_sine(450.0, 22050, frames),
        ],
    )
    .unwrap();
    transposer.load(stereo);

    let wav = transposer.render_wav(st(-4), |_| {}).unwrap();
    assert_eq!(wav.len(), 44 + frames * 2 * 2);
    assert_eq!(&wav[..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");

    let decoded = transposer::export::decode_wav(&wav).unwrap();
    assert_eq!(decoded.frame_count(), frames);
    let rendered = transposer.rendered().unwrap();
    for (a, b) in decoded.channels()[1].iter().zip(&rendered.channels()[1]) {
        assert!((a - b.clamp(-1.0, 1.0)).abs() <= INT16_EPSILON * 2.0);
    }
}

#[test]
fn test_opus_export_falls_back_and_caches() {
    let service = ScriptedServiceFactory::new(2);
    let mut transposer = test_transposer(small_pipeline(), service.clone());
    transposer.load_named("vocal.wav", sine_buffer(440.0, TEST_SAMPLE_RATE, 8_000));
    transposer.render(st(-2), |_| {}).unwrap();

    let mut lines = Vec::new();
    let mut sink = |line: &str| lines.push(line.to_string());
    let output = transposer
        .export_opus(Some(&mut sink as &mut dyn FnMut(&str)))
        .unwrap()
        .clone();

    // ogg/stereo and ogg/mono failed, webm/stereo produced the artifact.
    assert_eq!(output.extension, "webm");
    assert_eq!(output.mime_type, "audio/webm; codecs=opus");
    assert_eq!(output.bytes, b"OggS-fake");
    assert_eq!(service.created(), 3);
    assert_eq!(service.exec_count(), 3);
    assert!(lines.iter().any(|l| l == "ffmpeg attempt: webm/stereo/libopus"));

    // The transcoder input is the 16-bit WAV of the render.
    let input_len = service.log.lock().unwrap().inputs[0].len();
    assert_eq!(input_len, 44 + 8_000 * 2);

    // Same render: cached artifact, no more ffmpeg runs.
    transposer.export_opus(None).unwrap();
    assert_eq!(service.exec_count(), 3);
    assert_eq!(
        transposer.output_file_name(output.extension).unwrap(),
        "vocal-pitch-minus2.webm"
    );

    // A new render needs a new export.
    transposer.render(st(2), |_| {}).unwrap();
    transposer.export_opus(None).unwrap();
    assert_eq!(service.exec_count(), 4);
}

#[test]
fn test_opus_export_exhausted() {
    let service = ScriptedServiceFactory::new(usize::MAX);
    let mut transposer = test_transposer(small_pipeline(), service.clone());
    transposer.load(sine_buffer(440.0, TEST_SAMPLE_RATE, 2_000));
    transposer.render(st(7), |_| {}).unwrap();

    let err = transposer.export_opus(None).unwrap_err();
    match err {
        Error::Export(ExportError::TranscodeExhausted {
            last_error,
            log_tail,
        }) => {
            assert_eq!(last_error, "ffmpeg exited with code 1");
            assert_eq!(log_tail.len(), 8);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(service.exec_count(), 4);
    // The render itself is still available.
    assert!(transposer.rendered().is_some());
}

#[test]
fn test_load_wav_file_uses_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guitar.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for sample in generate_sine(200.0, 16000, 3_200) {
        writer.write_sample((sample * 32767.0) as i16).unwrap();
    }
    writer.finalize().unwrap();

    let mut transposer = test_transposer(small_pipeline(), ScriptedServiceFactory::new(0));
    transposer.load_wav_file(&path).unwrap();
    assert_eq!(transposer.source_name(), Some("guitar.wav"));
    let source = transposer.source().unwrap();
    assert_eq!(source.sample_rate(), 16000);
    assert!((source.duration_seconds() - 0.2).abs() < 1e-9);

    transposer.render(st(12), |_| {}).unwrap();
    assert_eq!(
        transposer.output_file_name("wav").unwrap(),
        "guitar-pitch-plus12.wav"
    );
}

#[test]
fn test_config_round_trip_through_builder() {
    let config = TransposerConfig::from_toml_str(
        r#"
        [pipeline]
        fft_size = "small"
        chunk_size = 512

        [transcode]
        bitrate_kbps = 64
        ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
        "#,
    )
    .unwrap();

    let transposer: Transposer<FfmpegFactory> =
        Transposer::builder().config(config.clone()).build().unwrap();
    assert_eq!(transposer.config(), &config);
    assert_eq!(transposer.transcoder().options().bitrate_kbps, 64);
    // ffmpeg is only started on the first export.
    assert!(!transposer.transcoder().is_loaded());
    assert!(transposer.worker().is_running());
}

#[test]
fn test_invalid_config_rejected_by_builder() {
    let result = Transposer::builder().chunk_size(0).build();
    assert!(result.is_err());
}
