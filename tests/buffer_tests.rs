mod common;

use brotli_stream::{compress, decode, decompress, encode, Mode, Options};
use common::{init_tracing, large_text, pseudo_random, LOREM_1};

#[test]
fn encode_binary_data() {
    init_tracing();
    let input = pseudo_random(10_000, 11);
    let compressed = encode(&input, &Options::default()).unwrap();
    assert_eq!(decode(&compressed).unwrap(), input);
}

#[test]
fn encode_text_data() {
    let input = large_text(50 * 1024);
    let compressed = encode(&input, &Options::default()).unwrap();
    assert!(compressed.len() * 4 < input.len());
    assert_eq!(decode(&compressed).unwrap(), input);
}

#[test]
fn encode_empty_input() {
    let compressed = encode(&[], &Options::default()).unwrap();
    assert!(!compressed.is_empty());
    assert!(decode(&compressed).unwrap().is_empty());
}

#[test]
fn higher_quality_is_not_larger_on_text() {
    let input = large_text(200 * 1024);
    let low = encode(&input, &Options::builder().quality(3).build().unwrap()).unwrap();
    let high = encode(&input, &Options::builder().quality(9).build().unwrap()).unwrap();

    assert!(high.len() <= low.len());
    assert_eq!(decode(&low).unwrap(), input);
    assert_eq!(decode(&high).unwrap(), input);
}

#[test]
fn every_mode_decodes_the_same() {
    let input = large_text(20 * 1024);
    for mode in [Mode::Generic, Mode::Text, Mode::Font] {
        let options = Options::builder().mode(mode).build().unwrap();
        let compressed = encode(&input, &options).unwrap();
        assert_eq!(decode(&compressed).unwrap(), input, "{}", mode.name());
    }
}

#[test]
fn small_window_and_explicit_block() {
    let options = Options::builder().lgwin(10).lgblock(16).build().unwrap();
    let input = large_text(100 * 1024);
    let compressed = encode(&input, &options).unwrap();
    assert_eq!(decode(&compressed).unwrap(), input);
}

#[test]
fn options_from_json_drive_the_encoder() {
    let options = Options::from_json(&serde_json::json!({
        "quality": 4,
        "mode": "text",
        "windowSize": 18,
    }))
    .unwrap();
    assert_eq!(options.quality(), 4);
    assert_eq!(options.mode(), Mode::Text);
    assert_eq!(options.lgwin(), 18);

    let compressed = encode(LOREM_1, &options).unwrap();
    assert_eq!(decode(&compressed).unwrap(), LOREM_1);
}

#[test]
fn decode_rejects_corrupt_input() {
    let err = decode(&[0x3a, 0x00, 0x00, 0x00]).unwrap_err();
    assert!(err.is_codec(), "{}", err);
}

#[test]
fn decode_rejects_truncated_input() {
    let compressed = encode(&large_text(16 * 1024), &Options::default()).unwrap();
    let err = decode(&compressed[..compressed.len() - 4]).unwrap_err();
    assert!(err.is_codec(), "{}", err);

    let err = decode(&[]).unwrap_err();
    assert!(err.is_codec(), "{}", err);
}

#[tokio::test]
async fn compress_large_input_off_the_runtime() {
    init_tracing();
    let input = large_text(1024 * 1024);
    let compressed = compress(input.clone(), &Options::default()).await.unwrap();
    let decompressed = decompress(compressed).await.unwrap();
    assert_eq!(decompressed, input);
}

#[tokio::test]
async fn decompress_reports_codec_errors() {
    let err = decompress(vec![0x3a, 0x00, 0x00, 0x00]).await.unwrap_err();
    assert!(err.is_codec());
}
