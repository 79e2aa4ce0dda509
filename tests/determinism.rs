use scroll_text::generator::PreparedRender;
use scroll_text::params::{Canvas, GenerationRequest, Rgb8};
use scroll_text::text::FontConfig;

fn request(text: &str) -> GenerationRequest {
    GenerationRequest {
        text: text.to_owned(),
        duration_seconds: 1,
        canvas: Canvas::new(120, 60),
        fps: 12,
        text_color: Rgb8::new(20, 20, 200),
        background_color: Rgb8::new(195, 255, 170),
    }
}

#[test]
fn determinism_identical_inputs_render_identical_frames() {
    let first = render_hashes(&request("Hello, world"));
    let second = render_hashes(&request("Hello, world"));
    assert_eq!(first.len(), 12);
    assert_eq!(first, second, "identical requests should render identical pixels");
}

#[test]
fn determinism_cyrillic_text_is_stable() {
    let first = render_hashes(&request("тестовый текст"));
    let second = render_hashes(&request("тестовый текст"));
    assert_eq!(first, second);
}

#[test]
fn determinism_different_text_changes_output() {
    let hello = render_hashes(&request("HELLO"));
    let world = render_hashes(&request("WORLD"));
    assert_ne!(hello, world, "different text should produce different frames");
}

fn render_hashes(request: &GenerationRequest) -> Vec<u64> {
    let prepared =
        PreparedRender::new(request, FontConfig::default()).expect("failed to prepare render");
    let mut frames = Vec::new();
    prepared
        .render_into(&mut frames, None)
        .expect("failed to render frames");
    frames.iter().map(|frame| fnv1a64(&frame.data)).collect()
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0001_0000_01b3);
    }
    hash
}
