use scroll_text::generator::PreparedRender;
use scroll_text::params::{Canvas, GenerationRequest, RenderParameters, Rgb8, TextMeasure};
use scroll_text::text::{FontConfig, TextRasterizer};

const BACKGROUND: Rgb8 = Rgb8::new(195, 255, 170);

fn request(text: &str, duration_seconds: u32, fps: u32, canvas: Canvas) -> GenerationRequest {
    GenerationRequest {
        text: text.to_owned(),
        duration_seconds,
        canvas,
        fps,
        text_color: Rgb8::BLACK,
        background_color: BACKGROUND,
    }
}

fn render_all(request: &GenerationRequest) -> (RenderParameters, Vec<scroll_text::frames::Frame>) {
    let prepared = PreparedRender::new(request, FontConfig::default()).expect("prepare render");
    let mut frames = Vec::new();
    prepared.render_into(&mut frames, None).expect("render frames");
    (prepared.params, frames)
}

fn is_background(frame: &scroll_text::frames::Frame) -> bool {
    frame
        .data
        .chunks_exact(4)
        .all(|px| px == BACKGROUND.to_rgba())
}

#[test]
fn hello_scenario_scrolls_from_right_edge() {
    let request = request("HELLO", 1, 10, Canvas::new(200, 100));
    let (params, frames) = render_all(&request);

    assert_eq!(frames.len(), 10);
    assert!(frames
        .iter()
        .all(|frame| frame.width == 200 && frame.height == 100));

    let text_width = TextRasterizer::new(FontConfig::default())
        .unwrap()
        .measure("HELLO")
        .width;
    let velocity = (200.0 + f64::from(text_width)) / 10.0;
    assert_eq!(params.velocity, velocity);

    assert_eq!(frames[0].text_x, 200);
    assert!(is_background(&frames[0]), "frame 0 starts fully off-canvas");
    assert_eq!(frames[9].text_x, (200.0 - 9.0 * velocity).round() as i32);
    assert!(frames[1..9].iter().any(|frame| !is_background(frame)));
}

#[test]
fn frame_count_matches_duration_times_fps() {
    for (duration, fps) in [(1, 1), (1, 24), (2, 5), (3, 7)] {
        let request = request("Hi", duration, fps, Canvas::new(40, 20));
        let (_, frames) = render_all(&request);
        assert_eq!(frames.len() as u64, u64::from(duration * fps));
    }
}

#[test]
fn every_frame_matches_canvas_size() {
    for canvas in [Canvas::new(2, 2), Canvas::new(64, 8), Canvas::new(100, 100), Canvas::new(320, 180)] {
        let request = request("size", 1, 3, canvas);
        let (_, frames) = render_all(&request);
        for frame in frames {
            assert_eq!((frame.width, frame.height), (canvas.width, canvas.height));
            assert_eq!(frame.data.len(), canvas.frame_len());
        }
    }
}

#[test]
fn travel_ends_fully_off_left_edge() {
    let request = request("Scrolling text", 3, 24, Canvas::new(100, 100));
    let prepared = PreparedRender::new(&request, FontConfig::default()).unwrap();
    let params = prepared.params;

    let mut positions = params.positions();
    let collected = positions.by_ref().collect::<Vec<_>>();
    assert_eq!(collected.len(), 72);
    assert_eq!(collected[0], 100);
    assert!((positions.running_x() - params.end_x()).abs() <= 1.0);
    assert_eq!(
        params.end_x(),
        100.0 - params.travel_distance,
        "text ends one full text width beyond the left edge"
    );
}

#[test]
fn text_is_vertically_centred_on_baseline() {
    let request = request("HELLO", 1, 10, Canvas::new(200, 100));
    let raster = TextRasterizer::new(FontConfig::default()).unwrap();
    let params = RenderParameters::derive(&request, &raster);
    let extent = raster.measure("HELLO");
    assert_eq!(params.baseline_y as u32, 50 + extent.height / 2);
}

#[test]
fn zero_duration_never_divides_by_zero() {
    let request = request("HELLO", 0, 24, Canvas::new(100, 100));
    let raster = TextRasterizer::new(FontConfig::default()).unwrap();
    let params = RenderParameters::derive(&request, &raster);
    assert!(params.is_empty());
    assert!(params.velocity.is_finite());
    assert_eq!(params.positions().count(), 0);
    assert!(request.validate().is_err(), "the boundary rejects zero duration");
}

#[test]
fn overhanging_glyphs_start_and_end_off_canvas() {
    for text in ["j", "jump", "Jj", "\u{192}"] {
        let request = request(text, 1, 10, Canvas::new(200, 100));
        let prepared = PreparedRender::new(&request, FontConfig::default()).expect("prepare render");
        let params = prepared.params;

        let first = prepared.frame_at(0).expect("first frame");
        assert_eq!(first.text_x, 200);
        assert!(is_background(&first), "{text:?} leaks onto frame 0");

        let end_x = params.end_x().round() as i32;
        let gone = prepared.renderer.render_at(params.frame_count, end_x);
        assert!(is_background(&gone), "{text:?} still visible at the end position");

        let (_, frames) = render_all(&request);
        assert!(
            frames.iter().any(|frame| !is_background(frame)),
            "{text:?} never appears"
        );
    }
}
