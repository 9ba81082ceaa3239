use image::{Rgb, Rgba, RgbaImage};

use pixipaint::app::{InputEvent, PixiApp};
use pixipaint::camera::Camera;
use pixipaint::canvas::{Grid, LayeredCanvas, PixelTarget};
use pixipaint::color::{TRANSPARENT, blend_over};
use pixipaint::components::tools::{BrushType, Tool, ToolSession, brush_footprint, flood_fill, line_points, paint};
use pixipaint::error::CanvasError;
use pixipaint::io::{read_palette, write_palette};
use pixipaint::ops::scripting::run_script;
use pixipaint::project::Document;
use pixipaint::settings::AppSettings;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

#[test]
fn four_by_four_single_write() {
    let mut canvas = LayeredCanvas::new(4, 4);
    canvas.add_layer(Grid::new(4, 4), None).unwrap();
    canvas.write(1, 1, 0, RED).unwrap();

    for cell in canvas.composited().cells() {
        let expected = if (cell.x, cell.y) == (1, 1) { RED } else { TRANSPARENT };
        assert_eq!(cell.value, expected);
    }
}

#[test]
fn opaque_stacks_and_transparent_identity() {
    let colors = [RED, GREEN, Rgba([9, 8, 7, 255]), Rgba([1, 200, 30, 255])];
    for &bottom in &colors {
        for &top in &colors {
            let mut canvas = LayeredCanvas::new(1, 1);
            canvas.add_layer(Grid::new_filled(1, 1, bottom), None).unwrap();
            canvas.add_layer(Grid::new_filled(1, 1, top), None).unwrap();
            assert_eq!(canvas.compute_cell(0, 0).unwrap(), top);
        }
    }

    for c in [RED, Rgba([10, 20, 30, 128]), Rgba([0, 0, 0, 1])] {
        assert_eq!(blend_over(c, TRANSPARENT), c);
        assert_eq!(blend_over(TRANSPARENT, c), c);
    }

    let mut empty = LayeredCanvas::new(2, 2);
    empty.add_layer(Grid::new(2, 2), None).unwrap();
    empty.add_layer(Grid::new(2, 2), None).unwrap();
    assert_eq!(empty.compute_cell(1, 0).unwrap(), TRANSPARENT);
}

#[test]
fn green_over_half_red_is_green() {
    assert_eq!(blend_over(GREEN, Rgba([255, 0, 0, 128])), GREEN);
}

#[test]
fn camera_scenarios() {
    let mut camera = Camera::new(16, 16, 0.0, 0.0, 320, 320, 1.0);
    assert_eq!(camera.cell_size(), 20.0);
    assert_eq!(camera.screen_to_grid(45.0, 65.0), (2, 3));

    camera.zoom_on((100.0, 100.0), 2.0);
    assert_eq!(camera.position(), (-100.0, -100.0));
    assert_eq!(camera.scale(), 2.0);
}

#[test]
fn zoom_keeps_anchor_cell() {
    let origins = [(0.0, 0.0), (45.0, 65.0), (319.0, 7.5), (123.4, 250.0)];
    let scales = [0.25, 0.5, 1.0, 1.37, 3.0, 8.5];
    for &start in &scales {
        for &target in &scales {
            for &origin in &origins {
                let mut camera = Camera::new(16, 16, 13.0, -7.0, 320, 320, start);
                let before = camera.screen_to_grid(origin.0, origin.1);
                camera.zoom_on(origin, target);
                assert_eq!(
                    camera.screen_to_grid(origin.0, origin.1),
                    before,
                    "start {} target {} origin {:?}",
                    start,
                    target,
                    origin
                );
            }
        }
    }
}

#[test]
fn fill_uniform_grid_properties() {
    let mut grid = Grid::new_filled(6, 5, GREEN);
    assert_eq!(flood_fill(&mut grid, 3, 3, RED, 0.0), Ok(30));
    assert!(grid.cells().iter().all(|c| c.value == RED));

    let before = grid.clone();
    assert_eq!(flood_fill(&mut grid, 0, 0, RED, 0.0), Ok(0));
    assert_eq!(grid, before);

    assert!(matches!(
        flood_fill(&mut grid, 6, 0, GREEN, 0.0),
        Err(CanvasError::Bounds { x: 6, .. })
    ));
}

#[test]
fn bresenham_and_footprints() {
    assert_eq!(line_points((0, 0), (3, 3)), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    assert_eq!(brush_footprint(4, 4, 0, BrushType::Circle, (8, 8)).len(), 1);
    assert_eq!(brush_footprint(4, 4, 1, BrushType::Square, (8, 8)).len(), 4);
}

#[test]
fn edge_brush_paints_only_in_bounds_part() {
    let mut canvas = LayeredCanvas::new(8, 8);
    canvas.add_layer(Grid::new(8, 8), None).unwrap();
    let mut session = ToolSession::default();
    {
        let mut layer = canvas.layer_mut(0).unwrap();
        paint(&mut layer, 7, 7, RED, 5, BrushType::Square, &mut session);
        assert_eq!(layer.dimensions(), (8, 8));
    }
    let painted = canvas.composited().cells().iter().filter(|c| c.value == RED).count();
    // square radius 5 spans [3, 11] on each axis; [3, 7] survives the clip
    assert_eq!(painted, 25);
}

#[test]
fn editor_frames_drive_tools_and_render() {
    let mut app = PixiApp::new(AppSettings::default());
    app.frame(&[
        InputEvent::SetColor(RED),
        InputEvent::SetRadius(1),
        InputEvent::SetBrush(BrushType::Circle),
        InputEvent::PointerMoved { x: 110.0, y: 110.0 },
        InputEvent::PointerDown,
    ])
    .unwrap();
    app.frame(&[InputEvent::PointerUp]).unwrap();

    let canvas = &app.document().canvas;
    assert_eq!(canvas.composited().color(5, 5).unwrap(), RED);
    assert_eq!(canvas.composited().color(6, 5).unwrap(), RED);
    assert_eq!(canvas.composited().color(6, 6).unwrap(), TRANSPARENT);
    assert_eq!(app.document().display_title(), "Untitled-1*");

    app.frame(&[InputEvent::SelectTool(Tool::Eyedropper), InputEvent::SetColor(GREEN)])
        .unwrap();
    app.frame(&[InputEvent::PointerDown]).unwrap();
    assert_eq!(app.color(), RED);

    let mut surface = RgbaImage::new(320, 320);
    app.render(&mut surface);
    assert_eq!(*surface.get_pixel(112, 112), RED);
}

#[test]
fn script_and_palette_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let document = Document::new_untitled(1, 4, 4);
    let camera = Camera::new(4, 4, 0.0, 0.0, 40, 40, 1.0);
    let out = run_script(
        "set_color(\"#ff0000\"); fill(0, 0); set_color(0, 255, 0); line(0, 0, 0, 3);",
        document,
        camera,
    )
    .unwrap();
    assert_eq!(out.document.canvas.composited().color(0, 2).unwrap(), GREEN);
    assert_eq!(out.document.canvas.composited().color(3, 2).unwrap(), RED);

    let mut palette = pixipaint::components::palette::Palette::new("p", Vec::new(), 40, 20);
    palette.add_color(RED);
    palette.add_color(Rgba([1, 2, 3, 4]));
    let path = dir.path().join("p.pal");
    write_palette(&palette, &path).unwrap();
    let loaded = read_palette(&path, 40, 20).unwrap();
    assert_eq!(loaded.to_rgb(), vec![Rgb([255, 0, 0]), Rgb([1, 2, 3])]);
}
