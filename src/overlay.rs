use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut},
    rect::Rect,
};
use logging_timer::time;

use crate::{
    bubbles::Grid,
    decision::{Answer, QuestionDecision},
    image_utils::{GREEN, RED},
};

/// Marks drawn over the sheet for someone checking the result by eye.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OverlayStyle {
    pub selected_color: Rgb<u8>,
    pub unanswered_color: Rgb<u8>,
    /// Stroke width in pixels.
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            selected_color: GREEN,
            unanswered_color: RED,
            thickness: 2,
        }
    }
}

/// Draws a circle on each selected cell and a box around each unanswered
/// row, on a copy of `sheet`.
#[time]
pub fn render(
    sheet: &RgbImage,
    grid: &Grid,
    decisions: &[QuestionDecision],
    style: &OverlayStyle,
) -> RgbImage {
    let mut canvas = sheet.clone();
    for decision in decisions {
        let row = decision.question - 1;
        match decision.answer {
            Answer::Selected(label) => {
                draw_selection_mut(&mut canvas, grid, row, label.index(), style)
            }
            Answer::Unanswered => draw_unanswered_row_mut(&mut canvas, grid, row, style),
        }
    }
    canvas
}

fn draw_selection_mut(
    canvas: &mut RgbImage,
    grid: &Grid,
    row: u32,
    column: u32,
    style: &OverlayStyle,
) {
    let cell = grid.cell_size;
    let center = (
        ((column as f32 + 0.5) * cell.width as f32) as i32,
        ((row as f32 + 0.5) * cell.height as f32) as i32,
    );
    let radius = (cell.width.min(cell.height) / 6) as i32;

    for offset in 0..style.thickness as i32 {
        draw_hollow_circle_mut(canvas, center, radius + offset, style.selected_color);
    }
}

fn draw_unanswered_row_mut(canvas: &mut RgbImage, grid: &Grid, row: u32, style: &OverlayStyle) {
    let top = (row * grid.cell_size.height) as i32;
    let width = canvas.width();
    let height = grid.cell_size.height;

    for inset in 0..style.thickness {
        if width <= 2 * inset || height <= 2 * inset {
            break;
        }
        let rect = Rect::at(inset as i32, top + inset as i32)
            .of_size(width - 2 * inset, height - 2 * inset);
        draw_hollow_rect_mut(canvas, rect, style.unanswered_color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bubbles::{extract, BinaryMask, RowScores},
        decision::DecisionRule,
        image_utils::WHITE_RGB,
    };

    fn blank_grid(width: u32, height: u32, rows: u32, choices: u32) -> Grid {
        extract(&BinaryMask(image::GrayImage::new(width, height)), rows, choices)
    }

    #[test]
    fn marks_selection_and_flags_unanswered_rows() {
        let sheet = RgbImage::from_pixel(120, 60, WHITE_RGB);
        let grid = blank_grid(120, 60, 2, 4);
        let rule = DecisionRule::default();
        let decisions = vec![
            rule.decide_row(1, &RowScores::new(vec![0.0, 0.9, 0.0, 0.0])),
            rule.decide_row(2, &RowScores::new(vec![0.0, 0.0, 0.0, 0.0])),
        ];

        let overlay = render(&sheet, &grid, &decisions, &OverlayStyle::default());

        // cells are 30x30; the circle for B is centred at (45, 15) with radius 5
        assert_eq!(*overlay.get_pixel(50, 15), GREEN);
        assert_eq!(*overlay.get_pixel(45, 15), WHITE_RGB);
        // row 2 spans y 30..60 and is boxed edge to edge
        assert_eq!(*overlay.get_pixel(0, 45), RED);
        assert_eq!(*overlay.get_pixel(119, 45), RED);
        assert_eq!(*overlay.get_pixel(60, 30), RED);
        assert_eq!(*overlay.get_pixel(60, 45), WHITE_RGB);

        // the input is untouched
        assert!(sheet.pixels().all(|p| *p == WHITE_RGB));
    }

    #[test]
    fn degenerate_cells_draw_nothing() {
        let sheet = RgbImage::from_pixel(3, 3, WHITE_RGB);
        let grid = blank_grid(3, 3, 10, 4);
        let decisions = DecisionRule::default().decide(&grid);
        let overlay = render(&sheet, &grid, &decisions, &OverlayStyle::default());
        assert_eq!(overlay, sheet);
    }
}
