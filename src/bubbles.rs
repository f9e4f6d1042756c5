use image::GrayImage;
use imageproc::{filter::gaussian_blur_f32, rect::Rect};
use log::debug;
use logging_timer::time;

use crate::{
    document::RectifiedSheet,
    image_utils::{adaptive_threshold_inverted, count_nonzero_in_rect, to_gray},
    types::{ChoiceLabel, QuestionNumber, Size},
};

/// Settings for turning a rectified sheet into an ink mask.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BinarizeOptions {
    pub blur_sigma: f32,
    /// Side of the square neighbourhood the local mean is taken over. Odd.
    pub window: u32,
    /// How much darker than its neighbourhood a pixel must be to count as ink.
    pub offset: i32,
}

impl Default for BinarizeOptions {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            window: 25,
            offset: 10,
        }
    }
}

/// Single-channel mask of a sheet where ink is non-zero.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryMask(pub GrayImage);

impl BinaryMask {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

#[time]
pub fn binarize(sheet: &RectifiedSheet, options: &BinarizeOptions) -> BinaryMask {
    let gray = to_gray(&sheet.image);
    let blurred = gaussian_blur_f32(&gray, options.blur_sigma);
    BinaryMask(adaptive_threshold_inverted(
        &blurred,
        options.window,
        options.offset,
    ))
}

/// The fill fractions of one question's choices, in label order.
#[derive(Clone, Debug, PartialEq)]
pub struct RowScores {
    scores: Vec<f64>,
}

impl RowScores {
    pub fn new(scores: Vec<f64>) -> Self {
        Self { scores }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn get(&self, label: ChoiceLabel) -> Option<f64> {
        self.scores.get(label.index() as usize).copied()
    }

    /// Labels paired with their fill fractions, `A` first.
    pub fn iter(&self) -> impl Iterator<Item = (ChoiceLabel, f64)> + '_ {
        self.scores.iter().enumerate().filter_map(|(i, score)| {
            ChoiceLabel::from_index(i as u32).map(|label| (label, *score))
        })
    }

    /// Labels ordered from most to least filled. Equal scores keep label order.
    pub fn ranked(&self) -> Vec<(ChoiceLabel, f64)> {
        let mut ranked = self.iter().collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// The sheet divided into `rows` equal bands of `choices` equal cells.
///
/// Cell sizes are the mask size divided by the grid size, rounded down, so
/// any remainder at the right and bottom edges belongs to no cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    pub rows: u32,
    pub choices: u32,
    pub cell_size: Size<u32>,
    rows_scores: Vec<RowScores>,
}

impl Grid {
    /// The cell for zero-based `row` and `column`.
    pub fn cell_rect(&self, row: u32, column: u32) -> Option<Rect> {
        if self.cell_size.width == 0 || self.cell_size.height == 0 {
            return None;
        }
        Some(
            Rect::at(
                (column * self.cell_size.width) as i32,
                (row * self.cell_size.height) as i32,
            )
            .of_size(self.cell_size.width, self.cell_size.height),
        )
    }

    /// Scores for a one-based question number.
    pub fn row(&self, question: QuestionNumber) -> Option<&RowScores> {
        let index = question.checked_sub(1)?;
        self.rows_scores.get(index as usize)
    }

    /// Rows with their one-based question numbers, top to bottom.
    pub fn iter_rows(&self) -> impl Iterator<Item = (QuestionNumber, &RowScores)> {
        self.rows_scores
            .iter()
            .enumerate()
            .map(|(i, scores)| (i as QuestionNumber + 1, scores))
    }
}

/// Measures the ink fraction of every cell in a `rows` by `choices` grid.
#[time]
pub fn extract(mask: &BinaryMask, rows: u32, choices: u32) -> Grid {
    let cell_size = Size {
        width: mask.width() / choices,
        height: mask.height() / rows,
    };
    debug!(
        "{}x{} mask split into {}x{} cells of {}x{}",
        mask.width(),
        mask.height(),
        rows,
        choices,
        cell_size.width,
        cell_size.height
    );

    let mut grid = Grid {
        rows,
        choices,
        cell_size,
        rows_scores: Vec::with_capacity(rows as usize),
    };

    let area = f64::from(cell_size.width) * f64::from(cell_size.height);
    for row in 0..rows {
        let scores = (0..choices)
            .map(|column| match grid.cell_rect(row, column) {
                Some(rect) => f64::from(count_nonzero_in_rect(&mask.0, &rect)) / area,
                None => 0.0,
            })
            .collect();
        grid.rows_scores.push(RowScores::new(scores));
    }

    grid
}
