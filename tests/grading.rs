use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_polygon_mut},
    point::Point,
    rect::Rect,
};
use omr_grader::{
    document::RectifiedSheet, grade, grade_rectified, types::SubjectId, Answer, AnswerKey,
    ChoiceLabel, GradeOptions,
};
use proptest::prelude::*;

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([20, 20, 20]);

/// A top-down sheet with 40x20 cells, four choices per row.
fn sheet_with_marks(rows: u32, marks: &[(u32, u32)]) -> RgbImage {
    let mut img = RgbImage::from_pixel(160, rows * 20, PAPER);
    for &(question, column) in marks {
        let x = (column * 40 + 6) as i32;
        let y = ((question - 1) * 20 + 3) as i32;
        draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(28, 14), INK);
    }
    img
}

fn label(index: u32) -> ChoiceLabel {
    ChoiceLabel::from_index(index).unwrap()
}

fn page_on_dark_background() -> RgbImage {
    let mut img = RgbImage::from_pixel(320, 400, Rgb([30, 30, 30]));
    let page = [(60, 40), (260, 60), (250, 350), (40, 330)].map(|(x, y)| Point::new(x, y));
    draw_polygon_mut(&mut img, &page, PAPER);
    img
}

#[test]
fn reads_marked_sheet_and_scores_subjects() {
    // question q is marked at column q % 4, except 5 (blank) and 6 (two marks)
    let mut marks = (1..=25)
        .filter(|q| *q != 5 && *q != 6)
        .map(|q| (q, q % 4))
        .collect::<Vec<_>>();
    marks.push((6, 0));
    marks.push((6, 3));
    let sheet = RectifiedSheet::unrectified(sheet_with_marks(25, &marks));
    let key = AnswerKey::from_entries((1..=25).map(|q| (q, label(q % 4))));

    let result = grade_rectified(&sheet, &key, &GradeOptions::default()).unwrap();

    assert_eq!(result.answers.len(), 100);
    for q in 1..=25 {
        let expected = if q == 5 || q == 6 {
            Answer::Unanswered
        } else {
            Answer::Selected(label(q % 4))
        };
        assert_eq!(result.answers[&q], expected, "question {}", q);
    }
    assert!((26..=100).all(|q| result.answers[&q] == Answer::Unanswered));

    assert_eq!(result.subject_scores.get(&SubjectId::numbered(1)), Some(18));
    assert_eq!(result.subject_scores.get(&SubjectId::numbered(2)), Some(5));
    assert_eq!(result.subject_scores.get(&SubjectId::numbered(3)), Some(0));
    assert_eq!(result.total_score, 23);
    assert_eq!(result.decisions.len(), 25);
    assert_eq!(result.overlay.dimensions(), (160, 500));
}

#[test]
fn wrong_answers_and_unkeyed_questions_do_not_score() {
    let marks = [(1, 0), (2, 1), (3, 2)];
    let sheet = RectifiedSheet::unrectified(sheet_with_marks(3, &marks));
    // question 2 is keyed wrong and question 3 has no key entry
    let key = AnswerKey::from_json_str(r#"{"1": "A", "2": "D"}"#).unwrap();
    let options = GradeOptions {
        questions: 3,
        rows: 3,
        subject_count: 3,
        per_subject: 1,
        ..Default::default()
    };

    let result = grade_rectified(&sheet, &key, &options).unwrap();

    assert_eq!(result.answers[&3], Answer::Selected(label(2)));
    let scores = result
        .subject_scores
        .iter()
        .map(|(_, correct)| *correct)
        .collect::<Vec<_>>();
    assert_eq!(scores, vec![1, 0, 0]);
    assert_eq!(result.total_score, 1);
}

#[test]
fn blank_image_is_graded_without_rectification() {
    let img = RgbImage::from_pixel(300, 400, PAPER);
    let key = AnswerKey::from_json_str(r#"{"1": "A"}"#).unwrap();

    let result = grade(&img, &key, &GradeOptions::default()).unwrap();

    assert!(!result.rectified);
    assert_eq!(result.overlay.dimensions(), (300, 400));
    assert_eq!(result.answers.len(), 100);
    assert!(result.answers.values().all(|a| *a == Answer::Unanswered));
    assert_eq!(result.total_score, 0);
}

#[test]
fn photographed_page_is_rectified_before_grading() {
    let img = page_on_dark_background();
    let result = grade(&img, &AnswerKey::default(), &GradeOptions::default()).unwrap();

    assert!(result.rectified);
    let (width, height) = result.overlay.dimensions();
    assert!((width as i32 - 210).abs() <= 8, "width {}", width);
    assert!((height as i32 - 290).abs() <= 8, "height {}", height);
    assert_eq!(result.answers.len(), 100);
    assert_eq!(
        result.total_score,
        result.subject_scores.iter().map(|(_, c)| c).sum::<u32>()
    );
}

#[test]
fn grading_is_repeatable() {
    let img = page_on_dark_background();
    let key = AnswerKey::from_entries((1..=100).map(|q| (q, label(q % 4))));
    let options = GradeOptions::default();

    let first = grade(&img, &key, &options).unwrap();
    let second = grade(&img, &key, &options).unwrap();

    assert_eq!(first.answers, second.answers);
    assert_eq!(first.subject_scores, second.subject_scores);
    assert_eq!(first.total_score, second.total_score);
    assert_eq!(first.overlay, second.overlay);
}

#[test]
fn invalid_options_are_rejected() {
    let img = RgbImage::from_pixel(10, 10, PAPER);
    let options = GradeOptions {
        choices: 0,
        ..Default::default()
    };
    assert!(grade(&img, &AnswerKey::default(), &options).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn every_question_gets_a_valid_answer(
        pixels in prop::collection::vec(any::<u8>(), 48 * 40),
        questions in 1u32..40,
        rows in 1u32..30,
        choices in 1u32..6,
    ) {
        let img = RgbImage::from_fn(48, 40, |x, y| {
            let v = pixels[(y * 48 + x) as usize];
            Rgb([v, v, v])
        });
        let options = GradeOptions { questions, rows, choices, ..Default::default() };
        let key = AnswerKey::from_entries((1..=questions).map(|q| (q, label(q % choices))));

        let result = grade(&img, &key, &options).unwrap();

        prop_assert_eq!(result.answers.len() as u32, questions);
        prop_assert!(result.answers.keys().copied().eq(1..=questions));
        for answer in result.answers.values() {
            if let Answer::Selected(label) = answer {
                prop_assert!(label.index() < choices);
            }
        }
        prop_assert_eq!(
            result.total_score,
            result.subject_scores.iter().map(|(_, c)| c).sum::<u32>()
        );
    }
}
