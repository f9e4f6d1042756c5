use image::{GrayImage, RgbImage};
use imageproc::{
    contours::find_contours,
    edges::canny,
    filter::gaussian_blur_f32,
    geometric_transformations::{warp_into, Interpolation, Projection},
    geometry::arc_length,
    point::Point,
};
use log::{debug, warn};
use logging_timer::time;

use crate::{
    geometry::{approximate_closed_polygon, polygon_area, OrderedCorners, Quadrilateral},
    image_utils::{to_gray, BLACK_RGB},
};

/// Settings for locating the sheet boundary in a photo or scan.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundaryOptions {
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// How many of the largest contours are tried, largest first.
    pub max_candidates: usize,
    /// Polygon approximation tolerance as a fraction of contour perimeter.
    pub approx_epsilon_ratio: f64,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            canny_low: 50.0,
            canny_high: 200.0,
            max_candidates: 10,
            approx_epsilon_ratio: 0.02,
        }
    }
}

/// A sheet image in canonical top-down orientation.
#[derive(Clone, Debug)]
pub struct RectifiedSheet {
    pub image: RgbImage,
    /// The boundary the image was rectified from, or `None` if no boundary
    /// was found and the input is used as is.
    pub boundary: Option<OrderedCorners>,
}

impl RectifiedSheet {
    /// Wraps an image that is already top-down.
    pub fn unrectified(image: RgbImage) -> Self {
        Self {
            image,
            boundary: None,
        }
    }

    pub fn was_rectified(&self) -> bool {
        self.boundary.is_some()
    }
}

/// Finds the largest contour that simplifies to exactly four vertices.
#[time]
pub fn find_document_boundary(
    gray: &GrayImage,
    options: &BoundaryOptions,
) -> Option<Quadrilateral> {
    let blurred = gaussian_blur_f32(gray, options.blur_sigma);
    let edges = canny(&blurred, options.canny_low, options.canny_high);
    let contours = find_contours::<i32>(&edges);
    debug!("found {} contours", contours.len());

    let mut candidates = contours
        .iter()
        .map(|contour| (polygon_area(&contour.points), contour.points.as_slice()))
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    candidates
        .into_iter()
        .take(options.max_candidates)
        .find_map(|(area, points)| {
            let perimeter = arc_length(points, true);
            let approx =
                approximate_closed_polygon(points, options.approx_epsilon_ratio * perimeter);
            if approx.len() != 4 {
                return None;
            }

            debug!("accepted boundary with area {:.1}: {:?}", area, approx);
            let corners = [approx[0], approx[1], approx[2], approx[3]]
                .map(|p| Point::new(p.x as f32, p.y as f32));
            Some(Quadrilateral::new(corners))
        })
}

/// Warps the region bounded by `corners` onto an upright canvas whose size
/// is given by the longer of each pair of opposing edges. Returns `None` for
/// degenerate boundaries.
#[time]
pub fn four_point_transform(img: &RgbImage, corners: &OrderedCorners) -> Option<RgbImage> {
    let size = corners.canvas_size();
    if size.width == 0 || size.height == 0 {
        return None;
    }

    let right = (size.width - 1) as f32;
    let bottom = (size.height - 1) as f32;
    let destination = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];
    let projection = Projection::from_control_points(corners.as_control_points(), destination)?;

    let mut out = RgbImage::new(size.width, size.height);
    warp_into(img, &projection, Interpolation::Bilinear, BLACK_RGB, &mut out);
    Some(out)
}

/// Finds the sheet boundary and rectifies the image to it.
///
/// When no four-cornered boundary is found among the candidates, or the
/// boundary is degenerate, the whole input is taken to be the sheet.
#[time]
pub fn normalize(img: &RgbImage, options: &BoundaryOptions) -> RectifiedSheet {
    let gray = to_gray(img);

    let Some(boundary) = find_document_boundary(&gray, options) else {
        warn!("no sheet boundary found; using the image as is");
        return RectifiedSheet::unrectified(img.clone());
    };

    let corners = boundary.order_corners();
    match four_point_transform(img, &corners) {
        Some(image) => {
            debug!(
                "rectified {}x{} image to {}x{}",
                img.width(),
                img.height(),
                image.width(),
                image.height()
            );
            RectifiedSheet {
                image,
                boundary: Some(corners),
            }
        }
        None => {
            warn!("sheet boundary {:?} is degenerate; using the image as is", corners);
            RectifiedSheet::unrectified(img.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;
    use imageproc::drawing::draw_polygon_mut;

    use super::*;
    use crate::image_utils::WHITE_RGB;

    fn page_on_dark_background(corners: &[(i32, i32)]) -> RgbImage {
        let mut img = RgbImage::from_pixel(320, 400, Rgb([30, 30, 30]));
        let points = corners
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect::<Vec<_>>();
        draw_polygon_mut(&mut img, &points, WHITE_RGB);
        img
    }

    fn assert_near(actual: Point<f32>, expected: (f32, f32)) {
        assert!(
            (actual.x - expected.0).abs() <= 5.0 && (actual.y - expected.1).abs() <= 5.0,
            "{:?} is not near {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn finds_skewed_page() {
        let img = page_on_dark_background(&[(60, 40), (260, 60), (250, 350), (40, 330)]);
        let quad = find_document_boundary(&to_gray(&img), &BoundaryOptions::default())
            .expect("page boundary is found");
        let corners = quad.order_corners();

        assert_near(corners.top_left, (60.0, 40.0));
        assert_near(corners.top_right, (260.0, 60.0));
        assert_near(corners.bottom_right, (250.0, 350.0));
        assert_near(corners.bottom_left, (40.0, 330.0));
    }

    #[test]
    fn rectifies_to_page_size() {
        let img = page_on_dark_background(&[(60, 40), (260, 60), (250, 350), (40, 330)]);
        let sheet = normalize(&img, &BoundaryOptions::default());

        assert!(sheet.was_rectified());
        let (width, height) = sheet.image.dimensions();
        assert!((width as i32 - 210).abs() <= 8, "width {}", width);
        assert!((height as i32 - 290).abs() <= 8, "height {}", height);

        // the middle of the page is paper, not background
        let center = sheet.image.get_pixel(width / 2, height / 2);
        assert!(center.0[0] > 200);
    }

    #[test]
    fn blank_image_is_used_as_is() {
        let img = RgbImage::from_pixel(120, 90, WHITE_RGB);
        let sheet = normalize(&img, &BoundaryOptions::default());

        assert!(!sheet.was_rectified());
        assert_eq!(sheet.image, img);
    }

    #[test]
    fn degenerate_boundary_is_rejected() {
        let img = RgbImage::from_pixel(10, 10, WHITE_RGB);
        let corners = Quadrilateral::new([Point::new(3.0, 3.0); 4]).order_corners();
        assert!(four_point_transform(&img, &corners).is_none());
    }
}
