use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;

pub const WHITE: Luma<u8> = Luma([u8::MAX]);
pub const BLACK: Luma<u8> = Luma([u8::MIN]);

pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const BLACK_RGB: Rgb<u8> = Rgb([0, 0, 0]);
pub const WHITE_RGB: Rgb<u8> = Rgb([255, 255, 255]);

pub fn to_gray(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

/// Gaussian sigma matching a square kernel of `window` pixels, the way
/// OpenCV derives it when no sigma is given.
pub fn sigma_for_window(window: u32) -> f32 {
    0.3 * ((window as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Binarizes `img` against a Gaussian-weighted local mean over a `window`
/// neighbourhood, with inverted polarity: a pixel becomes [`WHITE`] (ink)
/// when it is at least `offset` darker than its local mean, and [`BLACK`]
/// otherwise.
///
/// Unlike a single global level this follows uneven lighting across a
/// photographed page.
pub fn adaptive_threshold_inverted(img: &GrayImage, window: u32, offset: i32) -> GrayImage {
    let local_mean = gaussian_blur_f32(img, sigma_for_window(window));
    let mut out = GrayImage::new(img.width(), img.height());

    for (x, y, pixel) in img.enumerate_pixels() {
        let mean = i32::from(local_mean.get_pixel(x, y).0[0]);
        let value = i32::from(pixel.0[0]);
        let ink = value - mean <= -offset;
        out.put_pixel(x, y, if ink { WHITE } else { BLACK });
    }

    out
}

/// Determines the number of pixels inside `rect` that are not black. The
/// part of `rect` outside the image is ignored.
pub fn count_nonzero_in_rect(img: &GrayImage, rect: &Rect) -> u32 {
    let left = rect.left().max(0) as u32;
    let top = rect.top().max(0) as u32;
    let right = (rect.right() + 1).clamp(0, img.width() as i32) as u32;
    let bottom = (rect.bottom() + 1).clamp(0, img.height() as i32) as u32;

    let mut count = 0;
    for y in top..bottom {
        for x in left..right {
            if img.get_pixel(x, y).0[0] != 0 {
                count += 1;
            }
        }
    }
    count
}
