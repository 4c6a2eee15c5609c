// src/core/imaging/filters.rs
//! Pixel-level primitives shared by the segmenter, quality scorer and
//! feature extractor. Borders are handled by reflection without repeating
//! the edge pixel (`gfedcb|abcdefgh|gfedcba`).

use image::{GrayImage, Luma, RgbImage};

/// Fixed 7-tap Gaussian used when no sigma is supplied for a 7x7 kernel.
pub const GAUSSIAN_7: [f32; 7] = [0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125];

#[inline]
pub fn reflect101(index: i64, len: usize) -> usize {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * (len - 1) - i;
        } else {
            return i as usize;
        }
    }
}

#[inline]
pub fn saturate_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Luma with fixed-point weights 0.299 R + 0.587 G + 0.114 B.
pub fn to_gray(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let value = (r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14;
        Luma([value.min(255) as u8])
    })
}

pub fn equalize_histogram(image: &GrayImage) -> GrayImage {
    let total = (image.width() * image.height()) as u64;
    if total == 0 {
        return image.clone();
    }

    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let first = histogram.iter().position(|&count| count > 0).unwrap_or(0);
    let mut lut = [0u8; 256];
    if histogram[first] == total {
        // Single-valued image: leave it as it is.
        lut.iter_mut().for_each(|v| *v = first as u8);
    } else {
        let scale = 255.0 / (total - histogram[first]) as f64;
        let mut sum = 0u64;
        for level in (first + 1)..256 {
            sum += histogram[level];
            lut[level] = saturate_u8(sum as f64 * scale);
        }
    }

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    out
}

pub fn separable_filter(image: &GrayImage, kernel: &[f32]) -> GrayImage {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let radius = (kernel.len() / 2) as i64;
    let src = image.as_raw();

    let mut horizontal = vec![0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = reflect101(x as i64 + k as i64 - radius, width);
                acc += weight * src[y * width + sx] as f32;
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut out = GrayImage::new(image.width(), image.height());
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect101(y as i64 + k as i64 - radius, height);
                acc += weight * horizontal[sy * width + x];
            }
            out.put_pixel(x as u32, y as u32, Luma([saturate_u8(acc as f64)]));
        }
    }
    out
}

pub fn gaussian_blur_7x7(image: &GrayImage) -> GrayImage {
    separable_filter(image, &GAUSSIAN_7)
}

/// Correlates `image` with a square `ksize` x `ksize` kernel anchored at its
/// centre. Returns the unsaturated response, row-major.
pub fn filter2d(image: &GrayImage, kernel: &[f64], ksize: usize) -> Vec<f64> {
    debug_assert_eq!(kernel.len(), ksize * ksize);
    let (width, height) = (image.width() as usize, image.height() as usize);
    let anchor = (ksize / 2) as i64;
    let src = image.as_raw();

    // Reflected column indices per output column avoid recomputing them per tap.
    let columns: Vec<Vec<usize>> = (0..width)
        .map(|x| (0..ksize).map(|k| reflect101(x as i64 + k as i64 - anchor, width)).collect())
        .collect();

    let mut out = vec![0f64; width * height];
    for y in 0..height {
        let rows: Vec<usize> = (0..ksize)
            .map(|k| reflect101(y as i64 + k as i64 - anchor, height))
            .collect();
        for x in 0..width {
            let cols = &columns[x];
            let mut acc = 0f64;
            for (ky, &sy) in rows.iter().enumerate() {
                let row = &src[sy * width..(sy + 1) * width];
                let weights = &kernel[ky * ksize..(ky + 1) * ksize];
                for (weight, &sx) in weights.iter().zip(cols.iter()) {
                    acc += weight * row[sx] as f64;
                }
            }
            out[y * width + x] = acc;
        }
    }
    out
}

/// 4-neighbour Laplacian (aperture 1).
pub fn laplacian(image: &GrayImage) -> Vec<f64> {
    const KERNEL: [f64; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];
    filter2d(image, &KERNEL, 3)
}

/// 3x3 Sobel derivatives.
pub fn sobel(image: &GrayImage) -> (Vec<i32>, Vec<i32>) {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let src = image.as_raw();
    let at = |x: i64, y: i64| -> i32 {
        src[reflect101(y, height) * width + reflect101(x, width)] as i32
    };

    let mut dx = vec![0i32; width * height];
    let mut dy = vec![0i32; width * height];
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            let idx = y as usize * width + x as usize;
            dx[idx] = gx;
            dy[idx] = gy;
        }
    }
    (dx, dy)
}

/// Bilinear resize sampling at pixel centres, clamped at the borders.
pub fn resize_bilinear(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = (image.width() as usize, image.height() as usize);
    if src_w == 0 || src_h == 0 {
        return GrayImage::new(width, height);
    }
    let scale_x = src_w as f64 / width as f64;
    let scale_y = src_h as f64 / height as f64;
    let src = image.as_raw();

    let sample = |coord: f64, len: usize| -> (usize, usize, f64) {
        let clamped = coord.max(0.0);
        let lower = (clamped.floor() as usize).min(len - 1);
        let upper = (lower + 1).min(len - 1);
        let frac = if lower == len - 1 { 0.0 } else { clamped - lower as f64 };
        (lower, upper, frac)
    };

    GrayImage::from_fn(width, height, |x, y| {
        let (x0, x1, fx) = sample((x as f64 + 0.5) * scale_x - 0.5, src_w);
        let (y0, y1, fy) = sample((y as f64 + 0.5) * scale_y - 0.5, src_h);
        let p = |xx: usize, yy: usize| src[yy * src_w + xx] as f64;
        let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
        let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
        Luma([saturate_u8(top * (1.0 - fy) + bottom * fy)])
    })
}

pub fn mean_and_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values.clone().fold((0usize, 0f64), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
    (mean, variance.sqrt())
}
