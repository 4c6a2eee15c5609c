// src/core/imaging/hough.rs
//! Gradient Hough transform for circles: Canny edges vote along their
//! gradient direction, accumulator peaks become centre candidates ordered by
//! vote count, and each surviving centre gets the radius best supported by
//! the edge points around it.

use image::GrayImage;
use std::collections::VecDeque;

use super::filters::sobel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
    /// Inverse accumulator resolution.
    pub dp: f64,
    /// Minimum distance between reported centres.
    pub min_dist: f64,
    /// Upper Canny threshold; the lower one is half of it.
    pub canny_threshold: f64,
    /// Votes a centre (and its radius) needs to be reported.
    pub acc_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            dp: 1.0,
            min_dist: 20.0,
            canny_threshold: 50.0,
            acc_threshold: 30,
            min_radius: 10,
            max_radius: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub votes: u32,
}

/// Binary edge map (L1 gradient magnitude, non-maximum suppression,
/// 8-connected hysteresis).
pub fn canny(dx: &[i32], dy: &[i32], width: usize, height: usize, low: f64, high: f64) -> Vec<bool> {
    let magnitude: Vec<i32> = dx.iter().zip(dy).map(|(a, b)| a.abs() + b.abs()).collect();
    let mag = |x: i64, y: i64| -> i32 {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            0
        } else {
            magnitude[y as usize * width + x as usize]
        }
    };

    const TAN_22_5: f64 = 0.414_213_562;
    const TAN_67_5: f64 = 2.414_213_562;

    // 0 = suppressed, 1 = weak candidate, 2 = strong
    let mut class = vec![0u8; width * height];
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let idx = y as usize * width + x as usize;
            let m = magnitude[idx];
            if (m as f64) <= low {
                continue;
            }
            let (gx, gy) = (dx[idx], dy[idx]);
            let (ax, ay) = (gx.abs() as f64, gy.abs() as f64);

            let is_max = if ay <= ax * TAN_22_5 {
                m > mag(x - 1, y) && m >= mag(x + 1, y)
            } else if ay > ax * TAN_67_5 {
                m > mag(x, y - 1) && m >= mag(x, y + 1)
            } else if (gx >= 0) == (gy >= 0) {
                m > mag(x - 1, y - 1) && m > mag(x + 1, y + 1)
            } else {
                m > mag(x + 1, y - 1) && m > mag(x - 1, y + 1)
            };

            if is_max {
                class[idx] = if (m as f64) > high { 2 } else { 1 };
            }
        }
    }

    let mut edges = vec![false; width * height];
    let mut queue: VecDeque<usize> = class
        .iter()
        .enumerate()
        .filter(|(_, &c)| c == 2)
        .map(|(i, _)| i)
        .collect();
    for &idx in &queue {
        edges[idx] = true;
    }

    while let Some(idx) = queue.pop_front() {
        let (x, y) = ((idx % width) as i64, (idx / width) as i64);
        for ny in (y - 1)..=(y + 1) {
            for nx in (x - 1)..=(x + 1) {
                if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                    continue;
                }
                let n = ny as usize * width + nx as usize;
                if !edges[n] && class[n] == 1 {
                    edges[n] = true;
                    queue.push_back(n);
                }
            }
        }
    }

    edges
}

/// Detects circles in an already smoothed grayscale image. Circles are
/// returned strongest centre first.
pub fn detect_circles(image: &GrayImage, params: &HoughParams) -> Vec<Circle> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    if width < 3 || height < 3 || params.dp <= 0.0 || params.max_radius < params.min_radius {
        return Vec::new();
    }

    let (dx, dy) = sobel(image);
    let edge_map = canny(
        &dx,
        &dy,
        width,
        height,
        (params.canny_threshold / 2.0).max(1.0),
        params.canny_threshold,
    );

    let idp = 1.0 / params.dp;
    let acols = ((width as f64) * idp).ceil() as usize;
    let arows = ((height as f64) * idp).ceil() as usize;
    let stride = acols + 2;
    let mut accumulator = vec![0u32; stride * (arows + 2)];

    let mut edge_points = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if !edge_map[idx] || (dx[idx] == 0 && dy[idx] == 0) {
                continue;
            }
            edge_points.push((x as f64, y as f64));

            let (vx, vy) = (dx[idx] as f64, dy[idx] as f64);
            let norm = (vx * vx + vy * vy).sqrt();
            let (ux, uy) = (vx / norm, vy / norm);

            for direction in [1.0, -1.0] {
                for r in params.min_radius..=params.max_radius {
                    let step = direction * r as f64;
                    let cx = ((x as f64 + step * ux) * idp).round();
                    let cy = ((y as f64 + step * uy) * idp).round();
                    if cx < 0.0 || cy < 0.0 || cx >= acols as f64 || cy >= arows as f64 {
                        break;
                    }
                    accumulator[(cy as usize + 1) * stride + cx as usize + 1] += 1;
                }
            }
        }
    }

    let mut centres = Vec::new();
    for y in 1..=arows {
        for x in 1..=acols {
            let base = y * stride + x;
            let votes = accumulator[base];
            if votes > params.acc_threshold
                && votes > accumulator[base - 1]
                && votes >= accumulator[base + 1]
                && votes > accumulator[base - stride]
                && votes >= accumulator[base + stride]
            {
                centres.push((base, votes));
            }
        }
    }
    centres.sort_by(|a, b| b.1.cmp(&a.1));

    let min_dist_sq = params.min_dist * params.min_dist;
    let (min_r, max_r) = (params.min_radius as f64, params.max_radius as f64);
    let mut circles: Vec<Circle> = Vec::new();

    for (base, votes) in centres {
        let cx = ((base % stride) - 1) as f64 * params.dp;
        let cy = ((base / stride) - 1) as f64 * params.dp;

        if circles
            .iter()
            .any(|c| (c.x - cx).powi(2) + (c.y - cy).powi(2) < min_dist_sq)
        {
            continue;
        }

        let distances: Vec<f64> = edge_points
            .iter()
            .map(|(ex, ey)| ((ex - cx).powi(2) + (ey - cy).powi(2)).sqrt())
            .filter(|d| *d >= min_r && *d <= max_r)
            .collect();

        if let Some(radius) = estimate_radius(&distances, params) {
            circles.push(Circle { x: cx, y: cy, radius, votes });
        }
    }

    circles
}

/// Picks the radius bin with the highest support per unit radius, then refines
/// it to the mean distance of the edge points within one bin of it.
fn estimate_radius(distances: &[f64], params: &HoughParams) -> Option<f64> {
    if distances.len() <= params.acc_threshold as usize {
        return None;
    }

    let bin = params.dp;
    let bins = ((params.max_radius - params.min_radius) as f64 / bin).ceil() as usize + 1;
    let mut histogram = vec![0usize; bins];
    for d in distances {
        let i = ((d - params.min_radius as f64) / bin).round() as usize;
        histogram[i.min(bins - 1)] += 1;
    }

    let mut best: Option<(usize, f64)> = None;
    for (i, &count) in histogram.iter().enumerate() {
        let radius = params.min_radius as f64 + i as f64 * bin;
        if count == 0 || radius <= 0.0 {
            continue;
        }
        let density = count as f64 / radius;
        if best.map_or(true, |(_, d)| density >= d) {
            best = Some((i, density));
        }
    }
    let (best_bin, _) = best?;
    let centre = params.min_radius as f64 + best_bin as f64 * bin;

    let support: Vec<f64> = distances
        .iter()
        .copied()
        .filter(|d| (d - centre).abs() <= bin)
        .collect();
    if support.len() <= params.acc_threshold as usize {
        return None;
    }
    Some(support.iter().sum::<f64>() / support.len() as f64)
}
