use nalgebra::Point2;

/// Binary raster; any non-zero byte is "set".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y) as u8);
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }

    /// Bounds-checked read; outside the raster is unset.
    #[inline]
    pub fn get_signed(&self, x: i64, y: i64) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.width
            && (y as usize) < self.height
            && self.get(x as usize, y as usize)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: bool) {
        self.data[y * self.width + x] = v as u8;
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn invert(&self) -> Mask {
        Mask {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| (v == 0) as u8).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    Four,
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(i64, i64)] {
        match self {
            Connectivity::Four => &[(1, 0), (-1, 0), (0, 1), (0, -1)],
            Connectivity::Eight => &[
                (1, 0),
                (-1, 0),
                (0, 1),
                (0, -1),
                (1, 1),
                (-1, 1),
                (1, -1),
                (-1, -1),
            ],
        }
    }
}

/// Per-component statistics; coordinates are inclusive pixel indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComponentStats {
    pub label: u32,
    pub area: usize,
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
    sum_x: f64,
    sum_y: f64,
}

impl ComponentStats {
    /// Mean of the pixel centers.
    pub fn centroid(&self) -> Point2<f64> {
        let n = self.area.max(1) as f64;
        Point2::new(self.sum_x / n + 0.5, self.sum_y / n + 0.5)
    }

    pub fn touches_border(&self, width: usize, height: usize) -> bool {
        self.min_x == 0 || self.min_y == 0 || self.max_x + 1 >= width || self.max_y + 1 >= height
    }

    pub fn bbox_width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn bbox_height(&self) -> usize {
        self.max_y - self.min_y + 1
    }
}

/// Label image (0 = unset, `k + 1` = `stats[k]`) with component statistics.
///
/// Labels are assigned in raster order of each component's first pixel.
#[derive(Clone, Debug)]
pub struct Components {
    pub width: usize,
    pub height: usize,
    pub labels: Vec<u32>,
    pub stats: Vec<ComponentStats>,
}

impl Components {
    /// Crop of a single component as its own mask, plus the crop origin.
    pub fn extract(&self, stats: &ComponentStats) -> (Mask, (usize, usize)) {
        let w = stats.bbox_width();
        let h = stats.bbox_height();
        let mask = Mask::from_fn(w, h, |x, y| {
            self.labels[(stats.min_y + y) * self.width + stats.min_x + x] == stats.label
        });
        (mask, (stats.min_x, stats.min_y))
    }
}

pub fn label_components(mask: &Mask, connectivity: Connectivity) -> Components {
    let (w, h) = (mask.width, mask.height);
    let mut labels = vec![0u32; w * h];
    let mut stats = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let offsets = connectivity.offsets();

    for y0 in 0..h {
        for x0 in 0..w {
            if !mask.get(x0, y0) || labels[y0 * w + x0] != 0 {
                continue;
            }
            let label = stats.len() as u32 + 1;
            let mut s = ComponentStats {
                label,
                area: 0,
                min_x: x0,
                min_y: y0,
                max_x: x0,
                max_y: y0,
                sum_x: 0.0,
                sum_y: 0.0,
            };
            labels[y0 * w + x0] = label;
            stack.push((x0, y0));
            while let Some((x, y)) = stack.pop() {
                s.area += 1;
                s.sum_x += x as f64;
                s.sum_y += y as f64;
                s.min_x = s.min_x.min(x);
                s.min_y = s.min_y.min(y);
                s.max_x = s.max_x.max(x);
                s.max_y = s.max_y.max(y);
                for &(dx, dy) in offsets {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if !mask.get_signed(nx, ny) {
                        continue;
                    }
                    let idx = ny as usize * w + nx as usize;
                    if labels[idx] == 0 {
                        labels[idx] = label;
                        stack.push((nx as usize, ny as usize));
                    }
                }
            }
            stats.push(s);
        }
    }

    Components {
        width: w,
        height: h,
        labels,
        stats,
    }
}
