/// Floats stored per bezier segment: 9 sampled (x, y) points.
pub const BEZIER_SIZE: usize = 18;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CurveType {
    Linear,
    Stepped,
    /// Offset into the sample table of the segment's first channel.
    Bezier(usize),
}

/// Returns the index of the last frame whose time is `<= time`, stepping `step` floats per frame.
pub(crate) fn search(frames: &[f32], time: f32, step: usize) -> usize {
    let n = frames.len();
    let mut i = step;
    while i < n {
        if frames[i] > time {
            return i - step;
        }
        i += step;
    }
    n - step
}

/// Keyframe storage shared by every curved timeline.
///
/// `frames` holds `entries` floats per keyframe: the time followed by one value per channel.
/// Bezier segments are pre-sampled by forward differencing into `samples`; a frame with `N`
/// channels owns `N` consecutive segments, channel `k` living `k * BEZIER_SIZE` floats after
/// channel 0.
/// The last frame is always stepped.
#[derive(Clone, Debug)]
pub struct CurveFrames {
    frames: Vec<f32>,
    entries: usize,
    curve_types: Vec<CurveType>,
    samples: Vec<f32>,
}

impl CurveFrames {
    pub fn new(entries: usize, frame_count: usize, bezier_count: usize) -> Self {
        let mut curve_types = vec![CurveType::Linear; frame_count];
        if let Some(last) = curve_types.last_mut() {
            *last = CurveType::Stepped;
        }
        Self {
            frames: vec![0.0; frame_count * entries],
            entries,
            curve_types,
            samples: vec![0.0; bezier_count * BEZIER_SIZE],
        }
    }

    pub fn frame_count(&self) -> usize {
        self.curve_types.len()
    }

    pub fn frame_entries(&self) -> usize {
        self.entries
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn curve_type(&self, frame: usize) -> CurveType {
        self.curve_types[frame]
    }

    pub fn duration(&self) -> f32 {
        if self.frames.is_empty() {
            return 0.0;
        }
        self.frames[self.frames.len() - self.entries]
    }

    /// Time of the first keyframe, or `f32::MAX` for an empty table.
    pub fn first_time(&self) -> f32 {
        self.frames.first().copied().unwrap_or(f32::MAX)
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, values: &[f32]) {
        let i = frame * self.entries;
        self.frames[i] = time;
        let n = values.len().min(self.entries - 1);
        self.frames[i + 1..i + 1 + n].copy_from_slice(&values[..n]);
    }

    pub fn set_linear(&mut self, frame: usize) {
        self.curve_types[frame] = CurveType::Linear;
    }

    pub fn set_stepped(&mut self, frame: usize) {
        self.curve_types[frame] = CurveType::Stepped;
    }

    /// Samples the bezier segment for `channel` of `frame` into slot `bezier` of the sample table.
    ///
    /// Control points are absolute (time, value) pairs. Channel 0 records the segment offset for
    /// the frame, so the channels of one frame must use consecutive `bezier` slots.
    #[allow(clippy::too_many_arguments)]
    pub fn set_bezier(
        &mut self,
        bezier: usize,
        frame: usize,
        channel: usize,
        time1: f32,
        value1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
        value2: f32,
    ) {
        let i = bezier * BEZIER_SIZE;
        if channel == 0 {
            self.curve_types[frame] = CurveType::Bezier(i);
        }
        let tmpx = (time1 - cx1 * 2.0 + cx2) * 0.03;
        let tmpy = (value1 - cy1 * 2.0 + cy2) * 0.03;
        let dddx = ((cx1 - cx2) * 3.0 - time1 + time2) * 0.006;
        let dddy = ((cy1 - cy2) * 3.0 - value1 + value2) * 0.006;
        let dx = (cx1 - time1) * 0.3 + tmpx + dddx * 0.166_666_67;
        let dy = (cy1 - value1) * 0.3 + tmpy + dddy * 0.166_666_67;
        self.fill_samples(
            i,
            time1 + dx,
            value1 + dy,
            dx,
            dy,
            tmpx * 2.0 + dddx,
            tmpy * 2.0 + dddy,
            dddx,
            dddy,
        );
    }

    /// Like [`CurveFrames::set_bezier`] for a curve that maps time onto a 0..1 percentage, with
    /// `cy1`/`cy2` given as fractions.
    #[allow(clippy::too_many_arguments)]
    pub fn set_percent_bezier(
        &mut self,
        bezier: usize,
        frame: usize,
        time1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
    ) {
        let i = bezier * BEZIER_SIZE;
        self.curve_types[frame] = CurveType::Bezier(i);
        let tmpx = (time1 - cx1 * 2.0 + cx2) * 0.03;
        let tmpy = cy2 * 0.03 - cy1 * 0.06;
        let dddx = ((cx1 - cx2) * 3.0 - time1 + time2) * 0.006;
        let dddy = (cy1 - cy2 + 0.333_333_33) * 0.018;
        let dx = (cx1 - time1) * 0.3 + tmpx + dddx * 0.166_666_67;
        let dy = cy1 * 0.3 + tmpy + dddy * 0.166_666_67;
        self.fill_samples(
            i,
            time1 + dx,
            dy,
            dx,
            dy,
            tmpx * 2.0 + dddx,
            tmpy * 2.0 + dddy,
            dddx,
            dddy,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_samples(
        &mut self,
        start: usize,
        mut x: f32,
        mut y: f32,
        mut dx: f32,
        mut dy: f32,
        mut ddx: f32,
        mut ddy: f32,
        dddx: f32,
        dddy: f32,
    ) {
        for pair in self.samples[start..start + BEZIER_SIZE].chunks_exact_mut(2) {
            pair[0] = x;
            pair[1] = y;
            dx += ddx;
            dy += ddy;
            ddx += dddx;
            ddy += dddy;
            x += dx;
            y += dy;
        }
    }

    /// Index into `frames` of the keyframe active at `time`.
    pub fn search(&self, time: f32) -> usize {
        search(&self.frames, time, self.entries)
    }

    /// Value of `channel` (0-based, excluding the time column) at `time`.
    pub fn curve_value(&self, time: f32, channel: usize) -> f32 {
        self.value_at(self.search(time), time, channel)
    }

    /// Value of `channel` at `time`, given the frame index returned by [`CurveFrames::search`].
    pub fn value_at(&self, i: usize, time: f32, channel: usize) -> f32 {
        let offset = channel + 1;
        match self.curve_types[i / self.entries] {
            CurveType::Linear => {
                let before = self.frames[i];
                let value = self.frames[i + offset];
                let after = self.frames[i + self.entries];
                let next = self.frames[i + self.entries + offset];
                value + (time - before) / (after - before) * (next - value)
            }
            CurveType::Stepped => self.frames[i + offset],
            CurveType::Bezier(start) => {
                self.bezier_value(time, i, offset, start + channel * BEZIER_SIZE)
            }
        }
    }

    fn bezier_value(
        &self,
        time: f32,
        frame_index: usize,
        value_offset: usize,
        start: usize,
    ) -> f32 {
        let next_value = self.frames[frame_index + self.entries + value_offset];
        self.bezier_value_to(time, frame_index, value_offset, start, next_value)
    }

    /// Walks the sampled segment at `start`; past the last sample it interpolates toward
    /// `next_value` at the next keyframe's time.
    pub(crate) fn bezier_value_to(
        &self,
        time: f32,
        frame_index: usize,
        value_offset: usize,
        start: usize,
        next_value: f32,
    ) -> f32 {
        let s = &self.samples;
        if s[start] > time {
            let x = self.frames[frame_index];
            let y = self.frames[frame_index + value_offset];
            return y + (time - x) / (s[start] - x) * (s[start + 1] - y);
        }
        let n = start + BEZIER_SIZE;
        let mut i = start + 2;
        while i < n {
            if s[i] >= time {
                let x = s[i - 2];
                let y = s[i - 1];
                return y + (time - x) / (s[i] - x) * (s[i + 1] - y);
            }
            i += 2;
        }
        let x = s[n - 2];
        let y = s[n - 1];
        y + (time - x) / (self.frames[frame_index + self.entries] - x) * (next_value - y)
    }

    /// Interpolation percentage (0..1) between `frame` and the next keyframe.
    pub fn percent(&self, time: f32, frame: usize) -> f32 {
        let i = frame * self.entries;
        let start = match self.curve_types[frame] {
            CurveType::Linear => {
                let x = self.frames[i];
                return (time - x) / (self.frames[i + self.entries] - x);
            }
            CurveType::Stepped => return 0.0,
            CurveType::Bezier(start) => start,
        };
        let s = &self.samples;
        if s[start] > time {
            let x = self.frames[i];
            return s[start + 1] * (time - x) / (s[start] - x);
        }
        let n = start + BEZIER_SIZE;
        let mut j = start + 2;
        while j < n {
            if s[j] >= time {
                let x = s[j - 2];
                let y = s[j - 1];
                return y + (time - x) / (s[j] - x) * (s[j + 1] - y);
            }
            j += 2;
        }
        let x = s[n - 2];
        let y = s[n - 1];
        y + (1.0 - y) * (time - x) / (self.frames[i + self.entries] - x)
    }
}
