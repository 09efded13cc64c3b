//! Fixed design canvas scaled down to fit its container.
//!
//! Child geometry is authored in design pixels. `StageScaler` tracks the last observed
//! container width and hands out one uniform factor for both axes, never above 1.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StageGeometry {
    pub design_width: f64,
    pub design_height: f64,
    pub scale: f64,
}

impl StageGeometry {
    /// Height the surrounding layout must reserve so content below reflows.
    pub fn reserved_height(&self) -> f64 {
        self.design_height * self.scale
    }
}

/// `min(1, container/design)`; an unmeasured (zero or invalid) container reads as 1.
pub fn scale_for(container_width: f64, design_width: f64) -> f64 {
    if !(container_width.is_finite() && container_width > 0.0)
        || !(design_width.is_finite() && design_width > 0.0)
    {
        return 1.0;
    }
    (container_width / design_width).min(1.0)
}

#[derive(Clone, Debug)]
pub struct StageScaler {
    design_width: f64,
    design_height: f64,
    container_width: f64,
}

impl StageScaler {
    pub fn new(design_width: f64, design_height: f64) -> Self {
        Self {
            design_width,
            design_height,
            container_width: 0.0,
        }
    }

    /// Record a new container width. Returns the geometry when the scale changed.
    pub fn observe(&mut self, container_width: f64) -> Option<StageGeometry> {
        let before = self.geometry().scale;
        self.container_width = container_width;
        let after = self.geometry();
        (after.scale != before).then_some(after)
    }

    pub fn geometry(&self) -> StageGeometry {
        StageGeometry {
            design_width: self.design_width,
            design_height: self.design_height,
            scale: scale_for(self.container_width, self.design_width),
        }
    }
}

/// Axis-aligned box in design pixels. `height` is `None` where the node sizes to content.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DesignRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: Option<f64>,
}

impl DesignRect {
    const fn new(x: f64, y: f64, w: f64, h: Option<f64>) -> Self {
        Self { x, y, w, h }
    }
}

/// Authored layout of the site flow diagram.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FlowLayout {
    pub width: f64,
    pub height: f64,
    pub pv: DesignRect,
    pub pipe: DesignRect,
    pub pcs: DesignRect,
    pub tower: DesignRect,
    pub battery: DesignRect,
}

pub const HOME_FLOW: FlowLayout = FlowLayout {
    width: 2300.0,
    height: 838.0,
    pv: DesignRect::new(100.0, 186.0, 280.0, None),
    pipe: DesignRect::new(360.0, 270.0, 1220.0, Some(40.0)),
    pcs: DesignRect::new(1020.0, 622.0, 320.0, Some(104.0)),
    tower: DesignRect::new(1500.0, 128.0, 300.0, None),
    battery: DesignRect::new(1500.0, 600.0, 280.0, Some(150.0)),
};

/// The PV page reuses the diagram on a slightly shorter canvas.
pub const PV_FLOW: FlowLayout = FlowLayout {
    height: 820.0,
    ..HOME_FLOW
};

impl FlowLayout {
    pub fn scaler(&self) -> StageScaler {
        StageScaler::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_never_exceeds_one() {
        assert_eq!(scale_for(4600.0, 2300.0), 1.0);
        assert_eq!(scale_for(2300.0, 2300.0), 1.0);
        assert_eq!(scale_for(1150.0, 2300.0), 0.5);
        for w in [1.0, 10.0, 999.0, 2299.0, 1e6] {
            let s = scale_for(w, 2300.0);
            assert!(s > 0.0 && s <= 1.0);
        }
    }

    #[test]
    fn unmeasured_container_defaults_to_full_size() {
        assert_eq!(scale_for(0.0, 2300.0), 1.0);
        assert_eq!(scale_for(f64::NAN, 2300.0), 1.0);
        assert_eq!(scale_for(-10.0, 2300.0), 1.0);
    }

    #[test]
    fn reserved_height_tracks_scale() {
        let mut scaler = HOME_FLOW.scaler();
        assert_eq!(scaler.geometry().reserved_height(), 838.0);
        let g = scaler.observe(1150.0).expect("scale changed");
        assert_eq!(g.scale, 0.5);
        assert_eq!(g.reserved_height(), 419.0);
    }

    #[test]
    fn observe_reports_only_changes() {
        let mut scaler = StageScaler::new(2300.0, 820.0);
        assert!(scaler.observe(3000.0).is_none());
        assert!(scaler.observe(1150.0).is_some());
        assert!(scaler.observe(1150.0).is_none());
        assert!(scaler.observe(0.0).is_some());
    }

    #[test]
    fn pv_layout_shares_nodes() {
        assert_eq!(PV_FLOW.height, 820.0);
        assert_eq!(PV_FLOW.pcs, HOME_FLOW.pcs);
    }
}
