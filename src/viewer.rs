//! Gallery viewer: one listing's images, one at a time, with zoom and pan.
//!
//! The viewer is a toolkit-independent state machine. A host feeds it
//! [`ViewerEvent`]s (pointer, wheel, touch, navigation) and reads back the
//! current image source and CSS transform.
//!
//! ## State
//!
//! ```text
//! { index, scale ∈ [1.0, 5.0], pan = (x, y), drag }
//!
//!            drag_start (scale > 1)
//!   Idle ─────────────────────────────▶ Dragging { last }
//!    ▲                                      │
//!    └────── drag_end / leave / cancel ─────┘
//! ```
//!
//! Scale, pan and drag reset whenever the index changes. Pan only moves
//! while zoomed in.
//!
//! ## Scroll lock
//!
//! Opening a viewer takes a [`ScrollLock`] from the host's [`ScrollHost`].
//! The lock lives inside the viewer, so background scrolling comes back on
//! every close path, including a plain drop.

use crate::types::ImageAsset;
use std::sync::Arc;

pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 5.0;
/// Scale change per wheel tick.
pub const ZOOM_STEP: f64 = 0.1;

/// Shown in place of an asset that cannot be rendered.
pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/800x600/555/FFF?text=Image+Load+Error";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// On-screen bounding box of the displayed image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging { last: Point },
}

/// Input events a host forwards to the viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
    PointerLeave,
    Wheel {
        delta_y: f64,
        cursor: Point,
        image_rect: Rect,
    },
    /// Current contact points.
    TouchStart(Vec<Point>),
    TouchMove(Vec<Point>),
    TouchEnd,
    TouchCancel,
    Next,
    Prev,
}

/// The page behind the viewer, whose scrolling is suspended while open.
pub trait ScrollHost: Send + Sync {
    fn suspend_scroll(&self);
    fn restore_scroll(&self);
}

/// Suspends background scrolling until dropped.
#[must_use = "scrolling is restored as soon as the lock is dropped"]
pub struct ScrollLock {
    host: Arc<dyn ScrollHost>,
}

impl ScrollLock {
    pub fn acquire(host: Arc<dyn ScrollHost>) -> Self {
        host.suspend_scroll();
        Self { host }
    }
}

impl Drop for ScrollLock {
    fn drop(&mut self) {
        self.host.restore_scroll();
    }
}

impl std::fmt::Debug for ScrollLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollLock").finish_non_exhaustive()
    }
}

/// An open gallery over a non-empty image sequence.
#[derive(Debug)]
pub struct GalleryViewer {
    images: Vec<ImageAsset>,
    index: usize,
    scale: f64,
    pan: Point,
    drag: DragState,
    _scroll: ScrollLock,
}

impl GalleryViewer {
    /// Open the viewer at `start` (clamped into range).
    ///
    /// Returns `None` for an empty sequence; there is nothing to show.
    pub fn open(images: Vec<ImageAsset>, start: usize, host: Arc<dyn ScrollHost>) -> Option<Self> {
        if images.is_empty() {
            return None;
        }
        let index = start.min(images.len() - 1);
        Some(Self {
            images,
            index,
            scale: MIN_SCALE,
            pan: Point::ORIGIN,
            drag: DragState::Idle,
            _scroll: ScrollLock::acquire(host),
        })
    }

    /// Close the viewer, restoring background scroll.
    pub fn close(self) {}

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Always false: an open viewer has at least one image.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn is_zoomed(&self) -> bool {
        self.scale > MIN_SCALE
    }

    pub fn current(&self) -> &ImageAsset {
        &self.images[self.index]
    }

    /// Whether prev/next controls should be shown.
    pub fn has_navigation(&self) -> bool {
        self.images.len() > 1
    }

    fn show(&mut self, index: usize) {
        self.index = index;
        self.scale = MIN_SCALE;
        self.pan = Point::ORIGIN;
        self.drag = DragState::Idle;
    }

    pub fn next(&mut self) {
        if !self.has_navigation() {
            return;
        }
        self.show((self.index + 1) % self.images.len());
    }

    pub fn prev(&mut self) {
        if !self.has_navigation() {
            return;
        }
        let len = self.images.len();
        self.show((self.index + len - 1) % len);
    }

    /// Zoom one step around `cursor`. Scrolling up (negative `delta_y`)
    /// zooms in; anything else zooms out.
    pub fn zoom(&mut self, delta_y: f64, cursor: Point, image_rect: Rect) {
        let old = self.scale;
        // Stay on the step grid so repeated steps land exactly on the bounds
        let steps_per_unit = (1.0 / ZOOM_STEP).round();
        let ticks = (old * steps_per_unit).round();
        let ticks = if delta_y < 0.0 { ticks + 1.0 } else { ticks - 1.0 };
        let new = (ticks / steps_per_unit).clamp(MIN_SCALE, MAX_SCALE);
        if new == old {
            return;
        }
        self.scale = new;

        if !image_rect.has_area() {
            return;
        }
        let fx = (cursor.x - image_rect.left) / image_rect.width;
        let fy = (cursor.y - image_rect.top) / image_rect.height;
        let ratio = new / old;
        let new_w = image_rect.width * ratio;
        let new_h = image_rect.height * ratio;
        self.pan.x -= fx * (new_w - image_rect.width);
        self.pan.y -= fy * (new_h - image_rect.height);
    }

    pub fn drag_start(&mut self, p: Point) {
        if self.is_zoomed() {
            self.drag = DragState::Dragging { last: p };
        }
    }

    pub fn drag_move(&mut self, p: Point) {
        if !self.is_zoomed() {
            return;
        }
        if let DragState::Dragging { last } = self.drag {
            self.pan.x += p.x - last.x;
            self.pan.y += p.y - last.y;
            self.drag = DragState::Dragging { last: p };
        }
    }

    pub fn drag_end(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Single-finger touch starts a drag; multi-touch is ignored.
    pub fn touch_start(&mut self, touches: &[Point]) {
        if let [p] = touches {
            self.drag_start(*p);
        }
    }

    pub fn touch_move(&mut self, touches: &[Point]) {
        if let [p] = touches {
            self.drag_move(*p);
        }
    }

    pub fn touch_end(&mut self) {
        self.drag_end();
    }

    pub fn handle(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::PointerDown(p) => self.drag_start(p),
            ViewerEvent::PointerMove(p) => self.drag_move(p),
            ViewerEvent::PointerUp | ViewerEvent::PointerLeave => self.drag_end(),
            ViewerEvent::Wheel {
                delta_y,
                cursor,
                image_rect,
            } => self.zoom(delta_y, cursor, image_rect),
            ViewerEvent::TouchStart(touches) => self.touch_start(&touches),
            ViewerEvent::TouchMove(touches) => self.touch_move(&touches),
            ViewerEvent::TouchEnd | ViewerEvent::TouchCancel => self.touch_end(),
            ViewerEvent::Next => self.next(),
            ViewerEvent::Prev => self.prev(),
        }
    }

    /// Source for the image element: the asset itself, or the placeholder
    /// when the asset cannot be rendered.
    pub fn image_source(&self) -> &str {
        let asset = self.current();
        if asset.is_renderable() {
            asset.as_str()
        } else {
            tracing::debug!(index = self.index, "substituting placeholder for broken image");
            PLACEHOLDER_IMAGE
        }
    }

    /// CSS transform for the image element, with `transform-origin: 0 0`.
    pub fn transform_css(&self) -> String {
        format!(
            "translate({}px, {}px) scale({})",
            css_number(self.pan.x),
            css_number(self.pan.y),
            css_number(self.scale)
        )
    }

    pub fn hint(&self) -> &'static str {
        if self.is_zoomed() {
            "Drag to pan, scroll to zoom"
        } else {
            "Scroll to zoom"
        }
    }

    /// One-based position, e.g. `2 / 5`.
    pub fn position_label(&self) -> String {
        format!("{} / {}", self.index + 1, self.images.len())
    }
}

/// Round to thousandths and drop float noise (and negative zero).
fn css_number(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0 + 0.0;
    format!("{rounded}")
}
