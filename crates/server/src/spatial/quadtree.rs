//! QuadTree for spatial indexing.
//!
//! A region holds up to `capacity` points. The next insert splits it into four
//! equal quadrants and pushes its points down. Queries take a center and a
//! radius but test the bounding square of that circle, so results near the
//! corners are candidates only and callers check exact distance themselves.

use protocol::EntityId;

/// Axis-aligned bounding box. Edges are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Create bounds from center and half-extent.
    #[inline]
    pub fn from_center(cx: f32, cy: f32, half: f32) -> Self {
        Self {
            min_x: cx - half,
            min_y: cy - half,
            max_x: cx + half,
            max_y: cy + half,
        }
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if two bounds intersect. Touching edges count.
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.min_x > self.max_x
            || other.max_x < self.min_x
            || other.min_y > self.max_y
            || other.max_y < self.min_y)
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Split into NW, NE, SW, SE quadrants.
    fn quadrants(&self) -> [Bounds; 4] {
        let mid_x = self.min_x + self.width() / 2.0;
        let mid_y = self.min_y + self.height() / 2.0;
        [
            Bounds::new(self.min_x, self.min_y, mid_x, mid_y),
            Bounds::new(mid_x, self.min_y, self.max_x, mid_y),
            Bounds::new(self.min_x, mid_y, mid_x, self.max_y),
            Bounds::new(mid_x, mid_y, self.max_x, self.max_y),
        ]
    }
}

/// Which entity collection an indexed point came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Pellet,
}

/// An item stored in the QuadTree: a snapshot of an entity's position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadItem {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub kind: EntityKind,
}

impl QuadItem {
    #[inline]
    pub fn new(id: EntityId, x: f32, y: f32, kind: EntityKind) -> Self {
        Self { id, x, y, kind }
    }

    #[inline]
    pub fn is_pellet(&self) -> bool {
        self.kind == EntityKind::Pellet
    }
}

/// Region-subdividing point index.
pub struct QuadTree {
    bounds: Bounds,
    capacity: usize,
    /// Remaining subdivision depth. A node at depth 0 never splits.
    depth: u32,
    items: Vec<QuadItem>,
    children: Option<Box<[QuadTree; 4]>>,
}

impl QuadTree {
    /// Create a new QuadTree with the given bounds.
    pub fn new(bounds: Bounds, capacity: usize, max_depth: u32) -> Self {
        Self {
            bounds,
            capacity: capacity.max(1),
            depth: max_depth,
            items: Vec::with_capacity(capacity.max(1)),
            children: None,
        }
    }

    /// Create a QuadTree covering a `width` x `height` world anchored at the origin.
    pub fn for_world(width: f32, height: f32, capacity: usize, max_depth: u32) -> Self {
        Self::new(Bounds::new(0.0, 0.0, width, height), capacity, max_depth)
    }

    /// Insert an item. Returns false if its point lies outside this region.
    pub fn insert(&mut self, item: QuadItem) -> bool {
        if !self.bounds.contains(item.x, item.y) {
            return false;
        }

        if self.children.is_none() {
            if self.items.len() < self.capacity || self.depth == 0 {
                self.items.push(item);
                return true;
            }
            self.subdivide();
        }

        self.insert_into_children(item)
    }

    fn insert_into_children(&mut self, item: QuadItem) -> bool {
        match self.children.as_deref_mut() {
            Some(children) => children.iter_mut().any(|child| child.insert(item)),
            None => false,
        }
    }

    fn subdivide(&mut self) {
        let [nw, ne, sw, se] = self.bounds.quadrants();
        let (capacity, depth) = (self.capacity, self.depth - 1);
        let child = |b| QuadTree::new(b, capacity, depth);
        self.children = Some(Box::new([child(nw), child(ne), child(sw), child(se)]));

        for item in std::mem::take(&mut self.items) {
            self.insert_into_children(item);
        }
    }

    /// Find all items whose point lies inside the square of half-extent
    /// `radius` around `(cx, cy)`.
    pub fn query(&self, cx: f32, cy: f32, radius: f32) -> Vec<QuadItem> {
        let mut found = Vec::new();
        self.query_into(&Bounds::from_center(cx, cy, radius), &mut found);
        found
    }

    fn query_into(&self, range: &Bounds, found: &mut Vec<QuadItem>) {
        if !self.bounds.intersects(range) {
            return;
        }

        found.extend(self.items.iter().filter(|item| range.contains(item.x, item.y)));

        if let Some(children) = self.children.as_deref() {
            for child in children {
                child.query_into(range, found);
            }
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
            + self
                .children
                .as_deref()
                .map_or(0, |children| children.iter().map(QuadTree::len).sum())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every item and collapse back to a single region.
    pub fn clear(&mut self) {
        self.items.clear();
        self.children = None;
    }
}

impl std::fmt::Debug for QuadTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadTree")
            .field("items", &self.len())
            .field("bounds", &self.bounds)
            .field("divided", &self.children.is_some())
            .finish()
    }
}
