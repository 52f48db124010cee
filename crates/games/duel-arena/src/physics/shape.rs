use duel_core::math::Vec2;

/// Collision proxy geometry, positioned by its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Circle { radius: f32 },
    /// Axis-aligned rectangle given by half extents.
    Rect { half: Vec2 },
}

impl Shape {
    pub fn rect(width: f32, height: f32) -> Self {
        Shape::Rect {
            half: Vec2::new(width / 2.0, height / 2.0),
        }
    }

    /// Whether this shape at `pos` intersects the circle `(center, radius)`.
    pub fn intersects_circle(&self, pos: Vec2, center: Vec2, radius: f32) -> bool {
        match *self {
            Shape::Circle { radius: r } => {
                let reach = r + radius;
                (center - pos).length_squared() < reach * reach
            },
            Shape::Rect { half } => {
                let closest = closest_point_on_rect(pos, half, center);
                (center - closest).length_squared() < radius * radius
                    || point_in_rect(pos, half, center)
            },
        }
    }
}

/// First point of contact between two overlapping shapes, in world space.
/// `None` if they do not overlap.
pub fn contact(a: Shape, pa: Vec2, b: Shape, pb: Vec2) -> Option<Vec2> {
    match (a, b) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            circle_circle(pa, ra, pb, rb)
        },
        (Shape::Circle { radius }, Shape::Rect { half }) => circle_rect(pa, radius, pb, half),
        (Shape::Rect { half }, Shape::Circle { radius }) => circle_rect(pb, radius, pa, half),
        (Shape::Rect { half: ha }, Shape::Rect { half: hb }) => rect_rect(pa, ha, pb, hb),
    }
}

fn circle_circle(pa: Vec2, ra: f32, pb: Vec2, rb: f32) -> Option<Vec2> {
    let delta = pb - pa;
    let reach = ra + rb;
    if delta.length_squared() >= reach * reach {
        return None;
    }
    let mut dir = delta.normalize_or_zero();
    if dir == Vec2::ZERO {
        dir = Vec2::new(1.0, 0.0);
    }
    Some(pa + dir * ra)
}

/// Contact on the circle's surface, facing the rectangle.
fn circle_rect(center: Vec2, radius: f32, rect_pos: Vec2, half: Vec2) -> Option<Vec2> {
    if !point_in_rect(rect_pos, half, center) {
        let closest = closest_point_on_rect(rect_pos, half, center);
        if (closest - center).length_squared() >= radius * radius {
            return None;
        }
    }
    Some(circle_facing_rect(center, radius, rect_pos, half))
}

/// Point on a circle's surface in the direction of a rectangle, whether or
/// not the two overlap.
///
/// With the center already inside the rectangle the point faces inward,
/// opposite the nearest face: that face is where the circle came in, so
/// motion back out through it must stay free.
pub fn circle_facing_rect(center: Vec2, radius: f32, rect_pos: Vec2, half: Vec2) -> Vec2 {
    if point_in_rect(rect_pos, half, center) {
        let local = center - rect_pos;
        let to_x = half.x - local.x.abs();
        let to_y = half.y - local.y.abs();
        let dir = if to_x < to_y {
            Vec2::new(-local.x.signum(), 0.0)
        } else {
            Vec2::new(0.0, -local.y.signum())
        };
        return center + dir * radius;
    }
    let closest = closest_point_on_rect(rect_pos, half, center);
    center + (closest - center).normalize_or_zero() * radius
}

fn rect_rect(pa: Vec2, ha: Vec2, pb: Vec2, hb: Vec2) -> Option<Vec2> {
    let min_x = (pa.x - ha.x).max(pb.x - hb.x);
    let max_x = (pa.x + ha.x).min(pb.x + hb.x);
    let min_y = (pa.y - ha.y).max(pb.y - hb.y);
    let max_y = (pa.y + ha.y).min(pb.y + hb.y);
    if min_x >= max_x || min_y >= max_y {
        return None;
    }
    Some(Vec2::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0))
}

fn closest_point_on_rect(rect_pos: Vec2, half: Vec2, p: Vec2) -> Vec2 {
    Vec2::new(
        p.x.clamp(rect_pos.x - half.x, rect_pos.x + half.x),
        p.y.clamp(rect_pos.y - half.y, rect_pos.y + half.y),
    )
}

fn point_in_rect(rect_pos: Vec2, half: Vec2, p: Vec2) -> bool {
    (p.x - rect_pos.x).abs() < half.x && (p.y - rect_pos.y).abs() < half.y
}
