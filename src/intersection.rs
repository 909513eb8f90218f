use geo::{Coord, CoordNum, Rect};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum IntersectionError {
    #[error("There is no intersection between geometries")]
    NoIntersection,
}

pub trait Intersection: Sized {
    fn intersection(&self, rhs: &Self) -> Result<Self, IntersectionError>;
}

fn operate<T: CoordNum>(lhs: Coord<T>, rhs: Coord<T>, op: impl Fn(T, T) -> T) -> Coord<T> {
    Coord {
        x: op(lhs.x, rhs.x),
        y: op(lhs.y, rhs.y),
    }
}

impl<T: CoordNum> Intersection for Rect<T> {
    /// Touching rects intersect in a degenerate rect.
    fn intersection(&self, rhs: &Self) -> Result<Rect<T>, IntersectionError> {
        let lhs_max = self.max();
        let rhs_min = rhs.min();
        if (lhs_max.x < rhs_min.x) | (lhs_max.y < rhs_min.y) {
            return Err(IntersectionError::NoIntersection);
        }

        let lhs_min = self.min();
        let rhs_max = rhs.max();
        if (lhs_min.x > rhs_max.x) | (lhs_min.y > rhs_max.y) {
            return Err(IntersectionError::NoIntersection);
        }

        let min = operate(lhs_min, rhs_min, |x, y| if x > y { x } else { y });
        let max = operate(lhs_max, rhs_max, |x, y| if x < y { x } else { y });

        Ok(Self::new(min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Rect::new((0., 0.), (10., 10.)), Rect::new((5., 5.), (20., 20.)), Rect::new((5., 5.), (10., 10.)))]
    #[case(Rect::new((0., 0.), (10., 10.)), Rect::new((2., 3.), (4., 5.)), Rect::new((2., 3.), (4., 5.)))]
    #[case(Rect::new((0., 0.), (10., 10.)), Rect::new((10., 0.), (12., 10.)), Rect::new((10., 0.), (10., 10.)))]
    fn overlapping_rects(#[case] lhs: Rect, #[case] rhs: Rect, #[case] expected: Rect) {
        assert_eq!(lhs.intersection(&rhs), Ok(expected));
        assert_eq!(rhs.intersection(&lhs), Ok(expected));
    }

    #[rstest]
    fn disjoint_rects() {
        let lhs = Rect::new((0, 0), (10, 10));
        let rhs = Rect::new((11, 0), (20, 10));
        assert_eq!(lhs.intersection(&rhs), Err(IntersectionError::NoIntersection));
    }
}
