//! Descriptions of ordered scans over the record store.

use chrono::offset::Utc;
use chrono::DateTime;

use crate::models::{BoardId, Position};

/// What kind of record a scan walks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Board,
    Post,
}

/// The timestamp a scan is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
}

/// Which way a scan is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Which side of the range filter a bound is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// `sort field >= value`
    AtLeast,
    /// `sort field <= value`
    AtMost,
}

/// How much of each record a scan returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Only record IDs.
    KeysOnly,
    /// Record IDs and the board a post belongs to.
    BoardId,
    /// Whole records.
    Full,
}

/// A scan over boards or posts.
///
/// Built up by chaining, then handed to [Store::scan](crate::models::Store::scan).
/// Without a [limit](Query::limit) the scan runs until the store runs out of
/// records, so callers should either cap it or stop consuming it themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    kind: Kind,
    board_id: Option<BoardId>,
    range: Option<(Bound, DateTime<Utc>)>,
    field: SortField,
    direction: Direction,
    limit: Option<u64>,
    projection: Projection,
    start: Option<Position>,
}

impl Query {
    fn new(kind: Kind) -> Query {
        Query {
            kind,
            board_id: None,
            range: None,
            field: SortField::UpdatedAt,
            direction: Direction::Descending,
            limit: None,
            projection: Projection::KeysOnly,
            start: None,
        }
    }

    /// A scan over all boards, most recently updated first.
    pub fn boards() -> Query {
        Query::new(Kind::Board)
    }

    /// A scan over all posts, most recently updated first.
    pub fn posts() -> Query {
        Query::new(Kind::Post)
    }

    /// Only posts on the given board. Board scans ignore this.
    pub fn in_board(mut self, board_id: BoardId) -> Query {
        self.board_id = Some(board_id);
        self
    }

    /// Only records whose sort field is at or after `time`.
    pub fn since(mut self, time: DateTime<Utc>) -> Query {
        self.range = Some((Bound::AtLeast, time));
        self
    }

    /// Only records whose sort field is at or before `time`.
    pub fn until(mut self, time: DateTime<Utc>) -> Query {
        self.range = Some((Bound::AtMost, time));
        self
    }

    pub fn order_by(mut self, field: SortField, direction: Direction) -> Query {
        self.field = field;
        self.direction = direction;
        self
    }

    /// Return at most `limit` records.
    pub fn limit(mut self, limit: u64) -> Query {
        self.limit = Some(limit);
        self
    }

    pub fn projection(mut self, projection: Projection) -> Query {
        self.projection = projection;
        self
    }

    /// Resume the scan just after `position`.
    pub fn start_after(mut self, position: Position) -> Query {
        self.start = Some(position);
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The board filter, for post scans.
    pub fn board_id(&self) -> Option<BoardId> {
        match self.kind {
            Kind::Post => self.board_id,
            Kind::Board => None,
        }
    }

    pub fn range(&self) -> Option<(Bound, DateTime<Utc>)> {
        self.range
    }

    pub fn field(&self) -> SortField {
        self.field
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn cap(&self) -> Option<u64> {
        self.limit
    }

    pub fn selection(&self) -> Projection {
        self.projection
    }

    pub fn start(&self) -> Option<&Position> {
        self.start.as_ref()
    }

    /// Identifies the ordered, filtered scan this query describes.
    ///
    /// Two queries with the same scope walk the same records in the same
    /// order, so a position from one can resume the other. Limits,
    /// projections, and start positions don't change the scope.
    pub fn scope(&self) -> String {
        let kind = match self.kind {
            Kind::Board => "board",
            Kind::Post => "post",
        };

        let direction = match self.direction {
            Direction::Ascending => "+",
            Direction::Descending => "-",
        };

        let field = match self.field {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        };

        let mut scope = format!("{}:{}{}", kind, direction, field);

        if let Some(board_id) = self.board_id() {
            scope.push_str(&format!(":board_id={}", board_id));
        }

        match self.range {
            Some((Bound::AtLeast, time)) => {
                scope.push_str(&format!(":>={}", time.timestamp_micros()))
            }
            Some((Bound::AtMost, time)) => {
                scope.push_str(&format!(":<={}", time.timestamp_micros()))
            }
            None => {}
        }

        scope
    }

    /// Whether a sort value passes the range filter.
    pub(crate) fn in_range(&self, sort_key: DateTime<Utc>) -> bool {
        match self.range {
            Some((Bound::AtLeast, time)) => sort_key >= time,
            Some((Bound::AtMost, time)) => sort_key <= time,
            None => true,
        }
    }

    /// Whether an entry with the given sort value and ID comes strictly after
    /// the start position, if there is one.
    ///
    /// Ties on the sort value are broken by ID in the same direction as the
    /// scan.
    pub(crate) fn is_after_start(&self, sort_key: DateTime<Utc>, id: i64) -> bool {
        let start = match self.start {
            Some(ref start) => start,
            None => return true,
        };

        let entry = (sort_key, id);
        let start = (start.sort_key(), start.id());

        match self.direction {
            Direction::Ascending => entry > start,
            Direction::Descending => entry < start,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_500_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn defaults() {
        let query = Query::posts();

        assert_eq!(query.kind(), Kind::Post);
        assert_eq!(query.field(), SortField::UpdatedAt);
        assert_eq!(query.direction(), Direction::Descending);
        assert_eq!(query.selection(), Projection::KeysOnly);
        assert_eq!(query.cap(), None);
        assert!(query.start().is_none());
    }

    #[test]
    fn board_filter_only_applies_to_posts() {
        assert_eq!(Query::posts().in_board(7).board_id(), Some(7));
        assert_eq!(Query::boards().in_board(7).board_id(), None);
    }

    #[test]
    fn scope_ignores_limit_and_projection() {
        let a = Query::posts().in_board(1);
        let b = Query::posts()
            .in_board(1)
            .limit(10)
            .projection(Projection::Full);

        assert_eq!(a.scope(), b.scope());
        assert_ne!(a.scope(), Query::posts().in_board(2).scope());
        assert_ne!(a.scope(), Query::posts().scope());
        assert_ne!(
            a.scope(),
            Query::posts()
                .in_board(1)
                .order_by(SortField::UpdatedAt, Direction::Ascending)
                .scope()
        );
        assert_ne!(Query::boards().scope(), Query::posts().scope());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let since = Query::posts().since(at(10));
        assert!(since.in_range(at(10)));
        assert!(since.in_range(at(11)));
        assert!(!since.in_range(at(9)));

        let until = Query::posts().until(at(10));
        assert!(until.in_range(at(10)));
        assert!(!until.in_range(at(10) + Duration::seconds(1)));
    }

    #[test]
    fn start_position_breaks_ties_by_id() {
        let query = Query::posts();
        let start = Position::new(&query, at(5), 20);

        let desc = query.clone().start_after(start.clone());
        assert!(desc.is_after_start(at(4), 99));
        assert!(desc.is_after_start(at(5), 19));
        assert!(!desc.is_after_start(at(5), 20));
        assert!(!desc.is_after_start(at(5), 21));
        assert!(!desc.is_after_start(at(6), 1));

        let asc = query
            .order_by(SortField::UpdatedAt, Direction::Ascending)
            .start_after(start);
        assert!(asc.is_after_start(at(5), 21));
        assert!(!asc.is_after_start(at(5), 20));
        assert!(asc.is_after_start(at(6), 1));
    }
}
