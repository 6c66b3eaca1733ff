use serde::Serialize;

use crate::concierge::listing::TourRoom;

/// Position within a listing's virtual tour. Moves wrap around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TourCursor {
    index: usize,
}

impl TourCursor {
    pub fn next(&mut self, rooms: usize) {
        if rooms > 0 {
            self.index = (self.index + 1) % rooms;
        }
    }

    pub fn previous(&mut self, rooms: usize) {
        if rooms > 0 {
            self.index = (self.index + rooms - 1) % rooms;
        }
    }

    pub fn view(&self, rooms: &[TourRoom]) -> TourView {
        match rooms.get(self.index) {
            Some(room) => TourView::Room {
                index: self.index,
                count: rooms.len(),
                room: room.clone(),
                can_navigate: rooms.len() > 1,
            },
            None => TourView::Unavailable {
                message: "No virtual tour available for this property",
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TourView {
    Room {
        index: usize,
        count: usize,
        room: TourRoom,
        can_navigate: bool,
    },
    Unavailable {
        message: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooms(n: usize) -> Vec<TourRoom> {
        (0..n)
            .map(|i| TourRoom {
                room: format!("Room {}", i),
                image: String::new(),
                description: String::new(),
            })
            .collect()
    }

    #[test]
    fn wraps_in_both_directions() {
        let mut cursor = TourCursor::default();
        cursor.previous(3);
        assert!(matches!(cursor.view(&rooms(3)), TourView::Room { index: 2, .. }));
        cursor.next(3);
        assert!(matches!(cursor.view(&rooms(3)), TourView::Room { index: 0, .. }));
    }

    #[test]
    fn empty_tour_is_unavailable() {
        let mut cursor = TourCursor::default();
        cursor.next(0);
        assert!(matches!(cursor.view(&[]), TourView::Unavailable { .. }));
    }
}
