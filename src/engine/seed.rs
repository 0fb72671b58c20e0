//! Demo data written on first run when the hotel is in demo mode.
//!
//! Seed records use fixed ids so that cross-references (a guest's room, a
//! ticket's room) line up between collections.

use chrono::{Duration, Utc};
use serde_json::Value;

use crate::models::{
    AttendanceLog, BookingHistory, Collection, DnrRecord, FeatureRequest, Guest,
    MaintenanceTicket, Priority, Room, RoomStatus, RoomType, Staff, StoredDocument, Transaction,
    TransactionKind,
};

pub fn rooms() -> Vec<Room> {
    let specs = [
        ("101", RoomType::Single, 1, 8_900),
        ("102", RoomType::Single, 1, 8_900),
        ("103", RoomType::Double, 1, 12_500),
        ("104", RoomType::Double, 1, 12_500),
        ("201", RoomType::Double, 2, 13_500),
        ("202", RoomType::Family, 2, 18_000),
        ("203", RoomType::Suite, 2, 26_000),
        ("301", RoomType::Suite, 3, 32_000),
    ];

    specs
        .into_iter()
        .map(|(number, room_type, floor, rate)| Room {
            id: format!("room-{}", number),
            ..Room::new(number, room_type, floor, rate)
        })
        .map(|room| match room.number.as_str() {
            "103" => room.with_guest("guest-1"),
            "202" => room.with_guest("guest-2"),
            "104" => room.with_status(RoomStatus::Cleaning),
            "301" => room.with_status(RoomStatus::Maintenance),
            _ => room,
        })
        .collect()
}

pub fn guests() -> Vec<Guest> {
    let today = Utc::now().date_naive();
    vec![
        Guest {
            id: "guest-1".to_string(),
            ..Guest::new("Amelia Hart")
                .with_email("amelia.hart@example.com")
                .with_stay("room-103", today - Duration::days(1), today + Duration::days(2))
                .checked_in()
        },
        Guest {
            id: "guest-2".to_string(),
            ..Guest::new("Jonas Weber")
                .with_phone("+49 30 1234567")
                .with_stay("room-202", today, today + Duration::days(5))
                .checked_in()
        },
        Guest {
            id: "guest-3".to_string(),
            ..Guest::new("Priya Nair")
                .with_email("priya@example.com")
                .with_stay("room-201", today + Duration::days(3), today + Duration::days(6))
        },
    ]
}

pub fn staff() -> Vec<Staff> {
    vec![
        Staff {
            id: "staff-1".to_string(),
            ..Staff::new("Maria Lopez", "Front Desk").with_email("maria@example.com")
        },
        Staff {
            id: "staff-2".to_string(),
            ..Staff::new("Tom Becker", "Housekeeping")
        },
        Staff {
            id: "staff-3".to_string(),
            ..Staff::new("Ken Sato", "Maintenance")
        },
    ]
}

pub fn transactions() -> Vec<Transaction> {
    let today = Utc::now().date_naive();
    vec![
        Transaction {
            id: "txn-1".to_string(),
            ..Transaction::new(today - Duration::days(1), TransactionKind::Income, "room", 37_500)
                .with_description("Room 103, 3 nights")
                .with_guest("guest-1")
        },
        Transaction {
            id: "txn-2".to_string(),
            ..Transaction::new(today, TransactionKind::Expense, "supplies", 8_450)
                .with_description("Linen restock")
        },
        Transaction {
            id: "txn-3".to_string(),
            ..Transaction::new(today, TransactionKind::Expense, "utilities", 21_000)
                .with_description("Electricity")
        },
    ]
}

pub fn maintenance() -> Vec<MaintenanceTicket> {
    vec![
        MaintenanceTicket {
            id: "ticket-1".to_string(),
            ..MaintenanceTicket::new("Leaking shower", Priority::High, "Tom Becker")
                .for_room("room-301")
                .with_description("Water pooling under the shower tray")
        },
        MaintenanceTicket {
            id: "ticket-2".to_string(),
            ..MaintenanceTicket::new("Lobby light flickers", Priority::Low, "Maria Lopez")
        },
    ]
}

pub fn bookings() -> Vec<BookingHistory> {
    let today = Utc::now().date_naive();
    vec![BookingHistory {
        id: "booking-1".to_string(),
        ..BookingHistory::new(
            "guest-3",
            "room-203",
            today - Duration::days(30),
            today - Duration::days(27),
            78_000,
        )
    }]
}

pub fn documents() -> Vec<StoredDocument> {
    vec![StoredDocument {
        id: "doc-1".to_string(),
        ..StoredDocument::new("House rules.pdf", "policies", "application/pdf")
    }]
}

pub fn feature_requests() -> Vec<FeatureRequest> {
    vec![FeatureRequest {
        id: "feature-1".to_string(),
        ..FeatureRequest::new(
            "Housekeeping schedule",
            "Plan cleaning rounds from check-out dates",
        )
    }]
}

pub fn attendance() -> Vec<AttendanceLog> {
    let now = Utc::now();
    vec![
        AttendanceLog {
            id: "attendance-1".to_string(),
            ..AttendanceLog::clock_in("staff-1", now - Duration::hours(4))
        },
        AttendanceLog {
            id: "attendance-2".to_string(),
            ..AttendanceLog::clock_in("staff-2", now - Duration::hours(10))
                .with_clock_out(now - Duration::hours(2))
        },
    ]
}

pub fn dnr() -> Vec<DnrRecord> {
    Vec::new()
}

/// Seed records for `collection` as stored documents.
pub fn values_for(collection: Collection) -> Vec<Value> {
    fn encode<T: serde::Serialize>(items: Vec<T>) -> Vec<Value> {
        items
            .iter()
            .filter_map(|item| serde_json::to_value(item).ok())
            .collect()
    }

    match collection {
        Collection::Rooms => encode(rooms()),
        Collection::Guests => encode(guests()),
        Collection::Staff => encode(staff()),
        Collection::Transactions => encode(transactions()),
        Collection::Maintenance => encode(maintenance()),
        Collection::Bookings => encode(bookings()),
        Collection::Documents => encode(documents()),
        Collection::FeatureRequests => encode(feature_requests()),
        Collection::Attendance => encode(attendance()),
        Collection::Dnr => encode(dnr()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_eight_mock_rooms() {
        let rooms = rooms();
        assert_eq!(rooms.len(), 8);

        let ids: HashSet<_> = rooms.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_guest_rooms_exist() {
        let room_ids: HashSet<String> = rooms().into_iter().map(|r| r.id).collect();
        for guest in guests() {
            if let Some(room_id) = guest.room_id {
                assert!(room_ids.contains(&room_id), "missing {}", room_id);
            }
        }
    }

    #[test]
    fn test_every_seed_has_ids() {
        for collection in Collection::ALL {
            for item in values_for(collection) {
                assert!(item["id"].as_str().is_some_and(|id| !id.is_empty()));
            }
        }
    }
}
