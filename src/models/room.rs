use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Single,
    Double,
    Suite,
    Family,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Cleaning,
    Maintenance,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomStatus::Available => write!(f, "available"),
            RoomStatus::Occupied => write!(f, "occupied"),
            RoomStatus::Cleaning => write!(f, "cleaning"),
            RoomStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

impl FromStr for RoomStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(RoomStatus::Available),
            "occupied" => Ok(RoomStatus::Occupied),
            "cleaning" => Ok(RoomStatus::Cleaning),
            "maintenance" => Ok(RoomStatus::Maintenance),
            _ => Err(format!(
                "Invalid room status '{}'. Valid options: available, occupied, cleaning, maintenance",
                s
            )),
        }
    }
}

/// A bookable room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub number: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub status: RoomStatus,
    pub floor: u32,
    /// Nightly rate in cents.
    pub rate_cents: i64,
    pub guest_id: Option<String>,
}

impl Room {
    pub fn new(number: impl Into<String>, room_type: RoomType, floor: u32, rate_cents: i64) -> Self {
        Self {
            id: new_id(),
            number: number.into(),
            room_type,
            status: RoomStatus::Available,
            floor,
            rate_cents,
            guest_id: None,
        }
    }

    pub fn with_status(mut self, status: RoomStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_guest(mut self, guest_id: impl Into<String>) -> Self {
        self.guest_id = Some(guest_id.into());
        self.status = RoomStatus::Occupied;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_new() {
        let room = Room::new("101", RoomType::Single, 1, 8900);

        assert_eq!(room.number, "101");
        assert_eq!(room.status, RoomStatus::Available);
        assert!(room.guest_id.is_none());
        assert!(!room.id.is_empty());
    }

    #[test]
    fn test_room_ids_are_unique() {
        let a = Room::new("101", RoomType::Single, 1, 8900);
        let b = Room::new("101", RoomType::Single, 1, 8900);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_room_serializes_type_and_status() {
        let room = Room::new("201", RoomType::Suite, 2, 25000).with_guest("g1");
        let json = serde_json::to_value(&room).unwrap();

        assert_eq!(json["type"], "suite");
        assert_eq!(json["status"], "occupied");
        assert_eq!(json["guestId"], "g1");
        assert_eq!(json["rateCents"], 25000);
    }

    #[test]
    fn test_room_status_from_str() {
        assert_eq!(
            "Cleaning".parse::<RoomStatus>().unwrap(),
            RoomStatus::Cleaning
        );
        assert!("flooded".parse::<RoomStatus>().is_err());
    }
}
