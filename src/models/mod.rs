mod booking;
mod collection;
mod document;
mod finance;
mod guest;
mod maintenance;
mod room;
mod staff;

pub use booking::{BookingHistory, BookingStatus};
pub use collection::{Collection, IndexField};
pub use document::{DnrRecord, FeatureRequest, FeatureStatus, StoredDocument};
pub use finance::{Transaction, TransactionKind};
pub use guest::{Guest, GuestStatus};
pub use maintenance::{MaintenanceTicket, Priority, TicketStatus};
pub use room::{Room, RoomStatus, RoomType};
pub use staff::{AttendanceLog, Staff, StaffStatus};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record stored in one of the synced collections.
///
/// Ids are assigned by the caller when the record is created and never change.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

macro_rules! impl_record {
    ($($ty:ty => $collection:ident),* $(,)?) => {
        $(
            impl Record for $ty {
                const COLLECTION: Collection = Collection::$collection;

                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_record! {
    Room => Rooms,
    Guest => Guests,
    Staff => Staff,
    Transaction => Transactions,
    MaintenanceTicket => Maintenance,
    BookingHistory => Bookings,
    StoredDocument => Documents,
    FeatureRequest => FeatureRequests,
    AttendanceLog => Attendance,
    DnrRecord => Dnr,
}

/// Generates a fresh record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
