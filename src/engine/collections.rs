//! Per-collection bindings over [`SyncEngine::load`] and [`SyncEngine::save`].

use super::{seed, SaveOutcome, SyncEngine};
use crate::error::SyncError;
use crate::models::{
    AttendanceLog, BookingHistory, DnrRecord, FeatureRequest, Guest, MaintenanceTicket, Room,
    Staff, StoredDocument, Transaction,
};

macro_rules! collection_accessors {
    ($($get:ident, $save:ident => $ty:ty, $seed:path;)*) => {
        impl SyncEngine {
            $(
                pub async fn $get(&self) -> Result<Vec<$ty>, SyncError> {
                    self.load($seed()).await
                }

                pub async fn $save(&self, items: &[$ty]) -> Result<SaveOutcome, SyncError> {
                    self.save(items).await
                }
            )*
        }
    };
}

collection_accessors! {
    get_rooms, save_rooms => Room, seed::rooms;
    get_guests, save_guests => Guest, seed::guests;
    get_staff, save_staff => Staff, seed::staff;
    get_transactions, save_transactions => Transaction, seed::transactions;
    get_maintenance, save_maintenance => MaintenanceTicket, seed::maintenance;
    get_bookings, save_bookings => BookingHistory, seed::bookings;
    get_documents, save_documents => StoredDocument, seed::documents;
    get_feature_requests, save_feature_requests => FeatureRequest, seed::feature_requests;
    get_attendance, save_attendance => AttendanceLog, seed::attendance;
    get_dnr, save_dnr => DnrRecord, seed::dnr;
}

#[cfg(test)]
mod tests {
    use crate::engine::tests::setup;
    use crate::models::{Collection, Guest, RoomStatus};
    use crate::settings::SyncMode;

    #[tokio::test]
    async fn test_get_rooms_seeds_mock_rooms() {
        let ctx = setup(SyncMode::Local).await;

        let rooms = ctx.engine.get_rooms().await.unwrap();
        assert_eq!(rooms.len(), 8);

        let again = ctx.engine.get_rooms().await.unwrap();
        assert_eq!(again, rooms);
    }

    #[tokio::test]
    async fn test_save_then_get_typed() {
        let ctx = setup(SyncMode::Local).await;

        let mut rooms = ctx.engine.get_rooms().await.unwrap();
        rooms[0].status = RoomStatus::Cleaning;
        rooms.truncate(2);
        ctx.engine.save_rooms(&rooms).await.unwrap();

        assert_eq!(ctx.engine.get_rooms().await.unwrap(), rooms);
    }

    #[tokio::test]
    async fn test_no_seed_outside_demo_mode() {
        let ctx = setup(SyncMode::Local).await;

        let mut settings = ctx.engine.settings().get_settings().await;
        settings.demo_mode = false;
        ctx.engine.settings().save_settings(settings).await.unwrap();

        assert!(ctx.engine.get_guests().await.unwrap().is_empty());

        ctx.engine
            .save_guests(&[Guest::new("Walk-in")])
            .await
            .unwrap();
        assert_eq!(
            ctx.engine.store().count(Collection::Guests).await.unwrap(),
            1
        );
    }
}
