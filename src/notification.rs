//! User notifications: the sink the services emit into, and the inbox users read from
use crate::error::MarketResult;
use crate::store::{Record, Store};
use crate::types::TimeStamp;
use crate::utils::new_record_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum NotificationKind {
    #[n(0)]
    NewReservation,
    #[n(1)]
    ReservationAccepted,
    #[n(2)]
    ReservationRejected,
    #[n(3)]
    ReservationCancelled,
    #[n(4)]
    DeliveryStatus,
    #[n(5)]
    NewPurchaseRequest,
    #[n(6)]
    PurchaseAccepted,
    #[n(7)]
    PurchaseRejected,
    #[n(8)]
    ProjectFunded,
    #[n(9)]
    NewOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum RelatedKind {
    #[n(0)]
    Booking,
    #[n(1)]
    Lease,
    #[n(2)]
    Delivery,
    #[n(3)]
    PurchaseRequest,
    #[n(4)]
    Project,
    #[n(5)]
    Order,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct RelatedEntity {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub kind: RelatedKind,
}

/// An event to record; the sink assigns the id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related: Option<RelatedEntity>,
}

impl NewNotification {
    pub fn new(
        recipient_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            kind,
            title: title.into(),
            message: message.into(),
            related: None,
        }
    }
    pub fn about(mut self, id: impl Into<String>, kind: RelatedKind) -> Self {
        self.related = Some(RelatedEntity {
            id: id.into(),
            kind,
        });
        self
    }
}

/// Immutable once created, apart from `is_read`.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Notification {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub recipient_id: String,
    #[n(2)]
    pub kind: NotificationKind,
    #[n(3)]
    pub title: String,
    #[n(4)]
    pub message: String,
    #[n(5)]
    pub related: Option<RelatedEntity>,
    #[n(6)]
    pub is_read: bool,
    #[n(7)]
    pub created_at: TimeStamp,
}

impl Record for Notification {
    const KIND: &'static str = "notification";

    fn id(&self) -> &str {
        &self.id
    }
}

pub trait Notifier: Send + Sync {
    fn emit(&self, notice: NewNotification) -> MarketResult<Notification>;
}

pub struct NotificationCenter {
    store: Store,
}

impl NotificationCenter {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Newest first.
    pub fn for_user(&self, user_id: &str) -> MarketResult<Vec<Notification>> {
        let mut found = self
            .store
            .filter(|n: &Notification| n.recipient_id == user_id)?;
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    pub fn unread_count(&self, user_id: &str) -> MarketResult<usize> {
        Ok(self
            .store
            .filter(|n: &Notification| n.recipient_id == user_id && !n.is_read)?
            .len())
    }

    /// `None` when the notification does not exist or belongs to someone else.
    pub fn mark_read(&self, id: &str, user_id: &str) -> MarketResult<Option<Notification>> {
        let Some(mut notification) = self.owned_by(id, user_id)? else {
            return Ok(None);
        };

        notification.is_read = true;
        self.store.put(&notification)?;
        Ok(Some(notification))
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(&self, user_id: &str) -> MarketResult<usize> {
        let unread = self
            .store
            .filter(|n: &Notification| n.recipient_id == user_id && !n.is_read)?;

        let mut writes = self.store.write_set();
        for mut notification in unread {
            notification.is_read = true;
            writes.put(&notification)?;
        }
        let changed = writes.len();
        writes.commit(&self.store)?;

        Ok(changed)
    }

    pub fn delete(&self, id: &str, user_id: &str) -> MarketResult<bool> {
        if self.owned_by(id, user_id)?.is_none() {
            return Ok(false);
        }
        self.store.remove::<Notification>(id)
    }

    fn owned_by(&self, id: &str, user_id: &str) -> MarketResult<Option<Notification>> {
        Ok(self
            .store
            .get::<Notification>(id)?
            .filter(|n| n.recipient_id == user_id))
    }
}

impl Notifier for NotificationCenter {
    fn emit(&self, notice: NewNotification) -> MarketResult<Notification> {
        let id = new_record_id("note_")?;
        let notification = Notification {
            id,
            recipient_id: notice.recipient_id,
            kind: notice.kind,
            title: notice.title,
            message: notice.message,
            related: notice.related,
            is_read: false,
            created_at: TimeStamp::now(),
        };
        self.store.put(&notification)?;

        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn center() -> (tempfile::TempDir, NotificationCenter) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("notes.db")).unwrap();
        (dir, NotificationCenter::new(store))
    }

    fn notice(to: &str) -> NewNotification {
        NewNotification::new(to, NotificationKind::ReservationAccepted, "Accepted", "ok")
            .about("booking_x", RelatedKind::Booking)
    }

    #[test]
    fn inbox_tracks_unread() {
        let (_dir, center) = center();
        let first = center.emit(notice("alice")).unwrap();
        center.emit(notice("alice")).unwrap();
        center.emit(notice("bob")).unwrap();

        assert_eq!(center.unread_count("alice").unwrap(), 2);
        assert_eq!(center.for_user("alice").unwrap().len(), 2);

        let read = center.mark_read(&first.id, "alice").unwrap().unwrap();
        assert!(read.is_read);
        assert_eq!(center.unread_count("alice").unwrap(), 1);

        assert_eq!(center.mark_all_read("alice").unwrap(), 1);
        assert_eq!(center.unread_count("alice").unwrap(), 0);
        assert_eq!(center.unread_count("bob").unwrap(), 1);
    }

    #[test]
    fn other_users_cannot_touch_a_notification() {
        let (_dir, center) = center();
        let note = center.emit(notice("alice")).unwrap();

        assert!(center.mark_read(&note.id, "mallory").unwrap().is_none());
        assert!(!center.delete(&note.id, "mallory").unwrap());
        assert!(center.delete(&note.id, "alice").unwrap());
        assert!(center.for_user("alice").unwrap().is_empty());
    }

    #[test]
    fn related_entity_is_kept() {
        let (_dir, center) = center();
        let note = center.emit(notice("alice")).unwrap();
        let stored = center.for_user("alice").unwrap().remove(0);

        assert_eq!(stored, note);
        assert_eq!(stored.related.unwrap().kind, RelatedKind::Booking);
    }
}
