use super::*;
use crate::catalog::MemoryCatalog;
use crate::utils::time;
use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::models::{
    CatalogItem, LineItemInput, PaymentMethod, SelectedItem, TableStatus,
};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;

// ========== Test doubles ==========

/// Notifier that forwards every published signal to a channel
struct RecordingNotifier {
    tx: mpsc::UnboundedSender<(Topic, TableSignal)>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, topic: Topic, signal: TableSignal) -> Result<(), TransportError> {
        let _ = self.tx.send((topic, signal));
        Ok(())
    }
}

/// Notifier whose transport is always down
struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn publish(&self, _topic: Topic, _signal: TableSignal) -> Result<(), TransportError> {
        Err(TransportError::Closed("transport down".to_string()))
    }
}

type Signals = mpsc::UnboundedReceiver<(Topic, TableSignal)>;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn catalog_item(id: &str, name: &str, price: &str, available: bool) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        name: name.to_string(),
        price: dec(price),
        category: "bar".to_string(),
        available,
    }
}

fn create_catalog() -> Arc<MemoryCatalog> {
    Arc::new(MemoryCatalog::with_items([
        catalog_item("coffee", "Café", "1.50", true),
        catalog_item("cake", "Tarta", "3.75", true),
        catalog_item("water", "Agua", "1.20", true),
        catalog_item("soup", "Sopa", "4.00", false),
    ]))
}

fn create_service_with(catalog: Arc<MemoryCatalog>, tables: u32) -> (TableService, Signals) {
    let (tx, rx) = mpsc::unbounded_channel();
    let storage = TableStorage::open_in_memory().unwrap();
    let service = TableService::new(storage, catalog, Arc::new(RecordingNotifier { tx }))
        .with_fixed_table_count(tables);
    service.seed_fixed_tables(tables).unwrap();
    (service, rx)
}

fn create_service() -> (TableService, Signals) {
    create_service_with(create_catalog(), DEFAULT_FIXED_TABLE_COUNT)
}

async fn next_signal(rx: &mut Signals) -> (Topic, TableSignal) {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("signal not published")
        .expect("notifier dropped")
}

async fn assert_no_signal(rx: &mut Signals) {
    let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(got.is_err(), "unexpected signal: {:?}", got);
}

fn round_ids(service: &TableService, table: u32) -> BTreeSet<String> {
    service
        .table_rounds(table)
        .unwrap()
        .rounds
        .into_iter()
        .map(|r| r.id)
        .collect()
}

// ========== End to end ==========

#[tokio::test]
async fn test_table_lifecycle_free_serving_occupied_free() {
    let (service, mut rx) = create_service();
    assert_eq!(service.table_status(5).unwrap(), TableStatus::Free);

    let round = service
        .open_round(5, vec![LineItemInput::catalog("coffee", 2)])
        .await
        .unwrap();
    assert_eq!(service.table_status(5).unwrap(), TableStatus::Serving);
    assert_eq!(
        next_signal(&mut rx).await,
        (Topic::RoundsUpdate, TableSignal::new(5, SignalKind::RoundOpened))
    );

    service.confirm_service(5).await.unwrap();
    assert_eq!(service.table_status(5).unwrap(), TableStatus::Occupied);
    assert!(service.get_round(&round.id).unwrap().is_service_confirmed);
    assert_eq!(next_signal(&mut rx).await.1.event_kind, SignalKind::ServiceConfirmed);

    assert_eq!(service.mark_all_paid_for_table(5).await.unwrap(), 1);
    assert_eq!(service.table_status(5).unwrap(), TableStatus::Free);
    assert_eq!(next_signal(&mut rx).await.1.event_kind, SignalKind::TablePaid);

    // A new party starts unconfirmed
    service
        .open_round(5, vec![LineItemInput::catalog("water", 1)])
        .await
        .unwrap();
    assert_eq!(service.table_status(5).unwrap(), TableStatus::Serving);
}

#[tokio::test]
async fn test_table_statuses_include_free_tables() {
    let (service, _rx) = create_service();
    service
        .open_round(2, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();

    let statuses = service.table_statuses().unwrap();
    assert_eq!(statuses.len(), DEFAULT_FIXED_TABLE_COUNT as usize);
    assert_eq!(statuses[0].table_number, 1);
    assert_eq!(statuses[0].status, TableStatus::Free);
    assert_eq!(statuses[1].status, TableStatus::Serving);
}

// ========== Round store ==========

#[tokio::test]
async fn test_open_round_snapshots_catalog() {
    let catalog = create_catalog();
    let (service, _rx) = create_service_with(catalog.clone(), 3);

    let round = service
        .open_round(1, vec![LineItemInput::catalog("coffee", 2)])
        .await
        .unwrap();
    assert_eq!(round.line_items[0].name, "Café");
    assert_eq!(round.line_items[0].unit_price, dec("1.50"));

    // Later catalog edits never touch history
    catalog.upsert(catalog_item("coffee", "Café doble", "2.50", true));
    let stored = service.get_round(&round.id).unwrap();
    assert_eq!(stored.line_items[0].name, "Café");
    assert_eq!(stored.total(), dec("3.00"));

    let appended = service
        .append_line_items(&round.id, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    assert_eq!(appended.line_items[1].unit_price, dec("2.50"));
    assert_eq!(appended.total(), dec("5.50"));
}

#[tokio::test]
async fn test_unknown_catalog_item_keeps_caller_fields() {
    let (service, _rx) = create_service();
    let input = LineItemInput {
        catalog_item_id: Some("retired".to_string()),
        name: Some("Vermut".to_string()),
        price: Some(dec("2.80")),
        quantity: 1,
        ..Default::default()
    };
    let round = service.open_round(1, vec![input]).await.unwrap();
    assert_eq!(round.line_items[0].name, "Vermut");
    assert_eq!(round.line_items[0].catalog_item_id.as_deref(), Some("retired"));

    let custom = service
        .open_round(1, vec![LineItemInput::custom("Menú del día", dec("12.50"), 2)])
        .await
        .unwrap();
    assert_eq!(custom.total(), dec("25.00"));
}

#[tokio::test]
async fn test_unknown_tables_leave_no_lock_slots() {
    let (service, _rx) = create_service();
    for n in 1000..1500 {
        let err = service.confirm_service(n).await.unwrap_err();
        assert!(matches!(err, ServiceError::TableNotFound(_)));
        let err = service
            .pay_and_issue_ticket(n, &["r".to_string()], PaymentMethod::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        service.move_table(n, n + 1).await.unwrap_err();
    }
    assert!(service.locks.is_empty());
}

#[tokio::test]
async fn test_unknown_catalog_item_without_fallback_is_stored_blank() {
    let (service, mut rx) = create_service();
    let round = service
        .open_round(1, vec![LineItemInput::catalog("deleted-product", 1)])
        .await
        .unwrap();
    let line = &round.line_items[0];
    assert_eq!(line.catalog_item_id.as_deref(), Some("deleted-product"));
    assert_eq!(line.name, "");
    assert_eq!(line.unit_price, Decimal::ZERO);
    assert_eq!(next_signal(&mut rx).await.1.event_kind, SignalKind::RoundOpened);

    let appended = service
        .append_line_items(&round.id, vec![LineItemInput::catalog("gone", 2)])
        .await
        .unwrap();
    assert_eq!(appended.line_items.len(), 2);
    assert_eq!(appended.total(), Decimal::ZERO);
    assert_eq!(service.table_status(1).unwrap(), TableStatus::Serving);
}

#[tokio::test]
async fn test_open_round_validation() {
    let (service, mut rx) = create_service();

    let err = service.open_round(1, vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .open_round(1, vec![LineItemInput::catalog("coffee", 0)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .open_round(1, vec![LineItemInput::catalog("soup", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Neither a catalog id nor a name
    let err = service
        .open_round(
            1,
            vec![LineItemInput {
                price: Some(dec("1.00")),
                quantity: 1,
                ..Default::default()
            }],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .open_round(99, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TableNotFound(99)));

    assert_eq!(service.table_status(1).unwrap(), TableStatus::Free);
    assert_no_signal(&mut rx).await;
}

#[tokio::test]
async fn test_replace_keeps_snapshot_by_line_id() {
    let catalog = create_catalog();
    let (service, _rx) = create_service_with(catalog.clone(), 3);
    let round = service
        .open_round(
            1,
            vec![
                LineItemInput::catalog("coffee", 2),
                LineItemInput::catalog("cake", 1),
            ],
        )
        .await
        .unwrap();
    let coffee_id = round.line_items[0].line_id.clone();
    catalog.upsert(catalog_item("coffee", "Café", "9.99", true));

    let keep = LineItemInput {
        line_id: Some(coffee_id.clone()),
        quantity: 3,
        variant: Some("con leche".to_string()),
        ..Default::default()
    };
    let replaced = service
        .replace_line_items(&round.id, vec![keep, LineItemInput::catalog("water", 1)])
        .await
        .unwrap();

    assert_eq!(replaced.line_items.len(), 2);
    let coffee = replaced.find_line(&coffee_id).unwrap();
    assert_eq!(coffee.quantity, 3);
    assert_eq!(coffee.unit_price, dec("1.50"));
    assert_eq!(coffee.variant.as_deref(), Some("con leche"));
    assert_eq!(replaced.total(), dec("5.70"));

    let stale = LineItemInput {
        line_id: Some("nope".to_string()),
        quantity: 1,
        ..Default::default()
    };
    let err = service
        .replace_line_items(&round.id, vec![stale])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::LineItemNotFound { .. }));
}

#[tokio::test]
async fn test_amending_paid_round_is_invalid_state() {
    let (service, _rx) = create_service();
    let round = service
        .open_round(1, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    service.mark_paid(&round.id).await.unwrap();

    let err = service
        .append_line_items(&round.id, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = service
        .replace_line_items(&round.id, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = service
        .append_line_items("missing", vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_mark_paid_is_idempotent() {
    let (service, mut rx) = create_service();
    let round = service
        .open_round(3, vec![LineItemInput::catalog("coffee", 2)])
        .await
        .unwrap();
    next_signal(&mut rx).await;

    let first = service.mark_paid(&round.id).await.unwrap();
    let second = service.mark_paid(&round.id).await.unwrap();
    assert!(first.is_paid);
    assert_eq!(first, second);
    assert_eq!(next_signal(&mut rx).await.1.event_kind, SignalKind::RoundPaid);
    assert_no_signal(&mut rx).await;
}

#[tokio::test]
async fn test_service_flag_frozen_at_payment() {
    let (service, _rx) = create_service();
    let first = service
        .open_round(4, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    let second = service
        .open_round(4, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap();
    service.confirm_service(4).await.unwrap();
    service.mark_paid(&first.id).await.unwrap();

    // Table still has an open round, so it stays occupied
    assert_eq!(service.table_status(4).unwrap(), TableStatus::Occupied);
    service.mark_paid(&second.id).await.unwrap();
    assert_eq!(service.table_status(4).unwrap(), TableStatus::Free);

    service
        .open_round(4, vec![LineItemInput::catalog("water", 1)])
        .await
        .unwrap();
    assert!(service.get_round(&first.id).unwrap().is_service_confirmed);
    assert_eq!(service.table_status(4).unwrap(), TableStatus::Serving);
}

#[tokio::test]
async fn test_confirm_service_requires_open_round() {
    let (service, _rx) = create_service();
    let err = service.confirm_service(6).await.unwrap_err();
    assert!(matches!(err, ServiceError::NoOpenRounds(6)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service.confirm_service(77).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_clean_table_keeps_paid_rounds() {
    let (service, _rx) = create_service();
    let paid = service
        .open_round(7, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    service.mark_paid(&paid.id).await.unwrap();
    let open = service
        .open_round(7, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap();
    service.confirm_service(7).await.unwrap();

    assert_eq!(service.delete_open_rounds_for_table(7).await.unwrap(), 1);
    assert_eq!(service.table_status(7).unwrap(), TableStatus::Free);
    assert!(service.get_round(&paid.id).unwrap().is_paid);
    assert!(matches!(
        service.get_round(&open.id).unwrap_err(),
        ServiceError::RoundNotFound(_)
    ));
    assert_eq!(service.paid_rounds_for_table(7).unwrap().len(), 1);

    assert_eq!(service.delete_open_rounds_for_table(7).await.unwrap(), 0);
}

#[tokio::test]
async fn test_table_rounds_total() {
    let (service, _rx) = create_service();
    service
        .open_round(8, vec![LineItemInput::catalog("coffee", 3)])
        .await
        .unwrap();
    service
        .open_round(8, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap();

    let rounds = service.table_rounds(8).unwrap();
    assert_eq!(rounds.rounds.len(), 2);
    assert_eq!(rounds.total, dec("8.25"));
    assert!(rounds.rounds[0].created_at <= rounds.rounds[1].created_at);
}

// ========== Checkout ==========

#[tokio::test]
async fn test_pay_and_issue_ticket() {
    let (service, mut rx) = create_service();
    let r1 = service
        .open_round(2, vec![LineItemInput::catalog("coffee", 2)])
        .await
        .unwrap();
    let r2 = service
        .open_round(2, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap();
    next_signal(&mut rx).await;
    next_signal(&mut rx).await;

    let ticket = service
        .pay_and_issue_ticket(2, &[r1.id.clone(), r2.id.clone()], PaymentMethod::Card)
        .await
        .unwrap();
    assert_eq!(ticket.total, dec("6.75"));
    assert_eq!(ticket.items.len(), 2);
    assert_eq!(ticket.sequence(), Some(1));
    assert_eq!(ticket.ticket_number.len(), 9);
    let expected_day = time::today(service.timezone()).format("%y%m%d").to_string();
    assert_eq!(ticket.day_prefix(), Some(expected_day.as_str()));
    assert_eq!(ticket.source_round_ids, vec![r1.id.clone(), r2.id.clone()]);

    assert_eq!(service.table_status(2).unwrap(), TableStatus::Free);
    assert!(service.get_round(&r1.id).unwrap().paid_at.is_some());
    assert_eq!(next_signal(&mut rx).await.1.event_kind, SignalKind::TicketIssued);

    assert_eq!(service.get_ticket(&ticket.id).unwrap(), ticket);
    assert_eq!(service.get_ticket_by_number(&ticket.ticket_number).unwrap(), ticket);
    assert_eq!(service.tickets_for_table(2).unwrap(), vec![ticket.clone()]);
    let today = time::today(service.timezone());
    assert_eq!(service.daily_tickets(today).unwrap().len(), 1);

    let err = service
        .pay_and_issue_ticket(2, &[r1.id.clone()], PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::RoundAlreadyPaid(_)));
}

#[tokio::test]
async fn test_checkout_rejects_foreign_rounds_atomically() {
    let (service, mut rx) = create_service();
    let mine = service
        .open_round(1, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    let theirs = service
        .open_round(2, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    next_signal(&mut rx).await;
    next_signal(&mut rx).await;

    let err = service
        .pay_and_issue_ticket(1, &[mine.id.clone(), theirs.id.clone()], PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .pay_and_issue_ticket(1, &[mine.id.clone(), mine.id.clone()], PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .pay_and_issue_ticket(1, &[], PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Nothing was paid and no number was burned
    assert!(!service.get_round(&mine.id).unwrap().is_paid);
    let today = time::today(service.timezone());
    assert_eq!(service.storage().current_sequence(today).unwrap(), 0);
    assert_no_signal(&mut rx).await;

    let ticket = service
        .pay_and_issue_ticket(1, &[mine.id.clone()], PaymentMethod::Cash)
        .await
        .unwrap();
    assert_eq!(ticket.sequence(), Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_get_gapless_numbers() {
    let (service, _rx) = create_service_with(create_catalog(), 50);

    let mut handles = Vec::new();
    for table in 1..=50u32 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            let round = service
                .open_round(table, vec![LineItemInput::catalog("coffee", 1)])
                .await
                .unwrap();
            service
                .pay_and_issue_ticket(table, &[round.id], PaymentMethod::Cash)
                .await
                .unwrap()
        }));
    }

    let mut numbers = HashSet::new();
    let mut suffixes = BTreeSet::new();
    for handle in handles {
        let ticket = handle.await.unwrap();
        assert!(numbers.insert(ticket.ticket_number.clone()));
        suffixes.insert(ticket.sequence().unwrap());
    }
    assert_eq!(suffixes, (1..=50).collect::<BTreeSet<u32>>());
}

#[tokio::test]
async fn test_selective_payment() {
    let catalog = Arc::new(MemoryCatalog::with_items([
        catalog_item("a", "A", "2.00", true),
        catalog_item("b", "B", "3.00", true),
        catalog_item("c", "C", "4.50", true),
    ]));
    let (service, _rx) = create_service_with(catalog, 3);

    let r1 = service
        .open_round(
            1,
            vec![LineItemInput::catalog("a", 2), LineItemInput::catalog("b", 1)],
        )
        .await
        .unwrap();
    let r2 = service
        .open_round(1, vec![LineItemInput::catalog("c", 1)])
        .await
        .unwrap();
    let a = r1.line_items[0].line_id.clone();
    let b = r1.line_items[1].line_id.clone();
    let c = r2.line_items[0].line_id.clone();

    let ticket = service
        .pay_selected_items(
            1,
            &[
                SelectedItem {
                    round_id: r1.id.clone(),
                    line_id: a.clone(),
                    quantity: 1,
                },
                SelectedItem {
                    round_id: r2.id.clone(),
                    line_id: c.clone(),
                    quantity: 1,
                },
            ],
            PaymentMethod::Cash,
        )
        .await
        .unwrap();

    assert_eq!(ticket.total, dec("6.50"));
    assert_eq!(ticket.items.len(), 2);
    assert_eq!(ticket.source_round_ids.len(), 1);

    let r1_after = service.get_round(&r1.id).unwrap();
    assert_eq!(r1_after.line_items.len(), 2);
    assert_eq!(r1_after.find_line(&a).unwrap().quantity, 1);
    assert_eq!(r1_after.find_line(&b).unwrap().quantity, 1);
    assert!(!r1_after.is_paid);
    assert!(matches!(
        service.get_round(&r2.id).unwrap_err(),
        ServiceError::RoundNotFound(_)
    ));

    let synthetic = service.get_round(&ticket.source_round_ids[0]).unwrap();
    assert!(synthetic.is_paid);
    assert_eq!(synthetic.total(), dec("6.50"));
    assert_eq!(round_ids(&service, 1), BTreeSet::from([r1.id.clone()]));
    assert_eq!(service.table_status(1).unwrap(), TableStatus::Serving);
}

#[tokio::test]
async fn test_selective_payment_is_all_or_nothing() {
    let (service, mut rx) = create_service();
    let round = service
        .open_round(1, vec![LineItemInput::catalog("coffee", 2)])
        .await
        .unwrap();
    let line = round.line_items[0].line_id.clone();
    next_signal(&mut rx).await;

    // Two selections of the same line add up past what was ordered
    let pick = |quantity| SelectedItem {
        round_id: round.id.clone(),
        line_id: line.clone(),
        quantity,
    };
    let err = service
        .pay_selected_items(1, &[pick(1), pick(2)], PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::InsufficientQuantity {
            requested: 3,
            available: 2,
            ..
        }
    ));
    assert_eq!(service.get_round(&round.id).unwrap(), round);
    assert_no_signal(&mut rx).await;

    // Paying everything leaves the table free
    let ticket = service
        .pay_selected_items(1, &[pick(1), pick(1)], PaymentMethod::Card)
        .await
        .unwrap();
    assert_eq!(ticket.total, dec("3.00"));
    assert_eq!(service.table_status(1).unwrap(), TableStatus::Free);
}

// ========== Transfer ==========

#[tokio::test]
async fn test_round_that_keeps_moving_is_invalid_state() {
    let (service, _rx) = create_service();
    let mut round = service
        .open_round(1, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();

    let mut held = Vec::new();
    for n in 1..=3 {
        held.push(service.locks.lock(n).await);
    }
    let payer = {
        let service = service.clone();
        let id = round.id.clone();
        tokio::spawn(async move { service.mark_paid(&id).await })
    };

    // Re-point the round each time the payer gets the lock it waited on
    for to in 2..=4 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        round.table_number = to;
        let txn = service.storage.begin_write().unwrap();
        service.storage.put_round(&txn, &round).unwrap();
        txn.commit().unwrap();
        held.remove(0);
    }

    let err = tokio::time::timeout(Duration::from_secs(1), payer)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(!service.get_round(&round.id).unwrap().is_paid);
}

#[tokio::test]
async fn test_move_table_carries_rounds_and_flag() {
    let (service, mut rx) = create_service();
    service
        .open_round(1, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    service
        .open_round(1, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap();
    service.confirm_service(1).await.unwrap();
    for _ in 0..3 {
        next_signal(&mut rx).await;
    }
    let before = round_ids(&service, 1);

    service.move_table(1, 9).await.unwrap();
    assert_eq!(service.table_status(1).unwrap(), TableStatus::Free);
    assert_eq!(service.table_status(9).unwrap(), TableStatus::Occupied);
    assert_eq!(round_ids(&service, 9), before);
    assert!(round_ids(&service, 1).is_empty());

    let mut moved = HashSet::new();
    for _ in 0..2 {
        let (_, signal) = next_signal(&mut rx).await;
        assert_eq!(signal.event_kind, SignalKind::TableMoved);
        moved.insert(signal.table_number);
    }
    assert_eq!(moved, HashSet::from([1, 9]));
}

#[tokio::test]
async fn test_move_table_never_lands_on_busy_table() {
    let (service, mut rx) = create_service();
    service
        .open_round(1, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    service
        .open_round(2, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap();
    next_signal(&mut rx).await;
    next_signal(&mut rx).await;
    let source = round_ids(&service, 1);
    let destination = round_ids(&service, 2);

    let err = service.move_table(1, 2).await.unwrap_err();
    assert!(matches!(err, ServiceError::TableOccupied(2)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(round_ids(&service, 1), source);
    assert_eq!(round_ids(&service, 2), destination);

    assert_eq!(service.move_table(1, 1).await.unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(service.move_table(3, 4).await.unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(service.move_table(1, 42).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_no_signal(&mut rx).await;
}

#[tokio::test]
async fn test_round_operations_follow_a_moved_round() {
    let (service, _rx) = create_service();
    let round = service
        .open_round(1, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    service.move_table(1, 2).await.unwrap();

    let appended = service
        .append_line_items(&round.id, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap();
    assert_eq!(appended.table_number, 2);
    let err = service
        .pay_and_issue_ticket(1, &[round.id.clone()], PaymentMethod::Cash)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    service
        .pay_and_issue_ticket(2, &[round.id.clone()], PaymentMethod::Cash)
        .await
        .unwrap();
}

// ========== Notifier ==========

#[tokio::test]
async fn test_failing_notifier_never_fails_mutation() {
    let storage = TableStorage::open_in_memory().unwrap();
    let service = TableService::new(storage, create_catalog(), Arc::new(FailingNotifier));
    service.seed_fixed_tables(3).unwrap();

    let round = service
        .open_round(1, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    service.confirm_service(1).await.unwrap();
    let ticket = service
        .pay_and_issue_ticket(1, &[round.id], PaymentMethod::Cash)
        .await
        .unwrap();
    assert_eq!(ticket.total, dec("1.50"));
}

#[tokio::test]
async fn test_message_bus_delivers_signals() {
    let bus = Arc::new(crate::message::MessageBus::new());
    let mut sub = bus.subscribe();
    let storage = TableStorage::open_in_memory().unwrap();
    let service = TableService::new(storage, create_catalog(), bus.clone());
    service.seed_fixed_tables(3).unwrap();

    service
        .open_round(3, vec![LineItemInput::catalog("water", 1)])
        .await
        .unwrap();
    let msg = tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.topic, Topic::RoundsUpdate);
    assert_eq!(
        msg.parse_signal().unwrap(),
        TableSignal::new(3, SignalKind::RoundOpened)
    );
}

// ========== Registry ==========

#[tokio::test]
async fn test_seed_is_idempotent() {
    let (service, _rx) = create_service();
    assert_eq!(service.seed_fixed_tables(DEFAULT_FIXED_TABLE_COUNT).unwrap(), 0);
    let tables = service.list_tables().unwrap();
    assert_eq!(tables.len(), 10);
    assert_eq!(tables[4].display_name, "Mesa 5");
    assert!(tables.iter().all(|t| t.is_fixed));
}

#[tokio::test]
async fn test_custom_tables_numbering_and_deletion() {
    let (service, mut rx) = create_service();

    let terraza = service.create_custom_table("  Terraza 1 ", None).await.unwrap();
    assert_eq!(terraza.number, 11);
    assert_eq!(terraza.display_name, "Terraza 1");
    assert_eq!(
        next_signal(&mut rx).await,
        (Topic::TablesUpdate, TableSignal::new(11, SignalKind::TableCreated))
    );

    let err = service.create_custom_table("terraza 1", None).await.unwrap_err();
    assert!(matches!(err, ServiceError::TableNameExists(_)));
    let err = service.create_custom_table("   ", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    service
        .open_round(11, vec![LineItemInput::catalog("coffee", 1)])
        .await
        .unwrap();
    assert!(matches!(
        service.delete_custom_table(11).await.unwrap_err(),
        ServiceError::TableOccupied(11)
    ));
    service.delete_open_rounds_for_table(11).await.unwrap();
    service.delete_custom_table(11).await.unwrap();
    assert!(matches!(
        service.get_table(11).unwrap_err(),
        ServiceError::TableNotFound(11)
    ));

    // Numbers are never reused and the name is free again
    let again = service.create_custom_table("Terraza 1", None).await.unwrap();
    assert_eq!(again.number, 12);

    assert!(matches!(
        service.delete_custom_table(3).await.unwrap_err(),
        ServiceError::TableIsFixed(3)
    ));
    assert_eq!(
        service.delete_custom_table(500).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

// ========== Accounting ==========

#[tokio::test]
async fn test_daily_stats_and_reset() {
    let (service, _rx) = create_service();
    let today = time::today(service.timezone());

    let r1 = service
        .open_round(1, vec![LineItemInput::catalog("coffee", 2)])
        .await
        .unwrap();
    let r2 = service
        .open_round(2, vec![LineItemInput::catalog("cake", 1)])
        .await
        .unwrap();
    service
        .open_round(3, vec![LineItemInput::catalog("water", 1)])
        .await
        .unwrap();
    service.mark_paid(&r1.id).await.unwrap();
    service
        .pay_and_issue_ticket(2, &[r2.id.clone()], PaymentMethod::Card)
        .await
        .unwrap();

    let stats = service.daily_stats(today).unwrap();
    assert_eq!(stats.round_count, 2);
    assert_eq!(stats.total, dec("6.75"));

    assert_eq!(service.reset_daily_stats(today).unwrap(), 2);
    let stats = service.daily_stats(today).unwrap();
    assert_eq!(stats.round_count, 0);
    assert_eq!(stats.total, Decimal::ZERO);

    // Monthly figures still count archived rounds
    let (year, month) = time::year_month(today);
    let monthly = service.monthly_stats(year, month).unwrap();
    assert_eq!(monthly.round_count, 2);
    assert_eq!(monthly.total, dec("6.75"));
    assert_eq!(monthly.days.len(), 1);
    assert_eq!(monthly.days[0].date, today);
}

#[tokio::test]
async fn test_month_queries_validation() {
    let (service, _rx) = create_service();
    assert_eq!(service.monthly_stats(2025, 13).unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(service.previous_months(0).unwrap_err().kind(), ErrorKind::Validation);
    assert_eq!(service.previous_months(25).unwrap_err().kind(), ErrorKind::Validation);

    let months = service.previous_months(3).unwrap();
    assert_eq!(months.len(), 3);
    let current = time::year_month(time::today(service.timezone()));
    assert_eq!((months[0].year, months[0].month), time::previous_month(current.0, current.1));
    assert!(months.iter().all(|m| m.round_count == 0));
}
