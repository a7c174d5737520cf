//! Order persistence: guarded status transitions and the paid claim.

use rust_decimal_macros::dec;

#[path = "../common/mod.rs"]
mod common;
use common::*;

fn reload(conn: &rusqlite::Connection, id: &str) -> Order {
    queries::get_order_by_id(conn, id).unwrap().unwrap()
}

#[test]
fn test_create_and_lookup_order() {
    let conn = setup_test_db();
    let order = create_test_order(&conn, "REF-1000", dec!(49.99));

    assert!(order.id.starts_with("pb_ord_"));
    assert!(order.order_key.starts_with("pb_key_"));
    assert_eq!(order.status, OrderStatus::Pending);

    let by_ref = queries::get_order_by_reference(&conn, "REF-1000").unwrap().unwrap();
    assert_eq!(by_ref.id, order.id);
    assert_eq!(by_ref.total, dec!(49.99));
    assert_eq!(by_ref.billing.city.as_deref(), Some("Amsterdam"));
    assert_eq!(
        queries::get_order_key(&conn, &order.id).unwrap().as_deref(),
        Some(order.order_key.as_str())
    );
    assert!(queries::get_order_by_reference(&conn, "REF-NOPE").unwrap().is_none());
}

#[test]
fn test_reference_is_unique() {
    let conn = setup_test_db();
    create_test_order(&conn, "REF-1001", dec!(1.00));

    let result = queries::create_order(
        &conn,
        &CreateOrder {
            reference: "REF-1001".to_string(),
            payment_method_id: TEST_GATEWAY_ID.to_string(),
            total: dec!(2.00),
            currency: "EUR".to_string(),
            cart_id: None,
            billing: BillingDetails::default(),
        },
    );
    assert!(result.is_err());
}

#[test]
fn test_mark_paid_wins_once() {
    let conn = setup_test_db();
    let order = create_test_order(&conn, "REF-1002", dec!(49.99));

    assert!(queries::mark_order_paid(&conn, &order.id, Some("PSP-A")).unwrap());
    assert!(!queries::mark_order_paid(&conn, &order.id, Some("PSP-B")).unwrap());

    let order = reload(&conn, &order.id);
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.transaction_id.as_deref(), Some("PSP-A"));
    assert!(order.paid_at.is_some());
}

#[test]
fn test_mark_paid_without_transaction_id_then_backfill() {
    let conn = setup_test_db();
    let order = create_test_order(&conn, "REF-1003", dec!(49.99));

    assert!(queries::mark_order_paid(&conn, &order.id, None).unwrap());
    assert!(reload(&conn, &order.id).transaction_id.is_none());

    assert!(queries::backfill_transaction_id(&conn, &order.id, "PSP-LATE").unwrap());
    assert!(!queries::backfill_transaction_id(&conn, &order.id, "PSP-OTHER").unwrap());
    assert_eq!(reload(&conn, &order.id).transaction_id.as_deref(), Some("PSP-LATE"));
}

#[test]
fn test_failed_order_can_still_be_paid() {
    let conn = setup_test_db();
    let order = create_test_order(&conn, "REF-1004", dec!(49.99));

    assert!(queries::mark_order_failed(&conn, &order.id).unwrap());
    assert!(queries::mark_order_paid(&conn, &order.id, Some("PSP-1004")).unwrap());
    assert_eq!(reload(&conn, &order.id).status, OrderStatus::Processing);
}

#[test]
fn test_paid_order_cannot_fail() {
    let conn = setup_test_db();
    let order = create_test_order(&conn, "REF-1005", dec!(49.99));
    queries::mark_order_paid(&conn, &order.id, Some("PSP-1005")).unwrap();

    assert!(!queries::mark_order_failed(&conn, &order.id).unwrap());
    assert!(!queries::mark_order_pending(&conn, &order.id).unwrap());
    assert_eq!(reload(&conn, &order.id).status, OrderStatus::Processing);
}

#[test]
fn test_cancel_and_refund_transitions() {
    let conn = setup_test_db();
    let pending = create_test_order(&conn, "REF-1006", dec!(10.00));
    let paid = create_test_order(&conn, "REF-1007", dec!(10.00));
    queries::mark_order_paid(&conn, &paid.id, Some("PSP-1007")).unwrap();

    // Unpaid orders cannot be refunded
    assert!(!queries::mark_order_refunded(&conn, &pending.id).unwrap());
    assert!(queries::mark_order_cancelled(&conn, &pending.id).unwrap());
    assert!(!queries::mark_order_cancelled(&conn, &pending.id).unwrap());
    assert!(!queries::mark_order_paid(&conn, &pending.id, Some("PSP-LATE")).unwrap());

    assert!(queries::mark_order_refunded(&conn, &paid.id).unwrap());
    assert!(!queries::mark_order_cancelled(&conn, &paid.id).unwrap());
    assert_eq!(reload(&conn, &paid.id).status, OrderStatus::Refunded);
}

#[test]
fn test_failed_order_returns_to_pending() {
    let conn = setup_test_db();
    let order = create_test_order(&conn, "REF-1008", dec!(10.00));

    assert!(!queries::mark_order_pending(&conn, &order.id).unwrap());
    queries::mark_order_failed(&conn, &order.id).unwrap();
    assert!(queries::mark_order_pending(&conn, &order.id).unwrap());
    assert_eq!(reload(&conn, &order.id).status, OrderStatus::Pending);
}

#[test]
fn test_session_binding() {
    let conn = setup_test_db();
    let order = create_test_order(&conn, "REF-1009", dec!(10.00));

    queries::set_order_session_id(&conn, &order.id, "CS1009").unwrap();

    let bound = queries::get_order_by_session_id(&conn, "CS1009").unwrap().unwrap();
    assert_eq!(bound.id, order.id);
    assert!(queries::get_order_by_session_id(&conn, "CS-OTHER").unwrap().is_none());
}

#[test]
fn test_notes_keep_insertion_order() {
    let conn = setup_test_db();
    let order = create_test_order(&conn, "REF-1010", dec!(10.00));

    for text in ["first", "second", "third"] {
        queries::add_order_note(&conn, &order.id, text).unwrap();
    }

    let notes: Vec<String> = queries::list_order_notes(&conn, &order.id)
        .unwrap()
        .into_iter()
        .map(|n| n.note)
        .collect();
    assert_eq!(notes, vec!["first", "second", "third"]);
}

#[test]
fn test_order_store_over_connection() {
    let conn = setup_test_db();
    let cart = create_test_cart(&conn, dec!(10.00), 2);
    let order = create_test_order_with(
        &conn,
        "REF-1011",
        dec!(10.00),
        "EUR",
        TEST_GATEWAY_ID,
        Some(&cart.id),
    );
    let store: &dyn OrderStore = &conn;

    assert_eq!(store.find_by_reference("REF-1011").unwrap().unwrap().id, order.id);
    assert!(store.mark_paid(&order.id, Some("PSP-1011")).unwrap());
    store.append_note(&order.id, "paid").unwrap();

    let mut cart_handle = store.cart_for(&order).unwrap().unwrap();
    assert!(!cart_handle.is_empty());
    assert_eq!(cart_handle.total(), dec!(10.00));
    cart_handle.empty().unwrap();
    assert!(cart_handle.is_empty());
    drop(cart_handle);

    let stored = queries::get_cart_by_id(&conn, &cart.id).unwrap().unwrap();
    assert_eq!(stored.item_count, 0);

    let cartless = create_test_order(&conn, "REF-1012", dec!(5.00));
    assert!(store.cart_for(&cartless).unwrap().is_none());
}

#[test]
fn test_refunded_total_compare_and_set() {
    let conn = setup_test_db();
    let order = create_test_order(&conn, "REF-1013", dec!(20.00));

    // Unpaid orders take no refunds
    assert!(!queries::update_refunded_total(&conn, &order.id, dec!(0), dec!(5.00)).unwrap());

    queries::mark_order_paid(&conn, &order.id, Some("PSP-1013")).unwrap();
    assert_eq!(reload(&conn, &order.id).refunded_total, dec!(0));

    assert!(queries::update_refunded_total(&conn, &order.id, dec!(0), dec!(5.00)).unwrap());
    // Stale expectation loses
    assert!(!queries::update_refunded_total(&conn, &order.id, dec!(0), dec!(8.00)).unwrap());
    assert!(queries::update_refunded_total(&conn, &order.id, dec!(5.00), dec!(12.50)).unwrap());

    let order = reload(&conn, &order.id);
    assert_eq!(order.refunded_total, dec!(12.50));
    assert_eq!(order.refundable_amount(), dec!(7.50));
}
