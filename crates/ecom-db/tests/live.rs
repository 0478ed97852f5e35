//! Live integration tests for ecom-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/ecom-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{Duration, Utc};
use ecom_core::{CartOwner, CartStatus, OrderLine, OrderStatus};
use ecom_db::{
    add_cart_item, create_category, create_order, create_product, create_session, create_user,
    deactivate_product, delete_cart, delete_category, delete_order, delete_order_item, delete_user,
    find_credentials_by_username, find_session_user, get_cart_view, get_order_view,
    get_or_create_cart, get_product, list_order_items, list_products, merge_guest_cart,
    purge_expired_sessions, update_cart, update_order_item_quantity, update_order_status,
    update_product, update_user, CartUpdate, DbError, NewProduct, NewUser, ProductListFilters,
    ProductUpdate, UserUpdate,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert_test_user(pool: &PgPool, username: &str) -> Uuid {
    let email = format!("{username}@example.com");
    create_user(
        pool,
        &NewUser {
            username,
            email: &email,
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2g",
            first_name: None,
            last_name: None,
            phone: None,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("insert_test_user failed for '{username}': {e}"))
    .id
}

async fn insert_test_product(pool: &PgPool, name: &str, price_cents: i64, stock: i32) -> Uuid {
    create_product(
        pool,
        &NewProduct {
            name,
            description: None,
            price: Decimal::new(price_cents, 2),
            stock,
            category_id: None,
            sku: None,
            image_url: None,
        },
    )
    .await
    .unwrap_or_else(|e| panic!("insert_test_product failed for '{name}': {e}"))
    .id
}

async fn stock_of(pool: &PgPool, product_id: Uuid) -> i32 {
    get_product(pool, product_id)
        .await
        .expect("get_product failed")
        .expect("product should exist")
        .stock
}

fn line(product_id: Uuid, quantity: i64) -> OrderLine {
    OrderLine::new(Some(product_id), Some(quantity), None).expect("valid line")
}

async fn count_rows(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count failed")
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn health_check_passes_on_live_pool(pool: PgPool) {
    ecom_db::health_check(&pool)
        .await
        .expect("health_check should succeed");
}

// ---------------------------------------------------------------------------
// Users & sessions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_username_is_a_unique_violation(pool: PgPool) {
    insert_test_user(&pool, "alice").await;

    let err = create_user(
        &pool,
        &NewUser {
            username: "alice",
            email: "a@example.com",
            password_hash: "x",
            first_name: None,
            last_name: None,
            phone: None,
        },
    )
    .await
    .expect_err("second alice must be rejected");

    assert!(err.is_unique_violation(), "expected unique violation, got {err:?}");
    assert_eq!(count_rows(&pool, "users").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn sparse_user_update_keeps_unset_fields(pool: PgPool) {
    let id = insert_test_user(&pool, "bob").await;

    let updated = update_user(
        &pool,
        id,
        &UserUpdate {
            first_name: Some("Bob".to_string()),
            ..UserUpdate::default()
        },
    )
    .await
    .expect("update_user failed")
    .expect("user should exist");

    assert_eq!(updated.first_name.as_deref(), Some("Bob"));
    assert_eq!(updated.email, "bob@example.com");

    let missing = update_user(&pool, Uuid::new_v4(), &UserUpdate::default())
        .await
        .expect("update_user failed");
    assert!(missing.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn sessions_resolve_until_expiry_and_purge(pool: PgPool) {
    let user_id = insert_test_user(&pool, "carol").await;

    create_session(&pool, "live-hash", user_id, Utc::now() + Duration::hours(1))
        .await
        .expect("create live session");
    create_session(&pool, "stale-hash", user_id, Utc::now() - Duration::hours(1))
        .await
        .expect("create stale session");

    let user = find_session_user(&pool, "live-hash")
        .await
        .expect("lookup failed")
        .expect("live session should resolve");
    assert_eq!(user.id, user_id);
    assert!(find_session_user(&pool, "stale-hash")
        .await
        .expect("lookup failed")
        .is_none());

    let purged = purge_expired_sessions(&pool).await.expect("purge failed");
    assert_eq!(purged, 1);
    assert_eq!(count_rows(&pool, "sessions").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn deactivated_user_sessions_stop_resolving(pool: PgPool) {
    let user_id = insert_test_user(&pool, "dave").await;
    create_session(&pool, "h", user_id, Utc::now() + Duration::hours(1))
        .await
        .expect("create session");

    update_user(
        &pool,
        user_id,
        &UserUpdate {
            is_active: Some(false),
            ..UserUpdate::default()
        },
    )
    .await
    .expect("deactivate");

    assert!(find_session_user(&pool, "h").await.unwrap().is_none());
    let creds = find_credentials_by_username(&pool, "dave")
        .await
        .unwrap()
        .expect("credentials row");
    assert!(!creds.is_active);
}

#[sqlx::test(migrations = "../../migrations")]
async fn deleting_user_restores_stock_held_by_their_orders(pool: PgPool) {
    let user = insert_test_user(&pool, "uma").await;
    let p = insert_test_product(&pool, "P", 100, 5).await;
    let q = insert_test_product(&pool, "Q", 100, 3).await;

    create_order(&pool, user, &[line(p, 5)]).await.unwrap();
    let cancelled = create_order(&pool, user, &[line(q, 2)]).await.unwrap();
    update_order_status(&pool, cancelled.order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(stock_of(&pool, p).await, 0);
    assert_eq!(stock_of(&pool, q).await, 3);

    assert!(delete_user(&pool, user).await.expect("delete_user"));
    assert_eq!(stock_of(&pool, p).await, 5);
    // Cancelled orders already gave their stock back.
    assert_eq!(stock_of(&pool, q).await, 3);
    assert_eq!(count_rows(&pool, "orders").await, 0);
    assert_eq!(count_rows(&pool, "order_items").await, 0);

    assert!(!delete_user(&pool, user).await.expect("second delete"));
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn product_listing_filters_category_and_inactive(pool: PgPool) {
    let category = create_category(&pool, "Mugs", None)
        .await
        .expect("create_category");
    let mug = create_product(
        &pool,
        &NewProduct {
            name: "Mug",
            description: Some("ceramic"),
            price: Decimal::new(1200, 2),
            stock: 3,
            category_id: Some(category.id),
            sku: Some("MUG-1"),
            image_url: None,
        },
    )
    .await
    .expect("create mug");
    let hidden = insert_test_product(&pool, "Hidden", 100, 1).await;
    deactivate_product(&pool, hidden).await.expect("deactivate");

    let active = list_products(&pool, ProductListFilters::default())
        .await
        .expect("list");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, mug.id);

    let all = list_products(
        &pool,
        ProductListFilters {
            include_inactive: true,
            ..ProductListFilters::default()
        },
    )
    .await
    .expect("list all");
    assert_eq!(all.len(), 2);

    let in_category = list_products(
        &pool,
        ProductListFilters {
            category_id: Some(Uuid::new_v4()),
            ..ProductListFilters::default()
        },
    )
    .await
    .expect("list by category");
    assert!(in_category.is_empty());

    // Deleting the category keeps the product with a NULL category.
    assert!(delete_category(&pool, category.id).await.expect("delete"));
    let mug = get_product(&pool, mug.id).await.unwrap().unwrap();
    assert!(mug.category_id.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_update_overlays_only_given_fields(pool: PgPool) {
    let id = insert_test_product(&pool, "Lamp", 4500, 2).await;
    let updated = update_product(
        &pool,
        id,
        &ProductUpdate {
            price: Some(Decimal::new(3999, 2)),
            ..ProductUpdate::default()
        },
    )
    .await
    .expect("update")
    .expect("exists");
    assert_eq!(updated.price, Decimal::new(3999, 2));
    assert_eq!(updated.name, "Lamp");
    assert_eq!(updated.stock, 2);
}

// ---------------------------------------------------------------------------
// Orders & stock
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn order_decrements_stock_and_snapshots_price(pool: PgPool) {
    let user = insert_test_user(&pool, "erin").await;
    let a = insert_test_product(&pool, "A", 1000, 10).await;
    let b = insert_test_product(&pool, "B", 250, 4).await;

    let order = create_order(&pool, user, &[line(a, 3), line(b, 4)])
        .await
        .expect("create_order");

    assert_eq!(order.order.status, "pending");
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.total, Decimal::new(4000, 2));
    assert_eq!(stock_of(&pool, a).await, 7);
    assert_eq!(stock_of(&pool, b).await, 0);

    // Later price changes do not touch the snapshot.
    update_product(
        &pool,
        a,
        &ProductUpdate {
            price: Some(Decimal::new(9999, 2)),
            ..ProductUpdate::default()
        },
    )
    .await
    .expect("reprice");
    let reloaded = get_order_view(&pool, order.order.id)
        .await
        .unwrap()
        .unwrap();
    let a_item = reloaded
        .items
        .iter()
        .find(|item| item.product_id == a)
        .expect("line for A");
    assert_eq!(a_item.price_at_time, Decimal::new(1000, 2));
    assert_eq!(reloaded.total, Decimal::new(4000, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn price_override_is_stored_verbatim(pool: PgPool) {
    let user = insert_test_user(&pool, "fay").await;
    let a = insert_test_product(&pool, "A", 1000, 10).await;

    let lines = [OrderLine::new(Some(a), Some(2), Some(Decimal::new(750, 2))).unwrap()];
    let order = create_order(&pool, user, &lines).await.expect("create_order");
    assert_eq!(order.items[0].price_at_time, Decimal::new(750, 2));
    assert_eq!(order.total, Decimal::new(1500, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn exhausting_stock_then_ordering_again_fails(pool: PgPool) {
    let user = insert_test_user(&pool, "gus").await;
    let p = insert_test_product(&pool, "Scarce", 500, 5).await;

    create_order(&pool, user, &[line(p, 5)])
        .await
        .expect("first order takes all stock");
    assert_eq!(stock_of(&pool, p).await, 0);

    let err = create_order(&pool, user, &[line(p, 1)])
        .await
        .expect_err("second order must fail");
    assert!(
        matches!(err, DbError::InsufficientStock { requested: 1, available: 0, .. }),
        "got {err:?}"
    );
    assert_eq!(stock_of(&pool, p).await, 0);
    assert_eq!(count_rows(&pool, "orders").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_orders_for_the_last_unit_sell_it_once(pool: PgPool) {
    let first = insert_test_user(&pool, "vic").await;
    let second = insert_test_user(&pool, "wes").await;
    let p = insert_test_product(&pool, "Last", 500, 1).await;

    let first_lines = [line(p, 1)];
    let second_lines = [line(p, 1)];
    let (a, b) = tokio::join!(
        create_order(&pool, first, &first_lines),
        create_order(&pool, second, &second_lines),
    );

    let results = [a, b];
    let placed = results.iter().filter(|r| r.is_ok()).count();
    let short = results
        .iter()
        .filter(|r| matches!(r, Err(DbError::InsufficientStock { requested: 1, available: 0, .. })))
        .count();
    assert_eq!(placed, 1, "exactly one order wins: {results:?}");
    assert_eq!(short, 1, "the other sees no stock: {results:?}");
    assert_eq!(stock_of(&pool, p).await, 0);
    assert_eq!(count_rows(&pool, "orders").await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn failing_line_rolls_back_whole_order(pool: PgPool) {
    let user = insert_test_user(&pool, "hal").await;
    let plenty = insert_test_product(&pool, "Plenty", 100, 50).await;
    let scarce = insert_test_product(&pool, "Scarce", 100, 1).await;

    let err = create_order(&pool, user, &[line(plenty, 10), line(scarce, 2)])
        .await
        .expect_err("order must fail");
    assert!(matches!(err, DbError::InsufficientStock { .. }));
    assert_eq!(stock_of(&pool, plenty).await, 50);
    assert_eq!(count_rows(&pool, "orders").await, 0);
    assert_eq!(count_rows(&pool, "order_items").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn order_rejects_unknown_user_and_inactive_product(pool: PgPool) {
    let user = insert_test_user(&pool, "ivy").await;
    let p = insert_test_product(&pool, "Retired", 100, 5).await;
    deactivate_product(&pool, p).await.unwrap();

    let err = create_order(&pool, Uuid::new_v4(), &[line(p, 1)])
        .await
        .expect_err("unknown user");
    assert!(matches!(err, DbError::UserNotFound(_)));

    let err = create_order(&pool, user, &[line(p, 1)])
        .await
        .expect_err("inactive product");
    assert!(matches!(err, DbError::ProductUnavailable(id) if id == p));

    let err = create_order(&pool, user, &[line(Uuid::new_v4(), 1)])
        .await
        .expect_err("missing product");
    assert!(matches!(err, DbError::ProductUnavailable(_)));

    let err = create_order(&pool, user, &[]).await.expect_err("no lines");
    assert!(matches!(err, DbError::InvalidLineItem(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_product_lines_each_reserve(pool: PgPool) {
    let user = insert_test_user(&pool, "jay").await;
    let p = insert_test_product(&pool, "Dup", 100, 5).await;

    let order = create_order(&pool, user, &[line(p, 2), line(p, 3)])
        .await
        .expect("both lines fit");
    assert_eq!(order.items.len(), 2);
    assert_eq!(stock_of(&pool, p).await, 0);

    let err = create_order(&pool, user, &[line(p, 1)])
        .await
        .expect_err("no stock left");
    assert!(matches!(err, DbError::InsufficientStock { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn deleting_order_restores_stock(pool: PgPool) {
    let user = insert_test_user(&pool, "kim").await;
    let p = insert_test_product(&pool, "P", 100, 8).await;

    let order = create_order(&pool, user, &[line(p, 6)]).await.unwrap();
    assert_eq!(stock_of(&pool, p).await, 2);

    delete_order(&pool, order.order.id).await.expect("delete");
    assert_eq!(stock_of(&pool, p).await, 8);
    assert_eq!(count_rows(&pool, "order_items").await, 0);

    let err = delete_order(&pool, order.order.id)
        .await
        .expect_err("already gone");
    assert!(matches!(err, DbError::OrderNotFound(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancelling_restores_stock_once(pool: PgPool) {
    let user = insert_test_user(&pool, "lea").await;
    let p = insert_test_product(&pool, "P", 100, 5).await;

    let order = create_order(&pool, user, &[line(p, 4)]).await.unwrap();
    let id = order.order.id;

    let cancelled = update_order_status(&pool, id, OrderStatus::Cancelled)
        .await
        .expect("cancel");
    assert_eq!(cancelled.order.status, "cancelled");
    assert_eq!(stock_of(&pool, p).await, 5);

    // Same-state write is a no-op and does not release again.
    update_order_status(&pool, id, OrderStatus::Cancelled)
        .await
        .expect("no-op");
    assert_eq!(stock_of(&pool, p).await, 5);

    delete_order(&pool, id).await.expect("delete cancelled");
    assert_eq!(stock_of(&pool, p).await, 5);
}

#[sqlx::test(migrations = "../../migrations")]
async fn illegal_transitions_are_rejected(pool: PgPool) {
    let user = insert_test_user(&pool, "max").await;
    let p = insert_test_product(&pool, "P", 100, 5).await;
    let id = create_order(&pool, user, &[line(p, 1)])
        .await
        .unwrap()
        .order
        .id;

    let err = update_order_status(&pool, id, OrderStatus::Shipped)
        .await
        .expect_err("cannot skip ahead");
    assert!(matches!(
        err,
        DbError::InvalidStatusTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped
        }
    ));

    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        update_order_status(&pool, id, next).await.expect("forward step");
    }

    let err = update_order_status(&pool, id, OrderStatus::Cancelled)
        .await
        .expect_err("cannot cancel after shipment");
    assert!(matches!(err, DbError::InvalidStatusTransition { .. }));
    assert_eq!(stock_of(&pool, p).await, 4);
}

#[sqlx::test(migrations = "../../migrations")]
async fn item_quantity_edits_move_stock_by_delta(pool: PgPool) {
    let user = insert_test_user(&pool, "ned").await;
    let p = insert_test_product(&pool, "P", 100, 10).await;
    let order = create_order(&pool, user, &[line(p, 4)]).await.unwrap();
    let order_id = order.order.id;
    let item_id = order.items[0].id;

    let item = update_order_item_quantity(&pool, order_id, item_id, 7)
        .await
        .expect("grow");
    assert_eq!(item.quantity, 7);
    assert_eq!(stock_of(&pool, p).await, 3);

    update_order_item_quantity(&pool, order_id, item_id, 2)
        .await
        .expect("shrink");
    assert_eq!(stock_of(&pool, p).await, 8);

    let err = update_order_item_quantity(&pool, order_id, item_id, 11)
        .await
        .expect_err("exceeds stock");
    assert!(matches!(err, DbError::InsufficientStock { requested: 9, available: 8, .. }));
    assert_eq!(stock_of(&pool, p).await, 8);
    let items = list_order_items(&pool, order_id).await.unwrap();
    assert_eq!(items[0].quantity, 2);

    delete_order_item(&pool, order_id, item_id)
        .await
        .expect("delete item");
    assert_eq!(stock_of(&pool, p).await, 10);
    assert!(list_order_items(&pool, order_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn shipped_orders_are_locked_for_item_edits(pool: PgPool) {
    let user = insert_test_user(&pool, "oli").await;
    let p = insert_test_product(&pool, "P", 100, 10).await;
    let order = create_order(&pool, user, &[line(p, 1)]).await.unwrap();
    let order_id = order.order.id;
    let item_id = order.items[0].id;

    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        update_order_status(&pool, order_id, next).await.unwrap();
    }

    let err = update_order_item_quantity(&pool, order_id, item_id, 2)
        .await
        .expect_err("locked");
    assert!(matches!(
        err,
        DbError::OrderLocked {
            status: OrderStatus::Shipped,
            ..
        }
    ));
    let err = delete_order_item(&pool, order_id, item_id)
        .await
        .expect_err("locked");
    assert!(matches!(err, DbError::OrderLocked { .. }));
}

// ---------------------------------------------------------------------------
// Carts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn adding_same_product_twice_sums_quantity(pool: PgPool) {
    let p = insert_test_product(&pool, "P", 250, 10).await;
    let cart = get_or_create_cart(&pool, &CartOwner::Guest("sess-1".to_string()))
        .await
        .expect("cart");

    add_cart_item(&pool, cart.cart.id, p, 2).await.expect("first add");
    let item = add_cart_item(&pool, cart.cart.id, p, 3)
        .await
        .expect("second add");
    assert_eq!(item.quantity, 5);

    let view = get_cart_view(&pool, cart.cart.id).await.unwrap().unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 5);
    assert_eq!(view.total, Decimal::new(1250, 2));
    // Carts never reserve stock.
    assert_eq!(stock_of(&pool, p).await, 10);
}

#[sqlx::test(migrations = "../../migrations")]
async fn add_to_cart_checks_resulting_quantity(pool: PgPool) {
    let p = insert_test_product(&pool, "P", 100, 4).await;
    let cart = get_or_create_cart(&pool, &CartOwner::Guest("sess-2".to_string()))
        .await
        .unwrap();

    add_cart_item(&pool, cart.cart.id, p, 3).await.unwrap();
    let err = add_cart_item(&pool, cart.cart.id, p, 2)
        .await
        .expect_err("3 + 2 > 4");
    assert!(matches!(err, DbError::InsufficientStock { requested: 5, available: 4, .. }));

    let err = add_cart_item(&pool, Uuid::new_v4(), p, 1)
        .await
        .expect_err("unknown cart");
    assert!(matches!(err, DbError::CartNotFound(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_or_create_returns_the_same_active_cart(pool: PgPool) {
    let user = insert_test_user(&pool, "pam").await;
    let first = get_or_create_cart(&pool, &CartOwner::User(user)).await.unwrap();
    let second = get_or_create_cart(&pool, &CartOwner::User(user)).await.unwrap();
    assert_eq!(first.cart.id, second.cart.id);

    let err = get_or_create_cart(&pool, &CartOwner::User(Uuid::new_v4()))
        .await
        .expect_err("unknown user");
    assert!(matches!(err, DbError::UserNotFound(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_cart_sets_quantities_and_status(pool: PgPool) {
    let a = insert_test_product(&pool, "A", 100, 10).await;
    let b = insert_test_product(&pool, "B", 100, 10).await;
    let cart = get_or_create_cart(&pool, &CartOwner::Guest("sess-3".to_string()))
        .await
        .unwrap();
    add_cart_item(&pool, cart.cart.id, a, 5).await.unwrap();

    let view = update_cart(
        &pool,
        cart.cart.id,
        &CartUpdate {
            status: None,
            items: vec![(a, 2), (b, 1)],
        },
    )
    .await
    .expect("set quantities");
    let qty_a = view.items.iter().find(|i| i.product_id == a).unwrap().quantity;
    assert_eq!(qty_a, 2);
    assert_eq!(view.items.len(), 2);

    let view = update_cart(
        &pool,
        cart.cart.id,
        &CartUpdate {
            status: Some(CartStatus::Abandoned),
            items: vec![(b, 0)],
        },
    )
    .await
    .expect("drop line and abandon");
    assert_eq!(view.cart.status, "abandoned");
    assert_eq!(view.items.len(), 1);

    let err = add_cart_item(&pool, cart.cart.id, a, 1)
        .await
        .expect_err("abandoned cart");
    assert!(matches!(err, DbError::CartNotActive { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn merge_moves_items_and_deletes_guest_cart(pool: PgPool) {
    let user = insert_test_user(&pool, "quinn").await;
    let shared = insert_test_product(&pool, "Shared", 100, 20).await;
    let guest_only = insert_test_product(&pool, "GuestOnly", 300, 20).await;

    let user_cart = get_or_create_cart(&pool, &CartOwner::User(user)).await.unwrap();
    add_cart_item(&pool, user_cart.cart.id, shared, 1).await.unwrap();

    let guest = get_or_create_cart(&pool, &CartOwner::Guest("sess-4".to_string()))
        .await
        .unwrap();
    add_cart_item(&pool, guest.cart.id, shared, 2).await.unwrap();
    add_cart_item(&pool, guest.cart.id, guest_only, 1).await.unwrap();

    let merged = merge_guest_cart(&pool, guest.cart.id, user)
        .await
        .expect("merge");
    assert_eq!(merged.cart.id, user_cart.cart.id);
    assert_eq!(merged.items.len(), 2);
    let shared_qty = merged
        .items
        .iter()
        .find(|i| i.product_id == shared)
        .unwrap()
        .quantity;
    assert_eq!(shared_qty, 3);

    assert!(get_cart_view(&pool, guest.cart.id).await.unwrap().is_none());
    let err = merge_guest_cart(&pool, guest.cart.id, user)
        .await
        .expect_err("guest cart is gone");
    assert!(matches!(err, DbError::CartNotFound(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn merge_creates_user_cart_and_rejects_user_carts(pool: PgPool) {
    let user = insert_test_user(&pool, "rae").await;
    let other = insert_test_user(&pool, "sam").await;
    let p = insert_test_product(&pool, "P", 100, 5).await;

    let guest = get_or_create_cart(&pool, &CartOwner::Guest("sess-5".to_string()))
        .await
        .unwrap();
    add_cart_item(&pool, guest.cart.id, p, 1).await.unwrap();

    let merged = merge_guest_cart(&pool, guest.cart.id, user).await.unwrap();
    assert_eq!(merged.cart.user_id, Some(user));
    assert_eq!(merged.items.len(), 1);

    let err = merge_guest_cart(&pool, merged.cart.id, other)
        .await
        .expect_err("not a guest cart");
    assert!(matches!(err, DbError::NotAGuestCart(_)));

    assert!(delete_cart(&pool, merged.cart.id).await.unwrap());
    assert_eq!(count_rows(&pool, "cart_items").await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn merge_rejects_quantities_that_overflow(pool: PgPool) {
    let user = insert_test_user(&pool, "xan").await;
    let p = insert_test_product(&pool, "P", 100, 5).await;

    let user_cart = get_or_create_cart(&pool, &CartOwner::User(user)).await.unwrap();
    add_cart_item(&pool, user_cart.cart.id, p, 1).await.unwrap();
    let guest = get_or_create_cart(&pool, &CartOwner::Guest("sess-6".to_string()))
        .await
        .unwrap();
    add_cart_item(&pool, guest.cart.id, p, 1).await.unwrap();

    sqlx::query("UPDATE cart_items SET quantity = $1")
        .bind(i32::MAX)
        .execute(&pool)
        .await
        .expect("inflate quantities");

    let err = merge_guest_cart(&pool, guest.cart.id, user)
        .await
        .expect_err("sum exceeds INTEGER");
    assert!(matches!(err, DbError::InvalidLineItem(_)), "got {err:?}");

    // Nothing moved and the guest cart survives.
    assert!(get_cart_view(&pool, guest.cart.id).await.unwrap().is_some());
    let view = get_cart_view(&pool, user_cart.cart.id).await.unwrap().unwrap();
    assert_eq!(view.items[0].quantity, i32::MAX);
}
