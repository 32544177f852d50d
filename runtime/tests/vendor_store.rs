//! Integration tests for the vendor store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{Harness, config, drain};
use event_planner_core::document::{DocumentStoreError, collections};
use event_planner_core::identity::Identity;
use event_planner_core::ids::VendorId;
use event_planner_core::model::{QuotationDetails, QuotationStatus};
use event_planner_runtime::catalog::FALLBACK_VENDOR_COUNT;
use event_planner_runtime::{CatalogSource, NoticeLevel, StoreError, VendorStore};
use serde_json::json;

fn details() -> QuotationDetails {
    QuotationDetails {
        event_date: "2025-09-20".to_owned(),
        event_type: "Wedding".to_owned(),
        guest_count: 200,
        budget: 250_000.0,
        requirements: Some("Vegetarian menu".to_owned()),
    }
}

fn seed_vendor(h: &Harness, id: &str, name: &str, category: &str) {
    h.documents.seed(
        collections::VENDORS,
        id,
        json!({ "name": name, "type": category, "location": "Goa", "rating": 4.5 }),
    );
}

#[tokio::test]
async fn empty_remote_catalog_falls_back_to_bundled_vendors() {
    let h = Harness::signed_out();
    let vendors = h.vendors();

    vendors.fetch().await.unwrap();

    assert_eq!(vendors.items().len(), FALLBACK_VENDOR_COUNT);
    assert_eq!(vendors.source(), CatalogSource::Fallback);
    assert!(vendors.get(&VendorId::new("1")).is_some());
}

#[tokio::test]
async fn remote_catalog_is_never_mixed_with_the_fallback() {
    let h = Harness::signed_out();
    seed_vendor(&h, "r1", "Lens & Light", "Photography");
    seed_vendor(&h, "r2", "Spice Route", "Catering");
    let vendors = h.vendors();

    vendors.fetch().await.unwrap();

    let ids: Vec<_> = vendors.items().into_iter().map(|v| v.id.into_inner()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| id.starts_with('r')));
    assert_eq!(vendors.source(), CatalogSource::Remote);
}

#[tokio::test]
async fn invalid_remote_vendors_are_dropped() {
    let h = Harness::signed_out();
    seed_vendor(&h, "ok", "Lens & Light", "Photography");
    h.documents.seed(
        collections::VENDORS,
        "bad",
        json!({ "name": "Too Good", "rating": 9.0 }),
    );
    let vendors = h.vendors();

    vendors.fetch().await.unwrap();

    assert_eq!(vendors.items().len(), 1);
    assert!(vendors.get(&VendorId::new("bad")).is_none());
}

#[tokio::test]
async fn unreachable_store_falls_back_with_a_warning() {
    let h = Harness::signed_out();
    seed_vendor(&h, "r1", "Lens & Light", "Photography");
    let vendors = h.vendors();
    let mut notices = h.notices();

    h.documents.set_offline(true);
    vendors.fetch().await.unwrap();

    assert_eq!(vendors.items().len(), FALLBACK_VENDOR_COUNT);
    assert_eq!(vendors.source(), CatalogSource::Fallback);
    let notices = drain(&mut notices);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert_eq!(notices[0].title, "Error loading vendors");
}

#[tokio::test]
async fn without_fallback_failures_surface() {
    let h = Harness::signed_out();
    let vendors = VendorStore::new(
        h.env.clone(),
        &config().with_vendor_fallback(false),
        h.notifier.clone(),
    );

    vendors.fetch().await.unwrap();
    assert!(vendors.items().is_empty());

    h.documents.set_offline(true);
    let err = vendors.fetch().await.unwrap_err();
    assert!(matches!(err, StoreError::RemoteFailure(_)));
    assert!(vendors.state().error.is_some());
}

#[tokio::test]
async fn search_and_category_filter_the_catalog() {
    let h = Harness::signed_out();
    let vendors = h.vendors();
    vendors.refresh().await.unwrap();

    let caterers = vendors.by_category("catering");
    assert!(!caterers.is_empty());
    assert!(caterers.iter().all(|v| v.category.eq_ignore_ascii_case("catering")));

    let mumbai = vendors.search("mumbai");
    assert!(!mumbai.is_empty());
    assert!(mumbai.iter().all(|v| v.matches_text("Mumbai")));

    assert_eq!(vendors.search("  ").len(), FALLBACK_VENDOR_COUNT);
    assert!(vendors.search("no such vendor anywhere").is_empty());
}

#[tokio::test]
async fn quotation_request_while_signed_out_writes_nothing() {
    let h = Harness::signed_out();
    let vendors = h.vendors();
    let mut notices = h.notices();

    let sent = vendors
        .request_quotation(&VendorId::new("1"), details())
        .await;

    assert!(!sent);
    assert_eq!(h.documents.write_count(), 0);
    assert!(h.documents.is_empty(collections::QUOTATIONS));
    let notices = drain(&mut notices);
    assert_eq!(
        notices[0].description,
        "You must be logged in to request a quotation"
    );
}

#[tokio::test]
async fn quotation_request_is_stored_pending() {
    let h = Harness::signed_in(Identity::customer("c1"));
    let vendors = h.vendors();
    let mut notices = h.notices();

    assert!(vendors.request_quotation(&VendorId::new("v1"), details()).await);

    let mine = vendors.my_quotations().await.unwrap();
    assert_eq!(mine.len(), 1);
    let request = &mine[0];
    assert_eq!(request.vendor_id.as_str(), "v1");
    assert_eq!(request.user_id.as_str(), "c1");
    assert_eq!(request.status, QuotationStatus::Pending);
    assert_eq!(request.event_date, "2025-09-20T00:00:00.000Z");
    assert_eq!(request.requirements.as_deref(), Some("Vegetarian menu"));
    assert!(request.created_at.ends_with('Z'));

    let notices = drain(&mut notices);
    assert_eq!(notices[0].description, "Quotation request sent successfully");
}

#[tokio::test]
async fn failed_quotation_request_returns_false() {
    let h = Harness::signed_in(Identity::customer("c1"));
    let vendors = h.vendors();

    h.documents
        .fail_next(1, &DocumentStoreError::Other("quota".into()));
    assert!(!vendors.request_quotation(&VendorId::new("v1"), details()).await);

    let invalid = QuotationDetails {
        event_type: String::new(),
        ..details()
    };
    assert!(!vendors.request_quotation(&VendorId::new("v1"), invalid).await);
    assert!(h.documents.is_empty(collections::QUOTATIONS));
}

#[tokio::test]
async fn vendors_read_their_incoming_requests_newest_first() {
    let h = Harness::signed_in(Identity::customer("c1"));
    let vendors = h.vendors();
    vendors.request_quotation(&VendorId::new("v1"), details()).await;
    vendors
        .request_quotation(
            &VendorId::new("v1"),
            QuotationDetails {
                guest_count: 50,
                ..details()
            },
        )
        .await;
    vendors.request_quotation(&VendorId::new("v2"), details()).await;

    h.as_user(Identity::vendor("v1"));
    let incoming = vendors.quotations_for(&VendorId::new("v1")).await.unwrap();

    let guests: Vec<_> = incoming.iter().map(|q| q.guest_count).collect();
    assert_eq!(guests, [50, 200]);
}
