#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use olist_graph_loader::progress::{ProgressEvent, ProgressSink};
use olist_graph_loader::source::record;
use olist_graph_loader::{EntityKind, MemorySource, Record};

pub fn customer(id: &str) -> Record {
    record([
        ("customer_id", id),
        ("customer_unique_id", "u-1"),
        ("customer_city", "sao paulo"),
        ("customer_state", "SP"),
        ("total_orders", "1"),
        ("total_spending", "120.50"),
        ("customer_segment", "regular"),
    ])
}

pub fn product(id: &str) -> Record {
    record([
        ("product_id", id),
        ("product_category_name_english", "housewares"),
        ("product_weight_g", "500"),
        ("avg_price", "39.9"),
    ])
}

pub fn seller(id: &str) -> Record {
    record([
        ("seller_id", id),
        ("seller_state", "PR"),
        ("seller_tier", "gold"),
        ("on_time_delivery_rate", "0.97"),
    ])
}

pub fn order(id: &str, customer_id: &str) -> Record {
    record([
        ("order_id", id),
        ("customer_id", customer_id),
        ("order_status", "delivered"),
        ("order_purchase_timestamp", "2017-10-02 10:56:33"),
        ("estimated_delivery_days", "15"),
        ("delivery_delay_days", "-3.5"),
    ])
}

pub fn item(order_id: &str, seq: &str, product_id: &str, seller_id: &str) -> Record {
    record([
        ("order_id", order_id),
        ("order_item_id", seq),
        ("product_id", product_id),
        ("seller_id", seller_id),
        ("price", "29.99"),
        ("freight_value", "8.72"),
    ])
}

pub fn review(id: &str, order_id: &str) -> Record {
    record([
        ("review_id", id),
        ("order_id", order_id),
        ("review_score", "5"),
        ("has_comment", "False"),
    ])
}

pub fn payment(order_id: &str, seq: &str) -> Record {
    record([
        ("order_id", order_id),
        ("payment_sequential", seq),
        ("payment_type", "credit_card"),
        ("payment_installments", "3"),
        ("payment_value", "38.71"),
    ])
}

/// 3 customers, 5 products, 2 sellers, 4 orders, 6 order items.
pub fn storefront() -> MemorySource {
    MemorySource::new()
        .with(
            EntityKind::Customer,
            vec![customer("c1"), customer("c2"), customer("c3")],
        )
        .with(
            EntityKind::Product,
            ["p1", "p2", "p3", "p4", "p5"].iter().map(|p| product(p)).collect(),
        )
        .with(EntityKind::Seller, vec![seller("s1"), seller("s2")])
        .with(
            EntityKind::Order,
            vec![
                order("o1", "c1"),
                order("o2", "c1"),
                order("o3", "c2"),
                order("o4", "c3"),
            ],
        )
        .with(
            EntityKind::OrderItem,
            vec![
                item("o1", "1", "p1", "s1"),
                item("o1", "2", "p2", "s1"),
                item("o2", "1", "p3", "s2"),
                item("o3", "1", "p4", "s2"),
                item("o4", "1", "p5", "s1"),
                item("o4", "2", "p1", "s2"),
            ],
        )
}

/// Collects progress events for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, label: &str) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.label == label)
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
