//! Static description of the Olist graph: one descriptor per node label.
//!
//! The batch engine is driven entirely by these tables. Adding a property
//! means adding a row here, not touching query text.

use std::fmt;

use serde::Serialize;

/// Property every node label is keyed and constrained on.
pub const KEY_PROPERTY: &str = "id";

/// Separator between the order id and the sequence number of composite keys.
pub const COMPOSITE_KEY_SEPARATOR: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EntityKind {
    Customer,
    Product,
    Seller,
    Order,
    OrderItem,
    Review,
    Payment,
}

/// Dependency order: every parent label precedes the labels that link to it.
pub const LOAD_ORDER: [EntityKind; 7] = [
    EntityKind::Customer,
    EntityKind::Product,
    EntityKind::Seller,
    EntityKind::Order,
    EntityKind::OrderItem,
    EntityKind::Review,
    EntityKind::Payment,
];

impl EntityKind {
    pub fn descriptor(self) -> &'static EntityDescriptor {
        match self {
            EntityKind::Customer => &CUSTOMER,
            EntityKind::Product => &PRODUCT,
            EntityKind::Seller => &SELLER,
            EntityKind::Order => &ORDER,
            EntityKind::OrderItem => &ORDER_ITEM,
            EntityKind::Review => &REVIEW,
            EntityKind::Payment => &PAYMENT,
        }
    }

    pub fn label(self) -> &'static str {
        self.descriptor().label
    }

    pub fn from_label(label: &str) -> Option<Self> {
        LOAD_ORDER.into_iter().find(|kind| kind.label() == label)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeType {
    Integer,
    Float,
    Boolean,
    String,
}

impl AttributeType {
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Boolean => "boolean",
            AttributeType::String => "string",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub property: &'static str,
    pub column: &'static str,
    pub ty: AttributeType,
}

const fn attr(property: &'static str, column: &'static str, ty: AttributeType) -> AttributeSpec {
    AttributeSpec { property, column, ty }
}

/// How a node's business key is derived from its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpec {
    Natural(&'static str),
    /// `<parent>` + `_` + `<sequence>`; sequence numbers are only unique per parent.
    Composite {
        parent: &'static str,
        sequence: &'static str,
    },
}

impl KeySpec {
    pub fn columns(&self) -> Vec<&'static str> {
        match *self {
            KeySpec::Natural(column) => vec![column],
            KeySpec::Composite { parent, sequence } => vec![parent, sequence],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `(parent)-[:REL]->(node)`
    FromParent,
    /// `(node)-[:REL]->(parent)`
    ToParent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub rel_type: &'static str,
    pub parent: EntityKind,
    pub column: &'static str,
    pub direction: Direction,
}

#[derive(Debug)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub label: &'static str,
    pub source_file: &'static str,
    pub key: KeySpec,
    pub attributes: &'static [AttributeSpec],
    pub parents: &'static [ParentLink],
}

impl EntityDescriptor {
    /// Every column the record source must provide for this entity.
    pub fn required_columns(&self) -> Vec<&'static str> {
        let mut columns = self.key.columns();
        let rest = self
            .attributes
            .iter()
            .map(|a| a.column)
            .chain(self.parents.iter().map(|p| p.column));
        for column in rest {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    pub fn constraint_name(&self) -> String {
        let mut name = String::new();
        for (i, ch) in self.label.char_indices() {
            if ch.is_uppercase() && i > 0 {
                name.push('_');
            }
            name.push(ch.to_ascii_lowercase());
        }
        name.push_str("_id");
        name
    }
}

use AttributeType::{Boolean, Float, Integer, String as Str};

pub static CUSTOMER: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Customer,
    label: "Customer",
    source_file: "olist_customers_dataset_enhanced_sample.csv",
    key: KeySpec::Natural("customer_id"),
    attributes: &[
        attr("unique_id", "customer_unique_id", Str),
        attr("zip_code", "customer_zip_code_prefix", Str),
        attr("city", "customer_city", Str),
        attr("state", "customer_state", Str),
        attr("total_orders", "total_orders", Integer),
        attr("first_purchase", "first_purchase_date", Str),
        attr("last_purchase", "last_purchase_date", Str),
        attr("lifetime_days", "customer_lifetime_days", Integer),
        attr("total_spending", "total_spending", Float),
        attr("avg_order_value", "avg_order_value", Float),
        attr("avg_review_score", "avg_review_score", Float),
        attr("review_count", "review_count", Integer),
        attr("segment", "customer_segment", Str),
    ],
    parents: &[],
};

pub static PRODUCT: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Product,
    label: "Product",
    source_file: "olist_products_dataset_enhanced_sample.csv",
    key: KeySpec::Natural("product_id"),
    attributes: &[
        attr("category", "product_category_name", Str),
        attr("category_english", "product_category_name_english", Str),
        // Source columns carry the dataset's original spelling.
        attr("name_length", "product_name_lenght", Integer),
        attr("description_length", "product_description_lenght", Integer),
        attr("photos_qty", "product_photos_qty", Integer),
        attr("weight_g", "product_weight_g", Integer),
        attr("length_cm", "product_length_cm", Integer),
        attr("height_cm", "product_height_cm", Integer),
        attr("width_cm", "product_width_cm", Integer),
        attr("volume_cm3", "product_volume_cm3", Float),
        attr("density", "product_density_g_per_cm3", Float),
        attr("complexity_score", "product_complexity_score", Float),
        attr("size_category", "size_category", Str),
        attr("units_sold", "units_sold", Integer),
        attr("total_revenue", "total_revenue", Float),
        attr("avg_price", "avg_price", Float),
        attr("avg_rating", "avg_product_rating", Float),
    ],
    parents: &[],
};

pub static SELLER: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Seller,
    label: "Seller",
    source_file: "olist_sellers_dataset_enhanced_sample.csv",
    key: KeySpec::Natural("seller_id"),
    attributes: &[
        attr("zip_code", "seller_zip_code_prefix", Str),
        attr("city", "seller_city", Str),
        attr("state", "seller_state", Str),
        attr("total_orders", "total_orders", Integer),
        attr("total_revenue", "total_revenue", Float),
        attr("avg_item_price", "avg_item_price", Float),
        attr("avg_rating", "avg_rating", Float),
        attr("tier", "seller_tier", Str),
        attr("on_time_deliveries", "on_time_deliveries", Integer),
        attr("on_time_rate", "on_time_delivery_rate", Float),
    ],
    parents: &[],
};

pub static ORDER: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Order,
    label: "Order",
    source_file: "olist_orders_dataset_enhanced_sample.csv",
    key: KeySpec::Natural("order_id"),
    attributes: &[
        attr("status", "order_status", Str),
        attr("purchase_timestamp", "order_purchase_timestamp", Str),
        attr("approved_at", "order_approved_at", Str),
        attr("delivered_carrier_date", "order_delivered_carrier_date", Str),
        attr("delivered_customer_date", "order_delivered_customer_date", Str),
        attr("estimated_delivery_date", "order_estimated_delivery_date", Str),
        attr("approval_to_delivery_days", "approval_to_delivery_days", Float),
        attr("estimated_delivery_days", "estimated_delivery_days", Integer),
        attr("delivery_delay_days", "delivery_delay_days", Float),
        attr("item_total", "order_item_total", Float),
        attr("freight_total", "order_freight_total", Float),
        attr("total_with_freight", "order_total_with_freight", Float),
        attr("num_items", "num_items", Float),
        attr("review_score", "order_review_score", Float),
        attr("delivery_performance", "delivery_performance", Str),
        attr("customer_segment", "customer_segment", Str),
    ],
    parents: &[ParentLink {
        rel_type: "PLACED",
        parent: EntityKind::Customer,
        column: "customer_id",
        direction: Direction::FromParent,
    }],
};

pub static ORDER_ITEM: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::OrderItem,
    label: "OrderItem",
    source_file: "olist_order_items_dataset_enhanced_sample.csv",
    key: KeySpec::Composite {
        parent: "order_id",
        sequence: "order_item_id",
    },
    attributes: &[
        attr("order_item_id", "order_item_id", Integer),
        attr("shipping_limit_date", "shipping_limit_date", Str),
        attr("price", "price", Float),
        attr("freight_value", "freight_value", Float),
        attr("estimated_profit", "estimated_profit", Float),
        attr("item_total", "item_total_with_freight", Float),
        attr("price_category", "price_category", Str),
    ],
    parents: &[
        ParentLink {
            rel_type: "CONTAINS",
            parent: EntityKind::Order,
            column: "order_id",
            direction: Direction::FromParent,
        },
        ParentLink {
            rel_type: "FOR_PRODUCT",
            parent: EntityKind::Product,
            column: "product_id",
            direction: Direction::ToParent,
        },
        ParentLink {
            rel_type: "SOLD_BY",
            parent: EntityKind::Seller,
            column: "seller_id",
            direction: Direction::ToParent,
        },
    ],
};

pub static REVIEW: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Review,
    label: "Review",
    source_file: "olist_order_reviews_dataset_enhanced_sample.csv",
    key: KeySpec::Natural("review_id"),
    attributes: &[
        attr("score", "review_score", Integer),
        attr("comment_title", "review_comment_title", Str),
        attr("comment_message", "review_comment_message", Str),
        attr("creation_date", "review_creation_date", Str),
        attr("answer_timestamp", "review_answer_timestamp", Str),
        attr("sentiment", "review_sentiment", Str),
        attr("has_comment", "has_comment", Boolean),
        attr("response_time_hours", "response_time_hours", Float),
    ],
    parents: &[ParentLink {
        rel_type: "HAS_REVIEW",
        parent: EntityKind::Order,
        column: "order_id",
        direction: Direction::FromParent,
    }],
};

pub static PAYMENT: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Payment,
    label: "Payment",
    source_file: "olist_order_payments_dataset_enhanced_sample.csv",
    key: KeySpec::Composite {
        parent: "order_id",
        sequence: "payment_sequential",
    },
    attributes: &[
        attr("sequential", "payment_sequential", Integer),
        attr("type", "payment_type", Str),
        attr("installments", "payment_installments", Integer),
        attr("value", "payment_value", Float),
        attr("percentage", "payment_percentage", Float),
        attr("method_category", "payment_method_category", Str),
        attr("installment_risk", "installment_risk", Str),
    ],
    parents: &[ParentLink {
        rel_type: "PAID_WITH",
        parent: EntityKind::Order,
        column: "order_id",
        direction: Direction::FromParent,
    }],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_order_puts_parents_first() {
        for (position, kind) in LOAD_ORDER.iter().enumerate() {
            for link in kind.descriptor().parents {
                let parent_position = LOAD_ORDER
                    .iter()
                    .position(|k| *k == link.parent)
                    .unwrap();
                assert!(
                    parent_position < position,
                    "{} links to {} which loads later",
                    kind,
                    link.parent
                );
            }
        }
    }

    #[test]
    fn descriptors_match_their_kind() {
        for kind in LOAD_ORDER {
            assert_eq!(kind.descriptor().kind, kind);
            assert_eq!(EntityKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(EntityKind::from_label("Shipment"), None);
    }

    #[test]
    fn constraint_names_are_snake_case() {
        assert_eq!(CUSTOMER.constraint_name(), "customer_id");
        assert_eq!(ORDER_ITEM.constraint_name(), "order_item_id");
    }

    #[test]
    fn required_columns_are_deduplicated() {
        let columns = ORDER_ITEM.required_columns();
        assert_eq!(columns.iter().filter(|c| **c == "order_id").count(), 1);
        assert_eq!(columns.iter().filter(|c| **c == "order_item_id").count(), 1);
        assert!(columns.contains(&"product_id"));
        assert!(columns.contains(&"seller_id"));
    }
}
