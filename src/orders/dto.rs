use serde::{Deserialize, Serialize};

use super::{
    cart::CartLine,
    repo_types::{Order, OrderCustomer, OrderItem},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub hostel_block: String,
    pub room_number: String,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<CartLine>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: String,
    pub phone_number: String,
    #[serde(default)]
    pub payment_note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub order_items: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrderView {
    #[serde(flatten)]
    pub order: Order,
    pub user: OrderCustomer,
    pub order_items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PickupMessageUpdate {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_order_request_uses_camel_case() {
        let req: PlaceOrderRequest = serde_json::from_str(
            r#"{
                "items": [{"productId": "6f1c1f3e-8f0e-4a43-9a57-0c1f7f2b9a10", "quantity": 2}],
                "deliveryAddress": {"hostelBlock": "KP-7", "roomNumber": "214"},
                "paymentMethod": "upi",
                "phoneNumber": "9876543210",
                "paymentNote": "txn 4411"
            }"#,
        )
        .unwrap();
        assert_eq!(req.items[0].quantity, 2);
        assert_eq!(req.delivery_address.hostel_block, "KP-7");
        assert_eq!(req.payment_note.as_deref(), Some("txn 4411"));
    }

    #[test]
    fn payment_note_is_optional() {
        let req: PlaceOrderRequest = serde_json::from_str(
            r#"{"items": [], "deliveryAddress": {"hostelBlock": "A", "roomNumber": "1"},
                "paymentMethod": "cash", "phoneNumber": "9876543210"}"#,
        )
        .unwrap();
        assert!(req.payment_note.is_none());
    }
}
