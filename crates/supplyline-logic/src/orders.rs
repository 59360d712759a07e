//! Orders, as far as disruptions care about them.
//!
//! Order placement, fulfilment and inventory live elsewhere. Delay spikes
//! only read an order's status and products, and move its delivery day and
//! date. [`OrderBook`] is that seam; [`OrderLedger`] is the in-memory
//! implementation the engine ships with.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ids::{Day, OrderId, PlayerId, ProductId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Pending,
    Dispatched,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Statuses in which goods can still be on their way.
    pub fn is_shippable(self) -> bool {
        matches!(self, Self::Pending | Self::Dispatched | Self::InTransit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub owner: PlayerId,
    pub status: OrderStatus,
    pub delivery_day: Option<Day>,
    pub delivery_date: Option<NaiveDate>,
    pub items: Vec<LineItem>,
}

impl Order {
    /// Delays only touch orders that are moving and already have a slot.
    pub fn is_delayable(&self) -> bool {
        self.status.is_shippable() && !self.status.is_terminal() && self.delivery_day.is_some()
    }

    pub fn contains(&self, product: ProductId) -> bool {
        self.items.iter().any(|item| item.product == product)
    }

    /// Move both delivery fields forward by `days`.
    pub fn postpone(&mut self, days: u32) {
        if let Some(day) = self.delivery_day.as_mut() {
            *day = day.saturating_add(days);
        }
        if let Some(date) = self.delivery_date {
            self.delivery_date = date.checked_add_days(Days::new(days as u64)).or(Some(date));
        }
    }
}

/// Read/write access to orders for the delay effect.
pub trait OrderBook {
    /// Ids of the owner's orders, in a stable order.
    fn order_ids_for(&self, owner: PlayerId) -> Vec<OrderId>;

    fn order(&self, id: OrderId) -> Option<&Order>;

    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order>;
}

/// Vec-backed order store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderLedger {
    orders: Vec<Order>,
    next_id: u64,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place(
        &mut self,
        owner: PlayerId,
        status: OrderStatus,
        delivery_day: Option<Day>,
        delivery_date: Option<NaiveDate>,
        items: Vec<LineItem>,
    ) -> OrderId {
        let id = OrderId(self.next_id);
        self.next_id += 1;
        self.orders.push(Order {
            id,
            owner,
            status,
            delivery_day,
            delivery_date,
            items,
        });
        id
    }

    pub fn remove(&mut self, id: OrderId) -> Option<Order> {
        let index = self.orders.iter().position(|o| o.id == id)?;
        Some(self.orders.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl OrderBook for OrderLedger {
    fn order_ids_for(&self, owner: PlayerId) -> Vec<OrderId> {
        self.orders
            .iter()
            .filter(|o| o.owner == owner)
            .map(|o| o.id)
            .collect()
    }

    fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == id)
    }
}
