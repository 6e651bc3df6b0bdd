//! `/v3/orderexecution` endpoints.
//!
//! Placement calls are POSTs and therefore are not retried after a transport failure unless
//! [`RetryConfig::retry_non_idempotent`](crate::config::RetryConfig::retry_non_idempotent)
//! is set.

// self
use crate::{
	_prelude::*,
	client::TradeStationClient,
	executor::RequestDescriptor,
	models::order_execution::{
		ActivationTriggers, CancelOrderResponse, GroupOrderRequest, OrderConfirmations,
		OrderRequest, OrderResponse, ReplaceOrderRequest, Routes,
	},
	services,
};

/// Order placement and management.
#[derive(Clone, Copy, Debug)]
pub struct OrderExecution<'a> {
	client: &'a TradeStationClient,
}
impl<'a> OrderExecution<'a> {
	pub(crate) fn new(client: &'a TradeStationClient) -> Self {
		Self { client }
	}

	/// Routes orders can be sent to.
	pub async fn routes(&self) -> Result<Routes> {
		self.client.execute_json(&RequestDescriptor::get("/v3/orderexecution/routes")).await
	}

	/// Conditions that can activate an order.
	pub async fn activation_triggers(&self) -> Result<ActivationTriggers> {
		self.client
			.execute_json(&RequestDescriptor::get("/v3/orderexecution/activationtriggers"))
			.await
	}

	/// Places a single order.
	pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse> {
		order.validate()?;

		self.client
			.execute_json(&RequestDescriptor::post("/v3/orderexecution/orders").with_json(order)?)
			.await
	}

	/// Estimates cost and commission of an order without placing it.
	pub async fn confirm_order(&self, order: &OrderRequest) -> Result<OrderConfirmations> {
		order.validate()?;

		self.client
			.execute_json(
				&RequestDescriptor::post("/v3/orderexecution/orderconfirm").with_json(order)?,
			)
			.await
	}

	/// Places a group of orders (OCO, bracket or order-sends-order).
	pub async fn place_group_order(&self, group: &GroupOrderRequest) -> Result<OrderResponse> {
		validate_group(group)?;

		self.client
			.execute_json(
				&RequestDescriptor::post("/v3/orderexecution/ordergroups").with_json(group)?,
			)
			.await
	}

	/// Estimates a group of orders without placing it.
	pub async fn confirm_group_order(
		&self,
		group: &GroupOrderRequest,
	) -> Result<OrderConfirmations> {
		validate_group(group)?;

		self.client
			.execute_json(
				&RequestDescriptor::post("/v3/orderexecution/ordergroupconfirm").with_json(group)?,
			)
			.await
	}

	/// Changes quantity, prices or type of a working order.
	pub async fn replace_order(
		&self,
		order_id: &str,
		changes: &ReplaceOrderRequest,
	) -> Result<OrderResponse> {
		let order_id = order_id_segment(order_id)?;

		if changes.is_empty() {
			return Err(Error::InvalidRequest {
				reason: "replace must change at least one field".into(),
			});
		}

		self.client
			.execute_json(
				&RequestDescriptor::put(format!("/v3/orderexecution/orders/{order_id}"))
					.with_json(changes)?,
			)
			.await
	}

	/// Cancels a working order.
	pub async fn cancel_order(&self, order_id: &str) -> Result<CancelOrderResponse> {
		let order_id = order_id_segment(order_id)?;

		let request = RequestDescriptor::delete(format!("/v3/orderexecution/orders/{order_id}"));

		self.client.execute_json(&request).await
	}
}

/// Order IDs travel without dashes (`1-2345-6789` → `123456789`).
fn order_id_segment(order_id: &str) -> Result<String> {
	Ok(services::require("order ID", order_id)?.replace('-', ""))
}

fn validate_group(group: &GroupOrderRequest) -> Result<()> {
	if group.orders.len() < 2 {
		return Err(Error::InvalidRequest { reason: "a group needs at least two orders".into() });
	}

	group.orders.iter().try_for_each(OrderRequest::validate)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::models::order_execution::{GroupType, OrderDuration, TradeAction};

	#[test]
	fn order_ids_drop_dashes() {
		assert_eq!(order_id_segment("1-2345-6789").expect("ID should normalize."), "123456789");
		assert!(matches!(order_id_segment(""), Err(Error::InvalidRequest { .. })));
	}

	#[test]
	fn groups_need_two_valid_orders() {
		let ticket = OrderRequest::market("A1", "MSFT", "1", TradeAction::Buy, OrderDuration::Day);
		let single = GroupOrderRequest { r#type: GroupType::Oco, orders: vec![ticket.clone()] };
		let pair =
			GroupOrderRequest { r#type: GroupType::Oco, orders: vec![ticket.clone(), ticket] };

		assert!(matches!(validate_group(&single), Err(Error::InvalidRequest { .. })));
		assert!(validate_group(&pair).is_ok());
	}
}
