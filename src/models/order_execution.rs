//! Order tickets, confirmations and routing metadata.

// self
use crate::{_prelude::*, models::ItemError};

/// Order type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
	Market,
	Limit,
	StopMarket,
	StopLimit,
}

/// Side of a ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
	Buy,
	Sell,
	BuyToCover,
	SellShort,
	BuyToOpen,
	BuyToClose,
	SellToOpen,
	SellToClose,
}

/// How long an order stays working.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDuration {
	Day,
	Dyp,
	Gtc,
	Gcp,
	Gtd,
	Gdp,
	Opg,
	Clo,
	Ioc,
	Fok,
}

/// Duration plus the expiration required by the good-till-date variants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeInForce {
	pub duration: OrderDuration,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expiration: Option<String>,
}
impl TimeInForce {
	/// Plain duration without expiration.
	pub fn new(duration: OrderDuration) -> Self {
		Self { duration, expiration: None }
	}
}

/// Single-leg order ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderRequest {
	#[serde(rename = "AccountID")]
	pub account_id: String,
	pub symbol: String,
	pub quantity: String,
	pub order_type: OrderType,
	pub trade_action: TradeAction,
	pub time_in_force: TimeInForce,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub route: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub limit_price: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stop_price: Option<String>,
}
impl OrderRequest {
	/// Market order with the `Intelligent` route.
	pub fn market(
		account_id: impl Into<String>,
		symbol: impl Into<String>,
		quantity: impl Into<String>,
		trade_action: TradeAction,
		duration: OrderDuration,
	) -> Self {
		Self {
			account_id: account_id.into(),
			symbol: symbol.into(),
			quantity: quantity.into(),
			order_type: OrderType::Market,
			trade_action,
			time_in_force: TimeInForce::new(duration),
			route: Some("Intelligent".into()),
			limit_price: None,
			stop_price: None,
		}
	}

	/// Turns the ticket into a limit order at `price`.
	pub fn with_limit_price(mut self, price: impl Into<String>) -> Self {
		self.order_type = OrderType::Limit;
		self.limit_price = Some(price.into());

		self
	}

	pub(crate) fn validate(&self) -> Result<()> {
		let missing =
			|field: &str| Error::InvalidRequest { reason: format!("{field} is required") };

		if self.account_id.trim().is_empty() {
			return Err(missing("AccountID"));
		}
		if self.symbol.trim().is_empty() {
			return Err(missing("Symbol"));
		}
		if self.quantity.trim().is_empty() {
			return Err(missing("Quantity"));
		}
		if matches!(self.order_type, OrderType::Limit | OrderType::StopLimit)
			&& self.limit_price.is_none()
		{
			return Err(missing("LimitPrice"));
		}
		if matches!(self.order_type, OrderType::StopMarket | OrderType::StopLimit)
			&& self.stop_price.is_none()
		{
			return Err(missing("StopPrice"));
		}

		Ok(())
	}
}

/// Group relationship between tickets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupType {
	/// Order sends order.
	Normal,
	/// Bracket.
	Brk,
	/// One cancels other.
	Oco,
}

/// Several tickets submitted together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupOrderRequest {
	pub r#type: GroupType,
	pub orders: Vec<OrderRequest>,
}

/// Fields changed by a replace; unset fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplaceOrderRequest {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub quantity: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub limit_price: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stop_price: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub order_type: Option<OrderType>,
}
impl ReplaceOrderRequest {
	pub(crate) fn is_empty(&self) -> bool {
		self.quantity.is_none()
			&& self.limit_price.is_none()
			&& self.stop_price.is_none()
			&& self.order_type.is_none()
	}
}

/// Accepted order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OrderAck {
	#[serde(rename = "OrderID")]
	pub order_id: String,
	pub message: Option<String>,
}

/// Response of the place, replace and group endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OrderResponse {
	pub orders: Vec<OrderAck>,
	pub errors: Vec<ItemError>,
}

/// Cost estimate for a ticket that was not placed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OrderConfirmation {
	#[serde(rename = "OrderConfirmID")]
	pub order_confirm_id: Option<String>,
	pub route: Option<String>,
	pub duration: Option<String>,
	pub account: Option<String>,
	pub summary_message: Option<String>,
	pub estimated_price: Option<String>,
	pub estimated_cost: Option<String>,
	pub estimated_commission: Option<String>,
	pub debit_credit_estimated_cost: Option<String>,
}

/// Response of the confirm endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OrderConfirmations {
	pub confirmations: Vec<OrderConfirmation>,
	pub errors: Vec<ItemError>,
}

/// Response of the cancel endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CancelOrderResponse {
	#[serde(rename = "OrderID")]
	pub order_id: String,
	pub error: Option<String>,
	pub message: Option<String>,
}

/// Order route.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Route {
	pub id: String,
	pub name: String,
	pub asset_types: Vec<String>,
}

/// Response of the routes endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Routes {
	pub routes: Vec<Route>,
}

/// Condition that can activate an order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ActivationTrigger {
	pub key: String,
	pub name: String,
	pub description: Option<String>,
}

/// Response of the activation triggers endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ActivationTriggers {
	pub activation_triggers: Vec<ActivationTrigger>,
}
