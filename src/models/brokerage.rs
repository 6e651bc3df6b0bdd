//! Accounts, balances, positions and orders.

// self
use crate::{_prelude::*, models::ItemError};

/// Brokerage account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Account {
	#[serde(rename = "AccountID")]
	pub account_id: String,
	pub account_type: Option<String>,
	pub alias: Option<String>,
	pub currency: Option<String>,
	pub status: Option<String>,
	pub account_detail: Option<AccountDetail>,
}

/// Trading permissions of an account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccountDetail {
	pub is_stock_locate_eligible: bool,
	pub enrolled_in_reg_t_program: bool,
	pub requires_buying_power_warning: bool,
	pub day_trading_qualified: bool,
	pub option_approval_level: u8,
	pub pattern_day_trader: bool,
}

/// Response of the accounts endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Accounts {
	pub accounts: Vec<Account>,
}

/// Real-time account balance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Balance {
	#[serde(rename = "AccountID")]
	pub account_id: String,
	pub account_type: Option<String>,
	pub cash_balance: Option<String>,
	pub buying_power: Option<String>,
	pub equity: Option<String>,
	pub market_value: Option<String>,
	pub todays_profit_loss: Option<String>,
	pub uncleared_deposit: Option<String>,
	pub commission: Option<String>,
	pub balance_detail: Option<BTreeMap<String, serde_json::Value>>,
}

/// Response of the balances endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Balances {
	pub balances: Vec<Balance>,
	pub errors: Vec<ItemError>,
}

/// Beginning-of-day account balance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BodBalance {
	#[serde(rename = "AccountID")]
	pub account_id: String,
	pub account_type: Option<String>,
	pub balance_detail: Option<BodBalanceDetail>,
}

/// Figures of a [`BodBalance`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BodBalanceDetail {
	pub account_balance: Option<String>,
	pub cash_available_to_withdraw: Option<String>,
	pub day_trades: Option<String>,
	pub day_trading_marginable_buying_power: Option<String>,
	pub equity: Option<String>,
	pub net_cash: Option<String>,
	pub option_buying_power: Option<String>,
	pub option_value: Option<String>,
	pub overnight_buying_power: Option<String>,
}

/// Response of the beginning-of-day balances endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BodBalances {
	#[serde(rename = "BODBalances")]
	pub bod_balances: Vec<BodBalance>,
	pub errors: Vec<ItemError>,
}

/// Open position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Position {
	#[serde(rename = "AccountID")]
	pub account_id: String,
	#[serde(rename = "PositionID")]
	pub position_id: String,
	pub symbol: String,
	pub asset_type: Option<String>,
	pub quantity: Option<String>,
	pub long_short: Option<String>,
	pub average_price: Option<String>,
	pub last: Option<String>,
	pub market_value: Option<String>,
	pub total_cost: Option<String>,
	pub unrealized_profit_loss: Option<String>,
	pub todays_profit_loss: Option<String>,
	pub timestamp: Option<String>,
}

/// Response of the positions endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Positions {
	pub positions: Vec<Position>,
	pub errors: Vec<ItemError>,
}

/// Open or historical order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Order {
	#[serde(rename = "AccountID")]
	pub account_id: String,
	#[serde(rename = "OrderID")]
	pub order_id: String,
	pub status: Option<String>,
	pub status_description: Option<String>,
	pub order_type: Option<String>,
	pub duration: Option<String>,
	pub limit_price: Option<String>,
	pub stop_price: Option<String>,
	pub filled_price: Option<String>,
	pub opened_date_time: Option<String>,
	pub closed_date_time: Option<String>,
	pub commission_fee: Option<String>,
	pub legs: Vec<OrderLeg>,
}

/// One leg of an [`Order`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OrderLeg {
	pub symbol: String,
	pub asset_type: Option<String>,
	pub buy_or_sell: Option<String>,
	pub open_or_close: Option<String>,
	pub quantity_ordered: Option<String>,
	pub exec_quantity: Option<String>,
	pub quantity_remaining: Option<String>,
	pub execution_price: Option<String>,
}

/// Response of the order listing endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Orders {
	pub orders: Vec<Order>,
	pub errors: Vec<ItemError>,
	/// Cursor for the next page, when more orders exist.
	pub next_token: Option<String>,
}

/// Paging for order listings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderPage {
	/// Page size, 1..=600.
	pub page_size: Option<u32>,
	/// Cursor returned by the previous page.
	pub next_token: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn orders_parse_with_legs_and_cursor() {
		let orders = serde_json::from_str::<Orders>(
			r#"{
				"Orders":[{
					"AccountID":"123456","OrderID":"286234131","Status":"OPN",
					"Legs":[{"Symbol":"MSFT","BuyOrSell":"Buy","QuantityOrdered":"10"}]
				}],
				"Errors":[{
					"AccountID":"INVALID","Error":"NotFound","Message":"Account not found."
				}],
				"NextToken":"abc"
			}"#,
		)
		.expect("Orders fixture should parse.");

		assert_eq!(orders.orders[0].order_id, "286234131");
		assert_eq!(orders.orders[0].legs[0].quantity_ordered.as_deref(), Some("10"));
		assert_eq!(orders.errors[0].account_id.as_deref(), Some("INVALID"));
		assert_eq!(orders.next_token.as_deref(), Some("abc"));
	}

	#[test]
	fn bod_balances_use_upper_case_key() {
		let balances = serde_json::from_str::<BodBalances>(
			r#"{"BODBalances":[{"AccountID":"123456","BalanceDetail":{"NetCash":"1000.00"}}]}"#,
		)
		.expect("BOD fixture should parse.");

		let detail = balances.bod_balances[0].balance_detail.as_ref();

		assert_eq!(detail.and_then(|detail| detail.net_cash.as_deref()), Some("1000.00"));
	}
}
