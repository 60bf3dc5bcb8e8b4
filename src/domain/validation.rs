/// Order Validator - Business Rule Validation
///
/// Runs on the caller's thread before anything is enqueued, so malformed
/// requests fail synchronously and never cost the sequencer a slot.
///
/// ## Validation Rules
/// - Order id, symbol and side must be present
/// - Side must be BUY or SELL (case-insensitive)
/// - Price and quantity must parse as decimals and be strictly positive
/// - Decimal scale, price and quantity may be capped by configuration
/// - Symbol may be restricted to an allow-list
///
/// ## Usage
/// ```rust,ignore
/// use matching_sequencer::domain::validation::OrderValidator;
///
/// let validator = OrderValidator::new();
/// let valid = validator.validate(&request)?;
/// ```

use crate::shared::protocol::{Side, SubmitOrderRequest};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid side: {0}")]
    InvalidSide(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Price out of range: {0}")]
    PriceOutOfRange(String),

    #[error("Quantity out of range: {0}")]
    QuantityOutOfRange(String),
}

/// 默认单笔数量上限，远小于 `Decimal::MAX`，同价位大量挂单累加也不会溢出
pub const DEFAULT_MAX_QUANTITY: Decimal = Decimal::from_parts(2_808_348_672, 232_830_643, 0, false, 0);

/// Order validation configuration
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Maximum order id length in bytes
    pub max_order_id_len: usize,

    /// Maximum number of fractional digits for price and quantity
    pub max_scale: u32,

    /// Maximum price (inclusive), unbounded when `None`
    pub max_price: Option<Decimal>,

    /// Maximum quantity (inclusive), unbounded when `None`.
    /// Defaults to `DEFAULT_MAX_QUANTITY` (10^18).
    pub max_quantity: Option<Decimal>,

    /// Allowed symbols (empty means all symbols allowed)
    pub allowed_symbols: Vec<Arc<str>>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_order_id_len: 64,
            max_scale: 10,
            max_price: None,
            max_quantity: Some(DEFAULT_MAX_QUANTITY),
            allowed_symbols: Vec::new(),
        }
    }
}

/// A request that passed validation, borrowing its strings from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder<'a> {
    pub order_id: &'a str,
    pub symbol: &'a str,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Order validator
pub struct OrderValidator {
    config: ValidationConfig,
}

impl OrderValidator {
    pub fn new() -> Self {
        Self {
            config: ValidationConfig::default(),
        }
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates a submit request
    ///
    /// # Returns
    /// * `Ok(ValidatedOrder)` with parsed, normalized decimals
    /// * `Err(ValidationError)` naming the first rule that failed
    pub fn validate<'a>(&self, request: &'a SubmitOrderRequest) -> Result<ValidatedOrder<'a>, ValidationError> {
        let order_id = self.validate_order_id(&request.order_id)?;
        let symbol = self.validate_symbol(&request.symbol)?;
        let side = Side::parse(&request.side).ok_or_else(|| {
            ValidationError::InvalidSide(format!("'{}' is not BUY or SELL", request.side))
        })?;
        let price = self.validate_price(&request.price)?;
        let quantity = self.validate_quantity(&request.quantity)?;

        Ok(ValidatedOrder {
            order_id,
            symbol,
            side,
            price,
            quantity,
        })
    }

    fn validate_order_id<'a>(&self, order_id: &'a str) -> Result<&'a str, ValidationError> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(ValidationError::InvalidOrderId("Order id cannot be empty".to_string()));
        }
        if order_id.len() > self.config.max_order_id_len {
            return Err(ValidationError::InvalidOrderId(format!(
                "Order id length {} exceeds maximum {}",
                order_id.len(),
                self.config.max_order_id_len
            )));
        }
        Ok(order_id)
    }

    /// Validates the symbol
    pub fn validate_symbol<'a>(&self, symbol: &'a str) -> Result<&'a str, ValidationError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol("Symbol cannot be empty".to_string()));
        }

        if !self.config.allowed_symbols.is_empty()
            && !self.config.allowed_symbols.iter().any(|s| s.as_ref() == symbol)
        {
            return Err(ValidationError::InvalidSymbol(format!(
                "Symbol '{}' is not in allowed list",
                symbol
            )));
        }

        Ok(symbol)
    }

    fn validate_price(&self, raw: &str) -> Result<Decimal, ValidationError> {
        let price = parse_decimal(raw).ok_or_else(|| {
            ValidationError::InvalidPrice(format!("'{}' is not a decimal number", raw))
        })?;

        if price <= Decimal::ZERO {
            return Err(ValidationError::InvalidPrice(
                "Price must be greater than zero".to_string(),
            ));
        }
        if price.scale() > self.config.max_scale {
            return Err(ValidationError::InvalidPrice(format!(
                "Price {} has more than {} decimal places",
                price, self.config.max_scale
            )));
        }
        if let Some(max_price) = self.config.max_price {
            if price > max_price {
                return Err(ValidationError::PriceOutOfRange(format!(
                    "Price {} exceeds maximum {}",
                    price, max_price
                )));
            }
        }

        Ok(price)
    }

    fn validate_quantity(&self, raw: &str) -> Result<Decimal, ValidationError> {
        let quantity = parse_decimal(raw).ok_or_else(|| {
            ValidationError::InvalidQuantity(format!("'{}' is not a decimal number", raw))
        })?;

        if quantity <= Decimal::ZERO {
            return Err(ValidationError::InvalidQuantity(
                "Quantity must be greater than zero".to_string(),
            ));
        }
        if quantity.scale() > self.config.max_scale {
            return Err(ValidationError::InvalidQuantity(format!(
                "Quantity {} has more than {} decimal places",
                quantity, self.config.max_scale
            )));
        }
        if let Some(max_quantity) = self.config.max_quantity {
            if quantity > max_quantity {
                return Err(ValidationError::QuantityOutOfRange(format!(
                    "Quantity {} exceeds maximum {}",
                    quantity, max_quantity
                )));
            }
        }

        Ok(quantity)
    }
}

impl Default for OrderValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses and normalizes ("100.50" -> "100.5") so equal prices print alike.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok().map(|d| d.normalize())
}
