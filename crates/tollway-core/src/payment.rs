//! Payment requirement surfaced by paid services.
//!
//! A service that answers "payment required" describes what it wants paid.
//! Building and signing the payment happens outside this workspace.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TollwayError};

/// Terms quoted by a service that refuses to serve before being paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequirement {
    /// Amount in the asset's base units, as a decimal string.
    pub amount: String,

    /// Asset identifier (token contract or symbol).
    pub asset: String,

    /// Recipient address.
    #[serde(alias = "payTo")]
    pub pay_to: String,

    /// Network the payment must be made on.
    pub network: String,

    /// Nonce binding the payment to this request.
    pub nonce: String,
}

impl PaymentRequirement {
    /// Parse a payment-required response body.
    ///
    /// Accepts `payTo` or `pay_to` and numeric or string amounts. Every field
    /// is mandatory.
    pub fn from_json(body: &serde_json::Value) -> Result<Self> {
        let field = |names: &[&str]| -> Result<String> {
            let value = names
                .iter()
                .find_map(|name| body.get(*name))
                .ok_or_else(|| {
                    TollwayError::validation(format!(
                        "Payment requirement is missing field {}",
                        names[0]
                    ))
                })?;

            match value {
                serde_json::Value::String(s) if !s.is_empty() => Ok(s.clone()),
                serde_json::Value::Number(n) => Ok(n.to_string()),
                _ => Err(TollwayError::validation(format!(
                    "Payment requirement field {} must be a non-empty string or number",
                    names[0]
                ))),
            }
        };

        Ok(Self {
            amount: field(&["amount"])?,
            asset: field(&["asset"])?,
            pay_to: field(&["payTo", "pay_to"])?,
            network: field(&["network"])?,
            nonce: field(&["nonce"])?,
        })
    }
}
