//! Order submission requests and their wire encoding.

use std::fmt;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Single-letter wire code.
    pub fn code(self) -> char {
        match self {
            Side::Buy => 'B',
            Side::Sell => 'S',
        }
    }
}

/// A synthetic order to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRequest {
    pub id: u64,
    pub side: Side,
    pub price: i64,
    pub quantity: u64,
}

impl OrderRequest {
    /// Serialize to `SUBMIT <id> <side> <price> <qty>\n`.
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "SUBMIT {} {} {} {}",
            self.id,
            self.side.code(),
            self.price,
            self.quantity
        )
    }
}
