//! Response line classifier.

/// A classified engine response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Order was accepted.
    Ack { order_id: u64 },
    /// Order traded. `detail` is everything after the id, passed through as is.
    Fill { order_id: u64, detail: String },
    /// Anything else, including malformed ACK/FILL lines.
    Unknown { raw: String },
}

/// Classify a complete line (newline already stripped).
///
/// Never fails: a line that doesn't parse as a recognized kind comes back as
/// `Unknown` so the caller can skip it.
pub fn classify(line: &str) -> Response {
    let (kind, rest) = next_token(line);
    if kind.is_empty() {
        return unknown(line);
    }

    let (id, rest) = next_token(rest);
    let order_id = match id.parse::<u64>() {
        Ok(id) => id,
        Err(_) => return unknown(line),
    };

    match kind {
        "ACK" => Response::Ack { order_id },
        "FILL" => Response::Fill {
            order_id,
            detail: rest.trim_start().to_string(),
        },
        _ => unknown(line),
    }
}

/// Split off the first whitespace-delimited token, returning it and the
/// untouched remainder.
fn next_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => s.split_at(end),
        None => (s, ""),
    }
}

/// Check if an unrecognized line is an engine reject (`ERR <reason>`).
pub fn is_reject(raw: &str) -> bool {
    raw.split_whitespace().next() == Some("ERR")
}

fn unknown(line: &str) -> Response {
    Response::Unknown {
        raw: line.to_string(),
    }
}

/// Trade fields the reference engine puts after the taker id in a fill:
/// `FILL <taker_id> <maker_id> <price> <qty>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillDetail {
    pub maker_id: u64,
    pub price: i64,
    pub quantity: u64,
}

impl FillDetail {
    /// Decode a fill's opaque detail. Returns `None` for any other shape.
    pub fn parse(detail: &str) -> Option<Self> {
        let mut tokens = detail.split_whitespace();
        let maker_id = tokens.next()?.parse().ok()?;
        let price = tokens.next()?.parse().ok()?;
        let quantity = tokens.next()?.parse().ok()?;
        if tokens.next().is_some() {
            return None;
        }
        Some(Self {
            maker_id,
            price,
            quantity,
        })
    }
}
