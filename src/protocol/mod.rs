//! Order-submission wire protocol.
//!
//! Plain ASCII text, one message per `\n`-terminated line.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  SUBMIT <id> <B|S> <price> <qty>\n
//!
//! Response: ACK <id> ...\n            order accepted
//!           FILL <id> <detail...>\n   order traded (zero or more, any order)
//!           <anything else>\n         skipped
//! ```
//!
//! A single submit may produce several response lines, and fills for an
//! order can arrive before its acknowledgment. Responses are therefore
//! matched by id rather than by position.

pub mod framer;
pub mod parser;
pub mod request;

pub use framer::{LineFramer, MAX_LINE_LEN};
pub use parser::{classify, is_reject, FillDetail, Response};
pub use request::{OrderRequest, Side};
