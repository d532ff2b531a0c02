//! Application layer: the checkout and contract use cases.
//!
//! Services here own no state of their own. They hold the injected gateway
//! and event log handles and are cheap to clone into each request.

pub mod checkout;
pub mod contracts;
pub mod form;
