// SPDX-License-Identifier: Apache-2.0
//
// Veriport — Cross-device pairing: session identity, wire messages, the
// message bus abstraction, and the announce/poll channel logic.

pub mod bus;
pub mod channel;
pub mod message;

pub use bus::{InMemoryBus, MessageBus, Sequenced};
pub use channel::{DeviceRole, PairingChannel, PairingSession};
pub use message::{MessageKind, PairingMessage};
